//! Plugin management commands

use anyhow::{Context, Result};
use clap::Args;
use plume_core::{LoadReport, PluginFlags, PluginHost, PluginHostConfig, PluginInfo, PluginState};
use plume_plugin_api::{PluginId, PluginMetadata};

/// Arguments for `plume list`
#[derive(Args, Debug, Default)]
pub struct ListArgs {
    /// Print loaded plugins as JSON
    #[arg(long)]
    pub json: bool,
}

fn load_enabled(host: &PluginHost) -> Result<LoadReport> {
    host.load_all().with_context(|| {
        format!(
            "Failed to read plugin directory {}",
            host.config().plugin_dir.display()
        )
    })
}

fn loaded_plugins(host: &PluginHost) -> Vec<PluginInfo> {
    host.list_all()
        .iter()
        .filter_map(|handle| host.plugin_info(handle))
        .collect()
}

fn state_marker(state: PluginState) -> &'static str {
    match state {
        PluginState::Loaded | PluginState::Enabled => "✓",
        PluginState::Declined | PluginState::Disabled => "○",
    }
}

fn state_label(state: PluginState) -> &'static str {
    match state {
        PluginState::Loaded => "Loaded",
        PluginState::Enabled => "Enabled",
        PluginState::Declined => "Declined",
        PluginState::Disabled => "Disabled",
    }
}

/// One-line summary used by `plume list`
fn summary_line(m: &PluginMetadata, state: PluginState) -> String {
    let description = if m.description.is_empty() {
        "No description"
    } else {
        m.description.as_str()
    };
    format!(
        "{} {} v{}  {}    {}",
        state_marker(state),
        m.name,
        m.version,
        m.id,
        description
    )
}

pub fn list(config: PluginHostConfig, args: ListArgs) -> Result<()> {
    let host = PluginHost::new(config);
    let report = load_enabled(&host)?;
    let plugins = loaded_plugins(&host);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&plugins)?);
        return Ok(());
    }

    if plugins.is_empty() && report.skipped.is_empty() && report.failed.is_empty() {
        let root = host.config().plugin_dir.display();
        println!("No plugins installed");
        println!();
        println!("Plugin directory: {}", root);
        println!();
        println!("To install a plugin:");
        println!("  1. Create a plugin directory: mkdir -p {}/MyPlugin", root);
        println!("  2. Copy the plugin library: cp libmy_plugin.so {}/MyPlugin/Plugin.so", root);
        return Ok(());
    }

    for info in &plugins {
        println!("{}", summary_line(&info.metadata, info.state));
    }
    for path in &report.skipped {
        println!("○ {}    (disabled)", path.display());
    }
    for (path, e) in &report.failed {
        println!("✗ {}    ({})", path.display(), e);
    }

    Ok(())
}

pub fn info(config: PluginHostConfig, name: &str) -> Result<()> {
    let host = PluginHost::new(config);
    load_enabled(&host)?;

    let Some(info) = host.find_by_name(name).and_then(|h| host.plugin_info(&h)) else {
        println!("Plugin '{}' not found", name);
        println!();
        println!("The plugin might not be installed or enabled.");
        println!("Run 'plume list' to see loaded plugins.");
        return Ok(());
    };

    let m = &info.metadata;
    let or = |value: &str, fallback: &'static str| {
        if value.is_empty() {
            fallback.to_string()
        } else {
            value.to_string()
        }
    };
    println!("Name:        {}", m.name);
    println!("Version:     {}", m.version);
    println!("Id:          {}", m.id);
    println!("Author:      {}", or(&m.author, "Unknown"));
    println!("Description: {}", or(&m.description, "No description"));
    println!("Icon:        {}", or(&m.icon, "None"));
    println!("Module:      {}", m.path.display());
    println!();
    println!("Status:      {}", state_label(info.state));
    println!("Handlers:    {}", info.handlers);

    Ok(())
}

/// Write an enable flag for a plugin id or plugin directory name
pub fn set_enabled(config: PluginHostConfig, target: &str, enabled: bool) -> Result<()> {
    match PluginId::parse(target) {
        Ok(id) => {
            let host = PluginHost::new(config);
            host.set_enabled(id, enabled)?;
        }
        Err(_) => {
            let path = config.flags_path();
            let mut flags = PluginFlags::load(&path)?;
            flags.set(target, enabled);
            flags.save(&path)?;
        }
    }

    if enabled {
        println!("Enabled plugin: {}", target);
        println!("Run 'plume list' to verify the plugin loads correctly.");
    } else {
        println!("Disabled plugin: {}", target);
    }
    Ok(())
}

/// Bring every enabled plugin up, then shut the host down cleanly
pub fn run(config: PluginHostConfig) -> Result<()> {
    let host = PluginHost::new(config);
    let report = load_enabled(&host)?;
    for (path, e) in &report.failed {
        eprintln!("Failed to load {}: {}", path.display(), e);
    }

    let enabled = host.enable_all();
    println!(
        "{} plugin(s) enabled, {} declined, {} failed",
        enabled.completed.len(),
        enabled.declined.len(),
        enabled.failures.len()
    );
    for failure in &enabled.failures {
        eprintln!("  {}", failure);
    }

    let disabled = host.disable_all();
    for failure in &disabled.failures {
        eprintln!("  {}", failure);
    }

    let before = host.plugin_count();
    for e in &host.unload_all() {
        eprintln!("  {}", e);
    }
    println!("{} plugin(s) unloaded", before - host.plugin_count());

    Ok(())
}
