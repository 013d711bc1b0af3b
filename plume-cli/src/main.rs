use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

#[derive(Parser)]
#[command(name = "plume", about = "Plugin host for native Rust plugins")]
#[command(version, propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Host config file (defaults to ~/.config/plume/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Plugin root directory, overriding the config
    #[arg(long, global = true)]
    plugin_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// List plugins under the plugin directory
    List(commands::plugin::ListArgs),
    /// Show plugin details
    Info {
        /// Plugin name
        name: String,
    },
    /// Enable a plugin for auto-loading
    Enable {
        /// Plugin id or plugin directory name
        target: String,
    },
    /// Disable a plugin for auto-loading
    Disable {
        /// Plugin id or plugin directory name
        target: String,
    },
    /// Load and enable plugins, then shut them down
    Run,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let host_config = config::resolve(cli.config.as_deref(), cli.plugin_dir)?;

    match cli.command {
        Commands::List(args) => commands::plugin::list(host_config, args),
        Commands::Info { name } => commands::plugin::info(host_config, &name),
        Commands::Enable { target } => commands::plugin::set_enabled(host_config, &target, true),
        Commands::Disable { target } => commands::plugin::set_enabled(host_config, &target, false),
        Commands::Run => commands::plugin::run(host_config),
    }
}
