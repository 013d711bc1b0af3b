//! Metadata resolution - finds the plugin a module declares

use serde::{Deserialize, Serialize};
use std::path::Path;

use plume_plugin_api::{ModuleDeclaration, PluginDeclaration, PluginId, PluginMetadata};

use crate::error::MetadataError;

/// What to do when a module declares more than one plugin type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmbiguityPolicy {
    /// Take the first declaration and log a warning
    #[default]
    First,
    /// Refuse to load the module
    Reject,
}

/// Pick the module's plugin declaration and build its metadata
pub fn resolve<'a>(
    module: &'a ModuleDeclaration,
    path: &Path,
    policy: AmbiguityPolicy,
) -> Result<(&'a PluginDeclaration, PluginMetadata), MetadataError> {
    let declaration = match (module.plugins.as_slice(), policy) {
        ([], _) => {
            return Err(MetadataError::NotFound {
                path: path.to_path_buf(),
            });
        }
        ([only], _) => only,
        ([first, ..], AmbiguityPolicy::First) => {
            tracing::warn!(
                path = %path.display(),
                count = module.plugins.len(),
                chosen = %first.descriptor.name,
                "Module declares several plugins, using the first"
            );
            first
        }
        (all, AmbiguityPolicy::Reject) => {
            return Err(MetadataError::Ambiguous {
                path: path.to_path_buf(),
                count: all.len(),
            });
        }
    };

    let descriptor = &declaration.descriptor;
    let id = PluginId::parse(descriptor.id).map_err(|source| MetadataError::InvalidId {
        path: path.to_path_buf(),
        id: descriptor.id.to_string(),
        source,
    })?;

    Ok((
        declaration,
        PluginMetadata::from_descriptor(descriptor, id, path),
    ))
}
