//! User-supplied provider override definitions.
//!
//! An override directory holds one YAML file per dependency name
//! (`<name>.yml` or `<name>.yaml`). Definitions found here take precedence
//! over everything else in the resolution chain, so a project can replace a
//! built-in provider wholesale or describe dependencies this crate has
//! never heard of.

use crate::error::{CairnError, Result};
use crate::provider::declared::{DeclaredProvider, ProviderSpec};
use crate::provider::Provider;
use std::path::Path;
use std::sync::Arc;

/// Load the override definition for a dependency name, if one exists.
pub fn load(dir: &Path, name: &str) -> Result<Option<Arc<dyn Provider>>> {
    for extension in ["yml", "yaml"] {
        let path = dir.join(format!("{name}.{extension}"));
        if !path.is_file() {
            continue;
        }
        let contents = std::fs::read_to_string(&path)?;
        let mut spec: ProviderSpec =
            serde_yaml::from_str(&contents).map_err(|err| CairnError::Config {
                message: format!("{}: {err}", path.display()),
            })?;
        // The filename is authoritative for the dependency name.
        spec.name = name.to_lowercase();
        return Ok(Some(Arc::new(DeclaredProvider::new(spec))));
    }
    Ok(None)
}

/// Names of every definition present in an override directory, sorted.
pub fn available(dir: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .filter_map(|e| e.ok())
        .filter_map(|e| {
            let path = e.path();
            let extension = path.extension()?.to_str()?;
            if extension == "yml" || extension == "yaml" {
                Some(path.file_stem()?.to_string_lossy().to_lowercase())
            } else {
                None
            }
        })
        .collect();
    names.sort();
    names.dedup();
    names
}
