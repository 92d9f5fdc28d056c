//! Package directory discovery
//!
//! Candidates are the immediate subdirectories of the packages root. Only
//! those containing the update procedure file are returned; hidden
//! directories (`.git`, `.github`) are never considered.
//!
//! Package paths are always absolute: procedures, pushes and scans run with
//! the package directory as working directory and receive these paths as
//! arguments.

use crate::domain::PackageDirectory;
use crate::error::DiscoveryError;
use std::path::Path;
use tracing::debug;

/// Default update procedure file name
pub const DEFAULT_PROCEDURE_FILE: &str = "update.ps1";

/// Lists the package directories under `root` that have an update procedure,
/// sorted by name. A relative `root` is resolved against the current directory.
pub fn discover_packages(
    root: &Path,
    procedure_file: &str,
) -> Result<Vec<PackageDirectory>, DiscoveryError> {
    if !root.is_dir() {
        return Err(DiscoveryError::root_not_found(root));
    }
    let root = std::path::absolute(root).map_err(|e| DiscoveryError::read_error(root, e))?;

    let entries = std::fs::read_dir(&root).map_err(|e| DiscoveryError::read_error(&root, e))?;

    let mut packages = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| DiscoveryError::read_error(&root, e))?;
        let path = entry.path();
        if !path.is_dir() || is_hidden(&path) {
            continue;
        }

        let package = PackageDirectory::inspect(path, procedure_file);
        if package.has_update_procedure() {
            packages.push(package);
        } else {
            debug!(package = %package.name, "no {} found, skipping", procedure_file);
        }
    }

    packages.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(packages)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().starts_with('.'))
        .unwrap_or(false)
}
