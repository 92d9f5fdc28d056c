//! Package directory type

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File extension of a produced package archive
pub const ARTIFACT_EXTENSION: &str = "nupkg";

/// One subdirectory of the packages root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageDirectory {
    /// Absolute or root-relative path of the directory
    pub path: PathBuf,
    /// Directory name, used as the package name when the procedure omits one
    pub name: String,
    /// Path of the update procedure file, if the directory has one
    pub procedure: Option<PathBuf>,
}

impl PackageDirectory {
    /// Inspects a directory for the given update procedure file name
    pub fn inspect(path: impl Into<PathBuf>, procedure_file: &str) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let candidate = path.join(procedure_file);
        let procedure = candidate.is_file().then_some(candidate);

        Self {
            path,
            name,
            procedure,
        }
    }

    /// Returns true if the directory contains an update procedure
    pub fn has_update_procedure(&self) -> bool {
        self.procedure.is_some()
    }

    /// Lists package archives currently present in the directory, sorted by path
    pub fn existing_artifacts(&self) -> Vec<PathBuf> {
        list_artifacts(&self.path)
    }
}

/// Lists `*.nupkg` files directly inside `dir`, sorted by path
pub fn list_artifacts(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut artifacts: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_artifact(path))
        .collect();
    artifacts.sort();
    artifacts
}

/// Returns true if the path has the package archive extension (case-insensitive)
pub fn is_artifact(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case(ARTIFACT_EXTENSION))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_inspect_with_procedure() {
        let dir = tempfile::tempdir().unwrap();
        let pkg_dir = dir.path().join("beta");
        fs::create_dir(&pkg_dir).unwrap();
        fs::write(pkg_dir.join("update.ps1"), "").unwrap();

        let pkg = PackageDirectory::inspect(&pkg_dir, "update.ps1");
        assert_eq!(pkg.name, "beta");
        assert!(pkg.has_update_procedure());
        assert_eq!(pkg.procedure, Some(pkg_dir.join("update.ps1")));
    }

    #[test]
    fn test_inspect_without_procedure() {
        let dir = tempfile::tempdir().unwrap();
        let pkg_dir = dir.path().join("alpha");
        fs::create_dir(&pkg_dir).unwrap();

        let pkg = PackageDirectory::inspect(&pkg_dir, "update.ps1");
        assert_eq!(pkg.name, "alpha");
        assert!(!pkg.has_update_procedure());
    }

    #[test]
    fn test_procedure_must_be_a_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("update.ps1")).unwrap();

        let pkg = PackageDirectory::inspect(dir.path(), "update.ps1");
        assert!(!pkg.has_update_procedure());
    }

    #[test]
    fn test_existing_artifacts_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.1.0.nupkg"), "x").unwrap();
        fs::write(dir.path().join("a.1.0.NUPKG"), "x").unwrap();
        fs::write(dir.path().join("b.nuspec"), "x").unwrap();

        let pkg = PackageDirectory::inspect(dir.path(), "update.ps1");
        let artifacts = pkg.existing_artifacts();
        assert_eq!(
            artifacts,
            vec![dir.path().join("a.1.0.NUPKG"), dir.path().join("b.1.0.nupkg")]
        );
    }

    #[test]
    fn test_list_artifacts_missing_dir() {
        assert!(list_artifacts(Path::new("/definitely/not/here")).is_empty());
    }
}
