//! Center directory discovery.

use std::path::{Path, PathBuf};

use crate::error::{IngestError, Result};
use crate::tables::TableKind;

/// Lists the immediate subdirectories of `root` that hold a patients table.
///
/// Returns directories sorted by name.
pub fn discover_center_dirs(root: &Path) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(IngestError::DirectoryNotFound {
            path: root.to_path_buf(),
        });
    }

    let entries = std::fs::read_dir(root).map_err(|e| IngestError::DirectoryRead {
        path: root.to_path_buf(),
        source: e,
    })?;

    let mut dirs = Vec::new();
    for entry_result in entries {
        let entry = entry_result.map_err(|e| IngestError::DirectoryRead {
            path: root.to_path_buf(),
            source: e,
        })?;
        let path = entry.path();
        if path.is_dir() && path.join(TableKind::Patients.file_name()).is_file() {
            dirs.push(path);
        }
    }

    dirs.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    tracing::debug!(root = %root.display(), centers = dirs.len(), "discovered center directories");
    Ok(dirs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_discovers_only_dirs_with_patients() {
        let root = TempDir::new().unwrap();
        for name in ["center_b", "center_a", "notes"] {
            std::fs::create_dir(root.path().join(name)).unwrap();
        }
        for name in ["center_b", "center_a"] {
            std::fs::write(
                root.path().join(name).join("patients_baseline.csv"),
                "center_code,module,patient_code\n",
            )
            .unwrap();
        }
        std::fs::write(root.path().join("patients_baseline.csv"), "x\n").unwrap();

        let dirs = discover_center_dirs(root.path()).unwrap();
        let names: Vec<_> = dirs
            .iter()
            .map(|d| d.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["center_a", "center_b"]);
    }

    #[test]
    fn test_missing_root() {
        let result = discover_center_dirs(Path::new("/nonexistent/centers"));
        assert!(matches!(result, Err(IngestError::DirectoryNotFound { .. })));
    }
}
