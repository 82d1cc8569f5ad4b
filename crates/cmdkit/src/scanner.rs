//! Directory listing for module roots

use crate::error::ScanError;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Lists files and directories below a root
///
/// Order must be deterministic: name-sorted, depth-first, with a directory's
/// contents listed right after the directory itself.
pub trait PathScanner: Send + Sync {
    /// Files directly in `dir`, or at any depth when `nested`
    fn files(&self, dir: &Path, nested: bool) -> Result<Vec<PathBuf>, ScanError>;

    /// Directories directly in `dir`, or at any depth when `nested`
    fn folders(&self, dir: &Path, nested: bool) -> Result<Vec<PathBuf>, ScanError>;
}

/// [`PathScanner`] over the real filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct FsScanner;

impl FsScanner {
    fn walk(
        dir: &Path,
        nested: bool,
        keep: impl Fn(&walkdir::DirEntry) -> bool,
    ) -> Result<Vec<PathBuf>, ScanError> {
        let max_depth = if nested { usize::MAX } else { 1 };
        let mut paths = Vec::new();

        for entry in WalkDir::new(dir)
            .min_depth(1)
            .max_depth(max_depth)
            .follow_links(true)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| ScanError {
                path: e
                    .path()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| dir.to_path_buf()),
                message: e.to_string(),
            })?;
            if keep(&entry) {
                paths.push(entry.into_path());
            }
        }

        Ok(paths)
    }
}

impl PathScanner for FsScanner {
    fn files(&self, dir: &Path, nested: bool) -> Result<Vec<PathBuf>, ScanError> {
        Self::walk(dir, nested, |e| e.file_type().is_file())
    }

    fn folders(&self, dir: &Path, nested: bool) -> Result<Vec<PathBuf>, ScanError> {
        Self::walk(dir, nested, |e| e.file_type().is_dir())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, "").unwrap();
    }

    #[test]
    fn test_files_nested_order() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        touch(&root.join("b.toml"));
        touch(&root.join("a.toml"));
        touch(&root.join("info/ping.toml"));
        touch(&root.join("info/deep/stats.toml"));

        let files = FsScanner.files(root, true).unwrap();
        let relative: Vec<_> = files
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_path_buf())
            .collect();

        assert_eq!(
            relative,
            vec![
                PathBuf::from("a.toml"),
                PathBuf::from("b.toml"),
                PathBuf::from("info/deep/stats.toml"),
                PathBuf::from("info/ping.toml"),
            ]
        );
    }

    #[test]
    fn test_files_flat_skips_subdirectories() {
        let temp = TempDir::new().unwrap();
        touch(&temp.path().join("top.json"));
        touch(&temp.path().join("sub/inner.json"));

        let files = FsScanner.files(temp.path(), false).unwrap();
        assert_eq!(files, vec![temp.path().join("top.json")]);
    }

    #[test]
    fn test_folders() {
        let temp = TempDir::new().unwrap();
        touch(&temp.path().join("ready/log.toml"));
        touch(&temp.path().join("messageCreate/nested/x.toml"));
        touch(&temp.path().join("stray.toml"));

        let folders = FsScanner.folders(temp.path(), false).unwrap();
        assert_eq!(
            folders,
            vec![temp.path().join("messageCreate"), temp.path().join("ready")]
        );

        let all = FsScanner.folders(temp.path(), true).unwrap();
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let temp = TempDir::new().unwrap();
        let err = FsScanner
            .files(&temp.path().join("nope"), true)
            .unwrap_err();
        assert!(err.path.ends_with("nope"));
    }
}
