use anyhow::Context;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// The filesystem operations a replay is allowed to perform.
pub trait SkeletonFs: Send + Sync {
    /// Removes `root` if present and recreates it empty.
    fn reset_root(&self, root: &Path) -> anyhow::Result<()>;
    /// Creates a directory and any missing parents, existing is fine.
    fn create_dir(&self, path: &Path) -> io::Result<()>;
    /// Creates an empty file, truncating anything already there.
    fn touch(&self, path: &Path) -> io::Result<()>;
}

#[derive(Debug, Clone, Default)]
pub struct OsFileSystem {
    dry_run: bool,
}

impl OsFileSystem {
    pub fn new(dry_run: bool) -> Self {
        Self { dry_run }
    }
}

impl SkeletonFs for OsFileSystem {
    fn reset_root(&self, root: &Path) -> anyhow::Result<()> {
        if self.dry_run {
            debug!("Dry run: would recreate directory {root:?}");
            return Ok(());
        }
        if root.exists() {
            fs::remove_dir_all(root).with_context(|| format!("Unable to remove directory {root:?}"))?;
        }
        fs::create_dir_all(root).with_context(|| format!("Unable to create directory {root:?}"))?;
        debug!("Recreated {root:?}");
        Ok(())
    }

    fn create_dir(&self, path: &Path) -> io::Result<()> {
        if self.dry_run {
            debug!("Dry run: would create directory {path:?}");
            return Ok(());
        }
        fs::create_dir_all(path)
    }

    fn touch(&self, path: &Path) -> io::Result<()> {
        if self.dry_run {
            debug!("Dry run: would create empty file {path:?}");
            return Ok(());
        }
        File::create(path).map(|_| ())
    }
}

/// Every file below `root`, sorted. Unreadable directories are skipped.
pub fn walk_files(root: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    if !root.exists() || !root.is_dir() {
        return files;
    }
    scan_dir_recursively(&mut files, root);
    files.sort();
    files
}

fn scan_dir_recursively(files: &mut Vec<PathBuf>, dir_path: &Path) {
    let Ok(dir_reader) = fs::read_dir(dir_path) else {
        debug!("Unable to read directory: {dir_path:?}");
        return;
    };
    for dir_entry in dir_reader {
        let Ok(dir_entry) = dir_entry else {
            continue;
        };
        let path = dir_entry.path();
        if path.is_file() {
            files.push(path);
        } else if path.is_dir() {
            scan_dir_recursively(files, &path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_root_clears_old_content() -> anyhow::Result<()> {
        crate::test_util::setup_log();
        let dir = tempfile::tempdir()?;
        let root = dir.path().join("out");
        fs::create_dir_all(root.join("old/nested"))?;
        fs::write(root.join("old/nested/file.txt"), "x")?;

        let os_fs = OsFileSystem::new(false);
        os_fs.reset_root(&root)?;
        assert!(root.is_dir());
        assert_eq!(fs::read_dir(&root)?.count(), 0);
        Ok(())
    }

    #[test]
    fn test_touch_truncates() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let file = dir.path().join("a.mkv");
        fs::write(&file, "content")?;
        OsFileSystem::new(false).touch(&file)?;
        assert_eq!(fs::metadata(&file)?.len(), 0);
        Ok(())
    }

    #[test]
    fn test_dry_run_does_nothing() -> anyhow::Result<()> {
        crate::test_util::setup_log();
        let dir = tempfile::tempdir()?;
        let root = dir.path().join("out");
        let os_fs = OsFileSystem::new(true);
        os_fs.reset_root(&root)?;
        os_fs.create_dir(&root.join("A"))?;
        os_fs.touch(&root.join("A/b.mkv"))?;
        assert!(!root.exists());
        Ok(())
    }

    #[test]
    fn test_walk_files() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        fs::create_dir_all(dir.path().join("b/c"))?;
        fs::write(dir.path().join("b/c/2.mkv"), "")?;
        fs::write(dir.path().join("1.nfo"), "")?;
        let files = walk_files(dir.path());
        assert_eq!(
            files,
            vec![dir.path().join("1.nfo"), dir.path().join("b/c/2.mkv")]
        );
        assert!(walk_files(&dir.path().join("missing")).is_empty());
        Ok(())
    }
}
