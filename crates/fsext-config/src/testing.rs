//! Test environment abstraction for isolated testing.
//!
//! Provides `TestEnvironment` to manage:
//! - An isolated scratch directory
//! - Lock and log file paths for cross-process tests
//! - File, directory and symlink helpers
//!
//! # Usage
//!
//! ```ignore
//! use fsext_config::testing::TestEnvironment;
//!
//! #[test]
//! fn test_something() {
//!     let env = TestEnvironment::new().unwrap();
//!     let file = env.create_file("data.bin", b"abc").unwrap();
//! }
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use tempfile::TempDir;

/// Atomic counter for unique test IDs
static TEST_COUNTER: AtomicU32 = AtomicU32::new(0);

/// Isolated test environment with unique paths
pub struct TestEnvironment {
    /// Temporary directory (dropped on cleanup)
    _temp_dir: TempDir,
    /// Root of the scratch tree
    pub root: PathBuf,
    /// Lock file shared by cooperating processes
    pub lock_path: PathBuf,
    /// Append-only log written by cooperating processes
    pub log_path: PathBuf,
    /// Unique test ID
    pub test_id: u32,
}

impl TestEnvironment {
    /// Create a new isolated test environment
    pub fn new() -> anyhow::Result<Self> {
        let test_id = TEST_COUNTER.fetch_add(1, Ordering::Relaxed);
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path().to_path_buf();

        let lock_path = root.join(format!("fsext-test-{}.lock", test_id));
        let log_path = root.join(format!("fsext-test-{}.log", test_id));

        Ok(Self {
            _temp_dir: temp_dir,
            root,
            lock_path,
            log_path,
            test_id,
        })
    }

    /// Absolute path of `relative_path` inside the scratch tree
    pub fn path(&self, relative_path: &str) -> PathBuf {
        self.root.join(relative_path)
    }

    /// Create a test file with content
    pub fn create_file(&self, relative_path: &str, content: &[u8]) -> anyhow::Result<PathBuf> {
        let path = self.path(relative_path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, content)?;
        Ok(path)
    }

    /// Create a test directory
    pub fn create_dir(&self, relative_path: &str) -> anyhow::Result<PathBuf> {
        let path = self.path(relative_path);
        std::fs::create_dir_all(&path)?;
        Ok(path)
    }

    /// Create a symbolic link at `relative_path` whose stored target is
    /// `target`, verbatim (relative targets stay relative).
    #[cfg(unix)]
    pub fn create_symlink(
        &self,
        target: impl AsRef<Path>,
        relative_path: &str,
    ) -> anyhow::Result<PathBuf> {
        let path = self.path(relative_path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::os::unix::fs::symlink(target, &path)?;
        Ok(path)
    }

    /// Lines of the shared log, trimmed, blank lines dropped
    pub fn log_lines(&self) -> anyhow::Result<Vec<String>> {
        let contents = std::fs::read_to_string(&self.log_path)?;
        Ok(contents
            .lines()
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty())
            .collect())
    }
}

impl Default for TestEnvironment {
    fn default() -> Self {
        Self::new().expect("Failed to create test environment")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_creates_root() {
        let env = TestEnvironment::new().unwrap();
        assert!(env.root.exists());
        assert!(env.lock_path.starts_with(&env.root));
    }

    #[test]
    fn test_environment_has_unique_paths() {
        let env1 = TestEnvironment::new().unwrap();
        let env2 = TestEnvironment::new().unwrap();
        assert_ne!(env1.lock_path, env2.lock_path);
        assert_ne!(env1.test_id, env2.test_id);
    }

    #[test]
    fn test_create_file() {
        let env = TestEnvironment::new().unwrap();
        let path = env.create_file("dir/data.txt", b"hello").unwrap();
        assert!(path.exists());
        assert_eq!(std::fs::read(&path).unwrap(), b"hello");
    }

    #[cfg(unix)]
    #[test]
    fn test_create_symlink_keeps_relative_target() {
        let env = TestEnvironment::new().unwrap();
        env.create_file("dir/target.txt", b"x").unwrap();
        let link = env.create_symlink("target.txt", "dir/link").unwrap();
        assert_eq!(std::fs::read_link(&link).unwrap(), PathBuf::from("target.txt"));
    }

    #[test]
    fn test_log_lines() {
        let env = TestEnvironment::new().unwrap();
        std::fs::write(&env.log_path, "first\n\n  second \n").unwrap();
        assert_eq!(env.log_lines().unwrap(), vec!["first", "second"]);
    }
}
