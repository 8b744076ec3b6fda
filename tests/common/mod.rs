//! Common test utilities for editgate integration tests.
//!
//! Provides `TestEnv` for isolated test environments that don't read the
//! user's config or write to `~/.local/share/editgate/`.

#![allow(dead_code)]

use assert_cmd::Command;
use std::path::{Path, PathBuf};
pub use tempfile::TempDir;

/// A test environment with isolated directories.
///
/// - `work_dir`: working directory of every `eg` invocation, and therefore
///   the default allowed root
/// - `config_dir`: system config location (via `EG_CONFIG_DIR`)
/// - `data_dir`: action log location (via `EG_DATA_DIR`)
pub struct TestEnv {
    pub work_dir: TempDir,
    pub config_dir: TempDir,
    pub data_dir: TempDir,
}

impl TestEnv {
    pub fn new() -> Self {
        Self {
            work_dir: TempDir::new().unwrap(),
            config_dir: TempDir::new().unwrap(),
            data_dir: TempDir::new().unwrap(),
        }
    }

    /// Get a Command for the eg binary with isolated directories.
    ///
    /// Variables that could leak in from the developer's shell are cleared
    /// per-command for parallel safety.
    pub fn eg(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_eg"));
        cmd.current_dir(self.work_dir.path());
        cmd.env("EG_CONFIG_DIR", self.config_dir.path());
        cmd.env("EG_DATA_DIR", self.data_dir.path());
        cmd.env_remove("EG_CONFIG");
        cmd.env_remove("EG_ACTION_LOG");
        cmd.env_remove("EG_PENDING_TTL_SECS");
        cmd.env_remove("EG_LOG");
        cmd
    }

    pub fn path(&self) -> &Path {
        self.work_dir.path()
    }

    pub fn data_path(&self) -> &Path {
        self.data_dir.path()
    }

    pub fn config_path(&self) -> &Path {
        self.config_dir.path()
    }

    /// Write a file under the working directory and return its path.
    pub fn write_file(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.work_dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, contents).unwrap();
        path
    }

    /// Write a file with `count` numbered lines ("line 1\n" ...).
    pub fn numbered_file(&self, name: &str, count: usize) -> PathBuf {
        let contents: String = (1..=count).map(|i| format!("line {}\n", i)).collect();
        self.write_file(name, &contents)
    }

    pub fn read(&self, name: &str) -> String {
        std::fs::read_to_string(self.work_dir.path().join(name)).unwrap()
    }

    /// Run `eg` with `args`, assert success, and parse stdout as JSON.
    pub fn json(&self, args: &[&str]) -> serde_json::Value {
        let output = self.eg().args(args).output().unwrap();
        assert!(
            output.status.success(),
            "eg {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
        serde_json::from_slice(&output.stdout).unwrap()
    }

    /// Current version token of `name`.
    pub fn version_token(&self, name: &str) -> String {
        self.json(&["version-token", name])["version_token"]
            .as_str()
            .unwrap()
            .to_string()
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}
