#![allow(dead_code)]
use assert_cmd::Command;
use std::path::PathBuf;
use tempfile::TempDir;

pub struct TestEnv {
    _dir: TempDir,
    pub cfg: PathBuf,
    pub data: PathBuf,
    pub history: PathBuf,
    pub settings: PathBuf,
}

impl TestEnv {
    pub fn new() -> Self {
        Self::with_settings("")
    }

    /// `extra` is appended after the `[storage]` table.
    pub fn with_settings(extra: &str) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg = dir.path().join("config");
        let data = dir.path().join("data");
        std::fs::create_dir_all(&cfg).expect("cfg dir");
        let history = dir.path().join("history.json");
        let settings = dir.path().join("settings.toml");
        std::fs::write(
            &settings,
            format!(
                "[storage]\nbackend = \"json\"\npath = {:?}\n{}",
                history.to_string_lossy(),
                extra
            ),
        )
        .expect("settings");
        Self {
            _dir: dir,
            cfg,
            data,
            history,
            settings,
        }
    }

    /// Talks to the store directly; no daemon is involved.
    pub fn bin(&self) -> Command {
        let mut cmd = self.bin_no_local();
        cmd.arg("--local");
        cmd
    }

    pub fn bin_no_local(&self) -> Command {
        let mut cmd = Command::cargo_bin("clipstack").unwrap();
        cmd.env("XDG_CONFIG_HOME", &self.cfg);
        cmd.env("XDG_DATA_HOME", &self.data);
        cmd.env("CLIPSTACK_CONFIG", &self.settings);
        cmd.env_remove("RUST_LOG");
        cmd
    }

    /// Add `text` and return its id.
    pub fn add(&self, text: &str) -> String {
        let out = self
            .bin()
            .arg("add")
            .write_stdin(text)
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        String::from_utf8(out)
            .unwrap()
            .trim()
            .trim_start_matches("added ")
            .to_string()
    }

    pub fn list_json(&self) -> Vec<serde_json::Value> {
        let out = self
            .bin()
            .args(["list", "--json"])
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        serde_json::from_slice::<serde_json::Value>(&out)
            .unwrap()
            .as_array()
            .unwrap()
            .clone()
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}
