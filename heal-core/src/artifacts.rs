//! DOM snapshots, screenshots and run logs written during healing.
use chrono::Utc;
use heal_common::{HealError, Result};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};

pub const DOM_SNAPSHOT_DIR: &str = "dom_snapshots";
pub const SCREENSHOT_DIR: &str = "screenshots";
pub const RUN_LOG_DIR: &str = "run_logs";

const UNSAFE_KEY_CHARS: &str = r"[^A-Za-z0-9_.-]";

/// File layout under one artifact root.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
    dom_root: PathBuf,
    screenshot_root: PathBuf,
    run_log_root: PathBuf,
    unsafe_key_chars: Regex,
}

impl ArtifactStore {
    /// Create the root and its three subdirectories.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let unsafe_key_chars = Regex::new(UNSAFE_KEY_CHARS)
            .map_err(|e| HealError::Healing(format!("artifact key pattern: {e}")))?;
        let store = Self {
            dom_root: root.join(DOM_SNAPSHOT_DIR),
            screenshot_root: root.join(SCREENSHOT_DIR),
            run_log_root: root.join(RUN_LOG_DIR),
            root,
            unsafe_key_chars,
        };
        for dir in [&store.dom_root, &store.screenshot_root, &store.run_log_root] {
            fs::create_dir_all(dir)?;
        }
        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// UTC stamp shared by every artifact of one healing attempt.
    ///
    /// Two attempts for the same key within one second produce the same file
    /// names; the later one overwrites.
    pub fn timestamp() -> String {
        Utc::now().format("%Y%m%dT%H%M%SZ").to_string()
    }

    pub fn write_dom_snapshot(&self, key: &str, page_source: &str, stamp: &str) -> Result<PathBuf> {
        let path = self
            .dom_root
            .join(format!("{stamp}_{}.html", self.file_key(key)));
        fs::write(&path, page_source)?;
        Ok(path)
    }

    /// Where the screenshot for `key` goes; the driver writes the bytes.
    pub fn screenshot_path(&self, key: &str, stamp: &str) -> PathBuf {
        self.screenshot_root
            .join(format!("{stamp}_{}.png", self.file_key(key)))
    }

    /// `key` with everything outside `[A-Za-z0-9_.-]` replaced by `_`.
    fn file_key(&self, key: &str) -> String {
        self.unsafe_key_chars.replace_all(key, "_").into_owned()
    }

    pub fn write_run_log(&self, message: &str, stamp: &str) -> Result<PathBuf> {
        let path = self.run_log_root.join(format!("{stamp}.log"));
        fs::write(&path, message)?;
        Ok(path)
    }
}
