use std::path::Path;

use serde::{Deserialize, Serialize};

/// Gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Maximum file size for uploads (in bytes)
    #[serde(default = "default_max_upload_size")]
    pub max_upload_size: u64,

    /// File name suffixes that offer the live follow view
    #[serde(default = "default_follow_suffixes")]
    pub follow_suffixes: Vec<String>,

    /// Program spawned to follow a file; the file path is appended to `follow_args`
    #[serde(default = "default_follow_program")]
    pub follow_program: String,

    #[serde(default = "default_follow_args")]
    pub follow_args: Vec<String>,

    /// Frames buffered per session before new output is dropped
    #[serde(default = "default_frame_queue_depth")]
    pub frame_queue_depth: usize,
}

fn default_max_upload_size() -> u64 {
    100 * 1024 * 1024 * 1024 // 100 GiB
}

fn default_follow_suffixes() -> Vec<String> {
    vec![".log".to_string()]
}

fn default_follow_program() -> String {
    "tail".to_string()
}

fn default_follow_args() -> Vec<String> {
    vec!["-f".to_string()]
}

fn default_frame_queue_depth() -> usize {
    64
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_upload_size: default_max_upload_size(),
            follow_suffixes: default_follow_suffixes(),
            follow_program: default_follow_program(),
            follow_args: default_follow_args(),
            frame_queue_depth: default_frame_queue_depth(),
        }
    }
}

impl Config {
    /// Load config from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Check if a file name qualifies for the follow view
    pub fn is_followable(&self, name: &str) -> bool {
        let lower = name.to_lowercase();
        self.follow_suffixes
            .iter()
            .any(|suffix| lower.ends_with(&suffix.to_lowercase()))
    }
}
