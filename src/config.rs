use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

const CONFIG_FILE: &str = "infollama.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub api_host: String,
    pub api_port: u16,
    /// Seconds between two background refreshes.
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,
    /// Days a stored token stays valid.
    #[serde(default = "default_token_ttl_days")]
    pub token_ttl_days: i64,
    /// Context length requested when loading a model.
    #[serde(default = "default_num_ctx")]
    pub num_ctx: u32,
    /// Layers to offload on GPU when loading, negative lets Ollama decide.
    #[serde(default = "default_num_gpu")]
    pub num_gpu: i32,
    /// How long a loaded model stays in memory, in Ollama duration syntax.
    #[serde(default = "default_keep_alive")]
    pub keep_alive: String,
    /// Prompt prefilled in the test generation box.
    #[serde(default = "default_test_prompt")]
    pub test_prompt: String,
}

#[inline(always)]
#[rustfmt::skip]
fn default_heartbeat_secs() -> u64  { 10 }
#[inline(always)]
#[rustfmt::skip]
fn default_token_ttl_days() -> i64  { 100 }
#[inline(always)]
#[rustfmt::skip]
fn default_num_ctx() -> u32         { 2048 }
#[inline(always)]
#[rustfmt::skip]
fn default_num_gpu() -> i32         { -1 }
#[inline(always)]
#[rustfmt::skip]
fn default_keep_alive() -> String   { "5m".to_string() }
#[inline(always)]
#[rustfmt::skip]
fn default_test_prompt() -> String  { "Why is the sky blue? Answer in one sentence.".to_string() }

impl Default for Config {
    fn default() -> Self {
        Self {
            api_host: "127.0.0.1".to_string(),
            api_port: 11430,
            heartbeat_secs: default_heartbeat_secs(),
            token_ttl_days: default_token_ttl_days(),
            num_ctx: default_num_ctx(),
            num_gpu: default_num_gpu(),
            keep_alive: default_keep_alive(),
            test_prompt: default_test_prompt(),
        }
    }
}

impl Config {
    /// Load config from either current directory or `~/.infollama/` directory
    pub fn load() -> color_eyre::Result<Self> {
        // try current directory first
        let local_path = PathBuf::from(CONFIG_FILE);
        if local_path.exists() {
            let content = fs::read_to_string(&local_path)?;
            let config: Config = serde_json::from_str(&content)?;
            return Ok(config);
        }

        // try ~/.infollama/ directory
        let home_path = Self::data_dir().join(CONFIG_FILE);
        if home_path.exists() {
            let content = fs::read_to_string(&home_path)?;
            let config: Config = serde_json::from_str(&content)?;
            return Ok(config);
        }

        // if neither exists, create default config in current directory
        let config = Self::default();
        let content = serde_json::to_string_pretty(&config)?;
        fs::write(&local_path, content)?;
        Ok(config)
    }

    /// Get the path to `$HOME/.infollama`, which also holds the session and logs.
    ///
    /// FIXME: this is not cross-platform
    pub fn data_dir() -> PathBuf {
        let mut path = match std::env::var("HOME") {
            Ok(home) => PathBuf::from(home),
            Err(_) => PathBuf::from("."),
        };
        path.push(".infollama");
        path
    }

    /// Get the full API URL, `http://{host}:{port}` format
    pub fn api_url(&self) -> String {
        format!("http://{}:{}", self.api_host, self.api_port)
    }

    pub fn heartbeat_period(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs.max(1))
    }
}
