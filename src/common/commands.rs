use serde::{Deserialize, Serialize};

/// Response of `/api/chat` when used to load or unload a model.
///
/// With an empty message list, Ollama only (un)loads the model and reports it
/// through `done_reason`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LifecycleResponse {
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub done: bool,
    /// `load` or `unload` on success.
    #[serde(default)]
    pub done_reason: Option<String>,
    /// Set by the proxy or Ollama when the request was refused.
    #[serde(default)]
    pub error: Option<String>,
}

/// Non-streamed response of `/api/generate`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerateResponse {
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub response: String,
    /// Number of generated tokens.
    #[serde(default)]
    pub eval_count: u64,
    /// Time spent generating, in nanoseconds.
    #[serde(default)]
    pub eval_duration: u64,
    #[serde(default)]
    pub prompt_eval_count: u64,
    /// Time spent on the prompt, in nanoseconds.
    #[serde(default)]
    pub prompt_eval_duration: u64,
    #[serde(default)]
    pub total_duration: u64,
    #[serde(default)]
    pub error: Option<String>,
}

impl GenerateResponse {
    /// Generation speed in tokens per second.
    pub fn tokens_per_second(&self) -> f64 {
        if self.eval_duration == 0 {
            return 0.0;
        }
        self.eval_count as f64 / (self.eval_duration as f64 / 1e9)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct VersionResponse {
    #[serde(default)]
    pub version: String,
}
