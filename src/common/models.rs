use serde::{Deserialize, Serialize};

/// An installed model as listed by `/api/tags`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSummary {
    /// Model name with tag, e.g. `llama3:8b`.
    pub name: String,
    /// Content hash of the model artifact; joins against [`RunningProcess::digest`].
    pub digest: String,
    /// File size in bytes.
    #[serde(default)]
    pub size: u64,
    /// ISO 8601 timestamp of the last pull.
    #[serde(default)]
    pub modified_at: String,
    #[serde(default)]
    pub details: ModelDetails,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDetails {
    #[serde(default)]
    pub family: String,
    #[serde(default)]
    pub parameter_size: String,
    #[serde(default)]
    pub quantization_level: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct TagsResponse {
    pub models: Vec<ModelSummary>,
}

/// A model currently loaded in memory, from `/info/ps`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunningProcess {
    pub name: String,
    pub digest: String,
    /// Total memory used by the model, in bytes.
    #[serde(default)]
    pub size: u64,
    /// Part of `size` that lives in VRAM.
    #[serde(default)]
    pub size_vram: u64,
    /// When the model will be evicted, as reported by the proxy.
    #[serde(default, alias = "expires_in")]
    pub expires_at: String,
}

impl RunningProcess {
    /// Share of the model held on GPU, as a rounded percentage.
    pub fn gpu_percent(&self) -> u16 {
        if self.size == 0 {
            return 0;
        }
        ((self.size_vram as f64 / self.size as f64) * 100.0).round() as u16
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ProcessesResponse {
    pub models: Vec<RunningProcess>,
}

/// Raw `/api/show` payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ShowResponse {
    #[serde(default)]
    pub model_info: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub parameters: Option<String>,
    #[serde(default)]
    pub system: Option<String>,
    #[serde(default)]
    pub template: Option<String>,
    #[serde(default)]
    pub license: Option<String>,
    #[serde(default)]
    pub details: ModelDetails,
}

/// Detailed configuration of a model, fetched once per name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelDetail {
    pub architecture: Option<String>,
    pub parameters: Option<String>,
    pub system_prompt: Option<String>,
    pub template: String,
    /// Default context length in tokens.
    pub context_length: Option<u64>,
    pub license: Option<String>,
    pub languages: Vec<String>,
    pub details: ModelDetails,
}

impl From<ShowResponse> for ModelDetail {
    fn from(show: ShowResponse) -> Self {
        let info = &show.model_info;
        let architecture = info
            .get("general.architecture")
            .and_then(|v| v.as_str())
            .map(str::to_string);
        let context_length = architecture
            .as_deref()
            .and_then(|arch| info.get(&format!("{arch}.context_length")))
            .and_then(|v| v.as_u64());
        let license = info
            .get("general.license")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .or(show.license);
        let languages = info
            .get("general.languages")
            .and_then(|v| v.as_array())
            .map(|langs| {
                langs
                    .iter()
                    .filter_map(|l| l.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        Self {
            architecture,
            parameters: show.parameters,
            system_prompt: show.system,
            template: show.template.unwrap_or_default(),
            context_length,
            license,
            languages,
            details: show.details,
        }
    }
}
