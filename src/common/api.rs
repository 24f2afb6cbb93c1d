use crate::common::{
    DeviceSnapshot, GenerateResponse, LifecycleResponse, ModelDetail, ModelSummary, PingSnapshot,
    RunningProcess,
};
use crate::common::{ProcessesResponse, ShowResponse, TagsResponse, VersionResponse};
use serde::de::DeserializeOwned;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failure of a gateway call.
///
/// An HTTP error status is not a failure by itself: the proxy reports refused
/// tokens inside a regular JSON body, so any body matching the expected shape
/// is returned to the caller. An `{"error": ...}` body on an error status is
/// a [`GatewayError::Rejected`].
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The request never got a response (connection refused, DNS, reset...).
    #[error("request to {path} failed: {source}")]
    Transport {
        path: &'static str,
        #[source]
        source: BoxError,
    },
    /// A response arrived but its body does not match the expected schema.
    #[error("unexpected response from {path} (HTTP {status}): {source}")]
    Decode {
        path: &'static str,
        status: u16,
        #[source]
        source: serde_json::Error,
    },
    /// The proxy or the model server answered with an error message.
    #[error("{path} refused the request (HTTP {status}): {message}")]
    Rejected {
        path: &'static str,
        status: u16,
        message: String,
    },
}

/// Body of an error answer, e.g. `{"error": "unauthorized"}`.
#[derive(Debug, serde::Deserialize)]
struct ErrorBody {
    error: String,
}

impl GatewayError {
    pub fn is_transport(&self) -> bool {
        matches!(self, GatewayError::Transport { .. })
    }
}

/// Typed access to the proxy endpoints.
///
/// Every call carries the bearer token explicitly so that login can try a
/// candidate token before it is stored. Implementations must not touch any
/// local state.
#[allow(async_fn_in_trait)]
pub trait Gateway {
    async fn fetch_ping(&self, token: &str) -> Result<PingSnapshot, GatewayError>;

    async fn fetch_version(&self, token: &str) -> Result<String, GatewayError>;

    async fn fetch_device(&self, token: &str) -> Result<DeviceSnapshot, GatewayError>;

    async fn fetch_processes(&self, token: &str) -> Result<Vec<RunningProcess>, GatewayError>;

    async fn fetch_model_tags(&self, token: &str) -> Result<Vec<ModelSummary>, GatewayError>;

    async fn fetch_model_detail(&self, token: &str, name: &str)
    -> Result<ModelDetail, GatewayError>;

    /// Load `name` in memory; `num_gpu < 0` lets Ollama decide the offloaded layers.
    async fn send_load_model(
        &self,
        token: &str,
        name: &str,
        num_ctx: u32,
        num_gpu: i32,
        keep_alive: &str,
    ) -> Result<LifecycleResponse, GatewayError>;

    async fn send_unload_model(
        &self,
        token: &str,
        name: &str,
    ) -> Result<LifecycleResponse, GatewayError>;

    async fn send_generate(
        &self,
        token: &str,
        name: &str,
        prompt: &str,
    ) -> Result<GenerateResponse, GatewayError>;
}

/// [`Gateway`] over HTTP.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl Default for ApiClient {
    fn default() -> Self {
        ApiClient::new("http://127.0.0.1:11430")
    }
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        ApiClient {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &'static str,
        token: &str,
    ) -> Result<T, GatewayError> {
        let request = self.client.get(format!("{}{}", self.base_url, path));
        self.send(path, request, token).await
    }

    async fn post<T: DeserializeOwned>(
        &self,
        path: &'static str,
        token: &str,
        body: &serde_json::Value,
    ) -> Result<T, GatewayError> {
        let request = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .json(body);
        self.send(path, request, token).await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        path: &'static str,
        request: reqwest::RequestBuilder,
        token: &str,
    ) -> Result<T, GatewayError> {
        let transport = |e: reqwest::Error| GatewayError::Transport {
            path,
            source: Box::new(e),
        };

        let response = request
            .bearer_auth(token)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        let body = response.bytes().await.map_err(transport)?;

        if !status.is_success() {
            tracing::debug!("{} answered with HTTP {}", path, status);
            if let Ok(ErrorBody { error }) = serde_json::from_slice(&body) {
                return Err(GatewayError::Rejected {
                    path,
                    status: status.as_u16(),
                    message: error,
                });
            }
        }
        serde_json::from_slice(&body).map_err(|source| GatewayError::Decode {
            path,
            status: status.as_u16(),
            source,
        })
    }
}

impl Gateway for ApiClient {
    async fn fetch_ping(&self, token: &str) -> Result<PingSnapshot, GatewayError> {
        self.get("/info/ping", token).await
    }

    async fn fetch_version(&self, token: &str) -> Result<String, GatewayError> {
        let version: VersionResponse = self.get("/api/version", token).await?;
        Ok(version.version)
    }

    async fn fetch_device(&self, token: &str) -> Result<DeviceSnapshot, GatewayError> {
        self.get("/info/device", token).await
    }

    async fn fetch_processes(&self, token: &str) -> Result<Vec<RunningProcess>, GatewayError> {
        let ps: ProcessesResponse = self.get("/info/ps", token).await?;
        Ok(ps.models)
    }

    async fn fetch_model_tags(&self, token: &str) -> Result<Vec<ModelSummary>, GatewayError> {
        let tags: TagsResponse = self.get("/api/tags", token).await?;
        Ok(tags.models)
    }

    async fn fetch_model_detail(
        &self,
        token: &str,
        name: &str,
    ) -> Result<ModelDetail, GatewayError> {
        let body = serde_json::json!({ "model": name });
        let show: ShowResponse = self.post("/api/show", token, &body).await?;
        Ok(show.into())
    }

    async fn send_load_model(
        &self,
        token: &str,
        name: &str,
        num_ctx: u32,
        num_gpu: i32,
        keep_alive: &str,
    ) -> Result<LifecycleResponse, GatewayError> {
        let mut options = serde_json::json!({ "num_ctx": num_ctx });
        if num_gpu >= 0 {
            options["num_gpu"] = num_gpu.into();
        }
        let body = serde_json::json!({
            "model": name,
            "messages": [],
            "keep_alive": keep_alive,
            "options": options,
        });
        self.post("/api/chat", token, &body).await
    }

    async fn send_unload_model(
        &self,
        token: &str,
        name: &str,
    ) -> Result<LifecycleResponse, GatewayError> {
        let body = serde_json::json!({
            "model": name,
            "messages": [],
            "keep_alive": 0,
        });
        self.post("/api/chat", token, &body).await
    }

    async fn send_generate(
        &self,
        token: &str,
        name: &str,
        prompt: &str,
    ) -> Result<GenerateResponse, GatewayError> {
        let body = serde_json::json!({
            "model": name,
            "prompt": prompt,
            "stream": false,
        });
        self.post("/api/generate", token, &body).await
    }
}
