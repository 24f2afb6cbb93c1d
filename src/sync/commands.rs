use super::{CycleReport, Notice, Orchestrator, StaleViews};
use crate::common::{Gateway, GatewayError, GenerateResponse, LifecycleResponse};
use std::time::Duration;
use tokio::time::Instant;

/// Time the proxy needs before its process list reflects a load or unload.
pub const PROCESS_SETTLE_DELAY: Duration = Duration::from_secs(1);

impl<G: Gateway> Orchestrator<G> {
    /// Ask the model server to load `name` in memory.
    pub async fn load_model(
        &mut self,
        name: &str,
        num_ctx: u32,
        num_gpu: i32,
        keep_alive: &str,
    ) -> Notice {
        tracing::info!("Loading {} (num_ctx={}, num_gpu={})", name, num_ctx, num_gpu);
        let result = self
            .gateway
            .send_load_model(self.token(), name, num_ctx, num_gpu, keep_alive)
            .await;
        self.lifecycle_notice(name, "load", "loaded", result)
    }

    /// Ask the model server to evict `name` from memory.
    pub async fn unload_model(&mut self, name: &str) -> Notice {
        tracing::info!("Unloading {}", name);
        let result = self.gateway.send_unload_model(self.token(), name).await;
        self.lifecycle_notice(name, "unload", "unloaded", result)
    }

    /// Run a test generation; nothing is stored in the mirror.
    pub async fn generate(&self, name: &str, prompt: &str) -> Result<GenerateResponse, Notice> {
        match self.gateway.send_generate(self.token(), name, prompt).await {
            Ok(response) => match response.error {
                Some(error) => Err(Notice::error(format!("{}: {}", name, error))),
                None => {
                    tracing::info!(
                        "Generated {} tokens with {} at {:.1} tokens/s",
                        response.eval_count,
                        name,
                        response.tokens_per_second()
                    );
                    Ok(response)
                }
            },
            Err(err) => {
                tracing::warn!("Generation with {} failed: {}", name, err);
                Err(Notice::error(format!("Generation failed: {}", err)))
            }
        }
    }

    /// Whenever the proxy answered, whatever it said, re-read its process list
    /// shortly after.
    fn lifecycle_notice(
        &mut self,
        name: &str,
        action: &str,
        done: &str,
        result: Result<LifecycleResponse, GatewayError>,
    ) -> Notice {
        match result {
            Ok(response) => {
                self.settle_queue
                    .push_back(Instant::now() + PROCESS_SETTLE_DELAY);

                match (response.done_reason.as_deref(), response.error) {
                    (Some(reason), _) if reason == action => {
                        Notice::success(format!("Model {} {}", name, done))
                    }
                    (_, Some(error)) => Notice::warning(format!("{}: {}", name, error)),
                    (reason, None) => Notice::warning(format!(
                        "Unexpected answer while trying to {} {} ({})",
                        action,
                        name,
                        reason.unwrap_or("no reason given")
                    )),
                }
            }
            Err(err) if !err.is_transport() => {
                tracing::warn!("Proxy answered {} {} with an error: {}", action, name, err);
                self.settle_queue
                    .push_back(Instant::now() + PROCESS_SETTLE_DELAY);
                match err {
                    GatewayError::Rejected { message, .. } => {
                        Notice::warning(format!("{}: {}", name, message))
                    }
                    other => Notice::warning(format!(
                        "Unexpected answer while trying to {} {} ({})",
                        action, name, other
                    )),
                }
            }
            Err(err) => {
                tracing::warn!("Failed to {} {}: {}", action, name, err);
                Notice::error(format!("Failed to {} {}: {}", action, name, err))
            }
        }
    }

    /// Deadline of the earliest scheduled process refresh.
    pub fn settle_due(&self) -> Option<Instant> {
        self.settle_queue.front().copied()
    }

    /// Run the earliest scheduled process refresh.
    pub async fn settle_processes(&mut self) -> StaleViews {
        if self.settle_queue.pop_front().is_none() {
            return StaleViews::default();
        }

        let result = self.gateway.fetch_processes(self.token()).await;
        let mut report = CycleReport::default();
        self.apply_processes(result, &mut report);
        report.stale
    }
}
