use infollama_tui::common::{
    DeviceSnapshot, Gateway, GatewayError, GenerateResponse, LifecycleResponse, ModelDetail,
    ModelDetails, ModelSummary, PingSnapshot, RunningProcess, UserInfo,
};
use infollama_tui::dashboard::build_process_rows;
use infollama_tui::session::{OPEN_ACCESS_TOKEN, SessionStore};
use infollama_tui::state::Liveness;
use infollama_tui::sync::{BootstrapError, CycleKind, NoticeLevel, Orchestrator};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

const TOKEN: &str = "pro_alice_token_123";

/// Proxy double: `None` answers fail at the transport level.
#[derive(Default)]
struct FakeProxy {
    ping: Option<PingSnapshot>,
    tags: Option<Vec<ModelSummary>>,
    /// Calls answered with `{"error": "unauthorized"}` and a 401.
    refused: Vec<&'static str>,
    processes: Option<Vec<RunningProcess>>,
    device: Option<DeviceSnapshot>,
    version: Option<String>,
    details: HashMap<String, ModelDetail>,
    lifecycle: Option<LifecycleResponse>,
    calls: Vec<&'static str>,
}

#[derive(Default)]
struct FakeGateway {
    proxy: Mutex<FakeProxy>,
}

impl FakeGateway {
    fn healthy(user_name: &str, user_type: &str) -> Self {
        let proxy = FakeProxy {
            ping: Some(PingSnapshot {
                ping: true,
                user: UserInfo {
                    user_name: user_name.to_string(),
                    user_type: user_type.to_string(),
                },
                ollama_version: "0.3.12".to_string(),
                ..Default::default()
            }),
            tags: Some(vec![llama3()]),
            processes: Some(Vec::new()),
            device: Some(DeviceSnapshot {
                hostname: "atlas".to_string(),
                ..Default::default()
            }),
            version: Some("0.3.12".to_string()),
            ..Default::default()
        };
        Self {
            proxy: Mutex::new(proxy),
        }
    }

    fn with<R>(&self, f: impl FnOnce(&mut FakeProxy) -> R) -> R {
        f(&mut self.proxy.lock().unwrap())
    }

    fn count(&self, call: &str) -> usize {
        self.with(|p| p.calls.iter().filter(|c| **c == call).count())
    }

    fn answer<T: Clone>(
        &self,
        call: &'static str,
        path: &'static str,
        pick: impl FnOnce(&FakeProxy) -> Option<T>,
    ) -> Result<T, GatewayError> {
        self.with(|p| {
            p.calls.push(call);
            if p.refused.contains(&call) {
                return Err(GatewayError::Rejected {
                    path,
                    status: 401,
                    message: "unauthorized".to_string(),
                });
            }
            pick(p).ok_or_else(|| transport_error(path))
        })
    }
}

fn transport_error(path: &'static str) -> GatewayError {
    GatewayError::Transport {
        path,
        source: "connection refused".into(),
    }
}

fn llama3() -> ModelSummary {
    ModelSummary {
        name: "llama3:8b".to_string(),
        digest: "sha256:aaa".to_string(),
        size: 4_661_224_676,
        modified_at: "2024-05-01T10:00:00Z".to_string(),
        details: ModelDetails {
            family: "llama".to_string(),
            parameter_size: "8.0B".to_string(),
            quantization_level: "Q4_0".to_string(),
        },
    }
}

fn llama3_process() -> RunningProcess {
    RunningProcess {
        name: "llama3:8b".to_string(),
        digest: "sha256:aaa".to_string(),
        size: 6_000_000_000,
        size_vram: 6_000_000_000,
        expires_at: "2024-05-01T10:05:00Z".to_string(),
    }
}

impl Gateway for FakeGateway {
    async fn fetch_ping(&self, _token: &str) -> Result<PingSnapshot, GatewayError> {
        self.answer("ping", "/info/ping", |p| p.ping.clone())
    }

    async fn fetch_version(&self, _token: &str) -> Result<String, GatewayError> {
        self.answer("version", "/api/version", |p| p.version.clone())
    }

    async fn fetch_device(&self, _token: &str) -> Result<DeviceSnapshot, GatewayError> {
        self.answer("device", "/info/device", |p| p.device.clone())
    }

    async fn fetch_processes(&self, _token: &str) -> Result<Vec<RunningProcess>, GatewayError> {
        self.answer("ps", "/info/ps", |p| p.processes.clone())
    }

    async fn fetch_model_tags(&self, _token: &str) -> Result<Vec<ModelSummary>, GatewayError> {
        self.answer("tags", "/api/tags", |p| p.tags.clone())
    }

    async fn fetch_model_detail(
        &self,
        _token: &str,
        name: &str,
    ) -> Result<ModelDetail, GatewayError> {
        self.answer("show", "/api/show", |p| p.details.get(name).cloned())
    }

    async fn send_load_model(
        &self,
        _token: &str,
        _name: &str,
        _num_ctx: u32,
        _num_gpu: i32,
        _keep_alive: &str,
    ) -> Result<LifecycleResponse, GatewayError> {
        self.answer("load", "/api/chat", |p| p.lifecycle.clone())
    }

    async fn send_unload_model(
        &self,
        _token: &str,
        _name: &str,
    ) -> Result<LifecycleResponse, GatewayError> {
        self.answer("unload", "/api/chat", |p| p.lifecycle.clone())
    }

    async fn send_generate(
        &self,
        _token: &str,
        name: &str,
        _prompt: &str,
    ) -> Result<GenerateResponse, GatewayError> {
        self.answer("generate", "/api/generate", |_| {
            Some(GenerateResponse {
                model: name.to_string(),
                response: "Rayleigh scattering.".to_string(),
                eval_count: 40,
                eval_duration: 2_000_000_000,
                ..Default::default()
            })
        })
    }
}

fn orchestrator(gateway: FakeGateway) -> (Orchestrator<FakeGateway>, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let session = SessionStore::open(dir.path());
    (Orchestrator::new(gateway, session, 100), dir)
}

#[tokio::test]
async fn test_malformed_token_makes_no_request() {
    let (mut orchestrator, _dir) = orchestrator(FakeGateway::healthy("alice", "user"));

    let result = orchestrator.bootstrap("short").await;
    assert!(matches!(result, Err(BootstrapError::Token(_))));
    assert!(orchestrator.gateway().with(|p| p.calls.is_empty()));
    assert!(orchestrator.session().token().is_none());
}

#[tokio::test]
async fn test_login_loads_every_view() {
    let (mut orchestrator, dir) = orchestrator(FakeGateway::healthy("alice", "user"));

    let report = orchestrator.bootstrap(TOKEN).await.unwrap();
    let stale = report.stale;
    assert!(stale.software && stale.device && stale.models && stale.processes);
    assert!(report.failures.is_empty());

    let state = orchestrator.state();
    assert_eq!(state.models(), &[llama3()]);
    assert!(state.models_changed());
    assert_eq!(state.liveness(), Liveness::Up);
    assert_eq!(state.device().map(|d| d.hostname.as_str()), Some("atlas"));
    assert_eq!(state.ollama_version(), Some("0.3.12"));
    assert!(orchestrator.session().is_valid());

    // the token survives a restart
    assert_eq!(SessionStore::open(dir.path()).token(), Some(TOKEN));
}

#[tokio::test]
async fn test_unchanged_models_are_not_stale() {
    let (mut orchestrator, _dir) = orchestrator(FakeGateway::healthy("alice", "user"));
    orchestrator.bootstrap(TOKEN).await.unwrap();

    let report = orchestrator.refresh_cycle(CycleKind::Manual).await;
    assert!(!report.stale.models);
    assert!(!orchestrator.state().models_changed());
    // processes and device are redrawn on every cycle
    assert!(report.stale.processes);
    assert!(report.stale.device);
}

#[tokio::test]
async fn test_partial_failure_applies_the_rest() {
    let (mut orchestrator, _dir) = orchestrator(FakeGateway::healthy("alice", "user"));
    orchestrator.bootstrap(TOKEN).await.unwrap();

    orchestrator.gateway().with(|p| {
        p.refused.push("tags");
        p.processes = Some(vec![llama3_process()]);
        p.device = Some(DeviceSnapshot {
            hostname: "atlas-2".to_string(),
            ..Default::default()
        });
    });

    let report = orchestrator.refresh_cycle(CycleKind::Manual).await;
    assert_eq!(report.failures.len(), 1);
    assert!(!report.failures[0].is_transport());
    assert!(!report.proxy_unreachable);
    assert!(!report.stale.models);
    assert!(report.stale.processes);

    let state = orchestrator.state();
    // the cached list is kept
    assert_eq!(state.models().len(), 1);
    assert_eq!(state.processes(), &[llama3_process()]);
    assert_eq!(state.device().map(|d| d.hostname.as_str()), Some("atlas-2"));
}

#[tokio::test]
async fn test_unreachable_proxy_keeps_last_state() {
    let (mut orchestrator, _dir) = orchestrator(FakeGateway::healthy("alice", "user"));
    orchestrator.bootstrap(TOKEN).await.unwrap();

    orchestrator.gateway().with(|p| {
        p.ping = None;
        p.tags = None;
        p.processes = None;
        p.device = None;
    });

    let report = orchestrator.refresh_cycle(CycleKind::Heartbeat).await;
    assert!(report.proxy_unreachable);
    assert_eq!(report.failures.len(), 4);
    assert!(report.stale.is_empty());

    let state = orchestrator.state();
    assert_eq!(state.liveness(), Liveness::ProxyDown);
    assert_eq!(state.models().len(), 1);
    assert!(state.device().is_some());
}

#[tokio::test]
async fn test_upstream_down_is_not_unreachable() {
    let (mut orchestrator, _dir) = orchestrator(FakeGateway::healthy("alice", "user"));
    orchestrator.bootstrap(TOKEN).await.unwrap();

    orchestrator.gateway().with(|p| {
        if let Some(ping) = p.ping.as_mut() {
            ping.ping = false;
        }
    });

    let report = orchestrator.refresh_cycle(CycleKind::Heartbeat).await;
    assert!(!report.proxy_unreachable);
    assert_eq!(orchestrator.state().liveness(), Liveness::UpstreamDown);
}

#[tokio::test]
async fn test_heartbeat_cycle_pings() {
    let (mut orchestrator, _dir) = orchestrator(FakeGateway::healthy("alice", "user"));
    orchestrator.bootstrap(TOKEN).await.unwrap();
    assert_eq!(orchestrator.gateway().count("ping"), 1);

    orchestrator.refresh_cycle(CycleKind::Manual).await;
    assert_eq!(orchestrator.gateway().count("ping"), 1);

    let report = orchestrator.refresh_cycle(CycleKind::Heartbeat).await;
    assert_eq!(orchestrator.gateway().count("ping"), 2);
    assert!(report.stale.software);
    assert_eq!(orchestrator.gateway().count("tags"), 3);
}

#[tokio::test]
async fn test_refused_calls_keep_cached_data() {
    let (mut orchestrator, _dir) = orchestrator(FakeGateway::healthy("alice", "user"));
    orchestrator.bootstrap(TOKEN).await.unwrap();

    orchestrator
        .gateway()
        .with(|p| p.refused = vec!["ping", "tags", "ps", "device"]);

    let report = orchestrator.refresh_cycle(CycleKind::Heartbeat).await;
    assert_eq!(report.failures.len(), 4);
    assert!(report.failures.iter().all(|err| !err.is_transport()));
    // the proxy answered every call
    assert!(!report.proxy_unreachable);
    assert!(!report.stale.models);

    let state = orchestrator.state();
    assert_eq!(state.models(), &[llama3()]);
    assert_eq!(state.device().map(|d| d.hostname.as_str()), Some("atlas"));
    assert_eq!(state.liveness(), Liveness::Up);
}

#[tokio::test]
async fn test_login_reports_missing_views() {
    let gateway = FakeGateway::healthy("alice", "user");
    gateway.with(|p| p.device = None);
    let (mut orchestrator, _dir) = orchestrator(gateway);

    let report = orchestrator.bootstrap(TOKEN).await.unwrap();
    assert_eq!(report.failures.len(), 1);
    assert!(report.failures[0].is_transport());
    assert!(!report.proxy_unreachable);

    let state = orchestrator.state();
    assert_eq!(state.models(), &[llama3()]);
    assert!(state.device().is_none());
    assert!(orchestrator.session().is_valid());
}

#[tokio::test]
async fn test_refused_ping_fails_login() {
    let gateway = FakeGateway::healthy("alice", "user");
    gateway.with(|p| p.refused.push("ping"));
    let (mut orchestrator, dir) = orchestrator(gateway);

    let result = orchestrator.bootstrap(TOKEN).await;
    assert!(matches!(result, Err(BootstrapError::Refused(_))));
    assert!(!orchestrator.session().is_valid());
    assert!(SessionStore::open(dir.path()).token().is_none());
}

fn anonymous(gateway: &FakeGateway) {
    gateway.with(|p| {
        if let Some(ping) = p.ping.as_mut() {
            ping.user = UserInfo::default();
        }
    });
}

/// Orchestrator whose session directory already holds `TOKEN`.
fn orchestrator_with_stored_token(
    gateway: FakeGateway,
) -> (Orchestrator<FakeGateway>, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    SessionStore::open(dir.path()).set_token(TOKEN, 100).unwrap();
    let session = SessionStore::open(dir.path());
    assert_eq!(session.token(), Some(TOKEN));
    (Orchestrator::new(gateway, session, 100), dir)
}

#[tokio::test]
async fn test_startup_forgets_a_stored_token_the_proxy_no_longer_knows() {
    let gateway = FakeGateway::healthy("alice", "user");
    anonymous(&gateway);
    let (mut orchestrator, dir) = orchestrator_with_stored_token(gateway);

    let ping = orchestrator.probe().await.unwrap();
    assert!(ping.user.is_anonymous());
    assert!(orchestrator.session().token().is_none());
    assert!(SessionStore::open(dir.path()).token().is_none());
}

#[tokio::test]
async fn test_refused_stored_token_is_forgotten_at_login() {
    let gateway = FakeGateway::healthy("alice", "user");
    anonymous(&gateway);
    let (mut orchestrator, dir) = orchestrator_with_stored_token(gateway);

    let result = orchestrator.bootstrap(TOKEN).await;
    assert!(matches!(result, Err(BootstrapError::Anonymous)));
    assert!(orchestrator.session().token().is_none());
    assert!(SessionStore::open(dir.path()).token().is_none());
}

#[tokio::test]
async fn test_accepted_stored_token_is_kept_at_startup() {
    let (mut orchestrator, dir) =
        orchestrator_with_stored_token(FakeGateway::healthy("alice", "user"));

    orchestrator.probe().await.unwrap();
    assert_eq!(orchestrator.session().token(), Some(TOKEN));
    assert_eq!(SessionStore::open(dir.path()).token(), Some(TOKEN));
}

#[tokio::test]
async fn test_anonymous_token_is_refused() {
    let gateway = FakeGateway::healthy("alice", "user");
    gateway.with(|p| {
        if let Some(ping) = p.ping.as_mut() {
            ping.user = UserInfo::default();
        }
    });
    let (mut orchestrator, dir) = orchestrator(gateway);

    let result = orchestrator.bootstrap(TOKEN).await;
    assert!(matches!(result, Err(BootstrapError::Anonymous)));
    assert!(!orchestrator.session().is_valid());
    assert!(SessionStore::open(dir.path()).token().is_none());
    // nothing else was fetched
    assert_eq!(orchestrator.gateway().count("tags"), 0);
}

#[tokio::test]
async fn test_open_proxy_token_is_not_persisted() {
    let (mut orchestrator, dir) = orchestrator(FakeGateway::healthy("openbar", "user"));

    orchestrator.bootstrap(OPEN_ACCESS_TOKEN).await.unwrap();
    assert!(orchestrator.session().is_valid());
    assert_eq!(orchestrator.session().token(), Some(OPEN_ACCESS_TOKEN));
    assert!(SessionStore::open(dir.path()).token().is_none());
}

#[tokio::test]
async fn test_unreachable_proxy_fails_login() {
    let gateway = FakeGateway::healthy("alice", "user");
    gateway.with(|p| p.ping = None);
    let (mut orchestrator, _dir) = orchestrator(gateway);

    let result = orchestrator.bootstrap(TOKEN).await;
    assert!(matches!(result, Err(BootstrapError::Unreachable(_))));
    assert_eq!(orchestrator.state().liveness(), Liveness::ProxyDown);
}

#[tokio::test]
async fn test_details_are_fetched_once() {
    let gateway = FakeGateway::healthy("alice", "user");
    gateway.with(|p| {
        p.details.insert(
            "llama3:8b".to_string(),
            ModelDetail {
                architecture: Some("llama".to_string()),
                context_length: Some(8192),
                ..Default::default()
            },
        );
    });
    let (mut orchestrator, _dir) = orchestrator(gateway);
    orchestrator.bootstrap(TOKEN).await.unwrap();

    assert_eq!(orchestrator.prefetch_details().await, 1);
    assert_eq!(orchestrator.prefetch_details().await, 0);
    assert_eq!(orchestrator.gateway().count("show"), 1);
    assert_eq!(
        orchestrator
            .state()
            .model_detail("llama3:8b")
            .and_then(|d| d.context_length),
        Some(8192)
    );
}

#[tokio::test]
async fn test_failed_detail_is_retried() {
    let (mut orchestrator, _dir) = orchestrator(FakeGateway::healthy("alice", "user"));
    orchestrator.bootstrap(TOKEN).await.unwrap();

    assert_eq!(orchestrator.prefetch_details().await, 0);
    orchestrator.gateway().with(|p| {
        p.details
            .insert("llama3:8b".to_string(), ModelDetail::default());
    });
    assert_eq!(orchestrator.prefetch_details().await, 1);
    assert_eq!(orchestrator.gateway().count("show"), 2);
}

#[tokio::test(start_paused = true)]
async fn test_unload_refreshes_processes_after_settling() {
    let gateway = FakeGateway::healthy("alice", "user");
    gateway.with(|p| p.processes = Some(vec![llama3_process()]));
    let (mut orchestrator, _dir) = orchestrator(gateway);
    orchestrator.bootstrap(TOKEN).await.unwrap();
    assert_eq!(orchestrator.state().highlight_set().len(), 1);

    orchestrator.gateway().with(|p| {
        p.lifecycle = Some(LifecycleResponse {
            model: "llama3:8b".to_string(),
            done: true,
            done_reason: Some("unload".to_string()),
            error: None,
        });
        p.processes = Some(Vec::new());
    });

    let start = tokio::time::Instant::now();
    let notice = orchestrator.unload_model("llama3:8b").await;
    assert_eq!(notice.level, NoticeLevel::Success);
    assert_eq!(notice.message, "Model llama3:8b unloaded");

    let due = orchestrator.settle_due().unwrap();
    assert_eq!(due - start, Duration::from_secs(1));
    // the process list is not re-read before the delay
    assert_eq!(orchestrator.gateway().count("ps"), 1);

    tokio::time::sleep_until(due).await;
    let stale = orchestrator.settle_processes().await;
    assert!(stale.processes);
    assert!(orchestrator.settle_due().is_none());

    let (title, rows) = build_process_rows(orchestrator.state());
    assert_eq!(title, "No Model Running");
    assert!(rows.iter().all(|row| row.digest != "sha256:aaa"));
    assert!(orchestrator.state().highlight_set().is_empty());
}

#[tokio::test]
async fn test_unexpected_lifecycle_answer_still_settles() {
    let (mut orchestrator, _dir) = orchestrator(FakeGateway::healthy("alice", "user"));
    orchestrator.bootstrap(TOKEN).await.unwrap();

    orchestrator.gateway().with(|p| {
        p.lifecycle = Some(LifecycleResponse {
            error: Some("model not found".to_string()),
            ..Default::default()
        });
    });

    let notice = orchestrator.load_model("llama3:8b", 2048, -1, "5m").await;
    assert_eq!(notice.level, NoticeLevel::Warning);
    assert!(orchestrator.settle_due().is_some());
}

#[tokio::test]
async fn test_refused_lifecycle_still_settles() {
    let (mut orchestrator, _dir) = orchestrator(FakeGateway::healthy("alice", "user"));
    orchestrator.bootstrap(TOKEN).await.unwrap();
    orchestrator.gateway().with(|p| p.refused.push("load"));

    let notice = orchestrator.load_model("llama3:8b", 2048, -1, "5m").await;
    assert_eq!(notice.level, NoticeLevel::Warning);
    assert_eq!(notice.message, "llama3:8b: unauthorized");
    assert!(orchestrator.settle_due().is_some());
}

#[tokio::test]
async fn test_failed_lifecycle_schedules_nothing() {
    let (mut orchestrator, _dir) = orchestrator(FakeGateway::healthy("alice", "user"));
    orchestrator.bootstrap(TOKEN).await.unwrap();

    let notice = orchestrator.unload_model("llama3:8b").await;
    assert_eq!(notice.level, NoticeLevel::Error);
    assert!(orchestrator.settle_due().is_none());
}

#[tokio::test]
async fn test_generate_leaves_state_alone() {
    let (mut orchestrator, _dir) = orchestrator(FakeGateway::healthy("alice", "user"));
    orchestrator.bootstrap(TOKEN).await.unwrap();

    let response = orchestrator
        .generate("llama3:8b", "Why is the sky blue?")
        .await
        .unwrap();
    assert_eq!(response.tokens_per_second(), 20.0);
    assert!(orchestrator.settle_due().is_none());
}

#[tokio::test]
async fn test_logout_forgets_everything() {
    let (mut orchestrator, dir) = orchestrator(FakeGateway::healthy("alice", "user"));
    orchestrator.bootstrap(TOKEN).await.unwrap();

    orchestrator.logout().unwrap();
    assert!(!orchestrator.session().is_valid());
    assert!(orchestrator.session().token().is_none());
    assert!(orchestrator.state().models().is_empty());
    assert!(orchestrator.state().is_first_load());
    assert!(SessionStore::open(dir.path()).token().is_none());
}
