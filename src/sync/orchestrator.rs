use super::{BootstrapError, CycleKind, CycleReport, StaleViews};
use crate::common::{
    DeviceSnapshot, Gateway, GatewayError, ModelSummary, PingSnapshot, RunningProcess,
};
use crate::session::{SessionStore, validate_token};
use crate::state::StateMirror;
use std::collections::VecDeque;
use tokio::time::Instant;

/// Owner of the session, the gateway and the state mirror.
///
/// All server data flows through here: fetched payloads are applied to the
/// mirror and each operation tells which views went stale.
#[derive(Debug)]
pub struct Orchestrator<G> {
    pub(super) gateway: G,
    pub(super) session: SessionStore,
    pub(super) state: StateMirror,
    /// Lifetime of a stored token, in days.
    token_ttl_days: i64,
    /// Deadlines of the process refreshes scheduled by lifecycle commands.
    pub(super) settle_queue: VecDeque<Instant>,
}

impl<G: Gateway> Orchestrator<G> {
    pub fn new(gateway: G, session: SessionStore, token_ttl_days: i64) -> Self {
        Self {
            gateway,
            session,
            state: StateMirror::new(),
            token_ttl_days,
            settle_queue: VecDeque::new(),
        }
    }

    pub fn state(&self) -> &StateMirror {
        &self.state
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Token sent with every request; empty before login.
    pub(super) fn token(&self) -> &str {
        self.session.token().unwrap_or_default()
    }

    /// Ping the proxy with the stored token, if any.
    ///
    /// Used at startup to find out whether a stored token is still accepted and
    /// whether the proxy is open to anonymous access.
    pub async fn probe(&mut self) -> Result<PingSnapshot, GatewayError> {
        let result = self.gateway.fetch_ping(self.token()).await;
        match result {
            Ok(ping) => {
                self.state.apply_ping(Ok(ping.clone()));
                if ping.user.is_anonymous() && self.session.token().is_some() {
                    tracing::warn!("Stored token is no longer accepted, forgetting it");
                    if let Err(err) = self.session.clear() {
                        tracing::error!("Could not clear the session: {}", err);
                    }
                }
                Ok(ping)
            }
            Err(err) => {
                self.state.apply_ping(Err(&err));
                Err(err)
            }
        }
    }

    /// Log in with `candidate` and load the first snapshot of every view.
    ///
    /// A badly formatted token is refused before any request is made, and a
    /// token the proxy does not recognize is forgotten. On success, every view
    /// is stale and the report lists the initial fetches that failed; detail
    /// prefetch and the heartbeat are left to the caller so that the first
    /// render is not delayed by them.
    pub async fn bootstrap(&mut self, candidate: &str) -> Result<CycleReport, BootstrapError> {
        validate_token(candidate)?;

        let ping = match self.gateway.fetch_ping(candidate).await {
            Ok(ping) => {
                self.state.apply_ping(Ok(ping.clone()));
                ping
            }
            Err(err) => {
                self.state.apply_ping(Err(&err));
                return Err(if err.is_transport() {
                    BootstrapError::Unreachable(err)
                } else {
                    BootstrapError::Refused(err)
                });
            }
        };

        if ping.user.is_anonymous() {
            tracing::warn!("Proxy refused the token");
            self.session.clear()?;
            return Err(BootstrapError::Anonymous);
        }

        if ping.user.is_open() {
            tracing::info!("Proxy is open, skipping token storage");
            self.session.adopt(candidate);
        } else {
            self.session.set_token(candidate, self.token_ttl_days)?;
        }
        self.session.set_valid(true);
        tracing::info!(
            "Logged in as {} ({})",
            ping.user.user_name,
            ping.user.user_type
        );

        let token = self.token();
        let (models, processes, device, version) = tokio::join!(
            self.gateway.fetch_model_tags(token),
            self.gateway.fetch_processes(token),
            self.gateway.fetch_device(token),
            self.gateway.fetch_version(token),
        );

        let mut report = CycleReport::default();
        self.apply_models(models, &mut report);
        self.apply_processes(processes, &mut report);
        self.apply_device(device, &mut report);
        match version {
            Ok(version) => self.state.apply_version(version),
            Err(err) => tracing::debug!("Could not read Ollama version: {}", err),
        }

        report.stale = StaleViews::all();
        Ok(report)
    }

    /// Fetch models, processes and device (plus ping on heartbeats) concurrently
    /// and apply whatever succeeded.
    ///
    /// Failures never clear cached data. When the whole batch fails at the
    /// transport level, the proxy is marked unreachable.
    pub async fn refresh_cycle(&mut self, kind: CycleKind) -> CycleReport {
        let token = self.token();
        let with_ping = kind == CycleKind::Heartbeat;
        let (ping, models, processes, device) = tokio::join!(
            async {
                if with_ping {
                    Some(self.gateway.fetch_ping(token).await)
                } else {
                    None
                }
            },
            self.gateway.fetch_model_tags(token),
            self.gateway.fetch_processes(token),
            self.gateway.fetch_device(token),
        );

        let mut report = CycleReport::default();
        let mut attempted = 3;
        if let Some(ping) = ping {
            attempted += 1;
            self.apply_ping(ping, &mut report);
        }
        self.apply_models(models, &mut report);
        self.apply_processes(processes, &mut report);
        self.apply_device(device, &mut report);

        if report.failures.len() == attempted && report.failures.iter().all(|e| e.is_transport()) {
            tracing::error!("Proxy seems to be down, keeping the last known state");
            report.proxy_unreachable = true;
            self.state.mark_unreachable();
        }

        report
    }

    /// Fetch and cache the detail of every installed model that has none yet.
    ///
    /// Returns the number of details cached; failed fetches are retried on the
    /// next call.
    pub async fn prefetch_details(&mut self) -> usize {
        let names = self.state.missing_details();
        if names.is_empty() {
            return 0;
        }

        let token = self.token();
        let results = futures::future::join_all(
            names
                .iter()
                .map(|name| self.gateway.fetch_model_detail(token, name)),
        )
        .await;

        let mut cached = 0;
        for (name, result) in names.iter().zip(results) {
            match result {
                Ok(detail) => {
                    if self.state.cache_model_detail(name, detail) {
                        cached += 1;
                    }
                }
                Err(err) => tracing::warn!("Could not fetch details of {}: {}", name, err),
            }
        }
        tracing::debug!("Cached details of {}/{} models", cached, names.len());
        cached
    }

    /// Forget the session and everything fetched with it.
    pub fn logout(&mut self) -> Result<(), BootstrapError> {
        self.session.clear()?;
        self.state = StateMirror::new();
        self.settle_queue.clear();
        tracing::info!("Logged out");
        Ok(())
    }

    fn apply_ping(&mut self, result: Result<PingSnapshot, GatewayError>, report: &mut CycleReport) {
        match result {
            Ok(ping) => {
                self.state.apply_ping(Ok(ping));
                report.stale.software = true;
            }
            Err(err) => {
                tracing::warn!("Ping failed: {}", err);
                self.state.apply_ping(Err(&err));
                report.failures.push(err);
            }
        }
    }

    fn apply_models(
        &mut self,
        result: Result<Vec<ModelSummary>, GatewayError>,
        report: &mut CycleReport,
    ) {
        match result {
            Ok(models) => {
                if self.state.apply_models(models) {
                    tracing::debug!("Model list changed");
                    report.stale.models = true;
                }
            }
            Err(err) => {
                tracing::warn!("Failed to refresh models: {}", err);
                report.failures.push(err);
            }
        }
    }

    pub(super) fn apply_processes(
        &mut self,
        result: Result<Vec<RunningProcess>, GatewayError>,
        report: &mut CycleReport,
    ) {
        match result {
            Ok(processes) => {
                self.state.apply_processes(processes);
                report.stale.processes = true;
            }
            Err(err) => {
                tracing::warn!("Failed to refresh running models: {}", err);
                report.failures.push(err);
            }
        }
    }

    fn apply_device(
        &mut self,
        result: Result<DeviceSnapshot, GatewayError>,
        report: &mut CycleReport,
    ) {
        match result {
            Ok(device) => {
                self.state.apply_device(device);
                report.stale.device = true;
            }
            Err(err) => {
                tracing::warn!("Failed to refresh device: {}", err);
                report.failures.push(err);
            }
        }
    }
}
