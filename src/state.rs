//! In-memory mirror of the proxy state.
//!
//! The mirror holds the latest snapshot of every polled endpoint. It is only
//! written through the `apply_*` methods, each of which touches its own fields,
//! so fetches of one refresh cycle may be applied in any order.

use crate::common::{
    DeviceSnapshot, GatewayError, ModelDetail, ModelSummary, PingSnapshot, RunningProcess,
};
use std::collections::{HashMap, HashSet};

/// What the last ping told us about the proxy and the model server behind it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Liveness {
    /// No ping has completed yet.
    #[default]
    Unknown,
    /// Proxy and model server both answer.
    Up,
    /// The proxy answers but cannot reach the model server.
    UpstreamDown,
    /// The proxy itself does not answer.
    ProxyDown,
}

impl Liveness {
    pub fn describe(&self) -> &'static str {
        match self {
            Liveness::Unknown => "Waiting for the proxy",
            Liveness::Up => "Proxy and Ollama servers are up",
            Liveness::UpstreamDown => "Ollama server is down",
            Liveness::ProxyDown => "Proxy is down",
        }
    }
}

#[derive(Debug)]
pub struct StateMirror {
    ping: Option<PingSnapshot>,
    liveness: Liveness,
    device: Option<DeviceSnapshot>,
    /// Installed models, in server order.
    models: Vec<ModelSummary>,
    /// Details by model name; never invalidated.
    details: HashMap<String, ModelDetail>,
    processes: Vec<RunningProcess>,
    /// Version reported by `/api/version`.
    ollama_version: Option<String>,
    /// Whether the last applied model list differed from the previous one.
    models_changed: bool,
    /// Set until the first model list is applied.
    first_load: bool,
}

impl Default for StateMirror {
    fn default() -> Self {
        Self {
            ping: None,
            liveness: Liveness::Unknown,
            device: None,
            models: Vec::new(),
            details: HashMap::new(),
            processes: Vec::new(),
            ollama_version: None,
            models_changed: true,
            first_load: true,
        }
    }
}

impl StateMirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of a ping.
    ///
    /// A failed call keeps the previous snapshot so that the last known identity
    /// and configuration stay on screen. Only a transport failure marks the
    /// proxy down.
    pub fn apply_ping(&mut self, result: Result<PingSnapshot, &GatewayError>) -> Liveness {
        match result {
            Ok(snapshot) => {
                self.liveness = if snapshot.ping {
                    Liveness::Up
                } else {
                    Liveness::UpstreamDown
                };
                self.ping = Some(snapshot);
            }
            Err(err) if err.is_transport() => self.liveness = Liveness::ProxyDown,
            // the proxy answered, it is just refusing this call
            Err(_) => {}
        }
        self.liveness
    }

    pub fn mark_unreachable(&mut self) {
        self.liveness = Liveness::ProxyDown;
    }

    pub fn apply_device(&mut self, device: DeviceSnapshot) {
        self.device = Some(device);
    }

    /// Store a fetched model list and tell whether it differs from the cached one.
    ///
    /// The comparison is by value over the whole list, order included: a
    /// reordered list counts as a change since the table shows server order.
    pub fn apply_models(&mut self, models: Vec<ModelSummary>) -> bool {
        let changed = self.first_load || models != self.models;
        if changed {
            self.models = models;
        }
        self.models_changed = changed;
        self.first_load = false;
        changed
    }

    pub fn apply_version(&mut self, version: String) {
        self.ollama_version = Some(version);
    }

    pub fn apply_processes(&mut self, processes: Vec<RunningProcess>) {
        self.processes = processes;
    }

    /// Cache the detail of `name`; the first stored detail wins.
    ///
    /// Returns whether the detail was stored.
    pub fn cache_model_detail(&mut self, name: &str, detail: ModelDetail) -> bool {
        if self.details.contains_key(name) {
            return false;
        }
        self.details.insert(name.to_string(), detail);
        true
    }

    /// Digests of installed models that are currently running.
    pub fn highlight_set(&self) -> HashSet<String> {
        let running: HashSet<&str> = self.processes.iter().map(|p| p.digest.as_str()).collect();
        self.models
            .iter()
            .filter(|m| running.contains(m.digest.as_str()))
            .map(|m| m.digest.clone())
            .collect()
    }

    /// Names of installed models whose detail is not cached yet.
    pub fn missing_details(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.models
            .iter()
            .filter(|m| !self.details.contains_key(&m.name) && seen.insert(m.name.as_str()))
            .map(|m| m.name.clone())
            .collect()
    }

    pub fn ping(&self) -> Option<&PingSnapshot> {
        self.ping.as_ref()
    }

    pub fn liveness(&self) -> Liveness {
        self.liveness
    }

    pub fn device(&self) -> Option<&DeviceSnapshot> {
        self.device.as_ref()
    }

    pub fn models(&self) -> &[ModelSummary] {
        &self.models
    }

    pub fn model(&self, name: &str) -> Option<&ModelSummary> {
        self.models.iter().find(|m| m.name == name)
    }

    pub fn model_detail(&self, name: &str) -> Option<&ModelDetail> {
        self.details.get(name)
    }

    pub fn processes(&self) -> &[RunningProcess] {
        &self.processes
    }

    /// Ollama version, preferring the one carried by the last ping.
    pub fn ollama_version(&self) -> Option<&str> {
        self.ping
            .as_ref()
            .map(|p| p.ollama_version.as_str())
            .filter(|v| !v.is_empty())
            .or(self.ollama_version.as_deref())
    }

    pub fn models_changed(&self) -> bool {
        self.models_changed
    }

    pub fn is_first_load(&self) -> bool {
        self.first_load
    }

    /// Disk space used by all installed models.
    pub fn total_model_size(&self) -> u64 {
        self.models.iter().map(|m| m.size).sum()
    }

    /// Memory used by all running models.
    pub fn total_process_size(&self) -> u64 {
        self.processes.iter().map(|p| p.size).sum()
    }
}
