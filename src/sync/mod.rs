//! Keeping the [`StateMirror`](crate::state::StateMirror) in step with the proxy.

mod orchestrator;
pub use orchestrator::*;

mod heartbeat;
pub use heartbeat::*;

mod commands;
pub use commands::*;

use crate::common::GatewayError;
use crate::session::{SessionError, TokenError};
use std::time::Instant;

/// Which refresh is running: the heartbeat also pings the proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleKind {
    Manual,
    Heartbeat,
}

/// Views whose backing data changed and must be rebuilt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StaleViews {
    /// Header and software/network panel (ping data).
    pub software: bool,
    pub device: bool,
    pub models: bool,
    pub processes: bool,
}

impl StaleViews {
    pub fn all() -> Self {
        Self {
            software: true,
            device: true,
            models: true,
            processes: true,
        }
    }

    pub fn processes() -> Self {
        Self {
            processes: true,
            ..Default::default()
        }
    }

    pub fn merge(&mut self, other: StaleViews) {
        self.software |= other.software;
        self.device |= other.device;
        self.models |= other.models;
        self.processes |= other.processes;
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Outcome of one refresh cycle.
#[derive(Debug, Default)]
pub struct CycleReport {
    pub stale: StaleViews,
    /// Calls of the batch that failed; the others were applied.
    pub failures: Vec<GatewayError>,
    /// Every call of the batch failed at the transport level.
    pub proxy_unreachable: bool,
}

/// Login did not go through.
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error("This token is not recognized by the proxy.")]
    Anonymous,
    #[error("Proxy seems to be down: {0}")]
    Unreachable(#[source] GatewayError),
    #[error("Proxy refused the login: {0}")]
    Refused(#[source] GatewayError),
    #[error(transparent)]
    Session(#[from] SessionError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A short message shown in the status bar.
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
    pub created_at: Instant,
}

impl Notice {
    pub fn new(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            created_at: Instant::now(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Info, message)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Success, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Error, message)
    }
}
