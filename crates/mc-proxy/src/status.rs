//! The contract the out-of-scope GUI collaborator presents to the core.
//! The supervisor only ever talks to a [`StatusSink`]; the GUI itself is
//! not part of this crate.

use tracing::info;

/// Status codes published to the external GUI collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    NotRunning,
    ServerUnreachable,
    AwaitingClient,
    StatusPing,
    LoggingIn,
    Playing,
}

impl StatusCode {
    #[must_use]
    pub fn as_i32(self) -> i32 {
        match self {
            StatusCode::NotRunning => -2,
            StatusCode::ServerUnreachable => -1,
            StatusCode::AwaitingClient => 0,
            StatusCode::StatusPing => 1,
            StatusCode::LoggingIn => 2,
            StatusCode::Playing => 3,
        }
    }
}

pub trait StatusSink: Send + Sync {
    fn set_status(&self, status: StatusCode);
}

/// Default sink: logs transitions. Stands in for the GUI's status label.
#[derive(Debug, Default)]
pub struct TracingStatusSink;

impl StatusSink for TracingStatusSink {
    fn set_status(&self, status: StatusCode) {
        info!(code = status.as_i32(), "status changed to {:?}", status);
    }
}
