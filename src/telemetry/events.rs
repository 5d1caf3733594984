use std::fmt;
use std::time::Duration;

#[cfg(feature = "telemetry-json")]
use serde_json::json;

/// Events emitted by the client core.
///
/// These describe admission decisions, request outcomes, batch completion and cache
/// maintenance. They feed a [`TelemetrySink`](super::TelemetrySink) and carry no
/// credentials or record payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// Rate limiter decisions
    Admission(AdmissionEvent),
    /// Single request outcomes
    Request(RequestOutcome),
    /// Batch dispatch summaries
    Batch(BatchEvent),
    /// Cache maintenance
    Cache(CacheEvent),
}

/// Events emitted when a unit asks the limiter for a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionEvent {
    /// A token was consumed and the unit queued for dispatch.
    Admitted {
        /// Operation name, e.g. `create_user`
        operation: &'static str,
    },
    /// No token was available.
    Rejected {
        operation: &'static str,
        /// Bucket capacity
        capacity: usize,
    },
}

/// Outcome of one API request, measured from admission to decoded response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    Success {
        /// Operation name, e.g. `create_user`
        operation: &'static str,
        duration: Duration,
    },
    Failure {
        operation: &'static str,
        duration: Duration,
    },
}

/// Events emitted by the batch dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchEvent {
    /// Every item of a batch has settled.
    Completed {
        /// Number of items submitted
        size: usize,
        /// Number of items that failed
        failed: usize,
        /// Time from first admission to last completion
        duration: Duration,
    },
}

/// Events emitted by cache maintenance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheEvent {
    /// The cache was emptied, e.g. on an application switch.
    Cleared {
        /// Entries dropped
        entries: usize,
    },
}

impl fmt::Display for ClientEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientEvent::Admission(event) => write!(f, "Admission::{}", event),
            ClientEvent::Request(event) => write!(f, "Request::{}", event),
            ClientEvent::Batch(event) => write!(f, "Batch::{}", event),
            ClientEvent::Cache(event) => write!(f, "Cache::{}", event),
        }
    }
}

impl fmt::Display for AdmissionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdmissionEvent::Admitted { operation } => write!(f, "Admitted({})", operation),
            AdmissionEvent::Rejected { operation, capacity } => {
                write!(f, "Rejected({}, capacity={})", operation, capacity)
            }
        }
    }
}

impl fmt::Display for RequestOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestOutcome::Success { operation, duration } => {
                write!(f, "Success({}, duration={:?})", operation, duration)
            }
            RequestOutcome::Failure { operation, duration } => {
                write!(f, "Failure({}, duration={:?})", operation, duration)
            }
        }
    }
}

impl fmt::Display for BatchEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchEvent::Completed { size, failed, duration } => {
                write!(f, "Completed({}/{} failed, duration={:?})", failed, size, duration)
            }
        }
    }
}

impl fmt::Display for CacheEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheEvent::Cleared { entries } => write!(f, "Cleared(entries={})", entries),
        }
    }
}

#[cfg_attr(not(feature = "telemetry-json"), allow(dead_code))]
#[inline]
fn clamp_u64(val: u128) -> u64 {
    val.min(u128::from(u64::MAX)) as u64
}

/// Convert a ClientEvent into a JSON value for sinks.
#[cfg(feature = "telemetry-json")]
pub fn event_to_json(event: &ClientEvent) -> serde_json::Value {
    match event {
        ClientEvent::Admission(a) => match a {
            AdmissionEvent::Admitted { operation } => {
                json!({ "kind": "admission_admitted", "operation": operation })
            }
            AdmissionEvent::Rejected { operation, capacity } => json!({
                "kind": "admission_rejected",
                "operation": operation,
                "capacity": *capacity,
            }),
        },
        ClientEvent::Request(r) => match r {
            RequestOutcome::Success { operation, duration } => json!({
                "kind": "request_success",
                "operation": operation,
                "duration_ms": clamp_u64(duration.as_millis()),
            }),
            RequestOutcome::Failure { operation, duration } => json!({
                "kind": "request_failure",
                "operation": operation,
                "duration_ms": clamp_u64(duration.as_millis()),
            }),
        },
        ClientEvent::Batch(BatchEvent::Completed { size, failed, duration }) => json!({
            "kind": "batch_completed",
            "size": *size,
            "failed": *failed,
            "duration_ms": clamp_u64(duration.as_millis()),
        }),
        ClientEvent::Cache(CacheEvent::Cleared { entries }) => {
            json!({ "kind": "cache_cleared", "entries": *entries })
        }
    }
}
