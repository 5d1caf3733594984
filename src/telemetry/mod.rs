//! Telemetry for the client core.
//!
//! Components emit [`ClientEvent`]s through a [`TelemetrySink`], which is a
//! `tower::Service<ClientEvent>` so sinks compose with ordinary tower tooling.
//!
//! - **Admission**: `Admitted`, `Rejected`
//! - **Request**: `Success`, `Failure`
//! - **Batch**: `Completed`
//! - **Cache**: `Cleared`
//!
//! Emission is best effort: a failing sink never fails the operation that emitted.
//!
//! ```rust
//! use roster::telemetry::{AdmissionEvent, ClientEvent};
//!
//! let event = ClientEvent::Admission(AdmissionEvent::Admitted { operation: "create_user" });
//! assert_eq!(event.to_string(), "Admission::Admitted(create_user)");
//! ```

pub mod events;
pub mod sinks;

#[cfg(feature = "telemetry-json")]
pub use events::event_to_json;
pub use events::{AdmissionEvent, BatchEvent, CacheEvent, ClientEvent, RequestOutcome};
pub use sinks::{
    emit_best_effort, ComposedSinkError, LogSink, MemorySink, MulticastSink, NullSink,
    TelemetrySink,
};
