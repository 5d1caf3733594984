//! Error types for the client core
use crate::config::ConfigError;
use crate::model::User;
use std::sync::Arc;

/// Unified error type for admission, dispatch and request failures.
///
/// Every failure is reported to the immediate caller; nothing here is retried.
#[derive(thiserror::Error, Debug, Clone)]
pub enum RosterError {
    /// No tokens were available at admission time
    #[error("rate limit exceeded: bucket capacity ({capacity}) reached")]
    RateLimitExceeded { capacity: usize },
    /// A batch larger than the fixed maximum was submitted
    #[error("too many items: at most {max} allowed per batch, got {provided}")]
    TooManyItems { provided: usize, max: usize },
    /// Caller input was rejected before any submission
    #[error("validation failed: {0}")]
    Validation(String),
    /// The query succeeded but matched nothing
    #[error("empty result: {0}")]
    EmptyResult(String),
    /// One or more items of a batch failed.
    ///
    /// `errors` is in completion order. `partial` has one slot per input item, filled for the
    /// items that succeeded.
    #[error("{} of {} batch items failed", .errors.len(), .partial.len())]
    Aggregate { errors: Arc<Vec<RosterError>>, partial: Arc<Vec<Option<User>>> },
    /// The request descriptor could not be built
    #[error("invalid request: {0}")]
    Request(String),
    /// The executor failed to reach the remote side
    #[error("transport failure: {0}")]
    Transport(String),
    /// The remote side answered with a non-2xx status
    #[error("unexpected status code {0}")]
    Status(u16),
    /// The response body did not decode
    #[error("failed to decode response: {0}")]
    Decode(String),
    /// The limiter was torn down before the unit was dispatched
    #[error("rate limiter shut down before dispatch")]
    LimiterClosed,
    /// No async runtime was available to drive dispatch
    #[error("no async runtime available: {0}")]
    Runtime(String),
    /// Configuration was rejected
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

impl RosterError {
    /// Build an `Aggregate` from the collected failures and the per-index outcomes.
    pub fn aggregate(errors: Vec<RosterError>, partial: Vec<Option<User>>) -> Self {
        RosterError::Aggregate { errors: Arc::new(errors), partial: Arc::new(partial) }
    }

    /// Check if admission was denied
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimitExceeded { .. })
    }

    /// Check if a batch was rejected for size
    pub fn is_too_many_items(&self) -> bool {
        matches!(self, Self::TooManyItems { .. })
    }

    /// Check if caller input was rejected
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Check if a query came back empty
    pub fn is_empty_result(&self) -> bool {
        matches!(self, Self::EmptyResult(_))
    }

    /// Check if this wraps batch failures
    pub fn is_aggregate(&self) -> bool {
        matches!(self, Self::Aggregate { .. })
    }

    /// Per-item errors of an `Aggregate`, in completion order.
    pub fn errors(&self) -> Option<&[RosterError]> {
        match self {
            Self::Aggregate { errors, .. } => Some(errors.as_slice()),
            _ => None,
        }
    }

    /// Per-index outcomes of an `Aggregate`: `Some(user)` where the item succeeded.
    pub fn partial_results(&self) -> Option<&[Option<User>]> {
        match self {
            Self::Aggregate { partial, .. } => Some(partial.as_slice()),
            _ => None,
        }
    }

    /// Capacity reported by a rate-limit rejection.
    pub fn rate_limit_capacity(&self) -> Option<usize> {
        match self {
            Self::RateLimitExceeded { capacity } => Some(*capacity),
            _ => None,
        }
    }

    /// Short stable name of the variant, used as a telemetry label.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RateLimitExceeded { .. } => "rate_limit_exceeded",
            Self::TooManyItems { .. } => "too_many_items",
            Self::Validation(_) => "validation",
            Self::EmptyResult(_) => "empty_result",
            Self::Aggregate { .. } => "aggregate",
            Self::Request(_) => "request",
            Self::Transport(_) => "transport",
            Self::Status(_) => "status",
            Self::Decode(_) => "decode",
            Self::LimiterClosed => "limiter_closed",
            Self::Runtime(_) => "runtime",
            Self::Config(_) => "config",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_display_names_capacity() {
        let err = RosterError::RateLimitExceeded { capacity: 10 };
        let msg = err.to_string();
        assert!(msg.contains("rate limit"));
        assert!(msg.contains("10"));
    }

    #[test]
    fn too_many_items_display() {
        let err = RosterError::TooManyItems { provided: 11, max: 10 };
        assert_eq!(err.to_string(), "too many items: at most 10 allowed per batch, got 11");
    }

    #[test]
    fn aggregate_display_counts_failures() {
        let err = RosterError::aggregate(
            vec![RosterError::Status(500)],
            vec![Some(User::new("a", "a")), None, Some(User::new("c", "c"))],
        );
        assert_eq!(err.to_string(), "1 of 3 batch items failed");
    }

    #[test]
    fn aggregate_accessors_expose_errors_and_partials() {
        let err = RosterError::aggregate(
            vec![RosterError::Transport("reset".into())],
            vec![None, Some(User::new("b", "b"))],
        );
        assert!(err.is_aggregate());
        assert_eq!(err.errors().unwrap().len(), 1);
        let partial = err.partial_results().unwrap();
        assert!(partial[0].is_none());
        assert_eq!(partial[1].as_ref().unwrap().user_id, "b");
    }

    #[test]
    fn accessors_return_none_for_other_variants() {
        let err = RosterError::Validation("empty".into());
        assert!(err.errors().is_none());
        assert!(err.partial_results().is_none());
        assert!(err.rate_limit_capacity().is_none());
    }

    #[test]
    fn predicates_cover_variants() {
        assert!(RosterError::RateLimitExceeded { capacity: 1 }.is_rate_limited());
        assert!(RosterError::TooManyItems { provided: 2, max: 1 }.is_too_many_items());
        assert!(RosterError::Validation("x".into()).is_validation());
        assert!(RosterError::EmptyResult("x".into()).is_empty_result());
        assert!(!RosterError::LimiterClosed.is_rate_limited());
    }

    #[test]
    fn config_errors_convert() {
        let err: RosterError = ConfigError::InvalidCapacity { provided: 0 }.into();
        assert_eq!(err.kind(), "config");
    }

    #[test]
    fn kind_is_stable() {
        assert_eq!(RosterError::Status(404).kind(), "status");
        assert_eq!(RosterError::LimiterClosed.kind(), "limiter_closed");
    }
}
