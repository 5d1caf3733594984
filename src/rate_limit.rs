//! Rate limiting primitives.
//!
//! This module provides the building blocks for rate limiting:
//! - [`RateLimiter`]: The core trait; admission is a synchronous capacity check.
//! - [`Admission`]: The handle returned on success; it resolves when the unit is dispatched.
//! - [`LeakyTokenBucket`]: Production limiter (token bucket admission, leaky bucket pacing).
//! - [`UnlimitedLimiter`]: Test double that admits and dispatches everything at once.
//!
//! # Architecture
//!
//! Admission and dispatch are decoupled:
//! - **Admission** happens inside `admit()`: either a token is taken and the unit is queued,
//!   or `RateLimitExceeded` comes back immediately. Nothing is ever queued on rejection.
//! - **Dispatch** happens later, on a timer owned by the limiter. The `Admission` future
//!   completes when the unit's turn comes up.

use crate::RosterError;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

pub mod bucket;
pub use bucket::{LeakyTokenBucket, LimiterSnapshot};

/// Core interface for rate limiting logic.
///
/// Implementations must dispatch every admitted unit exactly once, in admission order.
pub trait RateLimiter: Send + Sync + std::fmt::Debug {
    /// Try to admit one unit of work.
    ///
    /// Returns immediately: `Err(RateLimitExceeded)` when no capacity is left, otherwise an
    /// [`Admission`] that resolves once the unit is dispatched.
    fn admit(&self) -> Result<Admission, RosterError>;
}

impl<T> RateLimiter for Arc<T>
where
    T: RateLimiter + ?Sized,
{
    fn admit(&self) -> Result<Admission, RosterError> {
        (**self).admit()
    }
}

/// Handle to an admitted unit of work.
///
/// Awaiting it yields `Ok(())` when the unit is dispatched, or `Err(LimiterClosed)` if the
/// limiter went away first. Dropping it forfeits the slot but does not un-admit the unit.
#[derive(Debug)]
#[must_use = "an admission does nothing unless awaited"]
pub struct Admission {
    rx: oneshot::Receiver<()>,
}

impl Admission {
    /// Wrap the receiving half of a unit's completion notifier.
    pub fn pending(rx: oneshot::Receiver<()>) -> Self {
        Self { rx }
    }

    /// An admission whose dispatch has already happened.
    pub fn ready() -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(());
        Self { rx }
    }

    /// Wait for dispatch. Same as awaiting the admission directly.
    pub async fn dispatched(self) -> Result<(), RosterError> {
        self.await
    }
}

impl Future for Admission {
    type Output = Result<(), RosterError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(|r| r.map_err(|_| RosterError::LimiterClosed))
    }
}

/// Test limiter that admits everything and dispatches immediately.
#[derive(Debug, Default)]
pub struct UnlimitedLimiter {
    admitted: AtomicUsize,
}

impl UnlimitedLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of admissions granted so far.
    pub fn admitted(&self) -> usize {
        self.admitted.load(Ordering::SeqCst)
    }
}

impl RateLimiter for UnlimitedLimiter {
    fn admit(&self) -> Result<Admission, RosterError> {
        self.admitted.fetch_add(1, Ordering::SeqCst);
        Ok(Admission::ready())
    }
}
