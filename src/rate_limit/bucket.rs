use crate::clock::{Clock, TokioClock};
use crate::config::LimiterConfig;
use crate::rate_limit::{Admission, RateLimiter};
use crate::RosterError;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Token bucket admission with leaky bucket pacing.
///
/// - Up to `capacity` units may be admitted and waiting. Tokens come back lazily, one per
///   elapsed `leak_interval`, computed on each `admit()`.
/// - Admitted units are dispatched FIFO. The first unit of a dispatch cycle goes out at
///   once; after that one unit per `leak_interval`.
/// - The cycle ends as soon as the last queued unit is dispatched. The next admission
///   starts a new cycle, whose first unit again goes out at once.
///
/// All bucket state sits behind one mutex. The dispatch timer is a tokio task that only
/// exists while a cycle is active, and it is aborted when the limiter is dropped; units
/// still queued at that point resolve with `LimiterClosed`.
///
/// `admit()` needs a tokio runtime to start the dispatch timer.
#[derive(Debug)]
pub struct LeakyTokenBucket {
    shared: Arc<Shared>,
}

/// Point-in-time view of the bucket, for assertions and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimiterSnapshot {
    /// Tokens as of the last refill (refill happens lazily on `admit()`).
    pub available_tokens: usize,
    pub capacity: usize,
    /// Admitted units waiting for dispatch.
    pub pending: usize,
    /// True while a dispatch cycle (and its timer) is alive.
    pub processing: bool,
}

#[derive(Debug)]
struct Shared {
    capacity: usize,
    leak_interval: Duration,
    clock: Arc<dyn Clock>,
    state: Mutex<BucketState>,
}

#[derive(Debug)]
struct BucketState {
    available: usize,
    last_refill: Instant,
    pending: VecDeque<oneshot::Sender<()>>,
    processing: bool,
    driver: Option<JoinHandle<()>>,
}

impl BucketState {
    /// Add one token per whole elapsed interval. `last_refill` only moves when at least one
    /// token was added, so partial progress toward the next token is kept.
    fn refill(&mut self, now: Instant, capacity: usize, leak_interval: Duration) -> usize {
        let elapsed = now.saturating_duration_since(self.last_refill);
        let earned = elapsed.as_nanos() / leak_interval.as_nanos();
        let tokens = usize::try_from(earned).unwrap_or(usize::MAX);
        if tokens > 0 {
            self.available = capacity.min(self.available.saturating_add(tokens));
            self.last_refill = now;
        }
        tokens
    }
}

impl LeakyTokenBucket {
    /// Create a full bucket.
    pub fn new(config: LimiterConfig) -> Self {
        Self::with_clock(config, TokioClock)
    }

    /// Create a full bucket whose refill reads time from `clock`.
    pub fn with_clock<C>(config: LimiterConfig, clock: C) -> Self
    where
        C: Clock + 'static,
    {
        let clock: Arc<dyn Clock> = Arc::new(clock);
        let state = BucketState {
            available: config.capacity(),
            last_refill: clock.now(),
            pending: VecDeque::new(),
            processing: false,
            driver: None,
        };
        tracing::debug!(
            capacity = config.capacity(),
            leak_interval = ?config.leak_interval(),
            "rate limiter initialized"
        );
        Self {
            shared: Arc::new(Shared {
                capacity: config.capacity(),
                leak_interval: config.leak_interval(),
                clock,
                state: Mutex::new(state),
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    pub fn leak_interval(&self) -> Duration {
        self.shared.leak_interval
    }

    pub fn snapshot(&self) -> LimiterSnapshot {
        let state = self.shared.lock_state();
        LimiterSnapshot {
            available_tokens: state.available,
            capacity: self.shared.capacity,
            pending: state.pending.len(),
            processing: state.processing,
        }
    }
}

impl RateLimiter for LeakyTokenBucket {
    fn admit(&self) -> Result<Admission, RosterError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| RosterError::Runtime(e.to_string()))?;
        let shared = &self.shared;
        let now = shared.clock.now();
        let mut state = shared.lock_state();

        let added = state.refill(now, shared.capacity, shared.leak_interval);
        if added > 0 {
            tracing::debug!(added, available = state.available, "tokens refilled");
        }

        if state.available == 0 {
            tracing::warn!(capacity = shared.capacity, "no tokens available; admission rejected");
            return Err(RosterError::RateLimitExceeded { capacity: shared.capacity });
        }

        state.available -= 1;
        let (tx, rx) = oneshot::channel();
        state.pending.push_back(tx);
        tracing::debug!(
            available = state.available,
            pending = state.pending.len(),
            "token consumed"
        );

        if !state.processing {
            state.processing = true;
            let driver = runtime.spawn(drive(Arc::downgrade(shared), shared.leak_interval));
            state.driver = Some(driver);
            tracing::debug!("dispatch cycle started");
        }
        Ok(Admission::pending(rx))
    }
}

impl Shared {
    fn lock_state(&self) -> MutexGuard<'_, BucketState> {
        // Every mutation leaves the state consistent, so a poisoned lock is still usable.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fire the head of the queue. Returns false, ending the cycle, once the queue is empty.
    fn dispatch_next(&self) -> bool {
        let mut state = self.lock_state();
        if let Some(unit) = state.pending.pop_front() {
            // A receiver that was dropped simply ignores its turn.
            let _ = unit.send(());
            tracing::trace!(remaining = state.pending.len(), "unit dispatched");
        }
        if !state.pending.is_empty() {
            return true;
        }
        state.processing = false;
        state.driver = None;
        tracing::debug!("queue drained; dispatch cycle stopped");
        false
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(driver) = state.driver.take() {
            driver.abort();
        }
        // Dropping the senders resolves outstanding admissions with `LimiterClosed`.
        state.pending.clear();
    }
}

/// Dispatch loop of one cycle: the first tick fires at once, later ticks every `period`.
async fn drive(shared: Weak<Shared>, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let Some(shared) = shared.upgrade() else {
            return;
        };
        if !shared.dispatch_next() {
            return;
        }
    }
}
