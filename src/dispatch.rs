//! Rate-limited submission of single requests and ordered batches.
//!
//! Every request goes through the same path: admit on the limiter, wait for dispatch, run
//! the executor, decode the response. [`BatchDispatcher`] runs that path for one request or
//! for up to [`MAX_BATCH_SIZE`] of them at once.
//!
//! Batches are admitted in input order before anything is awaited, so the limiter's FIFO
//! queue matches the caller's order. After that the items run concurrently and each result
//! lands in the slot of its input index.

use crate::cache::UserStore;
use crate::executor::RequestExecutor;
use crate::model::User;
use crate::rate_limit::{Admission, RateLimiter};
use crate::request::ApiRequest;
use crate::telemetry::{
    emit_best_effort, AdmissionEvent, BatchEvent, ClientEvent, NullSink, RequestOutcome,
    TelemetrySink,
};
use crate::RosterError;
use futures::stream::{FuturesUnordered, StreamExt};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Largest batch accepted by [`BatchDispatcher::dispatch`].
pub const MAX_BATCH_SIZE: usize = 10;

/// One batch entry: a built request, or the error that prevented building it.
pub type BatchItem = Result<ApiRequest, RosterError>;

/// Outcome of a batch, one entry per input item.
#[derive(Debug, Clone)]
pub struct BatchReport {
    /// `results[i]` belongs to input item `i`.
    pub results: Vec<Result<User, RosterError>>,
    /// Failed items as `(index, error)`, in the order they failed.
    pub failures: Vec<(usize, RosterError)>,
    /// From the first admission to the last completion.
    pub duration: Duration,
}

impl BatchReport {
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn succeeded(&self) -> usize {
        self.results.len() - self.failures.len()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty()
    }

    /// All records in input order, or an `Aggregate` carrying every failure and the partial
    /// results.
    pub fn into_result(self) -> Result<Vec<User>, RosterError> {
        if self.failures.is_empty() {
            return Ok(self.results.into_iter().flatten().collect());
        }
        let partial = self.results.into_iter().map(Result::ok).collect();
        let errors = self.failures.into_iter().map(|(_, e)| e).collect();
        Err(RosterError::aggregate(errors, partial))
    }
}

/// Submits requests through a [`RateLimiter`] and a [`RequestExecutor`], caching every user
/// record that comes back.
#[derive(Debug, Clone)]
pub struct BatchDispatcher<S = NullSink> {
    limiter: Arc<dyn RateLimiter>,
    executor: Arc<dyn RequestExecutor>,
    store: Arc<dyn UserStore>,
    sink: S,
}

impl BatchDispatcher<NullSink> {
    pub fn new(
        limiter: Arc<dyn RateLimiter>,
        executor: Arc<dyn RequestExecutor>,
        store: Arc<dyn UserStore>,
    ) -> Self {
        Self { limiter, executor, store, sink: NullSink }
    }
}

impl<S> BatchDispatcher<S> {
    /// Replace the telemetry sink.
    pub fn with_sink<S2>(self, sink: S2) -> BatchDispatcher<S2> {
        BatchDispatcher {
            limiter: self.limiter,
            executor: self.executor,
            store: self.store,
            sink,
        }
    }

    pub fn store(&self) -> &Arc<dyn UserStore> {
        &self.store
    }

    pub fn limiter(&self) -> &Arc<dyn RateLimiter> {
        &self.limiter
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}

impl<S> BatchDispatcher<S>
where
    S: TelemetrySink + Sync,
    S::Future: Send,
{
    /// Run one request and decode the body as `T`. Nothing is cached.
    ///
    /// Admission is attempted before the first await, so a rejection comes back without
    /// waiting on the limiter.
    pub async fn submit<T>(
        &self,
        operation: &'static str,
        request: ApiRequest,
    ) -> Result<T, RosterError>
    where
        T: DeserializeOwned,
    {
        let admission = self.admit(operation);
        let event = admission_event(operation, &admission);
        emit_best_effort(self.sink.clone(), ClientEvent::Admission(event)).await;
        self.complete(operation, admission?, request).await
    }

    /// Run one request whose response is a single user record, and cache that record.
    pub async fn submit_user(
        &self,
        operation: &'static str,
        request: ApiRequest,
    ) -> Result<User, RosterError> {
        let user: User = self.submit(operation, request).await?;
        self.store.upsert(user.clone());
        Ok(user)
    }

    /// Run a batch of user-returning requests; results come back in input order.
    ///
    /// Fails with `TooManyItems` (and submits nothing) past [`MAX_BATCH_SIZE`], and with
    /// `Aggregate` if any item failed.
    pub async fn dispatch(
        &self,
        operation: &'static str,
        items: Vec<BatchItem>,
    ) -> Result<Vec<User>, RosterError> {
        self.dispatch_detailed(operation, items).await?.into_result()
    }

    /// Like [`dispatch`](Self::dispatch) but returns the per-item outcomes instead of
    /// folding them into one result. Only `TooManyItems` is returned as an error.
    pub async fn dispatch_detailed(
        &self,
        operation: &'static str,
        items: Vec<BatchItem>,
    ) -> Result<BatchReport, RosterError> {
        if items.len() > MAX_BATCH_SIZE {
            return Err(RosterError::TooManyItems { provided: items.len(), max: MAX_BATCH_SIZE });
        }
        let size = items.len();
        let started = Instant::now();
        tracing::debug!(operation, size, "batch started");

        // One `(index, outcome)` per input item, whether it failed up front or ran.
        let mut outcomes: Vec<(usize, Result<User, RosterError>)> = Vec::with_capacity(size);
        let mut failures = Vec::new();
        let mut admitted = Vec::with_capacity(size);
        let mut admissions = Vec::with_capacity(size);

        for (index, item) in items.into_iter().enumerate() {
            let outcome = item.and_then(|request| {
                let admission = self.admit(operation);
                admissions.push(admission_event(operation, &admission));
                admission.map(|admission| (admission, request))
            });
            match outcome {
                Ok((admission, request)) => admitted.push((index, admission, request)),
                Err(err) => {
                    tracing::warn!(operation, index, error = %err, "batch item failed");
                    failures.push((index, err.clone()));
                    outcomes.push((index, Err(err)));
                }
            }
        }
        for event in admissions {
            emit_best_effort(self.sink.clone(), ClientEvent::Admission(event)).await;
        }

        let mut in_flight: FuturesUnordered<_> = admitted
            .into_iter()
            .map(|(index, admission, request)| async move {
                let outcome = self.complete::<User>(operation, admission, request).await;
                if let Ok(user) = &outcome {
                    self.store.upsert(user.clone());
                }
                (index, outcome)
            })
            .collect();

        while let Some((index, outcome)) = in_flight.next().await {
            if let Err(err) = &outcome {
                tracing::warn!(operation, index, error = %err, "batch item failed");
                failures.push((index, err.clone()));
            }
            outcomes.push((index, outcome));
        }

        let duration = started.elapsed();
        outcomes.sort_unstable_by_key(|(index, _)| *index);
        let results: Vec<_> = outcomes.into_iter().map(|(_, outcome)| outcome).collect();
        tracing::debug!(operation, size, failed = failures.len(), ?duration, "batch completed");
        emit_best_effort(
            self.sink.clone(),
            ClientEvent::Batch(BatchEvent::Completed { size, failed: failures.len(), duration }),
        )
        .await;
        Ok(BatchReport { results, failures, duration })
    }

    fn admit(&self, operation: &'static str) -> Result<Admission, RosterError> {
        let admission = self.limiter.admit();
        if let Err(err) = &admission {
            tracing::debug!(operation, error = %err, "admission denied");
        }
        admission
    }

    /// Wait for dispatch, execute, decode; then report the outcome.
    async fn complete<T>(
        &self,
        operation: &'static str,
        admission: Admission,
        request: ApiRequest,
    ) -> Result<T, RosterError>
    where
        T: DeserializeOwned,
    {
        let started = Instant::now();
        let result = async {
            admission.await?;
            let response = self.executor.execute(request).await?;
            response.json::<T>()
        }
        .await;
        let duration = started.elapsed();
        let event = match &result {
            Ok(_) => RequestOutcome::Success { operation, duration },
            Err(_) => RequestOutcome::Failure { operation, duration },
        };
        emit_best_effort(self.sink.clone(), ClientEvent::Request(event)).await;
        result
    }
}

fn admission_event(
    operation: &'static str,
    admission: &Result<Admission, RosterError>,
) -> AdmissionEvent {
    match admission {
        Ok(_) => AdmissionEvent::Admitted { operation },
        Err(err) => AdmissionEvent::Rejected {
            operation,
            capacity: err.rate_limit_capacity().unwrap_or_default(),
        },
    }
}
