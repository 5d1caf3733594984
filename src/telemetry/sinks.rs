use super::events::ClientEvent;
use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use tower::Service;

type SinkFuture<E> = Pin<Box<dyn Future<Output = Result<(), E>> + Send>>;

/// A telemetry sink that consumes client events.
pub trait TelemetrySink:
    tower::Service<ClientEvent, Response = (), Error = Self::SinkError> + Clone + Send + 'static
{
    /// The error type for this sink.
    type SinkError: std::error::Error + Send + 'static;
}

/// Best-effort emit helper that honors `poll_ready` and swallows errors.
pub async fn emit_best_effort<S>(sink: S, event: ClientEvent)
where
    S: tower::Service<ClientEvent, Response = ()> + Send + Clone + 'static,
    S::Error: std::error::Error + Send + 'static,
    S::Future: Send + 'static,
{
    use tower::ServiceExt;

    if let Ok(mut ready_sink) = sink.ready_oneshot().await {
        let _ = ready_sink.call(event).await;
    }
}

/// A no-op telemetry sink that discards all events.
#[derive(Clone, Debug, Default)]
pub struct NullSink;

impl Service<ClientEvent> for NullSink {
    type Response = ();
    type Error = Infallible;
    type Future = SinkFuture<Infallible>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, _event: ClientEvent) -> Self::Future {
        Box::pin(async { Ok(()) })
    }
}

impl TelemetrySink for NullSink {
    type SinkError = Infallible;
}

/// A telemetry sink that logs events using the `tracing` crate.
#[derive(Clone, Debug, Default)]
pub struct LogSink;

impl Service<ClientEvent> for LogSink {
    type Response = ();
    type Error = Infallible;
    type Future = SinkFuture<Infallible>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, event: ClientEvent) -> Self::Future {
        tracing::info!(event = %event, "client_event");
        Box::pin(async { Ok(()) })
    }
}

impl TelemetrySink for LogSink {
    type SinkError = Infallible;
}

/// A telemetry sink that stores events in memory, evicting the oldest past `capacity`.
#[derive(Clone, Debug)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<ClientEvent>>>,
    capacity: usize,
    evicted: Arc<AtomicU64>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::with_capacity(10_000)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
            capacity: capacity.max(1),
            evicted: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn events(&self) -> Vec<ClientEvent> {
        self.lock().clone()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn evicted(&self) -> u64 {
        self.evicted.load(Ordering::Relaxed)
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ClientEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

impl Service<ClientEvent> for MemorySink {
    type Response = ();
    type Error = Infallible;
    type Future = SinkFuture<Infallible>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, event: ClientEvent) -> Self::Future {
        let mut guard = self.lock();
        if guard.len() >= self.capacity {
            guard.remove(0);
            self.evicted.fetch_add(1, Ordering::Relaxed);
        }
        guard.push(event);
        Box::pin(async { Ok(()) })
    }
}

impl TelemetrySink for MemorySink {
    type SinkError = Infallible;
}

#[derive(Debug)]
pub struct ComposedSinkError(Box<dyn std::error::Error + Send + Sync>);

impl std::fmt::Display for ComposedSinkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "telemetry sink error: {}", self.0)
    }
}

impl std::error::Error for ComposedSinkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&*self.0)
    }
}

/// Sends every event to both sinks.
#[derive(Clone, Debug)]
pub struct MulticastSink<A, B> {
    sink_a: A,
    sink_b: B,
}

impl<A, B> MulticastSink<A, B> {
    pub fn new(sink_a: A, sink_b: B) -> Self {
        Self { sink_a, sink_b }
    }
}

impl<A, B> Service<ClientEvent> for MulticastSink<A, B>
where
    A: tower::Service<ClientEvent, Response = ()> + Clone + Send + 'static,
    A::Error: std::error::Error + Send + Sync + 'static,
    A::Future: Send + 'static,
    B: tower::Service<ClientEvent, Response = ()> + Clone + Send + 'static,
    B::Error: std::error::Error + Send + Sync + 'static,
    B::Future: Send + 'static,
{
    type Response = ();
    type Error = ComposedSinkError;
    type Future = SinkFuture<ComposedSinkError>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, event: ClientEvent) -> Self::Future {
        let sink_a = self.sink_a.clone();
        let sink_b = self.sink_b.clone();
        let event_clone = event.clone();

        Box::pin(async move {
            use tower::ServiceExt;
            let (res_a, res_b) =
                futures::join!(sink_a.oneshot(event), sink_b.oneshot(event_clone));
            res_a.map_err(|e| ComposedSinkError(Box::new(e)))?;
            res_b.map_err(|e| ComposedSinkError(Box::new(e)))?;
            Ok(())
        })
    }
}

impl<A, B> TelemetrySink for MulticastSink<A, B>
where
    A: tower::Service<ClientEvent, Response = ()> + Clone + Send + 'static,
    A::Error: std::error::Error + Send + Sync + 'static,
    A::Future: Send + 'static,
    B: tower::Service<ClientEvent, Response = ()> + Clone + Send + 'static,
    B::Error: std::error::Error + Send + Sync + 'static,
    B::Future: Send + 'static,
{
    type SinkError = ComposedSinkError;
}
