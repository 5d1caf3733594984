//! The request/response boundary.
//!
//! Everything below [`RequestExecutor`] (sockets, TLS, HTTP framing) is outside the core.
//! Two implementations ship here:
//! - [`ServiceExecutor`] adapts any `tower::Service<ApiRequest>`, so a real HTTP stack
//!   plugs in with whatever middleware it already has.
//! - [`memory::InMemoryExecutor`] is a fake user API for tests and demos.

use crate::request::{ApiRequest, ApiResponse};
use crate::RosterError;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tower::ServiceExt;
use tower_service::Service;

pub mod memory;
pub use memory::InMemoryExecutor;

/// Performs one request/response exchange.
///
/// Implementations must be safe to call concurrently; the core keeps no per-call state in
/// the executor.
#[async_trait]
pub trait RequestExecutor: Send + Sync + fmt::Debug {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, RosterError>;
}

#[async_trait]
impl<T> RequestExecutor for Arc<T>
where
    T: RequestExecutor + ?Sized,
{
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, RosterError> {
        (**self).execute(request).await
    }
}

/// Executor backed by a `tower::Service`.
///
/// Each call clones the service and drives it with `oneshot`, which honours `poll_ready`.
#[derive(Clone)]
pub struct ServiceExecutor<S> {
    service: S,
}

impl<S> ServiceExecutor<S> {
    pub fn new(service: S) -> Self {
        Self { service }
    }
}

impl<S> fmt::Debug for ServiceExecutor<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceExecutor").field("service", &std::any::type_name::<S>()).finish()
    }
}

#[async_trait]
impl<S> RequestExecutor for ServiceExecutor<S>
where
    S: Service<ApiRequest, Response = ApiResponse, Error = RosterError>
        + Clone
        + Send
        + Sync
        + 'static,
    S::Future: Send + 'static,
{
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, RosterError> {
        self.service.clone().oneshot(request).await
    }
}
