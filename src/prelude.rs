//! Convenient re-exports for common Roster types.
pub use crate::{
    cache::{RecordingUserStore, SharedUserStore, UserStore},
    config::{ClientConfig, ConfigError, LimiterConfig},
    dispatch::{BatchDispatcher, BatchItem, BatchReport, MAX_BATCH_SIZE},
    executor::{InMemoryExecutor, RequestExecutor, ServiceExecutor},
    manager::{UserManager, UserManagerBuilder},
    model::{User, UserCreationParams, UserUpdateParams, UsersPage},
    rate_limit::{Admission, LeakyTokenBucket, RateLimiter, UnlimitedLimiter},
    request::{ApiRequest, ApiResponse, Method, UserRequest},
    telemetry::{ClientEvent, LogSink, MemorySink, NullSink, TelemetrySink},
    RosterError,
};
