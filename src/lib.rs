#![forbid(unsafe_code)]
#![cfg_attr(not(test), deny(clippy::all))]

//! # Roster
//!
//! Client core for a remote user-management API: the concurrency machinery that sits
//! between application code and the network.
//!
//! ## Features
//!
//! - **Leaky token bucket** admission: a synchronous capacity check, then paced FIFO
//!   dispatch at one unit per interval with an immediate first dispatch
//! - **Reader/writer user cache** that serves concurrent lookups while serialising writes
//! - **Ordered batch dispatch** of up to ten requests, run concurrently, with results in
//!   input order and aggregated failures
//! - **Pluggable transport** via [`RequestExecutor`], including any `tower::Service`
//! - **Telemetry** as a `tower::Service` sink, logging through `tracing` by default
//!
//! ## Quick Start
//!
//! ```rust
//! use roster::{ClientConfig, InMemoryExecutor, LimiterConfig, UserCreationParams, UserManager};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), roster::RosterError> {
//!     let limiter = LimiterConfig::new(10, Duration::from_millis(10))?;
//!     let manager = UserManager::builder(InMemoryExecutor::new())
//!         .config(ClientConfig::default().with_limiter(limiter))
//!         .build();
//!     manager.init_application("APP_ID", "API_TOKEN").await?;
//!
//!     let users = manager
//!         .create_users(vec![
//!             UserCreationParams::new("u1", "neo"),
//!             UserCreationParams::new("u2", "trinity"),
//!         ])
//!         .await?;
//!     assert_eq!(users[1].nickname, "trinity");
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod clock;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod executor;
pub mod manager;
pub mod model;
pub mod prelude;
pub mod rate_limit;
pub mod request;
pub mod session;
pub mod telemetry;

// Re-exports
pub use cache::{SharedUserStore, UserStore};
pub use clock::{Clock, ManualClock, TokioClock};
pub use config::{ClientConfig, ConfigError, LimiterConfig};
pub use dispatch::{BatchDispatcher, BatchReport, MAX_BATCH_SIZE};
pub use error::RosterError;
pub use executor::{InMemoryExecutor, RequestExecutor, ServiceExecutor};
pub use manager::{UserManager, UserManagerBuilder};
pub use model::{User, UserCreationParams, UserUpdateParams, UsersPage};
pub use rate_limit::{Admission, LeakyTokenBucket, RateLimiter};
pub use request::{ApiRequest, ApiResponse, Method, UserRequest};
pub use session::{Session, SessionHandle};
