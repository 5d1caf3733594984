#![allow(dead_code)]

use roster::prelude::*;
use roster::telemetry::MemorySink;
use std::sync::Arc;
use std::time::Duration;

pub const APP_ID: &str = "app";
pub const API_TOKEN: &str = "token";

/// Install a test subscriber once; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

pub fn limiter_config(capacity: usize, interval: Duration) -> LimiterConfig {
    LimiterConfig::new(capacity, interval).expect("valid limiter config")
}

/// Manager over the fake API with the given limiter, plus handles to inspect it.
pub struct Harness {
    pub api: Arc<InMemoryExecutor>,
    pub store: Arc<RecordingUserStore>,
    pub sink: MemorySink,
    pub manager: UserManager<MemorySink>,
}

pub async fn harness<L>(api: InMemoryExecutor, limiter: L) -> Harness
where
    L: RateLimiter + 'static,
{
    init_tracing();
    let api = Arc::new(api);
    let store = Arc::new(RecordingUserStore::new());
    let sink = MemorySink::new();
    let manager = UserManager::builder(api.clone())
        .limiter(limiter)
        .store(store.clone())
        .sink(sink.clone())
        .build();
    manager.init_application(APP_ID, API_TOKEN).await.expect("init application");
    Harness { api, store, sink, manager }
}
