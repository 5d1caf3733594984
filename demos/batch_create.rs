//! Batch-creates users against the in-memory API and prints when each one was dispatched.
//!
//! Run with `cargo run --example batch_create`.

use roster::prelude::*;
use std::time::Duration;
use tokio::time::Instant;

#[tokio::main]
async fn main() -> Result<(), RosterError> {
    tracing_subscriber::fmt().with_max_level(tracing::Level::DEBUG).init();

    let api = std::sync::Arc::new(
        InMemoryExecutor::new().with_random_latency(
            Duration::from_millis(20),
            Duration::from_millis(400),
            7,
        ),
    );
    api.fail_user("user-4");

    let config = ClientConfig::default()
        .with_limiter(LimiterConfig::new(10, Duration::from_millis(200))?);
    let manager = UserManager::builder(api.clone()).config(config).build();
    manager.init_application("DEMO_APP", "demo-token").await?;

    let started = Instant::now();
    let params = (0..6)
        .map(|i| UserCreationParams::new(format!("user-{i}"), format!("Demo {i}")))
        .collect();
    let report = manager.create_users_detailed(params).await?;

    println!("batch of {} settled in {:?}", report.len(), started.elapsed());
    for (index, outcome) in report.results.iter().enumerate() {
        match outcome {
            Ok(user) => println!("  [{index}] created {} ({})", user.user_id, user.nickname),
            Err(err) => println!("  [{index}] failed: {err}"),
        }
    }
    println!("cached users: {}", manager.cached_users().len());
    println!("peak requests in flight: {}", api.max_in_flight());
    Ok(())
}
