use proptest::prelude::*;
use roster::prelude::*;
use roster::rate_limit::LimiterSnapshot;
use roster::ManualClock;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

mod common;

const SECOND: Duration = Duration::from_secs(1);

fn default_limiter() -> LeakyTokenBucket {
    LeakyTokenBucket::new(common::limiter_config(10, SECOND))
}

fn assert_near(actual: Duration, expected: Duration) {
    assert!(
        actual >= expected && actual < expected + Duration::from_millis(50),
        "expected ~{expected:?}, got {actual:?}"
    );
}

#[tokio::test(start_paused = true)]
async fn burst_dispatches_one_per_interval_and_rejects_the_eleventh() {
    common::init_tracing();
    let limiter = default_limiter();
    let start = Instant::now();
    let admissions: Vec<_> = (0..10).map(|_| limiter.admit().expect("token available")).collect();

    let stamps = tokio::spawn(futures::future::join_all(admissions.into_iter().map(
        |admission| async move {
            admission.await.expect("dispatched");
            start.elapsed()
        },
    )));

    tokio::time::sleep(Duration::from_millis(500)).await;
    let err = limiter.admit().unwrap_err();
    assert!(err.is_rate_limited());
    assert_eq!(err.rate_limit_capacity(), Some(10));

    let stamps = stamps.await.unwrap();
    for (i, stamp) in stamps.into_iter().enumerate() {
        assert_near(stamp, SECOND * i as u32);
    }
}

#[tokio::test(start_paused = true)]
async fn refilled_token_queues_behind_draining_burst() {
    let limiter = default_limiter();
    let start = Instant::now();
    let burst: Vec<_> = (0..10).map(|_| limiter.admit().unwrap()).collect();
    let burst = tokio::spawn(futures::future::join_all(burst));

    tokio::time::sleep(Duration::from_millis(1200)).await;
    let late = limiter.admit().expect("one token refilled after one interval");
    assert_eq!(limiter.snapshot().available_tokens, 0);

    late.await.unwrap();
    assert_near(start.elapsed(), SECOND * 10);
    assert!(burst.await.unwrap().into_iter().all(|r| r.is_ok()));
}

#[tokio::test(start_paused = true)]
async fn dispatch_order_matches_admission_order() {
    let limiter = default_limiter();
    let order = Arc::new(Mutex::new(Vec::new()));
    let mut tasks = Vec::new();
    for i in 0..5 {
        let admission = limiter.admit().unwrap();
        let order = order.clone();
        tasks.push(tokio::spawn(async move {
            admission.await.unwrap();
            order.lock().unwrap().push(i);
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }
    assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
}

#[tokio::test(start_paused = true)]
async fn every_new_cycle_dispatches_its_first_unit_immediately() {
    let limiter = default_limiter();
    let start = Instant::now();

    limiter.admit().unwrap().await.unwrap();
    assert_near(start.elapsed(), Duration::ZERO);
    assert!(!limiter.snapshot().processing, "cycle ends with the queue");

    tokio::time::sleep(Duration::from_millis(300)).await;
    limiter.admit().unwrap().await.unwrap();
    assert_near(start.elapsed(), Duration::from_millis(300));

    tokio::time::sleep(SECOND * 4).await;
    assert_eq!(
        limiter.snapshot(),
        LimiterSnapshot { available_tokens: 8, capacity: 10, pending: 0, processing: false }
    );
    let restart = Instant::now();
    limiter.admit().unwrap().await.unwrap();
    assert_near(restart.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn rejection_does_not_queue() {
    let limiter = LeakyTokenBucket::new(common::limiter_config(1, SECOND));
    let first = limiter.admit().unwrap();
    for _ in 0..5 {
        assert!(limiter.admit().is_err());
    }
    assert_eq!(limiter.snapshot().pending, 1);
    first.await.unwrap();
}

#[derive(Debug, Clone)]
enum Step {
    Admit,
    Advance(u64),
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![3 => Just(Step::Admit), 1 => (0u64..350).prop_map(Step::Advance)]
}

fn paused_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn admissions_never_exceed_capacity(capacity in 1usize..20, burst in 0usize..40) {
        let admitted = paused_runtime().block_on(async {
            let limiter = LeakyTokenBucket::new(common::limiter_config(capacity, SECOND));
            (0..burst).filter_map(|_| limiter.admit().ok()).count()
        });
        prop_assert_eq!(admitted, burst.min(capacity));
    }

    #[test]
    fn refill_grants_one_token_per_elapsed_interval(
        capacity in 1usize..8,
        steps in prop::collection::vec(step(), 1..60),
    ) {
        let interval = Duration::from_millis(100);
        let (granted, expected) = paused_runtime().block_on(async {
            let clock = ManualClock::new();
            let limiter =
                LeakyTokenBucket::with_clock(common::limiter_config(capacity, interval), clock.clone());
            let mut held = Vec::new();
            let (mut granted, mut expected) = (Vec::new(), Vec::new());
            let (mut tokens, mut since_refill) = (capacity, Duration::ZERO);
            for op in steps {
                match op {
                    Step::Advance(ms) => {
                        clock.advance(Duration::from_millis(ms));
                        since_refill += Duration::from_millis(ms);
                    }
                    Step::Admit => {
                        let earned = (since_refill.as_millis() / interval.as_millis()) as usize;
                        if earned > 0 {
                            tokens = capacity.min(tokens + earned);
                            since_refill = Duration::ZERO;
                        }
                        let ok = tokens > 0;
                        if ok {
                            tokens -= 1;
                        }
                        expected.push(ok);
                        match limiter.admit() {
                            Ok(admission) => {
                                held.push(admission);
                                granted.push(true);
                            }
                            Err(err) => {
                                assert!(err.is_rate_limited());
                                granted.push(false);
                            }
                        }
                    }
                }
            }
            (granted, expected)
        });
        prop_assert_eq!(granted, expected);
    }

    #[test]
    fn any_burst_is_dispatched_in_admission_order(size in 1usize..25) {
        let order = paused_runtime().block_on(async {
            let limiter = LeakyTokenBucket::new(
                common::limiter_config(size, Duration::from_millis(10)),
            );
            let order = Arc::new(Mutex::new(Vec::new()));
            let tasks: Vec<_> = (0..size)
                .map(|i| {
                    let admission = limiter.admit().unwrap();
                    let order = order.clone();
                    tokio::spawn(async move {
                        admission.await.unwrap();
                        order.lock().unwrap().push(i);
                    })
                })
                .collect();
            for task in tasks {
                task.await.unwrap();
            }
            let order = order.lock().unwrap().clone();
            order
        });
        prop_assert_eq!(order, (0..size).collect::<Vec<_>>());
    }
}
