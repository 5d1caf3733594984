use roster::prelude::*;
use roster::telemetry::{AdmissionEvent, CacheEvent, RequestOutcome};
use serde_json::json;
use std::time::Duration;

mod common;

#[tokio::test]
async fn blank_nickname_is_rejected_before_any_request() {
    let h = common::harness(InMemoryExecutor::new(), UnlimitedLimiter::new()).await;

    let err = h.manager.get_users("   ").await.unwrap_err();

    assert!(err.is_validation());
    assert_eq!(h.api.call_count(), 0);
}

#[tokio::test]
async fn nickname_without_matches_is_an_empty_result() {
    let api = InMemoryExecutor::new().with_users([User::new("u1", "neo")]);
    let h = common::harness(api, UnlimitedLimiter::new()).await;

    let err = h.manager.get_users("morpheus").await.unwrap_err();

    assert!(err.is_empty_result());
    assert_eq!(h.api.call_count(), 1);
    assert!(h.manager.cached_users().is_empty());
}

#[tokio::test]
async fn get_user_always_goes_to_the_network() {
    let api = InMemoryExecutor::new().with_users([User::new("u1", "neo")]);
    let h = common::harness(api, UnlimitedLimiter::new()).await;

    h.manager.get_user("u1").await.unwrap();
    h.manager.get_user("u1").await.unwrap();

    assert_eq!(h.api.call_count(), 2);
    assert_eq!(h.store.upserts().len(), 2);
}

#[tokio::test]
async fn unknown_user_surfaces_status_and_leaves_cache_alone() {
    let h = common::harness(InMemoryExecutor::new(), UnlimitedLimiter::new()).await;

    let err = h.manager.get_user("ghost").await.unwrap_err();

    assert!(matches!(err, RosterError::Status(404)));
    assert!(h.store.upserts().is_empty());
    assert!(h.sink.events().iter().any(|e| matches!(
        e,
        ClientEvent::Request(RequestOutcome::Failure { operation: "get_user", .. })
    )));
}

#[tokio::test]
async fn requests_carry_identity_and_encoded_paths() {
    let h = common::harness(InMemoryExecutor::new(), UnlimitedLimiter::new()).await;

    h.manager.create_user(UserCreationParams::new("a b/c", "neo")).await.unwrap();
    let fetched = h.manager.get_user("a b/c").await.unwrap();

    assert_eq!(fetched.user_id, "a b/c");
    let requests = h.api.requests();
    assert_eq!(requests[1].url.host_str(), Some("api-app.sendbird.com"));
    assert_eq!(requests[1].path(), "/v3/users/a%20b%2Fc");
    assert_eq!(requests[1].header("Api-Token"), Some(common::API_TOKEN));
}

#[tokio::test(start_paused = true)]
async fn rate_limited_call_fails_fast_with_telemetry() {
    let limiter = LeakyTokenBucket::new(common::limiter_config(1, Duration::from_secs(1)));
    let api = InMemoryExecutor::new().with_users([User::new("u1", "neo")]);
    let h = common::harness(api, limiter).await;

    h.manager.get_user("u1").await.unwrap();
    let err = h.manager.get_user("u1").await.unwrap_err();

    assert!(err.is_rate_limited());
    assert_eq!(h.api.call_count(), 1);
    assert!(h.sink.events().contains(&ClientEvent::Admission(AdmissionEvent::Rejected {
        operation: "get_user",
        capacity: 1,
    })));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_readers_and_writers_see_whole_records() {
    let api = InMemoryExecutor::new().with_users((0..20).map(|i| User::new(format!("u{i}"), "neo")));
    let h = common::harness(api, UnlimitedLimiter::new()).await;

    let mut tasks = Vec::new();
    for i in 0..20 {
        let manager = h.manager.clone();
        tasks.push(tokio::spawn(async move {
            manager
                .update_user(UserUpdateParams::new(format!("u{i}")).nickname(format!("nick-{i}")))
                .await
                .map(|_| ())
        }));
        let manager = h.manager.clone();
        tasks.push(tokio::spawn(async move { manager.get_users("neo").await.map(|_| ()) }));
    }
    for task in tasks {
        let outcome = task.await.unwrap();
        assert!(matches!(outcome, Ok(()) | Err(RosterError::EmptyResult(_))));
    }

    for i in 0..20 {
        let id = format!("u{i}");
        let user = h.manager.cached_user(&id).expect("cached");
        assert!(user.nickname == "neo" || user.nickname == format!("nick-{i}"));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_application_switches_each_clear_the_cache() {
    let h = common::harness(InMemoryExecutor::new(), UnlimitedLimiter::new()).await;
    assert_eq!(h.store.clears(), 1);

    let tasks: Vec<_> = (0..16)
        .map(|i| {
            let manager = h.manager.clone();
            tokio::spawn(async move { manager.init_application(format!("app-{i}"), "token").await })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(h.store.clears(), 17, "every call installed an id different from its predecessor");
    let cleared = h
        .sink
        .events()
        .into_iter()
        .filter(|e| matches!(e, ClientEvent::Cache(CacheEvent::Cleared { .. })))
        .count();
    assert_eq!(cleared, 17);
}

#[tokio::test]
async fn tower_service_can_back_the_manager() {
    let service = tower::service_fn(|request: ApiRequest| async move {
        let id = request.path().rsplit('/').next().unwrap_or_default().to_string();
        Ok::<_, RosterError>(ApiResponse::from_json(200, &json!({"user_id": id, "nickname": "svc"})))
    });
    let manager = UserManager::builder(ServiceExecutor::new(service))
        .limiter(UnlimitedLimiter::new())
        .sink(NullSink)
        .build();
    manager.init_application("app", "token").await.unwrap();

    let user = manager.get_user("u9").await.unwrap();

    assert_eq!(user, User::new("u9", "svc"));
    assert_eq!(manager.cached_user("u9"), Some(user));
}

#[tokio::test]
async fn json_config_drives_host_and_page_limit() {
    let config = ClientConfig::from_json(
        r#"{"api_host": "https://{application_id}.users.example.com", "nickname_page_limit": 25}"#,
    )
    .unwrap();
    let api = std::sync::Arc::new(InMemoryExecutor::new().with_users([User::new("u1", "neo")]));
    let manager = UserManager::builder(api.clone())
        .config(config)
        .limiter(UnlimitedLimiter::new())
        .build();
    manager.init_application("tenant", "token").await.unwrap();

    manager.get_users("neo").await.unwrap();

    let request = &api.requests()[0];
    assert_eq!(request.url.host_str(), Some("tenant.users.example.com"));
    assert_eq!(request.query_param("limit").as_deref(), Some("25"));
}
