use roster::prelude::*;
use roster::telemetry::{AdmissionEvent, ClientEvent};
use roster_jsonl::JsonlSink;
use tower_service::Service;

#[tokio::test]
async fn writes_json_lines() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("events.jsonl");
    let mut sink = JsonlSink::new(&path);

    sink.call(ClientEvent::Admission(AdmissionEvent::Rejected {
        operation: "create_user",
        capacity: 10,
    }))
    .await
    .unwrap();

    let contents = std::fs::read_to_string(&path).expect("file");
    let line: serde_json::Value = serde_json::from_str(contents.trim_end()).unwrap();
    assert_eq!(line["kind"], "admission_rejected");
    assert_eq!(line["capacity"], 10);
}

#[tokio::test]
async fn manager_events_are_appended_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("manager.jsonl");
    let manager = UserManager::builder(InMemoryExecutor::new())
        .limiter(UnlimitedLimiter::new())
        .sink(JsonlSink::new(&path))
        .build();
    manager.init_application("app", "token").await.unwrap();
    manager.create_user(UserCreationParams::new("u1", "neo")).await.unwrap();

    let kinds: Vec<String> = std::fs::read_to_string(&path)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str::<serde_json::Value>(l).unwrap()["kind"].to_string())
        .collect();
    assert_eq!(
        kinds,
        vec!["\"cache_cleared\"", "\"admission_admitted\"", "\"request_success\""]
    );
}
