//! End-to-end gateway behavior against the in-memory collaborators.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use blaze_core::memory::{memory_backend, MemoryStore, WriteKind};
use blaze_core::{
    AuditStamper, Backend, Connection, DispatchOutcome, MutationRequest, RawMutationRequest,
    SanitizingMutationGateway, StaticEnvironment, StoreError, Value,
};
use serde_json::json;
use tokio::sync::mpsc;

const CHROME_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

fn browser_stamper() -> AuditStamper {
    AuditStamper::new(Arc::new(StaticEnvironment {
        user_agent: Some(CHROME_UA.to_string()),
        platform: Some("Win32".to_string()),
        language: Some("en-US".to_string()),
        screen_resolution: Some("1920x1080".to_string()),
    }))
}

fn setup() -> (SanitizingMutationGateway, Arc<MemoryStore>) {
    let (backend, store, _auth, _blobs) = memory_backend();
    let gateway =
        SanitizingMutationGateway::with_stamper(Connection::initialized(backend), browser_stamper());
    (gateway, store)
}

#[tokio::test]
async fn update_records_payload_and_one_audit_block() -> Result<()> {
    let (gateway, store) = setup();

    gateway
        .dispatch(
            MutationRequest::update(
                "users/42",
                Value::object([("name", Value::from("Ann")), ("age", Value::Absent)]),
            )
            .by("admin"),
        )
        .await?;

    let writes = store.writes();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].kind, WriteKind::Update);
    assert_eq!(writes[0].path, "users/42");

    let written = writes[0].value.as_object().expect("object payload");
    let keys: Vec<&str> = written.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["name", "updatedAt", "updatedBy"]);
    assert_eq!(written["name"], Value::from("Ann"));

    let by = &written["updatedBy"];
    assert_eq!(by.get("actorId"), Some(&Value::from("admin")));
    assert_eq!(by.pointer("clientContext/browser"), Some(&Value::from("Chrome")));
    assert_eq!(
        by.pointer("clientContext/screenResolution"),
        Some(&Value::from("1920x1080"))
    );
    // One instant feeds both fields
    assert_eq!(by.get("timestamp"), Some(&written["updatedAt"]));
    Ok(())
}

#[tokio::test]
async fn create_overwrites_spoofed_audit_fields() -> Result<()> {
    let (gateway, store) = setup();

    gateway
        .create(
            "posts/1",
            Value::from(json!({
                "title": "Hello",
                "createdBy": "mallory",
                "meta": {"draft": null}
            })),
            None,
        )
        .await?;

    let written = store.writes().remove(0).value;
    let fields = written.as_object().expect("object payload");
    assert_eq!(fields.len(), 4);
    assert_eq!(
        written.pointer("createdBy/actorId"),
        Some(&Value::from("anonymous"))
    );
    assert!(fields.get("updatedAt").is_none());
    // Nulls the caller sent survive cleaning
    assert_eq!(written.pointer("meta/draft"), Some(&Value::Null));
    Ok(())
}

#[tokio::test]
async fn create_with_id_then_get_returns_merged_payload() -> Result<()> {
    let (gateway, _store) = setup();

    let key = gateway
        .create_with_id(
            "messages",
            Value::object([("text", Value::from("hi")), ("draft", Value::Absent)]),
            Some("u7"),
        )
        .await?;
    assert_eq!(key.len(), 20);

    let stored = gateway.get(&format!("messages/{key}")).await?;
    assert_eq!(stored.get("text"), Some(&Value::from("hi")));
    assert_eq!(stored.get("draft"), None);
    assert_eq!(
        stored.pointer("createdBy/actorId"),
        Some(&Value::from("u7"))
    );
    assert!(stored.get("createdAt").and_then(Value::as_str).is_some());
    Ok(())
}

#[tokio::test]
async fn uninitialized_wins_over_every_other_check() {
    let gateway = SanitizingMutationGateway::new(Connection::new());

    let typed = gateway
        .dispatch(MutationRequest::create("", Value::Absent))
        .await
        .unwrap_err();
    assert!(typed.is_not_initialized());

    let raw = RawMutationRequest {
        path: "".to_string(),
        action: Some("upsert".to_string()),
        data: None,
        action_by: None,
    };
    let err = gateway.dispatch_raw(raw, None).await.unwrap_err();
    assert!(err.is_not_initialized());
}

#[tokio::test]
async fn raw_requests_validate_path_before_action() -> Result<()> {
    let (gateway, store) = setup();

    let raw: RawMutationRequest =
        serde_json::from_value(json!({"path": " ", "action": "upsert", "data": {}}))?;
    assert!(gateway.dispatch_raw(raw, None).await.unwrap_err().is_validation());

    let raw: RawMutationRequest =
        serde_json::from_value(json!({"path": "a", "action": "upsert", "data": {}}))?;
    assert!(gateway
        .dispatch_raw(raw, None)
        .await
        .unwrap_err()
        .is_unsupported_action());

    let raw: RawMutationRequest = serde_json::from_value(json!({"path": "a", "action": "create"}))?;
    assert!(gateway.dispatch_raw(raw, None).await.unwrap_err().is_validation());

    assert!(store.writes().is_empty());

    let raw: RawMutationRequest = serde_json::from_value(
        json!({"path": "a", "action": "createWithId", "data": {"x": 1}, "actionBy": "cli"}),
    )?;
    match gateway.dispatch_raw(raw, None).await? {
        DispatchOutcome::GeneratedKey(key) => assert!(!key.is_empty()),
        other => panic!("expected a key, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn missing_database_is_not_initialized() {
    let connection = Connection::initialized(Backend::new());
    let gateway = SanitizingMutationGateway::new(connection);
    let err = gateway.get("anything").await.unwrap_err();
    assert!(err.is_not_initialized());
}

#[tokio::test]
async fn delete_removes_subtree() -> Result<()> {
    let (gateway, store) = setup();
    gateway
        .create("items/1", Value::object([("n", 1)]), None)
        .await?;
    gateway.delete("items/1").await?;

    assert_eq!(gateway.get("items/1").await?, Value::Null);
    assert_eq!(store.writes()[1].kind, WriteKind::Remove);
    Ok(())
}

#[tokio::test]
async fn subscription_delivers_until_unsubscribed() -> Result<()> {
    let (gateway, store) = setup();
    let (tx, mut rx) = mpsc::unbounded_channel();

    let handle = gateway
        .subscribe(
            "status",
            Arc::new(move |value: Value| {
                let _ = tx.send(value);
            }),
            None,
        )
        .await?;

    assert_eq!(rx.recv().await, Some(Value::Null));

    store.seed("status", Value::from("online"))?;
    assert_eq!(rx.recv().await, Some(Value::from("online")));

    handle.unsubscribe();
    handle.unsubscribe();
    assert!(!handle.is_active());

    store.seed("status", Value::from("offline"))?;
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(rx.try_recv().is_err());
    Ok(())
}

#[tokio::test]
async fn subscription_errors_reach_the_error_handler() -> Result<()> {
    let (gateway, store) = setup();
    let (tx, mut rx) = mpsc::unbounded_channel();

    let handle = gateway
        .subscribe(
            "status",
            Arc::new(|_: Value| {}),
            Some(Arc::new(move |err: StoreError| {
                let _ = tx.send(err);
            })),
        )
        .await?;

    // Let the listener attach before the error is raised
    tokio::time::sleep(Duration::from_millis(20)).await;
    store.inject_subscription_error("status", StoreError::network("socket closed"));

    assert_eq!(rx.recv().await, Some(StoreError::network("socket closed")));
    handle.unsubscribe();
    Ok(())
}

#[tokio::test]
async fn store_failures_are_reported_with_operation_and_path() {
    let (gateway, store) = setup();
    store.fail_next(StoreError::Quota {
        message: "write too large".to_string(),
    });

    let err = gateway
        .create_with_id("uploads", Value::empty_object(), None)
        .await
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        "Backing store rejected createWithId at 'uploads': Quota exceeded: write too large"
    );
}
