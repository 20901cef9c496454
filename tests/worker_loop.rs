//! Worker-loop tests for the fatal and shutdown exit paths.

use std::collections::HashMap;
use std::time::Duration;

use axum::routing::get;
use axum::{Json, Router};

use mailspend::{runner, Config, Shutdown};

/// Stub project API answering only the connectivity probe.
async fn spawn_cospend_stub() -> String {
    let app = Router::new().route(
        "/api/projects/test/members",
        get(|| async { Json(serde_json::json!({"categories": {}, "paymentmodes": {}, "members": []})) }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}/api/projects/test", addr)
}

/// A local port with nothing listening on it.
async fn refused_port() -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

fn config_for(cospend_url: &str, imap_port: u16, interval: u64, dir: &std::path::Path) -> Config {
    Config {
        imap_host: "127.0.0.1".to_string(),
        imap_user: "user".to_string(),
        imap_password: "pass".to_string(),
        imap_inbox: "Inbox".to_string(),
        imap_port,
        cospend_project_url: cospend_url.to_string(),
        cospend_project_password: None,
        cospend_payed_for: "1".to_string(),
        cospend_payer: "1".to_string(),
        cospend_categoryid_default: 1,
        cospend_paymentmodeid_default: 1,
        interval,
        since: "2024-03-01".to_string(),
        published_ids_file: dir.join("published_ids.txt"),
        adapter_env: HashMap::new(),
    }
}

#[tokio::test]
async fn test_unreachable_project_fails_at_startup() {
    let dead_port = refused_port().await;
    let dir = tempfile::tempdir().unwrap();
    let config = config_for(
        &format!("http://127.0.0.1:{}/api/projects/test", dead_port),
        993,
        0,
        dir.path(),
    );

    let result = runner::run(config, Shutdown::new(), false).await;
    let err = result.unwrap_err();
    assert!(err.to_string().contains("no connection to the cospend project"));
}

#[tokio::test]
async fn test_mailbox_connect_exhaustion_is_fatal() {
    let cospend_url = spawn_cospend_stub().await;
    let imap_port = refused_port().await;
    let dir = tempfile::tempdir().unwrap();
    // interval 0 keeps the backoff waits at zero so all attempts run fast.
    let config = config_for(&cospend_url, imap_port, 0, dir.path());

    let result = tokio::time::timeout(Duration::from_secs(30), runner::run(config, Shutdown::new(), false))
        .await
        .expect("run did not finish within the timeout");

    let err = result.unwrap_err();
    assert!(err.to_string().contains("no connection to the imap server"));
}

#[tokio::test]
async fn test_shutdown_during_connect_backoff_exits_cleanly() {
    let cospend_url = spawn_cospend_stub().await;
    let imap_port = refused_port().await;
    let dir = tempfile::tempdir().unwrap();
    // interval 30 would keep the loop waiting for minutes without the signal.
    let config = config_for(&cospend_url, imap_port, 30, dir.path());

    let shutdown = Shutdown::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.trigger();
    });

    let result = tokio::time::timeout(Duration::from_secs(10), runner::run(config, shutdown, false))
        .await
        .expect("shutdown was not observed during backoff");
    assert!(result.is_ok());
}
