use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use tokio::sync::watch;
use tokio::time::timeout;

use driftwood::client::ConnectionManager;
use driftwood::protocol::{self, Envelope, KEY_VIEW_UPDATED, VIEW_UPDATED};
use driftwood::router::{SOURCE_AUTHENTICATION, SOURCE_CONNECTOR, SOURCE_SESSIONS};
use driftwood::state::{ConnectionState, LoginState, ProductId, Snapshot, Store};
use driftwood::transport::TransportError;
use driftwood::transport::mock::{DialOutcome, ScriptedDialer, channel_transport};

fn frame(source: &str, payload_type: Option<&str>, payload: Value) -> Vec<u8> {
    let envelope = Envelope {
        source: source.to_string(),
        payload_type: payload_type.map(str::to_string),
        payload,
    };
    protocol::encode_envelope(&envelope).expect("encode fixture")
}

fn login_frame(status: &str) -> Vec<u8> {
    frame(
        SOURCE_AUTHENTICATION,
        Some(VIEW_UPDATED),
        json!({ "newState": { "loginStatus": status } }),
    )
}

fn session_add_frame(session: &str, product: &str) -> Vec<u8> {
    frame(
        SOURCE_SESSIONS,
        Some(KEY_VIEW_UPDATED),
        json!({ "key": session, "newValue": { "productId": product } }),
    )
}

fn session_remove_frame(session: &str) -> Vec<u8> {
    frame(
        SOURCE_SESSIONS,
        Some(KEY_VIEW_UPDATED),
        json!({ "key": session, "newValue": null }),
    )
}

async fn wait_until(
    rx: &mut watch::Receiver<Snapshot>,
    predicate: impl FnMut(&Snapshot) -> bool,
) -> Snapshot {
    timeout(Duration::from_secs(30), rx.wait_for(predicate))
        .await
        .expect("timed out waiting for snapshot")
        .expect("store closed")
        .clone()
}

async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn dialing_reports_connecting() {
    let store = Arc::new(Store::new());
    // Empty script: the dial parks, so the state holds at Connecting.
    let dialer = Arc::new(ScriptedDialer::new(vec![]));
    let manager = ConnectionManager::new(dialer.clone(), store.clone());
    let mut updates = store.subscribe();

    manager.open();
    wait_until(&mut updates, |s| s.connection == ConnectionState::Connecting).await;
    assert_eq!(dialer.dials(), 1);

    manager.close();
    assert_eq!(store.connection(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn frames_apply_in_arrival_order() {
    let (handle, transport) = channel_transport();
    let store = Arc::new(Store::new());
    let dialer = Arc::new(ScriptedDialer::new(vec![DialOutcome::Connect(transport)]));
    let manager = ConnectionManager::new(dialer, store.clone());
    let mut updates = store.subscribe();

    manager.open();
    wait_until(&mut updates, |s| s.connection == ConnectionState::Connected).await;

    handle.send_frame(login_frame("LOGGED_IN"));
    handle.send_frame(login_frame("MULTIFACTOR_REQUIRED"));
    handle.send_frame(frame(SOURCE_CONNECTOR, None, json!(true)));

    // The connector frame was sent last, so once it lands the login slice
    // must already hold the last-written status.
    let snapshot = wait_until(&mut updates, |s| s.connector_linked).await;
    assert_eq!(snapshot.login, LoginState::MultifactorRequired);
    assert!(snapshot.sessions.is_empty());
    assert_eq!(snapshot.connection, ConnectionState::Connected);

    manager.close();
}

#[tokio::test]
async fn undecodable_frame_is_dropped_without_killing_the_connection() {
    let (handle, transport) = channel_transport();
    let store = Arc::new(Store::new());
    let dialer = Arc::new(ScriptedDialer::new(vec![DialOutcome::Connect(transport)]));
    let manager = ConnectionManager::new(dialer.clone(), store.clone());
    let mut updates = store.subscribe();

    manager.open();
    wait_until(&mut updates, |s| s.connection == ConnectionState::Connected).await;

    handle.send_frame(login_frame("LOGGED_IN"));
    wait_until(&mut updates, |s| s.login == LoginState::LoggedIn).await;

    // Reserved tag, then a truncated envelope: both must be dropped.
    handle.send_frame(vec![0xc1]);
    let mut truncated = login_frame("LOGGED_OUT");
    truncated.truncate(truncated.len() / 2);
    handle.send_frame(truncated);

    handle.send_frame(session_add_frame("s1", "p1"));
    let snapshot = wait_until(&mut updates, |s| s.sessions.session_count() == 1).await;

    assert_eq!(snapshot.connection, ConnectionState::Connected);
    assert_eq!(snapshot.login, LoginState::LoggedIn);
    assert_eq!(dialer.dials(), 1);

    manager.close();
}

#[tokio::test]
async fn session_lifecycle_over_the_wire() {
    let (handle, transport) = channel_transport();
    let store = Arc::new(Store::new());
    let dialer = Arc::new(ScriptedDialer::new(vec![DialOutcome::Connect(transport)]));
    let manager = ConnectionManager::new(dialer, store.clone());
    let mut updates = store.subscribe();

    manager.open();
    wait_until(&mut updates, |s| s.connection == ConnectionState::Connected).await;

    handle.send_frame(session_add_frame("s1", "p1"));
    wait_until(&mut updates, |s| s.sessions.session_count() == 1).await;

    handle.send_frame(session_add_frame("s1", "p1"));
    handle.send_frame(session_add_frame("s2", "p1"));
    let snapshot = wait_until(&mut updates, |s| s.sessions.session_count() == 2).await;
    let p1 = ProductId("p1".to_string());
    assert_eq!(snapshot.sessions.sessions_for(&p1).map(|s| s.len()), Some(2));

    handle.send_frame(session_remove_frame("s1"));
    wait_until(&mut updates, |s| s.sessions.session_count() == 1).await;

    handle.send_frame(frame(
        SOURCE_SESSIONS,
        Some(VIEW_UPDATED),
        json!({ "newState": { "s9": { "productId": "p9" } } }),
    ));
    let snapshot = wait_until(&mut updates, |s| {
        s.sessions.sessions_for(&ProductId("p9".to_string())).is_some()
    })
    .await;
    assert_eq!(snapshot.sessions.sessions_for(&p1), None);
    assert_eq!(snapshot.sessions.product_count(), 1);
    assert_eq!(snapshot.sessions.session_count(), 1);

    manager.close();
}

#[tokio::test]
async fn clean_close_parks_until_reopened() {
    let (h1, t1) = channel_transport();
    let (_h2, t2) = channel_transport();
    let store = Arc::new(Store::new());
    let dialer = Arc::new(ScriptedDialer::new(vec![
        DialOutcome::Connect(t1),
        DialOutcome::Connect(t2),
    ]));
    let manager = ConnectionManager::new(dialer.clone(), store.clone());
    let mut updates = store.subscribe();

    manager.open();
    wait_until(&mut updates, |s| s.connection == ConnectionState::Connected).await;

    h1.close();
    wait_until(&mut updates, |s| s.connection == ConnectionState::Disconnected).await;
    settle().await;
    // No reconnect after a clean remote close.
    assert_eq!(dialer.dials(), 1);

    manager.open();
    wait_until(&mut updates, |s| s.connection == ConnectionState::Connected).await;
    assert_eq!(dialer.dials(), 2);

    manager.close();
}

#[tokio::test]
async fn open_is_a_no_op_while_live() {
    let (_handle, transport) = channel_transport();
    let store = Arc::new(Store::new());
    let dialer = Arc::new(ScriptedDialer::new(vec![DialOutcome::Connect(transport)]));
    let manager = ConnectionManager::new(dialer.clone(), store.clone());
    let mut updates = store.subscribe();

    manager.open();
    wait_until(&mut updates, |s| s.connection == ConnectionState::Connected).await;

    manager.open();
    manager.open();
    settle().await;
    assert_eq!(dialer.dials(), 1);

    manager.close();
}

#[tokio::test(start_paused = true)]
async fn transport_error_schedules_exactly_one_reconnect() {
    let (h1, t1) = channel_transport();
    let (_h2, t2) = channel_transport();
    let store = Arc::new(Store::new());
    let dialer = Arc::new(ScriptedDialer::new(vec![
        DialOutcome::Connect(t1),
        DialOutcome::Connect(t2),
    ]));
    let backoff = Duration::from_secs(1);
    let manager =
        ConnectionManager::new(dialer.clone(), store.clone()).with_backoff(backoff);
    let mut updates = store.subscribe();

    manager.open();
    wait_until(&mut updates, |s| s.connection == ConnectionState::Connected).await;
    assert_eq!(dialer.dials(), 1);

    h1.fail(TransportError::Connection("connection reset".into()));
    wait_until(&mut updates, |s| s.connection == ConnectionState::Error).await;
    // The retry waits out the backoff; no dial yet.
    assert_eq!(dialer.dials(), 1);

    wait_until(&mut updates, |s| s.connection == ConnectionState::Connected).await;
    assert_eq!(dialer.dials(), 2);

    // One error, one retry: nothing else fires afterwards.
    tokio::time::advance(backoff * 10).await;
    settle().await;
    assert_eq!(dialer.dials(), 2);
    assert_eq!(store.connection(), ConnectionState::Connected);

    manager.close();
}

#[tokio::test(start_paused = true)]
async fn close_cancels_a_pending_reconnect() {
    let store = Arc::new(Store::new());
    let dialer = Arc::new(ScriptedDialer::new(vec![DialOutcome::Fail(
        TransportError::Connect("connection refused".into()),
    )]));
    let backoff = Duration::from_secs(1);
    let manager =
        ConnectionManager::new(dialer.clone(), store.clone()).with_backoff(backoff);
    let mut updates = store.subscribe();

    manager.open();
    wait_until(&mut updates, |s| s.connection == ConnectionState::Error).await;
    assert_eq!(dialer.dials(), 1);

    manager.close();
    assert_eq!(store.connection(), ConnectionState::Disconnected);

    tokio::time::advance(backoff * 10).await;
    settle().await;
    assert_eq!(dialer.dials(), 1);
    assert_eq!(store.connection(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn open_after_close_is_a_no_op() {
    let (_handle, transport) = channel_transport();
    let store = Arc::new(Store::new());
    let dialer = Arc::new(ScriptedDialer::new(vec![DialOutcome::Connect(transport)]));
    let manager = ConnectionManager::new(dialer.clone(), store.clone());
    let mut updates = store.subscribe();

    manager.open();
    wait_until(&mut updates, |s| s.connection == ConnectionState::Connected).await;

    manager.close();
    assert!(manager.is_closed());
    assert_eq!(store.connection(), ConnectionState::Disconnected);

    manager.open();
    settle().await;
    assert_eq!(dialer.dials(), 1);
    assert_eq!(store.connection(), ConnectionState::Disconnected);
}
