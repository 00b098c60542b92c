//! Integration tests for the connection manager lifecycle.

mod common;

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use common::{FakeServer, Step, TOKEN, server_error, snapshot, unreachable_url, wait_until};
use livesync_client::{
    ClientConfig, ClientError, ConnectionManager, ConnectionStatus, ReconnectPolicy,
    domain::UniverseId,
    dto::websocket::{EventKind, OutboundEvent, UpdatePresenceMessage},
};

fn fast_config(url: String) -> ClientConfig {
    ClientConfig::new(url).with_reconnect(ReconnectPolicy {
        max_attempts: 2,
        initial_delay: Duration::from_millis(20),
        max_delay: Duration::from_millis(100),
        stable_after: Duration::from_secs(10),
    })
}

fn collect_errors(manager: &mut ConnectionManager) -> Arc<Mutex<Vec<ClientError>>> {
    let errors = Arc::new(Mutex::new(Vec::new()));
    let sink = errors.clone();
    manager.on_error(move |error| sink.lock().unwrap().push(error.clone()));
    errors
}

fn presence(universe_id: i64) -> OutboundEvent {
    OutboundEvent::UpdatePresence(UpdatePresenceMessage {
        universe_id,
        current_view: Some("/scenes/1".to_string()),
        cursor_position: None,
    })
}

#[tokio::test]
async fn test_rejected_token_is_not_retried() {
    // テスト項目: 認証が拒否された場合、エラーが通知され再接続されない
    // given (前提条件):
    let server = FakeServer::start(vec![]).await;
    let mut manager = ConnectionManager::new(fast_config(server.url()));
    let errors = collect_errors(&mut manager);

    // when (操作):
    manager
        .open(UniverseId::new(42), "wrong-token", "")
        .unwrap();
    let reported = wait_until(|| !errors.lock().unwrap().is_empty()).await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    // then (期待する結果):
    assert!(reported);
    let errors = errors.lock().unwrap().clone();
    assert_eq!(errors.len(), 1);
    assert!(matches!(errors[0], ClientError::Unauthorized(_)));
    assert_eq!(server.record().handshakes, 1);
    assert_eq!(server.record().rejected, 1);
    assert_eq!(manager.status(), ConnectionStatus::Disconnected);
}

#[tokio::test]
async fn test_reconnect_gives_up_after_cap() {
    // テスト項目: 接続できない場合、上限回数まで再試行した後に終了エラーが通知される
    // given (前提条件):
    let url = unreachable_url().await;
    let mut manager = ConnectionManager::new(fast_config(url));
    let errors = collect_errors(&mut manager);

    // when (操作):
    manager.open(UniverseId::new(42), TOKEN, "").unwrap();
    let exhausted = wait_until(|| {
        errors
            .lock()
            .unwrap()
            .iter()
            .any(|e| matches!(e, ClientError::ReconnectExhausted(_)))
    })
    .await;

    // then (期待する結果):
    assert!(exhausted);
    let errors = errors.lock().unwrap().clone();
    let connection_errors = errors
        .iter()
        .filter(|e| matches!(e, ClientError::ConnectionError(_)))
        .count();
    // initial attempt plus two retries
    assert_eq!(connection_errors, 3);
    assert_eq!(errors.last(), Some(&ClientError::ReconnectExhausted(2)));
    assert_eq!(manager.status(), ConnectionStatus::Disconnected);
    assert!(!manager.send(presence(42)));
}

#[tokio::test]
async fn test_reconnects_and_rejoins_after_drop() {
    // テスト項目: サーバー側で切断された場合、再接続して再び join_room を送る
    // given (前提条件):
    let server = FakeServer::start_with_drops(
        vec![vec![Step::Send(snapshot(42, &[])), Step::Disconnect]],
        1,
    )
    .await;
    let mut manager = ConnectionManager::new(fast_config(server.url()));
    let errors = collect_errors(&mut manager);

    // when (操作):
    manager.open(UniverseId::new(42), TOKEN, "/audio").unwrap();
    let rejoined = wait_until(|| server.record().messages_of("join_room").len() == 2).await;
    let connected = wait_until(|| manager.is_connected()).await;

    // then (期待する結果):
    assert!(rejoined);
    assert!(connected);
    assert_eq!(server.record().handshakes, 2);
    assert!(
        errors
            .lock()
            .unwrap()
            .iter()
            .all(|e| matches!(e, ClientError::ConnectionError(_)))
    );

    manager.close().await;
}

#[tokio::test]
async fn test_close_is_idempotent() {
    // テスト項目: close を複数回呼んでも leave_room と close は 1 回だけ送られる
    // given (前提条件):
    let server = FakeServer::start(vec![vec![Step::Send(snapshot(42, &[]))]]).await;
    let mut manager = ConnectionManager::new(fast_config(server.url()));
    manager.open(UniverseId::new(42), TOKEN, "").unwrap();
    assert!(wait_until(|| manager.is_connected()).await);

    // when (操作):
    manager.close().await;
    manager.close().await;

    // then (期待する結果):
    assert_eq!(manager.status(), ConnectionStatus::Closed);
    assert!(wait_until(|| server.record().close_frames == 1).await);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(server.record().messages_of("leave_room").len(), 1);
    assert_eq!(server.record().close_frames, 1);
    assert!(!manager.send(presence(42)));
}

#[tokio::test]
async fn test_open_replaces_previous_connection() {
    // テスト項目: close せずに open すると前の接続は leave して閉じられ、新しい接続に置き換わる
    // given (前提条件):
    let server = FakeServer::start(vec![vec![]]).await;
    let mut manager = ConnectionManager::new(fast_config(server.url()));
    manager.open(UniverseId::new(1), TOKEN, "").unwrap();
    assert!(wait_until(|| manager.is_connected()).await);

    // when (操作):
    manager.open(UniverseId::new(2), TOKEN, "").unwrap();
    let replaced = wait_until(|| {
        let record = server.record();
        record.close_frames == 1 && record.messages_of("join_room").len() == 2
    })
    .await;
    let connected = wait_until(|| manager.is_connected()).await;

    // then (期待する結果):
    assert!(replaced);
    assert!(connected);
    assert_eq!(manager.universe_id(), Some(UniverseId::new(2)));
    let record = server.record();
    let leave = record.messages_of("leave_room");
    assert_eq!(leave.len(), 1);
    assert_eq!(leave[0]["universe_id"], 1);
    assert_eq!(record.messages_of("join_room")[1]["universe_id"], 2);

    manager.close().await;
}

#[tokio::test]
async fn test_server_error_event_reaches_callback_and_handlers() {
    // テスト項目: サーバーの error イベントがエラーコールバックとハンドラの両方に届き、接続は維持される
    // given (前提条件):
    let server = FakeServer::start(vec![vec![Step::Send(server_error("room is full"))]]).await;
    let mut manager = ConnectionManager::new(fast_config(server.url()));
    let errors = collect_errors(&mut manager);
    let handled = Arc::new(Mutex::new(0usize));
    let counter = handled.clone();
    manager.on_event(EventKind::Error, move |_| *counter.lock().unwrap() += 1);

    // when (操作):
    manager.open(UniverseId::new(42), TOKEN, "").unwrap();
    let reported = wait_until(|| !errors.lock().unwrap().is_empty()).await;

    // then (期待する結果):
    assert!(reported);
    assert_eq!(
        errors.lock().unwrap()[0],
        ClientError::Server("room is full".to_string())
    );
    assert_eq!(*handled.lock().unwrap(), 1);
    assert!(manager.is_connected());

    manager.close().await;
}

#[tokio::test]
async fn test_send_only_while_connected() {
    // テスト項目: 接続前の送信は破棄され、接続後の送信はサーバーに届く
    // given (前提条件):
    let server = FakeServer::start(vec![]).await;
    let mut manager = ConnectionManager::new(fast_config(server.url()));

    // when (操作):
    let before_open = manager.send(presence(42));
    manager.open(UniverseId::new(42), TOKEN, "").unwrap();
    let while_connecting = manager.send(presence(42));
    assert!(wait_until(|| manager.is_connected()).await);
    let while_connected = manager.send(presence(42));
    let delivered = wait_until(|| server.record().messages_of("update_presence").len() == 1).await;

    // then (期待する結果):
    assert!(!before_open);
    assert!(!while_connecting);
    assert!(while_connected);
    assert!(delivered);

    manager.close().await;
}

#[tokio::test]
async fn test_open_without_token_is_noop() {
    // テスト項目: トークン無しの open は何もせず MissingToken を返す
    // given (前提条件):
    let server = FakeServer::start(vec![]).await;
    let mut manager = ConnectionManager::new(fast_config(server.url()));

    // when (操作):
    let result = manager.open(UniverseId::new(42), "   ", "");
    tokio::time::sleep(Duration::from_millis(100)).await;

    // then (期待する結果):
    assert_eq!(result, Err(ClientError::MissingToken));
    assert_eq!(manager.universe_id(), None);
    assert_eq!(manager.status(), ConnectionStatus::Disconnected);
    assert_eq!(server.record().handshakes, 0);
}

#[tokio::test]
async fn test_reconnect_cap_holds_when_server_drops_every_session() {
    // テスト項目: 接続直後に毎回切断されるサーバーでも、上限回数で再接続を諦める
    // given (前提条件):
    let server = FakeServer::start_with_drops(
        vec![vec![Step::Send(snapshot(42, &[])), Step::Disconnect]],
        1000,
    )
    .await;
    let mut manager = ConnectionManager::new(fast_config(server.url()));
    let errors = collect_errors(&mut manager);

    // when (操作):
    manager.open(UniverseId::new(42), TOKEN, "").unwrap();
    let exhausted = wait_until(|| {
        errors
            .lock()
            .unwrap()
            .iter()
            .any(|e| matches!(e, ClientError::ReconnectExhausted(_)))
    })
    .await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    // then (期待する結果):
    assert!(exhausted);
    // initial session plus two retries, then nothing more
    assert_eq!(server.record().handshakes, 3);
    assert_eq!(server.record().messages_of("join_room").len(), 3);
    let errors = errors.lock().unwrap().clone();
    assert_eq!(errors.last(), Some(&ClientError::ReconnectExhausted(2)));
    assert_eq!(manager.status(), ConnectionStatus::Disconnected);
}

#[tokio::test]
async fn test_status_sequence_across_reconnect_and_close() {
    // テスト項目: 切断・再接続・close の間の接続状態が順番通りに通知される
    // given (前提条件):
    let server = FakeServer::start_with_drops(
        vec![vec![Step::Send(snapshot(42, &[])), Step::Disconnect]],
        1,
    )
    .await;
    let mut manager = ConnectionManager::new(fast_config(server.url()));
    let history = Arc::new(Mutex::new(Vec::new()));
    let mut status = manager.subscribe_status();
    let log = history.clone();
    let watcher = tokio::spawn(async move {
        while status.changed().await.is_ok() {
            log.lock().unwrap().push(*status.borrow_and_update());
        }
    });

    // when (操作):
    manager.open(UniverseId::new(42), TOKEN, "").unwrap();
    let reconnected = wait_until(|| history.lock().unwrap().len() == 5).await;
    manager.close().await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    watcher.abort();

    // then (期待する結果):
    assert!(reconnected);
    assert_eq!(
        *history.lock().unwrap(),
        vec![
            ConnectionStatus::Connecting,
            ConnectionStatus::Connected,
            ConnectionStatus::Disconnected,
            ConnectionStatus::Reconnecting { attempt: 1 },
            ConnectionStatus::Connected,
            ConnectionStatus::Closed,
        ]
    );
}

#[tokio::test]
async fn test_sends_during_disconnect_are_not_replayed_after_rejoin() {
    // テスト項目: 切断中の送信は破棄され、再接続後に再送されない
    // given (前提条件):
    let server = FakeServer::start_with_drops(
        vec![vec![Step::Send(snapshot(42, &[])), Step::Disconnect]],
        1,
    )
    .await;
    let mut manager = ConnectionManager::new(ClientConfig::new(server.url()).with_reconnect(
        ReconnectPolicy {
            max_attempts: 2,
            initial_delay: Duration::from_millis(300),
            max_delay: Duration::from_millis(300),
            stable_after: Duration::from_secs(10),
        },
    ));
    let errors = collect_errors(&mut manager);
    manager.open(UniverseId::new(42), TOKEN, "").unwrap();
    assert!(wait_until(|| !errors.lock().unwrap().is_empty()).await);

    // when (操作):
    let while_disconnected = manager.send(presence(42));
    let rejoined = wait_until(|| {
        server.record().messages_of("join_room").len() == 2 && manager.is_connected()
    })
    .await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    let replayed = server.record().messages_of("update_presence").len();
    let after_rejoin = manager.send(presence(42));
    let delivered = wait_until(|| server.record().messages_of("update_presence").len() == 1).await;

    // then (期待する結果):
    assert!(!while_disconnected);
    assert!(rejoined);
    assert_eq!(replayed, 0);
    assert!(after_rejoin);
    assert!(delivered);

    manager.close().await;
}
