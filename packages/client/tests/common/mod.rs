//! In-process fake universe server for integration tests.
//!
//! Speaks the live sync event contract over axum WebSockets: it checks the
//! bearer token, records every frame it receives and replies with scripted
//! stages. Stage 0 is sent after `join_room`, stage n after the n-th
//! `update_presence` on the same connection.

#![allow(dead_code)]

use std::{
    net::SocketAddr,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use axum::{
    Router,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::{IntoResponse, Response},
    routing::get,
};
use serde_json::{Value, json};
use tokio::task::JoinHandle;

pub const TOKEN: &str = "test-token";

/// One scripted server action
#[derive(Debug, Clone)]
pub enum Step {
    Send(Value),
    /// Drop the socket without a close frame (only while drops remain)
    Disconnect,
}

#[derive(Debug, Clone, Default)]
pub struct Record {
    pub handshakes: usize,
    pub rejected: usize,
    pub messages: Vec<Value>,
    pub close_frames: usize,
}

impl Record {
    pub fn messages_of(&self, event_type: &str) -> Vec<Value> {
        self.messages
            .iter()
            .filter(|message| message["type"] == event_type)
            .cloned()
            .collect()
    }
}

struct ServerState {
    token: String,
    stages: Vec<Vec<Step>>,
    drops_remaining: AtomicUsize,
    record: Mutex<Record>,
}

pub struct FakeServer {
    addr: SocketAddr,
    state: Arc<ServerState>,
    handle: JoinHandle<()>,
}

impl FakeServer {
    pub async fn start(stages: Vec<Vec<Step>>) -> Self {
        Self::start_with_drops(stages, 0).await
    }

    /// Start a server whose `Step::Disconnect` fires at most `drops` times
    pub async fn start_with_drops(stages: Vec<Vec<Step>>, drops: usize) -> Self {
        let state = Arc::new(ServerState {
            token: TOKEN.to_string(),
            stages,
            drops_remaining: AtomicUsize::new(drops),
            record: Mutex::new(Record::default()),
        });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind fake server");
        let addr = listener.local_addr().expect("Failed to read local addr");
        let app = Router::new()
            .route("/ws", get(websocket_handler))
            .with_state(state.clone());
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Self {
            addr,
            state,
            handle,
        }
    }

    pub fn url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    pub fn record(&self) -> Record {
        self.state.record.lock().unwrap().clone()
    }
}

impl Drop for FakeServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn websocket_handler(
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    State(state): State<Arc<ServerState>>,
) -> Response {
    let expected = format!("Bearer {}", state.token);
    let authorized = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        == Some(expected.as_str());

    {
        let mut record = state.record.lock().unwrap();
        record.handshakes += 1;
        if !authorized {
            record.rejected += 1;
        }
    }

    if !authorized {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: Arc<ServerState>) {
    let mut presence_updates = 0;

    while let Some(Ok(message)) = socket.recv().await {
        match message {
            Message::Text(text) => {
                let value: Value = serde_json::from_str(text.as_str()).unwrap_or(Value::Null);
                let stage = match value["type"].as_str() {
                    Some("join_room") => Some(0),
                    Some("update_presence") => {
                        presence_updates += 1;
                        Some(presence_updates)
                    }
                    _ => None,
                };
                state.record.lock().unwrap().messages.push(value);

                let Some(steps) = stage.and_then(|index| state.stages.get(index)) else {
                    continue;
                };
                for step in steps {
                    match step {
                        Step::Send(frame) => {
                            if socket
                                .send(Message::Text(frame.to_string().into()))
                                .await
                                .is_err()
                            {
                                return;
                            }
                        }
                        Step::Disconnect => {
                            let dropped = state
                                .drops_remaining
                                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                                    n.checked_sub(1)
                                })
                                .is_ok();
                            if dropped {
                                return;
                            }
                        }
                    }
                }
            }
            Message::Close(_) => {
                state.record.lock().unwrap().close_frames += 1;
                break;
            }
            _ => {}
        }
    }
}

// ========================================
// Frame builders
// ========================================

pub fn snapshot(universe_id: i64, users: &[(i64, &str)]) -> Value {
    let collaborators: Vec<Value> = users
        .iter()
        .map(|(id, username)| {
            json!({
                "user": { "id": id, "username": username },
                "current_view": "",
            })
        })
        .collect();
    json!({
        "type": "universe_state",
        "universe": {
            "id": universe_id,
            "name": "Nebula",
            "is_public": true,
            "collaborators": collaborators,
            "parameters": { "physics": { "gravity": 9.81 } },
        }
    })
}

pub fn user_joined(id: i64, username: &str) -> Value {
    json!({
        "type": "user_joined",
        "user": { "id": id, "username": username },
        "current_view": "/scenes/1",
    })
}

pub fn user_left(id: i64) -> Value {
    json!({ "type": "user_left", "user_id": id })
}

pub fn parameter_updated(group: &str, name: &str, value: f64) -> Value {
    json!({
        "type": "parameter_updated",
        "group": group,
        "parameter_name": name,
        "value": value,
    })
}

pub fn server_error(message: &str) -> Value {
    json!({ "type": "error", "message": message })
}

// ========================================
// Polling helpers
// ========================================

/// Poll `condition` until it holds or five seconds pass
pub async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    condition()
}

/// Port that was free a moment ago; connecting to it is refused
pub async fn unreachable_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind probe listener");
    let addr = listener.local_addr().expect("Failed to read local addr");
    drop(listener);
    format!("ws://{}/ws", addr)
}
