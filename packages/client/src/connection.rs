//! Connection manager: one authenticated WebSocket bound to one universe room.
//!
//! Each `open()` spawns a connection task that connects, joins the room,
//! forwards inbound frames to the dispatch table and writes outbound events.
//! Lost connections are retried with bounded exponential backoff. Errors are
//! reported through the error callback rather than returned.

use std::{
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use futures_util::{SinkExt, StreamExt, stream::SplitSink};
use tokio::{
    net::TcpStream,
    sync::{mpsc, watch},
    task::JoinHandle,
    time::Instant,
};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{
        self,
        client::IntoClientRequest,
        http::{HeaderValue, StatusCode, header::AUTHORIZATION},
        protocol::Message,
    },
};
use tracing::Instrument;
use uuid::Uuid;

use crate::{
    config::{ClientConfig, ReconnectPolicy},
    dispatch::{EventDispatcher, HandlerId},
    domain::{
        UniverseId, backoff_delay, is_stable_session, should_attempt_reconnect,
        should_exit_immediately,
    },
    dto::websocket::{
        EventKind, InboundEvent, JoinRoomMessage, LeaveRoomMessage, OutboundEvent,
    },
    error::ClientError,
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;

/// Callback receiving connection, authentication and server-pushed errors
pub type ErrorCallback = Arc<dyn Fn(&ClientError) + Send + Sync>;

/// Upper bound on waiting for the connection task during `close()`
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);
/// Upper bound on waiting for the server's close reply
const CLOSE_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(1);

/// Connection lifecycle as observed by the UI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Disconnected,
    Reconnecting { attempt: u32 },
    /// Terminal; only reachable through `close()`
    Closed,
}

enum Command {
    Send(OutboundEvent),
    Close,
}

struct ActiveConnection {
    universe_id: UniverseId,
    commands: mpsc::UnboundedSender<Command>,
    task: JoinHandle<()>,
}

pub struct ConnectionManager {
    config: ClientConfig,
    dispatcher: Arc<Mutex<EventDispatcher>>,
    status: Arc<watch::Sender<ConnectionStatus>>,
    /// Bumped on every open/close; stale tasks stop publishing status and events
    generation: Arc<AtomicU64>,
    error_callback: Option<ErrorCallback>,
    active: Option<ActiveConnection>,
}

impl ConnectionManager {
    pub fn new(config: ClientConfig) -> Self {
        let (status, _) = watch::channel(ConnectionStatus::Disconnected);
        Self {
            config,
            dispatcher: Arc::new(Mutex::new(EventDispatcher::new())),
            status: Arc::new(status),
            generation: Arc::new(AtomicU64::new(0)),
            error_callback: None,
            active: None,
        }
    }

    /// Set the error callback used by subsequent `open()` calls.
    pub fn on_error(&mut self, callback: impl Fn(&ClientError) + Send + Sync + 'static) {
        self.error_callback = Some(Arc::new(callback));
    }

    /// Register a handler for an inbound event kind.
    ///
    /// Handlers run on the connection task in registration order while the
    /// dispatch table is locked, so they must not call back into `on_event`/`off`.
    pub fn on_event(
        &self,
        kind: EventKind,
        handler: impl FnMut(&InboundEvent) + Send + 'static,
    ) -> HandlerId {
        lock(&self.dispatcher).register(kind, Box::new(handler))
    }

    pub fn off(&self, id: HandlerId) -> bool {
        lock(&self.dispatcher).deregister(id)
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.status() == ConnectionStatus::Connected
    }

    /// Universe the active connection is bound to
    pub fn universe_id(&self) -> Option<UniverseId> {
        self.active.as_ref().map(|active| active.universe_id)
    }

    /// Connect with `auth_token` and join the room of `universe_id`.
    ///
    /// A previous connection is replaced: it leaves its room and closes its
    /// transport in the background. Must be called within a Tokio runtime.
    pub fn open(
        &mut self,
        universe_id: UniverseId,
        auth_token: &str,
        current_view: &str,
    ) -> Result<(), ClientError> {
        if auth_token.trim().is_empty() {
            tracing::warn!(
                "No auth token available; not joining universe {}",
                universe_id
            );
            return Err(ClientError::MissingToken);
        }

        if let Some(previous) = self.detach_active() {
            tracing::info!(
                "Replacing connection to universe {} with universe {}",
                previous.universe_id,
                universe_id
            );
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let connection_id = Uuid::new_v4();
        let task = ConnectionTask {
            url: self.config.url.clone(),
            token: auth_token.to_string(),
            universe_id,
            current_view: current_view.to_string(),
            policy: self.config.reconnect,
            generation,
            current_generation: self.generation.clone(),
            status: self.status.clone(),
            dispatcher: self.dispatcher.clone(),
            error_callback: self.error_callback.clone(),
        };
        let span = tracing::info_span!("connection", id = %connection_id, universe = %universe_id);
        let handle = tokio::spawn(task.run(commands_rx).instrument(span));

        self.active = Some(ActiveConnection {
            universe_id,
            commands: commands_tx,
            task: handle,
        });
        Ok(())
    }

    /// Forward an event if, and only if, the transport is connected.
    ///
    /// Returns `false` when the event was dropped. Nothing is queued for later.
    pub fn send(&self, event: OutboundEvent) -> bool {
        let Some(active) = self.active.as_ref() else {
            tracing::debug!("Dropping '{}': no open connection", event.name());
            return false;
        };
        if !self.is_connected() {
            tracing::debug!("Dropping '{}' while disconnected", event.name());
            return false;
        }
        active.commands.send(Command::Send(event)).is_ok()
    }

    /// Leave the room, close the transport and release every handler.
    ///
    /// Idempotent: a no-op when already closed.
    pub async fn close(&mut self) {
        let Some(mut task) = self.shutdown() else {
            return;
        };

        if tokio::time::timeout(CLOSE_TIMEOUT, &mut task).await.is_err() {
            tracing::warn!("Connection task did not finish within {:?}; aborting", CLOSE_TIMEOUT);
            task.abort();
        }
    }

    /// Synchronous half of `close()`; the returned task finishes in the background.
    fn shutdown(&mut self) -> Option<JoinHandle<()>> {
        let active = self.detach_active()?;
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.status.send_replace(ConnectionStatus::Closed);
        lock(&self.dispatcher).clear();
        tracing::info!("Closed connection to universe {}", active.universe_id);
        Some(active.task)
    }

    fn detach_active(&mut self) -> Option<ActiveConnection> {
        let active = self.active.take()?;
        // the task may already have exited after a terminal error
        let _ = active.commands.send(Command::Close);
        Some(active)
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("url", &self.config.url)
            .field("status", &self.status())
            .field("universe_id", &self.universe_id())
            .finish_non_exhaustive()
    }
}

fn lock(dispatcher: &Mutex<EventDispatcher>) -> MutexGuard<'_, EventDispatcher> {
    dispatcher.lock().unwrap_or_else(PoisonError::into_inner)
}

enum SessionEnd {
    /// Close was requested; the task must stop
    Closed,
    /// The transport failed; eligible for reconnection
    Lost(ClientError),
}

/// State owned by one spawned connection task
struct ConnectionTask {
    url: String,
    token: String,
    universe_id: UniverseId,
    current_view: String,
    policy: ReconnectPolicy,
    generation: u64,
    current_generation: Arc<AtomicU64>,
    status: Arc<watch::Sender<ConnectionStatus>>,
    dispatcher: Arc<Mutex<EventDispatcher>>,
    error_callback: Option<ErrorCallback>,
}

impl ConnectionTask {
    async fn run(self, mut commands: mpsc::UnboundedReceiver<Command>) {
        let mut attempt: u32 = 0;

        loop {
            self.set_status(if attempt == 0 {
                ConnectionStatus::Connecting
            } else {
                ConnectionStatus::Reconnecting { attempt }
            });
            tracing::info!(
                "Attempting to connect to {} (attempt {}/{})",
                self.url,
                attempt + 1,
                self.policy.max_attempts + 1
            );

            let connected = tokio::select! {
                result = connect(&self.url, &self.token) => result,
                () = wait_for_close(&mut commands) => {
                    tracing::debug!("Close requested while connecting");
                    return;
                }
            };

            let error = match connected {
                Ok(ws) => {
                    let connected_at = Instant::now();
                    match self.drive(ws, &mut commands).await {
                        SessionEnd::Closed => return,
                        SessionEnd::Lost(error) => {
                            if is_stable_session(&self.policy, connected_at.elapsed()) {
                                attempt = 0;
                            }
                            error
                        }
                    }
                }
                Err(error) => error,
            };

            tracing::warn!("Connection lost: {}", error);
            self.report(&error);
            self.set_status(ConnectionStatus::Disconnected);

            if !should_attempt_reconnect(&error, attempt, self.policy.max_attempts) {
                if !should_exit_immediately(&error) {
                    tracing::error!(
                        "Failed to reconnect after {} attempts. Giving up.",
                        attempt
                    );
                    self.report(&ClientError::ReconnectExhausted(attempt));
                }
                return;
            }

            attempt += 1;
            let delay = backoff_delay(&self.policy, attempt);
            tracing::info!(
                "Reconnecting in {:?}... (attempt {}/{})",
                delay,
                attempt,
                self.policy.max_attempts
            );

            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = wait_for_close(&mut commands) => {
                    tracing::debug!("Close requested while waiting to reconnect");
                    return;
                }
            }
        }
    }

    /// Join the room and pump frames until the transport fails or close is requested.
    async fn drive(
        &self,
        ws: WsStream,
        commands: &mut mpsc::UnboundedReceiver<Command>,
    ) -> SessionEnd {
        let (mut write, mut read) = ws.split();

        let join = OutboundEvent::JoinRoom(JoinRoomMessage {
            universe_id: self.universe_id.value(),
            current_view: self.current_view.clone(),
        });
        if let Err(error) = send_event(&mut write, &join).await {
            return SessionEnd::Lost(error);
        }
        self.set_status(ConnectionStatus::Connected);
        tracing::info!("Joined room of universe {}", self.universe_id);

        loop {
            tokio::select! {
                message = read.next() => match message {
                    Some(Ok(Message::Text(text))) => self.deliver(&text),
                    Some(Ok(Message::Binary(data))) => {
                        tracing::debug!("Ignoring {} bytes of binary data", data.len());
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        tracing::info!("Server closed the connection");
                        return SessionEnd::Lost(ClientError::ConnectionError(
                            "Connection closed by server".to_string(),
                        ));
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        return SessionEnd::Lost(ClientError::ConnectionError(e.to_string()));
                    }
                },
                command = commands.recv() => match command {
                    Some(Command::Send(event)) => {
                        if let Err(error) = send_event(&mut write, &event).await {
                            return SessionEnd::Lost(error);
                        }
                    }
                    Some(Command::Close) | None => {
                        let leave = OutboundEvent::LeaveRoom(LeaveRoomMessage {
                            universe_id: self.universe_id.value(),
                        });
                        if let Err(error) = send_event(&mut write, &leave).await {
                            tracing::debug!("Failed to send leave_room: {}", error);
                        }
                        close_transport(&mut write).await;
                        // Wait briefly for the close reply; frames arriving now are not delivered.
                        let _ = tokio::time::timeout(CLOSE_HANDSHAKE_TIMEOUT, async {
                            while let Some(Ok(message)) = read.next().await {
                                if message.is_close() {
                                    break;
                                }
                            }
                        })
                        .await;
                        return SessionEnd::Closed;
                    }
                },
            }
        }
    }

    fn is_current(&self) -> bool {
        self.current_generation.load(Ordering::SeqCst) == self.generation
    }

    fn set_status(&self, status: ConnectionStatus) {
        if self.is_current() {
            self.status.send_replace(status);
        }
    }

    fn report(&self, error: &ClientError) {
        if !self.is_current() {
            return;
        }
        if let Some(callback) = &self.error_callback {
            callback(error);
        }
    }

    fn deliver(&self, text: &str) {
        if !self.is_current() {
            return;
        }
        let event = match serde_json::from_str::<InboundEvent>(text) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!("Dropping malformed event: {} ({})", e, text);
                return;
            }
        };
        tracing::debug!("Received '{}'", event.kind());

        if let InboundEvent::Error(error) = &event {
            tracing::warn!("Server error: {}", error.message);
            self.report(&ClientError::Server(error.message.clone()));
        }
        lock(&self.dispatcher).dispatch(&event);
    }
}

/// Resolve once close is requested (or the manager is gone).
///
/// Sends left over from a lost session are discarded here, so a rejoin never
/// replays them.
async fn wait_for_close(commands: &mut mpsc::UnboundedReceiver<Command>) {
    while let Some(command) = commands.recv().await {
        match command {
            Command::Send(event) => {
                tracing::debug!("Dropping '{}' while disconnected", event.name());
            }
            Command::Close => return,
        }
    }
}

async fn connect(url: &str, token: &str) -> Result<WsStream, ClientError> {
    let mut request = url
        .into_client_request()
        .map_err(|e| ClientError::InvalidRequest(e.to_string()))?;
    let bearer = HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|_| {
        ClientError::InvalidRequest("auth token is not a valid header value".to_string())
    })?;
    request.headers_mut().insert(AUTHORIZATION, bearer);

    match connect_async(request).await {
        Ok((ws, _response)) => Ok(ws),
        Err(tungstenite::Error::Http(response))
            if response.status() == StatusCode::UNAUTHORIZED
                || response.status() == StatusCode::FORBIDDEN =>
        {
            Err(ClientError::Unauthorized(response.status().to_string()))
        }
        Err(e) => Err(ClientError::ConnectionError(e.to_string())),
    }
}

async fn send_event(write: &mut WsSink, event: &OutboundEvent) -> Result<(), ClientError> {
    let json = serde_json::to_string(event)
        .map_err(|e| ClientError::ConnectionError(format!("Failed to serialize event: {}", e)))?;
    write
        .send(Message::Text(json.into()))
        .await
        .map_err(|e| ClientError::ConnectionError(e.to_string()))?;
    tracing::debug!("Sent '{}'", event.name());
    Ok(())
}

async fn close_transport(write: &mut WsSink) {
    if let Err(e) = write.send(Message::Close(None)).await {
        tracing::debug!("Failed to send close frame: {}", e);
    }
}
