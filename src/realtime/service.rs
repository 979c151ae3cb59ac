//! The realtime channel service.
//!
//! A [`RealtimeService`] owns at most one background connection task. The
//! task holds the socket, dispatches inbound messages to listeners and runs
//! the reconnect loop, including the backoff timer. The public handle talks
//! to it over a command channel, so `disconnect()` and a superseding
//! `connect()` can always cancel a pending reconnect.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::auth::{redact, AuthToken};
use crate::config::Config;
use crate::errors::{RealtimeError, Result};
use crate::models::{Envelope, EventKind, EventPayload};

use super::backoff::ReconnectPolicy;
use super::listeners::{Callback, ListenerId, ListenerRegistry};
use super::state::ConnectionState;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Commands from the public handle to the connection task.
enum Command {
    Send(String),
    Close,
}

/// How a session ended.
#[derive(Debug)]
struct SessionEnd {
    code: Option<u16>,
    reason: String,
    was_clean: bool,
}

impl SessionEnd {
    fn unclean(reason: impl Into<String>) -> Self {
        Self {
            code: None,
            reason: reason.into(),
            was_clean: false,
        }
    }

    fn payload(&self) -> Value {
        json!({
            "code": self.code,
            "reason": self.reason,
            "wasClean": self.was_clean,
        })
    }
}

/// State shared between the handle and the connection task.
struct Shared {
    policy: ReconnectPolicy,
    connect_timeout: Duration,
    close_timeout: Duration,
    listeners: Mutex<ListenerRegistry>,
    state: watch::Sender<ConnectionState>,
    attempts: AtomicU32,
    /// Bumped by every `connect()`/`disconnect()`. A task only publishes
    /// state while its generation is current.
    generation: Mutex<u64>,
}

impl Shared {
    /// Start a new generation, superseding any running task.
    fn advance(&self, state: ConnectionState) -> u64 {
        let mut generation = lock(&self.generation);
        *generation += 1;
        self.attempts.store(0, Ordering::SeqCst);
        self.set_state(state);
        *generation
    }

    fn is_current(&self, generation: u64) -> bool {
        *lock(&self.generation) == generation
    }

    /// Publish state and attempts for `generation`. False once superseded.
    fn publish(&self, generation: u64, state: ConnectionState, attempts: Option<u32>) -> bool {
        let current = lock(&self.generation);
        if *current != generation {
            return false;
        }
        if let Some(attempts) = attempts {
            self.attempts.store(attempts, Ordering::SeqCst);
        }
        self.set_state(state);
        true
    }

    /// Emit on behalf of a connection task, unless it has been superseded.
    fn emit_for(&self, generation: u64, kind: EventKind, payload: &Value) {
        if self.is_current(generation) {
            self.emit(kind, payload);
        }
    }

    fn set_state(&self, state: ConnectionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            tracing::debug!("Realtime channel state: {} -> {}", previous, state);
        }
    }

    fn emit(&self, kind: EventKind, payload: &Value) {
        // Callbacks may register or remove listeners, so never call them under the lock.
        let callbacks = lock(&self.listeners).snapshot(kind);
        for callback in callbacks {
            callback(payload);
        }
    }

    fn dispatch_text(&self, text: &str) {
        let envelope = match Envelope::parse(text) {
            Ok(envelope) => envelope,
            Err(err) => {
                tracing::warn!("Dropping malformed realtime message: {}", err);
                return;
            }
        };

        match EventKind::from_message_type(&envelope.message_type) {
            Some(kind) => self.emit(kind, &envelope.payload),
            None => tracing::warn!(
                "Unknown realtime message type: {}",
                envelope.message_type
            ),
        }
    }
}

struct ConnectionHandle {
    cmd_tx: mpsc::UnboundedSender<Command>,
    task: JoinHandle<()>,
}

struct Inner {
    endpoint: Url,
    shared: Arc<Shared>,
    connection: Mutex<Option<ConnectionHandle>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        let connection = self
            .connection
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = connection.take() {
            handle.task.abort();
        }
    }
}

/// Handle to the realtime notification channel.
///
/// Construct one at startup and clone it into whatever needs realtime events;
/// all clones share the same connection and listeners. The connection task
/// is aborted once the last clone is dropped.
#[derive(Clone)]
pub struct RealtimeService {
    inner: Arc<Inner>,
}

impl RealtimeService {
    /// Create a disconnected service for the configured endpoint.
    pub fn new(config: &Config) -> Result<Self> {
        let endpoint = config.endpoint()?;
        let (state, _) = watch::channel(ConnectionState::Disconnected);

        Ok(Self {
            inner: Arc::new(Inner {
                endpoint,
                shared: Arc::new(Shared {
                    policy: config.reconnect_policy(),
                    connect_timeout: config.connect_timeout,
                    close_timeout: config.close_timeout,
                    listeners: Mutex::new(ListenerRegistry::new()),
                    state,
                    attempts: AtomicU32::new(0),
                    generation: Mutex::new(0),
                }),
                connection: Mutex::new(None),
            }),
        })
    }

    /// Open the channel with the session token.
    ///
    /// Does nothing while connected or while a connection attempt is in
    /// flight. While waiting out a reconnect backoff, or after reconnects
    /// were exhausted, the old attempt is cancelled and a fresh one starts
    /// with the attempt counter reset.
    ///
    /// Must be called from within a Tokio runtime; otherwise
    /// `RealtimeError::Runtime` is returned and nothing changes.
    pub fn connect(&self, token: &str) -> Result<()> {
        let token = AuthToken::new(token).map_err(|err| {
            tracing::error!("No auth token provided, not opening realtime channel");
            err
        })?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|err| RealtimeError::Runtime(format!("No Tokio runtime: {}", err)))?;

        let mut connection = lock(&self.inner.connection);
        let shared = &self.inner.shared;

        match *shared.state.borrow() {
            ConnectionState::Connected | ConnectionState::Connecting => {
                tracing::debug!("Realtime channel already connected or connecting");
                return Ok(());
            }
            ConnectionState::Disconnected => {}
        }

        if let Some(previous) = connection.take() {
            previous.task.abort();
        }

        let generation = shared.advance(ConnectionState::Connecting);

        let url = token.apply_to(&self.inner.endpoint);
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let task = runtime.spawn(run_connection(shared.clone(), generation, url, cmd_rx));

        *connection = Some(ConnectionHandle { cmd_tx, task });
        Ok(())
    }

    /// Register a callback for `kind`. Callbacks run in registration order.
    pub fn on<F>(&self, kind: EventKind, callback: F) -> ListenerId
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let callback: Callback = Arc::new(callback);
        lock(&self.inner.shared.listeners).add(kind, callback)
    }

    /// Register a callback that receives the payload decoded as `T`.
    ///
    /// Payloads that do not decode are logged and skipped.
    pub fn on_typed<T, F>(&self, callback: F) -> ListenerId
    where
        T: EventPayload,
        F: Fn(T) + Send + Sync + 'static,
    {
        self.on(T::KIND, move |payload| {
            match serde_json::from_value::<T>(payload.clone()) {
                Ok(decoded) => callback(decoded),
                Err(err) => tracing::warn!("Could not decode {} payload: {}", T::KIND, err),
            }
        })
    }

    /// Unregister a callback. Returns false if it was not registered.
    pub fn off(&self, kind: EventKind, id: ListenerId) -> bool {
        lock(&self.inner.shared.listeners).remove(kind, id)
    }

    /// Invoke every listener for `kind` with `payload`.
    pub fn emit(&self, kind: EventKind, payload: &Value) {
        self.inner.shared.emit(kind, payload);
    }

    /// Send `{type, payload}` if the connection is open.
    ///
    /// Messages sent while not connected are dropped, never queued. Returns
    /// whether the message was handed to the socket.
    pub fn send<T: Serialize>(&self, message_type: &str, payload: &T) -> bool {
        if self.state() != ConnectionState::Connected {
            tracing::warn!(
                "Realtime channel not connected, dropping '{}' message",
                message_type
            );
            return false;
        }

        let text = match serde_json::to_value(payload)
            .map_err(RealtimeError::from)
            .and_then(|payload| Envelope::new(message_type, payload).to_json())
        {
            Ok(text) => text,
            Err(err) => {
                tracing::warn!("Could not encode '{}' message: {}", message_type, err);
                return false;
            }
        };

        match lock(&self.inner.connection).as_ref() {
            Some(handle) => handle.cmd_tx.send(Command::Send(text)).is_ok(),
            None => false,
        }
    }

    /// Close the channel with a normal closure and forget all listeners.
    ///
    /// Cancels any pending reconnect. Resets the attempt counter.
    pub async fn disconnect(&self) {
        let shared = &self.inner.shared;
        lock(&shared.listeners).clear();

        let handle = lock(&self.inner.connection).take();
        shared.advance(ConnectionState::Disconnected);
        if let Some(ConnectionHandle { cmd_tx, mut task }) = handle {
            let _ = cmd_tx.send(Command::Close);
            if tokio::time::timeout(shared.close_timeout, &mut task)
                .await
                .is_err()
            {
                tracing::warn!("Realtime channel did not close in time, aborting");
                task.abort();
            }
        }

        tracing::info!("Realtime channel disconnected");
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.shared.state.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Watch state transitions.
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.inner.shared.state.subscribe()
    }

    /// Failed reconnect attempts since the last successful connection.
    pub fn reconnect_attempts(&self) -> u32 {
        self.inner.shared.attempts.load(Ordering::SeqCst)
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        lock(&self.inner.shared.listeners).count(kind)
    }

    pub fn endpoint(&self) -> &Url {
        &self.inner.endpoint
    }
}

impl std::fmt::Debug for RealtimeService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeService")
            .field("endpoint", &self.inner.endpoint.as_str())
            .field("state", &self.state())
            .field("reconnect_attempts", &self.reconnect_attempts())
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Connect, run the session, and reconnect with backoff until a clean close,
/// a close command, the attempt cap, or a newer `connect()`/`disconnect()`.
///
/// The attempt counter is local; the shared copy is only written while
/// `generation` is current.
async fn run_connection(
    shared: Arc<Shared>,
    generation: u64,
    url: Url,
    mut cmd_rx: mpsc::UnboundedReceiver<Command>,
) {
    let display_url = redact(&url);
    let mut attempts: u32 = 0;

    loop {
        if !shared.publish(generation, ConnectionState::Connecting, None) {
            return;
        }
        tracing::info!("Connecting to realtime channel at {}", display_url);

        let connected = tokio::select! {
            result = open_socket(&url, shared.connect_timeout) => result,
            _ = wait_for_close(&mut cmd_rx) => {
                shared.publish(generation, ConnectionState::Disconnected, None);
                return;
            }
        };

        match connected {
            Ok(stream) => {
                attempts = 0;
                if !shared.publish(generation, ConnectionState::Connected, Some(attempts)) {
                    return;
                }
                tracing::info!("Realtime channel connected");
                shared.emit_for(generation, EventKind::Connected, &Value::Null);

                let (end, close_requested) = run_session(&shared, stream, &mut cmd_rx).await;
                if !shared.publish(generation, ConnectionState::Disconnected, None) {
                    return;
                }
                tracing::info!(
                    "Realtime channel closed: {} (code: {:?}, clean: {})",
                    end.reason,
                    end.code,
                    end.was_clean
                );
                shared.emit_for(generation, EventKind::Disconnected, &end.payload());

                if close_requested || end.was_clean {
                    return;
                }
            }
            Err(err) => {
                if !shared.publish(generation, ConnectionState::Disconnected, None) {
                    return;
                }
                tracing::warn!("Failed to open realtime channel: {}", err);
                shared.emit_for(
                    generation,
                    EventKind::Error,
                    &json!({ "code": err.error_code(), "message": err.message() }),
                );
            }
        }

        // A listener may have called connect() from inside the emit above.
        if !shared.is_current(generation) {
            return;
        }

        let Some(attempt) = shared.policy.next_attempt(attempts) else {
            tracing::warn!(
                "Max reconnection attempts ({}) reached, realtime updates are offline",
                shared.policy.max_attempts()
            );
            return;
        };
        attempts = attempt;
        if !shared.publish(generation, ConnectionState::Disconnected, Some(attempts)) {
            return;
        }

        let delay = shared
            .policy
            .delay_for(attempt)
            .unwrap_or_else(|| shared.policy.base_interval());
        tracing::info!(
            "Reconnecting in {}ms (attempt {}/{})",
            delay.as_millis(),
            attempt,
            shared.policy.max_attempts()
        );

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = wait_for_close(&mut cmd_rx) => return,
        }
    }
}

/// Open the socket, giving up after `timeout`.
async fn open_socket(url: &Url, timeout: Duration) -> Result<WsStream> {
    match tokio::time::timeout(timeout, connect_async(url.as_str())).await {
        Ok(Ok((stream, _response))) => Ok(stream),
        Ok(Err(err)) => Err(err.into()),
        Err(_) => Err(RealtimeError::Connection(format!(
            "Handshake timed out after {}ms",
            timeout.as_millis()
        ))),
    }
}

/// Resolve once a close is requested, dropping sends that arrive meanwhile.
async fn wait_for_close(cmd_rx: &mut mpsc::UnboundedReceiver<Command>) {
    while let Some(command) = cmd_rx.recv().await {
        match command {
            Command::Send(_) => {
                tracing::warn!("Realtime channel not connected, dropping message")
            }
            Command::Close => return,
        }
    }
}

/// Pump one open socket. Returns how it ended and whether the close was requested locally.
async fn run_session(
    shared: &Shared,
    stream: WsStream,
    cmd_rx: &mut mpsc::UnboundedReceiver<Command>,
) -> (SessionEnd, bool) {
    let (mut sink, mut source) = stream.split();

    loop {
        tokio::select! {
            command = cmd_rx.recv() => match command {
                Some(Command::Send(text)) => {
                    if let Err(err) = sink.send(Message::text(text)).await {
                        tracing::warn!("Realtime send failed: {}", err);
                        return (SessionEnd::unclean(format!("Send failed: {}", err)), false);
                    }
                }
                Some(Command::Close) | None => {
                    let frame = CloseFrame {
                        code: CloseCode::Normal,
                        reason: "Client disconnect".into(),
                    };
                    if let Err(err) = sink.send(Message::Close(Some(frame))).await {
                        tracing::debug!("Close frame not sent: {}", err);
                    }
                    // Wait for the peer to acknowledge the close.
                    let _ = tokio::time::timeout(shared.close_timeout, async {
                        while let Some(Ok(_)) = source.next().await {}
                    })
                    .await;
                    let end = SessionEnd {
                        code: Some(CloseCode::Normal.into()),
                        reason: "Client disconnect".to_string(),
                        was_clean: true,
                    };
                    return (end, true);
                }
            },
            frame = source.next() => match frame {
                Some(Ok(Message::Text(text))) => shared.dispatch_text(text.as_str()),
                Some(Ok(Message::Binary(data))) => match std::str::from_utf8(&data) {
                    Ok(text) => shared.dispatch_text(text),
                    Err(_) => tracing::warn!("Dropping non UTF-8 binary realtime message"),
                },
                Some(Ok(Message::Close(frame))) => {
                    // Flush the close reply.
                    let _ = sink.close().await;
                    let end = match frame {
                        Some(frame) => SessionEnd {
                            code: Some(frame.code.into()),
                            reason: frame.reason.to_string(),
                            was_clean: true,
                        },
                        None => SessionEnd {
                            code: None,
                            reason: "Server closed connection".to_string(),
                            was_clean: true,
                        },
                    };
                    return (end, false);
                }
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    return (SessionEnd::unclean(format!("WebSocket error: {}", err)), false);
                }
                None => return (SessionEnd::unclean("WebSocket stream ended"), false),
            },
        }
    }
}
