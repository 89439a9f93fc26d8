//! Push transport: a single WebSocket connection to the balancer's stream.
//!
//! The socket owns the connection lifecycle and publishes it as a
//! [`ConnectionStatus`] through a watch channel. Frames are decoded as JSON and
//! handed to the owner one event at a time via [`PushSocket::recv`]; the socket
//! never interprets payloads and never retries.
//!
//! I/O runs in a spawned connection task, but every status mutation is applied
//! inside `recv()` or `close()`, i.e. on the owner's task.

use std::fmt;
use std::time::Duration;

use futures_util::{Sink, SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

/// Lower bound for the staleness watchdog period.
pub const MIN_WATCHDOG_PERIOD: Duration = Duration::from_millis(250);

/// WebSocket "abnormal closure": the connection dropped without a close frame.
const ABNORMAL_CLOSURE: u16 = 1006;
/// WebSocket "no status received": a close frame without a code.
const NO_STATUS: u16 = 1005;
/// Close reason text when the opening handshake outlives the stale threshold.
const HANDSHAKE_TIMEOUT: &str = "handshake timeout";
/// Upper bound on the graceful close handshake.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Why a push connection ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// Closed locally by the owner.
    ClientClose,
    /// No frame arrived within the staleness threshold.
    Stale,
    /// A frame could not be decoded as JSON.
    InvalidJsonMessage,
    /// Closed or failed at the transport level.
    Transport { code: u16, reason: String },
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::ClientClose => f.write_str("client_close"),
            CloseReason::Stale => f.write_str("stale"),
            CloseReason::InvalidJsonMessage => f.write_str("invalid_json_message"),
            CloseReason::Transport { code, reason } => write!(f, "{}:{}", code, reason),
        }
    }
}

/// Lifecycle of the push connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Disconnected(CloseReason),
}

impl ConnectionStatus {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionStatus::Connected)
    }

    pub fn is_disconnected(&self) -> bool {
        matches!(self, ConnectionStatus::Disconnected(_))
    }

    /// Short label for the header bar.
    pub fn label(&self) -> String {
        match self {
            ConnectionStatus::Connecting => "connecting".to_string(),
            ConnectionStatus::Connected => "connected".to_string(),
            ConnectionStatus::Disconnected(reason) => format!("disconnected ({})", reason),
        }
    }
}

/// Something that happened on the push connection.
#[derive(Debug, Clone, PartialEq)]
pub enum SocketEvent {
    /// The handshake completed.
    Opened,
    /// One decoded frame.
    Frame(Value),
    /// The connection ended.
    Closed(CloseReason),
}

/// Events tagged with the connection generation that produced them.
type Tagged = (u64, SocketEvent);

#[derive(Debug)]
struct Connection {
    generation: u64,
    /// Dropping or firing this asks the connection task to close gracefully.
    shutdown: oneshot::Sender<()>,
}

/// Owner of the push connection.
#[derive(Debug)]
pub struct PushSocket {
    url: String,
    stale_after: Duration,
    status: watch::Sender<ConnectionStatus>,
    events_tx: mpsc::UnboundedSender<Tagged>,
    events_rx: mpsc::UnboundedReceiver<Tagged>,
    generation: u64,
    connection: Option<Connection>,
}

impl PushSocket {
    /// Create a socket for `url` (a `ws://` or `wss://` URL). Nothing is
    /// opened until [`connect`](Self::connect).
    pub fn new(url: impl Into<String>, stale_after: Duration) -> Self {
        let (status, _) = watch::channel(ConnectionStatus::Connecting);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            url: url.into(),
            stale_after,
            status,
            events_tx,
            events_rx,
            generation: 0,
            connection: None,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Current connection status.
    pub fn status(&self) -> ConnectionStatus {
        self.status.borrow().clone()
    }

    /// Watch the connection status.
    pub fn subscribe_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.subscribe()
    }

    /// Open the connection. No-op while one is open or opening.
    pub fn connect(&mut self) {
        if self.connection.is_some() {
            return;
        }

        self.generation += 1;
        let generation = self.generation;
        let (shutdown, shutdown_rx) = oneshot::channel();

        self.status.send_replace(ConnectionStatus::Connecting);
        debug!(url = %self.url, generation, "opening push connection");

        tokio::spawn(run_connection(
            self.url.clone(),
            self.stale_after,
            generation,
            self.events_tx.clone(),
            shutdown_rx,
        ));

        self.connection = Some(Connection {
            generation,
            shutdown,
        });
    }

    /// Close the connection, if any, and report `Disconnected(reason)`.
    ///
    /// Always transitions, even when nothing was ever opened.
    pub fn close(&mut self, reason: CloseReason) {
        if let Some(connection) = self.connection.take() {
            debug!(generation = connection.generation, %reason, "closing push connection");
            let _ = connection.shutdown.send(());
        }
        self.status.send_replace(ConnectionStatus::Disconnected(reason));
    }

    /// Wait for the next event of the live connection.
    ///
    /// Lifecycle events update the status before they are returned. Events
    /// from a connection that was already closed or replaced are discarded.
    /// Cancel safe.
    pub async fn recv(&mut self) -> SocketEvent {
        loop {
            // The socket holds a sender, so the channel never closes.
            let Some((generation, event)) = self.events_rx.recv().await else {
                return std::future::pending().await;
            };

            let live = self.connection.as_ref().is_some_and(|c| c.generation == generation);
            if !live {
                continue;
            }

            match &event {
                SocketEvent::Opened => {
                    self.status.send_replace(ConnectionStatus::Connected);
                }
                SocketEvent::Closed(reason) => {
                    self.connection = None;
                    self.status.send_replace(ConnectionStatus::Disconnected(reason.clone()));
                }
                SocketEvent::Frame(_) => {}
            }

            return event;
        }
    }
}

impl Drop for PushSocket {
    fn drop(&mut self) {
        if let Some(connection) = self.connection.take() {
            let _ = connection.shutdown.send(());
        }
    }
}

/// Connection task: connect, pump frames, watch for staleness.
async fn run_connection(
    url: String,
    stale_after: Duration,
    generation: u64,
    events: mpsc::UnboundedSender<Tagged>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let emit = |event: SocketEvent| {
        let _ = events.send((generation, event));
    };

    // A handshake that never completes counts as a failed attempt.
    let connected = tokio::select! {
        result = time::timeout(stale_after, connect_async(url.as_str())) => result,
        _ = &mut shutdown => return,
    };

    let stream = match connected {
        Ok(Ok((stream, _response))) => stream,
        Ok(Err(e)) => {
            warn!(%url, error = %e, "push connection failed");
            emit(SocketEvent::Closed(CloseReason::Transport {
                code: ABNORMAL_CLOSURE,
                reason: e.to_string(),
            }));
            return;
        }
        Err(_) => {
            warn!(%url, ?stale_after, "push handshake timed out");
            emit(SocketEvent::Closed(CloseReason::Transport {
                code: ABNORMAL_CLOSURE,
                reason: HANDSHAKE_TIMEOUT.to_string(),
            }));
            return;
        }
    };

    info!(%url, generation, "push connection open");
    emit(SocketEvent::Opened);

    let (mut write, mut read) = stream.split();

    let period = (stale_after / 2).max(MIN_WATCHDOG_PERIOD);
    let mut watchdog = time::interval_at(Instant::now() + period, period);
    watchdog.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_frame = Instant::now();

    let reason = loop {
        tokio::select! {
            _ = &mut shutdown => {
                close_gracefully(&mut write).await;
                return;
            }
            _ = watchdog.tick() => {
                if last_frame.elapsed() >= stale_after {
                    warn!(%url, ?stale_after, "push connection went stale");
                    break CloseReason::Stale;
                }
            }
            frame = read.next() => {
                let message = match frame {
                    Some(Ok(message)) => message,
                    Some(Err(e)) => {
                        break CloseReason::Transport {
                            code: ABNORMAL_CLOSURE,
                            reason: e.to_string(),
                        };
                    }
                    None => {
                        break CloseReason::Transport {
                            code: ABNORMAL_CLOSURE,
                            reason: String::new(),
                        };
                    }
                };
                last_frame = Instant::now();

                let decoded = match message {
                    Message::Text(text) => serde_json::from_str::<Value>(&text),
                    Message::Binary(bytes) => serde_json::from_slice::<Value>(&bytes),
                    Message::Close(frame) => {
                        break match frame {
                            Some(frame) => CloseReason::Transport {
                                code: u16::from(frame.code),
                                reason: frame.reason.to_string(),
                            },
                            None => CloseReason::Transport {
                                code: NO_STATUS,
                                reason: String::new(),
                            },
                        };
                    }
                    // Keepalives only feed the watchdog.
                    Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
                };

                match decoded {
                    Ok(value) => emit(SocketEvent::Frame(value)),
                    Err(e) => {
                        warn!(%url, error = %e, "dropping connection on malformed frame");
                        break CloseReason::InvalidJsonMessage;
                    }
                }
            }
        }
    };

    close_gracefully(&mut write).await;
    emit(SocketEvent::Closed(reason));
}

/// Best-effort close handshake; failures are ignored.
async fn close_gracefully<S>(write: &mut S)
where
    S: Sink<Message> + Unpin,
{
    let _ = time::timeout(CLOSE_GRACE, write.send(Message::Close(None))).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;
    use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
    use tokio_tungstenite::tungstenite::protocol::CloseFrame;

    const WAIT: Duration = Duration::from_secs(5);

    /// Accept one WebSocket client, send `frames`, then either hold the
    /// connection open until the client leaves or close it.
    async fn serve(frames: Vec<Message>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            for frame in frames {
                if ws.send(frame).await.is_err() {
                    return;
                }
            }
            while let Some(Ok(_)) = ws.next().await {}
        });
        format!("ws://{}/stream", addr)
    }

    async fn refused_url() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("ws://{}/stream", addr)
    }

    async fn next_event(socket: &mut PushSocket) -> SocketEvent {
        time::timeout(WAIT, socket.recv()).await.expect("socket event")
    }

    #[test]
    fn test_close_reason_labels() {
        assert_eq!(CloseReason::ClientClose.to_string(), "client_close");
        assert_eq!(CloseReason::Stale.to_string(), "stale");
        assert_eq!(CloseReason::InvalidJsonMessage.to_string(), "invalid_json_message");
        let transport = CloseReason::Transport {
            code: 1001,
            reason: "going away".to_string(),
        };
        assert_eq!(transport.to_string(), "1001:going away");
    }

    #[tokio::test]
    async fn test_close_without_connect_disconnects() {
        let mut socket = PushSocket::new("ws://127.0.0.1:9/stream", Duration::from_secs(5));
        assert_eq!(socket.status(), ConnectionStatus::Connecting);

        socket.close(CloseReason::ClientClose);
        assert_eq!(
            socket.status(),
            ConnectionStatus::Disconnected(CloseReason::ClientClose)
        );

        // Idempotent.
        socket.close(CloseReason::ClientClose);
        assert!(socket.status().is_disconnected());
    }

    #[tokio::test]
    async fn test_connect_delivers_frames() {
        let url = serve(vec![
            Message::Text(r#"{"type":"state","payload":{}}"#.to_string()),
            Message::Binary(br#"{"type":"other"}"#.to_vec()),
        ])
        .await;
        let mut socket = PushSocket::new(url, Duration::from_secs(5));
        let mut status = socket.subscribe_status();

        socket.connect();
        assert_eq!(*status.borrow_and_update(), ConnectionStatus::Connecting);

        assert_eq!(next_event(&mut socket).await, SocketEvent::Opened);
        assert!(socket.status().is_connected());

        match next_event(&mut socket).await {
            SocketEvent::Frame(value) => assert_eq!(value["type"], "state"),
            other => panic!("unexpected event: {:?}", other),
        }
        match next_event(&mut socket).await {
            SocketEvent::Frame(value) => assert_eq!(value["type"], "other"),
            other => panic!("unexpected event: {:?}", other),
        }

        socket.close(CloseReason::ClientClose);
        assert_eq!(
            socket.status(),
            ConnectionStatus::Disconnected(CloseReason::ClientClose)
        );
    }

    #[tokio::test]
    async fn test_connect_is_idempotent() {
        let url = serve(Vec::new()).await;
        let mut socket = PushSocket::new(url, Duration::from_secs(5));

        socket.connect();
        socket.connect();
        assert_eq!(socket.generation, 1);

        assert_eq!(next_event(&mut socket).await, SocketEvent::Opened);
        socket.connect();
        assert_eq!(socket.generation, 1);
    }

    #[tokio::test]
    async fn test_malformed_frame_closes_socket() {
        let url = serve(vec![
            Message::Text("not json {".to_string()),
            Message::Text(r#"{"type":"state","payload":{}}"#.to_string()),
        ])
        .await;
        let mut socket = PushSocket::new(url, Duration::from_secs(5));
        socket.connect();

        assert_eq!(next_event(&mut socket).await, SocketEvent::Opened);
        assert_eq!(
            next_event(&mut socket).await,
            SocketEvent::Closed(CloseReason::InvalidJsonMessage)
        );
        assert_eq!(
            socket.status(),
            ConnectionStatus::Disconnected(CloseReason::InvalidJsonMessage)
        );
    }

    #[tokio::test]
    async fn test_silent_server_goes_stale() {
        let url = serve(Vec::new()).await;
        let mut socket = PushSocket::new(url, Duration::from_millis(300));
        socket.connect();

        assert_eq!(next_event(&mut socket).await, SocketEvent::Opened);
        assert_eq!(next_event(&mut socket).await, SocketEvent::Closed(CloseReason::Stale));
        assert_eq!(socket.status(), ConnectionStatus::Disconnected(CloseReason::Stale));
    }

    #[tokio::test]
    async fn test_server_close_reports_code_and_reason() {
        let url = serve(vec![Message::Close(Some(CloseFrame {
            code: CloseCode::Away,
            reason: "restarting".into(),
        }))])
        .await;
        let mut socket = PushSocket::new(url, Duration::from_secs(5));
        socket.connect();

        assert_eq!(next_event(&mut socket).await, SocketEvent::Opened);
        match next_event(&mut socket).await {
            SocketEvent::Closed(reason) => assert_eq!(reason.to_string(), "1001:restarting"),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_refused_connection_disconnects() {
        let mut socket = PushSocket::new(refused_url().await, Duration::from_secs(5));
        socket.connect();

        match next_event(&mut socket).await {
            SocketEvent::Closed(CloseReason::Transport { code, .. }) => {
                assert_eq!(code, ABNORMAL_CLOSURE)
            }
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(socket.status().is_disconnected());

        // A fresh attempt is allowed after the failure.
        socket.connect();
        assert_eq!(socket.generation, 2);
        assert_eq!(socket.status(), ConnectionStatus::Connecting);
    }

    #[tokio::test]
    async fn test_hung_handshake_disconnects() {
        // Accepts TCP but never answers the upgrade request.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (_tcp, _) = listener.accept().await.unwrap();
            time::sleep(Duration::from_secs(30)).await;
        });

        let mut socket = PushSocket::new(format!("ws://{}/stream", addr), Duration::from_millis(300));
        socket.connect();

        assert_eq!(
            next_event(&mut socket).await,
            SocketEvent::Closed(CloseReason::Transport {
                code: ABNORMAL_CLOSURE,
                reason: HANDSHAKE_TIMEOUT.to_string(),
            })
        );
        assert!(socket.status().is_disconnected());
    }

    #[tokio::test]
    async fn test_events_after_close_are_discarded() {
        let url = serve(vec![Message::Text(r#"{"type":"state"}"#.to_string())]).await;
        let mut socket = PushSocket::new(url, Duration::from_secs(5));
        socket.connect();
        socket.close(CloseReason::ClientClose);

        let quiet = time::timeout(Duration::from_millis(300), socket.recv()).await;
        assert!(quiet.is_err());
        assert_eq!(
            socket.status(),
            ConnectionStatus::Disconnected(CloseReason::ClientClose)
        );
    }
}
