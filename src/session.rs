//! Shared connection lifecycle for stream receivers.
//!
//! Both receivers own a [`StreamSession`]: one WebSocket connection at a
//! time, a cached connected flag, and start/stop operations. The session
//! knows nothing about payloads; it hands raw frames to a
//! [`FrameHandler`] supplied by the receiver.
//!
//! # Threading Model
//!
//! Each `start_connection()` spawns one OS thread that owns a
//! single-threaded tokio runtime. That thread is the only place connection
//! events (connected, error, closed, frame) are turned into state changes
//! and listener notifications, so the four callback paths never run
//! concurrently with each other for the same session. `start_connection` /
//! `stop_connection` are non-blocking; callers serialize them per
//! instance.
//!
//! There is no reconnection and no connect timeout: a dropped connection
//! reports disconnected and stays down until `start_connection` is called
//! again, and a connect attempt that never completes is abandoned only by
//! an explicit `stop_connection`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::oneshot;

use crate::events::Listeners;
use crate::ws;

/// Translates raw transport frames into receiver events.
///
/// Implemented by each receiver; invoked from the connection thread for
/// every frame that arrives while the connection is live.
pub(crate) trait FrameHandler: Send + Sync + 'static {
    /// A binary frame arrived.
    fn on_binary(&self, data: &[u8]);
    /// A text frame arrived.
    fn on_text(&self, text: &str);
}

/// Handle to one spawned connection.
struct Connection {
    /// Cleared on teardown so the connection thread stops dispatching.
    live: Arc<AtomicBool>,
    /// Requests a clean close (1000) from the connection thread.
    shutdown_tx: Option<oneshot::Sender<()>>,
}

/// One receiver's connection state machine.
///
/// Owns at most one live connection. The cached connected flag is the
/// single source of truth for [`is_connected`](Self::is_connected) and is
/// mutated only by connection-thread events and by `stop_connection`.
pub(crate) struct StreamSession {
    /// Receiver name used in logs and the close reason ("AudioReceiver", …).
    label: &'static str,
    /// Address used when `start_connection` gets no override.
    default_url: Mutex<String>,
    /// Cached connection state; `true` only between a connected event and
    /// the next error/close/stop.
    connected: Arc<AtomicBool>,
    /// Connection-state-changed listeners.
    state_listeners: Arc<Listeners<bool>>,
    /// Receiver-supplied frame translation.
    handler: Arc<dyn FrameHandler>,
    /// The currently owned connection, if any.
    connection: Mutex<Option<Connection>>,
}

impl std::fmt::Debug for StreamSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamSession")
            .field("label", &self.label)
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

impl StreamSession {
    /// Create a session with no active connection.
    pub(crate) fn new(
        label: &'static str,
        default_url: String,
        handler: Arc<dyn FrameHandler>,
    ) -> Self {
        Self {
            label,
            default_url: Mutex::new(default_url),
            connected: Arc::new(AtomicBool::new(false)),
            state_listeners: Arc::new(Listeners::new()),
            handler,
            connection: Mutex::new(None),
        }
    }

    /// The configured default address.
    pub(crate) fn url(&self) -> String {
        self.default_url.lock().expect("session url poisoned").clone()
    }

    /// Replace the configured default address. Takes effect on the next
    /// `start_connection`; an open connection is untouched.
    pub(crate) fn set_url(&self, url: impl Into<String>) {
        *self.default_url.lock().expect("session url poisoned") = url.into();
    }

    /// Listeners notified with the new value on every connection-state
    /// change dispatched by the connection thread.
    pub(crate) fn state_listeners(&self) -> &Arc<Listeners<bool>> {
        &self.state_listeners
    }

    /// Whether the session currently holds an established connection.
    ///
    /// Pure read of the cached flag; never touches the transport.
    pub(crate) fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Open a connection to `override_url` (when non-empty) or the
    /// configured default.
    ///
    /// Any existing connection is torn down first, unconditionally. The
    /// call returns before the connect completes; the outcome arrives via
    /// the connection-state listeners. An empty resolved address logs a
    /// warning and leaves the session untouched.
    pub(crate) fn start_connection(&self, override_url: Option<&str>) {
        let target = match override_url {
            Some(url) if !url.is_empty() => url.to_string(),
            _ => self.url(),
        };

        if target.is_empty() {
            log::warn!("{} requires a websocket URL", self.label);
            return;
        }

        self.stop_connection();

        let url = ws::http_to_ws_scheme(&target);
        let live = Arc::new(AtomicBool::new(true));
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let label = self.label;
        let connected = Arc::clone(&self.connected);
        let state_listeners = Arc::clone(&self.state_listeners);
        let handler = Arc::clone(&self.handler);
        let thread_live = Arc::clone(&live);

        std::thread::spawn(move || {
            run_connection(
                &url,
                label,
                &thread_live,
                &connected,
                &state_listeners,
                handler.as_ref(),
                shutdown_rx,
            );
        });

        let mut connection = self.connection.lock().expect("session connection poisoned");
        *connection = Some(Connection {
            live,
            shutdown_tx: Some(shutdown_tx),
        });
    }

    /// Tear down the current connection, if any.
    ///
    /// Disarms the connection thread (no further events are dispatched
    /// once this returns), requests a clean close (code 1000) when the
    /// connection is established, and clears the cached flag. Safe to call
    /// on an already-stopped session.
    pub(crate) fn stop_connection(&self) {
        let taken = self
            .connection
            .lock()
            .expect("session connection poisoned")
            .take();

        if let Some(mut connection) = taken {
            connection.live.store(false, Ordering::SeqCst);
            if let Some(tx) = connection.shutdown_tx.take() {
                // The thread exits on its own if it is already gone.
                let _ = tx.send(());
            }
        }

        self.connected.store(false, Ordering::SeqCst);
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        self.stop_connection();
    }
}

/// Record a disconnection and notify state listeners, unless the
/// connection was already torn down.
fn report_disconnected(
    live: &AtomicBool,
    connected: &AtomicBool,
    state_listeners: &Listeners<bool>,
) {
    if !live.load(Ordering::SeqCst) {
        return;
    }
    connected.store(false, Ordering::SeqCst);
    state_listeners.emit(&false);
}

/// Run one connection to completion on a dedicated tokio runtime.
///
/// Connects, reports the connected state, then loops over incoming frames
/// until the remote closes, an error occurs, or shutdown is requested.
/// Error and remote close have the same terminal effect: disconnected.
fn run_connection(
    url: &str,
    label: &str,
    live: &AtomicBool,
    connected: &AtomicBool,
    state_listeners: &Listeners<bool>,
    handler: &dyn FrameHandler,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            log::error!("{label} failed to create tokio runtime: {e}");
            report_disconnected(live, connected, state_listeners);
            return;
        }
    };

    rt.block_on(async {
        let (mut writer, mut reader) = tokio::select! {
            _ = &mut shutdown_rx => return,
            result = ws::connect(url) => match result {
                Ok(pair) => pair,
                Err(e) => {
                    if live.load(Ordering::SeqCst) {
                        log::error!("{label} connection error: {e}");
                    }
                    report_disconnected(live, connected, state_listeners);
                    return;
                }
            },
        };

        if !live.load(Ordering::SeqCst) {
            return;
        }
        connected.store(true, Ordering::SeqCst);
        state_listeners.emit(&true);
        log::info!("{label} connected to {url}");

        loop {
            tokio::select! {
                _ = &mut shutdown_rx => {
                    // Requested teardown: close cleanly, no notification.
                    let _ = writer.send_close(1000, &format!("{label} stop")).await;
                    return;
                }
                frame = reader.recv() => match frame {
                    Some(Ok(ws::WsMessage::Text(text))) => {
                        if live.load(Ordering::SeqCst) {
                            handler.on_text(&text);
                        }
                    }
                    Some(Ok(ws::WsMessage::Binary(data))) => {
                        if live.load(Ordering::SeqCst) {
                            handler.on_binary(&data);
                        }
                    }
                    Some(Ok(ws::WsMessage::Ping(payload))) => {
                        let _ = writer.send_pong(payload).await;
                    }
                    Some(Ok(ws::WsMessage::Pong(_))) => {}
                    Some(Ok(ws::WsMessage::Close { code, reason })) => {
                        // Clean and unclean closure are treated alike.
                        log::info!("{label} connection closed (code {code}): {reason}");
                        report_disconnected(live, connected, state_listeners);
                        return;
                    }
                    Some(Err(e)) => {
                        log::error!("{label} connection error: {e}");
                        report_disconnected(live, connected, state_listeners);
                        return;
                    }
                    None => {
                        // Stream ended without a Close frame
                        log::info!("{label} connection closed (stream ended)");
                        report_disconnected(live, connected, state_listeners);
                        return;
                    }
                }
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;

    struct NullHandler;

    impl FrameHandler for NullHandler {
        fn on_binary(&self, _data: &[u8]) {}
        fn on_text(&self, _text: &str) {}
    }

    fn session_with_url(url: &str) -> StreamSession {
        StreamSession::new("TestReceiver", url.to_string(), Arc::new(NullHandler))
    }

    #[test]
    fn test_not_connected_before_start() {
        let session = session_with_url("ws://localhost:5000/ws/test");
        assert!(!session.is_connected());
    }

    #[test]
    fn test_start_with_empty_url_is_noop() {
        let session = session_with_url("");
        session.start_connection(None);
        assert!(!session.is_connected());
        assert!(session
            .connection
            .lock()
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_empty_override_falls_back_to_default() {
        let session = session_with_url("");
        // Empty override + empty default: still a no-op.
        session.start_connection(Some(""));
        assert!(session.connection.lock().unwrap().is_none());
    }

    #[test]
    fn test_stop_is_idempotent() {
        let session = session_with_url("ws://localhost:5000/ws/test");
        session.stop_connection();
        session.stop_connection();
        assert!(!session.is_connected());
    }

    #[test]
    fn test_set_url_replaces_default() {
        let session = session_with_url("ws://old:5000/ws/test");
        session.set_url("ws://new:5000/ws/test");
        assert_eq!(session.url(), "ws://new:5000/ws/test");
    }

    #[test]
    fn test_failed_connect_notifies_disconnected() {
        let session = session_with_url("ws://127.0.0.1:1/unreachable");
        let (tx, rx) = mpsc::channel();
        let tx = Mutex::new(tx);
        session.state_listeners().add(move |state: &bool| {
            tx.lock().expect("sender poisoned").send(*state).ok();
        });

        session.start_connection(None);
        let state = rx
            .recv_timeout(Duration::from_secs(5))
            .expect("expected a state notification");
        assert!(!state);
        assert!(!session.is_connected());
    }

    #[test]
    fn test_stop_after_failed_connect_stays_disconnected() {
        let session = session_with_url("ws://127.0.0.1:1/unreachable");
        session.start_connection(None);
        session.stop_connection();
        assert!(!session.is_connected());
    }
}
