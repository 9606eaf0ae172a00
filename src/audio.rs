//! Audio stream receiver.
//!
//! Connects to the audio endpoint and forwards each binary frame to chunk
//! listeners verbatim. No decoding, no buffering: the frame bytes are
//! copied once into an immutable [`Bytes`] buffer and fanned out.

use std::sync::Arc;

use bytes::Bytes;

use crate::config::{Config, DEFAULT_AUDIO_URL};
use crate::events::{ListenerId, Listeners};
use crate::session::{FrameHandler, StreamSession};

/// Frame translation for the audio socket: binary in, chunk event out.
struct AudioFrames {
    chunks: Arc<Listeners<Bytes>>,
}

impl FrameHandler for AudioFrames {
    fn on_binary(&self, data: &[u8]) {
        // Empty frames carry nothing worth forwarding.
        if data.is_empty() {
            return;
        }
        self.chunks.emit(&Bytes::copy_from_slice(data));
    }

    fn on_text(&self, _text: &str) {
        // The audio endpoint only streams binary frames.
    }
}

/// Receiver for the binary audio stream.
///
/// Each frame delivered by the transport is forwarded as one complete
/// chunk; no reassembly of application-level fragments is attempted.
///
/// ```no_run
/// use novalink::AudioReceiver;
///
/// let receiver = AudioReceiver::new();
/// receiver.on_chunk(|chunk| {
///     println!("got {} bytes of audio", chunk.len());
/// });
/// receiver.start_connection(None);
/// ```
#[derive(Debug)]
pub struct AudioReceiver {
    session: StreamSession,
    chunks: Arc<Listeners<Bytes>>,
}

impl Default for AudioReceiver {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioReceiver {
    /// Create a receiver pointed at the default audio endpoint.
    #[must_use]
    pub fn new() -> Self {
        Self::with_url(DEFAULT_AUDIO_URL)
    }

    /// Create a receiver pointed at `url`.
    #[must_use]
    pub fn with_url(url: impl Into<String>) -> Self {
        let chunks = Arc::new(Listeners::new());
        let handler = Arc::new(AudioFrames {
            chunks: Arc::clone(&chunks),
        });
        Self {
            session: StreamSession::new("AudioReceiver", url.into(), handler),
            chunks,
        }
    }

    /// Create a receiver pointed at the configured audio endpoint.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::with_url(config.audio_url.clone())
    }

    /// Open a connection to `override_url` (when non-empty) or the
    /// configured address. Tears down any existing connection first and
    /// returns without waiting for the connect to complete.
    pub fn start_connection(&self, override_url: Option<&str>) {
        self.session.start_connection(override_url);
    }

    /// Tear down the current connection, if any. Idempotent.
    pub fn stop_connection(&self) {
        self.session.stop_connection();
    }

    /// Whether the receiver currently holds an established connection.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.session.is_connected()
    }

    /// The configured address.
    #[must_use]
    pub fn url(&self) -> String {
        self.session.url()
    }

    /// Replace the configured address; used by the next `start_connection`.
    pub fn set_url(&self, url: impl Into<String>) {
        self.session.set_url(url);
    }

    /// Register a listener for connection-state changes.
    pub fn on_connection_state_changed(
        &self,
        listener: impl Fn(bool) + Send + Sync + 'static,
    ) -> ListenerId {
        self.session.state_listeners().add(move |state| listener(*state))
    }

    /// Unregister a connection-state listener.
    pub fn remove_connection_state_listener(&self, id: ListenerId) -> bool {
        self.session.state_listeners().remove(id)
    }

    /// Register a listener for received audio chunks.
    pub fn on_chunk(&self, listener: impl Fn(&Bytes) + Send + Sync + 'static) -> ListenerId {
        self.chunks.add(listener)
    }

    /// Unregister a chunk listener.
    pub fn remove_chunk_listener(&self, id: ListenerId) -> bool {
        self.chunks.remove(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[test]
    fn test_default_url() {
        let receiver = AudioReceiver::new();
        assert_eq!(receiver.url(), "ws://localhost:5000/ws/audio");
    }

    #[test]
    fn test_not_connected_initially() {
        let receiver = AudioReceiver::new();
        assert!(!receiver.is_connected());
    }

    #[test]
    fn test_binary_frame_is_forwarded_verbatim() {
        let receiver = AudioReceiver::new();
        let received = Arc::new(Mutex::new(Vec::new()));

        let received_clone = Arc::clone(&received);
        receiver.on_chunk(move |chunk| {
            received_clone.lock().unwrap().push(chunk.to_vec());
        });

        let handler = AudioFrames {
            chunks: Arc::clone(&receiver.chunks),
        };
        handler.on_binary(&[0x01, 0x02, 0x03, 0xff]);

        let chunks = received.lock().unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0], vec![0x01, 0x02, 0x03, 0xff]);
    }

    #[test]
    fn test_empty_frame_is_ignored() {
        let receiver = AudioReceiver::new();
        let count = Arc::new(AtomicUsize::new(0));

        let count_clone = Arc::clone(&count);
        receiver.on_chunk(move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        let handler = AudioFrames {
            chunks: Arc::clone(&receiver.chunks),
        };
        handler.on_binary(&[]);

        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_text_frame_is_ignored() {
        let receiver = AudioReceiver::new();
        let count = Arc::new(AtomicUsize::new(0));

        let count_clone = Arc::clone(&count);
        receiver.on_chunk(move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        let handler = AudioFrames {
            chunks: Arc::clone(&receiver.chunks),
        };
        handler.on_text("{\"not\": \"audio\"}");

        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_removed_chunk_listener_is_not_notified() {
        let receiver = AudioReceiver::new();
        let count = Arc::new(AtomicUsize::new(0));

        let count_clone = Arc::clone(&count);
        let id = receiver.on_chunk(move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });
        assert!(receiver.remove_chunk_listener(id));

        let handler = AudioFrames {
            chunks: Arc::clone(&receiver.chunks),
        };
        handler.on_binary(&[1, 2, 3]);

        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
