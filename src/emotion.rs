//! Emotion stream receiver.
//!
//! Connects to the emotion endpoint and decodes each text message as a
//! JSON object of named float values. Values may arrive as JSON numbers
//! or as numeric strings (`"0.1"`); anything else is skipped. A message
//! with no usable fields is indistinguishable from garbage and dropped.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::{Config, DEFAULT_EMOTION_URL};
use crate::events::{ListenerId, Listeners};
use crate::session::{FrameHandler, StreamSession};

/// Decoded set of named float values from one emotion message.
pub type EmotionMap = HashMap<String, f32>;

/// Frame translation for the emotion socket: JSON text in, mapping out.
struct EmotionFrames {
    updates: Arc<Listeners<EmotionMap>>,
}

impl FrameHandler for EmotionFrames {
    fn on_binary(&self, _data: &[u8]) {
        // The emotion endpoint only streams text frames.
    }

    fn on_text(&self, text: &str) {
        match parse_emotion_message(text) {
            Some(values) => self.updates.emit(&values),
            None => log::warn!("EmotionReceiver received invalid JSON: {text}"),
        }
    }
}

/// Decode one emotion message.
///
/// The message must be a JSON object. Top-level number values are taken
/// as-is; string values whose entire content is a numeric literal are
/// parsed; everything else (bools, nulls, nested arrays/objects,
/// non-numeric strings) is skipped, one level deep only. Returns `None`
/// for malformed JSON, non-object JSON, or an object with zero usable
/// fields.
fn parse_emotion_message(text: &str) -> Option<EmotionMap> {
    let parsed: serde_json::Value = serde_json::from_str(text).ok()?;
    let object = parsed.as_object()?;

    let mut values = EmotionMap::new();
    for (key, value) in object {
        match value {
            serde_json::Value::Number(number) => {
                if let Some(number) = number.as_f64() {
                    values.insert(key.clone(), number as f32);
                }
            }
            serde_json::Value::String(raw) if is_numeric_literal(raw) => {
                if let Ok(number) = raw.parse::<f32>() {
                    values.insert(key.clone(), number);
                }
            }
            _ => {}
        }
    }

    if values.is_empty() {
        None
    } else {
        Some(values)
    }
}

/// Whether `s` is entirely a numeric literal: optional sign, digits with
/// an optional fractional part, optional exponent. Rejects the empty
/// string, stray characters, and non-finite spellings like `inf`/`NaN`.
fn is_numeric_literal(s: &str) -> bool {
    let mut chars = s.chars().peekable();

    if matches!(chars.peek(), Some('+' | '-')) {
        chars.next();
    }

    let mut integer_digits = 0;
    while matches!(chars.peek(), Some(c) if c.is_ascii_digit()) {
        chars.next();
        integer_digits += 1;
    }

    let mut fraction_digits = 0;
    if chars.peek() == Some(&'.') {
        chars.next();
        while matches!(chars.peek(), Some(c) if c.is_ascii_digit()) {
            chars.next();
            fraction_digits += 1;
        }
    }

    if integer_digits == 0 && fraction_digits == 0 {
        return false;
    }

    if matches!(chars.peek(), Some('e' | 'E')) {
        chars.next();
        if matches!(chars.peek(), Some('+' | '-')) {
            chars.next();
        }
        let mut exponent_digits = 0;
        while matches!(chars.peek(), Some(c) if c.is_ascii_digit()) {
            chars.next();
            exponent_digits += 1;
        }
        if exponent_digits == 0 {
            return false;
        }
    }

    chars.next().is_none()
}

/// Receiver for the JSON emotion stream.
///
/// ```no_run
/// use novalink::EmotionReceiver;
///
/// let receiver = EmotionReceiver::new();
/// receiver.on_emotion_update(|values| {
///     if let Some(joy) = values.get("joy") {
///         println!("joy is now {joy}");
///     }
/// });
/// receiver.start_connection(None);
/// ```
#[derive(Debug)]
pub struct EmotionReceiver {
    session: StreamSession,
    updates: Arc<Listeners<EmotionMap>>,
}

impl Default for EmotionReceiver {
    fn default() -> Self {
        Self::new()
    }
}

impl EmotionReceiver {
    /// Create a receiver pointed at the default emotion endpoint.
    #[must_use]
    pub fn new() -> Self {
        Self::with_url(DEFAULT_EMOTION_URL)
    }

    /// Create a receiver pointed at `url`.
    #[must_use]
    pub fn with_url(url: impl Into<String>) -> Self {
        let updates = Arc::new(Listeners::new());
        let handler = Arc::new(EmotionFrames {
            updates: Arc::clone(&updates),
        });
        Self {
            session: StreamSession::new("EmotionReceiver", url.into(), handler),
            updates,
        }
    }

    /// Create a receiver pointed at the configured emotion endpoint.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::with_url(config.emotion_url.clone())
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

    /// Register a listener for decoded emotion mappings.
    pub fn on_emotion_update(
        &self,
        listener: impl Fn(&EmotionMap) + Send + Sync + 'static,
    ) -> ListenerId {
        self.updates.add(listener)
    }

    /// Unregister an emotion listener.
    pub fn remove_emotion_listener(&self, id: ListenerId) -> bool {
        self.updates.remove(id)
    }
}
