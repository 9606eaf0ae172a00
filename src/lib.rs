//! NovaLink - client-side receivers for realtime voice-agent streams.
//!
//! This crate connects a host application to a streaming server over
//! persistent WebSocket connections and forwards what arrives to
//! registered listeners: raw audio chunks from the binary stream, and
//! named float mappings decoded from the JSON emotion stream.
//!
//! # Architecture
//!
//! Two parallel receivers share one connection lifecycle:
//!
//! - **AudioReceiver** - forwards each binary frame verbatim as one chunk
//! - **EmotionReceiver** - decodes each text frame as a JSON object of
//!   named float values (numeric strings tolerated)
//!
//! Both wrap a `StreamSession`: start/stop operations, a cached
//! connected/disconnected flag, and listener fan-out for state changes.
//! A dropped connection reports disconnected and stays down - restarting
//! is the host's call.
//!
//! # Modules
//!
//! - [`audio`] - binary audio stream receiver
//! - [`emotion`] - JSON emotion stream receiver
//! - [`events`] - listener registration and fan-out
//! - [`config`] - endpoint configuration loading/saving
//! - [`ws`] - shared WebSocket transport
//!
//! # Usage
//!
//! ```no_run
//! use novalink::{AudioReceiver, EmotionReceiver};
//!
//! let audio = AudioReceiver::new();
//! audio.on_connection_state_changed(|connected| {
//!     println!("audio stream {}", if connected { "up" } else { "down" });
//! });
//! audio.on_chunk(|chunk| {
//!     // hand the PCM bytes to playback
//!     let _ = chunk.len();
//! });
//! audio.start_connection(None);
//!
//! let emotion = EmotionReceiver::new();
//! emotion.on_emotion_update(|values| {
//!     // drive animation sliders
//!     let _ = values.get("Happy");
//! });
//! emotion.start_connection(None);
//! ```

// Library modules
pub mod audio;
pub mod config;
pub mod emotion;
pub mod events;
pub mod ws;

mod session;

// Re-export commonly used types
pub use audio::AudioReceiver;
pub use config::{Config, DEFAULT_AUDIO_URL, DEFAULT_EMOTION_URL};
pub use emotion::{EmotionMap, EmotionReceiver};
pub use events::{ListenerId, Listeners};
