//! Narration over the platform speech capability.
//!
//! [`NarrationEngine`] is the only component that talks to a
//! [`SpeechSynthesizer`](crate::SpeechSynthesizer). It owns the voice
//! catalog, the selected voice and rate, the narration language derived from
//! the voice, and the persisted `{voiceURI, rate}` record.

pub mod debounce;
pub mod engine;
pub mod voice;

pub use debounce::Debouncer;
pub use engine::{NarrationEngine, NarrationEvent, NarrationOutcome, NarrationTicket, StartOptions};
pub use voice::{default_voice_for_locale, primary_voices, supported_voices, Voice};

/// Slowest accepted speech rate.
pub const MIN_RATE: f32 = 0.5;
/// Fastest accepted speech rate.
pub const MAX_RATE: f32 = 2.0;
pub const DEFAULT_PITCH: f32 = 1.0;
pub const DEFAULT_VOLUME: f32 = 1.0;
