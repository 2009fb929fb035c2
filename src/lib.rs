//! # geo-narrator
//!
//! A Rust library for location-aware audio guides: it follows the device
//! position, detects arrival at points of interest and narrates them through
//! the platform's speech synthesis.
//!
//! ## Features
//!
//! - **Proximity detection**: haversine distance and nearest-POI selection within a radius
//! - **Narration engine**: voice catalog, rate, language, debounced start, persisted preferences
//! - **Guide orchestration**: one status (`Idle`, `Listening`, `Narrating`, `Paused`) reconciled from location, proximity and speech
//! - **Platform seams**: speech, location and storage are traits, so any host can plug in
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! geo-narrator = { version = "2026.2", features = ["simulated"] }
//! ```
//!
//! ```ignore
//! use std::time::Instant;
//! use geo_narrator::{Guide, GuideConfig, LocationTracker, MemoryStore};
//! use geo_narrator::engines::simulated::{SimulatedLocation, SimulatedSynthesizer};
//!
//! let config = GuideConfig::default();
//! let mut tracker = LocationTracker::activate(Some(SimulatedLocation::new(route)), config.fix_timeout());
//! let mut guide = Guide::new(pois, Some(SimulatedSynthesizer::default()), MemoryStore::new(), config)?;
//!
//! loop {
//!     let now = Instant::now();
//!     tracker.poll();
//!     guide.observe_tracker(&tracker, now);
//!     guide.tick(now);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod engines;
pub mod error;
pub mod geo;
pub mod guide;
pub mod location;
pub mod poi;
pub mod preferences;
pub mod proximity;
pub mod speech;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::mpsc::Sender;

pub use config::{GuideConfig, GuideConfigBuilder};
pub use error::GuideError;
pub use geo::{distance, Coordinate};
pub use guide::{Guide, GuideNotice, GuideStatus, NarrationSession};
pub use location::{
    LocationSource, LocationTracker, PositionError, PositionErrorCode, PositionEvent,
    PositionOptions, PositionRequest, WatchId,
};
pub use poi::{load_pois, parse_pois, Language, Poi, PoiText};
pub use preferences::{FileStore, LanguageSettings, MemoryStore, PreferenceStore, SpeechPreferences};
pub use proximity::{detect_nearest, Nearby, ProximityDetector, DEFAULT_PROXIMITY_RADIUS_M};
pub use speech::{NarrationEngine, NarrationEvent, NarrationOutcome, NarrationTicket, StartOptions, Voice};

/// Identifier the engine assigns to each utterance it hands to the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UtteranceId(pub u64);

/// One discrete unit of speech playback.
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub id: UtteranceId,
    pub text: String,
    /// `None` lets the platform use its default voice.
    pub voice: Option<Voice>,
    /// Speech speed multiplier. Range: 0.5–2.0, default 1.0.
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
}

/// Lifecycle notifications from the speech platform.
#[derive(Debug, Clone, PartialEq)]
pub enum SpeechEvent {
    /// The voice catalog changed; re-read it with [`SpeechSynthesizer::voices`].
    VoicesChanged,
    Started(UtteranceId),
    Ended(UtteranceId),
    Failed { id: UtteranceId, error: String },
}

/// Common interface for platform speech synthesis.
///
/// The platform plays at most one utterance at a time. Lifecycle events are
/// pushed to the subscribed sender; sends after `unsubscribe` (or into a
/// closed channel) must be silently dropped by the implementation.
pub trait SpeechSynthesizer {
    /// The current voice catalog. May be empty until the platform has loaded it.
    fn voices(&self) -> Vec<Voice>;

    /// Queue an utterance for playback.
    fn speak(&mut self, utterance: Utterance);

    /// Stop and discard any current utterance.
    fn cancel(&mut self);

    fn pause(&mut self);

    fn resume(&mut self);

    /// Register the receiver of lifecycle events, replacing any previous one.
    fn subscribe(&mut self, sink: Sender<SpeechEvent>);

    fn unsubscribe(&mut self);
}
