//! The guide orchestrator.
//!
//! [`Guide`] reconciles location, proximity and narration into a single
//! [`GuideStatus`]. Every input is a discrete event (a location update, a
//! user action, a `tick` carrying speech lifecycle events) and is fully
//! applied before the call returns.
//!
//! Arrival at a POI starts narration only when nothing else is active;
//! otherwise the POI is queued as pending for the user to pick up. The last
//! narrated POI is tracked separately from the active one so that the
//! proximity signal, which keeps firing while the user stands still, never
//! restarts a narration the user already heard or paused.

use std::collections::HashSet;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::config::GuideConfig;
use crate::error::GuideError;
use crate::geo::Coordinate;
use crate::location::{LocationSource, LocationTracker, PositionError};
use crate::poi::{Language, Poi};
use crate::preferences::PreferenceStore;
use crate::proximity::ProximityDetector;
use crate::speech::{
    supported_voices, NarrationEngine, NarrationEvent, NarrationTicket, StartOptions, Voice,
};
use crate::SpeechSynthesizer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GuideStatus {
    /// Narration disabled.
    Idle,
    /// Enabled, waiting for a POI.
    Listening,
    Narrating,
    /// Stopped by the user; the POI stays active.
    Paused,
}

/// Things the UI should tell the user about.
#[derive(Debug, Clone, PartialEq)]
pub enum GuideNotice {
    LocationError(PositionError),
    SpeechUnavailable,
    /// Saved speech preferences could not be read and defaults are in use.
    PreferencesReset(String),
    /// A POI was reached while another one is active.
    PendingPoi(String),
}

/// Snapshot of the narration state for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NarrationSession {
    pub active_poi_id: Option<String>,
    pub pending_poi_id: Option<String>,
    pub status: GuideStatus,
    #[serde(rename = "voiceURI")]
    pub voice_uri: Option<String>,
    pub rate: f32,
    pub language_code: Language,
}

pub struct Guide<S: SpeechSynthesizer, P: PreferenceStore> {
    engine: NarrationEngine<S, P>,
    detector: ProximityDetector,
    pois: Vec<Poi>,
    location: Option<Coordinate>,
    location_error: Option<PositionError>,
    status: GuideStatus,
    enabled: bool,
    narrating: bool,
    active_poi: Option<String>,
    pending_poi: Option<String>,
    last_narrated: Option<String>,
    awaiting: Option<NarrationTicket>,
    notices: Vec<GuideNotice>,
}

impl<S: SpeechSynthesizer, P: PreferenceStore> Guide<S, P> {
    /// Create an enabled guide in `Listening`.
    ///
    /// `synth` is `None` when the platform has no speech capability; the guide
    /// then never narrates and reports [`GuideNotice::SpeechUnavailable`].
    pub fn new(pois: Vec<Poi>, synth: Option<S>, store: P, config: GuideConfig) -> Result<Self, GuideError> {
        config.validate()?;
        check_unique_ids(&pois)?;

        let mut engine = NarrationEngine::new(synth, store, &config);
        let mut notices = Vec::new();
        if !engine.is_available() {
            notices.push(GuideNotice::SpeechUnavailable);
        }
        if let Some(err) = engine.take_preference_error() {
            notices.push(GuideNotice::PreferencesReset(err.to_string()));
        }

        Ok(Self {
            engine,
            detector: ProximityDetector::new(config.proximity_radius_m),
            pois,
            location: None,
            location_error: None,
            status: GuideStatus::Listening,
            enabled: true,
            narrating: false,
            active_poi: None,
            pending_poi: None,
            last_narrated: None,
            awaiting: None,
            notices,
        })
    }

    /// Fold the tracker's latest error and fix into the guide.
    pub fn observe_tracker<L: LocationSource>(&mut self, tracker: &LocationTracker<L>, now: Instant) {
        if tracker.error() != self.location_error.as_ref() {
            match tracker.error() {
                Some(err) => self.handle_location_error(err.clone()),
                None => self.location_error = None,
            }
        }
        self.handle_location(tracker.location(), now);
    }

    pub fn handle_location_error(&mut self, err: PositionError) {
        self.location_error = Some(err.clone());
        self.notices.push(GuideNotice::LocationError(err));
    }

    /// Re-run proximity for a new location.
    pub fn handle_location(&mut self, location: Option<&Coordinate>, now: Instant) {
        self.location = location.copied();
        self.evaluate(now);
    }

    /// Replace the POI set and re-run proximity against the last location.
    ///
    /// Active, pending and last narrated ids that are not in the new set are
    /// forgotten. Losing the active POI stops its narration.
    pub fn set_pois(&mut self, pois: Vec<Poi>, now: Instant) -> Result<(), GuideError> {
        check_unique_ids(&pois)?;
        self.pois = pois;

        if !retain_known(&mut self.active_poi, &self.pois) {
            log::info!("Active POI removed from the set");
            if self.narrating {
                self.halt();
            }
            self.status = self.resting_status();
        }
        retain_known(&mut self.pending_poi, &self.pois);
        retain_known(&mut self.last_narrated, &self.pois);

        self.evaluate(now);
        Ok(())
    }

    fn evaluate(&mut self, now: Instant) {
        let nearby = self
            .detector
            .update(self.location.as_ref(), &self.pois)
            .map(|poi| poi.id.clone());
        if let Some(id) = nearby {
            self.on_poi_detected(id, now);
        }
    }

    fn on_poi_detected(&mut self, id: String, now: Instant) {
        if !self.enabled || !self.engine.is_available() {
            return;
        }
        if self.last_narrated.as_deref() == Some(id.as_str()) && self.status != GuideStatus::Paused {
            return;
        }
        if self.active_poi.as_deref() == Some(id.as_str()) {
            return;
        }

        if self.narrating || self.active_poi.is_some() {
            if self.pending_poi.as_deref() != Some(id.as_str()) {
                log::info!("POI '{id}' reached while another is active, queued");
                self.pending_poi = Some(id.clone());
                self.notices.push(GuideNotice::PendingPoi(id));
            }
            return;
        }

        log::info!("Arrived at POI '{id}'");
        if self.pending_poi.as_deref() == Some(id.as_str()) {
            self.pending_poi = None;
        }
        self.active_poi = Some(id.clone());
        if self.narrate_active(now) {
            self.last_narrated = Some(id);
        }
    }

    /// Start narrating the active POI in the engine's narration language.
    fn narrate_active(&mut self, now: Instant) -> bool {
        let Some(poi) = self
            .active_poi
            .as_deref()
            .and_then(|id| self.pois.iter().find(|p| p.id == id))
        else {
            return false;
        };

        let language = self.engine.narration_language();
        let text = poi.localized_description(language);
        let Some(ticket) = self.engine.start(text, StartOptions::default(), now) else {
            return false;
        };

        self.awaiting = Some(ticket);
        self.narrating = true;
        self.status = GuideStatus::Narrating;
        true
    }

    fn halt(&mut self) {
        self.engine.stop();
        self.narrating = false;
        self.awaiting = None;
    }

    /// Play/pause button: stop if narrating, otherwise narrate the active POI.
    pub fn toggle_narration(&mut self, now: Instant) {
        if self.narrating {
            self.halt();
            self.status = GuideStatus::Paused;
        } else if self.active_poi.is_some() {
            self.narrate_active(now);
        }
    }

    /// Restart narration of the active POI from the beginning.
    pub fn replay(&mut self, now: Instant) {
        if self.active_poi.is_none() {
            return;
        }
        self.halt();
        self.narrate_active(now);
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        if enabled == self.enabled {
            return;
        }
        self.enabled = enabled;
        if enabled {
            self.status = GuideStatus::Listening;
        } else {
            self.halt();
            self.status = GuideStatus::Idle;
        }
        log::info!("Guide {}", if enabled { "enabled" } else { "disabled" });
    }

    /// Make the pending POI active and narrate it.
    pub fn play_pending(&mut self, now: Instant) -> bool {
        let Some(id) = self.pending_poi.take() else {
            return false;
        };
        self.halt();
        self.active_poi = Some(id.clone());
        if !self.narrate_active(now) {
            self.status = self.resting_status();
            return false;
        }
        self.last_narrated = Some(id);
        true
    }

    pub fn dismiss_pending(&mut self) {
        self.pending_poi = None;
    }

    /// Show a POI picked by the user without narrating it.
    pub fn activate_poi(&mut self, id: &str) -> bool {
        if !self.pois.iter().any(|p| p.id == id) {
            log::warn!("Unknown POI '{id}'");
            return false;
        }
        self.halt();
        self.active_poi = Some(id.to_string());
        if self.pending_poi.as_deref() == Some(id) {
            self.pending_poi = None;
        }
        self.status = self.resting_status();
        true
    }

    fn resting_status(&self) -> GuideStatus {
        if self.enabled {
            GuideStatus::Listening
        } else {
            GuideStatus::Idle
        }
    }

    /// Advance time: flush debounced narration and apply speech events.
    pub fn tick(&mut self, now: Instant) {
        for event in self.engine.tick(now) {
            match event {
                NarrationEvent::Finished { ticket, outcome } if self.awaiting == Some(ticket) => {
                    log::debug!("Narration finished: {outcome:?}");
                    self.awaiting = None;
                    self.narrating = false;
                    self.status = self.resting_status();
                }
                NarrationEvent::Finished { ticket, .. } => {
                    log::debug!("Ignoring finish of superseded narration {}", ticket.0);
                }
                NarrationEvent::VoicesChanged => {}
            }
        }
    }

    /// Drain notices accumulated since the last call.
    pub fn take_notices(&mut self) -> Vec<GuideNotice> {
        std::mem::take(&mut self.notices)
    }

    pub fn session(&self) -> NarrationSession {
        NarrationSession {
            active_poi_id: self.active_poi.clone(),
            pending_poi_id: self.pending_poi.clone(),
            status: self.status,
            voice_uri: self.engine.selected_voice().map(str::to_string),
            rate: self.engine.rate(),
            language_code: self.engine.narration_language(),
        }
    }

    pub fn status(&self) -> GuideStatus {
        self.status
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_narrating(&self) -> bool {
        self.narrating
    }

    fn find(&self, id: Option<&str>) -> Option<&Poi> {
        id.and_then(|id| self.pois.iter().find(|p| p.id == id))
    }

    pub fn active_poi(&self) -> Option<&Poi> {
        self.find(self.active_poi.as_deref())
    }

    pub fn pending_poi(&self) -> Option<&Poi> {
        self.find(self.pending_poi.as_deref())
    }

    pub fn nearby_poi(&self) -> Option<&Poi> {
        self.find(self.detector.nearby_id())
    }

    pub fn pois(&self) -> &[Poi] {
        &self.pois
    }

    pub fn location(&self) -> Option<&Coordinate> {
        self.location.as_ref()
    }

    /// Voices offered in the settings: the catalog narrowed to en, pl and de.
    pub fn available_voices(&self) -> Vec<Voice> {
        supported_voices(self.engine.voices())
    }

    /// Select a narration voice.
    ///
    /// A narration in progress is stopped and the guide is left `Paused` on
    /// the same POI, so the next toggle replays it in the new voice.
    pub fn select_voice(&mut self, voice_uri: &str) -> Result<(), GuideError> {
        let interrupted = self.narrating;
        let saved = self.engine.select_voice(voice_uri);
        if interrupted {
            self.narrating = false;
            self.awaiting = None;
            self.status = GuideStatus::Paused;
        }
        saved
    }

    /// Set the speech rate for subsequent narrations.
    pub fn set_rate(&mut self, rate: f32) -> Result<(), GuideError> {
        self.engine.set_rate(rate)
    }

    pub fn engine(&self) -> &NarrationEngine<S, P> {
        &self.engine
    }

    /// The platform synthesizer, for driving backends that need a clock.
    pub fn synthesizer_mut(&mut self) -> Option<&mut S> {
        self.engine.synthesizer_mut()
    }
}

/// Clear `id` if it names no POI in `pois`. Returns false if it was cleared.
fn retain_known(id: &mut Option<String>, pois: &[Poi]) -> bool {
    match id.as_deref() {
        Some(known) if !pois.iter().any(|p| p.id == known) => {
            *id = None;
            false
        }
        _ => true,
    }
}

fn check_unique_ids(pois: &[Poi]) -> Result<(), GuideError> {
    let mut seen = HashSet::new();
    match pois.iter().find(|p| !seen.insert(p.id.as_str())) {
        Some(dup) => Err(GuideError::DuplicatePoi(dup.id.clone())),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::PositionErrorCode;
    use crate::preferences::MemoryStore;
    use crate::testing::{point_north_of, FakeLocationSource, FakeSynthesizer};
    use crate::SpeechEvent;
    use std::time::Duration;

    type TestGuide = Guide<FakeSynthesizer, MemoryStore>;

    fn origin() -> Coordinate {
        Coordinate::new(52.2478, 21.0155)
    }

    /// "castle" is 10 m north of the origin, "square" 1 km north.
    fn pois() -> Vec<Poi> {
        let castle = point_north_of(&origin(), 10.0);
        let square = point_north_of(&origin(), 1000.0);
        vec![
            Poi::new("castle", "Royal Castle", "Castle story.", castle.latitude, castle.longitude)
                .with_translation(Language::Pl, "Zamek", "Historia zamku."),
            Poi::new("square", "Old Town Square", "Square story.", square.latitude, square.longitude),
        ]
    }

    fn at_castle() -> Coordinate {
        origin()
    }

    fn at_square() -> Coordinate {
        point_north_of(&origin(), 1000.0)
    }

    fn guide() -> (TestGuide, FakeSynthesizer) {
        let synth = FakeSynthesizer::with_voices(vec![
            Voice::new("en-voice", "English", "en-US"),
            Voice::new("pl-voice", "Polski", "pl-PL"),
            Voice::new("fr-voice", "Français", "fr-FR"),
        ]);
        let probe = synth.clone();
        let guide = Guide::new(pois(), Some(synth), MemoryStore::new(), GuideConfig::default()).unwrap();
        (guide, probe)
    }

    struct Clock(Instant);

    impl Clock {
        fn advance(&mut self, ms: u64) -> Instant {
            self.0 += Duration::from_millis(ms);
            self.0
        }
    }

    #[test]
    fn arrival_starts_narration_once() {
        let (mut guide, probe) = guide();
        let mut clock = Clock(Instant::now());

        guide.handle_location(Some(&at_castle()), clock.0);
        assert_eq!(guide.status(), GuideStatus::Narrating);
        assert_eq!(guide.active_poi().map(|p| p.id.as_str()), Some("castle"));

        guide.handle_location(Some(&at_castle()), clock.advance(100));
        guide.tick(clock.advance(400));
        guide.handle_location(Some(&at_castle()), clock.advance(100));
        guide.tick(clock.advance(400));

        assert_eq!(guide.status(), GuideStatus::Narrating);
        let spoken = probe.spoken();
        assert_eq!(spoken.len(), 1);
        assert_eq!(spoken[0].text, "Castle story.");
    }

    #[test]
    fn second_poi_while_narrating_becomes_pending() {
        let (mut guide, probe) = guide();
        let mut clock = Clock(Instant::now());

        guide.handle_location(Some(&at_castle()), clock.0);
        guide.tick(clock.advance(300));
        guide.take_notices();

        guide.handle_location(Some(&at_square()), clock.advance(1000));
        guide.handle_location(Some(&at_square()), clock.advance(1000));
        guide.tick(clock.advance(300));

        assert_eq!(guide.take_notices(), vec![GuideNotice::PendingPoi("square".into())]);
        assert_eq!(guide.pending_poi().map(|p| p.id.as_str()), Some("square"));
        assert_eq!(guide.active_poi().map(|p| p.id.as_str()), Some("castle"));
        assert_eq!(guide.status(), GuideStatus::Narrating);
        assert_eq!(probe.spoken().len(), 1);
    }

    #[test]
    fn toggle_pauses_and_restarts() {
        let (mut guide, probe) = guide();
        let mut clock = Clock(Instant::now());

        guide.handle_location(Some(&at_castle()), clock.0);
        guide.tick(clock.advance(300));

        let cancels = probe.cancel_count();
        guide.toggle_narration(clock.advance(1000));
        assert_eq!(guide.status(), GuideStatus::Paused);
        assert!(!guide.is_narrating());
        assert_eq!(probe.cancel_count(), cancels + 1);

        // Standing still must not restart a paused narration.
        guide.handle_location(Some(&at_castle()), clock.advance(100));
        guide.tick(clock.advance(400));
        assert_eq!(guide.status(), GuideStatus::Paused);
        assert_eq!(probe.spoken().len(), 1);

        guide.toggle_narration(clock.advance(100));
        assert_eq!(guide.status(), GuideStatus::Narrating);
        guide.tick(clock.advance(300));
        assert_eq!(probe.spoken().len(), 2);
    }

    #[test]
    fn stale_end_after_pause_keeps_paused() {
        let (mut guide, probe) = guide();
        let mut clock = Clock(Instant::now());

        guide.handle_location(Some(&at_castle()), clock.0);
        guide.tick(clock.advance(300));
        let id = probe.spoken()[0].id;

        guide.toggle_narration(clock.advance(10));
        probe.emit(SpeechEvent::Failed {
            id,
            error: "interrupted".into(),
        });
        guide.tick(clock.advance(10));
        assert_eq!(guide.status(), GuideStatus::Paused);
    }

    #[test]
    fn natural_end_returns_to_listening_without_restart() {
        let (mut guide, probe) = guide();
        let mut clock = Clock(Instant::now());

        guide.handle_location(Some(&at_castle()), clock.0);
        guide.tick(clock.advance(300));
        probe.finish_current();
        guide.tick(clock.advance(5000));

        assert_eq!(guide.status(), GuideStatus::Listening);
        assert!(!guide.is_narrating());
        assert_eq!(guide.active_poi().map(|p| p.id.as_str()), Some("castle"));

        guide.handle_location(Some(&at_castle()), clock.advance(100));
        guide.tick(clock.advance(400));
        assert_eq!(probe.spoken().len(), 1);
    }

    #[test]
    fn replay_restarts_active_poi() {
        let (mut guide, probe) = guide();
        let mut clock = Clock(Instant::now());

        guide.replay(clock.0);
        assert_eq!(guide.status(), GuideStatus::Listening);

        guide.handle_location(Some(&at_castle()), clock.0);
        guide.tick(clock.advance(300));
        probe.finish_current();
        guide.tick(clock.advance(10));

        guide.replay(clock.advance(10));
        assert_eq!(guide.status(), GuideStatus::Narrating);
        guide.tick(clock.advance(300));
        assert_eq!(probe.spoken().len(), 2);
        assert_eq!(probe.spoken()[1].text, "Castle story.");
    }

    #[test]
    fn disabling_stops_and_ignores_arrivals() {
        let (mut guide, probe) = guide();
        let mut clock = Clock(Instant::now());

        guide.handle_location(Some(&at_castle()), clock.0);
        guide.tick(clock.advance(300));
        guide.set_enabled(false);
        assert_eq!(guide.status(), GuideStatus::Idle);
        assert!(!guide.is_narrating());

        guide.handle_location(Some(&at_square()), clock.advance(100));
        guide.tick(clock.advance(400));
        assert!(guide.pending_poi().is_none());
        assert_eq!(probe.spoken().len(), 1);

        guide.set_enabled(true);
        assert_eq!(guide.status(), GuideStatus::Listening);
    }

    #[test]
    fn pending_start_is_dropped_when_disabled_in_window() {
        let (mut guide, probe) = guide();
        let mut clock = Clock(Instant::now());

        guide.handle_location(Some(&at_castle()), clock.0);
        guide.set_enabled(false);
        guide.tick(clock.advance(1000));
        assert!(probe.spoken().is_empty());
    }

    #[test]
    fn missing_speech_is_reported_and_arrivals_ignored() {
        let mut guide: TestGuide =
            Guide::new(pois(), None, MemoryStore::new(), GuideConfig::default()).unwrap();
        assert_eq!(guide.take_notices(), vec![GuideNotice::SpeechUnavailable]);

        guide.handle_location(Some(&at_castle()), Instant::now());
        assert_eq!(guide.status(), GuideStatus::Listening);
        assert!(guide.active_poi().is_none());
    }

    #[test]
    fn narration_uses_voice_language() {
        let (mut guide, probe) = guide();
        let mut clock = Clock(Instant::now());
        guide.select_voice("pl-voice").unwrap();

        guide.handle_location(Some(&at_castle()), clock.0);
        guide.tick(clock.advance(300));
        assert_eq!(probe.spoken()[0].text, "Historia zamku.");
        assert_eq!(guide.session().language_code, Language::Pl);
    }

    #[test]
    fn play_pending_switches_active_poi() {
        let (mut guide, probe) = guide();
        let mut clock = Clock(Instant::now());

        guide.handle_location(Some(&at_castle()), clock.0);
        guide.tick(clock.advance(300));
        guide.handle_location(Some(&at_square()), clock.advance(1000));

        assert!(guide.play_pending(clock.advance(10)));
        assert_eq!(guide.active_poi().map(|p| p.id.as_str()), Some("square"));
        assert!(guide.pending_poi().is_none());
        guide.tick(clock.advance(300));
        assert_eq!(probe.spoken().last().map(|u| u.text.as_str()), Some("Square story."));

        assert!(!guide.play_pending(clock.advance(10)));
    }

    #[test]
    fn dismiss_and_activate_poi() {
        let (mut guide, _probe) = guide();
        let mut clock = Clock(Instant::now());

        guide.handle_location(Some(&at_castle()), clock.0);
        guide.handle_location(Some(&at_square()), clock.advance(1000));
        guide.dismiss_pending();
        assert!(guide.pending_poi().is_none());

        assert!(!guide.activate_poi("nowhere"));
        assert!(guide.activate_poi("square"));
        assert_eq!(guide.active_poi().map(|p| p.id.as_str()), Some("square"));
        assert_eq!(guide.status(), GuideStatus::Listening);
        assert!(!guide.is_narrating());
    }

    #[test]
    fn voice_change_mid_narration_pauses_on_same_poi() {
        let (mut guide, probe) = guide();
        let mut clock = Clock(Instant::now());

        guide.handle_location(Some(&at_castle()), clock.0);
        guide.tick(clock.advance(300));
        let stopped = probe.spoken()[0].id;

        guide.select_voice("pl-voice").unwrap();
        assert_eq!(guide.status(), GuideStatus::Paused);
        assert!(!guide.is_narrating());
        assert!(!guide.engine().is_busy());
        assert_eq!(guide.active_poi().map(|p| p.id.as_str()), Some("castle"));

        probe.emit(SpeechEvent::Ended(stopped));
        guide.tick(clock.advance(19_000));
        assert_eq!(guide.status(), GuideStatus::Paused);

        guide.toggle_narration(clock.advance(10));
        assert_eq!(guide.status(), GuideStatus::Narrating);
        guide.tick(clock.advance(300));
        let spoken = probe.spoken();
        assert_eq!(spoken.len(), 2);
        assert_eq!(spoken[1].text, "Historia zamku.");
        assert_eq!(spoken[1].voice.as_ref().map(|v| v.voice_uri.as_str()), Some("pl-voice"));

        probe.finish_current();
        guide.tick(clock.advance(10));
        assert_eq!(guide.status(), GuideStatus::Listening);
    }

    #[test]
    fn rate_change_keeps_narration_running() {
        let (mut guide, probe) = guide();
        let mut clock = Clock(Instant::now());

        guide.handle_location(Some(&at_castle()), clock.0);
        guide.tick(clock.advance(300));
        guide.set_rate(1.5).unwrap();
        assert_eq!(guide.status(), GuideStatus::Narrating);
        assert_eq!(guide.session().rate, 1.5);

        guide.replay(clock.advance(10));
        guide.tick(clock.advance(300));
        assert_eq!(probe.spoken().last().map(|u| u.rate), Some(1.5));
    }

    #[test]
    fn replacing_pois_forgets_removed_ones() {
        let (mut guide, probe) = guide();
        let mut clock = Clock(Instant::now());

        guide.handle_location(Some(&at_castle()), clock.0);
        guide.tick(clock.advance(300));
        probe.finish_current();
        guide.tick(clock.advance(10));

        let museum_at = at_square();
        let museum = Poi::new("museum", "Museum", "Museum story.", museum_at.latitude, museum_at.longitude);
        guide.set_pois(vec![museum], clock.advance(10)).unwrap();
        assert!(guide.session().active_poi_id.is_none());
        assert_eq!(guide.status(), GuideStatus::Listening);

        guide.handle_location(Some(&museum_at), clock.advance(1000));
        assert!(guide.pending_poi().is_none());
        assert_eq!(guide.active_poi().map(|p| p.id.as_str()), Some("museum"));
        guide.tick(clock.advance(300));
        assert_eq!(probe.spoken().last().map(|u| u.text.as_str()), Some("Museum story."));
    }

    #[test]
    fn removing_active_poi_stops_its_narration() {
        let (mut guide, probe) = guide();
        let mut clock = Clock(Instant::now());

        guide.handle_location(Some(&at_castle()), clock.0);
        guide.tick(clock.advance(300));
        guide.handle_location(Some(&at_square()), clock.advance(1000));
        assert!(guide.pending_poi().is_some());
        let cancels = probe.cancel_count();

        let square = pois().remove(1);
        guide.set_pois(vec![square], clock.advance(10)).unwrap();
        assert_eq!(probe.cancel_count(), cancels + 1);
        assert!(guide.pending_poi().is_none());
        // Standing at the queued square, it takes over as soon as the castle is gone.
        assert_eq!(guide.active_poi().map(|p| p.id.as_str()), Some("square"));
        assert_eq!(guide.status(), GuideStatus::Narrating);
        guide.tick(clock.advance(300));
        assert_eq!(probe.spoken().last().map(|u| u.text.as_str()), Some("Square story."));
    }

    #[test]
    fn removing_active_poi_elsewhere_returns_to_listening() {
        let (mut guide, probe) = guide();
        let mut clock = Clock(Instant::now());

        guide.handle_location(Some(&at_castle()), clock.0);
        guide.tick(clock.advance(300));

        let square = pois().remove(1);
        guide.set_pois(vec![square], clock.advance(10)).unwrap();
        assert!(!guide.is_narrating());
        assert!(!guide.engine().is_busy());
        assert!(guide.active_poi().is_none());
        assert_eq!(guide.status(), GuideStatus::Listening);

        guide.toggle_narration(clock.advance(10));
        guide.tick(clock.advance(300));
        assert_eq!(probe.spoken().len(), 1);
    }

    #[test]
    fn tracker_errors_become_notices_once() {
        let (mut guide, _probe) = guide();
        let source = FakeLocationSource::default();
        let probe = source.clone();
        let mut tracker = LocationTracker::activate(Some(source), Duration::from_millis(5000));
        let now = Instant::now();

        probe.push_watch_error(PositionError::new(PositionErrorCode::PermissionDenied, "denied"));
        tracker.poll();
        guide.observe_tracker(&tracker, now);
        guide.observe_tracker(&tracker, now);

        let notices = guide.take_notices();
        assert_eq!(notices.len(), 1);
        assert!(matches!(
            &notices[0],
            GuideNotice::LocationError(e) if e.code == PositionErrorCode::PermissionDenied
        ));

        probe.push_watch_fix(at_castle());
        tracker.poll();
        guide.observe_tracker(&tracker, now);
        assert!(guide.take_notices().is_empty());
        assert_eq!(guide.status(), GuideStatus::Narrating);
    }

    #[test]
    fn set_pois_reevaluates_last_location() {
        let (mut guide, _probe) = guide();
        let now = Instant::now();
        let far = point_north_of(&origin(), 5000.0);

        guide.handle_location(Some(&far), now);
        assert!(guide.nearby_poi().is_none());

        let museum = Poi::new("museum", "Museum", "Museum story.", far.latitude, far.longitude);
        guide.set_pois(vec![museum.clone()], now).unwrap();
        assert_eq!(guide.nearby_poi().map(|p| p.id.as_str()), Some("museum"));
        assert_eq!(guide.status(), GuideStatus::Narrating);

        assert!(matches!(
            guide.set_pois(vec![museum.clone(), museum], now),
            Err(GuideError::DuplicatePoi(_))
        ));
    }

    #[test]
    fn settings_voices_are_filtered_to_supported_languages() {
        let (guide, _probe) = guide();
        let uris: Vec<String> = guide.available_voices().into_iter().map(|v| v.voice_uri).collect();
        assert_eq!(uris, vec!["en-voice", "pl-voice"]);
    }

    #[test]
    fn session_serializes_for_display() {
        let (mut guide, _probe) = guide();
        guide.handle_location(Some(&at_castle()), Instant::now());

        let json = serde_json::to_value(guide.session()).unwrap();
        assert_eq!(json["activePoiId"], "castle");
        assert_eq!(json["status"], "narrating");
        assert_eq!(json["voiceURI"], "en-voice");
        assert_eq!(json["languageCode"], "en");
    }
}
