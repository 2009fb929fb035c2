use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::time::Instant;

use crate::config::GuideConfig;
use crate::error::GuideError;
use crate::poi::Language;
use crate::preferences::{PreferenceStore, SpeechPreferences};
use crate::{SpeechEvent, SpeechSynthesizer, Utterance, UtteranceId};

use super::debounce::Debouncer;
use super::voice::{default_voice_for_locale, Voice};
use super::{DEFAULT_PITCH, DEFAULT_VOLUME, MAX_RATE, MIN_RATE};

/// Per-request overrides for [`NarrationEngine::start`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StartOptions {
    /// Overrides the engine rate for this utterance only.
    pub rate: Option<f32>,
    /// Overrides the selected voice for this utterance only.
    pub voice_uri: Option<String>,
}

/// Receipt for a `start` request.
///
/// Only the last request in a debounce burst ever plays, so only its ticket
/// is ever reported back in [`NarrationEvent::Finished`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NarrationTicket(pub u64);

#[derive(Debug, Clone, PartialEq)]
pub enum NarrationOutcome {
    Completed,
    Failed(String),
}

/// What the engine reports back from [`NarrationEngine::tick`].
#[derive(Debug, Clone, PartialEq)]
pub enum NarrationEvent {
    /// The platform finished the utterance for `ticket`, naturally or with an error.
    Finished {
        ticket: NarrationTicket,
        outcome: NarrationOutcome,
    },
    /// The voice catalog was re-read.
    VoicesChanged,
}

#[derive(Debug)]
struct PendingStart {
    ticket: NarrationTicket,
    text: String,
    rate: f32,
    voice_uri: Option<String>,
}

#[derive(Debug)]
struct ActiveUtterance {
    id: UtteranceId,
    ticket: NarrationTicket,
    started: bool,
}

/// Owns every interaction with the platform speech capability.
///
/// Without a synthesizer the engine is unavailable and playback calls are
/// no-ops. Voice and rate are loaded from the store once, at construction,
/// and written back on every change.
pub struct NarrationEngine<S: SpeechSynthesizer, P: PreferenceStore> {
    synth: Option<S>,
    events: Option<Receiver<SpeechEvent>>,
    store: P,
    locale: String,
    voices: Vec<Voice>,
    selected_voice: Option<String>,
    /// True once the selection came from the user or from saved preferences.
    explicit_selection: bool,
    rate: f32,
    language: Language,
    current: Option<ActiveUtterance>,
    paused: bool,
    debouncer: Debouncer<PendingStart>,
    next_ticket: u64,
    next_utterance: u64,
    preference_error: Option<GuideError>,
}

impl<S: SpeechSynthesizer, P: PreferenceStore> NarrationEngine<S, P> {
    pub fn new(synth: Option<S>, store: P, config: &GuideConfig) -> Self {
        let mut engine = Self {
            synth,
            events: None,
            store,
            locale: config.locale.clone(),
            voices: Vec::new(),
            selected_voice: None,
            explicit_selection: false,
            rate: clamp_rate(config.default_rate),
            language: Language::default(),
            current: None,
            paused: false,
            debouncer: Debouncer::new(config.debounce_window()),
            next_ticket: 0,
            next_utterance: 0,
            preference_error: None,
        };

        engine.load_preferences();

        match engine.synth.as_mut() {
            Some(synth) => {
                let (tx, rx) = mpsc::channel();
                synth.subscribe(tx);
                engine.events = Some(rx);
                engine.refresh_voices();
            }
            None => log::warn!("Speech synthesis is not available, narration disabled"),
        }

        engine
    }

    fn load_preferences(&mut self) {
        match SpeechPreferences::load(&self.store) {
            Ok(Some(prefs)) => {
                if !prefs.voice_uri.is_empty() {
                    self.selected_voice = Some(prefs.voice_uri);
                    self.explicit_selection = true;
                }
                if prefs.rate.is_finite() {
                    self.rate = clamp_rate(prefs.rate);
                }
                log::info!(
                    "Loaded speech preferences (voice={:?}, rate={})",
                    self.selected_voice,
                    self.rate
                );
            }
            Ok(None) => log::debug!("No saved speech preferences"),
            Err(e) => {
                log::warn!("{e}; using defaults");
                self.preference_error = Some(e);
            }
        }
    }

    /// Re-read the platform catalog.
    ///
    /// An explicit selection is never replaced. Without one, the selection
    /// defaults to the first voice matching the locale, or the first voice.
    pub fn refresh_voices(&mut self) {
        let Some(synth) = &self.synth else {
            return;
        };
        self.voices = synth.voices();
        log::info!("Voice catalog has {} voices", self.voices.len());

        if self.voices.is_empty() {
            return;
        }

        let selected = self
            .selected_voice
            .as_deref()
            .and_then(|uri| self.voices.iter().find(|v| v.voice_uri == uri));

        match selected {
            Some(voice) => self.language = voice.narration_language(),
            None if self.explicit_selection => {
                log::debug!(
                    "Selected voice {:?} not in catalog yet, keeping it",
                    self.selected_voice
                );
            }
            None => {
                if let Some(voice) = default_voice_for_locale(&self.voices, &self.locale) {
                    log::debug!("Defaulting to voice '{}' ({})", voice.name, voice.lang);
                    self.language = voice.narration_language();
                    self.selected_voice = Some(voice.voice_uri.clone());
                }
            }
        }
    }

    /// Select a voice by URI and persist the choice.
    ///
    /// Ongoing narration is stopped; a new utterance has to be started to
    /// hear the new voice. The in-memory change applies even if saving fails.
    pub fn select_voice(&mut self, voice_uri: &str) -> Result<(), GuideError> {
        if self.is_busy() {
            self.stop();
        }

        match self.voices.iter().find(|v| v.voice_uri == voice_uri) {
            Some(voice) => self.language = voice.narration_language(),
            None => log::warn!("Voice '{voice_uri}' is not in the catalog"),
        }
        self.selected_voice = Some(voice_uri.to_string());
        self.explicit_selection = true;
        log::info!("Voice changed to '{voice_uri}' (narration language {})", self.language);

        self.save_preferences()
    }

    /// Set the rate for subsequent starts, clamped to 0.5–2.0.
    pub fn set_rate(&mut self, rate: f32) -> Result<(), GuideError> {
        if !rate.is_finite() {
            log::warn!("Ignoring invalid speech rate {rate}");
            return Ok(());
        }
        self.rate = clamp_rate(rate);
        self.save_preferences()
    }

    fn save_preferences(&mut self) -> Result<(), GuideError> {
        SpeechPreferences {
            voice_uri: self.selected_voice.clone().unwrap_or_default(),
            rate: self.rate,
        }
        .save(&mut self.store)
    }

    /// Request narration of `text`.
    ///
    /// Requests are debounced: the utterance is handed to the platform by
    /// [`tick`](Self::tick) once no newer request arrived for the debounce
    /// window, and only the newest request plays. Returns `None` when speech
    /// is unavailable.
    pub fn start(&mut self, text: &str, options: StartOptions, now: Instant) -> Option<NarrationTicket> {
        if self.synth.is_none() {
            log::debug!("Speech unavailable, ignoring start");
            return None;
        }

        let ticket = NarrationTicket(self.next_ticket);
        self.next_ticket += 1;

        let rate = options.rate.filter(|r| r.is_finite()).map_or(self.rate, clamp_rate);
        self.debouncer.call(
            PendingStart {
                ticket,
                text: text.to_string(),
                rate,
                voice_uri: options.voice_uri.or_else(|| self.selected_voice.clone()),
            },
            now,
        );
        Some(ticket)
    }

    /// Hand a due start to the platform and drain platform events.
    pub fn tick(&mut self, now: Instant) -> Vec<NarrationEvent> {
        let mut out = self.drain_events();
        if let Some(pending) = self.debouncer.flush(now) {
            self.speak_now(pending);
        }
        out.extend(self.drain_events());
        out
    }

    fn speak_now(&mut self, pending: PendingStart) {
        let Some(synth) = self.synth.as_mut() else {
            return;
        };

        // At most one utterance at a time; the previous one never reports back.
        synth.cancel();
        if let Some(previous) = self.current.take() {
            log::debug!("Utterance {} superseded", previous.id.0);
        }

        let voice = pending.voice_uri.as_deref().and_then(|uri| {
            let found = synth.voices().into_iter().find(|v| v.voice_uri == uri);
            if found.is_none() {
                log::debug!("Voice '{uri}' unavailable, using platform default");
            }
            found
        });

        let id = UtteranceId(self.next_utterance);
        self.next_utterance += 1;
        log::info!(
            "Narrating utterance {} ({} chars, rate {}, voice {:?})",
            id.0,
            pending.text.len(),
            pending.rate,
            voice.as_ref().map(|v| v.name.as_str())
        );

        synth.speak(Utterance {
            id,
            text: pending.text,
            voice,
            rate: pending.rate,
            pitch: DEFAULT_PITCH,
            volume: DEFAULT_VOLUME,
        });
        self.current = Some(ActiveUtterance {
            id,
            ticket: pending.ticket,
            started: false,
        });
        self.paused = false;
    }

    fn drain_events(&mut self) -> Vec<NarrationEvent> {
        let mut queued = Vec::new();
        if let Some(rx) = &self.events {
            loop {
                match rx.try_recv() {
                    Ok(event) => queued.push(event),
                    Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
                }
            }
        }
        queued
            .into_iter()
            .filter_map(|event| self.handle_event(event))
            .collect()
    }

    fn handle_event(&mut self, event: SpeechEvent) -> Option<NarrationEvent> {
        match event {
            SpeechEvent::VoicesChanged => {
                self.refresh_voices();
                Some(NarrationEvent::VoicesChanged)
            }
            SpeechEvent::Started(id) => {
                match self.current.as_mut() {
                    Some(current) if current.id == id => current.started = true,
                    _ => log::debug!("Ignoring start of stale utterance {}", id.0),
                }
                None
            }
            SpeechEvent::Ended(id) => self.finish(id, NarrationOutcome::Completed),
            SpeechEvent::Failed { id, error } => {
                log::warn!("Utterance {} failed: {error}", id.0);
                self.finish(id, NarrationOutcome::Failed(error))
            }
        }
    }

    fn finish(&mut self, id: UtteranceId, outcome: NarrationOutcome) -> Option<NarrationEvent> {
        match &self.current {
            Some(current) if current.id == id => {
                let ticket = current.ticket;
                self.current = None;
                self.paused = false;
                Some(NarrationEvent::Finished { ticket, outcome })
            }
            _ => {
                log::debug!("Ignoring end of stale utterance {}", id.0);
                None
            }
        }
    }

    /// Cancel playback and any start still waiting in the debounce window.
    pub fn stop(&mut self) {
        if let Some(pending) = self.debouncer.cancel() {
            log::debug!("Dropped pending start {}", pending.ticket.0);
        }
        if let Some(synth) = self.synth.as_mut() {
            synth.cancel();
        }
        if let Some(current) = self.current.take() {
            log::info!("Stopped utterance {}", current.id.0);
        }
        self.paused = false;
    }

    pub fn pause(&mut self) {
        if !self.is_speaking() || self.paused {
            return;
        }
        if let Some(synth) = self.synth.as_mut() {
            synth.pause();
            self.paused = true;
        }
    }

    /// Resume the paused utterance with the voice and language it started with.
    pub fn resume(&mut self) {
        if !self.paused {
            return;
        }
        if let Some(synth) = self.synth.as_mut() {
            synth.resume();
            self.paused = false;
        }
    }

    pub fn is_available(&self) -> bool {
        self.synth.is_some()
    }

    /// True once the platform reported the current utterance as started.
    pub fn is_speaking(&self) -> bool {
        self.current.as_ref().is_some_and(|c| c.started)
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// True while a start is queued or an utterance is with the platform.
    pub fn is_busy(&self) -> bool {
        self.current.is_some() || self.debouncer.is_pending()
    }

    /// The full platform catalog, unfiltered.
    pub fn voices(&self) -> &[Voice] {
        &self.voices
    }

    pub fn selected_voice(&self) -> Option<&str> {
        self.selected_voice.as_deref()
    }

    pub fn rate(&self) -> f32 {
        self.rate
    }

    pub fn narration_language(&self) -> Language {
        self.language
    }

    /// The error hit while loading saved preferences, reported once.
    pub fn take_preference_error(&mut self) -> Option<GuideError> {
        self.preference_error.take()
    }

    pub fn synthesizer_mut(&mut self) -> Option<&mut S> {
        self.synth.as_mut()
    }
}

impl<S: SpeechSynthesizer, P: PreferenceStore> Drop for NarrationEngine<S, P> {
    fn drop(&mut self) {
        if let Some(synth) = self.synth.as_mut() {
            synth.cancel();
            synth.unsubscribe();
        }
    }
}

fn clamp_rate(rate: f32) -> f32 {
    rate.clamp(MIN_RATE, MAX_RATE)
}
