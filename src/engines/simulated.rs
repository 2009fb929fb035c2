use std::sync::mpsc::Sender;
use std::time::{Duration, Instant};

use crate::geo::Coordinate;
use crate::location::{
    LocationSource, PositionError, PositionEvent, PositionOptions, PositionRequest, WatchId,
};
use crate::speech::Voice;
use crate::{SpeechEvent, SpeechSynthesizer, Utterance, UtteranceId};

/// Speaking speed at rate 1.0.
const WORDS_PER_MINUTE: f32 = 160.0;

struct Playing {
    id: UtteranceId,
    remaining: Duration,
    ends_at: Option<Instant>,
}

/// Speech platform stand-in that plays utterances in virtual time.
///
/// An utterance lasts as long as its words take at [`WORDS_PER_MINUTE`]
/// scaled by the rate, and ends when [`advance`](Self::advance) moves the
/// clock past that point. The catalog can be held back to mimic platforms
/// that deliver voices late.
pub struct SimulatedSynthesizer {
    voices: Vec<Voice>,
    published: bool,
    sink: Option<Sender<SpeechEvent>>,
    clock: Option<Instant>,
    playing: Option<Playing>,
    paused: bool,
}

impl Default for SimulatedSynthesizer {
    fn default() -> Self {
        Self::new(vec![
            Voice::new("sim:en-US", "Simulated English (US)", "en-US"),
            Voice::new("sim:en-GB", "Simulated English (UK)", "en-GB"),
            Voice::new("sim:pl-PL", "Simulated Polish", "pl-PL"),
            Voice::new("sim:de-DE", "Simulated German", "de-DE"),
            Voice::new("sim:fr-FR", "Simulated French", "fr-FR"),
        ])
    }
}

impl SimulatedSynthesizer {
    pub fn new(voices: Vec<Voice>) -> Self {
        Self {
            voices,
            published: true,
            sink: None,
            clock: None,
            playing: None,
            paused: false,
        }
    }

    /// Report an empty catalog until [`publish_voices`](Self::publish_voices).
    pub fn with_late_voices(mut self) -> Self {
        self.published = false;
        self
    }

    pub fn publish_voices(&mut self) {
        if !self.published {
            self.published = true;
            self.emit(SpeechEvent::VoicesChanged);
        }
    }

    fn emit(&self, event: SpeechEvent) {
        if let Some(sink) = &self.sink {
            // A closed channel means the engine is gone.
            let _ = sink.send(event);
        }
    }

    /// Move the virtual clock, ending the current utterance if it is due.
    pub fn advance(&mut self, now: Instant) {
        self.clock = Some(now);
        let Some(playing) = self.playing.as_mut() else {
            return;
        };
        if self.paused {
            return;
        }
        let ends_at = *playing.ends_at.get_or_insert(now + playing.remaining);
        if now >= ends_at {
            let id = playing.id;
            self.playing = None;
            log::info!("[speech] utterance {} finished", id.0);
            self.emit(SpeechEvent::Ended(id));
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playing.is_some()
    }
}

impl SpeechSynthesizer for SimulatedSynthesizer {
    fn voices(&self) -> Vec<Voice> {
        if self.published {
            self.voices.clone()
        } else {
            Vec::new()
        }
    }

    fn speak(&mut self, utterance: Utterance) {
        let words = utterance.text.split_whitespace().count().max(1) as f32;
        let seconds = words / (WORDS_PER_MINUTE / 60.0 * utterance.rate.max(0.1));
        let remaining = Duration::from_secs_f32(seconds);

        log::info!(
            "[speech] {} ({:.1}s, voice {}): {}",
            utterance.id.0,
            seconds,
            utterance.voice.as_ref().map_or("default", |v| v.name.as_str()),
            utterance.text
        );

        self.paused = false;
        self.playing = Some(Playing {
            id: utterance.id,
            remaining,
            ends_at: self.clock.map(|c| c + remaining),
        });
        self.emit(SpeechEvent::Started(utterance.id));
    }

    fn cancel(&mut self) {
        if let Some(playing) = self.playing.take() {
            log::debug!("[speech] utterance {} cancelled", playing.id.0);
        }
        self.paused = false;
    }

    fn pause(&mut self) {
        let (Some(playing), Some(clock)) = (self.playing.as_mut(), self.clock) else {
            return;
        };
        if let Some(ends_at) = playing.ends_at.take() {
            playing.remaining = ends_at.saturating_duration_since(clock);
        }
        self.paused = true;
    }

    fn resume(&mut self) {
        self.paused = false;
    }

    fn subscribe(&mut self, sink: Sender<SpeechEvent>) {
        self.sink = Some(sink);
    }

    fn unsubscribe(&mut self) {
        self.sink = None;
    }
}

/// Location source that replays a fixed route, one fix per [`step`](Self::step).
pub struct SimulatedLocation {
    route: Vec<Coordinate>,
    cursor: usize,
    watch: Option<(WatchId, Sender<PositionEvent>)>,
    next_watch: u64,
}

impl SimulatedLocation {
    pub fn new(route: Vec<Coordinate>) -> Self {
        Self {
            route,
            cursor: 0,
            watch: None,
            next_watch: 1,
        }
    }

    /// Deliver the next fix of the route. Returns false once the route is done.
    pub fn step(&mut self) -> bool {
        let Some(fix) = self.route.get(self.cursor).copied() else {
            return false;
        };
        self.cursor += 1;
        self.send(Ok(fix));
        true
    }

    /// Deliver a fix failure to the active watch.
    pub fn fail(&mut self, error: PositionError) {
        self.send(Err(error));
    }

    fn send(&self, result: Result<Coordinate, PositionError>) {
        if let Some((id, sink)) = &self.watch {
            let _ = sink.send(PositionEvent {
                request: PositionRequest::Watch(*id),
                result,
            });
        }
    }
}

impl LocationSource for SimulatedLocation {
    fn current_position(&mut self, _options: &PositionOptions, sink: Sender<PositionEvent>) {
        if let Some(first) = self.route.first().copied() {
            let _ = sink.send(PositionEvent {
                request: PositionRequest::OneShot,
                result: Ok(first),
            });
        }
    }

    fn watch_position(&mut self, options: &PositionOptions, sink: Sender<PositionEvent>) -> WatchId {
        let id = WatchId(self.next_watch);
        self.next_watch += 1;
        log::debug!("[location] watch {} started ({options:?})", id.0);
        self.watch = Some((id, sink));
        id
    }

    fn clear_watch(&mut self, id: WatchId) {
        if self.watch.as_ref().is_some_and(|(w, _)| *w == id) {
            log::debug!("[location] watch {} cleared", id.0);
            self.watch = None;
        }
    }
}
