//! Recording fakes for the platform capabilities.
//!
//! Each fake is a cheap clone over shared state: hand one clone to the code
//! under test and keep another as a probe.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::mpsc::Sender;

use crate::geo::{Coordinate, EARTH_RADIUS_M};
use crate::location::{
    LocationSource, PositionError, PositionEvent, PositionOptions, PositionRequest, WatchId,
};
use crate::speech::Voice;
use crate::{SpeechEvent, SpeechSynthesizer, Utterance, UtteranceId};

/// The point `meters` due north of `origin`.
pub fn point_north_of(origin: &Coordinate, meters: f64) -> Coordinate {
    let d_lat = (meters / EARTH_RADIUS_M).to_degrees();
    Coordinate::new(origin.latitude + d_lat, origin.longitude)
}

#[derive(Default)]
struct SynthState {
    voices: Vec<Voice>,
    spoken: Vec<Utterance>,
    current: Option<UtteranceId>,
    sink: Option<Sender<SpeechEvent>>,
    cancels: usize,
    pauses: usize,
    resumes: usize,
}

#[derive(Clone, Default)]
pub struct FakeSynthesizer {
    state: Rc<RefCell<SynthState>>,
}

impl FakeSynthesizer {
    pub fn with_voices(voices: Vec<Voice>) -> Self {
        let synth = Self::default();
        synth.state.borrow_mut().voices = voices;
        synth
    }

    pub fn emit(&self, event: SpeechEvent) {
        if let Some(sink) = &self.state.borrow().sink {
            let _ = sink.send(event);
        }
    }

    /// Replace the catalog and announce the change.
    pub fn set_voices(&self, voices: Vec<Voice>) {
        self.state.borrow_mut().voices = voices;
        self.emit(SpeechEvent::VoicesChanged);
    }

    /// Play the current utterance to its natural end.
    pub fn finish_current(&self) {
        let current = self.state.borrow_mut().current.take();
        if let Some(id) = current {
            self.emit(SpeechEvent::Ended(id));
        }
    }

    pub fn spoken(&self) -> Vec<Utterance> {
        self.state.borrow().spoken.clone()
    }

    pub fn cancel_count(&self) -> usize {
        self.state.borrow().cancels
    }

    pub fn pause_count(&self) -> usize {
        self.state.borrow().pauses
    }

    pub fn resume_count(&self) -> usize {
        self.state.borrow().resumes
    }

    pub fn is_subscribed(&self) -> bool {
        self.state.borrow().sink.is_some()
    }
}

impl SpeechSynthesizer for FakeSynthesizer {
    fn voices(&self) -> Vec<Voice> {
        self.state.borrow().voices.clone()
    }

    fn speak(&mut self, utterance: Utterance) {
        let id = utterance.id;
        {
            let mut state = self.state.borrow_mut();
            state.spoken.push(utterance);
            state.current = Some(id);
        }
        self.emit(SpeechEvent::Started(id));
    }

    fn cancel(&mut self) {
        let mut state = self.state.borrow_mut();
        state.cancels += 1;
        state.current = None;
    }

    fn pause(&mut self) {
        self.state.borrow_mut().pauses += 1;
    }

    fn resume(&mut self) {
        self.state.borrow_mut().resumes += 1;
    }

    fn subscribe(&mut self, sink: Sender<SpeechEvent>) {
        self.state.borrow_mut().sink = Some(sink);
    }

    fn unsubscribe(&mut self) {
        self.state.borrow_mut().sink = None;
    }
}

#[derive(Default)]
struct LocationState {
    requests: Vec<PositionOptions>,
    one_shot: Option<Sender<PositionEvent>>,
    watch: Option<(WatchId, Sender<PositionEvent>)>,
    cleared: Vec<WatchId>,
    next_watch: u64,
}

#[derive(Clone, Default)]
pub struct FakeLocationSource {
    state: Rc<RefCell<LocationState>>,
}

impl FakeLocationSource {
    pub fn requests(&self) -> Vec<PositionOptions> {
        self.state.borrow().requests.clone()
    }

    pub fn cleared(&self) -> Vec<WatchId> {
        self.state.borrow().cleared.clone()
    }

    pub fn active_watch(&self) -> Option<WatchId> {
        self.state.borrow().watch.as_ref().map(|(id, _)| *id)
    }

    pub fn push_one_shot_fix(&self, coordinate: Coordinate) {
        if let Some(sink) = self.state.borrow_mut().one_shot.take() {
            let _ = sink.send(PositionEvent {
                request: PositionRequest::OneShot,
                result: Ok(coordinate),
            });
        }
    }

    fn push_watch(&self, result: Result<Coordinate, PositionError>) {
        if let Some((id, sink)) = &self.state.borrow().watch {
            let _ = sink.send(PositionEvent {
                request: PositionRequest::Watch(*id),
                result,
            });
        }
    }

    pub fn push_watch_fix(&self, coordinate: Coordinate) {
        self.push_watch(Ok(coordinate));
    }

    pub fn push_watch_error(&self, error: PositionError) {
        self.push_watch(Err(error));
    }
}

impl LocationSource for FakeLocationSource {
    fn current_position(&mut self, options: &PositionOptions, sink: Sender<PositionEvent>) {
        let mut state = self.state.borrow_mut();
        state.requests.push(options.clone());
        state.one_shot = Some(sink);
    }

    fn watch_position(&mut self, options: &PositionOptions, sink: Sender<PositionEvent>) -> WatchId {
        let mut state = self.state.borrow_mut();
        state.requests.push(options.clone());
        let id = WatchId(state.next_watch);
        state.next_watch += 1;
        state.watch = Some((id, sink));
        id
    }

    fn clear_watch(&mut self, id: WatchId) {
        let mut state = self.state.borrow_mut();
        if state.watch.as_ref().is_some_and(|(w, _)| *w == id) {
            state.watch = None;
        }
        state.cleared.push(id);
    }
}
