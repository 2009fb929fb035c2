//! Continuous position tracking over a platform location source.
//!
//! The tracker owns the platform watch for its whole lifetime: activation
//! requests a one-shot high-accuracy fix and then starts a watch with
//! `maximum_age = 0`, and dropping (or stopping) the tracker clears the watch.
//! Fixes are delivered by the source over a channel; anything still queued
//! after teardown is discarded.

use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::GuideError;
use crate::geo::Coordinate;

/// Handle of an active platform watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchId(pub u64);

/// Options passed to the location source for a fix request.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionOptions {
    pub high_accuracy: bool,
    /// Oldest cached fix the source may return. `Some(ZERO)` forces a fresh fix.
    pub maximum_age: Option<Duration>,
    /// Upper bound on how long a single fix may take.
    pub timeout: Option<Duration>,
}

impl PositionOptions {
    /// The initial one-shot request.
    pub fn one_shot() -> Self {
        Self {
            high_accuracy: true,
            maximum_age: None,
            timeout: None,
        }
    }

    /// The continuous watch request; never reuses a stale fix.
    pub fn tracking(timeout: Duration) -> Self {
        Self {
            high_accuracy: true,
            maximum_age: Some(Duration::ZERO),
            timeout: Some(timeout),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionErrorCode {
    Unsupported = 0,
    PermissionDenied = 1,
    PositionUnavailable = 2,
    Timeout = 3,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionError {
    pub code: PositionErrorCode,
    pub message: String,
}

impl PositionError {
    pub fn new(code: PositionErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    fn unsupported() -> Self {
        Self::new(
            PositionErrorCode::Unsupported,
            "Geolocation is not supported on this device",
        )
    }
}

impl From<PositionError> for GuideError {
    fn from(err: PositionError) -> Self {
        match err.code {
            PositionErrorCode::Unsupported => GuideError::LocationUnavailable,
            code => GuideError::LocationFixFailed {
                code,
                message: err.message,
            },
        }
    }
}

/// Which request a position event answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionRequest {
    OneShot,
    Watch(WatchId),
}

/// A fix or a fix failure pushed by the location source.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionEvent {
    pub request: PositionRequest,
    pub result: Result<Coordinate, PositionError>,
}

/// Platform location capability.
///
/// Results are pushed into the provided sender whenever the platform has
/// them. A send into a closed channel means the consumer has gone away and
/// should be ignored by the implementation.
pub trait LocationSource {
    /// Request a single fix.
    fn current_position(&mut self, options: &PositionOptions, sink: Sender<PositionEvent>);

    /// Start continuous tracking. Fixes keep arriving until `clear_watch`.
    fn watch_position(&mut self, options: &PositionOptions, sink: Sender<PositionEvent>) -> WatchId;

    /// Stop a watch started by `watch_position`.
    fn clear_watch(&mut self, id: WatchId);
}

/// Latest fix and latest error from a location source.
pub struct LocationTracker<L: LocationSource> {
    source: Option<L>,
    events: Option<Receiver<PositionEvent>>,
    watch: Option<WatchId>,
    location: Option<Coordinate>,
    error: Option<PositionError>,
    is_watching: bool,
}

impl<L: LocationSource> LocationTracker<L> {
    /// Start tracking. `None` means the platform has no location capability,
    /// in which case an `Unsupported` error is reported and no fix ever arrives.
    pub fn activate(source: Option<L>, fix_timeout: Duration) -> Self {
        let Some(mut source) = source else {
            log::warn!("No location source available, tracking disabled");
            return Self {
                source: None,
                events: None,
                watch: None,
                location: None,
                error: Some(PositionError::unsupported()),
                is_watching: false,
            };
        };

        let (tx, rx) = mpsc::channel();
        source.current_position(&PositionOptions::one_shot(), tx.clone());
        let watch = source.watch_position(&PositionOptions::tracking(fix_timeout), tx);
        log::info!("Location tracking started (watch {})", watch.0);

        Self {
            source: Some(source),
            events: Some(rx),
            watch: Some(watch),
            location: None,
            error: None,
            is_watching: false,
        }
    }

    /// Apply every event queued by the source. Returns true if state changed.
    pub fn poll(&mut self) -> bool {
        let mut pending = Vec::new();
        if let Some(rx) = &self.events {
            loop {
                match rx.try_recv() {
                    Ok(event) => pending.push(event),
                    Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
                }
            }
        }

        let mut changed = false;
        for event in pending {
            changed |= self.apply(event);
        }
        changed
    }

    fn apply(&mut self, event: PositionEvent) -> bool {
        if let PositionRequest::Watch(id) = event.request {
            if self.watch != Some(id) {
                log::debug!("Dropping fix from stale watch {}", id.0);
                return false;
            }
        }

        match (event.request, event.result) {
            (PositionRequest::OneShot, Ok(coordinate)) => {
                self.location = Some(coordinate);
            }
            (PositionRequest::Watch(_), Ok(coordinate)) => {
                self.location = Some(coordinate);
                self.is_watching = true;
                self.error = None;
            }
            (_, Err(err)) => {
                log::warn!("Location fix failed ({:?}): {}", err.code, err.message);
                // The last good location stays valid.
                self.error = Some(err);
            }
        }
        true
    }

    /// Cancel the watch and drop anything still queued. Idempotent.
    pub fn stop(&mut self) {
        if let (Some(source), Some(watch)) = (self.source.as_mut(), self.watch.take()) {
            source.clear_watch(watch);
            log::info!("Location tracking stopped (watch {})", watch.0);
        }
        self.events = None;
        self.is_watching = false;
    }

    pub fn location(&self) -> Option<&Coordinate> {
        self.location.as_ref()
    }

    pub fn error(&self) -> Option<&PositionError> {
        self.error.as_ref()
    }

    pub fn is_watching(&self) -> bool {
        self.is_watching
    }

    pub fn is_supported(&self) -> bool {
        self.source.is_some()
    }

    pub fn source_mut(&mut self) -> Option<&mut L> {
        self.source.as_mut()
    }
}

impl<L: LocationSource> Drop for LocationTracker<L> {
    fn drop(&mut self) {
        self.stop();
    }
}
