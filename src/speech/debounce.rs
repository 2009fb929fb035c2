use std::time::{Duration, Instant};

/// Trailing-edge debouncer.
///
/// Every `call` replaces the pending value and pushes the deadline to
/// `now + window`; `flush` hands out the latest value once the deadline has
/// passed. Time is supplied by the caller.
#[derive(Debug)]
pub struct Debouncer<T> {
    window: Duration,
    pending: Option<(Instant, T)>,
}

impl<T> Debouncer<T> {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: None,
        }
    }

    /// Queue `value`, dropping whatever was queued before.
    pub fn call(&mut self, value: T, now: Instant) {
        if self.pending.is_some() {
            log::debug!("Debounced call superseded within {:?}", self.window);
        }
        self.pending = Some((now + self.window, value));
    }

    /// Take the queued value if its window has elapsed.
    pub fn flush(&mut self, now: Instant) -> Option<T> {
        match &self.pending {
            Some((deadline, _)) if now >= *deadline => self.pending.take().map(|(_, v)| v),
            _ => None,
        }
    }

    /// Drop the queued value without running it.
    pub fn cancel(&mut self) -> Option<T> {
        self.pending.take().map(|(_, v)| v)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(d, _)| *d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_millis(300);

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn burst_collapses_to_last_value() {
        let t0 = Instant::now();
        let mut debouncer = Debouncer::new(WINDOW);

        debouncer.call("a", t0);
        debouncer.call("b", t0 + ms(100));
        debouncer.call("c", t0 + ms(200));

        // 300 ms after the first call is still inside the window of the last one.
        assert_eq!(debouncer.flush(t0 + ms(300)), None);
        assert_eq!(debouncer.flush(t0 + ms(499)), None);
        assert_eq!(debouncer.flush(t0 + ms(500)), Some("c"));
        assert_eq!(debouncer.flush(t0 + ms(900)), None);
    }

    #[test]
    fn spaced_calls_each_fire() {
        let t0 = Instant::now();
        let mut debouncer = Debouncer::new(WINDOW);

        debouncer.call(1, t0);
        assert_eq!(debouncer.flush(t0 + ms(300)), Some(1));
        debouncer.call(2, t0 + ms(400));
        assert_eq!(debouncer.deadline(), Some(t0 + ms(700)));
        assert_eq!(debouncer.flush(t0 + ms(700)), Some(2));
    }

    #[test]
    fn cancel_discards_pending_value() {
        let t0 = Instant::now();
        let mut debouncer = Debouncer::new(WINDOW);

        debouncer.call(1, t0);
        assert!(debouncer.is_pending());
        assert_eq!(debouncer.cancel(), Some(1));
        assert!(!debouncer.is_pending());
        assert_eq!(debouncer.flush(t0 + ms(1000)), None);
    }
}
