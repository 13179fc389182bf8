//! Debounce timer for push scheduling.

use std::time::{Duration, Instant};

/// A trailing-edge debounce timer.
///
/// Each [`poke`](DebounceTimer::poke) cancels the previous deadline and
/// schedules a new one a full window away, so the timer fires only after
/// the window elapses with no further pokes. The timer holds no thread of
/// its own; the host pumps it through
/// [`fire_if_due`](DebounceTimer::fire_if_due).
#[derive(Debug)]
pub struct DebounceTimer {
    window: Duration,
    deadline: Option<Instant>,
}

impl DebounceTimer {
    /// Creates an unscheduled timer with the given window.
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            deadline: None,
        }
    }

    /// Returns the debounce window.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Restarts the timer: the deadline becomes `now + window`.
    pub fn poke(&mut self, now: Instant) {
        self.deadline = Some(now + self.window);
    }

    /// Cancels any scheduled deadline.
    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    /// Returns true if a deadline is scheduled.
    pub fn is_scheduled(&self) -> bool {
        self.deadline.is_some()
    }

    /// Returns the pending deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Fires the timer if its deadline has passed.
    ///
    /// Firing consumes the deadline; the timer stays unscheduled until
    /// the next poke.
    pub fn fire_if_due(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unscheduled_timer_never_fires() {
        let mut timer = DebounceTimer::new(Duration::from_millis(100));
        assert!(!timer.is_scheduled());
        assert!(!timer.fire_if_due(Instant::now()));
    }

    #[test]
    fn fires_after_window() {
        let mut timer = DebounceTimer::new(Duration::from_millis(100));
        let start = Instant::now();

        timer.poke(start);
        assert!(timer.is_scheduled());
        assert!(!timer.fire_if_due(start + Duration::from_millis(50)));
        assert!(timer.fire_if_due(start + Duration::from_millis(100)));

        // Firing consumes the deadline
        assert!(!timer.is_scheduled());
        assert!(!timer.fire_if_due(start + Duration::from_millis(500)));
    }

    #[test]
    fn poke_reschedules_trailing_edge() {
        let mut timer = DebounceTimer::new(Duration::from_millis(100));
        let start = Instant::now();

        timer.poke(start);
        // A second edit 80ms in pushes the deadline out
        timer.poke(start + Duration::from_millis(80));

        assert!(!timer.fire_if_due(start + Duration::from_millis(120)));
        assert!(timer.fire_if_due(start + Duration::from_millis(180)));
    }

    #[test]
    fn cancel_clears_deadline() {
        let mut timer = DebounceTimer::new(Duration::from_millis(100));
        let start = Instant::now();

        timer.poke(start);
        timer.cancel();

        assert!(!timer.is_scheduled());
        assert!(!timer.fire_if_due(start + Duration::from_millis(200)));
    }
}
