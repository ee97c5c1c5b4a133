use std::time::{Duration, Instant};

use tracing::debug;

/// Identifies one arming of a [`Timer`]. Ticks carrying an id from an
/// earlier arming are stale and must be ignored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

/// A single repeating timer, owned by whoever needs the ticks.
///
/// Only one arming is live at a time: `start` always cancels the previous
/// one first, so repeated start/stop cycles never leave a second schedule
/// behind.
#[derive(Debug)]
pub struct Timer {
    period: Duration,
    generation: u64,
    next_due: Option<Instant>,
}

impl Timer {
    pub fn new(period: Duration) -> Self {
        Self {
            // a zero period would fire unboundedly in `fire_due`
            period: period.max(Duration::from_millis(1)),
            generation: 0,
            next_due: None,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Arm the timer with its first deadline one period after `now`.
    pub fn start(&mut self, now: Instant) -> TimerId {
        self.cancel();
        self.generation += 1;
        self.next_due = Some(now + self.period);
        debug!(generation = self.generation, period_ms = self.period.as_millis() as u64, "timer armed");
        TimerId(self.generation)
    }

    pub fn cancel(&mut self) {
        if self.next_due.take().is_some() {
            debug!(generation = self.generation, "timer cancelled");
        }
    }

    pub fn is_active(&self) -> bool {
        self.next_due.is_some()
    }

    /// Id of the live arming, if any.
    pub fn current(&self) -> Option<TimerId> {
        self.next_due.map(|_| TimerId(self.generation))
    }

    pub fn is_current(&self, id: TimerId) -> bool {
        self.current() == Some(id)
    }

    /// Consume every whole period that has elapsed by `now` and return how
    /// many fired. An inactive timer never fires.
    pub fn fire_due(&mut self, now: Instant) -> u32 {
        let Some(mut due) = self.next_due else {
            return 0;
        };

        let mut fired = 0;
        while due <= now {
            fired += 1;
            due += self.period;
        }
        self.next_due = Some(due);
        fired
    }
}
