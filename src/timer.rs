//! Virtual clock and restartable single-shot timers
//!
//! Timers never call back on their own. The owner polls them with
//! [`Timer::take_due`] and runs the callback itself, which keeps every state
//! machine testable by simply advancing a [`Clock`].

use std::time::Duration;
use tracing::warn;

/// Point in virtual time at which an armed timer fires.
///
/// Ordered by instant first, then by the order timers were armed, so two timers
/// due at the same instant fire in arming order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Due {
    pub at: Duration,
    seq: u64,
}

/// Virtual time source for one page context
#[derive(Debug, Default)]
pub struct Clock {
    now: Duration,
    next_seq: u64,
}

impl Clock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    /// Move time forward. Time never moves backwards.
    pub fn set(&mut self, at: Duration) {
        if at < self.now {
            warn!(now = ?self.now, requested = ?at, "Ignoring attempt to move clock backwards");
            return;
        }
        self.now = at;
    }

    fn schedule(&mut self, delay: Duration) -> Due {
        let seq = self.next_seq;
        self.next_seq += 1;
        Due {
            at: self.now + delay,
            seq,
        }
    }
}

#[derive(Debug)]
struct Pending<A> {
    due: Due,
    arg: A,
}

/// Restartable, cancelable deferred invocation carrying an argument of type `A`
#[derive(Debug)]
pub struct Timer<A> {
    name: &'static str,
    delay: Duration,
    pending: Option<Pending<A>>,
}

impl<A> Timer<A> {
    pub fn new(name: &'static str, delay: Duration) -> Self {
        Self {
            name,
            delay,
            pending: None,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Arm the timer. An already armed timer is cancelled and rescheduled from
    /// now; the new argument replaces the old one.
    pub fn start(&mut self, clock: &mut Clock, arg: A) {
        let due = clock.schedule(self.delay);
        self.pending = Some(Pending { due, arg });
    }

    /// Cancel if armed
    pub fn stop(&mut self) {
        self.pending = None;
    }

    /// Change the delay used by future `start` calls. An armed timer keeps its deadline.
    pub fn update_delay(&mut self, delay: Duration) {
        self.delay = delay;
    }

    pub fn is_armed(&self) -> bool {
        self.pending.is_some()
    }

    pub fn due(&self) -> Option<Due> {
        self.pending.as_ref().map(|p| p.due)
    }

    pub fn pending_arg(&self) -> Option<&A> {
        self.pending.as_ref().map(|p| &p.arg)
    }

    /// Disarm and return the argument if the deadline has passed.
    ///
    /// The timer is already disarmed when the caller receives the argument, so the
    /// callback may start it again.
    pub fn take_due(&mut self, now: Duration) -> Option<A> {
        match &self.pending {
            Some(p) if p.due.at <= now => self.pending.take().map(|p| p.arg),
            _ => None,
        }
    }
}

/// Earliest of two optional deadlines, tagged with whatever identifies the timer
pub fn earliest<K>(a: Option<(Due, K)>, b: Option<(Due, K)>) -> Option<(Due, K)> {
    match (a, b) {
        (Some(a), Some(b)) => Some(if b.0 < a.0 { b } else { a }),
        (a, None) => a,
        (None, b) => b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn test_fires_after_delay() {
        let mut clock = Clock::new();
        let mut timer = Timer::new("t", ms(100));
        timer.start(&mut clock, "a");

        clock.set(ms(99));
        assert_eq!(timer.take_due(clock.now()), None);
        clock.set(ms(100));
        assert_eq!(timer.take_due(clock.now()), Some("a"));
        assert!(!timer.is_armed());
    }

    #[test]
    fn test_restart_cancels_previous_and_last_arg_wins() {
        let mut clock = Clock::new();
        let mut timer = Timer::new("t", ms(100));
        timer.start(&mut clock, "a");
        clock.set(ms(60));
        timer.start(&mut clock, "b");

        // Original deadline passes without firing
        clock.set(ms(100));
        assert_eq!(timer.take_due(clock.now()), None);

        clock.set(ms(160));
        assert_eq!(timer.take_due(clock.now()), Some("b"));
        // Fires only once
        assert_eq!(timer.take_due(ms(10_000)), None);
    }

    #[test]
    fn test_stop_is_noop_when_idle() {
        let mut timer: Timer<()> = Timer::new("t", ms(10));
        timer.stop();
        assert!(!timer.is_armed());
    }

    #[test]
    fn test_update_delay_only_affects_future_starts() {
        let mut clock = Clock::new();
        let mut timer = Timer::new("t", ms(100));
        timer.start(&mut clock, ());
        timer.update_delay(ms(500));
        assert_eq!(timer.due().map(|d| d.at), Some(ms(100)));

        clock.set(ms(100));
        assert_eq!(timer.take_due(clock.now()), Some(()));
        timer.start(&mut clock, ());
        assert_eq!(timer.due().map(|d| d.at), Some(ms(600)));
    }

    #[test]
    fn test_callback_can_rearm() {
        let mut clock = Clock::new();
        let mut timer = Timer::new("t", ms(10));
        timer.start(&mut clock, 1);
        clock.set(ms(10));
        let arg = timer.take_due(clock.now()).unwrap();
        timer.start(&mut clock, arg + 1);
        assert_eq!(timer.pending_arg(), Some(&2));
        assert_eq!(timer.due().map(|d| d.at), Some(ms(20)));
    }

    #[test]
    fn test_same_instant_orders_by_arming() {
        let mut clock = Clock::new();
        let mut first = Timer::new("first", ms(50));
        let mut second = Timer::new("second", ms(50));
        first.start(&mut clock, ());
        second.start(&mut clock, ());

        let picked = earliest(second.due().map(|d| (d, "second")), first.due().map(|d| (d, "first")));
        assert_eq!(picked.map(|(_, k)| k), Some("first"));
    }

    #[test]
    fn test_clock_never_moves_backwards() {
        let mut clock = Clock::new();
        clock.set(ms(50));
        clock.set(ms(10));
        assert_eq!(clock.now(), ms(50));
    }
}
