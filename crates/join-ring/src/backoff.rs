//! Bounded spin-then-yield backoff shared by every blocking ring operation
//! (`push`/`pop`/`reserve_with_backoff` on all three disciplines) and by
//! `join-endpoint`'s `timed_send`/`timed_receive` poll loops.
//!
//! None of those paths has a condition variable to park on: the only
//! wakeup signal a full or empty ring gets is the opposite side's next
//! CAS, so spinning with back-off is the only wait strategy available.
//! [`Backoff`] escalates through two phases before giving up pacing
//! entirely and just yielding every call: a short run of `PAUSE`-hinted
//! spins, then cooperative `yield_now` calls, doubling the wait each step
//! within each phase.

use std::hint;
use std::thread;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Spinning,
    Yielding,
    Exhausted,
}

/// Tracks how long a single wait loop has been retrying, so repeated
/// `snooze()` calls escalate instead of hammering the CPU at a fixed rate.
#[derive(Debug)]
pub struct Backoff {
    phase: Phase,
    step: u32,
}

impl Backoff {
    const SPIN_LIMIT: u32 = 6;
    const YIELD_LIMIT: u32 = 10;

    /// Starts a fresh backoff at the beginning of the spinning phase.
    #[inline]
    pub fn new() -> Self {
        Self {
            phase: Phase::Spinning,
            step: 0,
        }
    }

    /// Runs `2^step` `PAUSE`-hinted spins, capped at `2^SPIN_LIMIT`, and
    /// advances into the yielding phase once the cap is reached.
    #[inline]
    pub fn spin(&mut self) {
        let spins = 1u32 << self.step.min(Self::SPIN_LIMIT);
        for _ in 0..spins {
            hint::spin_loop();
        }
        if self.step < Self::SPIN_LIMIT {
            self.step += 1;
        } else {
            self.phase = Phase::Yielding;
        }
    }

    /// Advances the wait by one step: spins while in the spinning phase,
    /// yields to the OS scheduler once past it. Never blocks.
    #[inline]
    pub fn snooze(&mut self) {
        match self.phase {
            Phase::Spinning => self.spin(),
            Phase::Yielding => {
                thread::yield_now();
                if self.step < Self::YIELD_LIMIT {
                    self.step += 1;
                } else {
                    self.phase = Phase::Exhausted;
                }
            }
            Phase::Exhausted => thread::yield_now(),
        }
    }

    /// True once the spin/yield escalation has bottomed out. Callers that
    /// loop on `is_completed()` still retry; this just tells them back-off
    /// has nothing more to offer and the loop is now a plain busy-wait.
    #[inline]
    pub fn is_completed(&self) -> bool {
        self.phase == Phase::Exhausted
    }

    /// Restarts the escalation from the beginning, for reuse across
    /// independent wait loops on the same call stack.
    #[inline]
    pub fn reset(&mut self) {
        self.phase = Phase::Spinning;
        self.step = 0;
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escalates_from_spinning_to_exhausted() {
        let mut b = Backoff::new();
        assert!(!b.is_completed());

        for _ in 0..(Backoff::SPIN_LIMIT + Backoff::YIELD_LIMIT + 1) {
            b.snooze();
        }
        assert!(b.is_completed());
    }

    #[test]
    fn reset_returns_to_spinning() {
        let mut b = Backoff::new();
        while !b.is_completed() {
            b.snooze();
        }
        b.reset();
        assert!(!b.is_completed());
        assert_eq!(b.phase, Phase::Spinning);
    }
}
