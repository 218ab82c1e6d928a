//! Turn counter and tick rate for one session

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

pub const DEFAULT_TURNS_PER_SECOND: f64 = 1.4;

/// Session-scoped simulation clock.
///
/// Created when a session starts and shared through an `Arc` by every task of
/// that session. The receive loop writes it, the simulation reads it.
#[derive(Debug)]
pub struct SessionClock {
    turn_number: AtomicI64,
    turns_per_second: AtomicU64,
}

impl Default for SessionClock {
    fn default() -> Self {
        Self::new(DEFAULT_TURNS_PER_SECOND)
    }
}

impl SessionClock {
    pub fn new(turns_per_second: f64) -> Self {
        Self {
            turn_number: AtomicI64::new(0),
            turns_per_second: AtomicU64::new(turns_per_second.to_bits()),
        }
    }

    pub fn turn_number(&self) -> i64 {
        self.turn_number.load(Ordering::SeqCst)
    }

    pub fn set_turn_number(&self, turn: i64) {
        self.turn_number.store(turn, Ordering::SeqCst);
    }

    /// Increments the turn counter and returns the new turn.
    pub fn advance(&self) -> i64 {
        self.turn_number.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn turns_per_second(&self) -> f64 {
        f64::from_bits(self.turns_per_second.load(Ordering::SeqCst))
    }

    pub fn set_turns_per_second(&self, turns_per_second: f64) {
        self.turns_per_second
            .store(turns_per_second.to_bits(), Ordering::SeqCst);
    }

    /// Back to turn zero at the default rate; called at session teardown.
    pub fn reset(&self) {
        self.set_turn_number(0);
        self.set_turns_per_second(DEFAULT_TURNS_PER_SECOND);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use std::sync::Arc;

    #[test]
    fn test_clock_accessors() {
        let clock = SessionClock::default();
        assert_eq!(clock.turn_number(), 0);
        assert_approx_eq!(clock.turns_per_second(), DEFAULT_TURNS_PER_SECOND);

        clock.set_turn_number(41);
        assert_eq!(clock.advance(), 42);
        clock.set_turns_per_second(5.5);
        assert_approx_eq!(clock.turns_per_second(), 5.5);

        clock.reset();
        assert_eq!(clock.turn_number(), 0);
        assert_approx_eq!(clock.turns_per_second(), DEFAULT_TURNS_PER_SECOND);
    }

    #[test]
    fn test_concurrent_advance() {
        let clock = Arc::new(SessionClock::default());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let clock = Arc::clone(&clock);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        clock.advance();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(clock.turn_number(), 4000);
    }
}
