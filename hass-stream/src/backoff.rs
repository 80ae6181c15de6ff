//! Exponential reconnect backoff
//!
//! The first attempt after start is immediate. Every following wait doubles
//! the previous one, clamped to `[floor, ceiling]`. A successful connection
//! resets the timer so the next outage starts again at the floor.
//!
//! The timer only computes intervals. The supervisor owns it and hands each
//! interval to the handshake attempt, which sleeps before connecting so the
//! wait is cancelled together with the attempt.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct BackoffTimer {
    floor: Duration,
    ceiling: Duration,
    next: Duration,
}

impl BackoffTimer {
    /// A ceiling below the floor is raised to the floor.
    pub fn new(floor: Duration, ceiling: Duration) -> Self {
        Self {
            floor,
            ceiling: ceiling.max(floor),
            next: Duration::ZERO,
        }
    }

    /// The wait the next attempt will use
    pub fn current(&self) -> Duration {
        self.next
    }

    pub fn floor(&self) -> Duration {
        self.floor
    }

    pub fn ceiling(&self) -> Duration {
        self.ceiling
    }

    /// Take the wait for the upcoming attempt and advance the timer.
    pub fn next_interval(&mut self) -> Duration {
        let wait = self.next;
        self.next = wait.saturating_mul(2).clamp(self.floor, self.ceiling);
        wait
    }

    /// Call after a successful connection.
    pub fn reset(&mut self) {
        self.next = self.floor;
    }
}
