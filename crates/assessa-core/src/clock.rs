//! Countdown clock with a single authoritative remaining-time value.
//!
//! The clock is an owned object driven by whoever awaits
//! [`Clock::next_event`]. Ticks therefore apply strictly one after another,
//! and stopping the clock is a synchronous state change: once `cancel()`
//! returns, no further tick or expiry can be observed.

use std::time::Duration;

use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

use crate::error::SessionError;

/// Default tick cadence.
pub const TICK_PERIOD: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockState {
    Idle,
    Armed,
    Running,
    Expired,
    Cancelled,
}

/// What a single tick produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockEvent {
    /// One second elapsed; carries the new remaining time.
    Ticked(u64),
    /// The countdown reached zero. Raised exactly once.
    Expired,
}

#[derive(Debug)]
pub struct Clock {
    remaining: u64,
    state: ClockState,
    period: Duration,
    interval: Option<Interval>,
}

impl Default for Clock {
    fn default() -> Self {
        Self::new(TICK_PERIOD)
    }
}

impl Clock {
    pub fn new(period: Duration) -> Self {
        Self {
            remaining: 0,
            state: ClockState::Idle,
            period,
            interval: None,
        }
    }

    /// Set the countdown length without starting it.
    pub fn arm(&mut self, total_secs: u64) {
        self.remaining = total_secs;
        self.state = ClockState::Armed;
        self.interval = None;
    }

    /// Begin ticking. The first tick lands one period from now.
    pub fn start(&mut self) -> Result<(), SessionError> {
        if self.state != ClockState::Armed {
            return Err(SessionError::invalid(
                format!("clock is {:?}", self.state),
                "start clock",
            ));
        }
        let mut interval = interval_at(Instant::now() + self.period, self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.interval = Some(interval);
        self.state = ClockState::Running;
        tracing::debug!(remaining = self.remaining, "clock started");
        Ok(())
    }

    /// Stop ticking without raising expiry. Idempotent.
    pub fn cancel(&mut self) {
        self.interval = None;
        if matches!(self.state, ClockState::Armed | ClockState::Running) {
            self.state = ClockState::Cancelled;
            tracing::debug!(remaining = self.remaining, "clock cancelled");
        }
    }

    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    pub fn state(&self) -> ClockState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == ClockState::Running
    }

    /// Apply one tick immediately. Returns `None` unless the clock is running.
    pub fn tick(&mut self) -> Option<ClockEvent> {
        if self.state != ClockState::Running {
            return None;
        }
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            self.state = ClockState::Expired;
            self.interval = None;
            return Some(ClockEvent::Expired);
        }
        Some(ClockEvent::Ticked(self.remaining))
    }

    /// Wait for the next tick and apply it.
    ///
    /// Never resolves while the clock is not running, so it can sit in a
    /// `select!` for the whole session. Cancel safe.
    pub async fn next_event(&mut self) -> ClockEvent {
        loop {
            let Some(interval) = self.interval.as_mut() else {
                return std::future::pending().await;
            };
            interval.tick().await;
            if let Some(event) = self.tick() {
                return event;
            }
        }
    }
}

/// Render seconds as `MM:SS`.
pub fn format_remaining(secs: u64) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn counts_down_to_single_expiry() {
        let mut clock = Clock::default();
        clock.arm(3);
        clock.start().unwrap();

        assert_eq!(clock.next_event().await, ClockEvent::Ticked(2));
        assert_eq!(clock.next_event().await, ClockEvent::Ticked(1));
        assert_eq!(clock.next_event().await, ClockEvent::Expired);
        assert_eq!(clock.remaining(), 0);
        assert_eq!(clock.state(), ClockState::Expired);

        let more = tokio::time::timeout(Duration::from_secs(10), clock.next_event()).await;
        assert!(more.is_err(), "no events after expiry");
    }

    #[tokio::test(start_paused = true)]
    async fn full_duration_takes_one_tick_per_second() {
        let mut clock = Clock::default();
        let total = 2 * 60;
        clock.arm(total);
        clock.start().unwrap();
        let started = Instant::now();

        let mut expiries = 0;
        let mut ticks = 0;
        loop {
            ticks += 1;
            if clock.next_event().await == ClockEvent::Expired {
                expiries += 1;
                break;
            }
        }
        assert_eq!(ticks, total);
        assert_eq!(expiries, 1);
        assert_eq!(started.elapsed(), Duration::from_secs(total));
    }

    #[tokio::test(start_paused = true)]
    async fn armed_clock_does_not_tick() {
        let mut clock = Clock::default();
        clock.arm(5);
        let event = tokio::time::timeout(Duration::from_secs(30), clock.next_event()).await;
        assert!(event.is_err());
        assert_eq!(clock.remaining(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_suppresses_expiry() {
        let mut clock = Clock::default();
        clock.arm(2);
        clock.start().unwrap();
        assert_eq!(clock.next_event().await, ClockEvent::Ticked(1));

        clock.cancel();
        assert_eq!(clock.tick(), None);
        let event = tokio::time::timeout(Duration::from_secs(30), clock.next_event()).await;
        assert!(event.is_err());
        assert_eq!(clock.state(), ClockState::Cancelled);
        assert_eq!(clock.remaining(), 1);
    }

    #[test]
    fn start_requires_arming() {
        let mut clock = Clock::default();
        assert!(clock.start().is_err());
    }

    #[test]
    fn zero_length_expires_on_first_tick() {
        let mut clock = Clock::default();
        clock.arm(0);
        // Building the interval needs a runtime; drive ticks manually instead.
        clock.state = ClockState::Running;
        assert_eq!(clock.tick(), Some(ClockEvent::Expired));
        assert_eq!(clock.tick(), None);
    }

    #[test]
    fn formats_minutes_and_seconds() {
        assert_eq!(format_remaining(0), "00:00");
        assert_eq!(format_remaining(65), "01:05");
        assert_eq!(format_remaining(3600), "60:00");
    }
}
