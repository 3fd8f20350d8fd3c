use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::error::DashboardError;

pub const DEFAULT_MAX_REQUESTS: u32 = 30;
pub const DEFAULT_WINDOW: Duration = Duration::from_millis(60_000);

/// Sliding-window admission control for outbound upstream calls.
///
/// Only admitted calls are recorded; a denied attempt leaves the window
/// untouched.
#[derive(Debug)]
pub struct RequestThrottle {
    window: Duration,
    max_requests: u32,
    timestamps: VecDeque<Instant>,
}

impl RequestThrottle {
    pub fn new(max_requests: u32, window: Duration) -> Result<Self, DashboardError> {
        if max_requests == 0 {
            return Err(DashboardError::Config(
                "max_requests must be positive".into(),
            ));
        }
        if window.is_zero() {
            return Err(DashboardError::Config("window must be positive".into()));
        }

        Ok(Self {
            window,
            max_requests,
            timestamps: VecDeque::with_capacity(max_requests as usize + 1),
        })
    }

    pub fn try_admit(&mut self, now: Instant) -> bool {
        // Drop entries that have left the window
        while self
            .timestamps
            .front()
            .map_or(false, |&t| now.saturating_duration_since(t) >= self.window)
        {
            self.timestamps.pop_front();
        }

        if self.timestamps.len() >= self.max_requests as usize {
            return false;
        }

        // Keep the window sorted even if a caller hands in an older instant
        let at = self.timestamps.partition_point(|&t| t <= now);
        self.timestamps.insert(at, now);
        true
    }

    /// Time until the oldest recorded call leaves the window.
    ///
    /// Does not prune, so it can overstate the wait when several entries
    /// would expire together.
    pub fn time_until_next_slot(&self, now: Instant) -> Duration {
        match self.timestamps.front() {
            Some(&oldest) => self
                .window
                .saturating_sub(now.saturating_duration_since(oldest)),
            None => Duration::ZERO,
        }
    }

    pub fn remaining(&self, now: Instant) -> u32 {
        let live = self
            .timestamps
            .iter()
            .filter(|&&t| now.saturating_duration_since(t) < self.window)
            .count() as u32;
        self.max_requests.saturating_sub(live)
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}

/// Rounds a wait up to whole seconds for user-facing messages.
pub fn wait_seconds(wait: Duration) -> u64 {
    wait.as_secs() + u64::from(wait.subsec_nanos() > 0)
}
