//! Per-question countdown for triviasync.
//!
//! The broker sends a question and the client counts down locally, one tick
//! per second, independent of the network. When the count reaches zero the
//! client fires its own time-up without waiting for the broker's `TIME_UP`.
//!
//! # Idle mode
//!
//! A countdown that has not been started, was stopped or has expired makes
//! [`Countdown::wait_for_tick`] pend forever. That keeps it safe to park
//! inside a `tokio::select!` loop next to the command and transport arms:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(cmd) = cmd_rx.recv() => { /* handle commands */ }
//!         tick = countdown.wait_for_tick() => {
//!             session.apply(LocalIntent::Tick);
//!             if tick.expired { /* send timeup */ }
//!         }
//!     }
//! }
//! ```

use std::time::Duration;

use tokio::time::{self, Instant};
use tracing::{debug, trace};

/// Default tick period.
pub const ONE_SECOND: Duration = Duration::from_secs(1);

// ---------------------------------------------------------------------------
// Tick
// ---------------------------------------------------------------------------

/// One elapsed period, returned by [`Countdown::wait_for_tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    /// Seconds (periods) left after this tick.
    pub remaining: u32,
    /// `true` on the tick that brought `remaining` to zero.
    pub expired: bool,
}

// ---------------------------------------------------------------------------
// Countdown
// ---------------------------------------------------------------------------

/// A restartable countdown that ticks once per period.
#[derive(Debug)]
pub struct Countdown {
    period: Duration,
    remaining: u32,
    /// When the next tick is due. `None` while idle.
    next_tick: Option<Instant>,
}

impl Default for Countdown {
    fn default() -> Self {
        Self::new(ONE_SECOND)
    }
}

impl Countdown {
    /// An idle countdown with the given period. A zero period is raised to
    /// one millisecond.
    pub fn new(period: Duration) -> Self {
        Self {
            period: period.max(Duration::from_millis(1)),
            remaining: 0,
            next_tick: None,
        }
    }

    /// Starts (or restarts) the countdown from `secs`. The first tick fires
    /// one period from now. Starting from zero leaves the countdown idle.
    pub fn start(&mut self, secs: u32) {
        self.remaining = secs;
        self.next_tick = (secs > 0).then(|| Instant::now() + self.period);
        debug!(secs, "countdown started");
    }

    /// Stops the countdown. `wait_for_tick` pends until the next `start`.
    pub fn stop(&mut self) {
        if self.next_tick.take().is_some() {
            debug!(remaining = self.remaining, "countdown stopped");
        }
        self.remaining = 0;
    }

    /// Waits for the next tick.
    ///
    /// Pends forever while idle.
    pub async fn wait_for_tick(&mut self) -> Tick {
        let Some(next) = self.next_tick else {
            return std::future::pending().await;
        };

        time::sleep_until(next).await;

        self.remaining = self.remaining.saturating_sub(1);
        let expired = self.remaining == 0;
        // Schedule from the deadline, not from now, so a slow loop
        // iteration doesn't stretch the question.
        self.next_tick = (!expired).then(|| next + self.period);

        trace!(remaining = self.remaining, expired, "countdown tick");
        if expired {
            debug!("countdown expired");
        }

        Tick {
            remaining: self.remaining,
            expired,
        }
    }

    /// Whether a tick is scheduled.
    pub fn is_running(&self) -> bool {
        self.next_tick.is_some()
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}
