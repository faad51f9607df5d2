//! Fixed-interval tick scheduler for Tidelink.
//!
//! Sessions are driven by a caller-owned loop that calls `tick(dt)` once
//! per interval. [`TickScheduler`] is that loop's clock: it sleeps until
//! the next deadline, reports the measured frame delta, and decides what
//! happens when a tick fires late.
//!
//! ```ignore
//! let mut scheduler = TickScheduler::new(TickConfig::with_rate(30));
//! loop {
//!     tokio::select! {
//!         info = scheduler.wait_for_tick() => {
//!             session.tick(info.dt);
//!             session.dispatch(&mut processor);
//!         }
//!         _ = &mut shutdown => break,
//!     }
//! }
//! ```

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// What to do when a tick fires later than its deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TickPolicy {
    /// Forget the missed deadlines and schedule the next tick one interval
    /// from now.
    #[default]
    Skip,
    /// Keep the original cadence: the next deadline is one interval after
    /// the missed one, so late ticks fire back to back.
    Drop,
}

/// Configuration for the tick scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TickConfig {
    /// Ticks per second, 1 to [`TickConfig::MAX_TICK_RATE_HZ`].
    pub tick_rate_hz: u32,
    /// Overrun handling policy.
    pub policy: TickPolicy,
    /// Random delay (0 to this many µs) added before the first tick, so
    /// servers started together do not tick in lockstep.
    pub initial_jitter_us: u64,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: 60,
            policy: TickPolicy::default(),
            initial_jitter_us: 2_000,
        }
    }
}

impl TickConfig {
    /// Maximum supported tick rate.
    pub const MAX_TICK_RATE_HZ: u32 = 128;

    /// A config for `tick_rate_hz` with the other fields defaulted.
    pub fn with_rate(tick_rate_hz: u32) -> Self {
        Self {
            tick_rate_hz,
            ..Default::default()
        }
    }

    /// Clamps `tick_rate_hz` into `1..=MAX_TICK_RATE_HZ`.
    pub fn validated(mut self) -> Self {
        let clamped = self.tick_rate_hz.clamp(1, Self::MAX_TICK_RATE_HZ);
        if clamped != self.tick_rate_hz {
            warn!(
                rate = self.tick_rate_hz,
                clamped,
                "tick_rate_hz out of range, clamping"
            );
            self.tick_rate_hz = clamped;
        }
        self
    }

    /// Length of one tick interval.
    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate_hz.max(1) as f64)
    }
}

// ---------------------------------------------------------------------------
// Tick info
// ---------------------------------------------------------------------------

/// Returned by [`TickScheduler::wait_for_tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickInfo {
    /// Tick number, starting at 1.
    pub tick: u64,
    /// Time since the previous tick fired (or since the scheduler was
    /// created or resumed). Feed this to the session's `tick(dt)`.
    pub dt: Duration,
    /// `true` if the tick fired more than 10% of an interval late.
    pub overrun: bool,
    /// Whole intervals skipped because of the overrun (`Skip` policy only).
    pub ticks_skipped: u64,
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Fixed-interval tick scheduler.
pub struct TickScheduler {
    config: TickConfig,
    interval: Duration,
    tick_count: u64,
    next_tick: Instant,
    last_tick: Instant,
    paused: bool,
}

impl TickScheduler {
    pub fn new(config: TickConfig) -> Self {
        let config = config.validated();
        let interval = config.tick_duration();
        let jitter = if config.initial_jitter_us > 0 {
            Duration::from_micros(rand::rng().random_range(0..config.initial_jitter_us))
        } else {
            Duration::ZERO
        };
        let now = Instant::now();

        debug!(
            rate_hz = config.tick_rate_hz,
            interval_ms = interval.as_secs_f64() * 1000.0,
            policy = ?config.policy,
            "tick scheduler created"
        );

        Self {
            config,
            interval,
            tick_count: 0,
            next_tick: now + interval + jitter,
            last_tick: now,
            paused: false,
        }
    }

    /// A scheduler for `tick_rate_hz` with default settings.
    pub fn with_rate(tick_rate_hz: u32) -> Self {
        Self::new(TickConfig::with_rate(tick_rate_hz))
    }

    /// Sleeps until the next tick is due.
    ///
    /// While paused this future never resolves; use it inside
    /// `tokio::select!` alongside a shutdown branch.
    pub async fn wait_for_tick(&mut self) -> TickInfo {
        if self.paused {
            std::future::pending::<()>().await;
        }

        let deadline = self.next_tick;
        time::sleep_until(deadline).await;

        let now = Instant::now();
        let dt = now.saturating_duration_since(self.last_tick);
        self.last_tick = now;
        self.tick_count += 1;

        let late_by = now.saturating_duration_since(deadline);
        let overrun = late_by > self.interval / 10;
        let mut ticks_skipped = 0;

        self.next_tick = match self.config.policy {
            TickPolicy::Skip => {
                if overrun {
                    ticks_skipped = (late_by.as_nanos() / self.interval.as_nanos()) as u64;
                    if ticks_skipped > 0 {
                        warn!(
                            tick = self.tick_count,
                            skipped = ticks_skipped,
                            late_ms = late_by.as_secs_f64() * 1000.0,
                            "tick overrun, skipping ahead"
                        );
                    }
                }
                now + self.interval
            }
            TickPolicy::Drop => {
                if overrun {
                    warn!(
                        tick = self.tick_count,
                        late_ms = late_by.as_secs_f64() * 1000.0,
                        "tick overrun, keeping cadence"
                    );
                }
                deadline + self.interval
            }
        };

        trace!(tick = self.tick_count, dt_us = dt.as_micros() as u64, overrun, "tick fired");

        TickInfo {
            tick: self.tick_count,
            dt,
            overrun,
            ticks_skipped,
        }
    }

    /// Stops ticks until [`resume`](Self::resume). Idempotent.
    pub fn pause(&mut self) {
        if !self.paused {
            self.paused = true;
            debug!(tick = self.tick_count, "tick scheduler paused");
        }
    }

    /// Resumes after a pause. The next tick fires one interval from now
    /// and its `dt` does not include the paused time.
    pub fn resume(&mut self) {
        if self.paused {
            self.paused = false;
            let now = Instant::now();
            self.next_tick = now + self.interval;
            self.last_tick = now;
            debug!(tick = self.tick_count, "tick scheduler resumed");
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Ticks fired so far.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn tick_rate_hz(&self) -> u32 {
        self.config.tick_rate_hz
    }

    /// Length of one tick interval.
    pub fn tick_duration(&self) -> Duration {
        self.interval
    }
}
