//! Auto-update scheduling state.
//!
//! Time is counted in ticks. The global countdown and every feed with a
//! specific interval are decremented once per tick; a feed is due when its
//! countdown reaches zero, or, for feeds on the default policy, when the
//! global countdown does.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::{interval, Interval, MissedTickBehavior};

use super::item::AutoUpdate;
use crate::config::Config;

/// Global auto-update countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlobalAutoUpdate {
    pub enabled: bool,
    pub initial_interval: i64,
    pub remaining_interval: i64,
}

impl GlobalAutoUpdate {
    pub fn from_config(config: &Config) -> Self {
        let initial = config.auto_update_interval.max(1);
        Self {
            enabled: config.auto_update_enabled,
            initial_interval: initial,
            remaining_interval: initial,
        }
    }

    /// Advance one tick. Returns whether default-policy feeds are due.
    ///
    /// The countdown only moves while enabled and wraps back to the initial
    /// value once it drops below zero.
    pub fn advance(&mut self) -> bool {
        if self.enabled {
            self.remaining_interval -= 1;
            if self.remaining_interval < 0 {
                self.remaining_interval = self.initial_interval;
            }
        }
        self.enabled && self.remaining_interval == 0
    }
}

/// Decide whether a feed is due this tick, updating its own countdown.
pub(crate) fn feed_is_due(policy: &mut AutoUpdate, global_due: bool) -> bool {
    match policy {
        AutoUpdate::DontAutoUpdate => false,
        AutoUpdate::DefaultAutoUpdate => global_due,
        AutoUpdate::SpecificAutoUpdate {
            initial_interval,
            remaining_interval,
        } => {
            *remaining_interval -= 1;
            if *remaining_interval <= 0 {
                *remaining_interval = *initial_interval;
                true
            } else {
                false
            }
        }
    }
}

/// Mutual exclusion between structural tree changes and feed updates.
///
/// Acquisition never blocks: a busy lock makes the caller skip its work.
#[derive(Debug, Clone, Default)]
pub struct FeedUpdateLock(Arc<Mutex<()>>);

impl FeedUpdateLock {
    pub fn try_acquire(&self) -> Option<OwnedMutexGuard<()>> {
        Arc::clone(&self.0).try_lock_owned().ok()
    }

    pub fn is_locked(&self) -> bool {
        self.0.try_lock().is_err()
    }
}

/// Tick source for the auto-update loop. Missed ticks are not made up.
pub fn ticker(period: Duration) -> Interval {
    let mut ticker = interval(period.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}
