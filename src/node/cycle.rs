//! Update-cycle bookkeeping and the publish schedule.

use std::time::Duration;

/// Node lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Unconfigured,
    Inactive,
    Active,
    Finalized,
}

/// What the update loop does with the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Layers are deactivated and the loop does nothing.
    Stopped,
    /// Layers are active and every cycle updates the grid.
    Running,
    /// Layers stay active but cycles skip all grid writes.
    Paused,
}

/// Flags shared by the update loop and the start/stop/pause/resume calls.
///
/// Only mutated with the reconfiguration lock held, so `initialized` always
/// means a whole cycle ran since the last `start`/`resume`.
#[derive(Debug, Clone)]
pub(crate) struct CycleState {
    /// Layers are deactivated; the loop skips the cycle body entirely.
    pub stopped: bool,
    /// The loop runs but performs no writes.
    pub stop_updates: bool,
    /// At least one update completed since the last start/resume.
    pub initialized: bool,
    /// Clock seconds of the last publish.
    pub last_publish: f64,
    /// `None` disables publishing.
    pub publish_period: Option<Duration>,
}

impl CycleState {
    pub fn new(publish_period: Option<Duration>) -> Self {
        Self {
            stopped: true,
            stop_updates: false,
            initialized: false,
            last_publish: 0.0,
            publish_period,
        }
    }

    pub fn run_state(&self) -> RunState {
        if self.stopped {
            RunState::Stopped
        } else if self.stop_updates {
            RunState::Paused
        } else {
            RunState::Running
        }
    }
}

/// Whether a publish is due at `now` given the last publish time.
///
/// A clock that moved backwards (e.g. a switch to simulated time) makes the
/// publish due, so a jump cannot stall publishing.
pub fn publish_due(now: f64, last_publish: f64, period: Option<Duration>) -> bool {
    let Some(period) = period else {
        return false;
    };
    now - last_publish >= period.as_secs_f64() || now < last_publish
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_period_never_publishes() {
        assert!(!publish_due(100.0, 0.0, None));
    }

    #[test]
    fn publishes_after_period_elapsed() {
        let period = Some(Duration::from_millis(500));
        assert!(!publish_due(10.4, 10.0, period));
        assert!(publish_due(10.6, 10.0, period));
    }

    #[test]
    fn clock_moving_backwards_is_due() {
        let period = Some(Duration::from_secs(10));
        assert!(publish_due(3.0, 50.0, period));
    }

    #[test]
    fn run_state_follows_flags() {
        let mut state = CycleState::new(None);
        assert_eq!(state.run_state(), RunState::Stopped);
        state.stopped = false;
        assert_eq!(state.run_state(), RunState::Running);
        state.stop_updates = true;
        assert_eq!(state.run_state(), RunState::Paused);
    }
}
