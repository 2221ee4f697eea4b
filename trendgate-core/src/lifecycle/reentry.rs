//! Re-entry gate: decides whether an allowed signal may open a position given
//! how the previous trade closed.
//!
//! A close restricts only the first allowed signal decided after it. Once that
//! signal is admitted or denied, the gate is clear again.

use crate::config::ReentryConfig;
use crate::domain::{Direction, ExitReason};

/// Decision for a signal arriving while no position is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// No prior trade, or the signal reverses the prior trade's direction.
    Fresh,
    /// Same direction as the prior trade, permitted by the trigger set.
    Reentry,
    Denied,
}

#[derive(Debug, Clone)]
pub struct ReentryGate {
    config: ReentryConfig,
    last_closed: Option<(Direction, ExitReason)>,
}

impl ReentryGate {
    pub fn new(config: ReentryConfig) -> Self {
        Self {
            config,
            last_closed: None,
        }
    }

    pub fn record_close(&mut self, direction: Direction, reason: ExitReason) {
        self.last_closed = Some((direction, reason));
    }

    /// Decide an allowed signal arriving with no position open. Consumes the
    /// pending close either way.
    pub fn admit(&mut self, direction: Direction) -> Admission {
        let Some((last_direction, reason)) = self.last_closed.take() else {
            return Admission::Fresh;
        };
        if direction != last_direction {
            return Admission::Fresh;
        }

        let triggered = match reason {
            ExitReason::StopLoss => self.config.after_stop_loss,
            ExitReason::LastTpLevel => self.config.after_take_profit,
        };
        if self.config.enabled && triggered {
            Admission::Reentry
        } else {
            Admission::Denied
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_signal_is_fresh() {
        let mut gate = ReentryGate::new(ReentryConfig::default());
        assert_eq!(gate.admit(Direction::Long), Admission::Fresh);
    }

    #[test]
    fn denial_applies_to_the_next_signal_only() {
        let mut gate = ReentryGate::new(ReentryConfig::default());
        gate.record_close(Direction::Long, ExitReason::StopLoss);
        assert_eq!(gate.admit(Direction::Long), Admission::Denied);
        assert_eq!(gate.admit(Direction::Long), Admission::Fresh);
    }

    #[test]
    fn opposite_direction_is_always_fresh() {
        let mut gate = ReentryGate::new(ReentryConfig::default());
        gate.record_close(Direction::Long, ExitReason::StopLoss);
        assert_eq!(gate.admit(Direction::Short), Admission::Fresh);
    }

    #[test]
    fn same_direction_needs_enabled_and_trigger() {
        let mut gate = ReentryGate::new(ReentryConfig::default());
        gate.record_close(Direction::Long, ExitReason::StopLoss);
        assert_eq!(gate.admit(Direction::Long), Admission::Denied);

        let mut gate = ReentryGate::new(ReentryConfig {
            enabled: true,
            after_stop_loss: false,
            after_take_profit: true,
        });
        gate.record_close(Direction::Long, ExitReason::StopLoss);
        assert_eq!(gate.admit(Direction::Long), Admission::Denied);
        gate.record_close(Direction::Long, ExitReason::LastTpLevel);
        assert_eq!(gate.admit(Direction::Long), Admission::Reentry);
    }
}
