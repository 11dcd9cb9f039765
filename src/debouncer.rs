//! Violation debouncing
//!
//! A category only counts as a violation once it has been observed
//! continuously for longer than its tolerance window. Any interruption
//! (a different category, or a compliant frame) throws away the accumulated
//! dwell time. A violation that keeps going is reported again every
//! tolerance interval, so long episodes produce a proportional number of
//! entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::ProctorConfig;
use crate::types::ViolationCategory;

/// Current debounce window
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebounceState {
    pub active_category: Option<ViolationCategory>,
    pub active_since: Option<DateTime<Utc>>,
}

impl DebounceState {
    pub fn is_idle(&self) -> bool {
        self.active_category.is_none()
    }
}

/// Emitted when a category has been sustained past its tolerance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThresholdCrossing {
    pub category: ViolationCategory,
    /// How long the category was held when the crossing fired
    pub sustained_ms: i64,
    pub tolerance_ms: u64,
}

/// Single-window hysteresis over mutually exclusive categories
#[derive(Debug, Clone)]
pub struct ViolationDebouncer {
    config: ProctorConfig,
    state: DebounceState,
}

impl ViolationDebouncer {
    pub fn new(config: ProctorConfig) -> Self {
        Self {
            config,
            state: DebounceState::default(),
        }
    }

    pub fn state(&self) -> &DebounceState {
        &self.state
    }

    /// Feed one instantaneous classification.
    ///
    /// `None` is the compliant sentinel and clears the window. Categories
    /// without a tolerance are not debounced; observing one only clears
    /// the window, callers log those directly.
    pub fn observe(
        &mut self,
        category: Option<ViolationCategory>,
        now: DateTime<Utc>,
    ) -> Option<ThresholdCrossing> {
        let Some(category) = category else {
            self.reset();
            return None;
        };

        let Some(tolerance_ms) = self.config.tolerance_ms(&category) else {
            self.reset();
            return None;
        };

        match (&self.state.active_category, self.state.active_since) {
            (Some(active), Some(since)) if *active == category => {
                let sustained_ms = (now - since).num_milliseconds();
                if sustained_ms > tolerance_ms as i64 {
                    self.state.active_since = Some(now);
                    Some(ThresholdCrossing {
                        category,
                        sustained_ms,
                        tolerance_ms,
                    })
                } else {
                    None
                }
            }
            _ => {
                self.state = DebounceState {
                    active_category: Some(category),
                    active_since: Some(now),
                };
                None
            }
        }
    }

    /// Abandon the current window without starting a new one
    pub fn interrupt(&mut self) {
        self.reset();
    }

    fn reset(&mut self) {
        self.state = DebounceState::default();
    }
}
