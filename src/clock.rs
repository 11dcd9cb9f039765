//! Wall-clock sources
//!
//! Tolerance windows are measured against timestamps, never frame counts,
//! so the controller reads time through this trait. Live sessions use the
//! system clock; replays and tests drive a [`ReplayClock`] by hand.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};

use crate::error::ProctorError;
use crate::schema::ValidationError;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Real time from the operating system
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually advanced clock, starting at the Unix epoch by default.
///
/// Clones share the same underlying time, so a caller can keep one handle
/// and hand another to the controller. Instants chrono cannot represent are
/// refused and leave the clock where it was.
#[derive(Debug, Clone, Default)]
pub struct ReplayClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ReplayClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    /// Move to `ms` Unix milliseconds
    pub fn set(&self, ms: i64) -> Result<(), ProctorError> {
        let instant = DateTime::from_timestamp_millis(ms)
            .ok_or(ValidationError::TimestampOutOfRange { actual: ms })?;
        *self.lock() = instant;
        Ok(())
    }

    pub fn advance(&self, delta_ms: i64) -> Result<(), ProctorError> {
        let target = self
            .millis()
            .checked_add(delta_ms)
            .ok_or(ValidationError::TimestampOutOfRange { actual: delta_ms })?;
        self.set(target)
    }

    pub fn millis(&self) -> i64 {
        self.lock().timestamp_millis()
    }

    fn lock(&self) -> MutexGuard<'_, DateTime<Utc>> {
        self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Clock for ReplayClock {
    fn now(&self) -> DateTime<Utc> {
        *self.lock()
    }
}
