//! Replay pipeline
//!
//! Drives a controller from a recorded proctor.input_event.v1 stream instead
//! of a live camera. Event timestamps become the controller's clock, so the
//! same stream always yields the same report.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::clock::ReplayClock;
use crate::config::ProctorConfig;
use crate::controller::SessionController;
use crate::error::ProctorError;
use crate::schema::{InputEvent, InputEventAdapter, ValidationError, MAX_TIMESTAMP_MS};
use crate::sources::{HostFocusMonitor, HostPipeline, StatusListener};
use crate::types::LiveStatus;

/// Replay a batch of events and return the report text.
///
/// # Example
/// ```ignore
/// let events = InputEventAdapter::parse_ndjson(&recording)?;
/// let report = replay_to_report(&events, "STU-001", &ProctorConfig::default())?;
/// ```
pub fn replay_to_report(
    events: &[InputEvent],
    student_id: &str,
    config: &ProctorConfig,
) -> Result<String, ProctorError> {
    let mut session = ReplaySession::start(student_id, config.clone())?;
    for event in events {
        session.push(event)?;
    }
    session.finish(None)
}

/// Parse an NDJSON recording and replay it
pub fn replay_ndjson(
    ndjson: &str,
    student_id: &str,
    config: &ProctorConfig,
) -> Result<String, ProctorError> {
    let events = InputEventAdapter::parse_ndjson(ndjson)?;
    replay_to_report(&events, student_id, config)
}

/// Incremental replay, one event at a time.
///
/// Use this for streaming input where the full recording is not available
/// up front.
pub struct ReplaySession {
    controller: SessionController,
    clock: ReplayClock,
    origin_ms: i64,
    last_timestamp_ms: Option<i64>,
}

impl ReplaySession {
    /// Start a session whose clock origin is the Unix epoch
    pub fn start(student_id: &str, config: ProctorConfig) -> Result<Self, ProctorError> {
        Self::start_at(student_id, config, DateTime::<Utc>::default())
    }

    /// Start a session; event timestamps are offsets from `origin`
    pub fn start_at(
        student_id: &str,
        config: ProctorConfig,
        origin: DateTime<Utc>,
    ) -> Result<Self, ProctorError> {
        let origin_ms = origin.timestamp_millis();
        let clock = ReplayClock::new(origin);

        let mut controller = SessionController::new(student_id, config)?
            .with_clock(Arc::new(clock.clone()))
            .with_focus_monitor(Box::new(HostFocusMonitor::default()));
        controller.start(Box::new(HostPipeline::default()))?;

        Ok(Self {
            controller,
            clock,
            origin_ms,
            last_timestamp_ms: None,
        })
    }

    pub fn subscribe(&mut self, listener: impl StatusListener + 'static) {
        self.controller.subscribe(listener);
    }

    pub fn controller(&self) -> &SessionController {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut SessionController {
        &mut self.controller
    }

    /// Timestamp of the last accepted event
    pub fn last_timestamp_ms(&self) -> Option<i64> {
        self.last_timestamp_ms
    }

    /// Feed one event. Returns the live status for frame records.
    pub fn push(&mut self, event: &InputEvent) -> Result<Option<LiveStatus>, ProctorError> {
        event.validate(&self.controller.config().landmarks)?;
        if let Some(previous) = self.last_timestamp_ms {
            if event.timestamp_ms < previous {
                return Err(ValidationError::TimestampRegression {
                    previous,
                    actual: event.timestamp_ms,
                }
                .into());
            }
        }

        self.advance_to(event.timestamp_ms)?;
        self.last_timestamp_ms = Some(event.timestamp_ms);

        if let Some(frame) = event.frame_result() {
            return Ok(self.controller.on_frame(&frame));
        }
        if let Some(focus) = event.focus_event() {
            self.controller.on_focus_event(focus);
        }
        Ok(None)
    }

    /// Stop the session and render the report.
    ///
    /// The stop instant is `end_ms` when given (never earlier than the last
    /// event), otherwise the last event's timestamp.
    pub fn finish(&mut self, end_ms: Option<i64>) -> Result<String, ProctorError> {
        let last = self.last_timestamp_ms.unwrap_or(0);
        let end = end_ms.map_or(last, |e| e.max(last));
        if end > MAX_TIMESTAMP_MS {
            return Err(ValidationError::TimestampOutOfRange { actual: end }.into());
        }
        self.advance_to(end)?;
        self.controller.stop();
        self.controller.generate_report()
    }

    /// Move the clock to `offset_ms` past the origin, leaving it untouched on
    /// overflow.
    fn advance_to(&self, offset_ms: i64) -> Result<(), ProctorError> {
        let instant = self
            .origin_ms
            .checked_add(offset_ms)
            .ok_or(ValidationError::TimestampOutOfRange { actual: offset_ms })?;
        self.clock.set(instant)
    }

    /// JSON summary; only after [`finish`](Self::finish)
    pub fn summary_json(&self) -> Result<String, ProctorError> {
        self.controller.summary_json()
    }
}
