//! Session controller
//!
//! Orchestrates one monitored session: acquires the vision pipeline and the
//! focus subscription, turns every frame result and focus notification into
//! debounced log entries, pushes live status to the subscriber, and produces
//! the report once the session stops.
//!
//! Lifecycle: `Idle -> Running -> Stopped`. All mutation goes through
//! `&mut self`, so the frame stream and the focus stream are serialized by
//! construction. The controller is not `Send`; hosts that deliver callbacks
//! from several threads marshal them onto the owning thread.

use std::sync::Arc;

use crate::classifier::DirectionClassifier;
use crate::clock::{Clock, SystemClock};
use crate::config::ProctorConfig;
use crate::debouncer::DebounceState;
use crate::error::ProctorError;
use crate::report::{render_text, report_filename, ReportEncoder};
use crate::session::Session;
use crate::sink::{ReportSink, SaveReceipt};
use crate::sources::{FocusMonitor, StatusListener, VisionPipeline};
use crate::types::{
    FocusEvent, FrameResult, GazeDirection, LiveStatus, LogEntry, SessionState,
    ViolationCategory,
};

pub const STATUS_INITIALIZING_CAMERA: &str = "Initializing Camera...";
pub const STATUS_LOADING_MODELS: &str = "Loading AI Models...";
pub const STATUS_STARTED: &str = "Monitoring Started";
pub const STATUS_START_FAILED: &str = "Error: System failed to start";
pub const STATUS_ACTIVE: &str = "Active Monitoring";
pub const STATUS_SUSPICIOUS: &str = "Suspicious Activity";
pub const STATUS_USER_MISSING: &str = "User Missing";
pub const STATUS_MULTIPLE_PEOPLE: &str = "Multiple People";
pub const STATUS_ENDED: &str = "Session Ended";

pub struct SessionController {
    config: ProctorConfig,
    student_id: String,
    classifier: DirectionClassifier,
    clock: Arc<dyn Clock>,
    state: SessionState,
    session: Option<Session>,
    pipeline: Option<Box<dyn VisionPipeline>>,
    focus: Option<Box<dyn FocusMonitor>>,
    focus_subscribed: bool,
    listener: Option<Box<dyn StatusListener>>,
}

impl SessionController {
    /// Create an idle controller for `student_id`
    pub fn new(student_id: impl Into<String>, config: ProctorConfig) -> Result<Self, ProctorError> {
        config.validate()?;
        Ok(Self {
            classifier: DirectionClassifier::from_config(&config),
            config,
            student_id: student_id.into(),
            clock: Arc::new(SystemClock),
            state: SessionState::Idle,
            session: None,
            pipeline: None,
            focus: None,
            focus_subscribed: false,
            listener: None,
        })
    }

    /// Use a different time source (replays, tests)
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Focus/visibility source subscribed for the lifetime of the session
    pub fn with_focus_monitor(mut self, focus: Box<dyn FocusMonitor>) -> Self {
        self.focus = Some(focus);
        self
    }

    /// Register the live status listener, replacing any previous one
    pub fn subscribe(&mut self, listener: impl StatusListener + 'static) {
        self.listener = Some(Box::new(listener));
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &ProctorConfig {
        &self.config
    }

    pub fn student_id(&self) -> &str {
        &self.student_id
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.session_id())
    }

    /// Entries logged so far (empty before start and after hand-off)
    pub fn entries(&self) -> &[LogEntry] {
        self.session.as_ref().map(|s| s.entries()).unwrap_or(&[])
    }

    pub fn debounce_state(&self) -> Option<&DebounceState> {
        self.session.as_ref().map(|s| s.debounce_state())
    }

    /// Acquire the pipeline and focus subscription and begin monitoring.
    ///
    /// On any acquisition failure everything already acquired is released,
    /// the controller stays idle and no log is created.
    pub fn start(&mut self, mut pipeline: Box<dyn VisionPipeline>) -> Result<(), ProctorError> {
        match self.state {
            SessionState::Idle => {}
            SessionState::Running => {
                return Err(ProctorError::InvalidState(
                    "session is already running".to_string(),
                ))
            }
            SessionState::Stopped => {
                return Err(ProctorError::InvalidState(
                    "session has already stopped".to_string(),
                ))
            }
        }

        self.emit(&LiveStatus::message(STATUS_INITIALIZING_CAMERA));
        if let Err(e) = pipeline.open_camera() {
            pipeline.stop();
            return Err(self.fail_start(e));
        }

        self.emit(&LiveStatus::message(STATUS_LOADING_MODELS));
        if let Err(e) = pipeline.load_model() {
            pipeline.stop();
            return Err(self.fail_start(e));
        }

        if let Some(focus) = self.focus.as_mut() {
            if let Err(e) = focus.subscribe() {
                pipeline.stop();
                return Err(self.fail_start(e));
            }
            self.focus_subscribed = true;
        }

        let session = Session::new(&self.student_id, &self.config, self.clock.now());
        tracing::info!(
            session_id = session.session_id(),
            student_id = %self.student_id,
            "monitoring session started"
        );

        self.session = Some(session);
        self.pipeline = Some(pipeline);
        self.state = SessionState::Running;
        self.emit(&LiveStatus::message(STATUS_STARTED));
        Ok(())
    }

    /// Process one classification result from the vision pipeline.
    ///
    /// Returns the live status that was pushed, or `None` when the frame
    /// arrived outside a running session and was dropped.
    pub fn on_frame(&mut self, frame: &FrameResult) -> Option<LiveStatus> {
        if self.state != SessionState::Running {
            tracing::debug!(state = ?self.state, "ignoring frame outside running session");
            return None;
        }

        let now = self.clock.now();
        let echo = self.config.echo_landmarks;
        let max_faces = self.config.max_faces;
        let classifier = self.classifier;
        let session = self.session.as_mut()?;

        let status = match frame.face_count() {
            0 => {
                if let Some(crossing) = session.observe(Some(ViolationCategory::PersonMissing), now) {
                    tracing::info!(sustained_ms = crossing.sustained_ms, "subject missing");
                }
                LiveStatus {
                    direction: GazeDirection::Center,
                    status: STATUS_USER_MISSING.to_string(),
                    warning: Some("No face detected! Please stay in front of the camera.".to_string()),
                    landmarks: None,
                }
            }
            1 => {
                let face = &frame.faces[0];
                let direction = classifier.classify(face);
                if let Some(crossing) = session.observe(direction.violation(), now) {
                    tracing::info!(
                        category = %crossing.category,
                        sustained_ms = crossing.sustained_ms,
                        "gaze violation"
                    );
                }

                let (status, warning) = match direction {
                    GazeDirection::Center => (STATUS_ACTIVE, None),
                    other => (
                        STATUS_SUSPICIOUS,
                        Some(format!("Looking {other}! Please keep your eyes on the screen.")),
                    ),
                };
                LiveStatus {
                    direction,
                    status: status.to_string(),
                    warning,
                    landmarks: echo.then(|| face.clone()),
                }
            }
            count => {
                let count = count.min(max_faces);
                session.interrupt_window();
                session.record(
                    ViolationCategory::MultipleFaces,
                    format!("Multiple faces detected ({count})"),
                    now,
                );
                tracing::info!(faces = count, "multiple faces");
                LiveStatus {
                    direction: GazeDirection::Center,
                    status: STATUS_MULTIPLE_PEOPLE.to_string(),
                    warning: Some("Multiple people detected in frame!".to_string()),
                    landmarks: if echo { frame.faces.first().cloned() } else { None },
                }
            }
        };

        self.emit(&status);
        Some(status)
    }

    /// Record a focus/visibility loss. Leaves the gaze window untouched.
    ///
    /// Returns `false` when the notification arrived outside a running session.
    pub fn on_focus_event(&mut self, event: FocusEvent) -> bool {
        if self.state != SessionState::Running {
            tracing::debug!(?event, state = ?self.state, "ignoring focus event");
            return false;
        }

        let now = self.clock.now();
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        tracing::info!(?event, "focus lost");
        session
            .record(ViolationCategory::TabSwitch, event.message(), now)
            .is_some()
    }

    /// Log a host-detected zero-tolerance event.
    ///
    /// Categories with a tolerance window must go through
    /// [`observe_signal`](Self::observe_signal) instead.
    pub fn record_violation(
        &mut self,
        category: ViolationCategory,
        message: impl Into<String>,
    ) -> Result<bool, ProctorError> {
        check_custom_name(&category)?;
        if self.config.tolerance_ms(&category).is_some() {
            return Err(ProctorError::InvalidState(format!(
                "{category} is debounced; use observe_signal"
            )));
        }
        if self.state != SessionState::Running {
            return Ok(false);
        }

        let now = self.clock.now();
        Ok(self
            .session
            .as_mut()
            .and_then(|s| s.record(category, message, now))
            .is_some())
    }

    /// Feed a host-side classification through the debouncer.
    ///
    /// Shares the single active window with frame classifications; `None`
    /// is the compliant sentinel. Returns whether an entry was logged.
    ///
    /// Zero-tolerance categories must go through
    /// [`record_violation`](Self::record_violation); they are rejected here
    /// without touching the running window.
    pub fn observe_signal(
        &mut self,
        category: Option<ViolationCategory>,
    ) -> Result<bool, ProctorError> {
        if let Some(category) = &category {
            check_custom_name(category)?;
            if self.config.tolerance_ms(category).is_none() {
                return Err(ProctorError::InvalidState(format!(
                    "{category} is zero-tolerance; use record_violation"
                )));
            }
        }
        if self.state != SessionState::Running {
            return Ok(false);
        }

        let now = self.clock.now();
        Ok(self
            .session
            .as_mut()
            .and_then(|s| s.observe(category, now))
            .is_some())
    }

    /// Stop monitoring and freeze the log. Calling it again is a no-op.
    pub fn stop(&mut self) {
        if self.state != SessionState::Running {
            return;
        }

        self.release_collaborators();

        let now = self.clock.now();
        if let Some(session) = self.session.as_mut() {
            session.finish(now);
            tracing::info!(
                session_id = session.session_id(),
                events = session.entries().len(),
                "monitoring session stopped"
            );
        }

        self.state = SessionState::Stopped;
        self.emit(&LiveStatus::message(STATUS_ENDED));
    }

    /// Canonical report text; only available once stopped
    pub fn generate_report(&self) -> Result<String, ProctorError> {
        render_text(self.stopped_session()?)
    }

    /// JSON summary of the stopped session
    pub fn summary_json(&self) -> Result<String, ProctorError> {
        ReportEncoder::new().encode_to_json(self.stopped_session()?)
    }

    /// Hand the report to `sink`.
    ///
    /// On success the session is discarded. On failure it stays frozen in
    /// memory so the hand-off can be retried.
    pub fn save_report(&mut self, sink: &dyn ReportSink) -> Result<SaveReceipt, ProctorError> {
        let session = self.stopped_session()?;
        let text = render_text(session)?;
        let generated_at = session.stopped_at().unwrap_or_else(|| session.start_time());
        let filename = report_filename(session.student_id(), generated_at);

        match sink.save(&filename, &text) {
            Ok(receipt) => {
                tracing::info!(location = %receipt.location, "report handed off");
                self.session = None;
                Ok(receipt)
            }
            Err(e) => {
                tracing::warn!(error = %e, "report hand-off failed; keeping session for retry");
                Err(match e {
                    ProctorError::PersistenceFailed(_) => e,
                    other => ProctorError::PersistenceFailed(other.to_string()),
                })
            }
        }
    }

    /// Drop a stopped session without persisting it
    pub fn discard(&mut self) -> bool {
        if self.state != SessionState::Stopped {
            return false;
        }
        self.session.take().is_some()
    }

    fn stopped_session(&self) -> Result<&Session, ProctorError> {
        if self.state != SessionState::Stopped {
            return Err(ProctorError::InvalidState(format!(
                "report requires a stopped session, current state is {:?}",
                self.state
            )));
        }
        self.session.as_ref().ok_or_else(|| {
            ProctorError::InvalidState("session report was already handed off or discarded".to_string())
        })
    }

    fn fail_start(&mut self, error: ProctorError) -> ProctorError {
        tracing::error!(error = %error, "monitoring failed to start");
        self.emit(&LiveStatus {
            warning: Some(error.to_string()),
            ..LiveStatus::message(STATUS_START_FAILED)
        });
        match error {
            ProctorError::AcquisitionFailed(_) => error,
            other => ProctorError::AcquisitionFailed(other.to_string()),
        }
    }

    fn release_collaborators(&mut self) {
        if self.focus_subscribed {
            if let Some(focus) = self.focus.as_mut() {
                focus.unsubscribe();
            }
            self.focus_subscribed = false;
        }
        if let Some(mut pipeline) = self.pipeline.take() {
            pipeline.stop();
        }
    }

    fn emit(&mut self, status: &LiveStatus) {
        if let Some(listener) = self.listener.as_mut() {
            listener.on_status(status);
        }
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        if self.state == SessionState::Running {
            tracing::warn!("controller dropped while running; releasing collaborators");
            self.release_collaborators();
        }
    }
}

fn check_custom_name(category: &ViolationCategory) -> Result<(), ProctorError> {
    if category.is_ambiguous_custom() {
        return Err(ProctorError::InvalidCategory(format!(
            "custom category {:?} is blank or names a built-in category",
            category.label()
        )));
    }
    Ok(())
}
