//! External collaborators
//!
//! The engine does not own a camera, a vision model or a browser. It talks to
//! them through these traits so hosts can plug in real devices and tests can
//! plug in synthetic ones.

use crate::error::ProctorError;
use crate::types::LiveStatus;

/// The capture + landmark classification pipeline.
///
/// `start` acquires the camera and loads the model; frames are then pushed
/// into the controller by the host. `stop` releases everything and must be
/// safe to call more than once.
pub trait VisionPipeline {
    /// Acquire the video source
    fn open_camera(&mut self) -> Result<(), ProctorError>;

    /// Load the landmark model and begin producing frame results
    fn load_model(&mut self) -> Result<(), ProctorError>;

    /// Halt frame requests and release the device
    fn stop(&mut self);
}

/// Subscription to host focus/visibility notifications
pub trait FocusMonitor {
    fn subscribe(&mut self) -> Result<(), ProctorError>;
    fn unsubscribe(&mut self);
}

/// Receiver of live status updates
pub trait StatusListener {
    fn on_status(&mut self, status: &LiveStatus);
}

impl<F> StatusListener for F
where
    F: FnMut(&LiveStatus),
{
    fn on_status(&mut self, status: &LiveStatus) {
        self(status)
    }
}

/// Pipeline whose frames are produced and pushed by the host itself.
///
/// Used by the FFI layer and the CLI, where acquisition happens outside the
/// engine and only classification results cross the boundary.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostPipeline {
    running: bool,
}

impl HostPipeline {
    pub fn is_running(&self) -> bool {
        self.running
    }
}

impl VisionPipeline for HostPipeline {
    fn open_camera(&mut self) -> Result<(), ProctorError> {
        Ok(())
    }

    fn load_model(&mut self) -> Result<(), ProctorError> {
        self.running = true;
        Ok(())
    }

    fn stop(&mut self) {
        self.running = false;
    }
}

/// Focus subscription managed entirely by the host
#[derive(Debug, Default, Clone, Copy)]
pub struct HostFocusMonitor {
    subscribed: bool,
}

impl HostFocusMonitor {
    pub fn is_subscribed(&self) -> bool {
        self.subscribed
    }
}

impl FocusMonitor for HostFocusMonitor {
    fn subscribe(&mut self) -> Result<(), ProctorError> {
        self.subscribed = true;
        Ok(())
    }

    fn unsubscribe(&mut self) {
        self.subscribed = false;
    }
}
