use thiserror::Error;

#[derive(Error, Debug)]
pub enum LivecamError {
    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Event bus error: {0}")]
    EventBus(#[from] EventBusError),

    #[error("System error: {message}")]
    System { message: String },
}

impl LivecamError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    /// Transient capture hiccups are worth retrying; everything else is not
    pub fn is_recoverable(&self) -> bool {
        match self {
            LivecamError::Camera(e) => e.is_recoverable(),
            LivecamError::Io(_) => true,
            _ => false,
        }
    }

    /// The camera error behind this error, if any
    pub fn camera_error(&self) -> Option<&CameraError> {
        match self {
            LivecamError::Camera(e) => Some(e),
            _ => None,
        }
    }
}

/// Camera device and capability errors.
///
/// `Clone` so a single in-flight open result can be handed to every caller
/// waiting on it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CameraError {
    #[error("No matching capture device: {details}")]
    DeviceUnavailable { details: String },

    #[error("Capture access denied: {details}")]
    PermissionDenied { details: String },

    #[error("Constraints cannot be satisfied: {details}")]
    ConstraintUnsatisfiable { details: String },

    #[error("Capability not supported by the device: {capability}")]
    UnsupportedCapability { capability: String },

    #[error("Frame capture failed: {details}")]
    CaptureTransientFailure { details: String },

    #[error("Invalid argument: {details}")]
    InvalidArgument { details: String },

    #[error("Operation superseded: {details}")]
    Superseded { details: String },

    #[error("Camera is not opened")]
    NotOpened,
}

impl CameraError {
    pub fn unavailable<S: Into<String>>(details: S) -> Self {
        Self::DeviceUnavailable {
            details: details.into(),
        }
    }

    pub fn unsupported<S: Into<String>>(capability: S) -> Self {
        Self::UnsupportedCapability {
            capability: capability.into(),
        }
    }

    pub fn transient<S: Into<String>>(details: S) -> Self {
        Self::CaptureTransientFailure {
            details: details.into(),
        }
    }

    pub fn invalid<S: Into<String>>(details: S) -> Self {
        Self::InvalidArgument {
            details: details.into(),
        }
    }

    pub fn superseded<S: Into<String>>(details: S) -> Self {
        Self::Superseded {
            details: details.into(),
        }
    }

    pub fn is_recoverable(&self) -> bool {
        matches!(self, CameraError::CaptureTransientFailure { .. })
    }

    /// Errors that leave the lifecycle closed when raised by an open
    pub fn is_device_error(&self) -> bool {
        matches!(
            self,
            CameraError::DeviceUnavailable { .. }
                | CameraError::PermissionDenied { .. }
                | CameraError::ConstraintUnsatisfiable { .. }
        )
    }
}

#[derive(Error, Debug, Clone)]
pub enum EventBusError {
    #[error("Failed to publish event: {details}")]
    PublishFailed { details: String },

    #[error("Event channel closed")]
    ChannelClosed,

    #[error("Receiver lagged behind by {skipped} events")]
    Lagged { skipped: u64 },
}

pub type Result<T> = std::result::Result<T, LivecamError>;
