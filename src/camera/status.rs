use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a camera
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraStatus {
    #[default]
    Closed,
    Opening,
    Opened,
    Paused,
    /// Releasing the track; settles into `Closed`
    Closing,
}

impl CameraStatus {
    /// Holding a track, delivering or not
    pub fn has_track(&self) -> bool {
        matches!(self, CameraStatus::Opened | CameraStatus::Paused)
    }
}

impl fmt::Display for CameraStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CameraStatus::Closed => "closed",
            CameraStatus::Opening => "opening",
            CameraStatus::Opened => "opened",
            CameraStatus::Paused => "paused",
            CameraStatus::Closing => "closing",
        };
        f.write_str(name)
    }
}
