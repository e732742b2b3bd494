use crate::device::{DeviceDescriptor, Facing, FocusMode};
use crate::error::CameraError;
use crate::frame::RasterFrame;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// What to ask the platform for when acquiring a track
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TrackConstraints {
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub facing: Option<Facing>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub aspect_ratio: Option<f64>,
    /// Resolution must be met exactly rather than approximated
    #[serde(default)]
    pub exact: bool,
}

impl TrackConstraints {
    pub fn device<S: Into<String>>(id: S) -> Self {
        Self {
            device_id: Some(id.into()),
            ..Self::default()
        }
    }

    pub fn facing(facing: Facing) -> Self {
        Self {
            facing: Some(facing),
            ..Self::default()
        }
    }

    /// Copy the resolution fields of `other` over this one
    pub fn with_resolution_of(mut self, other: &TrackConstraints) -> Self {
        self.width = other.width;
        self.height = other.height;
        self.aspect_ratio = other.aspect_ratio;
        self.exact = other.exact;
        self
    }
}

/// Live settings reported by a track
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TrackSettings {
    pub width: u32,
    pub height: u32,
    pub zoom: Option<f64>,
    pub torch: bool,
    pub focus_mode: Option<FocusMode>,
    pub focus_distance: Option<f64>,
}

/// A single constraint change applied to a live track
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConstraintUpdate {
    Zoom(f64),
    Torch(bool),
    FocusMode(FocusMode),
    /// Switches the track to manual focus at this distance
    FocusDistance(f64),
}

/// Platform capture stack
#[async_trait]
pub trait CaptureBackend: Send + Sync {
    /// List the capture devices currently present
    async fn enumerate(&self) -> Result<Vec<DeviceDescriptor>, CameraError>;

    /// Open a track satisfying the constraints
    async fn acquire(&self, constraints: &TrackConstraints) -> Result<Arc<dyn CaptureTrack>, CameraError>;
}

/// A live video track. Shared between the lifecycle and the focus/torch
/// loops, so every method takes `&self`.
#[async_trait]
pub trait CaptureTrack: Send + Sync {
    fn device(&self) -> &DeviceDescriptor;

    fn settings(&self) -> TrackSettings;

    /// Apply one constraint change
    async fn apply(&self, update: ConstraintUpdate) -> Result<(), CameraError>;

    /// Resolve once a decodable frame is available
    async fn wait_first_frame(&self) -> Result<(), CameraError>;

    /// Pause or resume frame delivery without releasing the device
    fn set_enabled(&self, enabled: bool);

    /// The current raster frame
    fn grab_frame(&self) -> Result<RasterFrame, CameraError>;

    /// Release the device
    async fn stop(&self);
}
