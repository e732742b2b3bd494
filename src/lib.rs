pub mod config;
pub mod error;
pub mod events;
pub mod recovery;
pub mod frame;
pub mod geometry;
pub mod device;
pub mod capture;
pub mod zoom;
pub mod focus;
pub mod torch;
pub mod camera;
pub mod pipeline;

pub use config::LivecamConfig;
pub use error::{CameraError, LivecamError, Result};
pub use recovery::{RecoveryAction, RecoveryConfig, RetryPolicy};
pub use events::{CameraEvent, EventBus, EventFilter, EventReceiver};
pub use frame::{FrameBuffer, PixelFormat, PixelRect, RasterFrame};
pub use geometry::{DisplaySurface, FitMode, PagePoint, Point, Rect, RegionBox, RegionUnit, VideoTransform};
pub use device::{CameraPreset, Capabilities, DeviceCatalog, DeviceDescriptor, Facing, FocusMode};
pub use capture::{CaptureBackend, CaptureTrack, SyntheticBackend};
pub use zoom::{SoftZoom, TouchInput, TouchPoint};
pub use focus::{AdvancedFocusParameters, FocusStrategy};
pub use torch::{AutoTorchParameters, TorchMode};
pub use camera::{Camera, CameraRequest, CameraStatus, ResolutionRequest};
pub use pipeline::{FramePipeline, FrameRequest};
