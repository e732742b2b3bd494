mod catalog;
mod preset;
mod types;

pub use catalog::DeviceCatalog;
pub use preset::{CameraPreset, DeviceMatcher, MatcherTable};
pub use types::{CapabilityRange, Capabilities, DeviceDescriptor, Facing, FocusMode};
