//! Platform capture seam and the deterministic in-process backend.

mod backend;
mod synthetic;

pub use backend::{CaptureBackend, CaptureTrack, ConstraintUpdate, TrackConstraints, TrackSettings};
pub use synthetic::{SyntheticBackend, SyntheticTrack};
