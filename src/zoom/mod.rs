mod gesture;
mod soft;

pub use gesture::{wheel_zoom_factor, PinchTracker, TouchInput, TouchPhase, TouchPoint, WheelThrottle};
pub use soft::SoftZoom;
