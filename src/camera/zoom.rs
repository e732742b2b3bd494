use super::Camera;
use crate::capture::ConstraintUpdate;
use crate::config::ZoomConfig;
use crate::device::CapabilityRange;
use crate::error::CameraError;
use crate::events::CameraEvent;
use crate::geometry::Point;
use crate::zoom::{wheel_zoom_factor, PinchTracker, SoftZoom, TouchInput, WheelThrottle};
use tokio::time::Instant;
use tracing::{debug, trace};

#[derive(Debug)]
pub(super) struct ZoomState {
    pub(super) soft: SoftZoom,
    /// Last hardware zoom applied; re-applied on reopen
    pub(super) hardware: Option<f64>,
    pinch: PinchTracker,
    wheel: WheelThrottle,
    gesture_enabled: bool,
    wheel_enabled: bool,
    max_zoom_for_wheel: f64,
    wheel_sensitivity: f64,
}

impl ZoomState {
    pub(super) fn new(config: &ZoomConfig) -> Self {
        Self {
            soft: SoftZoom::default(),
            hardware: None,
            pinch: PinchTracker::new(),
            wheel: WheelThrottle::new(config.wheel_min_interval()),
            gesture_enabled: config.gesture_zoom,
            wheel_enabled: config.wheel_zoom,
            max_zoom_for_wheel: config.max_zoom_for_wheel,
            wheel_sensitivity: config.wheel_sensitivity,
        }
    }
}

impl Camera {
    /// Hardware zoom range of the current track
    pub fn zoom_range(&self) -> Option<CapabilityRange> {
        let track = self.inner.state.lock().track.clone()?;
        track.device().capabilities.zoom
    }

    /// Apply hardware zoom, clamped into the device range. Returns the value
    /// actually applied.
    pub async fn set_zoom(&self, zoom: f64) -> Result<f64, CameraError> {
        if !zoom.is_finite() || zoom <= 0.0 {
            return Err(CameraError::invalid(format!("zoom {} must be positive", zoom)));
        }
        let track = self.current_track()?;
        let range = track
            .device()
            .capabilities
            .zoom
            .ok_or_else(|| CameraError::unsupported("zoom"))?;

        let applied = range.clamp(zoom);
        if applied != zoom {
            debug!(
                "Zoom {} outside [{}, {}], clamped to {}",
                zoom, range.min, range.max, applied
            );
        }
        track.apply(ConstraintUpdate::Zoom(applied)).await?;
        self.inner.state.lock().zoom.hardware = Some(applied);
        Ok(applied)
    }

    pub fn hardware_zoom(&self) -> Option<f64> {
        self.inner.state.lock().zoom.hardware
    }

    /// Set the digital zoom. With `limit` the factor is raised to 1 and the
    /// center kept so the window stays inside the frame.
    pub fn set_soft_zoom(
        &self,
        zoom: f64,
        center: Option<Point>,
        limit: bool,
    ) -> Result<SoftZoom, CameraError> {
        let soft = SoftZoom::new(zoom, center, limit)?;
        trace!("Soft zoom {:.3} at ({:.3}, {:.3})", soft.zoom, soft.center.x, soft.center.y);
        self.inner.state.lock().zoom.soft = soft;
        Ok(soft)
    }

    pub fn soft_zoom(&self) -> SoftZoom {
        self.inner.state.lock().zoom.soft
    }

    pub fn set_gesture_zoom(&self, enabled: bool) {
        self.inner.state.lock().zoom.gesture_enabled = enabled;
    }

    pub fn set_wheel_zoom(&self, enabled: bool) {
        self.inner.state.lock().zoom.wheel_enabled = enabled;
    }

    pub fn set_max_zoom_for_wheel(&self, max_zoom: f64) -> Result<(), CameraError> {
        if !max_zoom.is_finite() || max_zoom < 1.0 {
            return Err(CameraError::invalid(format!(
                "max wheel zoom {} must be at least 1",
                max_zoom
            )));
        }
        self.inner.state.lock().zoom.max_zoom_for_wheel = max_zoom;
        Ok(())
    }

    /// Feed a touch event. Returns the new zoom when a pinch changed it.
    pub async fn handle_touch(&self, input: &TouchInput) -> Result<Option<f64>, CameraError> {
        let ratio = {
            let mut state = self.inner.state.lock();
            if !state.zoom.gesture_enabled {
                return Ok(None);
            }
            state.zoom.pinch.handle(input)
        };
        match ratio {
            Some(ratio) => self.zoom_by(ratio, None).await.map(Some),
            None => Ok(None),
        }
    }

    /// Feed a wheel event. Events closer together than the configured
    /// interval are dropped.
    pub async fn handle_wheel(&self, delta_y: f64) -> Result<Option<f64>, CameraError> {
        let (factor, cap) = {
            let mut state = self.inner.state.lock();
            let zoom = &mut state.zoom;
            if !zoom.wheel_enabled || delta_y == 0.0 || !zoom.wheel.accept(Instant::now()) {
                return Ok(None);
            }
            (
                wheel_zoom_factor(delta_y, zoom.wheel_sensitivity),
                zoom.max_zoom_for_wheel,
            )
        };
        self.zoom_by(factor, Some(cap)).await.map(Some)
    }

    /// Scale the current zoom by `ratio`, through the device when it can
    /// zoom and digitally otherwise, then announce the result.
    async fn zoom_by(&self, ratio: f64, cap: Option<f64>) -> Result<f64, CameraError> {
        let zoom = match self.zoom_range() {
            Some(range) => {
                let current = self.hardware_zoom().unwrap_or(range.min);
                self.set_zoom(capped(current, ratio, cap)).await?
            }
            None => {
                let soft = self.soft_zoom();
                let target = capped(soft.zoom, ratio, cap);
                self.set_soft_zoom(target, Some(soft.center), true)?.zoom
            }
        };

        let (soft_zoom, hardware_zoom) = {
            let state = self.inner.state.lock();
            (state.zoom.soft, state.zoom.hardware)
        };
        self.publish(CameraEvent::Zoom {
            soft_zoom,
            hardware_zoom,
        })
        .await;
        Ok(zoom)
    }
}

/// Zooming in never passes `cap`, but never pulls an already larger zoom
/// back down either
fn capped(current: f64, ratio: f64, cap: Option<f64>) -> f64 {
    let target = current * ratio;
    match cap {
        Some(cap) if ratio > 1.0 => target.min(cap.max(current)),
        _ => target,
    }
}

#[cfg(test)]
mod tests {
    use super::capped;

    #[test]
    fn test_wheel_cap() {
        assert_eq!(capped(2.0, 1.5, Some(4.0)), 3.0);
        assert_eq!(capped(3.0, 1.5, Some(4.0)), 4.0);
        assert_eq!(capped(5.0, 1.5, Some(4.0)), 5.0);
        assert_eq!(capped(5.0, 0.5, Some(4.0)), 2.5);
        assert_eq!(capped(3.0, 2.0, None), 6.0);
    }
}
