use crate::error::CameraError;
use crate::geometry::{Point, Rect};
use serde::{Deserialize, Serialize};

/// Digital (crop + scale) zoom, independent of the device
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SoftZoom {
    /// Zoom factor, at least 1
    pub zoom: f64,
    /// Zoom center in the original frame, `-0.5..=0.5` per axis
    pub center: Point,
}

impl Default for SoftZoom {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            center: Point::default(),
        }
    }
}

impl SoftZoom {
    /// Largest center magnitude that keeps a `zoom`x window inside the frame
    pub fn max_center_offset(zoom: f64) -> f64 {
        if zoom <= 1.0 {
            0.0
        } else {
            0.5 * (1.0 - 1.0 / zoom)
        }
    }

    /// Validate and normalize a soft zoom request.
    ///
    /// With `limit`, the factor is raised to 1 and the center is clamped so
    /// the zoomed window stays inside the raster. Without it, a factor below
    /// 1 is rejected and the center is only clamped to the frame.
    pub fn new(zoom: f64, center: Option<Point>, limit: bool) -> Result<Self, CameraError> {
        if !zoom.is_finite() || zoom <= 0.0 {
            return Err(CameraError::invalid(format!("soft zoom {} must be positive", zoom)));
        }
        let center = center.unwrap_or_default();
        if !center.x.is_finite() || !center.y.is_finite() {
            return Err(CameraError::invalid("soft zoom center must be finite"));
        }

        let (zoom, bound) = if limit {
            let zoom = zoom.max(1.0);
            (zoom, Self::max_center_offset(zoom))
        } else {
            if zoom < 1.0 {
                return Err(CameraError::invalid(format!(
                    "soft zoom {} below 1 requires limit",
                    zoom
                )));
            }
            (zoom, 0.5)
        };

        Ok(Self {
            zoom,
            center: Point::new(center.x.clamp(-bound, bound), center.y.clamp(-bound, bound)),
        })
    }

    /// Raster window shown at this zoom
    pub fn window(&self, video_width: f64, video_height: f64) -> Rect {
        let w = video_width / self.zoom;
        let h = video_height / self.zoom;
        let cx = (0.5 + self.center.x) * video_width;
        let cy = (0.5 + self.center.y) * video_height;
        Rect::new(cx - w / 2.0, cy - h / 2.0, w, h)
    }
}
