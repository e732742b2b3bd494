use super::transform::{Point, Rect};
use crate::error::CameraError;
use serde::{Deserialize, Serialize};

/// Reference dimension for region box width/height fractions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RegionUnit {
    /// Fractions of the displayed box width and height
    #[default]
    ViewSize,
    /// Fractions of min(displayed width, displayed height)
    ViewMin,
}

/// Normalized crop/overlay window over the display box.
///
/// `width`/`height` are `0..=1`, `center` is `-0.5..=0.5` on each axis and is
/// always relative to the display box, whatever the unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionBox {
    #[serde(default = "full")]
    pub width: f64,
    #[serde(default = "full")]
    pub height: f64,
    #[serde(default)]
    pub unit: RegionUnit,
    #[serde(default)]
    pub center: Point,
    /// Mask styling passed through to the UI layer
    #[serde(default)]
    pub mask_style: Option<String>,
    /// Border styling passed through to the UI layer
    #[serde(default)]
    pub border_style: Option<String>,
    /// Custom inner content passed through to the UI layer
    #[serde(default)]
    pub inner_ui: Option<String>,
}

fn full() -> f64 {
    1.0
}

impl Default for RegionBox {
    fn default() -> Self {
        Self {
            width: 1.0,
            height: 1.0,
            unit: RegionUnit::ViewSize,
            center: Point::default(),
            mask_style: None,
            border_style: None,
            inner_ui: None,
        }
    }
}

impl RegionBox {
    pub fn new(width: f64, height: f64, unit: RegionUnit) -> Self {
        Self {
            width,
            height,
            unit,
            ..Self::default()
        }
    }

    pub fn with_center(mut self, x: f64, y: f64) -> Self {
        self.center = Point::new(x, y);
        self
    }

    pub fn validate(&self) -> Result<(), CameraError> {
        let finite = [self.width, self.height, self.center.x, self.center.y]
            .iter()
            .all(|v| v.is_finite());
        if !finite {
            return Err(CameraError::invalid("region box values must be finite"));
        }
        if !(0.0..=1.0).contains(&self.width) || !(0.0..=1.0).contains(&self.height) {
            return Err(CameraError::invalid(format!(
                "region box size {}x{} outside 0..=1",
                self.width, self.height
            )));
        }
        if self.center.x.abs() > 0.5 || self.center.y.abs() > 0.5 {
            return Err(CameraError::invalid(format!(
                "region box center ({}, {}) outside -0.5..=0.5",
                self.center.x, self.center.y
            )));
        }
        Ok(())
    }

    /// Whether the box covers the whole display
    pub fn is_full_frame(&self) -> bool {
        self.unit == RegionUnit::ViewSize
            && self.width >= 1.0
            && self.height >= 1.0
            && self.center == Point::default()
    }

    /// Region rectangle in display-box coordinates
    pub fn display_rect(&self, display_width: f64, display_height: f64) -> Rect {
        let (w, h) = match self.unit {
            RegionUnit::ViewSize => (self.width * display_width, self.height * display_height),
            RegionUnit::ViewMin => {
                let m = display_width.min(display_height);
                (self.width * m, self.height * m)
            }
        };
        let cx = (0.5 + self.center.x) * display_width;
        let cy = (0.5 + self.center.y) * display_height;

        Rect::new(cx - w / 2.0, cy - h / 2.0, w, h)
    }
}
