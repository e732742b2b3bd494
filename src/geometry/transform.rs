use super::fit::FitMode;
use super::region::RegionBox;
use crate::frame::PixelRect;
use crate::zoom::SoftZoom;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Position in page coordinates (left/top)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PagePoint {
    pub left: f64,
    pub top: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Intersection, collapsing to a zero-size rect when disjoint
    pub fn intersect(&self, other: &Rect) -> Rect {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = self.right().min(other.right());
        let y1 = self.bottom().min(other.bottom());
        Rect::new(x0, y0, (x1 - x0).max(0.0), (y1 - y0).max(0.0))
    }

    /// Integer-align, rounding `width` against the already rounded `x` so
    /// `x + width` lands on the rounded right edge (same for `y`/`height`).
    pub fn rounded(&self) -> Rect {
        let x = self.x.round();
        let y = self.y.round();
        let width = (self.right().round() - x).max(0.0);
        let height = (self.bottom().round() - y).max(0.0);
        Rect::new(x, y, width, height)
    }

    /// Convert a rounded, non-negative rect to pixels
    pub fn to_pixel_rect(&self) -> PixelRect {
        let r = self.rounded();
        PixelRect::new(
            r.x.max(0.0) as u32,
            r.y.max(0.0) as u32,
            r.width.max(0.0) as u32,
            r.height.max(0.0) as u32,
        )
    }

    /// Round, then keep inside a `width`x`height` raster
    pub fn clamped_pixels(&self, width: u32, height: u32) -> PixelRect {
        let raster = Rect::new(0.0, 0.0, width as f64, height as f64);
        self.rounded().intersect(&raster).to_pixel_rect()
    }
}

/// The on-screen surface presenting the video
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplaySurface {
    /// Box width in CSS pixels
    pub width: f64,
    /// Box height in CSS pixels
    pub height: f64,
    /// Box left edge relative to the viewport
    #[serde(default)]
    pub left: f64,
    /// Box top edge relative to the viewport
    #[serde(default)]
    pub top: f64,
    /// Horizontal scroll offset of the page
    #[serde(default)]
    pub scroll_x: f64,
    /// Vertical scroll offset of the page
    #[serde(default)]
    pub scroll_y: f64,
    #[serde(default = "default_device_pixel_ratio")]
    pub device_pixel_ratio: f64,
}

fn default_device_pixel_ratio() -> f64 {
    1.0
}

impl DisplaySurface {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            left: 0.0,
            top: 0.0,
            scroll_x: 0.0,
            scroll_y: 0.0,
            device_pixel_ratio: 1.0,
        }
    }

    /// Size of the display box's backing store in physical pixels
    pub fn physical_size(&self) -> (u32, u32) {
        (
            (self.width * self.device_pixel_ratio).round().max(0.0) as u32,
            (self.height * self.device_pixel_ratio).round().max(0.0) as u32,
        )
    }

    /// Display-box point → physical pixel of the backing store
    pub fn to_physical(&self, p: Point) -> Point {
        Point::new(p.x * self.device_pixel_ratio, p.y * self.device_pixel_ratio)
    }

    pub fn from_physical(&self, p: Point) -> Point {
        Point::new(p.x / self.device_pixel_ratio, p.y / self.device_pixel_ratio)
    }
}

/// Affine raster→display mapping shared by every point in a call
#[derive(Debug, Clone, PartialEq)]
pub struct VideoTransform {
    scale_x: f64,
    scale_y: f64,
    translate_x: f64,
    translate_y: f64,
    video_width: f64,
    video_height: f64,
    display_width: f64,
    display_height: f64,
    mirrored: bool,
}

impl VideoTransform {
    /// Build the transform for the current view. `None` when the video or
    /// the surface has no size yet.
    pub fn new(
        video_size: (u32, u32),
        surface: &DisplaySurface,
        fit: FitMode,
        mirrored: bool,
        soft_zoom: &SoftZoom,
    ) -> Option<Self> {
        let (vw, vh) = (video_size.0 as f64, video_size.1 as f64);
        let base = fit.layout(vw, vh, surface.width, surface.height)?;

        // Soft zoom scales around the content center, moving the zoom
        // center of the raster onto it.
        let zoom = soft_zoom.zoom;
        let scale_x = base.scale_x * zoom;
        let scale_y = base.scale_y * zoom;
        let content_cx = base.offset_x + vw * base.scale_x / 2.0;
        let content_cy = base.offset_y + vh * base.scale_y / 2.0;
        let zoom_cx = (0.5 + soft_zoom.center.x) * vw;
        let zoom_cy = (0.5 + soft_zoom.center.y) * vh;

        Some(Self {
            scale_x,
            scale_y,
            translate_x: content_cx - zoom_cx * scale_x,
            translate_y: content_cy - zoom_cy * scale_y,
            video_width: vw,
            video_height: vh,
            display_width: surface.width,
            display_height: surface.height,
            mirrored,
        })
    }

    pub fn scale(&self) -> (f64, f64) {
        (self.scale_x, self.scale_y)
    }

    /// Raster point → display-box point
    pub fn to_display(&self, p: Point) -> Point {
        let x = p.x * self.scale_x + self.translate_x;
        let y = p.y * self.scale_y + self.translate_y;
        if self.mirrored {
            Point::new(self.display_width - x, y)
        } else {
            Point::new(x, y)
        }
    }

    /// Display-box point → raster point
    pub fn to_video(&self, p: Point) -> Point {
        let dx = if self.mirrored {
            self.display_width - p.x
        } else {
            p.x
        };
        Point::new(
            (dx - self.translate_x) / self.scale_x,
            (p.y - self.translate_y) / self.scale_y,
        )
    }

    /// Map a display-box rectangle into raster space
    fn display_rect_to_video(&self, rect: &Rect) -> Rect {
        let a = self.to_video(Point::new(rect.x, rect.y));
        let b = self.to_video(Point::new(rect.right(), rect.bottom()));
        let x0 = a.x.min(b.x);
        let y0 = a.y.min(b.y);
        Rect::new(x0, y0, a.x.max(b.x) - x0, a.y.max(b.y) - y0)
    }

    /// Raster subset visible in the display box, optionally restricted to
    /// the region box.
    pub fn visible_area(&self, region: Option<&RegionBox>, rounded: bool) -> Rect {
        let display = Rect::new(0.0, 0.0, self.display_width, self.display_height);
        let window = match region {
            Some(region) => region
                .display_rect(self.display_width, self.display_height)
                .intersect(&display),
            None => display,
        };

        let raster = Rect::new(0.0, 0.0, self.video_width, self.video_height);
        let visible = self.display_rect_to_video(&window).intersect(&raster);

        if rounded {
            let r = visible.rounded();
            // Guard against rounding past the raster edge
            let x = r.x.min(self.video_width);
            let y = r.y.min(self.video_height);
            Rect::new(
                x,
                y,
                r.width.min(self.video_width - x),
                r.height.min(self.video_height - y),
            )
        } else {
            visible
        }
    }
}

impl DisplaySurface {
    /// Display-box point → viewport-fixed position
    pub fn to_fixed(&self, p: Point) -> PagePoint {
        PagePoint {
            left: self.left + p.x,
            top: self.top + p.y,
        }
    }

    /// Display-box point → document-absolute position
    pub fn to_absolute(&self, p: Point) -> PagePoint {
        PagePoint {
            left: self.left + self.scroll_x + p.x,
            top: self.top + self.scroll_y + p.y,
        }
    }

    pub fn from_fixed(&self, p: PagePoint) -> Point {
        Point::new(p.left - self.left, p.top - self.top)
    }

    pub fn from_absolute(&self, p: PagePoint) -> Point {
        Point::new(
            p.left - self.left - self.scroll_x,
            p.top - self.top - self.scroll_y,
        )
    }
}
