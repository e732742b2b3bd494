use super::Camera;
use crate::config::DisplayConfig;
use crate::error::CameraError;
use crate::frame::RasterFrame;
use crate::geometry::{DisplaySurface, FitMode, PagePoint, Point, Rect, RegionBox, VideoTransform};
use image::RgbaImage;
use tracing::{debug, trace};

/// How the video is presented
#[derive(Debug, Clone)]
pub(super) struct ViewState {
    pub(super) surface: DisplaySurface,
    pub(super) fit: FitMode,
    pub(super) mirrored: bool,
    pub(super) region: RegionBox,
}

impl ViewState {
    pub(super) fn new(config: &DisplayConfig) -> Self {
        Self {
            surface: DisplaySurface::new(config.width, config.height),
            fit: config.object_fit,
            mirrored: config.mirrored,
            region: RegionBox::default(),
        }
    }
}

impl Camera {
    pub fn set_display_surface(&self, surface: DisplaySurface) -> Result<(), CameraError> {
        let sizes = [surface.width, surface.height];
        if sizes.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(CameraError::invalid(format!(
                "display surface {}x{} must be finite and non-negative",
                surface.width, surface.height
            )));
        }
        if !surface.device_pixel_ratio.is_finite() || surface.device_pixel_ratio <= 0.0 {
            return Err(CameraError::invalid("device pixel ratio must be positive"));
        }
        debug!("Display surface {}x{}", surface.width, surface.height);
        self.inner.state.lock().view.surface = surface;
        Ok(())
    }

    pub fn display_surface(&self) -> DisplaySurface {
        self.inner.state.lock().view.surface.clone()
    }

    pub fn set_object_fit(&self, fit: FitMode) {
        self.inner.state.lock().view.fit = fit;
    }

    pub fn object_fit(&self) -> FitMode {
        self.inner.state.lock().view.fit
    }

    /// Mirror the presented video horizontally
    pub fn set_mirrored(&self, mirrored: bool) -> Result<(), CameraError> {
        if self.is_disposed() {
            return Err(CameraError::superseded("camera disposed"));
        }
        self.inner.state.lock().view.mirrored = mirrored;
        Ok(())
    }

    pub fn is_mirrored(&self) -> bool {
        self.inner.state.lock().view.mirrored
    }

    /// Replace the region box. Takes effect on the next transform; the
    /// device is not touched.
    pub fn set_region_box(&self, region: RegionBox) -> Result<(), CameraError> {
        if self.is_disposed() {
            return Err(CameraError::superseded("camera disposed"));
        }
        region.validate()?;
        debug!(
            "Region box {}x{} ({:?}) at ({}, {})",
            region.width, region.height, region.unit, region.center.x, region.center.y
        );
        self.inner.state.lock().view.region = region;
        Ok(())
    }

    pub fn region_box(&self) -> RegionBox {
        self.inner.state.lock().view.region.clone()
    }

    /// Raster↔display mapping for the current track and view
    pub fn video_transform(&self) -> Result<VideoTransform, CameraError> {
        let (track, surface, fit, mirrored, soft_zoom) = {
            let state = self.inner.state.lock();
            (
                state.track.clone(),
                state.view.surface.clone(),
                state.view.fit,
                state.view.mirrored,
                state.zoom.soft,
            )
        };
        let track = track.ok_or(CameraError::NotOpened)?;
        let settings = track.settings();
        VideoTransform::new(
            (settings.width, settings.height),
            &surface,
            fit,
            mirrored,
            &soft_zoom,
        )
        .ok_or_else(|| CameraError::invalid("display surface or video has no size"))
    }

    /// Raster points to document-absolute positions
    pub fn video_xy_to_absolute(&self, points: &[Point]) -> Result<Vec<PagePoint>, CameraError> {
        let transform = self.video_transform()?;
        let surface = self.display_surface();
        Ok(points
            .iter()
            .map(|p| surface.to_absolute(transform.to_display(*p)))
            .collect())
    }

    /// Raster points to viewport-fixed positions
    pub fn video_xy_to_fixed(&self, points: &[Point]) -> Result<Vec<PagePoint>, CameraError> {
        let transform = self.video_transform()?;
        let surface = self.display_surface();
        Ok(points
            .iter()
            .map(|p| surface.to_fixed(transform.to_display(*p)))
            .collect())
    }

    pub fn absolute_to_video_xy(&self, points: &[PagePoint]) -> Result<Vec<Point>, CameraError> {
        let transform = self.video_transform()?;
        let surface = self.display_surface();
        Ok(points
            .iter()
            .map(|p| transform.to_video(surface.from_absolute(*p)))
            .collect())
    }

    pub fn fixed_to_video_xy(&self, points: &[PagePoint]) -> Result<Vec<Point>, CameraError> {
        let transform = self.video_transform()?;
        let surface = self.display_surface();
        Ok(points
            .iter()
            .map(|p| transform.to_video(surface.from_fixed(*p)))
            .collect())
    }

    /// Raster points to physical pixels of the display box, for drawing
    /// into an overlay sized by [`DisplaySurface::physical_size`]
    pub fn video_xy_to_physical(&self, points: &[Point]) -> Result<Vec<Point>, CameraError> {
        let transform = self.video_transform()?;
        let surface = self.display_surface();
        Ok(points
            .iter()
            .map(|p| surface.to_physical(transform.to_display(*p)))
            .collect())
    }

    pub fn physical_to_video_xy(&self, points: &[Point]) -> Result<Vec<Point>, CameraError> {
        let transform = self.video_transform()?;
        let surface = self.display_surface();
        Ok(points
            .iter()
            .map(|p| transform.to_video(surface.from_physical(*p)))
            .collect())
    }

    /// Overlay size in physical pixels
    pub fn physical_display_size(&self) -> (u32, u32) {
        self.inner.state.lock().view.surface.physical_size()
    }

    /// Raster area currently visible, optionally restricted to the region box
    pub fn visible_area_in_video(
        &self,
        consider_region_box: bool,
        rounded: bool,
    ) -> Result<Rect, CameraError> {
        let transform = self.video_transform()?;
        let region = consider_region_box.then(|| self.region_box());
        Ok(transform.visible_area(region.as_ref(), rounded))
    }

    /// The latest raster frame of the current track
    pub fn current_frame(&self) -> Result<RasterFrame, CameraError> {
        let frame = self.current_track()?.grab_frame()?;
        trace!("Grabbed frame {} ({}x{})", frame.id, frame.width(), frame.height());
        Ok(frame)
    }

    /// RGBA copy of `region` of the current frame, or the whole frame.
    /// The region is rounded and clipped to the raster.
    pub fn get_frame(&self, region: Option<Rect>) -> Result<RgbaImage, CameraError> {
        let frame = self.current_frame()?;
        let rect = region.unwrap_or_else(|| {
            Rect::new(0.0, 0.0, frame.width() as f64, frame.height() as f64)
        });
        frame.crop(rect.clamped_pixels(frame.width(), frame.height()))
    }
}
