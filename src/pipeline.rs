use crate::camera::Camera;
use crate::config::PipelineConfig;
use crate::error::CameraError;
use crate::frame::{FrameBuffer, PixelFormat, PixelRect};
use crate::geometry::Rect;
use image::imageops;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

/// Crop and pixel format of one extraction, in raster coordinates.
/// A missing width or height extends the crop to the raster edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameRequest {
    pub x: f64,
    pub y: f64,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub format: PixelFormat,
}

impl FrameRequest {
    /// The whole raster
    pub fn full(format: PixelFormat) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: None,
            height: None,
            format,
        }
    }

    pub fn region(rect: Rect, format: PixelFormat) -> Self {
        Self {
            x: rect.x,
            y: rect.y,
            width: Some(rect.width),
            height: Some(rect.height),
            format,
        }
    }

    fn validate(&self) -> Result<(), CameraError> {
        let values = [Some(self.x), Some(self.y), self.width, self.height];
        if values.iter().flatten().any(|v| !v.is_finite()) {
            return Err(CameraError::invalid("frame request must be finite"));
        }
        Ok(())
    }

    fn pixels(&self, raster: (u32, u32)) -> PixelRect {
        let (w, h) = raster;
        let rect = Rect::new(
            self.x,
            self.y,
            self.width.unwrap_or(w as f64 - self.x),
            self.height.unwrap_or(h as f64 - self.y),
        );
        rect.clamped_pixels(w, h)
    }
}

/// What a cached extraction was made from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FrameKey {
    raster: (u32, u32),
    rect: PixelRect,
    format: PixelFormat,
}

#[derive(Debug)]
struct PendingFrame {
    key: FrameKey,
    buffer: FrameBuffer,
    original: Option<Arc<Vec<u8>>>,
}

/// Pulls cropped, format-converted buffers out of the live camera and keeps
/// the last one around for repeated requests
#[derive(Debug)]
pub struct FramePipeline {
    camera: Camera,
    max_timeout: Duration,
    save_original_rgba: bool,
    default_format: PixelFormat,
    pending: Option<PendingFrame>,
    extractions: u64,
}

impl FramePipeline {
    pub fn new(camera: Camera, config: &PipelineConfig) -> Self {
        Self {
            camera,
            max_timeout: config.max_timeout(),
            save_original_rgba: config.save_original_rgba,
            default_format: config.format,
            pending: None,
            extractions: 0,
        }
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn set_max_timeout(&mut self, max_timeout: Duration) {
        self.max_timeout = max_timeout;
    }

    pub fn max_timeout(&self) -> Duration {
        self.max_timeout
    }

    /// Keep the RGBA crop alongside converted buffers
    pub fn set_save_original_rgba(&mut self, save: bool) {
        self.save_original_rgba = save;
        if !save {
            if let Some(pending) = self.pending.as_mut() {
                pending.original = None;
            }
        }
    }

    /// Whole raster in the configured format
    pub fn default_request(&self) -> FrameRequest {
        FrameRequest::full(self.default_format)
    }

    /// Number of buffers actually extracted from the camera
    pub fn extractions(&self) -> u64 {
        self.extractions
    }

    /// Extract `request` from the current frame. The previous buffer is
    /// returned again when its parameters match and it is younger than
    /// `max_timeout`, or when capture fails transiently.
    pub fn get_data(&mut self, request: FrameRequest) -> Result<FrameBuffer, CameraError> {
        request.validate()?;
        let raster = self
            .camera
            .current_resolution()
            .ok_or(CameraError::NotOpened)?;
        let key = FrameKey {
            raster,
            rect: request.pixels(raster),
            format: request.format,
        };
        if key.rect.is_empty() {
            return Err(CameraError::invalid(format!(
                "frame request ({}, {}) selects no pixels of {}x{}",
                request.x, request.y, raster.0, raster.1
            )));
        }

        if let Some(pending) = self.cached(&key) {
            if pending.buffer.timestamp.elapsed() < self.max_timeout {
                trace!("Reusing cached {:?} buffer for {:?}", key.format, key.rect);
                return Ok(pending.buffer.clone());
            }
        }

        let frame = match self.camera.current_frame() {
            Ok(frame) => frame,
            Err(e) if e.is_recoverable() => {
                if let Some(pending) = self.cached(&key) {
                    debug!("Capture failed ({}), serving cached buffer", e);
                    return Ok(pending.buffer.clone());
                }
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        let rgba = frame.crop(key.rect)?;
        let (width, height) = rgba.dimensions();
        let save = self.save_original_rgba;
        let (data, original) = match key.format {
            PixelFormat::Rgba => {
                let data = Arc::new(rgba.into_raw());
                let original = save.then(|| Arc::clone(&data));
                (data, original)
            }
            PixelFormat::Gray => {
                let gray = imageops::grayscale(&rgba);
                let original = save.then(|| Arc::new(rgba.into_raw()));
                (Arc::new(gray.into_raw()), original)
            }
        };

        let buffer = FrameBuffer::new(data, width, height, key.format, frame.timestamp);
        self.extractions += 1;
        trace!(
            "Extracted frame {} as {:?} {}x{}",
            frame.id,
            key.format,
            width,
            height
        );
        self.pending = Some(PendingFrame {
            key,
            buffer: buffer.clone(),
            original,
        });
        Ok(buffer)
    }

    /// RGBA crop behind the last extraction, when saving originals
    pub fn original_rgba(&self) -> Option<Arc<Vec<u8>>> {
        self.pending.as_ref()?.original.clone()
    }

    /// Drop the cached buffer
    pub fn clear(&mut self) {
        self.pending = None;
    }

    fn cached(&self, key: &FrameKey) -> Option<&PendingFrame> {
        self.pending.as_ref().filter(|pending| pending.key == *key)
    }
}
