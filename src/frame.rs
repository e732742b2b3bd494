use crate::error::CameraError;
use image::{imageops, GrayImage, RgbaImage};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::time::Instant;

/// Pixel layout of an extracted buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    /// 8-bit RGBA, 4 bytes per pixel
    Rgba,
    /// 8-bit luma, 1 byte per pixel
    Gray,
}

impl PixelFormat {
    /// Get bytes per pixel for the format
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::Rgba => 4,
            PixelFormat::Gray => 1,
        }
    }
}

/// Integer crop rectangle in raster space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Check the rectangle lies inside a `width` x `height` raster
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.x as u64 + self.width as u64 <= width as u64
            && self.y as u64 + self.height as u64 <= height as u64
    }
}

/// A raster frame as delivered by the capture track
#[derive(Debug, Clone)]
pub struct RasterFrame {
    /// Monotonic frame identifier within a track
    pub id: u64,
    /// When the frame was captured
    pub timestamp: Instant,
    /// RGBA pixels (shared ownership, frames are never mutated)
    pub image: Arc<RgbaImage>,
}

impl RasterFrame {
    pub fn new(id: u64, image: RgbaImage) -> Self {
        Self {
            id,
            timestamp: Instant::now(),
            image: Arc::new(image),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Copy out an RGBA crop of this frame
    pub fn crop(&self, rect: PixelRect) -> Result<RgbaImage, CameraError> {
        if rect.is_empty() {
            return Err(CameraError::invalid(format!(
                "empty crop {}x{}",
                rect.width, rect.height
            )));
        }
        if !rect.fits_within(self.width(), self.height()) {
            return Err(CameraError::invalid(format!(
                "crop {:?} exceeds raster {}x{}",
                rect,
                self.width(),
                self.height()
            )));
        }

        Ok(imageops::crop_imm(self.image.as_ref(), rect.x, rect.y, rect.width, rect.height)
            .to_image())
    }

    /// Grayscale crop, used for contrast and darkness sampling
    pub fn gray_crop(&self, rect: PixelRect) -> Result<GrayImage, CameraError> {
        let rgba = self.crop(rect)?;
        Ok(imageops::grayscale(&rgba))
    }

    /// Small grayscale preview whose longest side is at most `max_side`
    pub fn gray_thumbnail(&self, max_side: u32) -> GrayImage {
        let (w, h) = (self.width(), self.height());
        let longest = w.max(h).max(1);
        if longest <= max_side {
            return imageops::grayscale(self.image.as_ref());
        }
        let tw = ((w as u64 * max_side as u64) / longest as u64).max(1) as u32;
        let th = ((h as u64 * max_side as u64) / longest as u64).max(1) as u32;
        let small = imageops::thumbnail(self.image.as_ref(), tw, th);
        imageops::grayscale(&small)
    }
}

/// Buffer handed to frame consumers
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    /// Pixel bytes, shared with the pipeline cache
    pub data: Arc<Vec<u8>>,
    pub width: u32,
    pub height: u32,
    /// Bytes per row
    pub stride: usize,
    pub format: PixelFormat,
    /// Capture time of the source frame
    pub timestamp: Instant,
}

impl FrameBuffer {
    pub fn new(data: Arc<Vec<u8>>, width: u32, height: u32, format: PixelFormat, timestamp: Instant) -> Self {
        Self {
            data,
            width,
            height,
            stride: width as usize * format.bytes_per_pixel(),
            format,
            timestamp,
        }
    }

    /// Validate data size against dimensions
    pub fn validate_size(&self) -> bool {
        self.data.len() == self.stride * self.height as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn gradient(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| Rgba([(x % 256) as u8, (y % 256) as u8, 0, 255]))
    }

    #[test]
    fn test_pixel_format_sizes() {
        assert_eq!(PixelFormat::Rgba.bytes_per_pixel(), 4);
        assert_eq!(PixelFormat::Gray.bytes_per_pixel(), 1);
    }

    #[test]
    fn test_crop_copies_requested_window() {
        let frame = RasterFrame::new(1, gradient(64, 48));
        let crop = frame.crop(PixelRect::new(10, 5, 20, 8)).unwrap();

        assert_eq!(crop.dimensions(), (20, 8));
        assert_eq!(crop.get_pixel(0, 0), &Rgba([10, 5, 0, 255]));
        assert_eq!(crop.get_pixel(19, 7), &Rgba([29, 12, 0, 255]));
    }

    #[test]
    fn test_crop_out_of_bounds_is_rejected() {
        let frame = RasterFrame::new(1, gradient(64, 48));
        assert!(matches!(
            frame.crop(PixelRect::new(50, 0, 20, 8)),
            Err(CameraError::InvalidArgument { .. })
        ));
        assert!(frame.crop(PixelRect::new(0, 0, 0, 8)).is_err());
    }

    #[test]
    fn test_gray_thumbnail_bounds() {
        let frame = RasterFrame::new(1, gradient(640, 480));
        let thumb = frame.gray_thumbnail(64);
        assert_eq!(thumb.dimensions(), (64, 48));

        let small = RasterFrame::new(2, gradient(32, 16));
        assert_eq!(small.gray_thumbnail(64).dimensions(), (32, 16));
    }

    #[test]
    fn test_frame_buffer_stride() {
        let buffer = FrameBuffer::new(
            Arc::new(vec![0; 40 * 10]),
            10,
            10,
            PixelFormat::Rgba,
            Instant::now(),
        );
        assert_eq!(buffer.stride, 40);
        assert!(buffer.validate_size());
    }
}
