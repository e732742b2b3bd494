use super::backend::{CaptureBackend, CaptureTrack, ConstraintUpdate, TrackConstraints, TrackSettings};
use crate::device::{CapabilityRange, Capabilities, DeviceDescriptor, Facing, FocusMode};
use crate::error::CameraError;
use crate::frame::RasterFrame;
use async_trait::async_trait;
use image::{Rgba, RgbaImage};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, trace};

const DEFAULT_WIDTH: u32 = 640;
const DEFAULT_HEIGHT: u32 = 480;
/// Side of the checkerboard cells drawn into every frame
const CELL: u32 = 4;
/// Extra brightness while the torch is lit
const TORCH_BOOST: u8 = 120;

/// What the synthetic lens is looking at
#[derive(Debug, Clone, Copy)]
struct Scene {
    brightness: u8,
    focus_peak: f64,
}

#[derive(Debug)]
struct BackendState {
    devices: Vec<DeviceDescriptor>,
    permission_denied: bool,
    acquire_delay: Duration,
    not_ready_frames: u32,
    torch_warmup: Duration,
    scene: Arc<Mutex<Scene>>,
    enumerations: u32,
    tracks: Vec<Arc<SyntheticTrack>>,
}

/// Deterministic in-process capture stack.
///
/// Frames are a checkerboard whose amplitude follows a single-peak curve of
/// the manual focus distance and whose brightness follows the scene
/// brightness plus the torch.
#[derive(Debug, Clone)]
pub struct SyntheticBackend {
    state: Arc<Mutex<BackendState>>,
}

impl SyntheticBackend {
    pub fn new(devices: Vec<DeviceDescriptor>) -> Self {
        Self {
            state: Arc::new(Mutex::new(BackendState {
                devices,
                permission_denied: false,
                acquire_delay: Duration::from_millis(20),
                not_ready_frames: 0,
                torch_warmup: Duration::ZERO,
                scene: Arc::new(Mutex::new(Scene {
                    brightness: 128,
                    focus_peak: 0.4,
                })),
                enumerations: 0,
                tracks: Vec::new(),
            })),
        }
    }

    /// A phone-like device set: front, wide back with torch, macro back
    pub fn phone() -> Self {
        Self::new(vec![
            DeviceDescriptor::new("front-0", "camera2 1, facing front", Facing::Front)
                .with_capabilities(Capabilities {
                    focus_modes: vec![FocusMode::Continuous],
                    max_width: 1280,
                    max_height: 720,
                    ..Capabilities::default()
                }),
            DeviceDescriptor::new("back-0", "camera2 0, facing back", Facing::Back)
                .with_capabilities(Capabilities {
                    focus_modes: vec![
                        FocusMode::Continuous,
                        FocusMode::SingleShot,
                        FocusMode::Manual,
                    ],
                    focus_distance: Some(CapabilityRange::new(0.1, 10.0)),
                    zoom: Some(CapabilityRange::new(1.0, 4.0)),
                    torch: true,
                    max_width: 1920,
                    max_height: 1080,
                }),
            DeviceDescriptor::new("back-macro", "camera2 2, facing back macro", Facing::Back)
                .with_capabilities(Capabilities {
                    focus_modes: vec![FocusMode::Continuous, FocusMode::Manual],
                    focus_distance: Some(CapabilityRange::new(0.03, 0.5)),
                    max_width: 1280,
                    max_height: 720,
                    ..Capabilities::default()
                }),
        ])
    }

    pub fn with_permission_denied(self) -> Self {
        self.state.lock().permission_denied = true;
        self
    }

    pub fn with_acquire_delay(self, delay: Duration) -> Self {
        self.state.lock().acquire_delay = delay;
        self
    }

    /// Number of frames each new track fails to deliver before it is ready
    pub fn with_not_ready_frames(self, count: u32) -> Self {
        self.state.lock().not_ready_frames = count;
        self
    }

    /// Time the lamp takes to light; `Torch(true)` updates suspend this long
    pub fn with_torch_warmup(self, delay: Duration) -> Self {
        self.state.lock().torch_warmup = delay;
        self
    }

    pub fn with_focus_peak(self, distance: f64) -> Self {
        self.state.lock().scene.lock().focus_peak = distance;
        self
    }

    /// Scene brightness, 0 (black) to 255
    pub fn set_brightness(&self, brightness: u8) {
        self.state.lock().scene.lock().brightness = brightness;
    }

    pub fn set_devices(&self, devices: Vec<DeviceDescriptor>) {
        self.state.lock().devices = devices;
    }

    pub fn enumerations(&self) -> u32 {
        self.state.lock().enumerations
    }

    /// Total tracks acquired so far
    pub fn acquisitions(&self) -> usize {
        self.state.lock().tracks.len()
    }

    /// Tracks acquired and not yet stopped
    pub fn live_tracks(&self) -> usize {
        self.state.lock().tracks.iter().filter(|t| !t.is_stopped()).count()
    }

    pub fn last_track(&self) -> Option<Arc<SyntheticTrack>> {
        self.state.lock().tracks.last().cloned()
    }

    fn resolve_device(
        devices: &[DeviceDescriptor],
        constraints: &TrackConstraints,
    ) -> Result<DeviceDescriptor, CameraError> {
        if let Some(id) = &constraints.device_id {
            return devices
                .iter()
                .find(|d| &d.id == id)
                .cloned()
                .ok_or_else(|| CameraError::unavailable(format!("no device with id '{}'", id)));
        }
        if let Some(facing) = constraints.facing {
            if let Some(device) = devices.iter().find(|d| d.effective_facing() == facing) {
                return Ok(device.clone());
            }
        }
        devices
            .first()
            .cloned()
            .ok_or_else(|| CameraError::unavailable("no capture devices"))
    }

    fn resolve_resolution(
        device: &DeviceDescriptor,
        constraints: &TrackConstraints,
    ) -> Result<(u32, u32), CameraError> {
        let caps = &device.capabilities;
        let max_w = if caps.max_width > 0 { caps.max_width } else { u32::MAX };
        let max_h = if caps.max_height > 0 { caps.max_height } else { u32::MAX };

        let width = constraints.width.unwrap_or(DEFAULT_WIDTH);
        let height = match (constraints.height, constraints.aspect_ratio) {
            (Some(h), _) => h,
            (None, Some(ratio)) if ratio > 0.0 => (width as f64 / ratio).round() as u32,
            (None, _) if constraints.width.is_some() => width * 3 / 4,
            (None, _) => DEFAULT_HEIGHT,
        };

        if width == 0 || height == 0 {
            return Err(CameraError::ConstraintUnsatisfiable {
                details: format!("resolution {}x{}", width, height),
            });
        }
        if constraints.exact && (width > max_w || height > max_h) {
            return Err(CameraError::ConstraintUnsatisfiable {
                details: format!(
                    "'{}' cannot deliver exactly {}x{}",
                    device.label, width, height
                ),
            });
        }
        Ok((width.min(max_w), height.min(max_h)))
    }
}

#[async_trait]
impl CaptureBackend for SyntheticBackend {
    async fn enumerate(&self) -> Result<Vec<DeviceDescriptor>, CameraError> {
        let mut state = self.state.lock();
        state.enumerations += 1;
        Ok(state.devices.clone())
    }

    async fn acquire(&self, constraints: &TrackConstraints) -> Result<Arc<dyn CaptureTrack>, CameraError> {
        let delay = self.state.lock().acquire_delay;
        sleep(delay).await;

        let mut state = self.state.lock();
        if state.permission_denied {
            return Err(CameraError::PermissionDenied {
                details: "capture access refused".to_string(),
            });
        }

        let device = Self::resolve_device(&state.devices, constraints)?;
        let (width, height) = Self::resolve_resolution(&device, constraints)?;
        debug!("Synthetic track on '{}' at {}x{}", device.label, width, height);

        let track = Arc::new(SyntheticTrack {
            device,
            scene: Arc::clone(&state.scene),
            torch_warmup: state.torch_warmup,
            inner: Mutex::new(TrackState {
                settings: TrackSettings {
                    width,
                    height,
                    zoom: None,
                    torch: false,
                    focus_mode: None,
                    focus_distance: None,
                },
                enabled: true,
                stopped: false,
                next_frame_id: 0,
                not_ready_left: state.not_ready_frames,
                warming_up: false,
                applied: Vec::new(),
            }),
        });
        {
            let mut inner = track.inner.lock();
            let caps = &track.device.capabilities;
            inner.settings.zoom = caps.zoom.map(|r| r.min);
            if caps.supports_focus_mode(FocusMode::Continuous) {
                inner.settings.focus_mode = Some(FocusMode::Continuous);
            }
        }
        state.tracks.push(Arc::clone(&track));

        Ok(track)
    }
}

#[derive(Debug)]
struct TrackState {
    settings: TrackSettings,
    enabled: bool,
    stopped: bool,
    next_frame_id: u64,
    not_ready_left: u32,
    warming_up: bool,
    applied: Vec<ConstraintUpdate>,
}

/// Track handed out by [`SyntheticBackend`]
#[derive(Debug)]
pub struct SyntheticTrack {
    device: DeviceDescriptor,
    scene: Arc<Mutex<Scene>>,
    torch_warmup: Duration,
    inner: Mutex<TrackState>,
}

impl SyntheticTrack {
    pub fn is_stopped(&self) -> bool {
        self.inner.lock().stopped
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.lock().enabled
    }

    /// A `Torch(true)` update is waiting for the lamp
    pub fn is_warming_up(&self) -> bool {
        self.inner.lock().warming_up
    }

    /// Fail the next `count` frame grabs as not ready
    pub fn drop_frames(&self, count: u32) {
        self.inner.lock().not_ready_left += count;
    }

    /// Every constraint update applied so far, in order
    pub fn applied(&self) -> Vec<ConstraintUpdate> {
        self.inner.lock().applied.clone()
    }

    /// Checkerboard amplitude for the current focus state, `0..=1`
    fn sharpness(&self, settings: &TrackSettings, peak: f64) -> f64 {
        match (settings.focus_mode, settings.focus_distance) {
            (Some(FocusMode::Manual), Some(d)) if d > 0.0 && peak > 0.0 => {
                let l = (d / peak).ln();
                (-(l * l) / 0.5).exp()
            }
            _ => 0.8,
        }
    }
}

#[async_trait]
impl CaptureTrack for SyntheticTrack {
    fn device(&self) -> &DeviceDescriptor {
        &self.device
    }

    fn settings(&self) -> TrackSettings {
        self.inner.lock().settings.clone()
    }

    async fn apply(&self, update: ConstraintUpdate) -> Result<(), CameraError> {
        let caps = &self.device.capabilities;
        if update == ConstraintUpdate::Torch(true) && caps.torch && !self.torch_warmup.is_zero() {
            self.inner.lock().warming_up = true;
            sleep(self.torch_warmup).await;
            self.inner.lock().warming_up = false;
        }

        let mut inner = self.inner.lock();
        if inner.stopped {
            return Err(CameraError::NotOpened);
        }

        match update {
            ConstraintUpdate::Zoom(z) => {
                let range = caps.zoom.ok_or_else(|| CameraError::unsupported("zoom"))?;
                if !range.contains(z) {
                    return Err(CameraError::ConstraintUnsatisfiable {
                        details: format!("zoom {} outside [{}, {}]", z, range.min, range.max),
                    });
                }
                inner.settings.zoom = Some(z);
            }
            ConstraintUpdate::Torch(on) => {
                if !caps.torch {
                    return Err(CameraError::unsupported("torch"));
                }
                inner.settings.torch = on;
            }
            ConstraintUpdate::FocusMode(mode) => {
                if !caps.supports_focus_mode(mode) {
                    return Err(CameraError::unsupported(format!("focusMode {:?}", mode)));
                }
                inner.settings.focus_mode = Some(mode);
                if mode != FocusMode::Manual {
                    inner.settings.focus_distance = None;
                }
            }
            ConstraintUpdate::FocusDistance(d) => {
                let range = caps
                    .focus_distance
                    .filter(|_| caps.supports_focus_mode(FocusMode::Manual))
                    .ok_or_else(|| CameraError::unsupported("focusDistance"))?;
                inner.settings.focus_mode = Some(FocusMode::Manual);
                inner.settings.focus_distance = Some(range.clamp(d));
            }
        }

        trace!("Applied {:?} to '{}'", update, self.device.label);
        inner.applied.push(update);
        Ok(())
    }

    async fn wait_first_frame(&self) -> Result<(), CameraError> {
        sleep(Duration::from_millis(5)).await;
        self.grab_frame().map(|_| ())
    }

    fn set_enabled(&self, enabled: bool) {
        self.inner.lock().enabled = enabled;
    }

    fn grab_frame(&self) -> Result<RasterFrame, CameraError> {
        let (settings, id) = {
            let mut inner = self.inner.lock();
            if inner.stopped {
                return Err(CameraError::NotOpened);
            }
            if !inner.enabled {
                return Err(CameraError::transient("track is paused"));
            }
            if inner.not_ready_left > 0 {
                inner.not_ready_left -= 1;
                return Err(CameraError::transient("frame not ready"));
            }
            inner.next_frame_id += 1;
            (inner.settings.clone(), inner.next_frame_id)
        };

        let Scene {
            brightness,
            focus_peak: peak,
        } = *self.scene.lock();
        let base = if settings.torch {
            brightness.saturating_add(TORCH_BOOST)
        } else {
            brightness
        };
        let swing = (self.sharpness(&settings, peak) * base.min(255 - base) as f64) as i16;

        let image = RgbaImage::from_fn(settings.width, settings.height, |x, y| {
            let sign = if (x / CELL + y / CELL) % 2 == 0 { 1 } else { -1 };
            let v = (base as i16 + sign * swing).clamp(0, 255) as u8;
            Rgba([v, v, v, 255])
        });

        Ok(RasterFrame::new(id, image))
    }

    async fn stop(&self) {
        let mut inner = self.inner.lock();
        if !inner.stopped {
            debug!("Synthetic track on '{}' stopped", self.device.label);
            inner.stopped = true;
        }
    }
}
