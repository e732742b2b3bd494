mod focus;
mod lifecycle;
mod request;
mod status;
mod torch;
mod view;
mod zoom;
#[cfg(test)]
mod tests;

pub use request::{CameraRequest, ResolutionRequest};
pub use status::CameraStatus;

use crate::capture::CaptureTrack;
use crate::config::LivecamConfig;
use crate::device::{CameraPreset, DeviceCatalog, DeviceDescriptor, DeviceMatcher};
use crate::error::CameraError;
use crate::events::{CameraEvent, EventBus};
use focus::FocusState;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use torch::TorchState;
use tracing::{debug, info};
use view::ViewState;
use zoom::ZoomState;

/// Result slot of the in-flight open; `None` until it settles
type OpenResult = Option<Result<(), CameraError>>;

/// Mutable camera state. Guarded by a `parking_lot` mutex that is never
/// held across an `.await`.
struct CameraState {
    status: CameraStatus,
    /// Only the lifecycle code assigns this
    track: Option<Arc<dyn CaptureTrack>>,

    requested_camera: CameraRequest,
    requested_resolution: ResolutionRequest,
    /// Intents the current track was opened with
    active_camera: Option<CameraRequest>,
    active_resolution: Option<ResolutionRequest>,
    camera_changed_when_paused: bool,
    resolution_changed_when_paused: bool,

    should_close: bool,
    intent_version: u64,
    open_generation: u64,
    pending_open: Option<watch::Receiver<OpenResult>>,

    close_when_hidden: bool,
    restore_on_visible: Option<CameraStatus>,

    view: ViewState,
    zoom: ZoomState,
    focus: FocusState,
    torch: TorchState,
}

impl CameraState {
    fn new(config: &LivecamConfig) -> Self {
        Self {
            status: CameraStatus::Closed,
            track: None,
            requested_camera: CameraRequest::Default,
            requested_resolution: ResolutionRequest::Default,
            active_camera: None,
            active_resolution: None,
            camera_changed_when_paused: false,
            resolution_changed_when_paused: false,
            should_close: false,
            intent_version: 0,
            open_generation: 0,
            pending_open: None,
            close_when_hidden: config.camera.close_when_hidden,
            restore_on_visible: None,
            view: ViewState::new(&config.display),
            zoom: ZoomState::new(&config.zoom),
            focus: FocusState::new(config.focus.tap_to_focus),
            torch: TorchState::default(),
        }
    }
}

struct CameraInner {
    catalog: Arc<DeviceCatalog>,
    events: EventBus,
    config: LivecamConfig,
    state: Mutex<CameraState>,
    status_tx: watch::Sender<CameraStatus>,
    shutdown: CancellationToken,
}

/// Handle to one live camera. Cheap to clone; clones share the device,
/// the state and the event bus.
#[derive(Clone)]
pub struct Camera {
    inner: Arc<CameraInner>,
}

impl Camera {
    /// Create a closed camera with its own event bus
    pub fn new(catalog: Arc<DeviceCatalog>, config: LivecamConfig) -> Self {
        let events = if config.events.debug_logging {
            EventBus::with_debug_logging(config.events.capacity)
        } else {
            EventBus::new(config.events.capacity)
        };
        Self::with_event_bus(catalog, config, events)
    }

    /// Create a closed camera publishing on an existing bus
    pub fn with_event_bus(catalog: Arc<DeviceCatalog>, config: LivecamConfig, events: EventBus) -> Self {
        if !config.camera.customized_video_labels.is_empty() {
            catalog.set_matchers(
                CameraPreset::CustomizedVideo,
                vec![DeviceMatcher::labels(&config.camera.customized_video_labels)],
            );
        }

        let (status_tx, _) = watch::channel(CameraStatus::Closed);
        info!(
            "Camera created (default preset '{}', {}x{})",
            config.camera.default_preset, config.camera.resolution.0, config.camera.resolution.1
        );

        Self {
            inner: Arc::new(CameraInner {
                catalog,
                events,
                state: Mutex::new(CameraState::new(&config)),
                config,
                status_tx,
                shutdown: CancellationToken::new(),
            }),
        }
    }

    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CameraEvent> {
        self.inner.events.subscribe()
    }

    pub fn catalog(&self) -> &Arc<DeviceCatalog> {
        &self.inner.catalog
    }

    pub fn config(&self) -> &LivecamConfig {
        &self.inner.config
    }

    pub fn status(&self) -> CameraStatus {
        self.inner.state.lock().status
    }

    /// Watch lifecycle transitions
    pub fn status_changes(&self) -> watch::Receiver<CameraStatus> {
        self.inner.status_tx.subscribe()
    }

    pub fn requested_camera(&self) -> CameraRequest {
        self.inner.state.lock().requested_camera.clone()
    }

    pub fn requested_resolution(&self) -> ResolutionRequest {
        self.inner.state.lock().requested_resolution.clone()
    }

    /// Descriptor of the device backing the current track
    pub fn current_camera(&self) -> Option<DeviceDescriptor> {
        self.inner
            .state
            .lock()
            .track
            .as_ref()
            .map(|track| track.device().clone())
    }

    /// Raster size of the current track
    pub fn current_resolution(&self) -> Option<(u32, u32)> {
        let track = self.inner.state.lock().track.clone()?;
        let settings = track.settings();
        Some((settings.width, settings.height))
    }

    pub async fn has_camera(&self) -> Result<bool, CameraError> {
        self.inner.catalog.has_camera().await
    }

    pub async fn has_macro_camera(&self) -> Result<bool, CameraError> {
        self.inner.catalog.has_macro_camera().await
    }

    /// Enumerated devices, from the catalog cache when available
    pub async fn device_infos(&self) -> Result<Vec<DeviceDescriptor>, CameraError> {
        self.inner.catalog.devices().await
    }

    /// Stop background loops and release the device. The camera cannot be
    /// reopened afterwards.
    pub async fn dispose(&self) {
        if self.inner.shutdown.is_cancelled() {
            return;
        }
        info!("Disposing camera");
        self.inner.shutdown.cancel();
        {
            let mut state = self.inner.state.lock();
            state.focus.task_id += 1;
            state.torch.supersede();
        }
        self.close().await;
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }

    /// The current track, or `NotOpened`
    fn current_track(&self) -> Result<Arc<dyn CaptureTrack>, CameraError> {
        self.inner
            .state
            .lock()
            .track
            .clone()
            .ok_or(CameraError::NotOpened)
    }

    fn set_status(&self, state: &mut CameraState, status: CameraStatus) {
        if state.status != status {
            debug!("Camera status {} -> {}", state.status, status);
        }
        state.status = status;
        self.inner.status_tx.send_replace(status);
    }

    async fn publish(&self, event: CameraEvent) {
        // No subscribers is not an error for the camera
        let _ = self.inner.events.publish(event).await;
    }
}

impl fmt::Debug for Camera {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Camera")
            .field("status", &self.status())
            .field("device", &self.current_camera().map(|d| d.id))
            .finish()
    }
}
