use super::Camera;
use crate::capture::{CaptureTrack, ConstraintUpdate};
use crate::device::FocusMode;
use crate::error::CameraError;
use crate::events::CameraEvent;
use crate::focus::{image_contrast, ContrastSearch, FocusBounds, FocusLens, FocusStrategy};
use crate::frame::PixelRect;
use crate::geometry::Point;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

#[derive(Debug)]
pub(super) struct FocusState {
    pub(super) strategy: FocusStrategy,
    pub(super) in_flight: bool,
    /// Last manual distance commanded
    pub(super) last_distance: Option<f64>,
    /// Bumped by every tap and by close; stale searches and timers compare
    /// against it
    pub(super) task_id: u64,
}

impl FocusState {
    pub(super) fn new(strategy: FocusStrategy) -> Self {
        Self {
            strategy,
            in_flight: false,
            last_distance: None,
            task_id: 0,
        }
    }
}

/// Clears the in-flight flag however the attempt ends
struct InFlight<'a>(&'a Camera);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.inner.state.lock().focus.in_flight = false;
    }
}

/// Drives the lens of a live track and measures the focus window
struct TrackFocusLens {
    camera: Camera,
    track: Arc<dyn CaptureTrack>,
    task_id: u64,
    window: PixelRect,
}

#[async_trait]
impl FocusLens for TrackFocusLens {
    async fn set_distance(&mut self, distance: f64) -> Result<(), CameraError> {
        self.track
            .apply(ConstraintUpdate::FocusDistance(distance))
            .await?;
        self.camera.inner.state.lock().focus.last_distance = Some(distance);
        Ok(())
    }

    async fn settle(&mut self, wait: Duration) {
        tokio::select! {
            _ = self.camera.inner.shutdown.cancelled() => {}
            _ = sleep(wait) => {}
        }
    }

    async fn contrast(&mut self) -> Result<f64, CameraError> {
        let frame = self.track.grab_frame()?;
        let gray = frame.gray_crop(self.window)?;
        Ok(image_contrast(
            gray.as_raw(),
            gray.width() as usize,
            gray.height() as usize,
        ))
    }

    fn is_superseded(&self) -> bool {
        self.camera.focus_superseded(self.task_id)
    }
}

impl Camera {
    pub fn set_tap_to_focus(&self, strategy: FocusStrategy) {
        debug!("Tap to focus: {:?}", strategy);
        self.inner.state.lock().focus.strategy = strategy;
    }

    pub fn tap_to_focus_strategy(&self) -> FocusStrategy {
        self.inner.state.lock().focus.strategy
    }

    pub fn is_focusing(&self) -> bool {
        self.inner.state.lock().focus.in_flight
    }

    pub fn last_focus_distance(&self) -> Option<f64> {
        self.inner.state.lock().focus.last_distance
    }

    /// Focus on a point of the display box with the configured strategy.
    ///
    /// Returns `false` when the tap was ignored: tap-to-focus is off or an
    /// earlier focus is still running.
    pub async fn tap_to_focus(&self, point: Point) -> Result<bool, CameraError> {
        let transform = self.video_transform()?;
        let raster = transform.to_video(point);

        let (strategy, task_id, track) = {
            let mut state = self.inner.state.lock();
            let strategy = state.focus.strategy;
            if strategy == FocusStrategy::Off {
                return Ok(false);
            }
            if state.focus.in_flight {
                debug!("Focus already running, tap ignored");
                return Ok(false);
            }
            let track = state.track.clone().ok_or(CameraError::NotOpened)?;
            state.focus.in_flight = true;
            state.focus.task_id += 1;
            (strategy, state.focus.task_id, track)
        };
        let _in_flight = InFlight(self);

        debug!(
            "Tap at ({:.1}, {:.1}) -> raster ({:.1}, {:.1}), {:?} focus",
            point.x, point.y, raster.x, raster.y, strategy
        );
        let distance = match strategy {
            FocusStrategy::Simple => self.simple_focus(track, task_id).await?,
            FocusStrategy::Advanced => self.advanced_focus(track, raster, task_id).await?,
            FocusStrategy::Off => return Ok(false),
        };

        self.publish(CameraEvent::FocusCompleted { strategy, distance })
            .await;
        Ok(true)
    }

    /// Single-shot if the device has it, else the middle of the manual
    /// range, else a continuous re-trigger
    async fn simple_focus(
        &self,
        track: Arc<dyn CaptureTrack>,
        task_id: u64,
    ) -> Result<Option<f64>, CameraError> {
        let capabilities = track.device().capabilities.clone();

        let manual_range = capabilities
            .focus_distance
            .filter(|_| capabilities.supports_focus_mode(FocusMode::Manual));

        let distance = if capabilities.supports_focus_mode(FocusMode::SingleShot) {
            track
                .apply(ConstraintUpdate::FocusMode(FocusMode::SingleShot))
                .await?;
            None
        } else if let Some(range) = manual_range {
            let distance = range.midpoint();
            track
                .apply(ConstraintUpdate::FocusDistance(distance))
                .await?;
            self.inner.state.lock().focus.last_distance = Some(distance);
            Some(distance)
        } else if capabilities.supports_focus_mode(FocusMode::Continuous) {
            track
                .apply(ConstraintUpdate::FocusMode(FocusMode::Continuous))
                .await?;
            return Ok(None);
        } else {
            return Err(CameraError::unsupported("focusMode"));
        };

        self.revert_to_continuous(track, task_id, self.inner.config.focus.simple_settle());
        Ok(distance)
    }

    async fn advanced_focus(
        &self,
        track: Arc<dyn CaptureTrack>,
        center: Point,
        task_id: u64,
    ) -> Result<Option<f64>, CameraError> {
        let params = &self.inner.config.focus.advanced;
        let capabilities = &track.device().capabilities;
        if !capabilities.supports_focus_mode(FocusMode::Manual) {
            return Err(CameraError::unsupported("manual focus"));
        }
        let bounds = FocusBounds::resolve(capabilities.focus_distance, params)?;

        let settings = track.settings();
        let window = focus_window(center, settings.width, settings.height, params.focus_wh);
        debug!(
            "Contrast search over [{:.3}, {:.3}] in {:?}",
            bounds.near, bounds.far, window
        );

        let mut lens = TrackFocusLens {
            camera: self.clone(),
            track: Arc::clone(&track),
            task_id,
            window,
        };
        let outcome = ContrastSearch::new(params, bounds)
            .search(&mut lens)
            .await?;
        info!(
            "Focused at {:.3} after {} coarse and {} fine steps",
            outcome.distance, outcome.coarse_steps, outcome.fine_steps
        );

        if let Some(after) = params.back_to_continuous() {
            self.revert_to_continuous(track, task_id, after);
        }
        Ok(Some(outcome.distance))
    }

    /// Return to continuous focus after `after`, unless a newer focus or a
    /// close came first
    fn revert_to_continuous(&self, track: Arc<dyn CaptureTrack>, task_id: u64, after: Duration) {
        if !track
            .device()
            .capabilities
            .supports_focus_mode(FocusMode::Continuous)
        {
            return;
        }

        let camera = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = camera.inner.shutdown.cancelled() => return,
                _ = sleep(after) => {}
            }
            if camera.focus_superseded(task_id) {
                debug!("Focus revert {} superseded", task_id);
                return;
            }
            match track
                .apply(ConstraintUpdate::FocusMode(FocusMode::Continuous))
                .await
            {
                Ok(()) => debug!("Focus back to continuous"),
                Err(e) => warn!("Failed to restore continuous focus: {}", e),
            }
        });
    }

    fn focus_superseded(&self, task_id: u64) -> bool {
        self.inner.shutdown.is_cancelled() || self.inner.state.lock().focus.task_id != task_id
    }
}

/// Square of side `focus_wh * min(width, height)` around `center`, kept
/// inside the raster
fn focus_window(center: Point, width: u32, height: u32, focus_wh: f64) -> PixelRect {
    let side = ((focus_wh * width.min(height) as f64).round() as u32)
        .clamp(1, width.min(height).max(1));
    let half = side as f64 / 2.0;
    let max_x = width.saturating_sub(side) as f64;
    let max_y = height.saturating_sub(side) as f64;
    let x = (center.x - half).round().clamp(0.0, max_x) as u32;
    let y = (center.y - half).round().clamp(0.0, max_y) as u32;
    PixelRect::new(x, y, side, side)
}
