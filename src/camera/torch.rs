use super::{Camera, CameraStatus};
use crate::capture::{CaptureTrack, ConstraintUpdate};
use crate::error::CameraError;
use crate::events::CameraEvent;
use crate::recovery::{RecoveryAction, RecoveryConfig, RetryPolicy};
use crate::torch::{dark_fraction, AutoTorchParameters, DarknessTracker, TorchMode, TorchVerdict};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, trace, warn};

#[derive(Debug, Default)]
pub(super) struct TorchState {
    pub(super) mode: TorchMode,
    /// The lamp is on; re-lit on reopen
    pub(super) lit: bool,
    /// Auto loop generation
    pub(super) task_id: u64,
    pub(super) loop_running: bool,
}

impl TorchState {
    /// End any running auto loop
    pub(super) fn supersede(&mut self) {
        self.task_id += 1;
        self.loop_running = false;
    }
}

impl Camera {
    pub fn is_torch_supported(&self) -> bool {
        self.current_camera()
            .map(|device| device.capabilities.torch)
            .unwrap_or(false)
    }

    pub fn torch_mode(&self) -> TorchMode {
        self.inner.state.lock().torch.mode
    }

    /// Whether the lamp is lit; `None` while auto mode decides
    pub fn is_torch_on(&self) -> Option<bool> {
        let state = self.inner.state.lock();
        match state.torch.mode {
            TorchMode::Auto => None,
            TorchMode::On | TorchMode::Off => Some(state.torch.lit),
        }
    }

    pub async fn turn_on_torch(&self) -> Result<(), CameraError> {
        self.set_torch(TorchMode::On).await
    }

    pub async fn turn_off_torch(&self) -> Result<(), CameraError> {
        self.set_torch(TorchMode::Off).await
    }

    async fn set_torch(&self, mode: TorchMode) -> Result<(), CameraError> {
        let track = self.torch_track()?;
        let on = mode == TorchMode::On;
        let (previous, task_id) = {
            let mut state = self.inner.state.lock();
            state.torch.supersede();
            let previous = std::mem::replace(&mut state.torch.mode, mode);
            (previous, state.torch.task_id)
        };

        if let Err(e) = track.apply(ConstraintUpdate::Torch(on)).await {
            // Nothing changed on the device; undo the mode unless a newer call took over
            let restored = {
                let mut state = self.inner.state.lock();
                let current = state.torch.task_id == task_id;
                if current {
                    state.torch.mode = previous;
                }
                current
            };
            warn!("Failed to turn torch {}: {}", if on { "on" } else { "off" }, e);
            if restored {
                self.restart_auto_torch_if_needed();
            }
            return Err(e);
        }

        {
            let mut state = self.inner.state.lock();
            if state.torch.task_id == task_id {
                state.torch.lit = on;
            }
        }
        info!("Torch turned {}", if on { "on" } else { "off" });
        Ok(())
    }

    /// Let brightness sampling decide when to light the torch. Starting it
    /// again while a loop runs does nothing.
    pub async fn turn_auto_torch(&self) -> Result<(), CameraError> {
        let track = self.torch_track()?;
        let was_lit = {
            let mut state = self.inner.state.lock();
            if state.torch.mode == TorchMode::Auto && state.torch.loop_running {
                return Ok(());
            }
            state.torch.supersede();
            state.torch.mode = TorchMode::Auto;
            state.torch.lit
        };

        // A lit torch would hide the darkness being measured
        if was_lit {
            track.apply(ConstraintUpdate::Torch(false)).await?;
            self.inner.state.lock().torch.lit = false;
        }

        self.restart_auto_torch_if_needed();
        Ok(())
    }

    /// Start the auto loop when auto mode is selected, the camera delivers
    /// frames and the torch has not been lit yet
    pub(super) fn restart_auto_torch_if_needed(&self) {
        let task_id = {
            let mut state = self.inner.state.lock();
            let torch = &state.torch;
            if torch.mode != TorchMode::Auto
                || torch.loop_running
                || torch.lit
                || state.status != CameraStatus::Opened
            {
                return;
            }
            state.torch.supersede();
            state.torch.loop_running = true;
            state.torch.task_id
        };

        let camera = self.clone();
        tokio::spawn(async move { camera.auto_torch_loop(task_id).await });
    }

    async fn auto_torch_loop(self, task_id: u64) {
        let params = self.inner.config.torch.auto.clone();
        let mut tracker = DarknessTracker::new(params.clone());
        let mut policy = RetryPolicy::new(RecoveryConfig {
            max_retries: params.max_error_count,
            base_delay: params.short_delay(),
            max_delay: params.short_delay(),
            exponential_backoff: false,
            degraded_delay: params.long_delay(),
        });
        let mut delay = params.short_delay();
        debug!("Auto torch loop {} started", task_id);

        loop {
            tokio::select! {
                _ = self.inner.shutdown.cancelled() => break,
                _ = sleep(delay) => {}
            }
            if self.torch_superseded(task_id) {
                break;
            }

            let verdict = match self.sample_darkness(&params) {
                Ok(fraction) => {
                    policy.on_success("auto torch sampling");
                    tracker.observe(fraction)
                }
                Err(e) => {
                    delay = retry_delay(&mut policy, "auto torch sampling", &e);
                    continue;
                }
            };

            match verdict {
                TorchVerdict::Wait(next) => delay = next,
                TorchVerdict::TurnOn => match self.light_torch(task_id).await {
                    Ok(true) => {
                        self.publish(CameraEvent::TorchAutoOn).await;
                        break;
                    }
                    Ok(false) => break,
                    Err(e) => delay = retry_delay(&mut policy, "auto torch", &e),
                },
            }
        }

        {
            let mut state = self.inner.state.lock();
            if state.torch.task_id == task_id {
                state.torch.loop_running = false;
            }
        }
        debug!("Auto torch loop {} finished", task_id);
    }

    /// Fraction of dark pixels in a thumbnail of the current frame
    fn sample_darkness(&self, params: &AutoTorchParameters) -> Result<f64, CameraError> {
        let frame = self.current_frame()?;
        let thumbnail = frame.gray_thumbnail(params.sample_size);
        let fraction = dark_fraction(&thumbnail, params.gray_threshold);
        trace!("Frame {} dark fraction {:.3}", frame.id, fraction);
        Ok(fraction)
    }

    /// Light the torch for the auto loop. `false` when the loop was
    /// superseded, in which case the lamp is left as the manual mode wants it.
    async fn light_torch(&self, task_id: u64) -> Result<bool, CameraError> {
        if self.torch_superseded(task_id) {
            return Ok(false);
        }
        let track = self.current_track()?;
        track.apply(ConstraintUpdate::Torch(true)).await?;

        let keep_lit = {
            let mut state = self.inner.state.lock();
            if state.torch.task_id == task_id && !self.inner.shutdown.is_cancelled() {
                state.torch.lit = true;
                state.torch.loop_running = false;
                return Ok(true);
            }
            state.torch.mode == TorchMode::On
        };

        if !keep_lit {
            debug!("Auto torch {} superseded while lighting, switching it off", task_id);
            if let Err(e) = track.apply(ConstraintUpdate::Torch(false)).await {
                debug!("Could not switch torch back off: {}", e);
            }
        }
        Ok(false)
    }

    fn torch_superseded(&self, task_id: u64) -> bool {
        self.inner.shutdown.is_cancelled() || self.inner.state.lock().torch.task_id != task_id
    }

    /// The current track, provided it has a torch
    fn torch_track(&self) -> Result<Arc<dyn CaptureTrack>, CameraError> {
        let track = self.current_track()?;
        if !track.device().capabilities.torch {
            return Err(CameraError::unsupported("torch"));
        }
        Ok(track)
    }
}

fn retry_delay(policy: &mut RetryPolicy, operation: &str, error: &CameraError) -> Duration {
    match policy.on_failure(operation, error) {
        RecoveryAction::RetryAfterDelay(delay) | RecoveryAction::Degrade(delay) => delay,
    }
}
