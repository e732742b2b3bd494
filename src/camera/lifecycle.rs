use super::{Camera, CameraRequest, CameraState, CameraStatus, OpenResult, ResolutionRequest};
use crate::capture::{CaptureTrack, ConstraintUpdate};
use crate::error::CameraError;
use crate::events::CameraEvent;
use crate::recovery::{retry_transient, RecoveryAction, RecoveryConfig, RetryPolicy};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

enum OpenStep {
    Done,
    Await(watch::Receiver<OpenResult>),
    /// A close is unwinding the current track or open; start over after it
    AfterClose(Option<watch::Receiver<OpenResult>>, watch::Receiver<CameraStatus>),
    Resumed(Arc<dyn CaptureTrack>),
    Reacquire,
    WaitClosing,
}

enum PauseStep {
    Done,
    Paused,
    Await(watch::Receiver<OpenResult>),
    WaitClosing,
}

enum CloseStep {
    Done,
    Release(Arc<dyn CaptureTrack>),
    WaitClosing,
}

/// What an intent change requires of the lifecycle
enum IntentStep {
    Stored,
    Reopen,
    Await(watch::Receiver<OpenResult>),
}

/// Why an in-flight open must drop what it acquired
enum Interruption {
    Closed,
    Retarget,
}

impl Camera {
    /// Open the requested camera.
    ///
    /// Idempotent: callers arriving while an open is in flight share its
    /// result. From `Paused` the existing track is resumed unless the camera
    /// or resolution request changed in the meantime.
    pub async fn open(&self) -> Result<(), CameraError> {
        if self.inner.shutdown.is_cancelled() {
            return Err(CameraError::superseded("camera disposed"));
        }

        loop {
            let step = {
                let mut state = self.inner.state.lock();
                match state.status {
                    CameraStatus::Opening | CameraStatus::Opened | CameraStatus::Paused
                        if state.should_close =>
                    {
                        OpenStep::AfterClose(
                            state.pending_open.clone(),
                            self.inner.status_tx.subscribe(),
                        )
                    }
                    CameraStatus::Opened => OpenStep::Done,
                    CameraStatus::Opening => match state.pending_open.clone() {
                        Some(rx) => OpenStep::Await(rx),
                        None => OpenStep::Done,
                    },
                    CameraStatus::Closing => OpenStep::WaitClosing,
                    CameraStatus::Paused => {
                        let changed =
                            state.camera_changed_when_paused || state.resolution_changed_when_paused;
                        match state.track.clone() {
                            Some(track) if !changed => {
                                track.set_enabled(true);
                                self.set_status(&mut state, CameraStatus::Opened);
                                OpenStep::Resumed(track)
                            }
                            _ => OpenStep::Reacquire,
                        }
                    }
                    CameraStatus::Closed => OpenStep::Await(self.start_open(&mut state)),
                }
            };

            match step {
                OpenStep::Done => return Ok(()),
                OpenStep::Await(rx) => return await_open(rx).await,
                OpenStep::AfterClose(pending, mut status) => {
                    debug!("Open waiting for a close in progress");
                    match pending {
                        Some(rx) => {
                            let _ = await_open(rx).await;
                        }
                        None => {
                            let _ = status.changed().await;
                        }
                    }
                }
                OpenStep::Resumed(track) => {
                    info!("Camera resumed");
                    self.restart_auto_torch_if_needed();
                    self.publish_opened(&track).await;
                    return Ok(());
                }
                OpenStep::Reacquire => {
                    debug!("Request changed while paused, reacquiring track");
                    self.release(false).await;
                }
                OpenStep::WaitClosing => self.wait_until_settled().await,
            }
        }
    }

    /// Stop frame delivery but keep the device. A pause issued while an open
    /// is in flight applies once that open settles.
    pub async fn pause(&self) {
        loop {
            let step = {
                let mut state = self.inner.state.lock();
                match state.status {
                    CameraStatus::Opened => {
                        if let Some(track) = &state.track {
                            track.set_enabled(false);
                        }
                        state.torch.supersede();
                        self.set_status(&mut state, CameraStatus::Paused);
                        PauseStep::Paused
                    }
                    CameraStatus::Opening => match state.pending_open.clone() {
                        Some(rx) => PauseStep::Await(rx),
                        None => PauseStep::Done,
                    },
                    CameraStatus::Closing => PauseStep::WaitClosing,
                    CameraStatus::Paused | CameraStatus::Closed => PauseStep::Done,
                }
            };

            match step {
                PauseStep::Done => return,
                PauseStep::Paused => {
                    info!("Camera paused");
                    self.publish(CameraEvent::Paused).await;
                    return;
                }
                PauseStep::Await(rx) => {
                    // A failed open leaves nothing to pause
                    if await_open(rx).await.is_err() {
                        return;
                    }
                }
                PauseStep::WaitClosing => self.wait_until_settled().await,
            }
        }
    }

    /// Release the device. A pending open is told to give up and resolves
    /// with `Superseded`.
    pub async fn close(&self) {
        self.release(true).await;
    }

    async fn release(&self, announce: bool) {
        let pending = {
            let mut state = self.inner.state.lock();
            state.should_close = true;
            state.pending_open.clone()
        };
        if let Some(rx) = pending {
            debug!("Close waiting for the pending open to settle");
            let _ = await_open(rx).await;
        }

        let step = {
            let mut state = self.inner.state.lock();
            match state.status {
                // A later open started after this close; it wins
                CameraStatus::Opening => CloseStep::Done,
                CameraStatus::Closing => CloseStep::WaitClosing,
                CameraStatus::Closed => {
                    state.should_close = false;
                    CloseStep::Done
                }
                CameraStatus::Opened | CameraStatus::Paused => match state.track.take() {
                    Some(track) => {
                        reset_lifecycle_flags(&mut state);
                        state.focus.task_id += 1;
                        state.torch.supersede();
                        self.set_status(&mut state, CameraStatus::Closing);
                        CloseStep::Release(track)
                    }
                    None => {
                        reset_lifecycle_flags(&mut state);
                        self.set_status(&mut state, CameraStatus::Closed);
                        CloseStep::Done
                    }
                },
            }
        };

        match step {
            CloseStep::Done => {}
            CloseStep::WaitClosing => self.wait_until_settled().await,
            CloseStep::Release(track) => {
                track.stop().await;
                {
                    let mut state = self.inner.state.lock();
                    state.should_close = false;
                    self.set_status(&mut state, CameraStatus::Closed);
                }
                info!("Camera '{}' released", track.device().label);
                if announce {
                    self.publish(CameraEvent::Closed).await;
                }
            }
        }
    }

    /// Change which camera is wanted. An opened camera reopens on the new
    /// device; a paused one reacquires on its next `open()`.
    pub async fn request_camera(&self, request: CameraRequest) -> Result<(), CameraError> {
        let step = {
            let mut state = self.inner.state.lock();
            debug!("Camera requested: {:?}", request);
            state.requested_camera = request;
            if state.status == CameraStatus::Paused {
                state.camera_changed_when_paused =
                    state.active_camera.as_ref() != Some(&state.requested_camera);
            }
            intent_step(&mut state)
        };
        self.follow_intent(step).await
    }

    /// Change the wanted resolution, with the same semantics as
    /// [`Camera::request_camera`].
    pub async fn request_resolution(&self, request: ResolutionRequest) -> Result<(), CameraError> {
        // Reject malformed requests before they become the stored intent
        request.to_constraints(self.inner.config.camera.resolution)?;

        let step = {
            let mut state = self.inner.state.lock();
            debug!("Resolution requested: {:?}", request);
            state.requested_resolution = request;
            if state.status == CameraStatus::Paused {
                state.resolution_changed_when_paused =
                    state.active_resolution.as_ref() != Some(&state.requested_resolution);
            }
            intent_step(&mut state)
        };
        self.follow_intent(step).await
    }

    async fn follow_intent(&self, step: IntentStep) -> Result<(), CameraError> {
        match step {
            IntentStep::Stored => Ok(()),
            IntentStep::Reopen => {
                self.release(false).await;
                self.open().await
            }
            IntentStep::Await(rx) => await_open(rx).await,
        }
    }

    pub fn set_close_when_hidden(&self, enabled: bool) {
        self.inner.state.lock().close_when_hidden = enabled;
    }

    pub fn close_when_hidden(&self) -> bool {
        self.inner.state.lock().close_when_hidden
    }

    /// React to the display surface being hidden or shown. With
    /// close-when-hidden enabled a hidden surface releases the device, and a
    /// camera that was opened or paused comes back in that state once visible
    /// again.
    pub async fn handle_visibility_change(&self, visible: bool) -> Result<(), CameraError> {
        if !visible {
            let close = {
                let mut state = self.inner.state.lock();
                if state.close_when_hidden {
                    state.restore_on_visible = match state.status {
                        CameraStatus::Opened | CameraStatus::Opening => Some(CameraStatus::Opened),
                        CameraStatus::Paused => Some(CameraStatus::Paused),
                        CameraStatus::Closed | CameraStatus::Closing => None,
                    };
                }
                state.close_when_hidden
            };
            if close {
                info!("Display surface hidden, closing camera");
                self.close().await;
            }
            return Ok(());
        }

        let restore = self.inner.state.lock().restore_on_visible.take();
        let Some(restore) = restore else {
            return Ok(());
        };

        info!("Display surface visible again, reopening camera");
        let attempts = self.inner.config.camera.max_reopen_attempts.max(1);
        let mut policy = RetryPolicy::new(RecoveryConfig {
            max_retries: attempts - 1,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(1),
            exponential_backoff: true,
            degraded_delay: Duration::from_secs(1),
        });

        loop {
            match self.open().await {
                Ok(()) => {
                    policy.on_success("reopen");
                    if restore == CameraStatus::Paused {
                        self.pause().await;
                    }
                    return Ok(());
                }
                Err(e @ CameraError::Superseded { .. }) => return Err(e),
                Err(e) => match policy.on_failure("reopen", &e) {
                    RecoveryAction::RetryAfterDelay(delay) => sleep(delay).await,
                    RecoveryAction::Degrade(_) => {
                        error!("Giving up reopening camera after {} attempts: {}", attempts, e);
                        return Err(e);
                    }
                },
            }
        }
    }

    /// Mark the camera as opening and spawn the acquisition. Dropping the
    /// caller's future does not abort it.
    fn start_open(&self, state: &mut CameraState) -> watch::Receiver<OpenResult> {
        let (tx, rx) = watch::channel(None);
        state.should_close = false;
        state.open_generation += 1;
        state.pending_open = Some(rx.clone());
        let generation = state.open_generation;
        self.set_status(state, CameraStatus::Opening);

        let camera = self.clone();
        tokio::spawn(async move {
            let result = camera.run_open().await;
            {
                let mut state = camera.inner.state.lock();
                if state.open_generation == generation {
                    state.pending_open = None;
                    if result.is_err() && state.status == CameraStatus::Opening {
                        camera.set_status(&mut state, CameraStatus::Closed);
                    }
                }
            }
            match &result {
                Ok(()) => {}
                Err(e @ CameraError::Superseded { .. }) => debug!("Open abandoned: {}", e),
                Err(e) => error!("Failed to open camera: {}", e),
            }
            let _ = tx.send(Some(result));
        });

        rx
    }

    async fn run_open(&self) -> Result<(), CameraError> {
        let inner = &self.inner;
        loop {
            let (camera_request, resolution_request, version) = {
                let state = inner.state.lock();
                if state.should_close {
                    return Err(CameraError::superseded("closed before acquisition"));
                }
                (
                    state.requested_camera.clone(),
                    state.requested_resolution.clone(),
                    state.intent_version,
                )
            };

            let device = camera_request
                .resolve(&inner.catalog, inner.config.camera.default_preset)
                .await;
            if self.inner.state.lock().should_close {
                return Err(CameraError::superseded("closed during device selection"));
            }
            let resolution = resolution_request.to_constraints(inner.config.camera.resolution)?;
            let constraints = device?.with_resolution_of(&resolution);

            debug!("Acquiring track with {:?}", constraints);
            let track = inner.catalog.backend().acquire(&constraints).await?;

            if let Some(interruption) = self.interruption(version) {
                track.stop().await;
                match interruption {
                    Interruption::Closed => {
                        return Err(CameraError::superseded("closed during acquisition"))
                    }
                    Interruption::Retarget => {
                        debug!("Request changed during acquisition, reacquiring");
                        continue;
                    }
                }
            }

            let first_frame = self.wait_first_frame(&track).await;
            if let Some(interruption) = self.interruption(version) {
                track.stop().await;
                match interruption {
                    Interruption::Closed => {
                        return Err(CameraError::superseded("closed while waiting for first frame"))
                    }
                    Interruption::Retarget => continue,
                }
            }
            if let Err(e) = first_frame {
                track.stop().await;
                return Err(e);
            }

            self.reapply_track_state(&track).await;

            let interruption = {
                let mut state = inner.state.lock();
                let interruption = interruption_of(&state, version);
                if interruption.is_none() {
                    state.track = Some(Arc::clone(&track));
                    state.active_camera = Some(camera_request);
                    state.active_resolution = Some(resolution_request);
                    state.camera_changed_when_paused = false;
                    state.resolution_changed_when_paused = false;
                    self.set_status(&mut state, CameraStatus::Opened);
                }
                interruption
            };
            match interruption {
                None => {}
                Some(Interruption::Closed) => {
                    track.stop().await;
                    return Err(CameraError::superseded("closed before the track was attached"));
                }
                Some(Interruption::Retarget) => {
                    track.stop().await;
                    continue;
                }
            }

            self.restart_auto_torch_if_needed();
            self.publish_opened(&track).await;
            return Ok(());
        }
    }

    fn interruption(&self, version: u64) -> Option<Interruption> {
        interruption_of(&self.inner.state.lock(), version)
    }

    async fn wait_first_frame(&self, track: &Arc<dyn CaptureTrack>) -> Result<(), CameraError> {
        let camera = &self.inner.config.camera;
        let mut policy = RetryPolicy::new(RecoveryConfig {
            max_retries: camera.first_frame_retries,
            base_delay: camera.first_frame_retry(),
            max_delay: camera.first_frame_retry() * 8,
            exponential_backoff: true,
            degraded_delay: camera.first_frame_retry(),
        });
        retry_transient(&mut policy, "first frame", || {
            let track = Arc::clone(track);
            async move { track.wait_first_frame().await }
        })
        .await
    }

    /// Carry torch and hardware zoom over to a freshly acquired track
    async fn reapply_track_state(&self, track: &Arc<dyn CaptureTrack>) {
        let (lit, hardware_zoom) = {
            let state = self.inner.state.lock();
            (state.torch.lit, state.zoom.hardware)
        };
        let capabilities = &track.device().capabilities;

        if lit {
            if capabilities.torch {
                if let Err(e) = track.apply(ConstraintUpdate::Torch(true)).await {
                    warn!("Failed to relight torch on reopen: {}", e);
                }
            } else {
                debug!("New device has no torch, leaving it off");
                self.inner.state.lock().torch.lit = false;
            }
        }

        if let (Some(zoom), Some(range)) = (hardware_zoom, capabilities.zoom) {
            if let Err(e) = track.apply(ConstraintUpdate::Zoom(range.clamp(zoom))).await {
                warn!("Failed to restore zoom {:.2} on reopen: {}", zoom, e);
            }
        }
    }

    async fn publish_opened(&self, track: &Arc<dyn CaptureTrack>) {
        let settings = track.settings();
        self.publish(CameraEvent::Opened {
            device: track.device().clone(),
            width: settings.width,
            height: settings.height,
        })
        .await;
    }

    /// Wait until no close is in progress
    async fn wait_until_settled(&self) {
        let mut rx = self.inner.status_tx.subscribe();
        let _ = rx.wait_for(|status| *status != CameraStatus::Closing).await;
    }
}

fn intent_step(state: &mut CameraState) -> IntentStep {
    match state.status {
        CameraStatus::Opened => IntentStep::Reopen,
        CameraStatus::Opening => {
            state.intent_version += 1;
            match state.pending_open.clone() {
                Some(rx) => IntentStep::Await(rx),
                None => IntentStep::Stored,
            }
        }
        CameraStatus::Paused | CameraStatus::Closed | CameraStatus::Closing => IntentStep::Stored,
    }
}

fn interruption_of(state: &CameraState, version: u64) -> Option<Interruption> {
    if state.should_close {
        Some(Interruption::Closed)
    } else if state.intent_version != version {
        Some(Interruption::Retarget)
    } else {
        None
    }
}

fn reset_lifecycle_flags(state: &mut CameraState) {
    state.active_camera = None;
    state.active_resolution = None;
    state.camera_changed_when_paused = false;
    state.resolution_changed_when_paused = false;
}

/// Wait for the in-flight open and share its result
async fn await_open(mut rx: watch::Receiver<OpenResult>) -> Result<(), CameraError> {
    let result = match rx.wait_for(Option::is_some).await {
        Ok(slot) => (*slot)
            .clone()
            .unwrap_or_else(|| Err(CameraError::superseded("open produced no result"))),
        Err(_) => Err(CameraError::superseded("open task ended")),
    };
    result
}
