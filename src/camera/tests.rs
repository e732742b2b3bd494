use super::*;
use crate::capture::{CaptureTrack, ConstraintUpdate, SyntheticBackend};
use crate::device::{CapabilityRange, FocusMode};
use crate::focus::FocusStrategy;
use crate::geometry::{DisplaySurface, FitMode, Point, Rect, RegionBox, RegionUnit};
use crate::torch::TorchMode;
use crate::zoom::{TouchInput, TouchPoint};
use std::time::Duration;
use tokio::time::sleep;

fn test_config() -> LivecamConfig {
    let mut config = LivecamConfig::default();
    config.camera.resolution = (640, 480);
    config.display.width = 640.0;
    config.display.height = 480.0;
    config
}

fn camera_with(backend: &SyntheticBackend, config: LivecamConfig) -> Camera {
    let catalog = DeviceCatalog::new(Arc::new(backend.clone()));
    Camera::new(Arc::new(catalog), config)
}

fn new_camera(backend: &SyntheticBackend) -> Camera {
    camera_with(backend, test_config())
}

fn drain(rx: &mut broadcast::Receiver<CameraEvent>) -> Vec<CameraEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn count(events: &[CameraEvent], event_type: &str) -> usize {
    events.iter().filter(|e| e.event_type() == event_type).count()
}

#[tokio::test(start_paused = true)]
async fn test_open_is_idempotent() {
    let backend = SyntheticBackend::phone();
    let camera = new_camera(&backend);
    let mut events = camera.subscribe();

    camera.open().await.unwrap();
    camera.open().await.unwrap();

    assert_eq!(camera.status(), CameraStatus::Opened);
    assert_eq!(backend.acquisitions(), 1);
    assert_eq!(camera.current_camera().unwrap().id, "back-0");
    assert_eq!(camera.current_resolution(), Some((640, 480)));

    let events = drain(&mut events);
    assert_eq!(events.len(), 1);
    assert!(matches!(
        &events[0],
        CameraEvent::Opened { device, width: 640, height: 480 } if device.id == "back-0"
    ));
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_opens_share_one_acquisition() {
    let backend = SyntheticBackend::phone();
    let camera = new_camera(&backend);

    let (a, b) = tokio::join!(camera.open(), camera.open());
    assert!(a.is_ok() && b.is_ok());
    assert_eq!(backend.acquisitions(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_close_is_idempotent() {
    let backend = SyntheticBackend::phone();
    let camera = new_camera(&backend);
    let mut events = camera.subscribe();

    camera.close().await;
    assert!(drain(&mut events).is_empty());

    camera.open().await.unwrap();
    camera.close().await;
    camera.close().await;

    assert_eq!(camera.status(), CameraStatus::Closed);
    assert_eq!(backend.live_tracks(), 0);
    assert!(camera.current_camera().is_none());

    let events = drain(&mut events);
    assert_eq!(count(&events, "opened"), 1);
    assert_eq!(count(&events, "closed"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_close_during_pending_open() {
    let backend = SyntheticBackend::phone();
    let camera = new_camera(&backend);

    let opener = camera.clone();
    let open = tokio::spawn(async move { opener.open().await });
    sleep(Duration::from_millis(1)).await;
    assert_eq!(camera.status(), CameraStatus::Opening);

    camera.close().await;

    assert!(matches!(
        open.await.unwrap(),
        Err(CameraError::Superseded { .. })
    ));
    assert_eq!(camera.status(), CameraStatus::Closed);
    assert_eq!(backend.acquisitions(), 1);
    assert_eq!(backend.live_tracks(), 0);

    // Nothing stale is left behind for the next open
    camera.open().await.unwrap();
    assert_eq!(camera.status(), CameraStatus::Opened);
}

#[tokio::test(start_paused = true)]
async fn test_open_after_close_of_pending_open_wins() {
    let backend = SyntheticBackend::phone();
    let camera = new_camera(&backend);

    let opener = camera.clone();
    let first = tokio::spawn(async move { opener.open().await });
    tokio::task::yield_now().await;
    let closer = camera.clone();
    let close = tokio::spawn(async move { closer.close().await });
    tokio::task::yield_now().await;
    let opener = camera.clone();
    let last = tokio::spawn(async move { opener.open().await });

    assert!(matches!(
        first.await.unwrap(),
        Err(CameraError::Superseded { .. })
    ));
    close.await.unwrap();
    last.await.unwrap().unwrap();

    assert_eq!(camera.status(), CameraStatus::Opened);
    assert_eq!(backend.acquisitions(), 2);
    assert_eq!(backend.live_tracks(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_last_call_wins() {
    let backend = SyntheticBackend::phone();
    let camera = new_camera(&backend);

    camera.open().await.unwrap();
    camera.pause().await;
    camera.pause().await;
    camera.close().await;
    camera.open().await.unwrap();
    camera.open().await.unwrap();
    assert_eq!(camera.status(), CameraStatus::Opened);

    camera.close().await;
    camera.pause().await;
    assert_eq!(camera.status(), CameraStatus::Closed);
}

#[tokio::test(start_paused = true)]
async fn test_pause_and_resume_keep_the_track() {
    let backend = SyntheticBackend::phone();
    let camera = new_camera(&backend);
    let mut events = camera.subscribe();

    camera.open().await.unwrap();
    let track = backend.last_track().unwrap();

    camera.pause().await;
    camera.pause().await;
    assert_eq!(camera.status(), CameraStatus::Paused);
    assert!(!track.is_enabled());
    assert!(camera.get_frame(None).is_err());

    camera.open().await.unwrap();
    assert_eq!(camera.status(), CameraStatus::Opened);
    assert!(track.is_enabled());
    assert_eq!(backend.acquisitions(), 1);

    let types: Vec<_> = drain(&mut events).iter().map(|e| e.event_type()).collect();
    assert_eq!(types, vec!["opened", "paused", "opened"]);
}

#[tokio::test(start_paused = true)]
async fn test_pause_while_opening_applies_after_open() {
    let backend = SyntheticBackend::phone();
    let camera = new_camera(&backend);

    let opener = camera.clone();
    let open = tokio::spawn(async move { opener.open().await });
    sleep(Duration::from_millis(1)).await;

    camera.pause().await;
    assert!(open.await.unwrap().is_ok());
    assert_eq!(camera.status(), CameraStatus::Paused);
}

#[tokio::test(start_paused = true)]
async fn test_unchanged_request_while_paused_resumes_without_reacquire() {
    let backend = SyntheticBackend::phone();
    let camera = new_camera(&backend);

    camera.open().await.unwrap();
    camera.pause().await;
    camera.request_resolution(ResolutionRequest::Default).await.unwrap();
    camera.request_camera(CameraRequest::Default).await.unwrap();
    camera.open().await.unwrap();
    assert_eq!(backend.acquisitions(), 1);

    // Changed, then changed back before resuming
    camera.pause().await;
    camera
        .request_camera(CameraPreset::Front.into())
        .await
        .unwrap();
    camera.request_camera(CameraRequest::Default).await.unwrap();
    camera.open().await.unwrap();
    assert_eq!(backend.acquisitions(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_changed_request_while_paused_reacquires_on_open() {
    let backend = SyntheticBackend::phone();
    let camera = new_camera(&backend);

    camera.open().await.unwrap();
    camera.pause().await;
    camera
        .request_camera(CameraPreset::Front.into())
        .await
        .unwrap();
    assert_eq!(camera.status(), CameraStatus::Paused);
    assert_eq!(backend.acquisitions(), 1);

    camera.open().await.unwrap();
    assert_eq!(backend.acquisitions(), 2);
    assert_eq!(camera.current_camera().unwrap().id, "front-0");
    assert_eq!(backend.live_tracks(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_request_while_opened_reopens() {
    let backend = SyntheticBackend::phone();
    let camera = new_camera(&backend);
    let mut events = camera.subscribe();

    camera.open().await.unwrap();
    let first = backend.last_track().unwrap();

    camera
        .request_camera(CameraPreset::MacroBack.into())
        .await
        .unwrap();
    assert_eq!(camera.status(), CameraStatus::Opened);
    assert_eq!(camera.current_camera().unwrap().id, "back-macro");
    assert!(first.is_stopped());

    camera
        .request_resolution(ResolutionRequest::Pair(1280, 720))
        .await
        .unwrap();
    assert_eq!(camera.current_resolution(), Some((1280, 720)));
    assert_eq!(
        camera.requested_resolution(),
        ResolutionRequest::Pair(1280, 720)
    );

    let events = drain(&mut events);
    assert_eq!(count(&events, "opened"), 3);
    assert_eq!(count(&events, "closed"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_request_while_opening_retargets() {
    let backend = SyntheticBackend::phone();
    let camera = new_camera(&backend);

    let opener = camera.clone();
    let open = tokio::spawn(async move { opener.open().await });
    sleep(Duration::from_millis(1)).await;

    camera
        .request_camera(CameraPreset::Front.into())
        .await
        .unwrap();
    assert!(open.await.unwrap().is_ok());

    assert_eq!(camera.current_camera().unwrap().id, "front-0");
    assert_eq!(backend.acquisitions(), 2);
    assert_eq!(backend.live_tracks(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_open_errors_leave_camera_closed() {
    let denied = SyntheticBackend::phone().with_permission_denied();
    let camera = new_camera(&denied);
    assert!(matches!(
        camera.open().await,
        Err(CameraError::PermissionDenied { .. })
    ));
    assert_eq!(camera.status(), CameraStatus::Closed);

    let empty = SyntheticBackend::new(Vec::new());
    let camera = new_camera(&empty);
    assert!(matches!(
        camera.open().await,
        Err(CameraError::DeviceUnavailable { .. })
    ));
    assert_eq!(camera.status(), CameraStatus::Closed);

    let backend = SyntheticBackend::phone();
    let camera = new_camera(&backend);
    camera
        .request_resolution(ResolutionRequest::Constraints {
            width: Some(4096),
            height: Some(2160),
            aspect_ratio: None,
            exact: true,
        })
        .await
        .unwrap();
    assert!(matches!(
        camera.open().await,
        Err(CameraError::ConstraintUnsatisfiable { .. })
    ));
    assert_eq!(camera.status(), CameraStatus::Closed);

    assert!(camera
        .request_resolution(ResolutionRequest::Pair(0, 0))
        .await
        .is_err());
}

#[tokio::test(start_paused = true)]
async fn test_first_frame_retries_not_ready_frames() {
    let backend = SyntheticBackend::phone().with_not_ready_frames(3);
    let camera = new_camera(&backend);
    camera.open().await.unwrap();
    assert_eq!(camera.status(), CameraStatus::Opened);
}

#[tokio::test(start_paused = true)]
async fn test_region_box_golden_fixture() {
    let backend = SyntheticBackend::phone();
    let mut config = test_config();
    config.display.width = 800.0;
    config.display.height = 600.0;
    config.display.object_fit = FitMode::Contain;
    let camera = camera_with(&backend, config);

    camera
        .request_resolution(ResolutionRequest::Pair(1920, 1080))
        .await
        .unwrap();
    camera.open().await.unwrap();
    camera
        .set_region_box(RegionBox::new(0.5, 0.5, RegionUnit::ViewMin))
        .unwrap();

    assert_eq!(
        camera.visible_area_in_video(true, true).unwrap(),
        Rect::new(600.0, 180.0, 720.0, 720.0)
    );
    assert_eq!(
        camera.visible_area_in_video(false, true).unwrap(),
        Rect::new(0.0, 0.0, 1920.0, 1080.0)
    );
}

#[tokio::test(start_paused = true)]
async fn test_view_setters() {
    let backend = SyntheticBackend::phone();
    let camera = new_camera(&backend);

    assert!(matches!(
        camera.visible_area_in_video(false, true),
        Err(CameraError::NotOpened)
    ));
    assert!(camera
        .set_region_box(RegionBox::new(2.0, 0.5, RegionUnit::ViewSize))
        .is_err());
    assert!(camera
        .set_display_surface(DisplaySurface::new(f64::NAN, 10.0))
        .is_err());

    camera.set_mirrored(true).unwrap();
    camera.set_object_fit(FitMode::Cover);
    assert!(camera.is_mirrored());
    assert_eq!(camera.object_fit(), FitMode::Cover);

    camera.dispose().await;
    assert!(camera.set_mirrored(false).is_err());
}

#[tokio::test(start_paused = true)]
async fn test_page_points_round_trip() {
    let backend = SyntheticBackend::phone();
    let camera = new_camera(&backend);
    let mut surface = DisplaySurface::new(500.0, 400.0);
    surface.left = 20.0;
    surface.top = 30.0;
    surface.scroll_y = 100.0;
    camera.set_display_surface(surface).unwrap();
    camera.set_object_fit(FitMode::Cover);
    camera.open().await.unwrap();

    let points = [Point::new(0.0, 0.0), Point::new(320.0, 240.0), Point::new(600.0, 50.0)];
    let absolute = camera.video_xy_to_absolute(&points).unwrap();
    let fixed = camera.video_xy_to_fixed(&points).unwrap();
    assert_eq!(absolute[1].top - fixed[1].top, 100.0);

    for (original, back) in points
        .iter()
        .zip(camera.absolute_to_video_xy(&absolute).unwrap())
    {
        assert!((original.x - back.x).abs() < 1.0);
        assert!((original.y - back.y).abs() < 1.0);
    }
    for (original, back) in points.iter().zip(camera.fixed_to_video_xy(&fixed).unwrap()) {
        assert!((original.x - back.x).abs() < 1.0);
        assert!((original.y - back.y).abs() < 1.0);
    }
}

#[tokio::test(start_paused = true)]
async fn test_physical_points_follow_device_pixel_ratio() {
    let backend = SyntheticBackend::phone();
    let camera = new_camera(&backend);
    let mut surface = DisplaySurface::new(500.0, 400.0);
    surface.device_pixel_ratio = 2.5;
    camera.set_display_surface(surface).unwrap();
    camera.open().await.unwrap();
    assert_eq!(camera.physical_display_size(), (1250, 1000));

    let points = [Point::new(0.0, 0.0), Point::new(320.0, 240.0)];
    let fixed = camera.video_xy_to_fixed(&points).unwrap();
    let physical = camera.video_xy_to_physical(&points).unwrap();
    for (f, p) in fixed.iter().zip(&physical) {
        assert!((f.left * 2.5 - p.x).abs() < 1e-6);
        assert!((f.top * 2.5 - p.y).abs() < 1e-6);
    }

    for (original, back) in points
        .iter()
        .zip(camera.physical_to_video_xy(&physical).unwrap())
    {
        assert!((original.x - back.x).abs() < 1e-6);
        assert!((original.y - back.y).abs() < 1e-6);
    }

    let mut surface = DisplaySurface::new(500.0, 400.0);
    surface.device_pixel_ratio = 0.0;
    assert!(camera.set_display_surface(surface).is_err());
}

#[tokio::test(start_paused = true)]
async fn test_get_frame_crops_rounded_region() {
    let backend = SyntheticBackend::phone();
    let camera = new_camera(&backend);
    assert!(matches!(camera.get_frame(None), Err(CameraError::NotOpened)));

    camera.open().await.unwrap();
    let full = camera.get_frame(None).unwrap();
    assert_eq!(full.dimensions(), (640, 480));

    let crop = camera
        .get_frame(Some(Rect::new(10.4, 10.6, 100.0, 50.0)))
        .unwrap();
    assert_eq!(crop.dimensions(), (100, 50));

    let clipped = camera
        .get_frame(Some(Rect::new(600.0, 400.0, 100.0, 100.0)))
        .unwrap();
    assert_eq!(clipped.dimensions(), (40, 80));
}

#[tokio::test(start_paused = true)]
async fn test_hardware_zoom_clamps_to_range() {
    let backend = SyntheticBackend::phone();
    let camera = new_camera(&backend);
    assert!(matches!(camera.set_zoom(2.0).await, Err(CameraError::NotOpened)));

    camera.open().await.unwrap();
    assert_eq!(camera.zoom_range(), Some(CapabilityRange::new(1.0, 4.0)));

    assert_eq!(camera.set_zoom(10.0).await.unwrap(), 4.0);
    assert_eq!(backend.last_track().unwrap().settings().zoom, Some(4.0));
    assert_eq!(camera.set_zoom(0.5).await.unwrap(), 1.0);

    camera
        .request_camera(CameraPreset::Front.into())
        .await
        .unwrap();
    assert!(camera.zoom_range().is_none());
    assert!(matches!(
        camera.set_zoom(2.0).await,
        Err(CameraError::UnsupportedCapability { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn test_zoom_and_torch_reapplied_after_reopen() {
    let backend = SyntheticBackend::phone();
    let camera = new_camera(&backend);

    camera.open().await.unwrap();
    camera.set_zoom(2.5).await.unwrap();
    camera.turn_on_torch().await.unwrap();
    camera.close().await;
    camera.open().await.unwrap();

    let track = backend.last_track().unwrap();
    let applied = track.applied();
    assert!(applied.contains(&ConstraintUpdate::Zoom(2.5)));
    assert!(applied.contains(&ConstraintUpdate::Torch(true)));
    assert!(track.settings().torch);
    assert_eq!(camera.is_torch_on(), Some(true));
}

#[tokio::test(start_paused = true)]
async fn test_soft_zoom_limits() {
    let backend = SyntheticBackend::phone();
    let camera = new_camera(&backend);

    let soft = camera
        .set_soft_zoom(2.0, Some(Point::new(0.5, -0.5)), true)
        .unwrap();
    assert_eq!(soft.center, Point::new(0.25, -0.25));
    assert!(matches!(
        camera.set_soft_zoom(0.5, None, false),
        Err(CameraError::InvalidArgument { .. })
    ));
    assert_eq!(camera.set_soft_zoom(0.5, None, true).unwrap().zoom, 1.0);
}

#[tokio::test(start_paused = true)]
async fn test_wheel_zoom_is_soft_without_hardware_zoom() {
    let backend = SyntheticBackend::phone();
    let camera = new_camera(&backend);
    camera
        .request_camera(CameraPreset::Front.into())
        .await
        .unwrap();
    camera.open().await.unwrap();
    let mut events = camera.subscribe();

    let zoom = camera.handle_wheel(-100.0).await.unwrap().unwrap();
    assert!((zoom - 0.2_f64.exp()).abs() < 1e-9);
    assert!((camera.soft_zoom().zoom - zoom).abs() < 1e-9);

    // Throttled
    assert_eq!(camera.handle_wheel(-100.0).await.unwrap(), None);

    sleep(Duration::from_millis(60)).await;
    assert!(camera.handle_wheel(100.0).await.unwrap().is_some());

    let events = drain(&mut events);
    assert_eq!(events.len(), 2);
    assert!(matches!(
        events[0],
        CameraEvent::Zoom {
            hardware_zoom: None,
            ..
        }
    ));

    camera.set_wheel_zoom(false);
    sleep(Duration::from_millis(60)).await;
    assert_eq!(camera.handle_wheel(-100.0).await.unwrap(), None);
}

#[tokio::test(start_paused = true)]
async fn test_pinch_drives_hardware_zoom() {
    let backend = SyntheticBackend::phone();
    let camera = new_camera(&backend);
    camera.open().await.unwrap();
    let mut events = camera.subscribe();

    let start = TouchInput::start(vec![TouchPoint::new(1, 0.0, 0.0), TouchPoint::new(2, 100.0, 0.0)]);
    assert_eq!(camera.handle_touch(&start).await.unwrap(), None);

    let spread = TouchInput::moved(vec![TouchPoint::new(2, 200.0, 0.0)]);
    let zoom = camera.handle_touch(&spread).await.unwrap().unwrap();
    assert!((zoom - 2.0).abs() < 1e-9);
    assert_eq!(camera.hardware_zoom(), Some(zoom));

    let events = drain(&mut events);
    assert!(matches!(
        events.as_slice(),
        [CameraEvent::Zoom { hardware_zoom: Some(z), .. }] if (*z - 2.0).abs() < 1e-9
    ));

    camera.set_gesture_zoom(false);
    let pinch = TouchInput::moved(vec![TouchPoint::new(2, 400.0, 0.0)]);
    assert_eq!(camera.handle_touch(&pinch).await.unwrap(), None);
}

#[tokio::test(start_paused = true)]
async fn test_manual_torch() {
    let backend = SyntheticBackend::phone();
    let camera = new_camera(&backend);
    assert!(matches!(camera.turn_on_torch().await, Err(CameraError::NotOpened)));

    camera.open().await.unwrap();
    assert!(camera.is_torch_supported());
    camera.turn_on_torch().await.unwrap();
    assert_eq!(camera.is_torch_on(), Some(true));
    assert!(backend.last_track().unwrap().settings().torch);

    camera.turn_off_torch().await.unwrap();
    assert_eq!(camera.is_torch_on(), Some(false));

    camera
        .request_camera(CameraPreset::Front.into())
        .await
        .unwrap();
    assert!(matches!(
        camera.turn_on_torch().await,
        Err(CameraError::UnsupportedCapability { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn test_auto_torch_fires_once_in_the_dark() {
    let backend = SyntheticBackend::phone();
    backend.set_brightness(10);
    let camera = new_camera(&backend);
    camera.open().await.unwrap();
    let mut events = camera.subscribe();

    camera.turn_auto_torch().await.unwrap();
    camera.turn_auto_torch().await.unwrap();
    assert_eq!(camera.torch_mode(), TorchMode::Auto);
    assert_eq!(camera.is_torch_on(), None);

    sleep(Duration::from_secs(20)).await;

    let events = drain(&mut events);
    assert_eq!(count(&events, "torch_auto_on"), 1);
    assert!(backend.last_track().unwrap().settings().torch);
    assert_eq!(camera.is_torch_on(), None);
}

#[tokio::test(start_paused = true)]
async fn test_auto_torch_slows_down_while_frames_fail() {
    let backend = SyntheticBackend::phone();
    backend.set_brightness(10);
    let camera = new_camera(&backend);
    camera.open().await.unwrap();
    let mut events = camera.subscribe();

    backend.last_track().unwrap().drop_frames(15);
    camera.turn_auto_torch().await.unwrap();

    // Ten failures at the short delay, then the long one until frames return
    sleep(Duration::from_secs(25)).await;
    assert_eq!(count(&drain(&mut events), "torch_auto_on"), 0);
    assert!(!backend.last_track().unwrap().settings().torch);

    sleep(Duration::from_secs(35)).await;
    assert_eq!(count(&drain(&mut events), "torch_auto_on"), 1);
    assert!(backend.last_track().unwrap().settings().torch);
    assert_eq!(camera.torch_mode(), TorchMode::Auto);
}

#[tokio::test(start_paused = true)]
async fn test_turning_torch_off_while_auto_lights_it_wins() {
    let backend = SyntheticBackend::phone().with_torch_warmup(Duration::from_secs(2));
    backend.set_brightness(10);
    let camera = new_camera(&backend);
    camera.open().await.unwrap();
    let mut events = camera.subscribe();
    let track = backend.last_track().unwrap();

    camera.turn_auto_torch().await.unwrap();
    for _ in 0..100 {
        if track.is_warming_up() {
            break;
        }
        sleep(Duration::from_millis(100)).await;
    }
    assert!(track.is_warming_up());

    camera.turn_off_torch().await.unwrap();
    sleep(Duration::from_secs(5)).await;

    assert!(!track.is_warming_up());
    assert!(!track.settings().torch);
    assert_eq!(track.applied().last(), Some(&ConstraintUpdate::Torch(false)));
    assert_eq!(camera.torch_mode(), TorchMode::Off);
    assert_eq!(camera.is_torch_on(), Some(false));
    assert_eq!(count(&drain(&mut events), "torch_auto_on"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_failed_torch_change_keeps_previous_mode() {
    let backend = SyntheticBackend::phone();
    let camera = new_camera(&backend);
    camera.open().await.unwrap();
    camera.turn_on_torch().await.unwrap();

    backend.last_track().unwrap().stop().await;
    assert!(matches!(camera.turn_off_torch().await, Err(CameraError::NotOpened)));
    assert_eq!(camera.torch_mode(), TorchMode::On);
    assert_eq!(camera.is_torch_on(), Some(true));
}

#[tokio::test(start_paused = true)]
async fn test_auto_torch_stays_off_in_a_bright_scene() {
    let backend = SyntheticBackend::phone();
    let camera = new_camera(&backend);
    camera.open().await.unwrap();
    let mut events = camera.subscribe();

    camera.turn_auto_torch().await.unwrap();
    sleep(Duration::from_secs(20)).await;

    assert_eq!(count(&drain(&mut events), "torch_auto_on"), 0);
    assert!(!backend.last_track().unwrap().settings().torch);

    // An explicit call takes over from the loop
    camera.turn_on_torch().await.unwrap();
    assert_eq!(camera.is_torch_on(), Some(true));
}

#[tokio::test(start_paused = true)]
async fn test_advanced_tap_to_focus_finds_the_peak() {
    let backend = SyntheticBackend::phone().with_focus_peak(0.4);
    let mut config = test_config();
    config.focus.tap_to_focus = FocusStrategy::Advanced;
    let camera = camera_with(&backend, config);
    camera.open().await.unwrap();
    let mut events = camera.subscribe();

    assert!(camera.tap_to_focus(Point::new(320.0, 240.0)).await.unwrap());
    assert!(!camera.is_focusing());

    let distance = camera.last_focus_distance().unwrap();
    assert!((distance / 0.4).ln().abs() < 1.1_f64.ln(), "settled at {}", distance);

    let events = drain(&mut events);
    assert!(matches!(
        events.as_slice(),
        [CameraEvent::FocusCompleted {
            strategy: FocusStrategy::Advanced,
            distance: Some(_)
        }]
    ));

    // Reverts to continuous after the configured delay
    sleep(Duration::from_secs(6)).await;
    assert_eq!(
        backend.last_track().unwrap().settings().focus_mode,
        Some(FocusMode::Continuous)
    );
}

#[tokio::test(start_paused = true)]
async fn test_advanced_focus_needs_manual_focus() {
    let backend = SyntheticBackend::phone();
    let mut config = test_config();
    config.focus.tap_to_focus = FocusStrategy::Advanced;
    let camera = camera_with(&backend, config);
    camera
        .request_camera(CameraPreset::Front.into())
        .await
        .unwrap();
    camera.open().await.unwrap();

    assert!(matches!(
        camera.tap_to_focus(Point::new(10.0, 10.0)).await,
        Err(CameraError::UnsupportedCapability { .. })
    ));
    assert!(!camera.is_focusing());
}

#[tokio::test(start_paused = true)]
async fn test_simple_focus_reverts_to_continuous() {
    let backend = SyntheticBackend::phone();
    let camera = new_camera(&backend);
    camera.open().await.unwrap();

    assert!(!camera.tap_to_focus(Point::new(10.0, 10.0)).await.unwrap());

    camera.set_tap_to_focus(FocusStrategy::Simple);
    assert!(camera.tap_to_focus(Point::new(10.0, 10.0)).await.unwrap());
    let track = backend.last_track().unwrap();
    assert_eq!(track.settings().focus_mode, Some(FocusMode::SingleShot));

    sleep(Duration::from_millis(1500)).await;
    assert_eq!(
        track.applied().last(),
        Some(&ConstraintUpdate::FocusMode(FocusMode::Continuous))
    );
}

#[tokio::test(start_paused = true)]
async fn test_close_when_hidden_reopens_on_visible() {
    let backend = SyntheticBackend::phone();
    let camera = new_camera(&backend);
    camera.open().await.unwrap();

    // Disabled: visibility changes are ignored
    camera.handle_visibility_change(false).await.unwrap();
    assert_eq!(camera.status(), CameraStatus::Opened);

    camera.set_close_when_hidden(true);
    camera.handle_visibility_change(false).await.unwrap();
    assert_eq!(camera.status(), CameraStatus::Closed);

    camera.handle_visibility_change(true).await.unwrap();
    assert_eq!(camera.status(), CameraStatus::Opened);
    assert_eq!(backend.acquisitions(), 2);

    // A closed camera stays closed across a hide/show cycle
    camera.close().await;
    camera.handle_visibility_change(false).await.unwrap();
    camera.handle_visibility_change(true).await.unwrap();
    assert_eq!(camera.status(), CameraStatus::Closed);
}

#[tokio::test(start_paused = true)]
async fn test_close_when_hidden_restores_paused_state() {
    let backend = SyntheticBackend::phone();
    let camera = new_camera(&backend);
    camera.open().await.unwrap();
    camera.pause().await;
    assert_eq!(camera.status(), CameraStatus::Paused);

    camera.set_close_when_hidden(true);
    camera.handle_visibility_change(false).await.unwrap();
    assert_eq!(camera.status(), CameraStatus::Closed);

    camera.handle_visibility_change(true).await.unwrap();
    assert_eq!(camera.status(), CameraStatus::Paused);
    assert!(camera.current_camera().is_some());
    assert!(!backend.last_track().unwrap().is_enabled());
    assert_eq!(backend.acquisitions(), 2);
    assert_eq!(backend.live_tracks(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_device_queries() {
    let backend = SyntheticBackend::phone();
    let camera = new_camera(&backend);

    assert!(camera.has_camera().await.unwrap());
    assert!(camera.has_macro_camera().await.unwrap());
    assert_eq!(camera.device_infos().await.unwrap().len(), 3);
    assert_eq!(camera.requested_camera(), CameraRequest::Default);
}

#[tokio::test(start_paused = true)]
async fn test_customized_video_labels_from_config() {
    let backend = SyntheticBackend::phone();
    let mut config = test_config();
    config.camera.customized_video_labels = vec!["macro".to_string()];
    let camera = camera_with(&backend, config);

    camera
        .request_camera(CameraPreset::CustomizedVideo.into())
        .await
        .unwrap();
    camera.open().await.unwrap();
    assert_eq!(camera.current_camera().unwrap().id, "back-macro");
}

#[tokio::test(start_paused = true)]
async fn test_dispose_stops_everything() {
    let backend = SyntheticBackend::phone();
    backend.set_brightness(10);
    let camera = new_camera(&backend);
    camera.open().await.unwrap();
    camera.turn_auto_torch().await.unwrap();

    camera.dispose().await;
    assert!(camera.is_disposed());
    assert_eq!(camera.status(), CameraStatus::Closed);
    assert_eq!(backend.live_tracks(), 0);
    assert!(matches!(
        camera.open().await,
        Err(CameraError::Superseded { .. })
    ));

    sleep(Duration::from_secs(10)).await;
    assert!(!backend.last_track().unwrap().settings().torch);
}
