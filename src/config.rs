use crate::device::CameraPreset;
use crate::focus::{AdvancedFocusParameters, FocusStrategy};
use crate::frame::PixelFormat;
use crate::geometry::FitMode;
use crate::torch::AutoTorchParameters;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LivecamConfig {
    pub camera: CameraConfig,
    pub display: DisplayConfig,
    pub zoom: ZoomConfig,
    pub focus: FocusConfig,
    #[serde(default)]
    pub torch: TorchConfig,
    pub pipeline: PipelineConfig,
    pub events: EventsConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CameraConfig {
    /// Preset used when no camera is requested
    #[serde(default = "default_camera_preset")]
    pub default_preset: CameraPreset,

    /// Resolution used when no resolution is requested (width, height)
    #[serde(default = "default_camera_resolution")]
    pub resolution: (u32, u32),

    /// Close the device while the surface is hidden
    #[serde(default)]
    pub close_when_hidden: bool,

    /// Reopen attempts after the surface becomes visible again
    #[serde(default = "default_max_reopen_attempts")]
    pub max_reopen_attempts: u32,

    /// Not-ready frames tolerated while waiting for the first frame
    #[serde(default = "default_first_frame_retries")]
    pub first_frame_retries: u32,

    /// Base backoff between first-frame attempts
    #[serde(default = "default_first_frame_retry_ms")]
    pub first_frame_retry_ms: u64,

    /// Label keywords for the `customized-video` preset
    #[serde(default)]
    pub customized_video_labels: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct DisplayConfig {
    /// Display box width in CSS pixels
    #[serde(default = "default_display_width")]
    pub width: f64,

    /// Display box height in CSS pixels
    #[serde(default = "default_display_height")]
    pub height: f64,

    #[serde(default)]
    pub object_fit: FitMode,

    #[serde(default)]
    pub mirrored: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ZoomConfig {
    #[serde(default = "default_true")]
    pub gesture_zoom: bool,

    #[serde(default = "default_true")]
    pub wheel_zoom: bool,

    /// Upper bound of zoom reachable with the wheel alone
    #[serde(default = "default_max_zoom_for_wheel")]
    pub max_zoom_for_wheel: f64,

    /// Zoom factor per unit of scroll delta, applied as `exp(-delta * s)`
    #[serde(default = "default_wheel_sensitivity")]
    pub wheel_sensitivity: f64,

    /// Wheel events closer together than this are dropped
    #[serde(default = "default_wheel_min_interval_ms")]
    pub wheel_min_interval_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct FocusConfig {
    #[serde(default)]
    pub tap_to_focus: FocusStrategy,

    /// Delay before a simple focus reverts to continuous
    #[serde(default = "default_simple_settle_ms")]
    pub simple_settle_ms: u64,

    #[serde(default)]
    pub advanced: AdvancedFocusParameters,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub struct TorchConfig {
    #[serde(default)]
    pub auto: AutoTorchParameters,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Cached extractions younger than this are reused
    #[serde(default = "default_max_timeout_ms")]
    pub max_timeout_ms: u64,

    #[serde(default)]
    pub save_original_rgba: bool,

    #[serde(default = "default_pixel_format")]
    pub format: PixelFormat,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct EventsConfig {
    #[serde(default = "default_event_bus_capacity")]
    pub capacity: usize,

    #[serde(default)]
    pub debug_logging: bool,
}

impl LivecamConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("livecam.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            // Start with default values
            .set_default("camera.default_preset", default_camera_preset().to_string())?
            .set_default(
                "camera.resolution",
                vec![default_camera_resolution().0, default_camera_resolution().1],
            )?
            .set_default("camera.close_when_hidden", false)?
            .set_default("camera.max_reopen_attempts", default_max_reopen_attempts())?
            .set_default("camera.first_frame_retries", default_first_frame_retries())?
            .set_default(
                "camera.first_frame_retry_ms",
                default_first_frame_retry_ms(),
            )?
            .set_default("camera.customized_video_labels", Vec::<String>::new())?
            .set_default("display.width", default_display_width())?
            .set_default("display.height", default_display_height())?
            .set_default("display.object_fit", "contain")?
            .set_default("display.mirrored", false)?
            .set_default("zoom.gesture_zoom", true)?
            .set_default("zoom.wheel_zoom", true)?
            .set_default("zoom.max_zoom_for_wheel", default_max_zoom_for_wheel())?
            .set_default("zoom.wheel_sensitivity", default_wheel_sensitivity())?
            .set_default(
                "zoom.wheel_min_interval_ms",
                default_wheel_min_interval_ms(),
            )?
            .set_default("focus.tap_to_focus", "off")?
            .set_default("focus.simple_settle_ms", default_simple_settle_ms())?
            .set_default("pipeline.max_timeout_ms", default_max_timeout_ms())?
            .set_default("pipeline.save_original_rgba", false)?
            .set_default("pipeline.format", "gray")?
            .set_default(
                "events.capacity",
                default_event_bus_capacity() as i64,
            )?
            .set_default("events.debug_logging", false)?
            // Add configuration file (optional)
            .add_source(File::with_name(&path_str).required(false))
            // Add environment variables, e.g. LIVECAM__ZOOM__MAX_ZOOM_FOR_WHEEL
            .add_source(
                Environment::with_prefix("LIVECAM")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: LivecamConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.camera.resolution.0 == 0 || self.camera.resolution.1 == 0 {
            return Err(ConfigError::Message(
                "Camera resolution must be greater than 0".to_string(),
            ));
        }

        if !(self.display.width >= 0.0 && self.display.height >= 0.0) {
            return Err(ConfigError::Message(
                "Display size must not be negative".to_string(),
            ));
        }

        if !(self.zoom.max_zoom_for_wheel >= 1.0) {
            return Err(ConfigError::Message(
                "max_zoom_for_wheel must be at least 1".to_string(),
            ));
        }

        if !(self.zoom.wheel_sensitivity > 0.0) {
            return Err(ConfigError::Message(
                "wheel_sensitivity must be greater than 0".to_string(),
            ));
        }

        self.focus
            .advanced
            .validate()
            .map_err(|e| ConfigError::Message(format!("focus.advanced: {}", e)))?;

        self.torch
            .auto
            .validate()
            .map_err(|e| ConfigError::Message(format!("torch.auto: {}", e)))?;

        if self.events.capacity == 0 {
            return Err(ConfigError::Message(
                "Event bus capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl CameraConfig {
    pub fn first_frame_retry(&self) -> Duration {
        Duration::from_millis(self.first_frame_retry_ms)
    }
}

impl ZoomConfig {
    pub fn wheel_min_interval(&self) -> Duration {
        Duration::from_millis(self.wheel_min_interval_ms)
    }
}

impl FocusConfig {
    pub fn simple_settle(&self) -> Duration {
        Duration::from_millis(self.simple_settle_ms)
    }
}

impl PipelineConfig {
    pub fn max_timeout(&self) -> Duration {
        Duration::from_millis(self.max_timeout_ms)
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            default_preset: default_camera_preset(),
            resolution: default_camera_resolution(),
            close_when_hidden: false,
            max_reopen_attempts: default_max_reopen_attempts(),
            first_frame_retries: default_first_frame_retries(),
            first_frame_retry_ms: default_first_frame_retry_ms(),
            customized_video_labels: Vec::new(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            width: default_display_width(),
            height: default_display_height(),
            object_fit: FitMode::default(),
            mirrored: false,
        }
    }
}

impl Default for ZoomConfig {
    fn default() -> Self {
        Self {
            gesture_zoom: true,
            wheel_zoom: true,
            max_zoom_for_wheel: default_max_zoom_for_wheel(),
            wheel_sensitivity: default_wheel_sensitivity(),
            wheel_min_interval_ms: default_wheel_min_interval_ms(),
        }
    }
}

impl Default for FocusConfig {
    fn default() -> Self {
        Self {
            tap_to_focus: FocusStrategy::default(),
            simple_settle_ms: default_simple_settle_ms(),
            advanced: AdvancedFocusParameters::default(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_timeout_ms: default_max_timeout_ms(),
            save_original_rgba: false,
            format: default_pixel_format(),
        }
    }
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            capacity: default_event_bus_capacity(),
            debug_logging: false,
        }
    }
}

impl Default for LivecamConfig {
    fn default() -> Self {
        Self {
            camera: CameraConfig::default(),
            display: DisplayConfig::default(),
            zoom: ZoomConfig::default(),
            focus: FocusConfig::default(),
            torch: TorchConfig::default(),
            pipeline: PipelineConfig::default(),
            events: EventsConfig::default(),
        }
    }
}

// Default value functions
fn default_true() -> bool {
    true
}
fn default_camera_preset() -> CameraPreset {
    CameraPreset::Back
}
fn default_camera_resolution() -> (u32, u32) {
    (1280, 720)
}
fn default_max_reopen_attempts() -> u32 {
    3
}
fn default_first_frame_retries() -> u32 {
    10
}
fn default_first_frame_retry_ms() -> u64 {
    20
}
fn default_display_width() -> f64 {
    800.0
}
fn default_display_height() -> f64 {
    600.0
}
fn default_max_zoom_for_wheel() -> f64 {
    4.0
}
fn default_wheel_sensitivity() -> f64 {
    0.002
}
fn default_wheel_min_interval_ms() -> u64 {
    50
}
fn default_simple_settle_ms() -> u64 {
    1000
}
fn default_max_timeout_ms() -> u64 {
    100
}
fn default_pixel_format() -> PixelFormat {
    PixelFormat::Gray
}
fn default_event_bus_capacity() -> usize {
    100
}
