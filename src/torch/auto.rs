use image::GrayImage;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Torch tri-state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TorchMode {
    #[default]
    Off,
    On,
    /// Brightness sampling decides
    Auto,
}

/// Auto-torch sampling parameters. Delays are in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoTorchParameters {
    #[serde(default = "default_short_delay")]
    pub short_delay_ms: u64,
    #[serde(default = "default_long_delay")]
    pub long_delay_ms: u64,
    /// Consecutive bright cycles before switching to the long delay
    #[serde(default = "default_short_long_delay_switch_count")]
    pub short_long_delay_switch_count: u32,
    /// Consecutive sampling failures tolerated before the loop degrades
    #[serde(default = "default_max_error_count")]
    pub max_error_count: u32,
    /// Pixels darker than this count as dark
    #[serde(default = "default_gray_threshold")]
    pub gray_threshold: u8,
    /// Consecutive dark cycles before the torch turns on
    #[serde(default = "default_max_dark_count")]
    pub max_dark_count: u32,
    /// Fraction of dark pixels that makes a frame dark
    #[serde(default = "default_dark_fraction")]
    pub dark_fraction: f64,
    /// Longest side of the sampled thumbnail
    #[serde(default = "default_sample_size")]
    pub sample_size: u32,
}

impl Default for AutoTorchParameters {
    fn default() -> Self {
        Self {
            short_delay_ms: default_short_delay(),
            long_delay_ms: default_long_delay(),
            short_long_delay_switch_count: default_short_long_delay_switch_count(),
            max_error_count: default_max_error_count(),
            gray_threshold: default_gray_threshold(),
            max_dark_count: default_max_dark_count(),
            dark_fraction: default_dark_fraction(),
            sample_size: default_sample_size(),
        }
    }
}

impl AutoTorchParameters {
    pub fn validate(&self) -> Result<(), String> {
        if self.short_delay_ms == 0 || self.long_delay_ms < self.short_delay_ms {
            return Err("long_delay_ms must be at least short_delay_ms, both non-zero".to_string());
        }
        if self.max_dark_count == 0 {
            return Err("max_dark_count must be greater than 0".to_string());
        }
        if !(self.dark_fraction > 0.0 && self.dark_fraction <= 1.0) {
            return Err("dark_fraction must be within (0, 1]".to_string());
        }
        if self.sample_size == 0 {
            return Err("sample_size must be greater than 0".to_string());
        }
        Ok(())
    }

    pub fn short_delay(&self) -> Duration {
        Duration::from_millis(self.short_delay_ms)
    }

    pub fn long_delay(&self) -> Duration {
        Duration::from_millis(self.long_delay_ms)
    }
}

fn default_short_delay() -> u64 {
    1000
}
fn default_long_delay() -> u64 {
    3000
}
fn default_short_long_delay_switch_count() -> u32 {
    10
}
fn default_max_error_count() -> u32 {
    10
}
fn default_gray_threshold() -> u8 {
    50
}
fn default_max_dark_count() -> u32 {
    3
}
fn default_dark_fraction() -> f64 {
    0.8
}
fn default_sample_size() -> u32 {
    64
}

/// Proportion of pixels strictly below `threshold`
pub fn dark_fraction(gray: &GrayImage, threshold: u8) -> f64 {
    let total = gray.as_raw().len();
    if total == 0 {
        return 0.0;
    }
    let dark = gray.as_raw().iter().filter(|&&v| v < threshold).count();
    dark as f64 / total as f64
}

/// What the sampling loop does after a measurement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TorchVerdict {
    /// Sample again after the delay
    Wait(Duration),
    /// Scene judged dark; light the torch
    TurnOn,
}

/// Dark-cycle hysteresis and delay selection for the auto-torch loop
#[derive(Debug)]
pub struct DarknessTracker {
    params: AutoTorchParameters,
    dark_count: u32,
    bright_count: u32,
}

impl DarknessTracker {
    pub fn new(params: AutoTorchParameters) -> Self {
        Self {
            params,
            dark_count: 0,
            bright_count: 0,
        }
    }

    pub fn dark_count(&self) -> u32 {
        self.dark_count
    }

    /// Feed one measured dark fraction
    pub fn observe(&mut self, fraction: f64) -> TorchVerdict {
        if fraction >= self.params.dark_fraction {
            self.dark_count += 1;
            self.bright_count = 0;
            debug!(
                "Dark frame {}/{} ({:.0}% below {})",
                self.dark_count,
                self.params.max_dark_count,
                fraction * 100.0,
                self.params.gray_threshold
            );

            if self.dark_count >= self.params.max_dark_count {
                self.reset();
                return TorchVerdict::TurnOn;
            }
            return TorchVerdict::Wait(self.params.short_delay());
        }

        self.dark_count = 0;
        self.bright_count = self.bright_count.saturating_add(1);
        if self.bright_count >= self.params.short_long_delay_switch_count {
            TorchVerdict::Wait(self.params.long_delay())
        } else {
            TorchVerdict::Wait(self.params.short_delay())
        }
    }

    pub fn reset(&mut self) {
        self.dark_count = 0;
        self.bright_count = 0;
    }
}
