use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tap-to-focus strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FocusStrategy {
    #[default]
    Off,
    /// Single focus command, then back to continuous
    Simple,
    /// Contrast hill-climb over the focus distance
    Advanced,
}

impl std::str::FromStr for FocusStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "off" => Ok(FocusStrategy::Off),
            "simple" => Ok(FocusStrategy::Simple),
            "advanced" => Ok(FocusStrategy::Advanced),
            other => Err(format!("unknown focus strategy '{}'", other)),
        }
    }
}

/// Tuning of the contrast search. Durations are in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvancedFocusParameters {
    #[serde(default = "default_min_focus_distance_limit")]
    pub min_focus_distance_limit: f64,
    #[serde(default = "default_max_focus_distance_limit")]
    pub max_focus_distance_limit: f64,
    #[serde(default = "default_first_step_wait")]
    pub first_step_wait_ms: u64,
    #[serde(default = "default_coarse_step_wait")]
    pub coarse_step_wait_ms: u64,
    #[serde(default = "default_switch_step_wait")]
    pub switch_step_wait_ms: u64,
    #[serde(default = "default_fine_step_wait")]
    pub fine_step_wait_ms: u64,
    #[serde(default = "default_max_step_count")]
    pub max_step_count: u32,
    /// Negative means never go back to continuous focus
    #[serde(default = "default_back_to_continuous")]
    pub back_to_continuous_ms: i64,
    /// Focus window side as a fraction of min(video width, video height)
    #[serde(default = "default_focus_wh")]
    pub focus_wh: f64,
    /// Far to near multiplier, `0..1`; closer to 1 is finer and slower
    #[serde(default = "default_coarse_tune_rate")]
    pub coarse_tune_rate: f64,
    /// `0..1`; closer to 1 stops on smaller contrast drops
    #[serde(default = "default_coarse_tune_tolerance")]
    pub coarse_tune_tolerance: f64,
    /// Near to far multiplier, slightly above 1
    #[serde(default = "default_fine_tune_rate")]
    pub fine_tune_rate: f64,
}

impl Default for AdvancedFocusParameters {
    fn default() -> Self {
        Self {
            min_focus_distance_limit: default_min_focus_distance_limit(),
            max_focus_distance_limit: default_max_focus_distance_limit(),
            first_step_wait_ms: default_first_step_wait(),
            coarse_step_wait_ms: default_coarse_step_wait(),
            switch_step_wait_ms: default_switch_step_wait(),
            fine_step_wait_ms: default_fine_step_wait(),
            max_step_count: default_max_step_count(),
            back_to_continuous_ms: default_back_to_continuous(),
            focus_wh: default_focus_wh(),
            coarse_tune_rate: default_coarse_tune_rate(),
            coarse_tune_tolerance: default_coarse_tune_tolerance(),
            fine_tune_rate: default_fine_tune_rate(),
        }
    }
}

impl AdvancedFocusParameters {
    pub fn validate(&self) -> Result<(), String> {
        if !(self.min_focus_distance_limit > 0.0) {
            return Err("min_focus_distance_limit must be greater than 0".to_string());
        }
        if self.max_focus_distance_limit <= self.min_focus_distance_limit {
            return Err(
                "max_focus_distance_limit must be greater than min_focus_distance_limit".to_string(),
            );
        }
        if !(self.coarse_tune_rate > 0.0 && self.coarse_tune_rate < 1.0) {
            return Err("coarse_tune_rate must be within (0, 1)".to_string());
        }
        if !(self.coarse_tune_tolerance > 0.0 && self.coarse_tune_tolerance <= 1.0) {
            return Err("coarse_tune_tolerance must be within (0, 1]".to_string());
        }
        if !(self.fine_tune_rate > 1.0) {
            return Err("fine_tune_rate must be greater than 1".to_string());
        }
        if !(self.focus_wh > 0.0 && self.focus_wh <= 1.0) {
            return Err("focus_wh must be within (0, 1]".to_string());
        }
        if self.max_step_count == 0 {
            return Err("max_step_count must be greater than 0".to_string());
        }
        Ok(())
    }

    pub fn first_step_wait(&self) -> Duration {
        Duration::from_millis(self.first_step_wait_ms)
    }

    pub fn coarse_step_wait(&self) -> Duration {
        Duration::from_millis(self.coarse_step_wait_ms)
    }

    pub fn fine_step_wait(&self) -> Duration {
        Duration::from_millis(self.fine_step_wait_ms)
    }

    pub fn switch_step_wait(&self) -> Duration {
        Duration::from_millis(self.switch_step_wait_ms)
    }

    /// `None` when the focus should stay manual
    pub fn back_to_continuous(&self) -> Option<Duration> {
        u64::try_from(self.back_to_continuous_ms)
            .ok()
            .map(Duration::from_millis)
    }
}

fn default_min_focus_distance_limit() -> f64 {
    0.05
}
fn default_max_focus_distance_limit() -> f64 {
    3.0
}
fn default_first_step_wait() -> u64 {
    300
}
fn default_coarse_step_wait() -> u64 {
    100
}
fn default_switch_step_wait() -> u64 {
    100
}
fn default_fine_step_wait() -> u64 {
    100
}
fn default_max_step_count() -> u32 {
    20
}
fn default_back_to_continuous() -> i64 {
    5000
}
fn default_focus_wh() -> f64 {
    0.2
}
fn default_coarse_tune_rate() -> f64 {
    0.7
}
fn default_coarse_tune_tolerance() -> f64 {
    0.6
}
fn default_fine_tune_rate() -> f64 {
    1.05
}
