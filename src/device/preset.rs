use super::types::{DeviceDescriptor, Facing, FocusMode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Semantic camera choice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CameraPreset {
    Back,
    Front,
    /// Back camera able to focus very close
    MacroBack,
    /// Back camera that is fast to open and focus
    QuickBack,
    /// Devices matched only by user supplied labels
    CustomizedVideo,
}

impl CameraPreset {
    pub const ALL: [CameraPreset; 5] = [
        CameraPreset::Back,
        CameraPreset::Front,
        CameraPreset::MacroBack,
        CameraPreset::QuickBack,
        CameraPreset::CustomizedVideo,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CameraPreset::Back => "back",
            CameraPreset::Front => "front",
            CameraPreset::MacroBack => "macro-back",
            CameraPreset::QuickBack => "quick-back",
            CameraPreset::CustomizedVideo => "customized-video",
        }
    }

    /// Facing to ask the platform for when no matcher hits
    pub fn facing_hint(&self) -> Option<Facing> {
        match self {
            CameraPreset::Front => Some(Facing::Front),
            CameraPreset::Back | CameraPreset::MacroBack | CameraPreset::QuickBack => {
                Some(Facing::Back)
            }
            CameraPreset::CustomizedVideo => None,
        }
    }

    /// Strict presets never fall back to a facing hint
    pub fn is_strict(&self) -> bool {
        matches!(self, CameraPreset::CustomizedVideo)
    }
}

impl std::fmt::Display for CameraPreset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CameraPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CameraPreset::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| format!("unknown camera preset '{}'", s))
    }
}

/// One rule of a preset's ordered matcher list
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DeviceMatcher {
    /// Every keyword must appear in the label (case-insensitive)
    #[serde(default)]
    pub label_keywords: Vec<String>,
    #[serde(default)]
    pub facing: Option<Facing>,
    /// Device must focus closer than this many meters
    #[serde(default)]
    pub focus_closer_than: Option<f64>,
    #[serde(default)]
    pub focus_mode: Option<FocusMode>,
    #[serde(default)]
    pub requires_torch: bool,
}

impl DeviceMatcher {
    pub fn labels<S: AsRef<str>>(keywords: &[S]) -> Self {
        Self {
            label_keywords: keywords.iter().map(|k| k.as_ref().to_lowercase()).collect(),
            ..Self::default()
        }
    }

    pub fn facing(mut self, facing: Facing) -> Self {
        self.facing = Some(facing);
        self
    }

    pub fn focus_closer_than(mut self, distance: f64) -> Self {
        self.focus_closer_than = Some(distance);
        self
    }

    pub fn focus_mode(mut self, mode: FocusMode) -> Self {
        self.focus_mode = Some(mode);
        self
    }

    pub fn with_torch(mut self) -> Self {
        self.requires_torch = true;
        self
    }

    pub fn matches(&self, device: &DeviceDescriptor) -> bool {
        let label = device.label.to_lowercase();
        if !self
            .label_keywords
            .iter()
            .all(|k| label.contains(&k.to_lowercase()))
        {
            return false;
        }
        if let Some(facing) = self.facing {
            if device.effective_facing() != facing {
                return false;
            }
        }
        let caps = &device.capabilities;
        if let Some(distance) = self.focus_closer_than {
            if !caps.focuses_closer_than(distance) {
                return false;
            }
        }
        if let Some(mode) = self.focus_mode {
            if !caps.supports_focus_mode(mode) {
                return false;
            }
        }
        !self.requires_torch || caps.torch
    }
}

/// Ordered matcher lists per preset
#[derive(Debug, Clone, PartialEq)]
pub struct MatcherTable {
    entries: HashMap<CameraPreset, Vec<DeviceMatcher>>,
}

impl Default for MatcherTable {
    fn default() -> Self {
        let mut entries = HashMap::new();

        entries.insert(
            CameraPreset::Back,
            vec![
                DeviceMatcher::labels(&["camera2 0", "facing back"]),
                DeviceMatcher::labels(&["back", "triple"]),
                DeviceMatcher::labels(&["back", "dual"]),
                DeviceMatcher::default().facing(Facing::Back).with_torch(),
                DeviceMatcher::default().facing(Facing::Back),
            ],
        );
        entries.insert(
            CameraPreset::Front,
            vec![
                DeviceMatcher::labels(&["camera2 1", "facing front"]),
                DeviceMatcher::default().facing(Facing::Front),
            ],
        );
        entries.insert(
            CameraPreset::MacroBack,
            vec![
                DeviceMatcher::labels(&["macro"]).facing(Facing::Back),
                DeviceMatcher::default()
                    .facing(Facing::Back)
                    .focus_closer_than(0.1),
            ],
        );
        entries.insert(
            CameraPreset::QuickBack,
            vec![
                DeviceMatcher::labels(&["camera2 0", "facing back"]),
                DeviceMatcher::default()
                    .facing(Facing::Back)
                    .focus_mode(FocusMode::Continuous),
            ],
        );
        entries.insert(CameraPreset::CustomizedVideo, Vec::new());

        Self { entries }
    }
}

impl MatcherTable {
    /// Table without any matchers
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    pub fn matchers(&self, preset: CameraPreset) -> &[DeviceMatcher] {
        self.entries.get(&preset).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn set_matchers(&mut self, preset: CameraPreset, matchers: Vec<DeviceMatcher>) {
        self.entries.insert(preset, matchers);
    }

    /// First device satisfying the highest-priority matcher that hits
    pub fn select<'a>(
        &self,
        preset: CameraPreset,
        devices: &'a [DeviceDescriptor],
    ) -> Option<&'a DeviceDescriptor> {
        self.matchers(preset)
            .iter()
            .find_map(|matcher| devices.iter().find(|d| matcher.matches(d)))
    }
}
