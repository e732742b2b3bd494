use serde::{Deserialize, Serialize};

/// Which way the lens points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Facing {
    Front,
    Back,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FocusMode {
    Continuous,
    SingleShot,
    Manual,
}

/// Closed numeric capability range
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CapabilityRange {
    pub min: f64,
    pub max: f64,
}

impl CapabilityRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    pub fn midpoint(&self) -> f64 {
        (self.min + self.max) / 2.0
    }
}

/// What a device can do
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Capabilities {
    #[serde(default)]
    pub focus_modes: Vec<FocusMode>,
    #[serde(default)]
    pub focus_distance: Option<CapabilityRange>,
    #[serde(default)]
    pub zoom: Option<CapabilityRange>,
    #[serde(default)]
    pub torch: bool,
    /// Largest supported resolution
    #[serde(default)]
    pub max_width: u32,
    #[serde(default)]
    pub max_height: u32,
}

impl Capabilities {
    pub fn supports_focus_mode(&self, mode: FocusMode) -> bool {
        self.focus_modes.contains(&mode)
    }

    /// Whether the device can focus closer than `distance` meters
    pub fn focuses_closer_than(&self, distance: f64) -> bool {
        self.focus_distance
            .map(|range| range.min < distance)
            .unwrap_or(false)
    }
}

/// An enumerated capture device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub facing: Facing,
    #[serde(default)]
    pub capabilities: Capabilities,
}

impl DeviceDescriptor {
    pub fn new<I: Into<String>, L: Into<String>>(id: I, label: L, facing: Facing) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            facing,
            capabilities: Capabilities::default(),
        }
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Facing as declared, or guessed from the label
    pub fn effective_facing(&self) -> Facing {
        if self.facing != Facing::Unknown {
            return self.facing;
        }
        let label = self.label.to_lowercase();
        if label.contains("back") || label.contains("rear") || label.contains("environment") {
            Facing::Back
        } else if label.contains("front") || label.contains("user") {
            Facing::Front
        } else {
            Facing::Unknown
        }
    }
}
