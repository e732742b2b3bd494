use crate::capture::TrackConstraints;
use crate::device::{CameraPreset, DeviceCatalog, DeviceDescriptor};
use crate::error::CameraError;

/// Which camera to open
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CameraRequest {
    Preset(CameraPreset),
    DeviceId(String),
    Descriptor(DeviceDescriptor),
    Constraints(TrackConstraints),
    /// Let the platform choose
    NotRequired,
    /// The configured default preset
    #[default]
    Default,
}

impl CameraRequest {
    /// Turn the request into device constraints, consulting the catalog
    /// for presets
    pub async fn resolve(
        &self,
        catalog: &DeviceCatalog,
        default_preset: CameraPreset,
    ) -> Result<TrackConstraints, CameraError> {
        match self {
            CameraRequest::Preset(preset) => catalog.select_preset(*preset).await,
            CameraRequest::Default => catalog.select_preset(default_preset).await,
            CameraRequest::DeviceId(id) => Ok(TrackConstraints::device(id.clone())),
            CameraRequest::Descriptor(device) => Ok(TrackConstraints::device(device.id.clone())),
            CameraRequest::Constraints(constraints) => Ok(constraints.clone()),
            CameraRequest::NotRequired => Ok(TrackConstraints::default()),
        }
    }
}

impl From<CameraPreset> for CameraRequest {
    fn from(preset: CameraPreset) -> Self {
        CameraRequest::Preset(preset)
    }
}

/// Which resolution to ask for
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ResolutionRequest {
    Pair(u32, u32),
    Width {
        width: u32,
        height: Option<u32>,
    },
    Constraints {
        width: Option<u32>,
        height: Option<u32>,
        aspect_ratio: Option<f64>,
        exact: bool,
    },
    NotRequired,
    /// The configured default resolution
    #[default]
    Default,
}

impl ResolutionRequest {
    /// Resolution fields only; merged onto the device constraints
    pub fn to_constraints(&self, default: (u32, u32)) -> Result<TrackConstraints, CameraError> {
        let constraints = match self {
            ResolutionRequest::Pair(width, height) => TrackConstraints {
                width: Some(*width),
                height: Some(*height),
                ..TrackConstraints::default()
            },
            ResolutionRequest::Width { width, height } => TrackConstraints {
                width: Some(*width),
                height: *height,
                ..TrackConstraints::default()
            },
            ResolutionRequest::Constraints {
                width,
                height,
                aspect_ratio,
                exact,
            } => {
                if let Some(ratio) = aspect_ratio {
                    if !ratio.is_finite() || *ratio <= 0.0 {
                        return Err(CameraError::invalid(format!(
                            "aspect ratio {} must be positive",
                            ratio
                        )));
                    }
                }
                TrackConstraints {
                    width: *width,
                    height: *height,
                    aspect_ratio: *aspect_ratio,
                    exact: *exact,
                    ..TrackConstraints::default()
                }
            }
            ResolutionRequest::NotRequired => TrackConstraints::default(),
            ResolutionRequest::Default => TrackConstraints {
                width: Some(default.0),
                height: Some(default.1),
                ..TrackConstraints::default()
            },
        };

        if constraints.width == Some(0) || constraints.height == Some(0) {
            return Err(CameraError::invalid("requested resolution must be non-zero"));
        }
        Ok(constraints)
    }
}

impl From<(u32, u32)> for ResolutionRequest {
    fn from((width, height): (u32, u32)) -> Self {
        ResolutionRequest::Pair(width, height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::SyntheticBackend;
    use crate::device::Facing;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_camera_request_resolution() {
        let catalog = DeviceCatalog::new(Arc::new(SyntheticBackend::phone()));

        let constraints = CameraRequest::Default
            .resolve(&catalog, CameraPreset::Front)
            .await
            .unwrap();
        assert_eq!(constraints, TrackConstraints::device("front-0"));

        let constraints = CameraRequest::from(CameraPreset::MacroBack)
            .resolve(&catalog, CameraPreset::Back)
            .await
            .unwrap();
        assert_eq!(constraints, TrackConstraints::device("back-macro"));

        let descriptor = DeviceDescriptor::new("back-0", "whatever", Facing::Back);
        let constraints = CameraRequest::Descriptor(descriptor)
            .resolve(&catalog, CameraPreset::Back)
            .await
            .unwrap();
        assert_eq!(constraints.device_id.as_deref(), Some("back-0"));

        let constraints = CameraRequest::NotRequired
            .resolve(&catalog, CameraPreset::Back)
            .await
            .unwrap();
        assert_eq!(constraints, TrackConstraints::default());
    }

    #[test]
    fn test_resolution_request_constraints() {
        let c = ResolutionRequest::Default.to_constraints((1280, 720)).unwrap();
        assert_eq!((c.width, c.height), (Some(1280), Some(720)));

        let c = ResolutionRequest::Width {
            width: 640,
            height: None,
        }
        .to_constraints((1280, 720))
        .unwrap();
        assert_eq!((c.width, c.height), (Some(640), None));

        let c = ResolutionRequest::NotRequired.to_constraints((1280, 720)).unwrap();
        assert_eq!(c, TrackConstraints::default());

        assert!(ResolutionRequest::Pair(0, 480).to_constraints((1280, 720)).is_err());
        assert!(ResolutionRequest::Constraints {
            width: None,
            height: None,
            aspect_ratio: Some(-1.0),
            exact: false,
        }
        .to_constraints((1280, 720))
        .is_err());
    }
}
