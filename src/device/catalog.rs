use super::preset::{CameraPreset, DeviceMatcher, MatcherTable};
use super::types::DeviceDescriptor;
use crate::capture::{CaptureBackend, TrackConstraints};
use crate::error::CameraError;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Default)]
struct DeviceCache {
    /// Enumeration order
    order: Vec<String>,
    by_id: HashMap<String, DeviceDescriptor>,
}

impl DeviceCache {
    fn from_devices(devices: Vec<DeviceDescriptor>) -> Self {
        let order = devices.iter().map(|d| d.id.clone()).collect();
        let by_id = devices.into_iter().map(|d| (d.id.clone(), d)).collect();
        Self { order, by_id }
    }

    fn devices(&self) -> Vec<DeviceDescriptor> {
        self.order
            .iter()
            .filter_map(|id| self.by_id.get(id).cloned())
            .collect()
    }
}

/// Enumerates capture devices, caches them by id and maps presets onto them.
///
/// Constructed explicitly and shared by the cameras that use it.
pub struct DeviceCatalog {
    backend: Arc<dyn CaptureBackend>,
    cache: Mutex<Option<DeviceCache>>,
    matchers: RwLock<MatcherTable>,
}

impl DeviceCatalog {
    pub fn new(backend: Arc<dyn CaptureBackend>) -> Self {
        Self::with_matchers(backend, MatcherTable::default())
    }

    pub fn with_matchers(backend: Arc<dyn CaptureBackend>, matchers: MatcherTable) -> Self {
        Self {
            backend,
            cache: Mutex::new(None),
            matchers: RwLock::new(matchers),
        }
    }

    pub fn backend(&self) -> &Arc<dyn CaptureBackend> {
        &self.backend
    }

    /// Re-enumerate, replacing the cache
    pub async fn refresh(&self) -> Result<Vec<DeviceDescriptor>, CameraError> {
        let devices = self.backend.enumerate().await?;
        debug!("Enumerated {} capture devices", devices.len());
        *self.cache.lock() = Some(DeviceCache::from_devices(devices.clone()));
        Ok(devices)
    }

    /// Cached device list, enumerating on first use
    pub async fn devices(&self) -> Result<Vec<DeviceDescriptor>, CameraError> {
        let cached = self.cache.lock().as_ref().map(DeviceCache::devices);
        match cached {
            Some(devices) => Ok(devices),
            None => self.refresh().await,
        }
    }

    /// Cached descriptor by id
    pub fn cached(&self, id: &str) -> Option<DeviceDescriptor> {
        self.cache
            .lock()
            .as_ref()
            .and_then(|cache| cache.by_id.get(id).cloned())
    }

    /// Drop the cache; the next query re-enumerates
    pub fn invalidate(&self) {
        *self.cache.lock() = None;
    }

    pub async fn has_camera(&self) -> Result<bool, CameraError> {
        Ok(!self.devices().await?.is_empty())
    }

    pub async fn has_macro_camera(&self) -> Result<bool, CameraError> {
        let devices = self.devices().await?;
        Ok(self
            .matchers
            .read()
            .select(CameraPreset::MacroBack, &devices)
            .is_some())
    }

    pub fn set_matchers(&self, preset: CameraPreset, matchers: Vec<DeviceMatcher>) {
        self.matchers.write().set_matchers(preset, matchers);
    }

    /// Turn a preset into track constraints: the first matching device by
    /// id, or the preset's facing hint when nothing matches.
    pub async fn select_preset(&self, preset: CameraPreset) -> Result<TrackConstraints, CameraError> {
        let devices = self.devices().await?;
        if devices.is_empty() {
            return Err(CameraError::unavailable("no capture devices present"));
        }

        if let Some(device) = self.matchers.read().select(preset, &devices) {
            info!("Preset '{}' matched device '{}'", preset, device.label);
            return Ok(TrackConstraints::device(device.id.clone()));
        }

        match preset.facing_hint() {
            Some(facing) if !preset.is_strict() => {
                debug!("Preset '{}' matched no device, asking for {:?} facing", preset, facing);
                Ok(TrackConstraints::facing(facing))
            }
            _ => Err(CameraError::unavailable(format!(
                "no device matches preset '{}'",
                preset
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::SyntheticBackend;
    use crate::device::Facing;

    fn catalog(backend: &SyntheticBackend) -> DeviceCatalog {
        DeviceCatalog::new(Arc::new(backend.clone()))
    }

    #[tokio::test]
    async fn test_enumeration_is_cached_until_refresh() {
        let backend = SyntheticBackend::phone();
        let catalog = catalog(&backend);

        assert_eq!(catalog.devices().await.unwrap().len(), 3);
        assert_eq!(catalog.devices().await.unwrap().len(), 3);
        assert_eq!(backend.enumerations(), 1);
        assert_eq!(catalog.cached("back-0").unwrap().facing, Facing::Back);

        backend.set_devices(Vec::new());
        catalog.invalidate();
        assert!(!catalog.has_camera().await.unwrap());
        assert!(catalog.cached("back-0").is_none());
        assert_eq!(backend.enumerations(), 2);
    }

    #[tokio::test]
    async fn test_preset_selection() {
        let backend = SyntheticBackend::phone();
        let catalog = catalog(&backend);

        assert_eq!(
            catalog.select_preset(CameraPreset::Back).await.unwrap(),
            TrackConstraints::device("back-0")
        );
        assert_eq!(
            catalog.select_preset(CameraPreset::MacroBack).await.unwrap(),
            TrackConstraints::device("back-macro")
        );
        assert!(catalog.has_macro_camera().await.unwrap());
    }

    #[tokio::test]
    async fn test_fallback_and_strictness() {
        let backend = SyntheticBackend::new(vec![DeviceDescriptor::new(
            "usb",
            "USB Video",
            Facing::Unknown,
        )]);
        let catalog = catalog(&backend);

        assert_eq!(
            catalog.select_preset(CameraPreset::Front).await.unwrap(),
            TrackConstraints::facing(Facing::Front)
        );
        assert!(matches!(
            catalog.select_preset(CameraPreset::CustomizedVideo).await,
            Err(CameraError::DeviceUnavailable { .. })
        ));

        catalog.set_matchers(
            CameraPreset::CustomizedVideo,
            vec![DeviceMatcher::labels(&["usb"])],
        );
        assert_eq!(
            catalog.select_preset(CameraPreset::CustomizedVideo).await.unwrap(),
            TrackConstraints::device("usb")
        );
        assert!(!catalog.has_macro_camera().await.unwrap());
    }

    #[tokio::test]
    async fn test_no_devices() {
        let catalog = catalog(&SyntheticBackend::new(Vec::new()));
        assert!(matches!(
            catalog.select_preset(CameraPreset::Back).await,
            Err(CameraError::DeviceUnavailable { .. })
        ));
    }
}
