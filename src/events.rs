use crate::device::DeviceDescriptor;
use crate::error::EventBusError;
use crate::focus::FocusStrategy;
use crate::zoom::SoftZoom;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Events published by a camera
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CameraEvent {
    /// The camera entered `opened` from `closed`/`paused`, or reopened
    /// after a request change
    Opened {
        device: DeviceDescriptor,
        width: u32,
        height: u32,
    },
    /// Frame delivery paused, device still held
    Paused,
    /// Device released
    Closed,
    /// Zoom changed by a touch gesture or the mouse wheel
    Zoom {
        soft_zoom: SoftZoom,
        hardware_zoom: Option<f64>,
    },
    /// Auto-torch found the scene too dark and lit the torch
    TorchAutoOn,
    /// A tap-to-focus attempt finished
    FocusCompleted {
        strategy: FocusStrategy,
        distance: Option<f64>,
    },
}

impl CameraEvent {
    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            CameraEvent::Opened {
                device,
                width,
                height,
            } => format!("Camera '{}' opened at {}x{}", device.label, width, height),
            CameraEvent::Paused => "Camera paused".to_string(),
            CameraEvent::Closed => "Camera closed".to_string(),
            CameraEvent::Zoom {
                soft_zoom,
                hardware_zoom,
            } => match hardware_zoom {
                Some(z) => format!("Zoom {:.2} (hardware)", z),
                None => format!("Zoom {:.2} (soft)", soft_zoom.zoom),
            },
            CameraEvent::TorchAutoOn => "Torch turned on automatically".to_string(),
            CameraEvent::FocusCompleted { strategy, distance } => match distance {
                Some(d) => format!("Focus ({:?}) settled at {:.3}", strategy, d),
                None => format!("Focus ({:?}) completed", strategy),
            },
        }
    }

    /// Get the event type as a string for filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            CameraEvent::Opened { .. } => "opened",
            CameraEvent::Paused => "paused",
            CameraEvent::Closed => "closed",
            CameraEvent::Zoom { .. } => "zoom",
            CameraEvent::TorchAutoOn => "torch_auto_on",
            CameraEvent::FocusCompleted { .. } => "focus_completed",
        }
    }
}

/// Async event bus for camera listeners using broadcast channels
pub struct EventBus {
    sender: broadcast::Sender<CameraEvent>,
    debug_logging: bool,
}

impl EventBus {
    /// Create a new event bus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            debug_logging: false,
        }
    }

    /// Create a new event bus with debug logging enabled
    pub fn with_debug_logging(capacity: usize) -> Self {
        Self {
            debug_logging: true,
            ..Self::new(capacity)
        }
    }

    /// Subscribe to events and get a receiver
    pub fn subscribe(&self) -> broadcast::Receiver<CameraEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to all subscribers
    pub async fn publish(&self, event: CameraEvent) -> Result<usize, EventBusError> {
        // Log important events at appropriate levels
        match &event {
            CameraEvent::Opened { .. } | CameraEvent::Closed => {
                info!("{}", event.description());
            }
            CameraEvent::TorchAutoOn => {
                info!("Scene too dark, torch turned on");
            }
            _ => {
                if self.debug_logging {
                    debug!("Event: {}", event.description());
                }
            }
        }

        self.sender
            .send(event)
            .map_err(|e| EventBusError::PublishFailed {
                details: e.to_string(),
            })
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            debug_logging: self.debug_logging,
        }
    }
}

/// Event filter for selective event handling
#[derive(Debug, Clone)]
pub enum EventFilter {
    /// Accept all events
    All,
    /// Accept only specific event types
    EventTypes(Vec<&'static str>),
    /// Custom filter function
    Custom(fn(&CameraEvent) -> bool),
}

impl EventFilter {
    /// Check if an event passes this filter
    pub fn matches(&self, event: &CameraEvent) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::EventTypes(types) => types.contains(&event.event_type()),
            EventFilter::Custom(filter_fn) => filter_fn(event),
        }
    }
}

/// Event receiver with filtering
pub struct EventReceiver {
    receiver: broadcast::Receiver<CameraEvent>,
    filter: EventFilter,
    name: String,
}

impl EventReceiver {
    pub fn new(receiver: broadcast::Receiver<CameraEvent>, filter: EventFilter, name: String) -> Self {
        Self {
            receiver,
            filter,
            name,
        }
    }

    /// Receive the next filtered event
    pub async fn recv(&mut self) -> Result<CameraEvent, EventBusError> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        debug!("Receiver '{}' received event: {}", self.name, event.description());
                        return Ok(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Receiver '{}' lagged behind by {} events", self.name, n);
                    return Err(EventBusError::Lagged { skipped: n });
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed for receiver '{}'", self.name);
                    return Err(EventBusError::ChannelClosed);
                }
            }
        }
    }

    /// Try to receive an event without blocking
    pub fn try_recv(&mut self) -> Result<Option<CameraEvent>, EventBusError> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        return Ok(Some(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!("Receiver '{}' lagged behind by {} events", self.name, n);
                    return Err(EventBusError::Lagged { skipped: n });
                }
                Err(broadcast::error::TryRecvError::Closed) => {
                    return Err(EventBusError::ChannelClosed);
                }
            }
        }
    }
}
