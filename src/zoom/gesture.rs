use crate::geometry::Point;
use std::time::Duration;
use tokio::time::Instant;
use tracing::trace;

/// Touch event phases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TouchPhase {
    Start,
    Move,
    End,
    Cancel,
}

/// One contact in display coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TouchPoint {
    pub id: i64,
    pub x: f64,
    pub y: f64,
}

impl TouchPoint {
    pub fn new(id: i64, x: f64, y: f64) -> Self {
        Self { id, x, y }
    }
}

/// A touch event with the contacts that changed in it
#[derive(Debug, Clone)]
pub struct TouchInput {
    pub phase: TouchPhase,
    pub changed: Vec<TouchPoint>,
    pub timestamp: Instant,
}

impl TouchInput {
    pub fn start(changed: Vec<TouchPoint>) -> Self {
        Self {
            phase: TouchPhase::Start,
            changed,
            timestamp: Instant::now(),
        }
    }

    pub fn moved(changed: Vec<TouchPoint>) -> Self {
        Self {
            phase: TouchPhase::Move,
            changed,
            timestamp: Instant::now(),
        }
    }

    pub fn end(ids: &[i64]) -> Self {
        Self {
            phase: TouchPhase::End,
            changed: ids.iter().map(|&id| TouchPoint::new(id, 0.0, 0.0)).collect(),
            timestamp: Instant::now(),
        }
    }
}

/// Tracks contacts by identifier and turns two-finger moves into zoom ratios
#[derive(Debug, Default)]
pub struct PinchTracker {
    /// Contacts in arrival order, most recent last
    contacts: Vec<(i64, Point)>,
}

impl PinchTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contact_count(&self) -> usize {
        self.contacts.len()
    }

    fn upsert(&mut self, touch: &TouchPoint) {
        self.contacts.retain(|(id, _)| *id != touch.id);
        self.contacts.push((touch.id, Point::new(touch.x, touch.y)));
    }

    fn position(&self, id: i64) -> Option<Point> {
        self.contacts.iter().find(|(cid, _)| *cid == id).map(|(_, p)| *p)
    }

    fn pair_distance(&self, a: i64, b: i64) -> Option<f64> {
        let pa = self.position(a)?;
        let pb = self.position(b)?;
        Some(((pa.x - pb.x).powi(2) + (pa.y - pb.y).powi(2)).sqrt())
    }

    /// Feed a touch event; returns the zoom ratio when a pinch moved
    pub fn handle(&mut self, input: &TouchInput) -> Option<f64> {
        match input.phase {
            TouchPhase::Start => {
                for touch in &input.changed {
                    self.upsert(touch);
                }
                None
            }
            TouchPhase::End | TouchPhase::Cancel => {
                self.contacts
                    .retain(|(id, _)| !input.changed.iter().any(|t| t.id == *id));
                None
            }
            TouchPhase::Move => {
                if self.contacts.len() < 2 {
                    for touch in &input.changed {
                        self.upsert(touch);
                    }
                    return None;
                }

                let n = self.contacts.len();
                let (a, b) = (self.contacts[n - 2].0, self.contacts[n - 1].0);
                let before = self.pair_distance(a, b)?;

                for touch in &input.changed {
                    match self.contacts.iter_mut().find(|(id, _)| *id == touch.id) {
                        Some((_, p)) => *p = Point::new(touch.x, touch.y),
                        None => self.contacts.push((touch.id, Point::new(touch.x, touch.y))),
                    }
                }

                let after = self.pair_distance(a, b)?;
                if before < f64::EPSILON || (after - before).abs() < f64::EPSILON {
                    return None;
                }

                let ratio = after / before;
                trace!("Pinch {} -> {} (ratio {:.3})", before, after, ratio);
                Some(ratio)
            }
        }
    }
}

/// Drops wheel events arriving faster than the minimum interval
#[derive(Debug)]
pub struct WheelThrottle {
    min_interval: Duration,
    last_accepted: Option<Instant>,
}

impl WheelThrottle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_accepted: None,
        }
    }

    pub fn set_min_interval(&mut self, min_interval: Duration) {
        self.min_interval = min_interval;
    }

    pub fn accept(&mut self, now: Instant) -> bool {
        let accepted = match self.last_accepted {
            Some(last) => now.saturating_duration_since(last) >= self.min_interval,
            None => true,
        };
        if accepted {
            self.last_accepted = Some(now);
        }
        accepted
    }
}

/// Multiplicative zoom change for a scroll delta; scrolling up zooms in
pub fn wheel_zoom_factor(delta_y: f64, sensitivity: f64) -> f64 {
    (-delta_y * sensitivity).exp()
}
