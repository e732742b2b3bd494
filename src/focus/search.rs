use super::params::AdvancedFocusParameters;
use crate::device::CapabilityRange;
use crate::error::CameraError;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Consecutive failed contrast samples tolerated per step
const MAX_SAMPLE_RETRIES: u32 = 3;

/// What the contrast search drives: a focus motor and a sharpness sensor
#[async_trait]
pub trait FocusLens: Send {
    /// Command a manual focus distance
    async fn set_distance(&mut self, distance: f64) -> Result<(), CameraError>;

    /// Let the lens settle before sampling
    async fn settle(&mut self, wait: Duration);

    /// Contrast of the focus window at the current distance
    async fn contrast(&mut self) -> Result<f64, CameraError>;

    /// A newer focus attempt took over; the search should stop
    fn is_superseded(&self) -> bool {
        false
    }
}

/// Searchable focus distance interval
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FocusBounds {
    pub near: f64,
    pub far: f64,
}

impl FocusBounds {
    /// Intersect the device range with the configured limits
    pub fn resolve(
        capability: Option<CapabilityRange>,
        params: &AdvancedFocusParameters,
    ) -> Result<Self, CameraError> {
        let range = capability.ok_or_else(|| CameraError::unsupported("focusDistance"))?;

        let near = range.min.max(params.min_focus_distance_limit);
        let far = range.max.min(params.max_focus_distance_limit);
        if !(near > 0.0) || near >= far {
            return Err(CameraError::unsupported(format!(
                "focusDistance range [{}, {}] leaves nothing to search",
                range.min, range.max
            )));
        }

        Ok(Self { near, far })
    }
}

/// Result of a completed search
#[derive(Debug, Clone, PartialEq)]
pub struct FocusOutcome {
    pub distance: f64,
    pub contrast: f64,
    pub coarse_steps: u32,
    pub fine_steps: u32,
}

/// Staged contrast hill-climb: coarse far→near, fine near→far around the
/// coarse best, then switch to the winner.
pub struct ContrastSearch<'a> {
    params: &'a AdvancedFocusParameters,
    bounds: FocusBounds,
}

impl<'a> ContrastSearch<'a> {
    pub fn new(params: &'a AdvancedFocusParameters, bounds: FocusBounds) -> Self {
        Self { params, bounds }
    }

    fn check<P: FocusLens + ?Sized>(lens: &P) -> Result<(), CameraError> {
        if lens.is_superseded() {
            return Err(CameraError::Superseded {
                details: "newer focus request".to_string(),
            });
        }
        Ok(())
    }

    async fn sample<P: FocusLens + ?Sized>(
        lens: &mut P,
        distance: f64,
        wait: Duration,
    ) -> Result<f64, CameraError> {
        lens.set_distance(distance).await?;
        lens.settle(wait).await;
        Self::check(lens)?;

        let mut failures = 0;
        loop {
            match lens.contrast().await {
                Ok(c) => {
                    trace!("Focus distance {:.4} contrast {:.5}", distance, c);
                    return Ok(c);
                }
                Err(e) if e.is_recoverable() && failures < MAX_SAMPLE_RETRIES => {
                    failures += 1;
                    debug!("Contrast sample failed ({}/{}): {}", failures, MAX_SAMPLE_RETRIES, e);
                    lens.settle(wait).await;
                    Self::check(lens)?;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Run the coarse and fine stages and return the sharpest distance found
    pub async fn search<P: FocusLens + ?Sized>(&self, lens: &mut P) -> Result<FocusOutcome, CameraError> {
        let p = self.params;
        let FocusBounds { near, far } = self.bounds;

        // Coarse: far to near
        let mut distance = far;
        let mut best_distance = far;
        let mut best = Self::sample(lens, distance, p.first_step_wait()).await?;
        let mut coarse_steps = 1;

        while coarse_steps < p.max_step_count && distance > near {
            distance = (distance * p.coarse_tune_rate).max(near);
            let c = Self::sample(lens, distance, p.coarse_step_wait()).await?;
            coarse_steps += 1;

            if c > best {
                best = c;
                best_distance = distance;
            } else if c < best * p.coarse_tune_tolerance {
                debug!(
                    "Coarse focus stopped at {:.4}: contrast {:.5} below {:.5}",
                    distance,
                    c,
                    best * p.coarse_tune_tolerance
                );
                break;
            }
        }
        if coarse_steps >= p.max_step_count {
            warn!("Coarse focus hit the step limit ({})", p.max_step_count);
        }

        // Fine: near to far, bracketing the coarse best by one coarse step
        let lo = (best_distance * p.coarse_tune_rate).max(near);
        let hi = (best_distance / p.coarse_tune_rate).min(far);
        let mut distance = lo;
        let mut fine_steps = 0;

        loop {
            let c = Self::sample(lens, distance, p.fine_step_wait()).await?;
            fine_steps += 1;
            if c > best {
                best = c;
                best_distance = distance;
            }
            if distance >= hi {
                break;
            }
            distance = (distance * p.fine_tune_rate).min(hi);
        }

        // Switch to the winner
        Self::check(lens)?;
        lens.set_distance(best_distance).await?;
        lens.settle(p.switch_step_wait()).await;

        debug!(
            "Focus search settled at {:.4} (contrast {:.5}, {} coarse + {} fine steps)",
            best_distance, best, coarse_steps, fine_steps
        );

        Ok(FocusOutcome {
            distance: best_distance,
            contrast: best,
            coarse_steps,
            fine_steps,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Lens with a log-normal sharpness curve peaking at `peak`
    struct SyntheticLens {
        peak: f64,
        sigma: f64,
        distance: f64,
        commands: Vec<f64>,
        waits: Vec<Duration>,
        failures_left: u32,
        superseded_after: Option<usize>,
    }

    impl SyntheticLens {
        fn new(peak: f64) -> Self {
            Self {
                peak,
                sigma: 0.5,
                distance: 0.0,
                commands: Vec::new(),
                waits: Vec::new(),
                failures_left: 0,
                superseded_after: None,
            }
        }
    }

    #[async_trait]
    impl FocusLens for SyntheticLens {
        async fn set_distance(&mut self, distance: f64) -> Result<(), CameraError> {
            self.distance = distance;
            self.commands.push(distance);
            Ok(())
        }

        async fn settle(&mut self, wait: Duration) {
            self.waits.push(wait);
        }

        async fn contrast(&mut self) -> Result<f64, CameraError> {
            if self.failures_left > 0 {
                self.failures_left -= 1;
                return Err(CameraError::transient("frame not ready"));
            }
            let l = (self.distance / self.peak).ln();
            Ok((-(l * l) / (2.0 * self.sigma * self.sigma)).exp())
        }

        fn is_superseded(&self) -> bool {
            self.superseded_after
                .map(|n| self.commands.len() >= n)
                .unwrap_or(false)
        }
    }

    fn bounds() -> FocusBounds {
        FocusBounds {
            near: 0.05,
            far: 3.0,
        }
    }

    #[tokio::test]
    async fn test_converges_within_one_fine_step() {
        let params = AdvancedFocusParameters::default();
        for peak in [0.06, 0.11, 0.37, 0.9, 1.7, 2.95] {
            let mut lens = SyntheticLens::new(peak);
            let outcome = ContrastSearch::new(&params, bounds())
                .search(&mut lens)
                .await
                .unwrap();

            let off = (outcome.distance / peak).ln().abs();
            assert!(
                off <= params.fine_tune_rate.ln() + 1e-9,
                "peak {} found {}",
                peak,
                outcome.distance
            );
            assert!(outcome.coarse_steps <= params.max_step_count);
            assert_eq!(*lens.commands.last().unwrap(), outcome.distance);
        }
    }

    #[tokio::test]
    async fn test_waits_follow_stage_parameters() {
        let params = AdvancedFocusParameters::default();
        let mut lens = SyntheticLens::new(0.5);
        ContrastSearch::new(&params, bounds())
            .search(&mut lens)
            .await
            .unwrap();

        assert_eq!(lens.waits[0], params.first_step_wait());
        assert_eq!(lens.waits[1], params.coarse_step_wait());
        assert_eq!(*lens.waits.last().unwrap(), params.switch_step_wait());
        assert!(lens.waits.contains(&params.fine_step_wait()));
    }

    #[tokio::test]
    async fn test_step_limit_bounds_coarse_stage() {
        let params = AdvancedFocusParameters {
            max_step_count: 3,
            ..AdvancedFocusParameters::default()
        };
        let mut lens = SyntheticLens::new(0.06);
        let outcome = ContrastSearch::new(&params, bounds())
            .search(&mut lens)
            .await
            .unwrap();

        assert_eq!(outcome.coarse_steps, 3);
        // Commands never leave the bounds
        assert!(lens.commands.iter().all(|&d| (0.05..=3.0).contains(&d)));
    }

    #[tokio::test]
    async fn test_transient_sample_failures_are_retried() {
        let params = AdvancedFocusParameters::default();
        let mut lens = SyntheticLens::new(0.37);
        lens.failures_left = 2;
        assert!(ContrastSearch::new(&params, bounds())
            .search(&mut lens)
            .await
            .is_ok());

        let mut lens = SyntheticLens::new(0.37);
        lens.failures_left = MAX_SAMPLE_RETRIES + 1;
        assert!(matches!(
            ContrastSearch::new(&params, bounds()).search(&mut lens).await,
            Err(CameraError::CaptureTransientFailure { .. })
        ));
    }

    #[tokio::test]
    async fn test_superseded_search_stops() {
        let params = AdvancedFocusParameters::default();
        let mut lens = SyntheticLens::new(0.37);
        lens.superseded_after = Some(2);

        let result = ContrastSearch::new(&params, bounds()).search(&mut lens).await;
        assert!(matches!(result, Err(CameraError::Superseded { .. })));
        assert_eq!(lens.commands.len(), 2);
    }

    #[test]
    fn test_bounds_resolution() {
        let params = AdvancedFocusParameters::default();
        let b = FocusBounds::resolve(Some(CapabilityRange::new(0.0, 10.0)), &params).unwrap();
        assert_eq!(b, FocusBounds { near: 0.05, far: 3.0 });

        assert!(matches!(
            FocusBounds::resolve(None, &params),
            Err(CameraError::UnsupportedCapability { .. })
        ));
        assert!(FocusBounds::resolve(Some(CapabilityRange::new(4.0, 10.0)), &params).is_err());
    }
}
