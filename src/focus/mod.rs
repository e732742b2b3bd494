//! Contrast-driven focus: the sharpness metric, tuning parameters and the
//! staged hill-climb search.

mod contrast;
mod params;
mod search;

pub use contrast::image_contrast;
pub use params::{AdvancedFocusParameters, FocusStrategy};
pub use search::{ContrastSearch, FocusBounds, FocusOutcome, FocusLens};
