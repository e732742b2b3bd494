mod fit;
mod region;
mod transform;

pub use fit::{FitLayout, FitMode};
pub use region::{RegionBox, RegionUnit};
pub use transform::{DisplaySurface, PagePoint, Point, Rect, VideoTransform};
