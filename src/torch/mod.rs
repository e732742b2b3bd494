mod auto;

pub use auto::{dark_fraction, AutoTorchParameters, DarknessTracker, TorchMode, TorchVerdict};
