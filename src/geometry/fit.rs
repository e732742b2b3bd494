use serde::{Deserialize, Serialize};

/// Rule mapping raster space into the display box
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FitMode {
    /// Whole frame visible, letterboxed
    #[default]
    Contain,
    /// Box fully covered, frame edges cropped
    Cover,
    /// Frame stretched to the box on both axes
    Fill,
}

/// Scale and offset induced by a fit mode, before zoom or mirroring
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitLayout {
    pub scale_x: f64,
    pub scale_y: f64,
    pub offset_x: f64,
    pub offset_y: f64,
}

impl FitMode {
    /// Compute the raster→display layout. `None` when any side is zero.
    pub fn layout(
        &self,
        video_width: f64,
        video_height: f64,
        display_width: f64,
        display_height: f64,
    ) -> Option<FitLayout> {
        if video_width <= 0.0 || video_height <= 0.0 || display_width <= 0.0 || display_height <= 0.0
        {
            return None;
        }

        let sx = display_width / video_width;
        let sy = display_height / video_height;

        let (scale_x, scale_y) = match self {
            FitMode::Contain => {
                let s = sx.min(sy);
                (s, s)
            }
            FitMode::Cover => {
                let s = sx.max(sy);
                (s, s)
            }
            FitMode::Fill => (sx, sy),
        };

        Some(FitLayout {
            scale_x,
            scale_y,
            offset_x: (display_width - video_width * scale_x) / 2.0,
            offset_y: (display_height - video_height * scale_y) / 2.0,
        })
    }
}

impl std::str::FromStr for FitMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "contain" => Ok(FitMode::Contain),
            "cover" => Ok(FitMode::Cover),
            "fill" => Ok(FitMode::Fill),
            other => Err(format!("unknown fit mode '{}'", other)),
        }
    }
}
