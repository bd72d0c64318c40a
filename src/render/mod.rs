mod compose;
mod font;
mod measure;
mod scene;
mod solver;
mod truncate;

pub use compose::{Compositor, Layout, RenderReport};
pub use font::{FontMetrics, FontProvider, ScaledFont, load_font_metrics};
pub use measure::{TextExtent, TextMeasurer};
pub use solver::{
    LayoutSolver, LayoutStrategy, SolverLimits, TitleLayout, fit_title, strategies_for,
};
pub use truncate::{ELLIPSIS, smart_truncate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FontWeight {
    Regular,
    Bold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FontSpec {
    pub size: u32,
    pub weight: FontWeight,
}

impl FontSpec {
    pub const fn regular(size: u32) -> Self {
        Self {
            size,
            weight: FontWeight::Regular,
        }
    }

    pub const fn bold(size: u32) -> Self {
        Self {
            size,
            weight: FontWeight::Bold,
        }
    }
}

/// Solver output; fully determines how the body region is painted.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderConfig {
    pub body_text: String,
    pub truncated: bool,
    pub body_font_size: u32,
    pub image_height_px: u32,
    pub image_area_ratio: f32,
}
