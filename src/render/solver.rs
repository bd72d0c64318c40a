use tracing::{debug, info, warn};

use super::measure::TextMeasurer;
use super::truncate::smart_truncate;
use super::{FontSpec, RenderConfig};
use crate::settings::Settings;

const FALLBACK_MAX_CHARS: usize = 300;
const FALLBACK_IMAGE_RATIO: f32 = 0.25;
const FONT_STEP: u32 = 2;
pub(crate) const TITLE_LINE_SPACING: f32 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutStrategy {
    pub image_area_ratio: f32,
    pub max_body_chars: usize,
    pub starting_font_size: u32,
}

impl LayoutStrategy {
    const fn new(image_area_ratio: f32, max_body_chars: usize, starting_font_size: u32) -> Self {
        Self {
            image_area_ratio,
            max_body_chars,
            starting_font_size,
        }
    }
}

/// Size bounds and spacing the solver works within.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverLimits {
    pub min_body_font: u32,
    pub max_body_font: u32,
    pub min_image_height: u32,
    pub max_image_height: u32,
    pub image_gap: u32,
    pub line_spacing: u32,
}

impl SolverLimits {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            min_body_font: settings.min_body_font,
            max_body_font: settings.max_body_font,
            min_image_height: settings.min_image_height,
            max_image_height: settings.max_image_height,
            image_gap: settings.image_gap,
            line_spacing: settings.line_spacing,
        }
    }
}

impl Default for SolverLimits {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

/// Ordered candidate strategies for a body of `body_chars` characters.
/// Short bodies try large images first; the long tail is always appended.
pub fn strategies_for(body_chars: usize, max_body_font: u32) -> Vec<LayoutStrategy> {
    let max = max_body_font;
    let lower = max.saturating_sub(4);
    let mut strategies = Vec::with_capacity(10);

    if body_chars < 200 {
        strategies.extend([
            LayoutStrategy::new(0.72, 400, max),
            LayoutStrategy::new(0.65, 300, max),
            LayoutStrategy::new(0.58, 250, max),
        ]);
    }

    if body_chars < 500 {
        strategies.extend([
            LayoutStrategy::new(0.50, 450, max),
            LayoutStrategy::new(0.45, 500, lower),
        ]);
    }

    strategies.extend([
        LayoutStrategy::new(0.42, 800, max),
        LayoutStrategy::new(0.38, 700, lower),
        LayoutStrategy::new(0.35, 600, max),
        LayoutStrategy::new(0.32, 500, max),
        LayoutStrategy::new(0.30, 400, max),
    ]);
    strategies
}

pub struct LayoutSolver<'a, M: TextMeasurer + ?Sized> {
    measurer: &'a M,
    limits: SolverLimits,
}

impl<'a, M: TextMeasurer + ?Sized> LayoutSolver<'a, M> {
    pub fn new(measurer: &'a M, limits: SolverLimits) -> Self {
        Self { measurer, limits }
    }

    /// Returns the first strategy and font size whose body fits, trying
    /// strategies in priority order and fonts from large to small. Falls back
    /// to a fixed configuration when nothing fits; never fails.
    pub fn solve(
        &self,
        body_text: &str,
        has_image: bool,
        remaining_height: f32,
        max_width: f32,
    ) -> RenderConfig {
        let source_chars = body_text.chars().count();
        let limits = &self.limits;

        for strategy in strategies_for(source_chars, limits.max_body_font) {
            let text = smart_truncate(body_text, strategy.max_body_chars);
            let (image_height, gap) = if has_image {
                (
                    self.image_height_for(remaining_height, strategy.image_area_ratio),
                    limits.image_gap,
                )
            } else {
                (0, 0)
            };
            let body_space = remaining_height - image_height as f32 - gap as f32;

            let start = strategy
                .starting_font_size
                .clamp(limits.min_body_font, limits.max_body_font);
            let mut font_size = start;
            loop {
                let height = self.measurer.wrapped_height(
                    &text,
                    FontSpec::regular(font_size),
                    max_width,
                    limits.line_spacing as f32,
                );
                if height <= body_space {
                    let truncated = text.chars().count() < source_chars;
                    debug!(
                        "layout fit: ratio={} chars={} font={} height={:.0}/{:.0}",
                        strategy.image_area_ratio,
                        strategy.max_body_chars,
                        font_size,
                        height,
                        body_space
                    );
                    return RenderConfig {
                        body_text: text,
                        truncated,
                        body_font_size: font_size,
                        image_height_px: image_height,
                        image_area_ratio: strategy.image_area_ratio,
                    };
                }
                if font_size < limits.min_body_font + FONT_STEP {
                    break;
                }
                font_size -= FONT_STEP;
            }
        }

        warn!(
            "no layout strategy fits {:.0}px; using fallback configuration",
            remaining_height
        );
        let text = smart_truncate(body_text, FALLBACK_MAX_CHARS);
        RenderConfig {
            truncated: text.chars().count() < source_chars,
            body_text: text,
            body_font_size: limits.min_body_font,
            image_height_px: if has_image { limits.min_image_height } else { 0 },
            image_area_ratio: FALLBACK_IMAGE_RATIO,
        }
    }

    fn image_height_for(&self, remaining_height: f32, ratio: f32) -> u32 {
        let scaled = (remaining_height * ratio).max(0.0) as u32;
        scaled.clamp(self.limits.min_image_height, self.limits.max_image_height)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TitleLayout {
    pub font_size: u32,
    pub lines: Vec<String>,
    pub height: f32,
}

/// Shrinks the bold title in 2px steps until it fits `max_height`, stopping
/// at `min_size` even if it still overflows.
pub fn fit_title<M: TextMeasurer + ?Sized>(
    measurer: &M,
    title: &str,
    start_size: u32,
    min_size: u32,
    max_width: f32,
    max_height: f32,
) -> TitleLayout {
    let mut font_size = start_size.max(min_size);
    loop {
        let font = FontSpec::bold(font_size);
        let lines = measurer.wrap(title, font, max_width);
        let height = measurer.measure(&lines, font, TITLE_LINE_SPACING).height;
        if height <= max_height || font_size <= min_size {
            if height > max_height {
                info!("title overflows at floor size {}px", font_size);
            }
            return TitleLayout {
                font_size,
                lines,
                height,
            };
        }
        font_size = font_size.saturating_sub(FONT_STEP).max(min_size);
    }
}
