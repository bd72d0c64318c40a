use anyhow::{Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, RgbImage, RgbaImage};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::font::FontProvider;
use super::measure::TextMeasurer;
use super::scene::{Scene, TextBlock};
use super::solver::{LayoutSolver, SolverLimits, TITLE_LINE_SPACING, TitleLayout, fit_title};
use super::{FontSpec, FontWeight, RenderConfig};
use crate::content::ContentRecord;
use crate::fetch::ImageFetcher;
use crate::settings::Settings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// Source image fills everything below the title.
    ImageOnly,
    /// Optional image block above body text sized by the solver.
    Mixed,
}

#[derive(Debug, Clone)]
pub struct RenderReport {
    pub path: PathBuf,
    pub layout: Layout,
    pub title_font_size: u32,
    pub image_height_px: u32,
    pub config: Option<RenderConfig>,
}

struct Composition {
    canvas: RgbImage,
    layout: Layout,
    title_font_size: u32,
    image_height_px: u32,
    config: Option<RenderConfig>,
}

/// Paints content records onto the fixed square canvas. Fonts and the
/// watermark are resolved once and only read afterwards, so one instance can
/// serve many renders on different threads.
pub struct Compositor {
    settings: Settings,
    fonts: FontProvider,
    watermark: Option<RgbaImage>,
}

impl Compositor {
    pub fn new(settings: Settings) -> Self {
        let fonts = FontProvider::new(&settings);
        let watermark = load_watermark(&settings);
        Self {
            settings,
            fonts,
            watermark,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn fonts(&self) -> &FontProvider {
        &self.fonts
    }

    pub fn has_watermark(&self) -> bool {
        self.watermark.is_some()
    }

    /// Resolves the record's source image, then composes and writes it.
    pub async fn render(
        &self,
        record: &ContentRecord,
        fetcher: &ImageFetcher,
        output_path: &Path,
    ) -> Result<RenderReport> {
        let image = match record.source_image_ref.as_deref() {
            Some(reference) => fetcher.fetch(reference).await,
            None => None,
        };
        self.compose(record, image.as_ref(), output_path)
    }

    pub fn compose(
        &self,
        record: &ContentRecord,
        image: Option<&RgbImage>,
        output_path: &Path,
    ) -> Result<RenderReport> {
        let composition = self.compose_canvas(record, image)?;
        let bytes = encode_jpeg(&composition.canvas, self.settings.jpeg_quality)?;
        if let Some(parent) = output_path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
        {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create output directory: {}", parent.display())
            })?;
        }
        fs::write(output_path, bytes)
            .with_context(|| format!("failed to write image: {}", output_path.display()))?;

        info!(
            "image saved: {} (layout={:?}, title={}px)",
            output_path.display(),
            composition.layout,
            composition.title_font_size
        );
        if let Some(config) = composition.config.as_ref() {
            info!("body font: {}px", config.body_font_size);
            if composition.image_height_px > 0 {
                info!(
                    "image height: {}px ({}% of space)",
                    composition.image_height_px,
                    (config.image_area_ratio * 100.0).round()
                );
            }
            if config.truncated {
                info!("text truncated to {} chars", config.body_text.chars().count());
            }
        }

        Ok(RenderReport {
            path: output_path.to_path_buf(),
            layout: composition.layout,
            title_font_size: composition.title_font_size,
            image_height_px: composition.image_height_px,
            config: composition.config,
        })
    }

    /// Composes the final canvas in memory.
    pub fn compose_image(
        &self,
        record: &ContentRecord,
        image: Option<&RgbImage>,
    ) -> Result<RgbImage> {
        Ok(self.compose_canvas(record, image)?.canvas)
    }

    fn compose_canvas(
        &self,
        record: &ContentRecord,
        image: Option<&RgbImage>,
    ) -> Result<Composition> {
        let s = &self.settings;
        let record = record.cleaned();
        let canvas_size = s.canvas_size;
        let max_width = s.content_width() as f32;
        let margin = s.margin as f32;
        let mut scene = Scene::new(canvas_size, canvas_size, &s.background_color);
        let mut y = s.content_top() as f32;

        if !record.category.is_empty() {
            y += self.draw_label(&mut scene, &record.category, y);
        }

        let title = fit_title(
            &self.fonts,
            &record.title,
            s.title_font_size,
            s.title_min_font_size,
            max_width,
            canvas_size as f32 * s.title_max_height_ratio,
        );
        self.draw_title(&mut scene, &title, y);
        y += title.height + s.title_gap as f32;

        let remaining_height = canvas_size as f32 - y - s.logo_reserve as f32;
        let image_only = image.is_some() && record.body.is_empty();

        let (mut canvas, layout, image_height_px, config) = if image_only {
            debug!("layout: image only ({:.0}px available)", remaining_height);
            let mut canvas = scene.rasterize(self.fonts.database())?;
            let mut pasted = 0;
            if let Some(source) = image.filter(|_| remaining_height >= 1.0) {
                pasted = remaining_height as u32;
                paste_centered(&mut canvas, source, pasted, y);
            }
            (canvas, Layout::ImageOnly, pasted, None)
        } else {
            let solver = LayoutSolver::new(&self.fonts, SolverLimits::from_settings(s));
            let config = solver.solve(&record.body, image.is_some(), remaining_height, max_width);
            let image_top = y;
            let mut pasted = 0;
            if image.is_some() && config.image_height_px > 0 {
                pasted = config.image_height_px;
                y += pasted as f32 + s.image_gap as f32;
            }

            let font = FontSpec::regular(config.body_font_size);
            let lines = self.fonts.wrap(&config.body_text, font, max_width);
            scene.push_block(TextBlock {
                lines: &lines,
                x: margin,
                top: y,
                font: self.fonts.drawn_spec(font),
                family: self.fonts.family(FontWeight::Regular),
                color: &s.text_color,
                ascent: self.fonts.ascent(font),
                line_pitch: self.fonts.line_height(font) + s.line_spacing as f32,
            });

            let mut canvas = scene.rasterize(self.fonts.database())?;
            if let Some(source) = image.filter(|_| pasted > 0) {
                paste_centered(&mut canvas, source, pasted, image_top);
            }
            (canvas, Layout::Mixed, pasted, Some(config))
        };

        self.apply_watermark(&mut canvas);

        Ok(Composition {
            canvas: DynamicImage::ImageRgba8(canvas).into_rgb8(),
            layout,
            title_font_size: title.font_size,
            image_height_px,
            config,
        })
    }

    /// Draws the category label and returns the vertical space it used.
    fn draw_label(&self, scene: &mut Scene, category: &str, top: f32) -> f32 {
        let s = &self.settings;
        let font = FontSpec::bold(s.label_font_size);
        let lines = vec![format!("{}{}", s.label_prefix, category)];
        scene.push_block(TextBlock {
            lines: &lines,
            x: s.margin as f32,
            top,
            font: self.fonts.drawn_spec(font),
            family: self.fonts.family(FontWeight::Bold),
            color: &s.label_color,
            ascent: self.fonts.ascent(font),
            line_pitch: self.fonts.line_height(font),
        });
        self.fonts.measure(&lines, font, 0.0).height + s.label_gap as f32
    }

    fn draw_title(&self, scene: &mut Scene, title: &TitleLayout, top: f32) {
        let font = FontSpec::bold(title.font_size);
        scene.push_block(TextBlock {
            lines: &title.lines,
            x: self.settings.margin as f32,
            top,
            font: self.fonts.drawn_spec(font),
            family: self.fonts.family(FontWeight::Bold),
            color: &self.settings.title_color,
            ascent: self.fonts.ascent(font),
            line_pitch: self.fonts.line_height(font) + TITLE_LINE_SPACING,
        });
    }

    fn apply_watermark(&self, canvas: &mut RgbaImage) {
        let Some(logo) = self.watermark.as_ref() else {
            return;
        };
        let padding = (canvas.width() as f32 * self.settings.watermark_padding_ratio) as i64;
        let x = canvas.width() as i64 - logo.width() as i64 - padding;
        let y = canvas.height() as i64 - logo.height() as i64 - padding;
        imageops::overlay(canvas, logo, x, y);
    }
}

/// Scales `source` to `target_height` keeping its aspect ratio, crops the
/// sides when it is wider than the canvas and centers it horizontally.
fn paste_centered(canvas: &mut RgbaImage, source: &RgbImage, target_height: u32, top: f32) {
    let (width, height) = source.dimensions();
    if width == 0 || height == 0 || target_height == 0 {
        return;
    }
    let scale = target_height as f64 / height as f64;
    let scaled_width = ((width as f64 * scale) as u32).max(1);
    let scaled = imageops::resize(source, scaled_width, target_height, FilterType::Lanczos3);
    let scaled = if scaled_width > canvas.width() {
        let offset = (scaled_width - canvas.width()) / 2;
        imageops::crop_imm(&scaled, offset, 0, canvas.width(), target_height).to_image()
    } else {
        scaled
    };
    let block = DynamicImage::ImageRgb8(scaled).into_rgba8();
    let x = (canvas.width() as i64 - block.width() as i64) / 2;
    imageops::overlay(canvas, &block, x, top as i64);
}

fn load_watermark(settings: &Settings) -> Option<RgbaImage> {
    let path = settings.watermark_path.as_deref().map(Path::new)?;
    if !path.exists() {
        debug!("watermark not found: {}", path.display());
        return None;
    }
    let logo = match image::open(path) {
        Ok(logo) => logo.into_rgba8(),
        Err(err) => {
            warn!("failed to load watermark {}: {}", path.display(), err);
            return None;
        }
    };
    if logo.width() == 0 || logo.height() == 0 {
        return None;
    }
    let target_width =
        ((settings.canvas_size as f32 * settings.watermark_width_ratio) as u32).max(1);
    let ratio = target_width as f32 / logo.width() as f32;
    let target_height = ((logo.height() as f32 * ratio) as u32).max(1);
    Some(imageops::resize(
        &logo,
        target_width,
        target_height,
        FilterType::Lanczos3,
    ))
}

fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, quality)
        .encode_image(image)
        .with_context(|| "failed to encode JPEG")?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, Rgba};
    use std::ops::Range;

    fn offline_settings() -> Settings {
        Settings {
            system_fonts: false,
            watermark_path: None,
            ..Settings::default()
        }
    }

    fn record(title: &str, body: &str) -> ContentRecord {
        ContentRecord {
            id: "t1".to_string(),
            title: title.to_string(),
            body: body.to_string(),
            category: "IndianFood".to_string(),
            source_image_ref: None,
        }
    }

    fn solid(width: u32, height: u32, color: [u8; 3]) -> RgbImage {
        RgbImage::from_pixel(width, height, Rgb(color))
    }

    fn near(actual: &[u8], expected: &[u8]) -> bool {
        actual
            .iter()
            .zip(expected)
            .all(|(a, b)| (*a as i16 - *b as i16).abs() <= 3)
    }

    fn lit_pixels(canvas: &RgbImage, rows: Range<u32>, cols: Range<u32>) -> usize {
        rows.flat_map(|y| cols.clone().map(move |x| (x, y)))
            .filter(|&(x, y)| canvas.get_pixel(x, y).0.iter().any(|channel| *channel > 96))
            .count()
    }

    #[test]
    fn label_title_and_body_are_drawn() {
        let compositor = Compositor::new(offline_settings());
        let canvas = compositor
            .compose_image(
                &record("Perfect biryani spot found!", "Best biryani ever. Must try!"),
                None,
            )
            .expect("compose");
        assert!(lit_pixels(&canvas, 60..105, 70..1010) > 200, "label");
        assert!(lit_pixels(&canvas, 115..165, 70..1010) > 200, "title");
        assert!(lit_pixels(&canvas, 190..250, 70..1010) > 200, "body");
        assert_eq!(lit_pixels(&canvas, 600..1080, 0..1080), 0);
        assert_eq!(lit_pixels(&canvas, 0..1080, 0..60), 0);
    }

    #[test]
    fn bold_title_wraps_inside_content_width() {
        let compositor = Compositor::new(offline_settings());
        let title = "Unbelievably authentic Hyderabadi biryani discovered at a tiny \
                     roadside stall downtown, worth every single minute of queueing";
        let canvas = compositor
            .compose_image(&record(title, ""), None)
            .expect("compose");
        assert!(lit_pixels(&canvas, 100..400, 70..1010) > 1000);
        assert_eq!(lit_pixels(&canvas, 0..1080, 1016..1080), 0);
    }

    #[test]
    fn paste_scales_and_centers() {
        let mut canvas = RgbaImage::from_pixel(1080, 1080, Rgba([0, 0, 0, 255]));
        paste_centered(&mut canvas, &solid(400, 200, [0, 255, 0]), 300, 100.0);
        // 600x300 block centered: x from 240 to 840.
        assert!(near(&canvas.get_pixel(540, 250).0, &[0, 255, 0, 255]));
        assert_eq!(canvas.get_pixel(200, 250).0, [0, 0, 0, 255]);
        assert_eq!(canvas.get_pixel(540, 90).0, [0, 0, 0, 255]);
        assert_eq!(canvas.get_pixel(540, 410).0, [0, 0, 0, 255]);
    }

    #[test]
    fn wide_images_are_cropped_to_canvas() {
        let mut canvas = RgbaImage::from_pixel(1080, 1080, Rgba([0, 0, 0, 255]));
        paste_centered(&mut canvas, &solid(3000, 300, [0, 0, 255]), 300, 0.0);
        assert!(near(&canvas.get_pixel(0, 150).0, &[0, 0, 255, 255]));
        assert!(near(&canvas.get_pixel(1079, 150).0, &[0, 0, 255, 255]));
    }

    #[test]
    fn image_only_layout_fills_remaining_height() {
        let compositor = Compositor::new(offline_settings());
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("slide.jpg");
        let source = solid(800, 600, [200, 30, 30]);

        let report = compositor
            .compose(&record("Short", ""), Some(&source), &path)
            .expect("compose");
        assert_eq!(report.layout, Layout::ImageOnly);
        assert!(report.config.is_none());
        assert!(report.image_height_px as f32 >= 1080.0 * 0.6);
        assert!(path.exists());
    }

    #[test]
    fn mixed_layout_reports_solver_config() {
        let compositor = Compositor::new(offline_settings());
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("mixed.jpg");
        let body = "Best biryani ever. Must try! ".repeat(5);
        let source = solid(800, 600, [30, 200, 30]);

        let report = compositor
            .compose(&record("Perfect biryani spot found!", &body), Some(&source), &path)
            .expect("compose");
        assert_eq!(report.layout, Layout::Mixed);
        let config = report.config.expect("config");
        assert!(config.image_area_ratio >= 0.58);
        assert_eq!(config.body_font_size, 42);
        assert!((280..=450).contains(&report.image_height_px));
    }

    #[test]
    fn canvas_is_always_square() {
        let compositor = Compositor::new(offline_settings());
        let long_title = "title ".repeat(120);
        let long_body = "word ".repeat(900);
        let cases = [
            record("", ""),
            record(&long_title, &long_body),
            record("Comment", "Just a short one."),
        ];
        for case in &cases {
            let canvas = compositor.compose_image(case, None).expect("compose");
            assert_eq!(canvas.dimensions(), (1080, 1080));
        }
        let tall = solid(10, 4000, [1, 2, 3]);
        let canvas = compositor
            .compose_image(&record(&long_title, ""), Some(&tall))
            .expect("compose");
        assert_eq!(canvas.dimensions(), (1080, 1080));
    }

    #[test]
    fn watermark_lands_in_bottom_right_corner() {
        let dir = tempfile::tempdir().expect("tempdir");
        let logo_path = dir.path().join("logo.png");
        RgbaImage::from_pixel(50, 25, Rgba([255, 255, 255, 255]))
            .save(&logo_path)
            .expect("save logo");
        let settings = Settings {
            watermark_path: Some(logo_path.to_string_lossy().to_string()),
            ..offline_settings()
        };
        let compositor = Compositor::new(settings);
        assert!(compositor.has_watermark());

        let canvas = compositor
            .compose_image(&record("", ""), None)
            .expect("compose");
        // 108x54 logo, 32px padding: spans x 940..1048, y 994..1048.
        assert!(near(&canvas.get_pixel(1000, 1020).0, &[255, 255, 255]));
        assert_eq!(canvas.get_pixel(1060, 1070).0, [0, 0, 0]);
    }

    #[test]
    fn unwritable_destination_is_an_error() {
        let compositor = Compositor::new(offline_settings());
        let dir = tempfile::tempdir().expect("tempdir");
        let blocker = dir.path().join("file");
        fs::write(&blocker, b"x").expect("write");
        let result = compositor.compose(&record("a", "b"), None, &blocker.join("out.jpg"));
        assert!(result.is_err());
    }
}
