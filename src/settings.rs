use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub canvas_size: u32,
    pub margin: u32,
    pub logo_reserve: u32,
    pub background_color: String,
    pub text_color: String,
    pub title_color: String,
    pub label_color: String,
    pub label_prefix: String,
    pub label_font_size: u32,
    pub label_gap: u32,
    pub title_font_size: u32,
    pub title_min_font_size: u32,
    pub title_max_height_ratio: f32,
    pub title_gap: u32,
    pub line_spacing: u32,
    pub image_gap: u32,
    pub min_body_font: u32,
    pub max_body_font: u32,
    pub min_image_height: u32,
    pub max_image_height: u32,
    pub font_path: Option<String>,
    pub bold_font_path: Option<String>,
    pub system_fonts: bool,
    pub watermark_path: Option<String>,
    pub watermark_width_ratio: f32,
    pub watermark_padding_ratio: f32,
    pub jpeg_quality: u8,
    pub fetch_timeout_secs: u64,
    pub user_agent: String,
    pub output_dir: String,
    pub comment_min_chars: usize,
    pub comment_max_slides: usize,
    pub comment_title: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            canvas_size: 1080,
            margin: 70,
            logo_reserve: 80,
            background_color: "#000000".to_string(),
            text_color: "#ffffff".to_string(),
            title_color: "#ffc93c".to_string(),
            label_color: "#ff3e7e".to_string(),
            label_prefix: "r/".to_string(),
            label_font_size: 38,
            label_gap: 10,
            title_font_size: 45,
            title_min_font_size: 32,
            title_max_height_ratio: 0.25,
            title_gap: 20,
            line_spacing: 8,
            image_gap: 25,
            min_body_font: 24,
            max_body_font: 42,
            min_image_height: 280,
            max_image_height: 450,
            font_path: None,
            bold_font_path: None,
            system_fonts: true,
            watermark_path: Some("logo.png".to_string()),
            watermark_width_ratio: 0.10,
            watermark_padding_ratio: 0.03,
            jpeg_quality: 95,
            fetch_timeout_secs: 10,
            user_agent: "postframe/0.1".to_string(),
            output_dir: "out_images".to_string(),
            comment_min_chars: 25,
            comment_max_slides: 8,
            comment_title: "Comment".to_string(),
        }
    }
}

impl Settings {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs.max(1))
    }

    /// Horizontal room for text blocks between the side margins.
    pub fn content_width(&self) -> u32 {
        self.canvas_size.saturating_sub(self.margin * 2).max(1)
    }

    /// First line of content; the label sits slightly above the nominal margin.
    pub fn content_top(&self) -> u32 {
        self.margin.saturating_sub(10)
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    canvas: Option<CanvasSettings>,
    colors: Option<ColorSettings>,
    label: Option<LabelSettings>,
    title: Option<TitleSettings>,
    body: Option<BodySettings>,
    image: Option<ImageSettings>,
    fonts: Option<FontSettings>,
    watermark: Option<WatermarkSettings>,
    output: Option<OutputSettings>,
    fetch: Option<FetchSettings>,
    comments: Option<CommentSettings>,
}

#[derive(Debug, Default, Deserialize)]
struct CanvasSettings {
    size: Option<u32>,
    margin: Option<u32>,
    logo_reserve: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct ColorSettings {
    background: Option<String>,
    text: Option<String>,
    title: Option<String>,
    label: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LabelSettings {
    prefix: Option<String>,
    font_size: Option<u32>,
    gap: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct TitleSettings {
    font_size: Option<u32>,
    min_font_size: Option<u32>,
    max_height_ratio: Option<f32>,
    gap: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct BodySettings {
    min_font: Option<u32>,
    max_font: Option<u32>,
    line_spacing: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct ImageSettings {
    min_height: Option<u32>,
    max_height: Option<u32>,
    gap: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct FontSettings {
    path: Option<String>,
    bold_path: Option<String>,
    system_fallback: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct WatermarkSettings {
    path: Option<String>,
    width_ratio: Option<f32>,
    padding_ratio: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
struct OutputSettings {
    dir: Option<String>,
    jpeg_quality: Option<u8>,
}

#[derive(Debug, Default, Deserialize)]
struct FetchSettings {
    timeout_secs: Option<u64>,
    user_agent: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct CommentSettings {
    min_chars: Option<usize>,
    max_slides: Option<usize>,
    title: Option<String>,
}

pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::default();
    let embedded: SettingsFile = toml::from_str(DEFAULT_SETTINGS_TOML)
        .with_context(|| "failed to parse embedded settings")?;
    settings.merge(embedded);

    let mut ordered_paths = Vec::new();
    ordered_paths.push(PathBuf::from("settings.toml"));
    ordered_paths.push(PathBuf::from("settings.local.toml"));

    if let Some(home) = home_dir() {
        ordered_paths.push(home.join("settings.toml"));
    }

    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    for path in ordered_paths {
        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            let parsed: SettingsFile = toml::from_str(&content)
                .with_context(|| format!("failed to parse settings: {}", path.display()))?;
            settings.merge(parsed);
        }
    }

    Ok(settings)
}

impl Settings {
    fn merge(&mut self, incoming: SettingsFile) {
        if let Some(canvas) = incoming.canvas {
            merge_positive(&mut self.canvas_size, canvas.size);
            merge_positive(&mut self.margin, canvas.margin);
            if let Some(reserve) = canvas.logo_reserve {
                self.logo_reserve = reserve;
            }
        }
        if let Some(colors) = incoming.colors {
            merge_string(&mut self.background_color, colors.background);
            merge_string(&mut self.text_color, colors.text);
            merge_string(&mut self.title_color, colors.title);
            merge_string(&mut self.label_color, colors.label);
        }
        if let Some(label) = incoming.label {
            // An empty prefix is a valid choice here.
            if let Some(prefix) = label.prefix {
                self.label_prefix = prefix;
            }
            merge_positive(&mut self.label_font_size, label.font_size);
            if let Some(gap) = label.gap {
                self.label_gap = gap;
            }
        }
        if let Some(title) = incoming.title {
            merge_positive(&mut self.title_font_size, title.font_size);
            merge_positive(&mut self.title_min_font_size, title.min_font_size);
            if let Some(ratio) = title.max_height_ratio {
                if ratio > 0.0 && ratio <= 1.0 {
                    self.title_max_height_ratio = ratio;
                }
            }
            if let Some(gap) = title.gap {
                self.title_gap = gap;
            }
        }
        if let Some(body) = incoming.body {
            merge_positive(&mut self.min_body_font, body.min_font);
            merge_positive(&mut self.max_body_font, body.max_font);
            if let Some(spacing) = body.line_spacing {
                self.line_spacing = spacing;
            }
        }
        if let Some(image) = incoming.image {
            merge_positive(&mut self.min_image_height, image.min_height);
            merge_positive(&mut self.max_image_height, image.max_height);
            if let Some(gap) = image.gap {
                self.image_gap = gap;
            }
        }
        if let Some(fonts) = incoming.fonts {
            merge_optional_string(&mut self.font_path, fonts.path);
            merge_optional_string(&mut self.bold_font_path, fonts.bold_path);
            if let Some(system) = fonts.system_fallback {
                self.system_fonts = system;
            }
        }
        if let Some(watermark) = incoming.watermark {
            merge_optional_string(&mut self.watermark_path, watermark.path);
            if let Some(ratio) = watermark.width_ratio {
                if ratio > 0.0 && ratio <= 1.0 {
                    self.watermark_width_ratio = ratio;
                }
            }
            if let Some(ratio) = watermark.padding_ratio {
                if (0.0..0.5).contains(&ratio) {
                    self.watermark_padding_ratio = ratio;
                }
            }
        }
        if let Some(output) = incoming.output {
            merge_string(&mut self.output_dir, output.dir);
            if let Some(quality) = output.jpeg_quality {
                if (1..=100).contains(&quality) {
                    self.jpeg_quality = quality;
                }
            }
        }
        if let Some(fetch) = incoming.fetch {
            if let Some(timeout) = fetch.timeout_secs {
                if timeout > 0 {
                    self.fetch_timeout_secs = timeout;
                }
            }
            merge_string(&mut self.user_agent, fetch.user_agent);
        }
        if let Some(comments) = incoming.comments {
            if let Some(min) = comments.min_chars {
                self.comment_min_chars = min;
            }
            if let Some(max) = comments.max_slides {
                self.comment_max_slides = max;
            }
            merge_string(&mut self.comment_title, comments.title);
        }
        if self.min_body_font > self.max_body_font {
            std::mem::swap(&mut self.min_body_font, &mut self.max_body_font);
        }
        if self.min_image_height > self.max_image_height {
            std::mem::swap(&mut self.min_image_height, &mut self.max_image_height);
        }
    }
}

fn merge_positive(target: &mut u32, value: Option<u32>) {
    if let Some(value) = value {
        if value > 0 {
            *target = value;
        }
    }
}

fn merge_string(target: &mut String, value: Option<String>) {
    if let Some(value) = value {
        if !value.trim().is_empty() {
            *target = value;
        }
    }
}

fn merge_optional_string(target: &mut Option<String>, value: Option<String>) {
    if let Some(value) = value {
        if !value.trim().is_empty() {
            *target = Some(value);
        }
    }
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().and_then(|home| {
        let home = home.trim();
        if home.is_empty() {
            None
        } else {
            Some(Path::new(home).join(".postframe"))
        }
    })
}
