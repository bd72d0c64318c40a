use anyhow::{Context, Result, anyhow};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};
use ttf_parser::Face;
use ttf_parser::name_id;
use usvg::fontdb;

use super::measure::TextMeasurer;
use super::{FontSpec, FontWeight};
use crate::settings::Settings;

const FALLBACK_FAMILY: &str = "sans-serif";
/// Tried in order when no font path is configured. The last entry is always
/// present because its faces ship with the crate.
const FALLBACK_FAMILIES: &[&str] = &[
    "Noto Sans",
    "Liberation Sans",
    "Arial",
    "Helvetica",
    "DejaVu Sans",
];
const BUNDLED_REGULAR: &[u8] = include_bytes!("../../assets/fonts/DejaVuSans.ttf");
const BUNDLED_BOLD: &[u8] = include_bytes!("../../assets/fonts/DejaVuSans-Bold.ttf");
const FALLBACK_LINE_HEIGHT_EM: f32 = 1.2;
const FALLBACK_ASCENT_EM: f32 = 0.9;

#[derive(Clone)]
pub struct FontMetrics {
    data: Arc<Vec<u8>>,
    units_per_em: u16,
    space_advance: u16,
    ascender: i16,
    descender: i16,
    family: Option<String>,
    face_index: u32,
}

impl FontMetrics {
    pub fn family(&self) -> Option<&str> {
        self.family.as_deref()
    }

    pub fn data(&self) -> &[u8] {
        self.data.as_ref()
    }
}

pub fn load_font_metrics(path: &Path) -> Result<FontMetrics> {
    let data =
        std::fs::read(path).with_context(|| format!("failed to read font: {}", path.display()))?;
    load_font_metrics_from_data(Arc::new(data), 0)
        .map_err(|err| anyhow!("failed to parse font: {} ({})", path.display(), err))
}

/// A face resolved at one pixel size.
pub struct ScaledFont {
    spec: FontSpec,
    metrics: Option<FontMetrics>,
}

impl ScaledFont {
    pub fn spec(&self) -> FontSpec {
        self.spec
    }

    fn scale(&self, metrics: &FontMetrics) -> f32 {
        self.spec.size as f32 / metrics.units_per_em.max(1) as f32
    }

    pub fn text_width(&self, text: &str) -> f32 {
        let size = self.spec.size as f32;
        let Some(font) = self.metrics.as_ref() else {
            return estimate_text_width_units(text) * size;
        };
        let Ok(face) = Face::parse(&font.data, font.face_index) else {
            return estimate_text_width_units(text) * size;
        };
        let mut advance = 0u32;
        for ch in text.chars() {
            if ch == '\n' {
                continue;
            }
            if ch == ' ' {
                advance = advance.saturating_add(font.space_advance as u32);
                continue;
            }
            let glyph_advance = face
                .glyph_index(ch)
                .and_then(|glyph| face.glyph_hor_advance(glyph))
                .unwrap_or(font.space_advance);
            advance = advance.saturating_add(glyph_advance as u32);
        }
        advance as f32 * self.scale(font)
    }

    pub fn line_height(&self) -> f32 {
        match self.metrics.as_ref() {
            Some(font) => {
                let span = font.ascender as i32 - font.descender as i32;
                span.max(1) as f32 * self.scale(font)
            }
            None => self.spec.size as f32 * FALLBACK_LINE_HEIGHT_EM,
        }
    }

    pub fn ascent(&self) -> f32 {
        match self.metrics.as_ref() {
            Some(font) => font.ascender.max(0) as f32 * self.scale(font),
            None => self.spec.size as f32 * FALLBACK_ASCENT_EM,
        }
    }
}

/// Resolves faces once and hands out per-size fonts from a shared cache.
pub struct FontProvider {
    regular: Option<FontMetrics>,
    bold: Option<FontMetrics>,
    database: Arc<fontdb::Database>,
    cache: RwLock<HashMap<FontSpec, Arc<ScaledFont>>>,
}

impl FontProvider {
    pub fn new(settings: &Settings) -> Self {
        let mut db = fontdb::Database::new();
        if settings.system_fonts {
            db.load_system_fonts();
        }
        db.load_font_data(BUNDLED_REGULAR.to_vec());
        db.load_font_data(BUNDLED_BOLD.to_vec());

        let regular = settings
            .font_path
            .as_deref()
            .and_then(|path| load_configured_face(&mut db, path))
            .or_else(|| {
                FALLBACK_FAMILIES
                    .iter()
                    .find_map(|family| query_family_face(&db, family, fontdb::Weight::NORMAL))
            });
        // Bold must be the face the rasterizer picks for the same family, or
        // nothing: measured and drawn glyphs have to agree.
        let bold = settings
            .bold_font_path
            .as_deref()
            .and_then(|path| load_configured_face(&mut db, path))
            .or_else(|| {
                regular
                    .as_ref()
                    .and_then(FontMetrics::family)
                    .and_then(|family| query_family_face(&db, family, fontdb::Weight::BOLD))
            });

        match regular.as_ref().and_then(FontMetrics::family) {
            Some(family) => {
                debug!("text family: {} (bold: {})", family, bold.is_some());
                db.set_sans_serif_family(family);
            }
            None => warn!("no usable font face found; using estimated glyph metrics"),
        }

        Self {
            regular,
            bold,
            database: Arc::new(db),
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn font(&self, spec: FontSpec) -> Arc<ScaledFont> {
        if let Some(found) = self
            .cache
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&spec)
        {
            return found.clone();
        }
        let scaled = Arc::new(ScaledFont {
            spec,
            metrics: self.face(spec.weight).cloned(),
        });
        let mut cache = self
            .cache
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        cache.entry(spec).or_insert(scaled).clone()
    }

    /// Family name to draw with; bold falls back to the regular face.
    pub fn family(&self, weight: FontWeight) -> &str {
        self.face(weight)
            .and_then(|face| face.family())
            .unwrap_or(FALLBACK_FAMILY)
    }

    /// Spec to draw with. Bold text is drawn at normal weight when no bold
    /// face was resolved, since it was measured with the regular face.
    pub fn drawn_spec(&self, spec: FontSpec) -> FontSpec {
        match spec.weight {
            FontWeight::Bold if self.bold.is_none() => FontSpec::regular(spec.size),
            _ => spec,
        }
    }

    pub fn database(&self) -> Arc<fontdb::Database> {
        self.database.clone()
    }

    pub fn has_face(&self) -> bool {
        self.regular.is_some()
    }

    fn face(&self, weight: FontWeight) -> Option<&FontMetrics> {
        match weight {
            FontWeight::Bold => self.bold.as_ref().or(self.regular.as_ref()),
            FontWeight::Regular => self.regular.as_ref(),
        }
    }
}

impl TextMeasurer for FontProvider {
    fn text_width(&self, text: &str, font: FontSpec) -> f32 {
        self.font(font).text_width(text)
    }

    fn line_height(&self, font: FontSpec) -> f32 {
        self.font(font).line_height()
    }

    fn ascent(&self, font: FontSpec) -> f32 {
        self.font(font).ascent()
    }
}

fn load_configured_face(db: &mut fontdb::Database, path: &str) -> Option<FontMetrics> {
    match load_font_metrics(Path::new(path)) {
        Ok(metrics) => {
            db.load_font_data(metrics.data().to_vec());
            debug!("loaded font {} ({:?})", path, metrics.family());
            Some(metrics)
        }
        Err(err) => {
            warn!("font unavailable, falling back: {}", err);
            None
        }
    }
}

fn query_family_face(
    db: &fontdb::Database,
    family: &str,
    weight: fontdb::Weight,
) -> Option<FontMetrics> {
    let families = [fontdb::Family::Name(family)];
    let query = fontdb::Query {
        families: &families,
        weight,
        ..Default::default()
    };
    let id = db.query(&query)?;
    // Query returns the closest weight; a regular face is no bold stand-in.
    let found = db.face(id)?.weight;
    if (found.0 >= 600) != (weight.0 >= 600) {
        return None;
    }
    let (data, index) = db.with_face_data(id, |data, index| (data.to_vec(), index))?;
    load_font_metrics_from_data(Arc::new(data), index).ok()
}

fn load_font_metrics_from_data(data: Arc<Vec<u8>>, face_index: u32) -> Result<FontMetrics> {
    let face = Face::parse(&data, face_index).map_err(|err| anyhow!("{}", err))?;
    let units_per_em = face.units_per_em().max(1);
    let space_advance = face
        .glyph_index(' ')
        .and_then(|id| face.glyph_hor_advance(id))
        .unwrap_or(units_per_em / 2);
    let ascender = face.ascender();
    let descender = face.descender();
    let family = extract_family_name(&face);
    Ok(FontMetrics {
        data,
        units_per_em,
        space_advance,
        ascender,
        descender,
        family,
        face_index,
    })
}

fn extract_family_name(face: &Face<'_>) -> Option<String> {
    let mut fallback = None;
    for name in face.names() {
        if name.name_id == name_id::TYPOGRAPHIC_FAMILY {
            if let Some(value) = name.to_string() {
                return Some(value);
            }
        } else if name.name_id == name_id::FAMILY && fallback.is_none() {
            fallback = name.to_string();
        }
    }
    fallback
}

fn estimate_char_units(ch: char) -> f32 {
    if ch.is_whitespace() {
        0.25
    } else if ch.is_ascii_alphanumeric() {
        0.55
    } else if ch.is_ascii() {
        0.35
    } else if matches!(
        ch as u32,
        0x4E00..=0x9FFF | 0x3040..=0x30FF | 0x31F0..=0x31FF
    ) {
        1.0
    } else {
        0.9
    }
}

fn estimate_text_width_units(text: &str) -> f32 {
    text.chars().map(estimate_char_units).sum()
}
