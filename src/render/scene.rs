use anyhow::{Context, Result, anyhow};
use image::RgbaImage;
use resvg::render;
use std::fmt::Write as _;
use std::sync::Arc;
use tiny_skia::Pixmap;
use usvg::{Options, Tree, fontdb};

use super::{FontSpec, FontWeight};

struct TextRun {
    x: f32,
    baseline: f32,
    text: String,
    font: FontSpec,
    family: String,
    color: String,
}

/// Background and text layer of a slide, rasterized through SVG.
pub(crate) struct Scene {
    width: u32,
    height: u32,
    background: String,
    runs: Vec<TextRun>,
}

pub(crate) struct TextBlock<'a> {
    pub(crate) lines: &'a [String],
    pub(crate) x: f32,
    pub(crate) top: f32,
    pub(crate) font: FontSpec,
    pub(crate) family: &'a str,
    pub(crate) color: &'a str,
    pub(crate) ascent: f32,
    pub(crate) line_pitch: f32,
}

impl Scene {
    pub(crate) fn new(width: u32, height: u32, background: &str) -> Self {
        Self {
            width,
            height,
            background: background.to_string(),
            runs: Vec::new(),
        }
    }

    pub(crate) fn push_block(&mut self, block: TextBlock<'_>) {
        for (idx, line) in block.lines.iter().enumerate() {
            self.runs.push(TextRun {
                x: block.x,
                baseline: block.top + block.ascent + idx as f32 * block.line_pitch,
                text: line.clone(),
                font: block.font,
                family: block.family.to_string(),
                color: block.color.to_string(),
            });
        }
    }

    pub(crate) fn to_svg(&self) -> String {
        let mut svg = String::new();
        let _ = write!(
            svg,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
            w = self.width,
            h = self.height
        );
        let _ = write!(
            svg,
            r#"<rect x="0" y="0" width="{w}" height="{h}" fill="{fill}"/>"#,
            w = self.width,
            h = self.height,
            fill = escape_xml(&self.background)
        );
        for run in &self.runs {
            let weight = match run.font.weight {
                FontWeight::Bold => "bold",
                FontWeight::Regular => "normal",
            };
            let _ = write!(
                svg,
                r#"<text x="{x}" y="{y}" font-size="{size}" font-weight="{weight}" font-family="{family}" fill="{color}" xml:space="preserve">{text}</text>"#,
                x = run.x,
                y = run.baseline,
                size = run.font.size,
                weight = weight,
                family = escape_xml(&run.family),
                color = escape_xml(&run.color),
                text = escape_xml(&run.text)
            );
        }
        svg.push_str("</svg>");
        svg
    }

    pub(crate) fn rasterize(&self, fontdb: Arc<fontdb::Database>) -> Result<RgbaImage> {
        let svg = self.to_svg();
        let options = Options {
            fontdb,
            ..Options::default()
        };
        let tree = Tree::from_str(&svg, &options).with_context(|| "failed to parse SVG")?;
        let size = tree.size().to_int_size();
        let mut pixmap =
            Pixmap::new(size.width(), size.height()).ok_or_else(|| anyhow!("empty SVG size"))?;
        let mut pixmap_mut = pixmap.as_mut();
        render(&tree, tiny_skia::Transform::identity(), &mut pixmap_mut);
        RgbaImage::from_raw(size.width(), size.height(), pixmap.take())
            .ok_or_else(|| anyhow!("failed to build image buffer from SVG"))
    }
}

fn escape_xml(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block<'a>(lines: &'a [String], top: f32) -> TextBlock<'a> {
        TextBlock {
            lines,
            x: 70.0,
            top,
            font: FontSpec::bold(40),
            family: "Sans & Co",
            color: "#ffc93c",
            ascent: 36.0,
            line_pitch: 52.0,
        }
    }

    #[test]
    fn lines_are_stacked_by_pitch() {
        let lines = vec!["first".to_string(), "second".to_string()];
        let mut scene = Scene::new(1080, 1080, "#000000");
        scene.push_block(block(&lines, 100.0));
        let svg = scene.to_svg();
        assert!(svg.contains(r#"y="136""#));
        assert!(svg.contains(r#"y="188""#));
        assert!(svg.contains(r#"font-weight="bold""#));
        assert!(svg.contains("Sans &amp; Co"));
    }

    #[test]
    fn text_is_escaped() {
        let lines = vec!["<b>Tom & \"Jerry\"</b>".to_string()];
        let mut scene = Scene::new(100, 100, "#000000");
        scene.push_block(block(&lines, 0.0));
        let svg = scene.to_svg();
        assert!(svg.contains("&lt;b&gt;Tom &amp; &quot;Jerry&quot;&lt;/b&gt;"));
    }

    #[test]
    fn rasterizes_background_at_canvas_size() {
        let scene = Scene::new(64, 48, "#ff0000");
        let image = scene
            .rasterize(Arc::new(fontdb::Database::new()))
            .expect("rasterize");
        assert_eq!(image.dimensions(), (64, 48));
        assert_eq!(image.get_pixel(10, 10).0, [255, 0, 0, 255]);
    }
}
