use super::FontSpec;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextExtent {
    pub width: f32,
    pub height: f32,
}

impl TextExtent {
    pub const EMPTY: TextExtent = TextExtent {
        width: 0.0,
        height: 0.0,
    };
}

/// Pure text geometry. Implementations only report metrics; nothing is drawn.
pub trait TextMeasurer {
    fn text_width(&self, text: &str, font: FontSpec) -> f32;

    fn line_height(&self, font: FontSpec) -> f32;

    /// Distance from the top of a line box to its baseline.
    fn ascent(&self, font: FontSpec) -> f32;

    /// Greedy word wrap. A word wider than `max_width` gets a line of its own.
    fn wrap(&self, text: &str, font: FontSpec, max_width: f32) -> Vec<String> {
        let mut lines = Vec::new();
        let mut current = String::new();

        for word in text.split_whitespace() {
            if current.is_empty() {
                current.push_str(word);
                continue;
            }
            let candidate = format!("{} {}", current, word);
            if self.text_width(&candidate, font) <= max_width {
                current = candidate;
            } else {
                lines.push(std::mem::take(&mut current));
                current.push_str(word);
            }
        }

        if !current.is_empty() {
            lines.push(current);
        }
        lines
    }

    fn measure(&self, lines: &[String], font: FontSpec, spacing: f32) -> TextExtent {
        if lines.is_empty() {
            return TextExtent::EMPTY;
        }
        let width = lines
            .iter()
            .map(|line| self.text_width(line, font))
            .fold(0.0, f32::max);
        let count = lines.len() as f32;
        let height = count * self.line_height(font) + (count - 1.0) * spacing;
        TextExtent { width, height }
    }

    fn wrapped_height(&self, text: &str, font: FontSpec, max_width: f32, spacing: f32) -> f32 {
        let lines = self.wrap(text, font, max_width);
        self.measure(&lines, font, spacing).height
    }
}
