use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::settings::Settings;

/// One piece of content to render. Treated as immutable input.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ContentRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, alias = "text")]
    pub body: String,
    #[serde(default, alias = "subreddit")]
    pub category: String,
    #[serde(default, alias = "image_url")]
    pub source_image_ref: Option<String>,
}

impl ContentRecord {
    /// Copy with entities decoded and surrounding whitespace removed.
    pub fn cleaned(&self) -> ContentRecord {
        ContentRecord {
            id: self.id.clone(),
            title: clean_text(&self.title),
            body: clean_text(&self.body),
            category: clean_text(&self.category),
            source_image_ref: self
                .source_image_ref
                .as_deref()
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string),
        }
    }
}

/// A post plus the comments that become follow-up slides.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostInput {
    #[serde(flatten)]
    pub record: ContentRecord,
    #[serde(default)]
    pub comments: Vec<String>,
}

pub fn load_post_input(path: &Path) -> Result<PostInput> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read input: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("failed to parse input: {}", path.display()))
}

/// Decodes HTML character references one at a time and trims. Unknown
/// entities and bare `&` are kept as written.
pub fn clean_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value.trim();
    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        match entity_len(tail) {
            Some(len) => {
                let entity = &tail[..len];
                match quick_xml::escape::unescape(entity) {
                    Ok(decoded) => out.push_str(&decoded),
                    Err(_) => out.push_str(entity),
                }
                rest = &tail[len..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out.trim().to_string()
}

/// Byte length of the `&name;` or `&#n;` reference at the start of `tail`.
fn entity_len(tail: &str) -> Option<usize> {
    let name = tail.strip_prefix('&')?;
    let end = name.find(|ch: char| !(ch.is_ascii_alphanumeric() || ch == '#'))?;
    (end > 0 && name[end..].starts_with(';')).then_some(end + 2)
}

/// Comment slides for a post: long enough comments only, capped in count,
/// numbered after the primary slide.
pub fn comment_slides(
    parent: &ContentRecord,
    comments: &[String],
    settings: &Settings,
) -> Vec<ContentRecord> {
    comments
        .iter()
        .filter(|comment| comment.chars().count() >= settings.comment_min_chars)
        .take(settings.comment_max_slides)
        .enumerate()
        .map(|(idx, comment)| ContentRecord {
            id: format!("{}_{}", parent.id, idx + 2),
            title: settings.comment_title.clone(),
            body: comment.clone(),
            category: parent.category.clone(),
            source_image_ref: None,
        })
        .collect()
}
