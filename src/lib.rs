use anyhow::{Result, anyhow};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;

pub mod content;
pub mod fetch;
pub mod logging;
pub mod render;
pub mod settings;
pub mod slides;
#[cfg(test)]
mod test_util;

pub use content::{ContentRecord, PostInput};
pub use fetch::ImageFetcher;
pub use render::{Compositor, Layout, RenderConfig, RenderReport};
pub use settings::Settings;

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub id: Option<String>,
    pub title: Option<String>,
    pub body: Option<String>,
    pub category: Option<String>,
    pub image: Option<String>,
    pub input: Option<String>,
    pub output: Option<String>,
    pub output_dir: Option<String>,
    pub settings_path: Option<String>,
}

/// Renders what `config` describes and returns the written paths, one per line.
pub async fn run(config: Config) -> Result<String> {
    let settings_path = config.settings_path.as_deref().map(Path::new);
    let settings = settings::load_settings(settings_path)?;
    let input = resolve_input(&config)?;

    let fetcher = ImageFetcher::new(&settings);
    let default_dir = settings.output_dir.clone();
    let compositor = Arc::new(Compositor::new(settings));

    let paths: Vec<PathBuf> = if let Some(output) = config.output.as_deref() {
        if !input.comments.is_empty() {
            warn!(
                "--output renders a single slide; ignoring {} comment(s)",
                input.comments.len()
            );
        }
        let report = compositor
            .render(&input.record, &fetcher, Path::new(output))
            .await?;
        vec![report.path]
    } else {
        let out_dir = PathBuf::from(config.output_dir.as_deref().unwrap_or(&default_dir));
        slides::render_post(compositor, &fetcher, &input, &out_dir)
            .await?
            .into_iter()
            .map(|report| report.path)
            .collect()
    };

    Ok(paths
        .iter()
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>()
        .join("\n"))
}

fn resolve_input(config: &Config) -> Result<PostInput> {
    let mut input = match config.input.as_deref() {
        Some(path) => content::load_post_input(Path::new(path))?,
        None => {
            if config.title.is_none() && config.body.is_none() && config.image.is_none() {
                return Err(anyhow!(
                    "nothing to render (pass --input or at least one of --title/--body/--image)"
                ));
            }
            PostInput::default()
        }
    };

    let record = &mut input.record;
    if let Some(id) = config.id.as_ref() {
        record.id = id.clone();
    }
    if let Some(title) = config.title.as_ref() {
        record.title = title.clone();
    }
    if let Some(body) = config.body.as_ref() {
        record.body = body.clone();
    }
    if let Some(category) = config.category.as_ref() {
        record.category = category.clone();
    }
    if let Some(image) = config.image.as_ref() {
        record.source_image_ref = Some(image.clone());
    }
    Ok(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_input_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("post.json");
        std::fs::write(
            &path,
            r#"{"id": "a1", "title": "From file", "text": "Body", "comments": ["x"]}"#,
        )
        .expect("write");

        let config = Config {
            input: Some(path.to_string_lossy().to_string()),
            title: Some("From flag".to_string()),
            ..Config::default()
        };
        let input = resolve_input(&config).expect("resolve");
        assert_eq!(input.record.id, "a1");
        assert_eq!(input.record.title, "From flag");
        assert_eq!(input.record.body, "Body");
        assert_eq!(input.comments, vec!["x".to_string()]);
    }

    #[test]
    fn empty_config_is_rejected() {
        let err = resolve_input(&Config::default()).unwrap_err();
        assert!(err.to_string().contains("nothing to render"));
    }
}
