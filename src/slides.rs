use anyhow::{Context, Result};
use image::RgbImage;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::content::{ContentRecord, PostInput, comment_slides};
use crate::fetch::ImageFetcher;
use crate::render::{Compositor, RenderReport};

struct SlideJob {
    record: ContentRecord,
    image: Option<RgbImage>,
    path: PathBuf,
}

/// Renders the primary slide and one slide per qualifying comment. Slides are
/// composed on blocking workers; reports come back in slide order.
pub async fn render_post(
    compositor: Arc<Compositor>,
    fetcher: &ImageFetcher,
    input: &PostInput,
    out_dir: &Path,
) -> Result<Vec<RenderReport>> {
    let mut primary = input.record.clone();
    if primary.id.trim().is_empty() {
        primary.id = "post".to_string();
    }
    let image = match primary.source_image_ref.as_deref() {
        Some(reference) => fetcher.fetch(reference).await,
        None => None,
    };

    let mut jobs = vec![SlideJob {
        path: out_dir.join(slide_file_name(&format!("{}_1", primary.id))),
        record: primary.clone(),
        image,
    }];
    for record in comment_slides(&primary, &input.comments, compositor.settings()) {
        jobs.push(SlideJob {
            path: out_dir.join(slide_file_name(&record.id)),
            record,
            image: None,
        });
    }
    info!("rendering {} slide(s) for {}", jobs.len(), primary.id);

    let handles: Vec<_> = jobs
        .into_iter()
        .map(|job| {
            let compositor = compositor.clone();
            tokio::task::spawn_blocking(move || {
                compositor.compose(&job.record, job.image.as_ref(), &job.path)
            })
        })
        .collect();

    let mut reports = Vec::with_capacity(handles.len());
    for handle in handles {
        let report = handle.await.with_context(|| "slide render task failed")??;
        reports.push(report);
    }
    Ok(reports)
}

fn slide_file_name(id: &str) -> String {
    let safe: String = id
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
                ch
            } else {
                '_'
            }
        })
        .collect();
    format!("{}.jpg", safe)
}
