//! Execution of a single chapter job on a pool worker

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use super::error::JobError;
use super::job::{JobId, JobState};
use super::Shared;
use crate::archive::{self, ArchiveTarget, ArchiveWriter};
use crate::plugins::RegisteredPlugin;

/// Work item travelling through the pool
pub(crate) struct JobEnvelope {
    pub id: JobId,
    pub chapter: String,
    pub target: RegisteredPlugin,
}

enum Outcome {
    Complete { path: PathBuf, manga_id: String },
    Cancelled,
    /// Finalized by someone else while the worker was busy
    Superseded,
}

pub(crate) async fn run_job(shared: Arc<Shared>, worker_id: usize, envelope: JobEnvelope) {
    let id = envelope.id.clone();

    if !shared.index.read().await.is_active(&id) {
        debug!(worker_id, %id, "Skipping job that left the queue");
        return;
    }

    let site = envelope.target.plugin.site().to_string();
    info!(worker_id, %id, site, chapter = %envelope.chapter, "Processing chapter");

    let (state, error) = match execute(&shared, &envelope).await {
        Ok(Outcome::Complete { path, manga_id }) => {
            info!(worker_id, %id, path = %path.display(), "Chapter saved");
            let register = shared.index.read().await.register_mark(&id);
            finalize(&shared, &id, JobState::Complete, None).await;
            if register {
                if let Some(marks) = &shared.marks {
                    if let Err(err) = marks.chapter_downloaded(&site, &envelope.chapter, &manga_id) {
                        warn!(%id, error = %err, "Failed to record chapter mark");
                    }
                }
            }
            return;
        }
        Ok(Outcome::Cancelled) => {
            info!(worker_id, %id, "Chapter download cancelled");
            (JobState::Cancelled, None)
        }
        Ok(Outcome::Superseded) => return,
        Err(err) => {
            error!(worker_id, %id, error = %err, "Chapter download failed");
            (JobState::Failed, Some(err.to_string()))
        }
    };

    finalize(&shared, &id, state, error).await;
}

async fn finalize(shared: &Shared, id: &JobId, state: JobState, error: Option<String>) {
    let finalized = shared.index.write().await.finalize(id, state, error, Utc::now());
    if finalized.is_some() {
        match state {
            JobState::Complete => shared.metrics.job_completed(),
            JobState::Failed => shared.metrics.job_failed(),
            JobState::Cancelled => shared.metrics.job_cancelled(),
            _ => {}
        }
    }
}

async fn execute(shared: &Shared, envelope: &JobEnvelope) -> Result<Outcome, JobError> {
    let id = &envelope.id;
    let plugin = &envelope.target.plugin;
    let profile = &envelope.target.profile;

    let chapter = plugin.chapter_info(&envelope.chapter).await?;
    let manga = plugin.manga_info(&chapter.manga_id).await?;

    let stem = profile.template.render(&chapter.format_data(&manga))?;
    let target = ArchiveTarget {
        directory: profile.strategy.directory(&profile.destination, &manga.title),
        stem,
        total_pages: chapter.pages,
        fallback_extension: profile.fallback_extension.clone(),
    };
    let info = chapter.comic_info(&manga, plugin.chapter_url(&chapter.id));
    let mut writer = archive::create_writer(profile.method, target, info);
    let file = writer
        .destination()
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    if !shared.index.write().await.begin(id, file, Utc::now()) {
        return Ok(Outcome::Superseded);
    }
    writer.open()?;

    let pages = plugin.chapter_pages(&chapter.id).await?;
    let total = pages.urls.len();
    shared.index.write().await.set_total_pages(id, total);
    debug!(%id, total, "Page list resolved");

    for url in &pages.urls {
        let data = pages.client.get_bytes(url, profile.page_delay).await?;
        let receipt = writer.add_page(&data)?;
        shared.metrics.page_fetched(receipt.bytes);
        debug!(%id, page = receipt.ordinal, total, name = %receipt.name, "Page written");

        if shared.index.write().await.record_page(id, receipt.bytes as u64) {
            writer.abort();
            return Ok(Outcome::Cancelled);
        }
    }

    if !shared.index.write().await.begin_saving(id) {
        writer.abort();
        return Ok(Outcome::Cancelled);
    }

    writer.finish_pages()?;
    let path = commit(writer).await?;

    Ok(Outcome::Complete {
        path,
        manga_id: chapter.manga_id,
    })
}

async fn commit(writer: Box<dyn ArchiveWriter>) -> Result<PathBuf, JobError> {
    let path = tokio::task::spawn_blocking(move || writer.commit())
        .await
        .map_err(|err| JobError::Interrupted(err.to_string()))??;
    Ok(path)
}
