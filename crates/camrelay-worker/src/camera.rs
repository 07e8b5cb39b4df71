//! Still-image camera job
//!
//! Each run moves through `Downloading -> Overlaying -> Publishing -> Done`,
//! or ends in `Errored`. A corrupted frame sends the job back to
//! `Downloading` for a fresh copy, up to the cycle retry cap.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use camrelay_core::timestamp::label_or_empty;
use camrelay_core::WebcamSpec;
use camrelay_overlay::{Overlay, OverlayFactory};
use chrono::NaiveDateTime;

use crate::context::JobContext;
use crate::download;
use crate::error::JobError;
use crate::job::Job;
use crate::publish;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Idle,
    Downloading,
    Overlaying,
    Publishing,
    Done,
    Errored,
}

/// One camera: a source file, its overlays and everything published from it
pub struct CameraJob {
    ctx: Arc<JobContext>,
    name: String,
    source_name: String,
    overlays: Vec<Box<dyn Overlay>>,
    buffer: Vec<u8>,
    modified: Option<NaiveDateTime>,
    published: Vec<String>,
    state: JobState,
}

impl CameraJob {
    pub fn new(
        ctx: Arc<JobContext>,
        name: impl Into<String>,
        source_name: impl Into<String>,
        overlays: Vec<Box<dyn Overlay>>,
    ) -> Self {
        Self {
            ctx,
            name: name.into(),
            source_name: source_name.into(),
            overlays,
            buffer: Vec::new(),
            modified: None,
            published: Vec::new(),
            state: JobState::Idle,
        }
    }

    pub fn from_spec(ctx: Arc<JobContext>, spec: &WebcamSpec, factory: &mut OverlayFactory) -> Self {
        let overlays = factory.create_all(&spec.overlays);
        Self::new(ctx, &spec.name, &spec.file_name_on_server, overlays)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    /// Source modification time captured by the last download
    pub fn modified(&self) -> Option<NaiveDateTime> {
        self.modified
    }

    pub fn published(&self) -> &[String] {
        &self.published
    }

    pub fn overlays(&self) -> &[Box<dyn Overlay>] {
        &self.overlays
    }

    /// Download, overlay and publish once.
    pub async fn run(&mut self) -> Result<(), JobError> {
        let start = Instant::now();
        self.state = JobState::Idle;

        let result = self.process().await;
        self.state = match result {
            Ok(()) => JobState::Done,
            Err(_) => JobState::Errored,
        };

        if result.is_ok() {
            tracing::info!(
                camera = %self.name,
                outputs = self.overlays.len(),
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Camera completed"
            );
        }
        result
    }

    async fn process(&mut self) -> Result<(), JobError> {
        let policy = self.ctx.settings.cycle_retry;
        let max_attempts = policy.attempts();
        let mut attempt = 1;

        loop {
            self.download().await?;
            match self.apply_overlays().await {
                Ok(()) => break,
                Err(e) if e.is_corrupted_image() && attempt < max_attempts => {
                    tracing::warn!(
                        camera = %self.name,
                        attempt,
                        max_attempts,
                        error = %e,
                        "Corrupted frame, restarting from download"
                    );
                    tokio::time::sleep(policy.delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }

        self.publish().await
    }

    /// Replace the buffer and timestamp with a fresh copy of the source.
    pub async fn download(&mut self) -> Result<(), JobError> {
        self.state = JobState::Downloading;
        self.buffer = Vec::new();
        self.modified = None;

        let downloaded = download::fetch_source(&self.ctx, &self.name, &self.source_name).await?;
        self.buffer = downloaded.data;
        self.modified = downloaded.modified;
        Ok(())
    }

    /// Run every overlay over the current buffer.
    pub async fn apply_overlays(&mut self) -> Result<(), JobError> {
        self.state = JobState::Overlaying;
        let label = label_or_empty(self.modified, self.ctx.settings.label_timezone);

        for overlay in self.overlays.iter_mut() {
            overlay
                .apply(&self.buffer, &label)
                .await
                .map_err(|source| JobError::Overlay {
                    output: overlay.output_name(&self.name),
                    source,
                })?;
            tracing::debug!(camera = %self.name, overlay = overlay.kind(), "Applied overlay");
        }
        Ok(())
    }

    /// Publish every overlay's output under its derived name.
    ///
    /// Outputs published before a failure stay published.
    pub async fn publish(&mut self) -> Result<(), JobError> {
        self.state = JobState::Publishing;

        for overlay in &self.overlays {
            let name = overlay.output_name(&self.name);
            let url = publish::publish_atomic(&self.ctx, &name, overlay.output()).await?;
            self.published.push(url);
        }
        Ok(())
    }
}

#[async_trait]
impl Job for CameraJob {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&mut self) -> Result<(), JobError> {
        CameraJob::run(self).await
    }

    fn published(&self) -> &[String] {
        &self.published
    }
}
