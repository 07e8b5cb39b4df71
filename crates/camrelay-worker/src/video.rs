//! Nightly timelapse job
//!
//! The origin receives one timelapse per night. It is stamped with the logo,
//! published as `<name>.mp4` and then removed from the origin so it is not
//! processed again. A video already published today is left alone.

use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use camrelay_core::VideoSpec;
use camrelay_transport::TransportError;
use chrono::{DateTime, NaiveDateTime, Utc};
use chrono_tz::Tz;
use tokio::process::Command;

use crate::context::JobContext;
use crate::download;
use crate::error::JobError;
use crate::job::Job;
use crate::publish;

pub const VIDEO_EXTENSION: &str = "mp4";

/// Longest an ffmpeg run may take before it is killed
pub const DEFAULT_FFMPEG_TIMEOUT: Duration = Duration::from_secs(600);

/// Burns a logo into a video
#[async_trait]
pub trait VideoStamper: Send + Sync {
    async fn stamp(&self, video: &[u8], logo: &Path, place: (i64, i64)) -> Result<Vec<u8>, JobError>;
}

/// [`VideoStamper`] running the `ffmpeg` binary in a scratch directory
pub struct FfmpegStamper {
    ffmpeg_path: String,
    timeout: Duration,
}

impl FfmpegStamper {
    pub fn new(ffmpeg_path: impl Into<String>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            timeout: DEFAULT_FFMPEG_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl VideoStamper for FfmpegStamper {
    async fn stamp(&self, video: &[u8], logo: &Path, place: (i64, i64)) -> Result<Vec<u8>, JobError> {
        let temp_dir = tempfile::TempDir::new()
            .map_err(|e| JobError::Video(format!("Failed to create temp directory: {}", e)))?;
        let input_path = temp_dir.path().join("source.mp4");
        let output_path = temp_dir.path().join("stamped.mp4");

        tokio::fs::write(&input_path, video)
            .await
            .map_err(|e| JobError::Video(format!("Failed to write video to temp file: {}", e)))?;

        let args = vec![
            "-y".to_string(),
            "-i".to_string(),
            input_path.to_string_lossy().to_string(),
            "-i".to_string(),
            logo.to_string_lossy().to_string(),
            "-filter_complex".to_string(),
            format!("overlay={}:{}", place.0, place.1),
            "-f".to_string(),
            VIDEO_EXTENSION.to_string(),
            output_path.to_string_lossy().to_string(),
        ];

        let run = Command::new(&self.ffmpeg_path)
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, run)
            .await
            .map_err(|_| {
                JobError::Video(format!(
                    "FFmpeg timed out after {}s",
                    self.timeout.as_secs_f64()
                ))
            })?
            .map_err(|e| JobError::Video(format!("Failed to execute ffmpeg: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(JobError::Video(format!("FFmpeg overlay failed: {}", stderr)));
        }

        tokio::fs::read(&output_path)
            .await
            .map_err(|e| JobError::Video(format!("Failed to read stamped video: {}", e)))
    }
}

/// Whether `modified` (UTC) falls on the same calendar day as `now` in `zone`
pub fn same_local_day(modified: NaiveDateTime, now: DateTime<Utc>, zone: Tz) -> bool {
    modified.and_utc().with_timezone(&zone).date_naive() == now.with_timezone(&zone).date_naive()
}

pub struct VideoJob {
    ctx: Arc<JobContext>,
    spec: VideoSpec,
    stamper: Arc<dyn VideoStamper>,
    published: Vec<String>,
}

impl VideoJob {
    pub fn new(ctx: Arc<JobContext>, spec: VideoSpec, stamper: Arc<dyn VideoStamper>) -> Self {
        Self {
            ctx,
            spec,
            stamper,
            published: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    /// Name the stamped video is published under
    pub fn target_name(&self) -> String {
        format!("{}.{}", self.spec.name, VIDEO_EXTENSION)
    }

    pub fn published(&self) -> &[String] {
        &self.published
    }

    pub async fn run(&mut self) -> Result<(), JobError> {
        if self.published_today().await {
            tracing::info!(video = %self.spec.name, "Video already published today, skipping");
            return Ok(());
        }

        if !self.source_available().await? {
            tracing::info!(
                video = %self.spec.name,
                source = %self.spec.file_name_on_server,
                "No video waiting on the origin server"
            );
            return Ok(());
        }

        let downloaded =
            download::fetch_source(&self.ctx, &self.spec.name, &self.spec.file_name_on_server).await?;
        let stamped = self
            .stamper
            .stamp(&downloaded.data, &self.spec.logo_img, self.spec.logo_place)
            .await?;

        let url = publish::publish_atomic(&self.ctx, &self.target_name(), &stamped).await?;
        self.published.push(url);

        self.remove_source().await
    }

    /// An existing target with an unknown date counts as published; an
    /// unreachable server does not.
    async fn published_today(&self) -> bool {
        let target = self.target_name();
        let mut lease = self.ctx.pool.upload().lock().await;

        match lease.list().await {
            Ok(names) if names.iter().any(|n| *n == target) => {}
            Ok(_) => return false,
            Err(e) => {
                tracing::warn!(video = %self.spec.name, error = %e, "Could not list upload server");
                return false;
            }
        }

        match lease.modified_time(&target).await {
            Ok(modified) => same_local_day(modified, Utc::now(), self.ctx.settings.label_timezone),
            Err(e) if e.is_transport_fault() => {
                tracing::warn!(video = %self.spec.name, error = %e, "Could not date published video");
                false
            }
            Err(e) => {
                tracing::debug!(video = %self.spec.name, error = %e, "Published video has no date");
                true
            }
        }
    }

    async fn source_available(&self) -> Result<bool, JobError> {
        let source = &self.spec.file_name_on_server;
        let ctx: &JobContext = &self.ctx;
        let names = ctx
            .settings
            .download_retry
            .run(
                "list",
                move |_| async move { ctx.pool.download().lock().await.list().await },
                TransportError::is_transport_fault,
            )
            .await
            .map_err(|e| JobError::Download {
                name: source.clone(),
                source: e,
            })?;

        Ok(names.iter().any(|n| n == source))
    }

    async fn remove_source(&self) -> Result<(), JobError> {
        let source = &self.spec.file_name_on_server;
        match self.ctx.pool.download().lock().await.delete(source).await {
            Ok(()) => {
                tracing::info!(video = %self.spec.name, source = %source, "Removed processed video from origin");
                Ok(())
            }
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(JobError::Download {
                name: source.clone(),
                source: e,
            }),
        }
    }
}

#[async_trait]
impl Job for VideoJob {
    fn name(&self) -> &str {
        &self.spec.name
    }

    async fn run(&mut self) -> Result<(), JobError> {
        VideoJob::run(self).await
    }

    fn published(&self) -> &[String] {
        &self.published
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    #[test]
    fn test_same_local_day_uses_zone() {
        let zone = chrono_tz::America::Denver;
        // 03:00 UTC on the 5th is still the evening of the 4th in Denver
        let modified = NaiveDate::from_ymd_opt(2024, 7, 5)
            .unwrap()
            .and_hms_opt(3, 0, 0)
            .unwrap();
        let now = NaiveDate::from_ymd_opt(2024, 7, 4)
            .unwrap()
            .and_hms_opt(20, 0, 0)
            .unwrap()
            .and_utc();

        assert!(same_local_day(modified, now, zone));
        assert!(!same_local_day(modified - Duration::days(1), now, zone));
    }

    #[tokio::test]
    async fn test_missing_ffmpeg_is_video_error() {
        let stamper = FfmpegStamper::new("/nonexistent/ffmpeg");
        let err = stamper
            .stamp(b"video", Path::new("logo.png"), (0, 619))
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::Video(ref msg) if msg.contains("Failed to execute ffmpeg")));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_hung_ffmpeg_times_out() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("ffmpeg");
        std::fs::write(&script, "#!/bin/sh\nsleep 30\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        let stamper = FfmpegStamper::new(script.to_string_lossy())
            .with_timeout(std::time::Duration::from_millis(200));

        let started = std::time::Instant::now();
        let err = stamper
            .stamp(b"video", Path::new("logo.png"), (0, 619))
            .await
            .unwrap_err();

        assert!(matches!(err, JobError::Video(ref msg) if msg.contains("timed out")));
        assert!(started.elapsed() < std::time::Duration::from_secs(10));
    }
}
