use std::sync::Arc;

use camrelay_core::{CamerasFile, RelayConfig};
use camrelay_overlay::OverlayFactory;
use camrelay_transport::{ConnectionPool, FtpSessionFactory};
use camrelay_worker::{CameraJob, Job, JobContext, VideoJob, VideoStamper};

/// Initialize tracing for the relay binary.
///
/// Logs go to stderr; stdout carries only the failure report.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// FTP-backed pool for the configured origin and destination servers
pub fn build_pool(config: &RelayConfig) -> ConnectionPool {
    ConnectionPool::new(
        Arc::new(FtpSessionFactory::new(config.download.clone())),
        Arc::new(FtpSessionFactory::new(config.upload.clone())),
    )
}

/// One job per configured webcam and timelapse video.
pub fn build_jobs(
    cameras: &CamerasFile,
    ctx: Arc<JobContext>,
    factory: &mut OverlayFactory,
    stamper: Arc<dyn VideoStamper>,
) -> Vec<Box<dyn Job>> {
    let mut jobs: Vec<Box<dyn Job>> = Vec::with_capacity(cameras.webcams.len() + cameras.videos.len());

    for webcam in &cameras.webcams {
        jobs.push(Box::new(CameraJob::from_spec(ctx.clone(), webcam, factory)));
    }
    for video in &cameras.videos {
        jobs.push(Box::new(VideoJob::new(ctx.clone(), video.clone(), stamper.clone())));
    }

    jobs
}
