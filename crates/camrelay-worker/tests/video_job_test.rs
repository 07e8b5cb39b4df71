use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use camrelay_core::{Classify, FailureKind, RetryPolicy, VideoSpec};
use camrelay_transport::{ConnectionPool, MemoryServer};
use camrelay_worker::{Job, JobContext, JobError, JobSettings, VideoJob, VideoStamper};
use chrono::Utc;

#[derive(Default)]
struct FakeStamper {
    calls: AtomicU32,
    fail: bool,
}

#[async_trait]
impl VideoStamper for FakeStamper {
    async fn stamp(&self, video: &[u8], logo: &Path, place: (i64, i64)) -> Result<Vec<u8>, JobError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert_eq!(logo, Path::new("overlays/logo-shaded-video.png"));
        assert_eq!(place, (0, 619));
        if self.fail {
            return Err(JobError::Video("FFmpeg overlay failed: bad input".to_string()));
        }
        let mut out = b"stamped:".to_vec();
        out.extend_from_slice(video);
        Ok(out)
    }
}

struct Fixture {
    origin: MemoryServer,
    destination: MemoryServer,
    stamper: Arc<FakeStamper>,
    job: VideoJob,
}

fn fixture(stamper: FakeStamper) -> Fixture {
    let origin = MemoryServer::new();
    let destination = MemoryServer::new();
    let settings = JobSettings {
        download_retry: RetryPolicy::new(2, Duration::ZERO),
        upload_retry: RetryPolicy::new(2, Duration::ZERO),
        not_found_grace: Duration::ZERO,
        ..Default::default()
    };
    let pool = ConnectionPool::new(origin.factory(), destination.factory());
    let ctx = Arc::new(JobContext::new(Arc::new(pool), settings));
    let stamper = Arc::new(stamper);
    let spec = VideoSpec {
        name: "allsky".to_string(),
        file_name_on_server: "allsky.mp4".to_string(),
        logo_place: (0, 619),
        logo_img: PathBuf::from("overlays/logo-shaded-video.png"),
    };
    let job = VideoJob::new(ctx, spec, stamper.clone());
    Fixture {
        origin,
        destination,
        stamper,
        job,
    }
}

#[tokio::test]
async fn test_new_video_is_stamped_published_and_removed() {
    let mut f = fixture(FakeStamper::default());
    f.origin.put("allsky.mp4", b"night".to_vec());

    f.job.run().await.unwrap();

    assert_eq!(f.job.published(), ["https://glacier.org/webcam/allsky.mp4"]);
    assert_eq!(f.destination.get("allsky.mp4").unwrap(), b"stamped:night");
    assert!(!f.destination.contains("allsky.mp4.tmp"));
    assert!(!f.origin.contains("allsky.mp4"));
    assert_eq!(f.stamper.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_already_published_today_is_skipped() {
    let mut f = fixture(FakeStamper::default());
    f.origin.put("allsky.mp4", b"night".to_vec());
    f.destination.put("allsky.mp4", b"earlier".to_vec());

    f.job.run().await.unwrap();

    assert!(f.job.published().is_empty());
    assert!(f.origin.contains("allsky.mp4"));
    assert_eq!(f.stamper.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_yesterdays_video_is_replaced() {
    let mut f = fixture(FakeStamper::default());
    f.origin.put("allsky.mp4", b"night".to_vec());
    f.destination.put_with_time(
        "allsky.mp4",
        b"old".to_vec(),
        (Utc::now() - chrono::Duration::days(2)).naive_utc(),
    );

    f.job.run().await.unwrap();

    assert_eq!(f.destination.get("allsky.mp4").unwrap(), b"stamped:night");
}

#[tokio::test]
async fn test_undated_published_video_counts_as_done() {
    let mut f = fixture(FakeStamper::default());
    f.origin.put("allsky.mp4", b"night".to_vec());
    f.destination.put("allsky.mp4", b"earlier".to_vec());
    f.destination.disable_modified_time();

    f.job.run().await.unwrap();

    assert_eq!(f.stamper.calls.load(Ordering::SeqCst), 0);
    assert_eq!(f.destination.get("allsky.mp4").unwrap(), b"earlier");
}

#[tokio::test]
async fn test_no_source_does_nothing() {
    let mut f = fixture(FakeStamper::default());

    f.job.run().await.unwrap();

    assert!(f.job.published().is_empty());
    assert!(f.destination.names().is_empty());
}

#[tokio::test]
async fn test_stamp_failure_keeps_source() {
    let mut f = fixture(FakeStamper {
        fail: true,
        ..Default::default()
    });
    f.origin.put("allsky.mp4", b"night".to_vec());

    let err = f.job.run().await.unwrap_err();

    assert_eq!(err.kind(), FailureKind::Video);
    assert!(f.origin.contains("allsky.mp4"));
    assert!(!f.destination.contains("allsky.mp4"));
}

#[tokio::test]
async fn test_runs_through_job_trait() {
    let f = fixture(FakeStamper::default());
    f.origin.put("allsky.mp4", b"night".to_vec());
    let mut job: Box<dyn Job> = Box::new(f.job);

    job.run().await.unwrap();

    assert_eq!(job.name(), "allsky");
    assert_eq!(job.published().len(), 1);
}
