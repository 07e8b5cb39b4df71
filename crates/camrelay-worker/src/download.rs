//! Source download with recovery
//!
//! A missing source gets one more look after a grace period (the camera may
//! still be uploading it). Transport faults are retried under the download
//! policy; the pool has already discarded the faulted session by then.

use std::time::{Duration, Instant};

use camrelay_transport::{ConnectionPool, TransportError, TransportResult};
use chrono::NaiveDateTime;

use crate::context::JobContext;
use crate::error::JobError;

/// A fully retrieved source file
#[derive(Debug, Clone)]
pub struct Downloaded {
    pub data: Vec<u8>,
    /// Server-side modification time (UTC), when the server reports one
    pub modified: Option<NaiveDateTime>,
}

/// Retrieve `source_name` for the job called `job`.
pub async fn fetch_source(
    ctx: &JobContext,
    job: &str,
    source_name: &str,
) -> Result<Downloaded, JobError> {
    let pool: &ConnectionPool = &ctx.pool;
    let grace = ctx.settings.not_found_grace;
    let start = Instant::now();

    let result = ctx
        .settings
        .download_retry
        .run(
            "download",
            move |_| fetch_with_grace(pool, job, source_name, grace),
            TransportError::is_transport_fault,
        )
        .await;

    match result {
        Ok(downloaded) => {
            tracing::info!(
                camera = job,
                source = source_name,
                bytes = downloaded.data.len(),
                has_modified_time = downloaded.modified.is_some(),
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Downloaded source"
            );
            Ok(downloaded)
        }
        Err(e) if e.is_not_found() => Err(JobError::NotFound {
            camera: job.to_string(),
            source_name: source_name.to_string(),
        }),
        Err(source) => Err(JobError::Download {
            name: source_name.to_string(),
            source,
        }),
    }
}

async fn fetch_with_grace(
    pool: &ConnectionPool,
    job: &str,
    source_name: &str,
    grace: Duration,
) -> TransportResult<Downloaded> {
    match fetch(pool, source_name).await {
        Err(e) if e.is_not_found() => {
            tracing::warn!(
                camera = job,
                source = source_name,
                grace_ms = grace.as_millis() as u64,
                "Source not found, looking again after grace period"
            );
            tokio::time::sleep(grace).await;
            fetch(pool, source_name).await
        }
        other => other,
    }
}

/// Retrieve and timestamp under one hold of the download session.
async fn fetch(pool: &ConnectionPool, source_name: &str) -> TransportResult<Downloaded> {
    let mut lease = pool.download().lock().await;
    let data = lease.retrieve(source_name).await?;

    let modified = match lease.modified_time(source_name).await {
        Ok(modified) => Some(modified),
        Err(e) if e.is_transport_fault() => return Err(e),
        Err(e) => {
            tracing::debug!(
                source = source_name,
                error = %e,
                "Modification time unavailable, continuing without it"
            );
            None
        }
    };

    Ok(Downloaded { data, modified })
}
