//! Atomic publishing
//!
//! Content is stored under a temporary name and renamed onto the public name
//! server-side, so readers of the public name see either the previous complete
//! file or the new complete file.

use std::time::Instant;

use camrelay_transport::{ConnectionPool, TransportError, TransportResult};

use crate::context::JobContext;
use crate::error::JobError;

/// Public URL of a published file
pub fn public_url(base: &str, name: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), name)
}

/// Temporary name a file is uploaded under before the rename
pub fn temp_name(name: &str, suffix: &str) -> String {
    format!("{}{}", name, suffix)
}

/// Publish `data` as `name` on the upload server and return its public URL.
pub async fn publish_atomic(ctx: &JobContext, name: &str, data: &[u8]) -> Result<String, JobError> {
    let settings = &ctx.settings;
    let pool: &ConnectionPool = &ctx.pool;
    let temp = temp_name(name, &settings.publish_temp_suffix);
    let temp = temp.as_str();
    let start = Instant::now();

    settings
        .upload_retry
        .run(
            "publish",
            move |_| store_and_rename(pool, temp, name, data),
            TransportError::is_transport_fault,
        )
        .await
        .map_err(|source| JobError::Publish {
            name: name.to_string(),
            source,
        })?;

    let url = public_url(&settings.public_base_url, name);
    tracing::info!(
        name = name,
        url = %url,
        bytes = data.len(),
        duration_ms = start.elapsed().as_secs_f64() * 1000.0,
        "Published"
    );
    Ok(url)
}

async fn store_and_rename(
    pool: &ConnectionPool,
    temp: &str,
    name: &str,
    data: &[u8],
) -> TransportResult<()> {
    let mut lease = pool.upload().lock().await;
    lease.store(temp, data).await?;

    if let Err(e) = lease.rename(temp, name).await {
        if let Err(cleanup) = lease.delete(temp).await {
            tracing::debug!(temp, error = %cleanup, "Could not remove temporary upload");
        }
        return Err(e);
    }
    Ok(())
}
