use async_trait::async_trait;

use crate::error::JobError;

/// A unit of work run once per tick
#[async_trait]
pub trait Job: Send {
    fn name(&self) -> &str;

    async fn run(&mut self) -> Result<(), JobError>;

    /// Every public URL published so far, across all ticks
    fn published(&self) -> &[String];
}
