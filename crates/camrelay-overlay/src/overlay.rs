//! Overlay abstraction

use async_trait::async_trait;

use crate::error::OverlayResult;

/// Extension of every published still image
pub const OUTPUT_EXTENSION: &str = "jpg";

/// A unit of image annotation
///
/// `apply` reads the source bytes and writes the annotated image into the
/// overlay's own buffer, which stays valid until the next call.
#[async_trait]
pub trait Overlay: Send + Sync {
    /// Annotate `source`, stamping `label` where the overlay draws a timestamp.
    async fn apply(&mut self, source: &[u8], label: &str) -> OverlayResult<()>;

    /// Encoded result of the last successful `apply`; empty before the first.
    fn output(&self) -> &[u8];

    /// Optional suffix distinguishing this overlay's output from its siblings
    fn subname(&self) -> Option<&str>;

    /// Short name of the overlay type, for logs
    fn kind(&self) -> &'static str;

    /// Published file name: `<base>.jpg` or `<base>_<subname>.jpg`
    fn output_name(&self, base: &str) -> String {
        match self.subname() {
            Some(sub) => format!("{}_{}.{}", base, sub, OUTPUT_EXTENSION),
            None => format!("{}.{}", base, OUTPUT_EXTENSION),
        }
    }
}
