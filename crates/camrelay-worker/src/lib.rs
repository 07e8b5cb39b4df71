//! Camrelay Worker Library
//!
//! Jobs that move frames from the origin server to the public one:
//!
//! - [`CameraJob`]: download, overlay and publish one camera's still image,
//!   restarting the whole cycle when the downloaded frame is corrupted.
//! - [`VideoJob`]: stamp the nightly timelapse with a logo once per day.
//!
//! Publishing always goes through [`publish::publish_atomic`] (upload to a
//! temporary name, then rename). [`run_tick`] runs every job concurrently and
//! gathers their failures; [`Scheduler`] repeats ticks.

pub mod camera;
pub mod context;
pub mod download;
pub mod error;
pub mod job;
pub mod publish;
pub mod scheduler;
pub mod tick;
pub mod video;

// Re-export commonly used types
pub use camera::{CameraJob, JobState};
pub use context::{JobContext, JobSettings};
pub use error::JobError;
pub use job::Job;
pub use publish::{publish_atomic, public_url};
pub use scheduler::Scheduler;
pub use tick::{run_tick, FailureReport, TickReport};
pub use video::{FfmpegStamper, VideoJob, VideoStamper};
