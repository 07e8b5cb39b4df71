//! camrelay: fetch webcam frames and the nightly timelapse from the origin FTP
//! server, stamp them and republish them.
//!
//! Server credentials and tuning come from the environment (see `.env`);
//! cameras come from a JSON file. Failures of each tick are printed to stdout
//! once the tick finishes, so cron can mail them.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use camrelay_cli::{build_jobs, build_pool, init_tracing};
use camrelay_core::{load_cameras, RelayConfig};
use camrelay_overlay::OverlayFactory;
use camrelay_worker::{FfmpegStamper, JobContext, JobSettings, Scheduler};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "camrelay")]
#[command(about = "Stamp webcam images with overlays and republish them")]
struct Args {
    /// Camera definitions file (JSON)
    #[arg(long, env = "CAMERAS_FILE", value_name = "PATH")]
    cameras: Option<PathBuf>,

    /// Number of ticks to run
    #[arg(long)]
    runs: Option<u32>,

    /// Seconds to wait between ticks
    #[arg(long, value_name = "SECS")]
    interval_secs: Option<u64>,

    /// Validate configuration and camera definitions, then exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let args = Args::parse();

    let mut config = RelayConfig::from_env().context("Invalid relay configuration")?;
    if let Some(cameras) = args.cameras {
        config.cameras_file = cameras;
    }
    if let Some(runs) = args.runs {
        config.schedule_runs = runs;
    }
    if let Some(secs) = args.interval_secs {
        config.schedule_interval = Duration::from_secs(secs);
    }

    let cameras = load_cameras(&config.cameras_file)?;

    if args.check {
        tracing::info!(
            download = %config.download.describe(),
            upload = %config.upload.describe(),
            webcams = cameras.webcams.len(),
            videos = cameras.videos.len(),
            "Configuration is valid"
        );
        return Ok(());
    }

    let pool = Arc::new(build_pool(&config));
    let ctx = Arc::new(JobContext::new(pool.clone(), JobSettings::from_config(&config)));
    let mut factory =
        OverlayFactory::new(config.jpeg_quality).context("Failed to initialise overlays")?;
    let stamper = Arc::new(
        FfmpegStamper::new(config.ffmpeg_path.clone()).with_timeout(config.ffmpeg_timeout),
    );
    let jobs = build_jobs(&cameras, ctx, &mut factory, stamper);

    tracing::info!(
        jobs = jobs.len(),
        runs = config.schedule_runs,
        interval_secs = config.schedule_interval.as_secs(),
        "Starting relay"
    );

    Scheduler::from_config(&config)
        .run(jobs, |_, report| {
            if let Some(text) = report.render() {
                println!("{}", text);
            }
        })
        .await;

    pool.shutdown().await;
    Ok(())
}
