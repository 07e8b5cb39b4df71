//! Fixed-count tick loop

use std::time::Duration;

use camrelay_core::RelayConfig;

use crate::job::Job;
use crate::tick::{run_tick, TickReport};

/// Runs a fixed number of ticks with a pause between consecutive ticks.
#[derive(Debug, Clone, Copy)]
pub struct Scheduler {
    runs: u32,
    interval: Duration,
}

impl Scheduler {
    pub fn new(runs: u32, interval: Duration) -> Self {
        Self { runs, interval }
    }

    pub fn from_config(config: &RelayConfig) -> Self {
        Self::new(config.schedule_runs, config.schedule_interval)
    }

    /// Run every tick, calling `on_tick` with each report as soon as the tick
    /// finishes. Returns the jobs for inspection.
    pub async fn run<F>(&self, mut jobs: Vec<Box<dyn Job>>, mut on_tick: F) -> Vec<Box<dyn Job>>
    where
        F: FnMut(u32, &TickReport),
    {
        for tick in 1..=self.runs {
            tracing::info!(tick, runs = self.runs, jobs = jobs.len(), "Starting tick");
            let (returned, report) = run_tick(jobs).await;
            jobs = returned;
            on_tick(tick, &report);

            if tick < self.runs {
                tokio::time::sleep(self.interval).await;
            }
        }
        jobs
    }
}
