//! One scheduling tick: every job concurrently, failures gathered at the end.

use std::fmt;
use std::time::Instant;

use camrelay_core::error::LogLevel;
use camrelay_core::{Classify, FailureKind};

use crate::job::Job;

/// A job that failed during a tick
#[derive(Debug, Clone)]
pub struct FailureReport {
    pub job: String,
    /// `None` when the job's task panicked
    pub kind: Option<FailureKind>,
    pub message: String,
}

impl fmt::Display for FailureReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            Some(kind) => write!(f, "{} failed. [{}] {}", self.job, kind, self.message),
            None => write!(f, "{} failed. {}", self.job, self.message),
        }
    }
}

/// Outcome of one tick
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    pub completed: Vec<String>,
    pub failures: Vec<FailureReport>,
}

impl TickReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Operator-facing text of every failure, `None` when there were none.
    pub fn render(&self) -> Option<String> {
        if self.failures.is_empty() {
            return None;
        }
        Some(
            self.failures
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("\n\n"),
        )
    }
}

/// Run every job in its own task and wait for all of them.
///
/// Jobs are handed back for the next tick; a job whose task panicked is
/// reported and dropped.
pub async fn run_tick(jobs: Vec<Box<dyn Job>>) -> (Vec<Box<dyn Job>>, TickReport) {
    let start = Instant::now();
    let total = jobs.len();

    let mut handles = Vec::with_capacity(total);
    for mut job in jobs {
        let name = job.name().to_string();
        let handle = tokio::spawn(async move {
            let result = job.run().await;
            (job, result)
        });
        handles.push((name, handle));
    }

    let mut jobs = Vec::with_capacity(total);
    let mut report = TickReport::default();

    for (name, handle) in handles {
        match handle.await {
            Ok((job, Ok(()))) => {
                report.completed.push(name);
                jobs.push(job);
            }
            Ok((job, Err(e))) => {
                let kind = e.kind();
                match kind.log_level() {
                    LogLevel::Warn => tracing::warn!(job = %name, kind = %kind, error = %e, "Job failed"),
                    LogLevel::Error => tracing::error!(job = %name, kind = %kind, error = %e, "Job failed"),
                }
                report.failures.push(FailureReport {
                    job: name,
                    kind: Some(kind),
                    message: e.to_string(),
                });
                jobs.push(job);
            }
            Err(e) => {
                tracing::error!(job = %name, error = %e, "Job task panicked");
                report.failures.push(FailureReport {
                    job: name,
                    kind: None,
                    message: format!("task panicked: {}", e),
                });
            }
        }
    }

    tracing::info!(
        jobs = total,
        completed = report.completed.len(),
        failed = report.failures.len(),
        duration_ms = start.elapsed().as_secs_f64() * 1000.0,
        "Tick finished"
    );

    (jobs, report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::JobError;
    use async_trait::async_trait;

    struct Scripted {
        name: String,
        outcome: fn() -> Result<(), JobError>,
        runs: u32,
    }

    #[async_trait]
    impl Job for Scripted {
        fn name(&self) -> &str {
            &self.name
        }

        async fn run(&mut self) -> Result<(), JobError> {
            self.runs += 1;
            tokio::task::yield_now().await;
            (self.outcome)()
        }

        fn published(&self) -> &[String] {
            &[]
        }
    }

    fn job(name: &str, outcome: fn() -> Result<(), JobError>) -> Box<dyn Job> {
        Box::new(Scripted {
            name: name.to_string(),
            outcome,
            runs: 0,
        })
    }

    #[tokio::test]
    async fn test_failure_does_not_abort_siblings() {
        let jobs = vec![
            job("alpha", || Ok(())),
            job("beta", || {
                Err(JobError::NotFound {
                    camera: "beta".to_string(),
                    source_name: "beta.jpg".to_string(),
                })
            }),
            job("gamma", || Ok(())),
        ];

        let (jobs, report) = run_tick(jobs).await;

        assert_eq!(jobs.len(), 3);
        assert_eq!(report.completed, vec!["alpha", "gamma"]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].job, "beta");
        assert_eq!(report.failures[0].kind, Some(FailureKind::NotFound));
        assert!(!report.is_clean());
    }

    #[tokio::test]
    async fn test_panicking_job_is_reported() {
        let jobs = vec![job("alpha", || Ok(())), job("boom", || panic!("boom"))];

        let (jobs, report) = run_tick(jobs).await;

        assert_eq!(jobs.len(), 1);
        assert_eq!(report.failures[0].job, "boom");
        assert!(report.failures[0].kind.is_none());
    }

    #[test]
    fn test_render() {
        let report = TickReport {
            completed: vec!["alpha".to_string()],
            failures: vec![
                FailureReport {
                    job: "beta".to_string(),
                    kind: Some(FailureKind::PublishFault),
                    message: "rename refused".to_string(),
                },
                FailureReport {
                    job: "gamma".to_string(),
                    kind: None,
                    message: "task panicked".to_string(),
                },
            ],
        };

        assert_eq!(
            report.render().unwrap(),
            "beta failed. [PUBLISH_FAULT] rename refused\n\ngamma failed. task panicked"
        );
        assert!(TickReport::default().render().is_none());
    }
}
