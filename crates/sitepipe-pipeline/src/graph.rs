//! Task graph runner.
//!
//! Jobs are composed into series (strict order, abort on first failure) and
//! parallel groups (all members start at once; the group settles only when
//! every member has finished, then reports the first failure it observed).
//! Job bodies are synchronous and run on tokio's blocking pool.

use std::{
    fmt,
    future::Future,
    pin::Pin,
    sync::Arc,
    time::{Duration, Instant},
};

use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::error::{PipelineError, Result};

/// A named unit of synchronous work.
pub trait Job: Send + Sync + 'static {
    /// Name used in logs and reports.
    fn name(&self) -> &str;

    /// Run to completion.
    fn run(&self) -> Result<JobOutcome>;
}

/// How a job finished when it did not abort its group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// Completed, with a one-line summary.
    Succeeded(String),
    /// Failed, but the failure was logged and swallowed.
    Recovered(String),
}

/// Outcome of one job, as recorded by the runner.
#[derive(Debug, Clone)]
pub struct JobRecord {
    pub name: String,
    pub outcome: JobOutcome,
    pub duration: Duration,
}

/// Every job record produced by a run, in completion order.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    records: Vec<JobRecord>,
}

impl RunReport {
    #[must_use]
    pub fn records(&self) -> &[JobRecord] {
        &self.records
    }

    /// Records of jobs that failed without aborting.
    pub fn recovered(&self) -> impl Iterator<Item = &JobRecord> {
        self.records
            .iter()
            .filter(|r| matches!(r.outcome, JobOutcome::Recovered(_)))
    }

    /// True when no job had to recover from a failure.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.recovered().next().is_none()
    }

    fn merge(&mut self, other: RunReport) {
        self.records.extend(other.records);
    }
}

type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// A static composition of jobs.
#[derive(Clone)]
pub enum Task {
    Job(Arc<dyn Job>),
    Series(Vec<Task>),
    Parallel(Vec<Task>),
}

impl Task {
    /// Wrap a job.
    pub fn job(job: impl Job) -> Self {
        Self::Job(Arc::new(job))
    }

    /// Run `tasks` one after another.
    pub fn series(tasks: impl IntoIterator<Item = Task>) -> Self {
        Self::Series(tasks.into_iter().collect())
    }

    /// Run `tasks` concurrently.
    pub fn parallel(tasks: impl IntoIterator<Item = Task>) -> Self {
        Self::Parallel(tasks.into_iter().collect())
    }

    /// Execute the task tree.
    pub fn run(self) -> BoxFuture<Result<RunReport>> {
        Box::pin(async move {
            match self {
                Self::Job(job) => run_job(job).await,
                Self::Series(tasks) => {
                    let mut report = RunReport::default();
                    for task in tasks {
                        report.merge(task.run().await?);
                    }
                    Ok(report)
                }
                Self::Parallel(tasks) => run_parallel(tasks).await,
            }
        })
    }
}

impl From<Arc<dyn Job>> for Task {
    fn from(job: Arc<dyn Job>) -> Self {
        Self::Job(job)
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Job(job) => write!(f, "{}", job.name()),
            Self::Series(tasks) => f.debug_tuple("Series").field(tasks).finish(),
            Self::Parallel(tasks) => f.debug_tuple("Parallel").field(tasks).finish(),
        }
    }
}

/// Run a single job on the blocking pool.
pub async fn run_job(job: Arc<dyn Job>) -> Result<RunReport> {
    let name = job.name().to_string();
    debug!(job = %name, "starting job");

    let start = Instant::now();
    let outcome = tokio::task::spawn_blocking(move || job.run())
        .await
        .map_err(|e| PipelineError::Aborted {
            job: name.clone(),
            message: e.to_string(),
        })??;
    let duration = start.elapsed();

    match &outcome {
        JobOutcome::Succeeded(summary) => {
            info!(job = %name, duration_ms = duration.as_millis() as u64, "{summary}");
        }
        JobOutcome::Recovered(message) => {
            warn!(job = %name, "job failed, continuing: {message}");
        }
    }

    Ok(RunReport {
        records: vec![JobRecord {
            name,
            outcome,
            duration,
        }],
    })
}

async fn run_parallel(tasks: Vec<Task>) -> Result<RunReport> {
    let mut set = JoinSet::new();
    for task in tasks {
        set.spawn(task.run());
    }

    let mut report = RunReport::default();
    let mut first_error = None;

    // Drain every member before reporting so no sibling is left half-written.
    while let Some(joined) = set.join_next().await {
        let result = joined.map_err(|e| PipelineError::Aborted {
            job: "parallel group member".to_string(),
            message: e.to_string(),
        });
        match result.and_then(|r| r) {
            Ok(member) => report.merge(member),
            Err(err) => {
                if first_error.is_none() {
                    first_error = Some(err);
                } else {
                    warn!(error = %err, "additional failure in parallel group");
                }
            }
        }
    }

    match first_error {
        Some(err) => Err(err),
        None => Ok(report),
    }
}
