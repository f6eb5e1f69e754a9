//! File watcher that reruns stages on change.
//!
//! Debounced batches of changed paths are routed to watch bindings by glob.
//! Every binding owns one consumer task fed by a queue of depth one, so a
//! stage never runs concurrently with itself: a trigger that arrives while
//! it runs waits behind it, and further triggers fold into the waiting one.

use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use color_eyre::eyre::{Result, WrapErr, eyre};
use glob::Pattern;
use notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_mini::{DebounceEventResult, Debouncer, new_debouncer};
use sitepipe_core::glob_base;
use sitepipe_pipeline::{Job, JobOutcome, Pipeline, Stage, StageKind, matches_any};
use tokio::{
    sync::mpsc::{self, error::TrySendError},
    task::JoinHandle,
};

use crate::server::{ReloadMessage, Reloader};

/// A batch of changed paths, or the error that ended event delivery.
pub type Batch = std::result::Result<Vec<PathBuf>, notify::Error>;

/// Glob patterns that rerun one stage, and the reload sent afterwards.
#[derive(Debug, Clone)]
pub struct WatchBinding {
    stage: Arc<Stage>,
    patterns: Vec<Pattern>,
    reload: ReloadMessage,
}

impl WatchBinding {
    /// Bind the pipeline stage named `stage`. Unknown names are rejected.
    pub fn new(pipeline: &Pipeline, stage: &str, reload: ReloadMessage) -> Result<Self> {
        let stage = pipeline
            .stage_named(stage)
            .ok_or_else(|| eyre!("watch binding names unknown stage `{stage}`"))?;
        let patterns = stage
            .patterns()
            .wrap_err_with(|| format!("Invalid source glob for stage {}", stage.name()))?;
        Ok(Self {
            stage,
            patterns,
            reload,
        })
    }

    /// One binding per stage: styles hot-swap stylesheets, the rest reload.
    pub fn for_pipeline(pipeline: &Pipeline) -> Result<Vec<Self>> {
        StageKind::ALL
            .iter()
            .map(|kind| {
                let reload = match kind {
                    StageKind::Styles => ReloadMessage::CssReload,
                    _ => ReloadMessage::Reload,
                };
                Self::new(pipeline, kind.as_str(), reload)
            })
            .collect()
    }

    #[must_use]
    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    fn matches(&self, relative: &Path) -> bool {
        matches_any(&self.patterns, relative)
    }
}

/// Directories to watch recursively: the existing glob bases, deduplicated.
pub fn watch_roots(root: &Path, bindings: &[WatchBinding]) -> Vec<PathBuf> {
    let bases: BTreeSet<PathBuf> = bindings
        .iter()
        .flat_map(|b| b.stage.sources().iter())
        .map(|pattern| root.join(glob_base(pattern)))
        .filter(|dir| dir.is_dir())
        .collect();

    // Drop directories already covered by a watched ancestor.
    bases
        .iter()
        .filter(|dir| !bases.iter().any(|other| other != *dir && dir.starts_with(other)))
        .cloned()
        .collect()
}

/// Indices of the bindings matched by at least one path in the batch.
fn route(root: &Path, bindings: &[WatchBinding], paths: &[PathBuf]) -> BTreeSet<usize> {
    let mut hit = BTreeSet::new();
    for path in paths {
        let Ok(relative) = path.strip_prefix(root) else {
            continue;
        };
        for (idx, binding) in bindings.iter().enumerate() {
            if binding.matches(relative) {
                hit.insert(idx);
            }
        }
    }
    hit
}

/// Run a binding's stage each time it is triggered, then reload.
async fn consume(binding: WatchBinding, mut triggers: mpsc::Receiver<()>, reloader: Arc<dyn Reloader>) {
    while triggers.recv().await.is_some() {
        let stage = Arc::clone(&binding.stage);
        let name = stage.name();
        println!("  File change detected, rebuilding {name}...");

        match tokio::task::spawn_blocking(move || stage.run()).await {
            Ok(Ok(JobOutcome::Succeeded(summary))) => {
                println!("  ✓ Rebuilt {name}: {summary}");
                reloader.send(binding.reload);
            }
            Ok(Ok(JobOutcome::Recovered(message))) => {
                eprintln!("  ✗ {message}");
            }
            Ok(Err(e)) => {
                tracing::error!(stage = name, "rebuild failed: {e}");
                eprintln!("  ✗ Rebuild of {name} failed: {e}");
            }
            Err(e) => {
                tracing::error!(stage = name, "rebuild panicked: {e}");
            }
        }
    }
}

/// Route batches to the binding consumers until the batch source closes or
/// reports an error.
///
/// Returns how many triggers were queued, for diagnostics.
pub async fn dispatch(
    root: PathBuf,
    bindings: Vec<WatchBinding>,
    mut batches: mpsc::UnboundedReceiver<Batch>,
    reloader: Arc<dyn Reloader>,
) -> usize {
    let mut queues = Vec::with_capacity(bindings.len());
    let mut consumers = Vec::with_capacity(bindings.len());
    for binding in bindings.iter().cloned() {
        let (tx, rx) = mpsc::channel(1);
        queues.push(tx);
        consumers.push(tokio::spawn(consume(binding, rx, Arc::clone(&reloader))));
    }

    let mut queued = 0;
    while let Some(batch) = batches.recv().await {
        let paths = match batch {
            Ok(paths) => paths,
            Err(e) => {
                tracing::error!("file watcher stopped: {e}");
                eprintln!("  ✗ File watcher stopped: {e}");
                break;
            }
        };

        for idx in route(&root, &bindings, &paths) {
            match queues[idx].try_send(()) {
                Ok(()) => queued += 1,
                Err(TrySendError::Full(())) => {
                    tracing::trace!(stage = bindings[idx].stage.name(), "rebuild already queued");
                }
                Err(TrySendError::Closed(())) => {}
            }
        }
    }

    // Let queued rebuilds finish before the consumers exit.
    drop(queues);
    for consumer in consumers {
        let _ = consumer.await;
    }
    queued
}

/// A running watcher. Dropping it stops event delivery.
pub struct FileWatcher {
    _debouncer: Debouncer<RecommendedWatcher>,
    _dispatcher: JoinHandle<usize>,
}

impl FileWatcher {
    /// Watch the bindings' source trees under `root`.
    pub fn start(
        root: &Path,
        bindings: Vec<WatchBinding>,
        debounce: Duration,
        reloader: Arc<dyn Reloader>,
    ) -> Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut debouncer = new_debouncer(debounce, move |res: DebounceEventResult| {
            let batch = res.map(|events| events.into_iter().map(|e| e.path).collect());
            let _ = tx.send(batch);
        })
        .wrap_err("Failed to create file watcher")?;

        for dir in watch_roots(root, &bindings) {
            debouncer
                .watcher()
                .watch(&dir, RecursiveMode::Recursive)
                .wrap_err_with(|| format!("Failed to watch {}", dir.display()))?;
            tracing::debug!(dir = %dir.display(), "watching");
        }

        let dispatcher = tokio::spawn(dispatch(root.to_path_buf(), bindings, rx, reloader));
        Ok(Self {
            _debouncer: debouncer,
            _dispatcher: dispatcher,
        })
    }
}
