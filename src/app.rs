use std::any::Any;
use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, error, info, warn};

use crate::archive::{ArchiveClient, MediaGlob};
use crate::config::RunSettings;
use crate::domain::{CollectionName, FetchOutcome, Identifier, Item, RunSummary};
use crate::error::CrunchyError;
use crate::scanner::CollectionScanner;
use crate::store::Library;
use crate::tracking::Tracker;
use crate::worker::{FetchWorker, WorkerOptions};

type OutcomeMessage = (Identifier, thread::Result<FetchOutcome>);

pub struct App<A: ArchiveClient> {
    archive: A,
    tracker: Tracker,
    library: Library,
    glob: MediaGlob,
    max_items: usize,
    workers: usize,
    worker_options: WorkerOptions,
    shutdown: Arc<AtomicBool>,
}

impl<A: ArchiveClient> App<A> {
    pub fn new(archive: A, tracker: Tracker, settings: &RunSettings) -> Result<Self, CrunchyError> {
        settings.validate()?;
        Ok(Self {
            archive,
            tracker,
            library: Library::new(settings.download_dir.clone()),
            glob: MediaGlob::new(&settings.media_glob)?,
            max_items: settings.max_items,
            workers: settings.workers,
            worker_options: WorkerOptions {
                dry_run: settings.dry_run,
                retries: settings.retries,
            },
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn with_shutdown(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown = flag;
        self
    }

    pub fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    pub fn run(&self, collections: &[CollectionName]) -> RunSummary {
        info!(
            collections = collections.len(),
            tracking = %self.tracker.strategy(),
            "starting run"
        );

        let existing = self.tracker.existing_identifiers();
        let candidates = self.collect_candidates(collections, &existing);

        if self.is_shutting_down() {
            warn!("interrupted before any fetch started");
            return RunSummary {
                candidates: candidates.len() as u64,
                interrupted: true,
                ..RunSummary::default()
            };
        }
        if candidates.is_empty() {
            info!("no new items to fetch");
            return RunSummary::default();
        }

        info!(count = candidates.len(), "found new items to fetch");
        let summary = self.dispatch(candidates);
        log_summary(&summary);
        summary
    }

    pub fn collect_candidates(
        &self,
        collections: &[CollectionName],
        existing: &HashSet<String>,
    ) -> Vec<Item> {
        let scanner = CollectionScanner::new(&self.archive);
        let mut candidates = Vec::new();
        let mut queued = HashSet::new();
        for collection in collections {
            if self.is_shutting_down() {
                break;
            }
            info!(%collection, "processing collection");
            for item in scanner.scan(collection, self.max_items) {
                if existing.contains(item.identifier.as_str()) {
                    debug!(identifier = %item.identifier, "skipping already fetched item");
                    continue;
                }
                if !queued.insert(item.identifier.clone()) {
                    debug!(
                        identifier = %item.identifier,
                        %collection,
                        "already queued from another collection"
                    );
                    continue;
                }
                candidates.push(item);
            }
        }
        candidates
    }

    fn dispatch(&self, candidates: Vec<Item>) -> RunSummary {
        let mut summary = RunSummary {
            candidates: candidates.len() as u64,
            ..RunSummary::default()
        };
        let pool_size = self.workers.clamp(1, candidates.len());

        let (task_tx, task_rx) = crossbeam_channel::unbounded::<Item>();
        for item in candidates {
            let _ = task_tx.send(item);
        }
        drop(task_tx);

        let (outcome_tx, outcome_rx) = crossbeam_channel::unbounded::<OutcomeMessage>();
        let worker = FetchWorker::new(
            &self.archive,
            &self.tracker,
            self.library.clone(),
            self.glob.clone(),
            self.worker_options,
        );

        thread::scope(|scope| {
            for worker_id in 0..pool_size {
                let tasks = task_rx.clone();
                let outcomes = outcome_tx.clone();
                let worker = &worker;
                let shutdown = &self.shutdown;
                let spawned = thread::Builder::new()
                    .name(format!("fetch-{worker_id}"))
                    .spawn_scoped(scope, move || {
                        fetch_loop(worker, &tasks, &outcomes, shutdown);
                    });
                if let Err(err) = spawned {
                    error!(worker_id, error = %err, "failed to spawn fetch worker");
                }
            }
            drop(outcome_tx);

            for (identifier, result) in outcome_rx.iter() {
                let outcome = match result {
                    Ok(outcome) => outcome,
                    Err(payload) => {
                        error!(
                            %identifier,
                            panic = panic_message(payload.as_ref()),
                            "unexpected error while fetching"
                        );
                        FetchOutcome::Failed
                    }
                };
                debug!(%identifier, ?outcome, "fetch finished");
                summary.tally(outcome);
            }
        });

        let leftovers: Vec<Item> = task_rx.try_iter().collect();
        if self.is_shutting_down() {
            summary.interrupted = true;
            if !leftovers.is_empty() {
                warn!(count = leftovers.len(), "interrupted, items left unattempted");
            }
        } else {
            for item in leftovers {
                error!(identifier = %item.identifier, "no worker available for item");
                summary.tally(FetchOutcome::Failed);
            }
        }

        summary
    }

    fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }
}

fn fetch_loop<A: ArchiveClient>(
    worker: &FetchWorker<'_, A>,
    tasks: &Receiver<Item>,
    outcomes: &Sender<OutcomeMessage>,
    shutdown: &AtomicBool,
) {
    while !shutdown.load(Ordering::SeqCst) {
        let Ok(item) = tasks.recv() else {
            break;
        };
        let result = panic::catch_unwind(AssertUnwindSafe(|| worker.fetch(&item)));
        if outcomes.send((item.identifier, result)).is_err() {
            break;
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}

fn log_summary(summary: &RunSummary) {
    info!(
        fetched = summary.fetched,
        skipped = summary.skipped,
        failed = summary.failed,
        total = summary.total,
        "fetch summary"
    );
    if summary.has_failures() {
        warn!("{} fetches failed, check logs for details", summary.failed);
    }
}
