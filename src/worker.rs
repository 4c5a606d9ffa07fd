use camino::Utf8Path;
use tracing::{debug, error, info, warn};

use crate::archive::{ArchiveClient, MediaGlob};
use crate::domain::{FetchOutcome, Item};
use crate::error::CrunchyError;
use crate::store::{Library, set_tree_modes};
use crate::tracking::Tracker;

#[derive(Debug, Clone, Copy)]
pub struct WorkerOptions {
    pub dry_run: bool,
    pub retries: u32,
}

pub struct FetchWorker<'a, A: ArchiveClient> {
    archive: &'a A,
    tracker: &'a Tracker,
    library: Library,
    glob: MediaGlob,
    options: WorkerOptions,
}

impl<'a, A: ArchiveClient> FetchWorker<'a, A> {
    pub fn new(
        archive: &'a A,
        tracker: &'a Tracker,
        library: Library,
        glob: MediaGlob,
        options: WorkerOptions,
    ) -> Self {
        Self {
            archive,
            tracker,
            library,
            glob,
            options,
        }
    }

    pub fn fetch(&self, item: &Item) -> FetchOutcome {
        let item_dir = self.library.item_dir(item);
        let identifier = &item.identifier;

        if item_dir.as_std_path().exists() {
            info!(%identifier, "already present, skipping");
            return FetchOutcome::SkippedAlreadyPresent;
        }

        if self.tracker.probes_media() && !self.has_media(item) {
            info!(%identifier, glob = self.glob.as_str(), "no matching media files, skipping");
            return FetchOutcome::SkippedAlreadyPresent;
        }

        if self.options.dry_run {
            info!(%identifier, destination = %item_dir, "[dry run] would fetch");
            return FetchOutcome::Fetched;
        }

        match self.transfer(item, &item_dir) {
            Ok(outcome) => outcome,
            Err(err) => {
                if matches!(err, CrunchyError::Interrupted) {
                    warn!(%identifier, "transfer interrupted");
                } else {
                    error!(%identifier, error = %err, "error fetching item");
                }
                remove_partial(&item_dir);
                FetchOutcome::Failed
            }
        }
    }

    // Unknown counts as having media.
    fn has_media(&self, item: &Item) -> bool {
        match self.archive.list_files(&item.identifier) {
            Ok(names) => names.iter().any(|name| self.glob.matches(name)),
            Err(err) => {
                warn!(identifier = %item.identifier, error = %err, "could not check files");
                true
            }
        }
    }

    fn transfer(&self, item: &Item, item_dir: &Utf8Path) -> Result<FetchOutcome, CrunchyError> {
        let creator_dir = self.library.ensure_creator_dir(&item.creator)?;

        info!(identifier = %item.identifier, "fetching");
        let files = self.archive.download(
            &item.identifier,
            &creator_dir,
            &self.glob,
            self.options.retries,
        )?;

        if !item_dir.as_std_path().is_dir() {
            warn!(
                identifier = %item.identifier,
                destination = %item_dir,
                "transfer completed but directory not found"
            );
            return Ok(FetchOutcome::Failed);
        }

        info!(
            identifier = %item.identifier,
            files = files.len(),
            "fetched media files"
        );
        apply_shared_permissions(item_dir);

        if let Err(err) = self.tracker.record(item) {
            error!(identifier = %item.identifier, error = %err, "error saving to tracking ledger");
        }
        Ok(FetchOutcome::Fetched)
    }
}

fn apply_shared_permissions(item_dir: &Utf8Path) {
    match set_tree_modes(item_dir.as_std_path()) {
        Ok(()) => debug!(%item_dir, "set permissions"),
        Err(err) => warn!(%item_dir, error = %err, "could not set permissions"),
    }
}

fn remove_partial(item_dir: &Utf8Path) {
    if !item_dir.as_std_path().exists() {
        return;
    }
    match Library::remove_dir(item_dir) {
        Ok(()) => info!(%item_dir, "cleaned up partial fetch"),
        Err(err) => error!(%item_dir, error = %err, "error cleaning up partial fetch"),
    }
}
