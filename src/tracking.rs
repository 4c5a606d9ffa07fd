use std::collections::HashSet;

use tracing::info;

use crate::config::RunSettings;
use crate::domain::{Item, TrackingStrategy};
use crate::error::CrunchyError;
use crate::ledger::Ledger;
use crate::store::Library;

#[derive(Debug)]
pub enum Tracker {
    Ledger(Ledger),
    DirectoryScan(Library),
}

impl Tracker {
    pub fn from_settings(settings: &RunSettings) -> Self {
        match settings.tracking {
            TrackingStrategy::Ledger => Tracker::Ledger(Ledger::new(settings.ledger_path.clone())),
            TrackingStrategy::DirectoryScan => {
                Tracker::DirectoryScan(Library::new(settings.download_dir.clone()))
            }
        }
    }

    pub fn strategy(&self) -> TrackingStrategy {
        match self {
            Tracker::Ledger(_) => TrackingStrategy::Ledger,
            Tracker::DirectoryScan(_) => TrackingStrategy::DirectoryScan,
        }
    }

    pub fn existing_identifiers(&self) -> HashSet<String> {
        match self {
            Tracker::Ledger(ledger) => ledger.existing_identifiers(),
            Tracker::DirectoryScan(library) => {
                let identifiers = library.existing_identifiers();
                info!(
                    count = identifiers.len(),
                    root = %library.root(),
                    "found existing item directories"
                );
                identifiers
            }
        }
    }

    pub fn probes_media(&self) -> bool {
        matches!(self, Tracker::Ledger(_))
    }

    pub fn record(&self, item: &Item) -> Result<(), CrunchyError> {
        match self {
            Tracker::Ledger(ledger) => ledger.record(&item.identifier, &item.creator),
            Tracker::DirectoryScan(_) => Ok(()),
        }
    }
}
