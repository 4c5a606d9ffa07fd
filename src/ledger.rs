use std::collections::HashSet;
use std::fs;
use std::sync::{Mutex, PoisonError};

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::domain::Identifier;
use crate::error::CrunchyError;
use crate::store::{FILE_MODE, Library, set_mode};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerRecord {
    pub identifier: String,
    #[serde(default)]
    pub creator: Option<String>,
    #[serde(default, alias = "downloaded_at")]
    pub fetched_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LedgerEntry {
    Legacy(String),
    Record(LedgerRecord),
    Unknown(Value),
}

impl LedgerEntry {
    pub fn identifier(&self) -> Option<&str> {
        match self {
            LedgerEntry::Legacy(identifier) => Some(identifier),
            LedgerEntry::Record(record) => Some(&record.identifier),
            LedgerEntry::Unknown(_) => None,
        }
    }
}

#[derive(Debug)]
pub struct Ledger {
    path: Utf8PathBuf,
    lock: Mutex<()>,
}

impl Ledger {
    pub fn new(path: Utf8PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    pub fn load(&self) -> Result<Vec<LedgerEntry>, CrunchyError> {
        match self.read_content()? {
            Some(content) => self.parse(&content),
            None => Ok(Vec::new()),
        }
    }

    fn read_content(&self) -> Result<Option<String>, CrunchyError> {
        if !self.path.as_std_path().exists() {
            return Ok(None);
        }
        fs::read_to_string(self.path.as_std_path())
            .map(Some)
            .map_err(|err| CrunchyError::Ledger(format!("read {}: {err}", self.path)))
    }

    fn parse(&self, content: &str) -> Result<Vec<LedgerEntry>, CrunchyError> {
        serde_json::from_str(content)
            .map_err(|err| CrunchyError::Ledger(format!("parse {}: {err}", self.path)))
    }

    pub fn existing_identifiers(&self) -> HashSet<String> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        if !self.path.as_std_path().exists() {
            info!(path = %self.path, "no tracking ledger found, starting fresh");
            return HashSet::new();
        }
        match self.load() {
            Ok(entries) => {
                let identifiers: HashSet<String> = entries
                    .iter()
                    .filter_map(|entry| entry.identifier())
                    .map(str::to_string)
                    .collect();
                info!(
                    count = identifiers.len(),
                    "found previously fetched identifiers"
                );
                identifiers
            }
            Err(err) => {
                error!(error = %err, "error reading tracking ledger, treating it as empty");
                HashSet::new()
            }
        }
    }

    pub fn record(&self, identifier: &Identifier, creator: &str) -> Result<(), CrunchyError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut entries = match self.read_content()? {
            None => Vec::new(),
            Some(content) => match self.parse(&content) {
                Ok(entries) => entries,
                Err(err) => {
                    warn!(error = %err, "existing ledger is not valid JSON, starting fresh");
                    self.preserve_unreadable()?;
                    Vec::new()
                }
            },
        };
        entries.push(LedgerEntry::Record(LedgerRecord {
            identifier: identifier.as_str().to_string(),
            creator: Some(creator.to_string()),
            fetched_at: Some(chrono::Utc::now().to_rfc3339()),
        }));

        let content = serde_json::to_vec_pretty(&entries)
            .map_err(|err| CrunchyError::Ledger(err.to_string()))?;
        Library::write_bytes_atomic(&self.path, &content)?;

        if let Err(err) = set_mode(self.path.as_std_path(), FILE_MODE) {
            warn!(path = %self.path, error = %err, "could not set permissions for tracking ledger");
        }
        debug!(%identifier, "saved identifier to tracking ledger");
        Ok(())
    }

    fn preserve_unreadable(&self) -> Result<(), CrunchyError> {
        let backup = self.path.with_extension(format!(
            "corrupt-{}.json",
            chrono::Utc::now().format("%Y%m%d%H%M%S")
        ));
        fs::copy(self.path.as_std_path(), backup.as_std_path()).map_err(|err| {
            CrunchyError::Ledger(format!("back up unreadable {} to {backup}: {err}", self.path))
        })?;
        warn!(%backup, "kept unreadable ledger copy");
        Ok(())
    }
}
