#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::fs;
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};

use crunchy::archive::{ArchiveClient, CreatorField, MediaGlob, SearchDoc, SearchQuery};
use crunchy::domain::Identifier;
use crunchy::error::CrunchyError;

#[derive(Debug, Clone)]
pub enum Transfer {
    Write,
    WriteAfter(Duration),
    Nothing,
    FailMidway,
    Panic,
}

#[derive(Default)]
pub struct MockArchive {
    search_results: HashMap<String, Vec<SearchDoc>>,
    failing_queries: HashSet<String>,
    files: HashMap<String, Vec<String>>,
    failing_listings: HashSet<String>,
    transfers: HashMap<String, Transfer>,
    pub searches: Mutex<Vec<String>>,
    pub listings: Mutex<Vec<String>>,
    pub downloads: Mutex<Vec<String>>,
}

impl MockArchive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_collection(mut self, collection: &str, docs: Vec<SearchDoc>) -> Self {
        self.search_results
            .insert(format!("collection:{collection}"), docs);
        self
    }

    pub fn with_failing_collection(mut self, collection: &str) -> Self {
        self.failing_queries.insert(format!("collection:{collection}"));
        self
    }

    pub fn with_files(mut self, identifier: &str, names: &[&str]) -> Self {
        self.files.insert(
            identifier.to_string(),
            names.iter().map(|name| name.to_string()).collect(),
        );
        self
    }

    pub fn with_failing_listing(mut self, identifier: &str) -> Self {
        self.failing_listings.insert(identifier.to_string());
        self
    }

    pub fn with_transfer(mut self, identifier: &str, transfer: Transfer) -> Self {
        self.transfers.insert(identifier.to_string(), transfer);
        self
    }

    pub fn download_count(&self) -> usize {
        self.downloads.lock().unwrap().len()
    }

    fn files_for(&self, identifier: &str) -> Vec<String> {
        self.files
            .get(identifier)
            .cloned()
            .unwrap_or_else(|| vec!["track01.mp3".to_string(), "info.txt".to_string()])
    }

    fn write_files(
        &self,
        identifier: &str,
        dest_dir: &Utf8Path,
        glob: &MediaGlob,
    ) -> Result<Vec<Utf8PathBuf>, CrunchyError> {
        let wanted: Vec<String> = self
            .files_for(identifier)
            .into_iter()
            .filter(|name| glob.matches(name))
            .collect();
        if wanted.is_empty() {
            return Ok(Vec::new());
        }
        let item_dir = dest_dir.join(identifier);
        fs::create_dir_all(item_dir.as_std_path()).unwrap();
        let mut written = Vec::new();
        for name in wanted {
            let path = item_dir.join(&name);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent.as_std_path()).unwrap();
            }
            fs::write(path.as_std_path(), b"ID3").unwrap();
            written.push(path);
        }
        Ok(written)
    }
}

impl ArchiveClient for MockArchive {
    fn search(&self, query: &SearchQuery) -> Result<Vec<SearchDoc>, CrunchyError> {
        self.searches.lock().unwrap().push(query.query.clone());
        if self.failing_queries.contains(&query.query) {
            return Err(CrunchyError::ArchiveStatus {
                status: 503,
                message: "service unavailable".to_string(),
            });
        }
        Ok(self
            .search_results
            .get(&query.query)
            .cloned()
            .unwrap_or_default())
    }

    fn list_files(&self, identifier: &Identifier) -> Result<Vec<String>, CrunchyError> {
        self.listings
            .lock()
            .unwrap()
            .push(identifier.as_str().to_string());
        if self.failing_listings.contains(identifier.as_str()) {
            return Err(CrunchyError::ArchiveHttp("connection refused".to_string()));
        }
        Ok(self.files_for(identifier.as_str()))
    }

    fn download(
        &self,
        identifier: &Identifier,
        dest_dir: &Utf8Path,
        glob: &MediaGlob,
        _retries: u32,
    ) -> Result<Vec<Utf8PathBuf>, CrunchyError> {
        self.downloads
            .lock()
            .unwrap()
            .push(identifier.as_str().to_string());
        let transfer = self
            .transfers
            .get(identifier.as_str())
            .cloned()
            .unwrap_or(Transfer::Write);
        match transfer {
            Transfer::Write => self.write_files(identifier.as_str(), dest_dir, glob),
            Transfer::WriteAfter(delay) => {
                thread::sleep(delay);
                self.write_files(identifier.as_str(), dest_dir, glob)
            }
            Transfer::Nothing => Ok(Vec::new()),
            Transfer::FailMidway => {
                let item_dir = dest_dir.join(identifier.as_str());
                fs::create_dir_all(item_dir.as_std_path()).unwrap();
                fs::write(item_dir.join("track01.mp3").as_std_path(), b"ID").unwrap();
                Err(CrunchyError::ArchiveHttp("connection reset by peer".to_string()))
            }
            Transfer::Panic => panic!("transfer blew up for {identifier}"),
        }
    }
}

pub fn doc(identifier: &str, creator: &str) -> SearchDoc {
    SearchDoc {
        identifier: Some(identifier.to_string()),
        creator: Some(CreatorField::One(creator.to_string())),
    }
}

pub fn utf8_root(temp: &tempfile::TempDir) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap()
}
