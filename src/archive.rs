use std::fs;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use regex::Regex;
use reqwest::Url;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::domain::{CollectionName, Identifier};
use crate::error::CrunchyError;

const DEFAULT_BASE_URL: &str = "https://archive.org";
const QUERY_RETRIES: u32 = 3;
const BASE_DELAY_MS: u64 = 200;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub query: String,
    pub fields: Vec<String>,
    pub sort: Vec<String>,
    pub rows: usize,
}

impl SearchQuery {
    pub fn latest_in_collection(collection: &CollectionName, rows: usize) -> Self {
        Self {
            query: format!("collection:{}", collection.as_str()),
            fields: vec!["identifier".to_string(), "creator".to_string()],
            sort: vec!["addeddate desc".to_string()],
            rows,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum CreatorField {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SearchDoc {
    #[serde(default)]
    pub identifier: Option<String>,
    #[serde(default)]
    pub creator: Option<CreatorField>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    response: SearchResults,
}

#[derive(Debug, Deserialize)]
struct SearchResults {
    #[serde(default)]
    docs: Vec<SearchDoc>,
}

#[derive(Debug, Deserialize)]
struct ItemMetadata {
    #[serde(default)]
    files: Option<Vec<FileEntry>>,
}

#[derive(Debug, Deserialize)]
struct FileEntry {
    name: String,
}

#[derive(Debug, Clone)]
pub struct MediaGlob {
    pattern: String,
    regex: Regex,
}

impl MediaGlob {
    pub fn new(pattern: &str) -> Result<Self, CrunchyError> {
        let mut source = String::from("(?i)^");
        for ch in pattern.chars() {
            match ch {
                '*' => source.push_str(".*"),
                '?' => source.push('.'),
                other => source.push_str(&regex::escape(&other.to_string())),
            }
        }
        source.push('$');
        let regex = Regex::new(&source)
            .map_err(|err| CrunchyError::InvalidSetting(format!("media glob {pattern:?}: {err}")))?;
        Ok(Self {
            pattern: pattern.to_string(),
            regex,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    pub fn matches(&self, file_name: &str) -> bool {
        let base = file_name.rsplit('/').next().unwrap_or(file_name);
        self.regex.is_match(base)
    }
}

pub trait ArchiveClient: Send + Sync {
    fn search(&self, query: &SearchQuery) -> Result<Vec<SearchDoc>, CrunchyError>;

    fn list_files(&self, identifier: &Identifier) -> Result<Vec<String>, CrunchyError>;

    fn download(
        &self,
        identifier: &Identifier,
        dest_dir: &Utf8Path,
        glob: &MediaGlob,
        retries: u32,
    ) -> Result<Vec<Utf8PathBuf>, CrunchyError>;
}

#[derive(Clone)]
pub struct ArchiveHttpClient {
    client: Client,
    base_url: String,
    shutdown: Arc<AtomicBool>,
}

impl ArchiveHttpClient {
    pub fn new() -> Result<Self, CrunchyError> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: &str) -> Result<Self, CrunchyError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("crunchy/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| CrunchyError::ArchiveHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(30))
            .timeout(Duration::from_secs(600))
            .build()
            .map_err(|err| CrunchyError::ArchiveHttp(err.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn with_shutdown(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown = flag;
        self
    }

    pub fn file_url(&self, identifier: &Identifier, relative: &Utf8Path) -> Result<Url, CrunchyError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|err| CrunchyError::ArchiveResponse(format!("base url: {err}")))?;
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                CrunchyError::ArchiveResponse(format!("base url cannot hold a path: {}", self.base_url))
            })?;
            segments
                .pop_if_empty()
                .push("download")
                .push(identifier.as_str());
            for part in relative.components() {
                segments.push(part.as_str());
            }
        }
        Ok(url)
    }

    fn check_shutdown(&self) -> Result<(), CrunchyError> {
        if self.shutdown.load(Ordering::SeqCst) {
            return Err(CrunchyError::Interrupted);
        }
        Ok(())
    }

    fn handle_status(
        response: reqwest::blocking::Response,
    ) -> Result<reqwest::blocking::Response, CrunchyError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| "archive request failed".to_string());
        Err(CrunchyError::ArchiveStatus { status, message })
    }

    fn send_with_retries<F>(
        &self,
        mut make_req: F,
        max_retries: u32,
    ) -> Result<reqwest::blocking::Response, CrunchyError>
    where
        F: FnMut() -> reqwest::blocking::RequestBuilder,
    {
        let mut attempt = 0u32;
        loop {
            self.check_shutdown()?;
            let response = make_req().send();
            match response {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if attempt < max_retries && is_retryable_status(status) {
                        backoff(attempt);
                        attempt += 1;
                        continue;
                    }
                    return Ok(resp);
                }
                Err(err) => {
                    if attempt < max_retries && is_retryable_error(&err) {
                        backoff(attempt);
                        attempt += 1;
                        continue;
                    }
                    return Err(CrunchyError::ArchiveHttp(err.to_string()));
                }
            }
        }
    }

    fn fetch_file(&self, url: &Url, target: &Utf8Path, retries: u32) -> Result<(), CrunchyError> {
        let mut attempt = 0u32;
        loop {
            self.check_shutdown()?;
            match self.try_fetch_file(url, target) {
                Ok(()) => return Ok(()),
                Err(err) if attempt < retries && is_transient(&err) => {
                    warn!(%url, attempt = attempt + 1, error = %err, "retrying file transfer");
                    backoff(attempt);
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    // Only a complete file ever reaches the final name.
    fn try_fetch_file(&self, url: &Url, target: &Utf8Path) -> Result<(), CrunchyError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .map_err(|err| CrunchyError::ArchiveHttp(err.to_string()))?;
        let mut response = Self::handle_status(response)?;

        let parent = target
            .parent()
            .ok_or_else(|| CrunchyError::Filesystem(format!("no parent for {target}")))?;
        let mut temp = tempfile::Builder::new()
            .prefix(".crunchy-part")
            .tempfile_in(parent.as_std_path())
            .map_err(|err| CrunchyError::Filesystem(err.to_string()))?;
        io::copy(&mut response, &mut temp)
            .map_err(|err| CrunchyError::ArchiveHttp(format!("transfer {url}: {err}")))?;
        temp.persist(target.as_std_path())
            .map_err(|err| CrunchyError::Filesystem(err.to_string()))?;
        Ok(())
    }

    fn list_files_with_retries(
        &self,
        identifier: &Identifier,
        retries: u32,
    ) -> Result<Vec<String>, CrunchyError> {
        let url = format!("{}/metadata/{}", self.base_url, identifier.as_str());
        let response = self.send_with_retries(|| self.client.get(&url), retries)?;
        let response = Self::handle_status(response)?;
        let metadata: ItemMetadata = response
            .json()
            .map_err(|err| CrunchyError::ArchiveResponse(err.to_string()))?;
        let files = metadata.files.ok_or_else(|| {
            CrunchyError::ArchiveResponse(format!("no metadata for item {identifier}"))
        })?;
        Ok(files.into_iter().map(|file| file.name).collect())
    }
}

impl ArchiveClient for ArchiveHttpClient {
    fn search(&self, query: &SearchQuery) -> Result<Vec<SearchDoc>, CrunchyError> {
        let url = format!("{}/advancedsearch.php", self.base_url);
        let mut params: Vec<(&str, String)> = vec![("q", query.query.clone())];
        params.extend(query.fields.iter().map(|field| ("fl[]", field.clone())));
        params.extend(query.sort.iter().map(|sort| ("sort[]", sort.clone())));
        params.push(("rows", query.rows.to_string()));
        params.push(("page", "1".to_string()));
        params.push(("output", "json".to_string()));

        let response = self.send_with_retries(|| self.client.get(&url).query(&params), QUERY_RETRIES)?;
        let response = Self::handle_status(response)?;
        let body: SearchResponse = response
            .json()
            .map_err(|err| CrunchyError::ArchiveResponse(err.to_string()))?;
        Ok(body.response.docs)
    }

    fn list_files(&self, identifier: &Identifier) -> Result<Vec<String>, CrunchyError> {
        self.list_files_with_retries(identifier, QUERY_RETRIES)
    }

    fn download(
        &self,
        identifier: &Identifier,
        dest_dir: &Utf8Path,
        glob: &MediaGlob,
        retries: u32,
    ) -> Result<Vec<Utf8PathBuf>, CrunchyError> {
        let wanted: Vec<String> = self
            .list_files_with_retries(identifier, retries)?
            .into_iter()
            .filter(|name| glob.matches(name))
            .collect();
        if wanted.is_empty() {
            debug!(%identifier, glob = glob.as_str(), "no matching files to transfer");
            return Ok(Vec::new());
        }

        let item_dir = dest_dir.join(identifier.as_str());
        let mut written = Vec::with_capacity(wanted.len());
        for name in wanted {
            self.check_shutdown()?;
            let relative = safe_relative_path(&name)?;
            let target = item_dir.join(&relative);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent.as_std_path())
                    .map_err(|err| CrunchyError::Filesystem(format!("create {parent}: {err}")))?;
            }
            let url = self.file_url(identifier, &relative)?;
            debug!(%url, %target, "transferring file");
            self.fetch_file(&url, &target, retries)?;
            written.push(target);
        }
        Ok(written)
    }
}

pub fn safe_relative_path(name: &str) -> Result<Utf8PathBuf, CrunchyError> {
    let path = Utf8Path::new(name);
    let mut relative = Utf8PathBuf::new();
    for component in path.components() {
        match component {
            Utf8Component::Normal(part) => relative.push(part),
            _ => return Err(CrunchyError::UnsafeFileName(name.to_string())),
        }
    }
    if relative.as_str().is_empty() {
        return Err(CrunchyError::UnsafeFileName(name.to_string()));
    }
    Ok(relative)
}

fn backoff(attempt: u32) {
    let delay = BASE_DELAY_MS * (attempt as u64 + 1);
    thread::sleep(Duration::from_millis(delay));
}

fn is_transient(err: &CrunchyError) -> bool {
    match err {
        CrunchyError::ArchiveHttp(_) => true,
        CrunchyError::ArchiveStatus { status, .. } => is_retryable_status(*status),
        _ => false,
    }
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}
