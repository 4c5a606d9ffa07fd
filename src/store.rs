use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::Path;

use camino::{Utf8Path, Utf8PathBuf};
use tempfile::Builder;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::domain::Item;
use crate::error::CrunchyError;

pub const LOG_DIR_NAME: &str = "logs";

pub const DIR_MODE: u32 = 0o775;
pub const FILE_MODE: u32 = 0o664;

#[derive(Debug, Clone)]
pub struct Library {
    root: Utf8PathBuf,
}

impl Library {
    pub fn new(root: Utf8PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn creator_dir(&self, creator: &str) -> Utf8PathBuf {
        self.root.join(creator)
    }

    pub fn item_dir(&self, item: &Item) -> Utf8PathBuf {
        self.creator_dir(&item.creator).join(item.identifier.as_str())
    }

    pub fn ensure_root(&self) -> Result<(), CrunchyError> {
        fs::create_dir_all(self.root.as_std_path())
            .map_err(|err| CrunchyError::Filesystem(format!("create {}: {err}", self.root)))
    }

    pub fn ensure_creator_dir(&self, creator: &str) -> Result<Utf8PathBuf, CrunchyError> {
        let dir = self.creator_dir(creator);
        fs::create_dir_all(dir.as_std_path())
            .map_err(|err| CrunchyError::Filesystem(format!("create {dir}: {err}")))?;
        Ok(dir)
    }

    pub fn existing_identifiers(&self) -> HashSet<String> {
        let mut identifiers = HashSet::new();
        if !self.root.as_std_path().is_dir() {
            debug!(root = %self.root, "download root missing, nothing fetched yet");
            return identifiers;
        }

        let walker = WalkDir::new(self.root.as_std_path())
            .min_depth(1)
            .max_depth(2)
            .follow_links(true)
            .into_iter()
            .filter_entry(|entry| !(entry.depth() == 1 && entry.file_name() == LOG_DIR_NAME));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(error = %err, "skipping unreadable entry in download root");
                    continue;
                }
            };
            if entry.depth() != 2 || !entry.file_type().is_dir() {
                continue;
            }
            match entry.file_name().to_str() {
                Some(name) => {
                    identifiers.insert(name.to_string());
                }
                None => warn!(path = %entry.path().display(), "skipping non-utf8 directory name"),
            }
        }

        identifiers
    }

    pub fn remove_dir(path: &Utf8Path) -> Result<(), CrunchyError> {
        if path.as_std_path().exists() {
            fs::remove_dir_all(path.as_std_path())
                .map_err(|err| CrunchyError::Filesystem(format!("remove {path}: {err}")))?;
        }
        Ok(())
    }

    pub fn write_bytes_atomic(path: &Utf8Path, content: &[u8]) -> Result<(), CrunchyError> {
        let parent = path
            .parent()
            .ok_or_else(|| CrunchyError::Filesystem("invalid destination path".to_string()))?;
        fs::create_dir_all(parent.as_std_path())
            .map_err(|err| CrunchyError::Filesystem(err.to_string()))?;
        let mut temp = Builder::new()
            .prefix(".crunchy-write")
            .tempfile_in(parent.as_std_path())
            .map_err(|err| CrunchyError::Filesystem(err.to_string()))?;
        io::Write::write_all(&mut temp, content)
            .map_err(|err| CrunchyError::Filesystem(err.to_string()))?;
        temp.persist(path.as_std_path())
            .map_err(|err| CrunchyError::Filesystem(err.to_string()))?;
        Ok(())
    }
}

#[cfg(unix)]
pub fn set_mode(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
pub fn set_mode(_path: &Path, _mode: u32) -> io::Result<()> {
    Ok(())
}

pub fn set_tree_modes(root: &Path) -> io::Result<()> {
    for entry in WalkDir::new(root) {
        let entry = entry.map_err(io::Error::from)?;
        let mode = if entry.file_type().is_dir() {
            DIR_MODE
        } else {
            FILE_MODE
        };
        set_mode(entry.path(), mode)?;
    }
    Ok(())
}
