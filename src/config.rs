use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use directories::BaseDirs;
use serde::{Deserialize, Serialize};

use crate::domain::{CollectionName, TrackingStrategy};
use crate::error::CrunchyError;
use crate::store::LOG_DIR_NAME;

pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";
pub const DEFAULT_DOWNLOAD_DIR: &str = "~/Music/live-music";
pub const DEFAULT_MAX_ITEMS: usize = 1;
pub const DEFAULT_WORKERS: usize = 2;
pub const DEFAULT_MEDIA_GLOB: &str = "*.mp3";
pub const DEFAULT_RETRIES: u32 = 3;
pub const LEDGER_FILE_NAME: &str = "downloaded_shows.json";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub collections: Option<Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub collections: Vec<CollectionName>,
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: &Utf8Path) -> Result<ResolvedConfig, CrunchyError> {
        if !path.as_std_path().exists() {
            return Err(CrunchyError::MissingConfig(path.as_std_path().to_path_buf()));
        }

        let content = fs::read_to_string(path.as_std_path())
            .map_err(|_| CrunchyError::ConfigRead(path.as_std_path().to_path_buf()))?;
        if content.trim().is_empty() {
            return Err(CrunchyError::NoCollections);
        }
        let config: Config = serde_yaml::from_str(&content)
            .map_err(|err| CrunchyError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, CrunchyError> {
        let collections = config
            .collections
            .unwrap_or_default()
            .iter()
            .map(|name| name.parse())
            .collect::<Result<Vec<CollectionName>, CrunchyError>>()?;

        if collections.is_empty() {
            return Err(CrunchyError::NoCollections);
        }

        Ok(ResolvedConfig { collections })
    }
}

#[derive(Debug, Clone)]
pub struct RunSettings {
    pub download_dir: Utf8PathBuf,
    pub log_dir: Utf8PathBuf,
    pub ledger_path: Utf8PathBuf,
    pub max_items: usize,
    pub workers: usize,
    pub dry_run: bool,
    pub media_glob: String,
    pub retries: u32,
    pub tracking: TrackingStrategy,
}

impl RunSettings {
    pub fn new(download_dir: Utf8PathBuf) -> Self {
        let log_dir = download_dir.join(LOG_DIR_NAME);
        let ledger_path = log_dir.join(LEDGER_FILE_NAME);
        Self {
            download_dir,
            log_dir,
            ledger_path,
            max_items: DEFAULT_MAX_ITEMS,
            workers: DEFAULT_WORKERS,
            dry_run: false,
            media_glob: DEFAULT_MEDIA_GLOB.to_string(),
            retries: DEFAULT_RETRIES,
            tracking: TrackingStrategy::Ledger,
        }
    }

    pub fn validate(&self) -> Result<(), CrunchyError> {
        if self.workers == 0 {
            return Err(CrunchyError::InvalidSetting(
                "worker count must be at least 1".to_string(),
            ));
        }
        if self.max_items == 0 {
            return Err(CrunchyError::InvalidSetting(
                "max shows per collection must be at least 1".to_string(),
            ));
        }
        if self.media_glob.trim().is_empty() {
            return Err(CrunchyError::InvalidSetting(
                "media glob must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

pub fn expand_home(path: &str) -> Result<Utf8PathBuf, CrunchyError> {
    let rest = match path.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest.trim_start_matches('/'),
        _ => return Ok(Utf8PathBuf::from(path)),
    };

    let home = BaseDirs::new()
        .and_then(|dirs| Utf8PathBuf::from_path_buf(dirs.home_dir().to_path_buf()).ok())
        .ok_or_else(|| CrunchyError::Filesystem("unable to resolve home directory".to_string()))?;

    if rest.is_empty() {
        Ok(home)
    } else {
        Ok(home.join(rest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_keeps_configured_order() {
        let config = Config {
            collections: Some(vec![
                "GratefulDead".to_string(),
                " Phish ".to_string(),
                "UmphreysMcGee".to_string(),
            ]),
        };

        let resolved = ConfigLoader::resolve_config(config).unwrap();
        let names: Vec<&str> = resolved.collections.iter().map(|c| c.as_str()).collect();
        assert_eq!(names, vec!["GratefulDead", "Phish", "UmphreysMcGee"]);
    }

    #[test]
    fn settings_default_under_download_dir() {
        let settings = RunSettings::new(Utf8PathBuf::from("/srv/music"));
        assert_eq!(settings.log_dir, Utf8PathBuf::from("/srv/music/logs"));
        assert_eq!(
            settings.ledger_path,
            Utf8PathBuf::from("/srv/music/logs/downloaded_shows.json")
        );
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn expand_home_leaves_plain_paths() {
        assert_eq!(
            expand_home("/mnt/music").unwrap(),
            Utf8PathBuf::from("/mnt/music")
        );
        assert_eq!(expand_home("~user").unwrap(), Utf8PathBuf::from("~user"));
    }
}
