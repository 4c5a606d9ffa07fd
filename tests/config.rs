use std::fs;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use crunchy::config::{Config, ConfigLoader, RunSettings};
use crunchy::error::CrunchyError;

fn write_config(temp: &tempfile::TempDir, content: &str) -> Utf8PathBuf {
    let path = Utf8PathBuf::from_path_buf(temp.path().join("config.yaml")).unwrap();
    fs::write(path.as_std_path(), content).unwrap();
    path
}

#[test]
fn loads_collections_in_order() {
    let temp = tempfile::tempdir().unwrap();
    let path = write_config(
        &temp,
        "collections:\n  - GratefulDead\n  - Phish\n  - UmphreysMcGee\n",
    );

    let resolved = ConfigLoader::resolve(&path).unwrap();
    let names: Vec<String> = resolved
        .collections
        .iter()
        .map(|name| name.to_string())
        .collect();
    assert_eq!(names, vec!["GratefulDead", "Phish", "UmphreysMcGee"]);
}

#[test]
fn missing_file_is_fatal() {
    let temp = tempfile::tempdir().unwrap();
    let path = Utf8PathBuf::from_path_buf(temp.path().join("absent.yaml")).unwrap();
    assert_matches!(
        ConfigLoader::resolve(&path),
        Err(CrunchyError::MissingConfig(_))
    );
}

#[test]
fn empty_collections_are_fatal() {
    let temp = tempfile::tempdir().unwrap();
    for content in ["collections: []\n", "collections:\n", "other: 1\n", "", "   \n"] {
        let path = write_config(&temp, content);
        assert_matches!(
            ConfigLoader::resolve(&path),
            Err(CrunchyError::NoCollections),
            "content {content:?}"
        );
    }
}

#[test]
fn malformed_yaml_is_fatal() {
    let temp = tempfile::tempdir().unwrap();
    let path = write_config(&temp, "collections: [GratefulDead\n");
    assert_matches!(
        ConfigLoader::resolve(&path),
        Err(CrunchyError::ConfigParse(_))
    );

    let path = write_config(&temp, "collections: GratefulDead\n");
    assert_matches!(
        ConfigLoader::resolve(&path),
        Err(CrunchyError::ConfigParse(_))
    );
}

#[test]
fn blank_collection_name_is_fatal() {
    let config = Config {
        collections: Some(vec!["Phish".to_string(), "  ".to_string()]),
    };
    assert_matches!(
        ConfigLoader::resolve_config(config),
        Err(CrunchyError::InvalidCollection(_))
    );
}

#[test]
fn zero_workers_rejected() {
    let mut settings = RunSettings::new(Utf8PathBuf::from("/srv/music"));
    settings.workers = 0;
    assert_matches!(settings.validate(), Err(CrunchyError::InvalidSetting(_)));

    let mut settings = RunSettings::new(Utf8PathBuf::from("/srv/music"));
    settings.max_items = 0;
    assert_matches!(settings.validate(), Err(CrunchyError::InvalidSetting(_)));
}
