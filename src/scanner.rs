use tracing::{error, info, warn};

use crate::archive::{ArchiveClient, CreatorField, SearchDoc, SearchQuery};
use crate::domain::{CollectionName, Identifier, Item, sanitize_name};

const UNKNOWN_CREATOR: &str = "unknown";

pub struct CollectionScanner<'a, A: ArchiveClient> {
    archive: &'a A,
}

impl<'a, A: ArchiveClient> CollectionScanner<'a, A> {
    pub fn new(archive: &'a A) -> Self {
        Self { archive }
    }

    pub fn scan(&self, collection: &CollectionName, limit: usize) -> Vec<Item> {
        let query = SearchQuery::latest_in_collection(collection, limit);
        let docs = match self.archive.search(&query) {
            Ok(docs) => docs,
            Err(err) => {
                error!(%collection, error = %err, "error searching collection");
                return Vec::new();
            }
        };

        let items: Vec<Item> = docs
            .into_iter()
            .filter_map(|doc| normalize(doc, collection))
            .take(limit)
            .collect();
        info!(%collection, count = items.len(), "found items");
        items
    }
}

fn normalize(doc: SearchDoc, collection: &CollectionName) -> Option<Item> {
    let Some(raw_identifier) = doc.identifier else {
        warn!(%collection, "search result without identifier, skipping");
        return None;
    };
    let identifier = match raw_identifier.parse::<Identifier>() {
        Ok(identifier) => identifier,
        Err(err) => {
            warn!(%collection, error = %err, "skipping search result");
            return None;
        }
    };

    let creator = match doc.creator {
        Some(CreatorField::One(name)) => name,
        Some(CreatorField::Many(names)) => names
            .into_iter()
            .next()
            .unwrap_or_else(|| collection.as_str().to_string()),
        None => collection.as_str().to_string(),
    };

    Some(Item {
        identifier,
        creator: creator_dir_name(&creator, collection),
    })
}

pub fn creator_dir_name(creator: &str, collection: &CollectionName) -> String {
    let sanitized = sanitize_name(creator);
    if !sanitized.is_empty() {
        return sanitized;
    }
    let fallback = sanitize_name(collection.as_str());
    if !fallback.is_empty() {
        return fallback;
    }
    UNKNOWN_CREATOR.to_string()
}
