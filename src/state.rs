//! Cross-run deduplication state.
//!
//! Every item is identified by a [`fingerprint`] of its title and link. The
//! set of fingerprints seen by earlier runs is persisted as a JSON array and
//! only ever grows. A missing or unreadable state file is an empty set.

use crate::models::CandidateItem;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::error::Error;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument, warn};

/// Deterministic identifier of an item: hex SHA-256 of `title ++ link`.
///
/// Used both as the dedup key and as the feed item's `guid`.
pub fn fingerprint(title: &str, link: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(title.as_bytes());
    hasher.update(link.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Fingerprint of a [`CandidateItem`].
pub fn item_fingerprint(item: &CandidateItem) -> String {
    fingerprint(&item.title, &item.link)
}

/// Set of fingerprints emitted by previous runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeenSet {
    ids: BTreeSet<String>,
}

impl SeenSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `id`; returns `true` if it was not already present.
    pub fn insert(&mut self, id: String) -> bool {
        self.ids.insert(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Parse a JSON array of fingerprints. Anything else is an empty set.
    pub fn from_json(raw: &str) -> Self {
        match serde_json::from_str::<Vec<String>>(raw) {
            Ok(ids) => Self {
                ids: ids.into_iter().collect(),
            },
            Err(e) => {
                warn!(error = %e, "Seen-set is corrupt; starting empty");
                Self::new()
            }
        }
    }

    /// Serialize as a sorted JSON array.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.ids)
    }

    /// Load the set from `path`. Never fails.
    #[instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub async fn load(path: &Path) -> Self {
        match fs::read_to_string(path).await {
            Ok(raw) => {
                let set = Self::from_json(&raw);
                info!(count = set.len(), "Loaded seen-set");
                set
            }
            Err(e) => {
                info!(error = %e, "No readable seen-set; starting empty");
                Self::new()
            }
        }
    }

    /// Write the whole set to `path`.
    #[instrument(level = "info", skip_all, fields(path = %path.display(), count = self.len()))]
    pub async fn save(&self, path: &Path) -> Result<(), Box<dyn Error>> {
        let json = self.to_json()?;
        fs::write(path, json).await?;
        info!("Wrote seen-set");
        Ok(())
    }
}
