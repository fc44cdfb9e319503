//! Reference-library ingestion.
//!
//! Bibliography entries the library does not know yet are pushed to the
//! [`ReferenceLibrary`] collaborator. The engine only reads the document;
//! persistence belongs to the collaborator.

use std::collections::HashSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::document::DocumentNode;
use crate::error::LibraryError;
use crate::references::{parse_reference, reference_entries};
use crate::ReferenceSettings;

const ROUGH_TITLE_CHARS: usize = 30;

/// Payload for creating a library record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCitation {
    pub title: String,
    pub authors: Vec<String>,
    pub year: i32,
    #[serde(rename = "type")]
    pub kind: String,
    pub source: String,
    pub tags: Vec<String>,
}

/// A record as stored by the library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCitation {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub year: Option<i32>,
}

#[async_trait]
pub trait ReferenceLibrary: Send + Sync {
    async fn create_citation(&self, citation: NewCitation) -> Result<StoredCitation, LibraryError>;
}

fn rough_title(title: &str) -> String {
    title.to_lowercase().chars().take(ROUGH_TITLE_CHARS).collect()
}

/// Parse the bibliography and create library records for entries whose id
/// and rough title are both unknown. Returns the records the library
/// accepted; per-entry failures are logged and skipped.
pub async fn ingest_references(
    root: &DocumentNode,
    existing: &[StoredCitation],
    library: &dyn ReferenceLibrary,
    settings: &ReferenceSettings,
) -> Vec<StoredCitation> {
    let mut known_ids: HashSet<String> = existing.iter().map(|c| c.id.clone()).collect();
    let mut known_titles: HashSet<String> = existing
        .iter()
        .filter_map(|c| c.title.as_deref())
        .map(rough_title)
        .collect();

    let mut stored = Vec::new();
    for entry in reference_entries(root, settings) {
        let Some(record) = parse_reference(&entry) else {
            continue;
        };
        let title = record.title.as_deref().map(rough_title);
        if known_ids.contains(&record.id)
            || title.as_ref().is_some_and(|t| known_titles.contains(t))
        {
            continue;
        }
        known_ids.insert(record.id.clone());
        if let Some(title) = title {
            known_titles.insert(title);
        }

        let payload = NewCitation {
            title: record
                .title
                .clone()
                .unwrap_or_else(|| "Unknown Title".to_string()),
            authors: record.authors.clone(),
            year: record.year,
            kind: "journal-article".into(),
            source: "manual-ingest".into(),
            tags: vec!["auto-imported".into()],
        };
        match library.create_citation(payload).await {
            Ok(citation) => {
                info!(id = %citation.id, reference = %record.id, "ingested reference");
                stored.push(citation);
            }
            Err(err) => warn!(reference = %record.id, error = %err, "failed to ingest reference"),
        }
    }
    stored
}
