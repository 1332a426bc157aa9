//! Prompt history: newest first, at most one entry per prompt text.
//!
//! The list is loaded once at startup and written back after every mutation.
//! Neither a corrupt stored list nor a failed write ever reaches the caller;
//! both are logged and the in-memory list stays authoritative.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, error, warn};

use crate::constants::HISTORY_KEY;
use crate::generation::GenerationResult;
use crate::storage::KeyValueStore;

/// Inserts `entry` stamped with `now`, dropping any older entry with the same prompt.
pub fn upsert(list: &[GenerationResult], entry: GenerationResult, now: i64) -> Vec<GenerationResult> {
    let mut next = Vec::with_capacity(list.len() + 1);
    next.extend(
        list.iter()
            .filter(|existing| existing.prompt != entry.prompt)
            .cloned(),
    );
    next.insert(
        0,
        GenerationResult {
            timestamp: Some(now),
            ..entry
        },
    );
    next
}

/// The persisted history list.
pub struct HistoryStore {
    store: Arc<dyn KeyValueStore>,
    entries: RwLock<Vec<GenerationResult>>,
}

impl std::fmt::Debug for HistoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryStore").finish_non_exhaustive()
    }
}

impl HistoryStore {
    /// Loads the stored list; anything unreadable becomes an empty history.
    pub async fn load(store: Arc<dyn KeyValueStore>) -> Self {
        let entries = match store.read(HISTORY_KEY).await {
            Ok(Some(raw)) => match serde_json::from_str::<Vec<GenerationResult>>(&raw) {
                Ok(entries) => {
                    debug!("Loaded {} history entries", entries.len());
                    entries
                }
                Err(err) => {
                    error!("Failed to parse stored prompt history, starting empty: {err}");
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(err) => {
                error!("Failed to load prompt history, starting empty: {err}");
                Vec::new()
            }
        };
        Self {
            store,
            entries: RwLock::new(entries),
        }
    }

    /// A snapshot of the list, newest first.
    pub async fn entries(&self) -> Vec<GenerationResult> {
        self.entries.read().await.clone()
    }

    /// The entry at `index`, newest first.
    pub async fn get(&self, index: usize) -> Option<GenerationResult> {
        self.entries.read().await.get(index).cloned()
    }

    /// Saves `entry` at the top with a fresh timestamp and persists the list.
    ///
    /// The write lock is held until storage has the new list, so concurrent
    /// saves reach storage in the same order as they changed memory.
    pub async fn save(&self, entry: GenerationResult) -> Vec<GenerationResult> {
        let mut entries = self.entries.write().await;
        *entries = upsert(&entries, entry, Utc::now().timestamp_millis());
        self.persist(&entries).await;
        entries.clone()
    }

    /// Writes `list` to storage; failures are logged, never returned.
    pub async fn persist(&self, list: &[GenerationResult]) {
        let raw = match serde_json::to_string(list) {
            Ok(raw) => raw,
            Err(err) => {
                error!("Failed to serialize prompt history: {err}");
                return;
            }
        };
        if let Err(err) = self.store.write(HISTORY_KEY, &raw).await {
            warn!("Failed to save prompt history: {err}");
        }
    }
}
