use std::path::PathBuf;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::error::{QuoteFlowError, Result};
use crate::form::QuoteForm;
use crate::offer::OfferTier;
use crate::step::Step;

/// Fixed slot name for the persisted draft
pub const DRAFT_SLOT: &str = "taxonline_quote_draft";

/// The locally persisted wizard snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteDraft {
    pub step: Step,
    pub form: QuoteForm,
    pub selected_offer: Option<OfferTier>,
}

/// Outcome of loading the draft slot.
///
/// Corruption is distinguished from absence so callers can decide whether it
/// is worth surfacing; neither is an error that blocks the wizard.
#[derive(Debug)]
pub enum DraftLoad {
    Loaded(QuoteDraft),
    Absent,
    Corrupt(String),
}

impl DraftLoad {
    pub fn into_option(self) -> Option<QuoteDraft> {
        match self {
            DraftLoad::Loaded(draft) => Some(draft),
            _ => None,
        }
    }
}

/// Trait for persisting and restoring the wizard draft
#[async_trait]
pub trait DraftStore: Send + Sync {
    /// Overwrites any prior value in the slot
    async fn save(&self, draft: &QuoteDraft) -> Result<()>;
    async fn load(&self) -> Result<DraftLoad>;
    async fn clear(&self) -> Result<()>;
}

/// In-memory implementation of `DraftStore`, one JSON value per slot name
pub struct InMemoryDraftStore {
    slots: DashMap<String, String>,
}

impl InMemoryDraftStore {
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
        }
    }

    /// Write a raw payload into the slot, bypassing serialization
    pub fn put_raw(&self, payload: impl Into<String>) {
        self.slots.insert(DRAFT_SLOT.to_string(), payload.into());
    }
}

impl Default for InMemoryDraftStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DraftStore for InMemoryDraftStore {
    async fn save(&self, draft: &QuoteDraft) -> Result<()> {
        let payload = serde_json::to_string(draft)
            .map_err(|e| QuoteFlowError::DraftStorage(e.to_string()))?;
        self.slots.insert(DRAFT_SLOT.to_string(), payload);
        Ok(())
    }

    async fn load(&self) -> Result<DraftLoad> {
        match self.slots.get(DRAFT_SLOT) {
            Some(payload) => match serde_json::from_str(payload.value()) {
                Ok(draft) => Ok(DraftLoad::Loaded(draft)),
                Err(e) => Ok(DraftLoad::Corrupt(e.to_string())),
            },
            None => Ok(DraftLoad::Absent),
        }
    }

    async fn clear(&self) -> Result<()> {
        self.slots.remove(DRAFT_SLOT);
        Ok(())
    }
}

/// File-backed implementation of `DraftStore`, the local-storage analog for
/// native builds
pub struct FileDraftStore {
    path: PathBuf,
}

impl FileDraftStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl DraftStore for FileDraftStore {
    async fn save(&self, draft: &QuoteDraft) -> Result<()> {
        let payload = serde_json::to_string(draft)
            .map_err(|e| QuoteFlowError::DraftStorage(e.to_string()))?;
        tokio::fs::write(&self.path, payload)
            .await
            .map_err(|e| QuoteFlowError::DraftStorage(e.to_string()))
    }

    async fn load(&self) -> Result<DraftLoad> {
        let payload = match tokio::fs::read_to_string(&self.path).await {
            Ok(payload) => payload,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(DraftLoad::Absent),
            Err(e) => return Err(QuoteFlowError::DraftStorage(e.to_string())),
        };
        match serde_json::from_str(&payload) {
            Ok(draft) => Ok(DraftLoad::Loaded(draft)),
            Err(e) => Ok(DraftLoad::Corrupt(e.to_string())),
        }
    }

    async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(QuoteFlowError::DraftStorage(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_draft() -> QuoteDraft {
        QuoteDraft {
            step: Step::Wealth,
            form: QuoteForm::default(),
            selected_offer: None,
        }
    }

    #[tokio::test]
    async fn save_is_idempotent() {
        let store = InMemoryDraftStore::new();
        let draft = sample_draft();

        store.save(&draft).await.unwrap();
        store.save(&draft).await.unwrap();

        let loaded = store.load().await.unwrap().into_option().unwrap();
        assert_eq!(loaded, draft);
    }

    #[tokio::test]
    async fn empty_slot_loads_as_absent() {
        let store = InMemoryDraftStore::new();
        assert!(matches!(store.load().await.unwrap(), DraftLoad::Absent));
    }

    #[tokio::test]
    async fn malformed_payload_loads_as_corrupt() {
        let store = InMemoryDraftStore::new();
        store.put_raw("{not json");
        assert!(matches!(store.load().await.unwrap(), DraftLoad::Corrupt(_)));
    }

    #[tokio::test]
    async fn clear_removes_the_slot() {
        let store = InMemoryDraftStore::new();
        store.save(&sample_draft()).await.unwrap();
        store.clear().await.unwrap();
        assert!(matches!(store.load().await.unwrap(), DraftLoad::Absent));
    }

    #[tokio::test]
    async fn file_store_round_trips_and_flags_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DRAFT_SLOT);
        let store = FileDraftStore::new(&path);

        assert!(matches!(store.load().await.unwrap(), DraftLoad::Absent));

        let draft = sample_draft();
        store.save(&draft).await.unwrap();
        let loaded = store.load().await.unwrap().into_option().unwrap();
        assert_eq!(loaded, draft);

        tokio::fs::write(&path, "garbage").await.unwrap();
        assert!(matches!(store.load().await.unwrap(), DraftLoad::Corrupt(_)));

        store.clear().await.unwrap();
        assert!(matches!(store.load().await.unwrap(), DraftLoad::Absent));
        // clearing an already-empty slot is fine
        store.clear().await.unwrap();
    }
}
