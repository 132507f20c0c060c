use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chrono::Utc;
use models::{Rate, RateDefaults};
use tokio::sync::RwLock;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::pagination::Pagination;
use crate::rates::provider::RatesProvider;
use crate::storage::RecordGateway;

const ENTITY: &str = "rate";

/// Indexed in-memory rate collection with whole-file checkpointing.
///
/// Construct once at startup and share the returned `Arc`. Every mutation holds
/// the write lock through validation, the index change and the export, so the
/// exported file always reflects a state at or after that mutation. A failed
/// export restores the previous index entry before the error is returned.
pub struct RateStore<G: RecordGateway<Rate>> {
    index: RwLock<HashMap<String, Rate>>,
    gateway: Arc<G>,
    defaults: RateDefaults,
}

impl<G: RecordGateway<Rate>> RateStore<G> {
    /// Populate the index from `gateway.import()`. Import failures are fatal for the caller.
    pub async fn new(gateway: Arc<G>, defaults: RateDefaults) -> Result<Arc<Self>, ServiceError> {
        let imported = gateway.import().await?;
        let mut index = HashMap::with_capacity(imported.len());
        for rate in imported {
            if rate.id.is_empty() {
                return Err(ServiceError::Storage(format!("imported rate <{}> has no ID", rate.title)));
            }
            if let Some(prev) = index.insert(rate.id.clone(), rate) {
                warn!(id = %prev.id, "duplicate rate ID in import; keeping the last record");
            }
        }
        info!(count = index.len(), persistent = gateway.is_persistent(), "rates imported");
        Ok(Arc::new(Self { index: RwLock::new(index), gateway, defaults }))
    }

    #[cfg(test)]
    pub(crate) async fn count(&self) -> usize {
        self.index.read().await.len()
    }

    async fn persist(&self, index: &HashMap<String, Rate>) -> Result<(), ServiceError> {
        if !self.gateway.is_persistent() {
            return Ok(());
        }
        self.gateway.export(&sorted(index)).await
    }

    /// Sorted listing window. `query` and `query_type` are accepted but do not filter.
    pub async fn list(&self, query: Option<&str>, query_type: Option<&str>, page: Pagination) -> Vec<Rate> {
        let all = sorted(&*self.index.read().await);
        let selection = page.apply(all);
        info!(
            query = query.unwrap_or_default(),
            query_type = query_type.unwrap_or_default(),
            position = page.position,
            size = page.size,
            count = selection.len(),
            "list rates"
        );
        selection
    }

    /// Mint an ID, stamp audit fields and insert. Client-supplied IDs are always rejected.
    #[instrument(skip(self, candidate))]
    pub async fn create(&self, mut candidate: Rate, principal: &str) -> Result<Rate, ServiceError> {
        let mut index = self.index.write().await;
        if !candidate.id.is_empty() {
            if index.contains_key(&candidate.id) {
                return Err(ServiceError::Duplicate(format!("rate <{}> exists already", candidate.id)));
            }
            return Err(ServiceError::Validation(format!(
                "rate <{}> contains an ID generated on the client; this is not allowed",
                candidate.id
            )));
        }
        candidate.validate()?;
        candidate.apply_defaults(&self.defaults);

        let id = loop {
            let id = Uuid::new_v4().to_string();
            if !index.contains_key(&id) {
                break id;
            }
        };
        let now = Utc::now();
        candidate.id = id.clone();
        candidate.created_at = Some(now);
        candidate.created_by = Some(principal.to_string());
        candidate.modified_at = Some(now);
        candidate.modified_by = Some(principal.to_string());

        index.insert(id.clone(), candidate.clone());
        if let Err(e) = self.persist(&index).await {
            index.remove(&id);
            error!(%id, error = %e, "export after create failed; rolled back");
            return Err(e);
        }
        info!(%id, title = %candidate.title, "rate created");
        Ok(candidate)
    }

    pub async fn read(&self, id: &str) -> Result<Rate, ServiceError> {
        let rate = self
            .index
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| ServiceError::not_found(ENTITY, id))?;
        info!(%id, "read rate");
        Ok(rate)
    }

    /// Overwrite the mutable fields of `id` from `patch`.
    ///
    /// `createdAt`/`createdBy` in the patch must be absent or equal to the stored
    /// values (`createdBy` compared case-insensitively), otherwise `NotAllowed`.
    #[instrument(skip(self, patch))]
    pub async fn update(&self, id: &str, mut patch: Rate, principal: &str) -> Result<Rate, ServiceError> {
        let mut index = self.index.write().await;
        let previous = index.get(id).cloned().ok_or_else(|| ServiceError::not_found(ENTITY, id))?;
        patch.validate()?;

        if let Some(created_at) = patch.created_at {
            if previous.created_at != Some(created_at) {
                return Err(ServiceError::NotAllowed(format!("rate <{}>: createdAt can not be modified", id)));
            }
        }
        if let Some(created_by) = patch.created_by.as_deref() {
            let same = previous
                .created_by
                .as_deref()
                .is_some_and(|stored| stored.eq_ignore_ascii_case(created_by));
            if !same {
                return Err(ServiceError::NotAllowed(format!("rate <{}>: createdBy can not be modified", id)));
            }
        }
        if !patch.id.is_empty() && patch.id != id {
            warn!(%id, patch_id = %patch.id, "ignoring ID supplied in update body");
        }

        patch.apply_defaults(&self.defaults);
        let updated = Rate {
            id: previous.id.clone(),
            title: patch.title,
            amount: patch.amount,
            currency: patch.currency,
            rate_type: patch.rate_type,
            description: patch.description,
            created_at: previous.created_at,
            created_by: previous.created_by.clone(),
            modified_at: Some(Utc::now()),
            modified_by: Some(principal.to_string()),
        };

        index.insert(id.to_string(), updated.clone());
        if let Err(e) = self.persist(&index).await {
            index.insert(id.to_string(), previous);
            error!(%id, error = %e, "export after update failed; rolled back");
            return Err(e);
        }
        info!(%id, "rate updated");
        Ok(updated)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: &str) -> Result<(), ServiceError> {
        let mut index = self.index.write().await;
        if !index.contains_key(id) {
            return Err(ServiceError::NotFound(format!("rate <{}> was not found", id)));
        }
        let removed = index.remove(id).ok_or_else(|| {
            ServiceError::Internal(format!("rate <{}> can not be removed, because it does not exist in the index", id))
        })?;
        if let Err(e) = self.persist(&index).await {
            index.insert(id.to_string(), removed);
            error!(%id, error = %e, "export after delete failed; rolled back");
            return Err(e);
        }
        info!(%id, "rate deleted");
        Ok(())
    }
}

fn sorted(index: &HashMap<String, Rate>) -> Vec<Rate> {
    let mut all: Vec<Rate> = index.values().cloned().collect();
    all.sort_by(Rate::list_order);
    all
}

#[async_trait]
impl<G: RecordGateway<Rate>> RatesProvider for RateStore<G> {
    async fn list(&self, query: Option<&str>, query_type: Option<&str>, page: Pagination) -> Vec<Rate> {
        self.list(query, query_type, page).await
    }

    async fn create(&self, rate: Rate, principal: &str) -> Result<Rate, ServiceError> {
        self.create(rate, principal).await
    }

    async fn read(&self, id: &str) -> Result<Rate, ServiceError> {
        self.read(id).await
    }

    async fn update(&self, id: &str, rate: Rate, principal: &str) -> Result<Rate, ServiceError> {
        self.update(id, rate, principal).await
    }

    async fn delete(&self, id: &str) -> Result<(), ServiceError> {
        self.delete(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicBool, Ordering};

    use chrono::Duration;
    use models::{Currency, RateType};

    use crate::storage::JsonFileGateway;

    type FileStore = RateStore<JsonFileGateway<Rate>>;

    async fn transient_store() -> Arc<FileStore> {
        let gw = JsonFileGateway::new("unused.json").persistent(false);
        RateStore::new(Arc::new(gw), RateDefaults::default()).await.expect("store init")
    }

    fn tmp_data_file() -> PathBuf {
        std::env::temp_dir().join(format!("rate_store_{}", Uuid::new_v4())).join("rates.json")
    }

    async fn file_store(path: &PathBuf) -> Result<Arc<FileStore>, ServiceError> {
        RateStore::new(Arc::new(JsonFileGateway::new(path)), RateDefaults::default()).await
    }

    /// In-memory gateway whose exports can be switched to fail.
    #[derive(Default)]
    struct FlakyGateway {
        fail: AtomicBool,
        exported: std::sync::Mutex<Vec<Rate>>,
    }

    #[async_trait]
    impl RecordGateway<Rate> for FlakyGateway {
        fn is_persistent(&self) -> bool { true }
        async fn import(&self) -> Result<Vec<Rate>, ServiceError> { Ok(Vec::new()) }
        async fn export(&self, records: &[Rate]) -> Result<(), ServiceError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(ServiceError::Storage("disk full".into()));
            }
            *self.exported.lock().unwrap() = records.to_vec();
            Ok(())
        }
    }

    #[tokio::test]
    async fn consulting_rate_lifecycle() -> Result<(), anyhow::Error> {
        let store = transient_store().await;

        let created = store.create(Rate::new("Consulting", 120.0), "alice").await?;
        assert!(!created.id.is_empty());
        assert_eq!(created.currency, Some(Currency::Chf));
        assert_eq!(created.rate_type, Some(RateType::StandardRate));
        assert_eq!(created.created_by.as_deref(), Some("alice"));
        assert_eq!(created.modified_by.as_deref(), Some("alice"));
        assert_eq!(created.amount, 120.0);

        let mut patch = Rate::new("Consulting Senior", 150.0);
        patch.created_at = created.created_at;
        patch.created_by = created.created_by.clone();
        let updated = store.update(&created.id, patch, "bob").await?;
        assert_eq!(updated.amount, 150.0);
        assert_eq!(updated.title, "Consulting Senior");
        assert_eq!(updated.modified_by.as_deref(), Some("bob"));
        assert_eq!(updated.created_at, created.created_at);
        assert_eq!(updated.created_by.as_deref(), Some("alice"));
        assert!(updated.modified_at >= created.modified_at);

        store.delete(&created.id).await?;
        assert!(matches!(store.read(&created.id).await, Err(ServiceError::NotFound(_))));
        Ok(())
    }

    #[tokio::test]
    async fn read_returns_candidate_plus_server_fields() -> Result<(), anyhow::Error> {
        let store = transient_store().await;
        let candidate = Rate::new("Travel", 80.5).with_currency(Currency::Eur).with_description("per hour on the road");
        let created = store.create(candidate.clone(), "alice").await?;
        let read = store.read(&created.id).await?;

        assert_eq!(read, created);
        assert_eq!(read.title, candidate.title);
        assert_eq!(read.amount, candidate.amount);
        assert_eq!(read.currency, candidate.currency);
        assert_eq!(read.description, candidate.description);
        Ok(())
    }

    #[tokio::test]
    async fn client_supplied_ids_are_rejected() -> Result<(), anyhow::Error> {
        let store = transient_store().await;
        let existing = store.create(Rate::new("Consulting", 100.0), "alice").await?;

        let mut clash = Rate::new("Other", 1.0);
        clash.id = existing.id.clone();
        assert!(matches!(store.create(clash, "alice").await, Err(ServiceError::Duplicate(_))));

        let mut fresh = Rate::new("Other", 1.0);
        fresh.id = "my-own-id".into();
        assert!(matches!(store.create(fresh, "alice").await, Err(ServiceError::Validation(_))));

        assert_eq!(store.count().await, 1);
        Ok(())
    }

    #[tokio::test]
    async fn create_validates_title_and_amount() {
        let store = transient_store().await;
        assert!(matches!(store.create(Rate::new("", 1.0), "alice").await, Err(ServiceError::Validation(_))));
        assert!(matches!(store.create(Rate::new("Negative", -1.0), "alice").await, Err(ServiceError::Validation(_))));
        assert_eq!(store.count().await, 0);
    }

    #[tokio::test]
    async fn minted_ids_are_unique() -> Result<(), anyhow::Error> {
        let store = transient_store().await;
        let mut ids = HashSet::new();
        for i in 0..200 {
            let rate = store.create(Rate::new(format!("rate {i}"), i as f64), "alice").await?;
            assert!(!rate.id.is_empty());
            assert!(ids.insert(rate.id));
        }
        Ok(())
    }

    #[tokio::test]
    async fn update_never_changes_identity_or_creation_audit() -> Result<(), anyhow::Error> {
        let store = transient_store().await;
        let created = store.create(Rate::new("Consulting", 120.0), "alice").await?;

        // omitted audit fields are fine; a foreign id in the body is ignored
        let mut patch = Rate::new("Consulting", 130.0);
        patch.id = "something-else".into();
        let updated = store.update(&created.id, patch, "bob").await?;
        assert_eq!(updated.id, created.id);
        assert_eq!(updated.created_at, created.created_at);
        assert_eq!(updated.created_by, created.created_by);
        assert!(matches!(store.read("something-else").await, Err(ServiceError::NotFound(_))));

        // createdBy compared case-insensitively
        let mut patch = Rate::new("Consulting", 140.0);
        patch.created_by = Some("ALICE".into());
        assert!(store.update(&created.id, patch, "bob").await.is_ok());

        let mut tampered_by = Rate::new("Consulting", 150.0);
        tampered_by.created_by = Some("mallory".into());
        assert!(matches!(store.update(&created.id, tampered_by, "bob").await, Err(ServiceError::NotAllowed(_))));

        let mut tampered_at = Rate::new("Consulting", 150.0);
        tampered_at.created_at = created.created_at.map(|t| t - Duration::days(1));
        assert!(matches!(store.update(&created.id, tampered_at, "bob").await, Err(ServiceError::NotAllowed(_))));

        let stored = store.read(&created.id).await?;
        assert_eq!(stored.amount, 140.0);
        assert_eq!(stored.created_by.as_deref(), Some("alice"));
        Ok(())
    }

    #[tokio::test]
    async fn update_validates_and_fills_defaults() -> Result<(), anyhow::Error> {
        let store = transient_store().await;
        let created = store
            .create(Rate::new("Night shift", 90.0).with_currency(Currency::Usd).with_type(RateType::OvertimeRate), "alice")
            .await?;

        assert!(matches!(store.update("nope", Rate::new("x", 1.0), "bob").await, Err(ServiceError::NotFound(_))));
        assert!(matches!(store.update(&created.id, Rate::new(" ", 1.0), "bob").await, Err(ServiceError::Validation(_))));
        assert!(matches!(store.update(&created.id, Rate::new("x", -5.0), "bob").await, Err(ServiceError::Validation(_))));

        let updated = store.update(&created.id, Rate::new("Night shift", 95.0), "bob").await?;
        assert_eq!(updated.currency, Some(Currency::Chf));
        assert_eq!(updated.rate_type, Some(RateType::StandardRate));
        assert_eq!(updated.description, None);
        Ok(())
    }

    #[tokio::test]
    async fn delete_twice_reports_not_found() -> Result<(), anyhow::Error> {
        let store = transient_store().await;
        let created = store.create(Rate::new("Consulting", 120.0), "alice").await?;
        store.delete(&created.id).await?;
        assert!(matches!(store.delete(&created.id).await, Err(ServiceError::NotFound(_))));
        Ok(())
    }

    #[tokio::test]
    async fn list_is_sorted_and_paginated() -> Result<(), anyhow::Error> {
        let store = transient_store().await;
        for title in ["delta", "Alpha", "charlie", "Bravo", "echo"] {
            store.create(Rate::new(title, 10.0), "alice").await?;
        }

        let all = store.list(None, None, Pagination::new(0, 100)).await;
        let titles: Vec<&str> = all.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["Alpha", "Bravo", "charlie", "delta", "echo"]);

        let page = store.list(None, None, Pagination::new(1, 2)).await;
        let titles: Vec<&str> = page.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["Bravo", "charlie"]);

        assert!(store.list(None, None, Pagination::new(5, 10)).await.is_empty());
        assert!(store.list(None, None, Pagination::new(0, 0)).await.is_empty());
        assert_eq!(store.list(None, None, Pagination::new(3, 10)).await.len(), 2);

        // the query placeholder does not filter
        let queried = store.list(Some("zzz"), Some("title"), Pagination::new(0, 100)).await;
        assert_eq!(queried, all);
        Ok(())
    }

    #[tokio::test]
    async fn mutations_are_checkpointed_and_reimported() -> Result<(), anyhow::Error> {
        let path = tmp_data_file();
        let store = file_store(&path).await?;

        let a = store.create(Rate::new("Consulting", 120.0), "alice").await?;
        let b = store.create(Rate::new("Audit", 200.0).with_type(RateType::ExternalRate), "alice").await?;
        store.update(&a.id, Rate::new("Consulting Senior", 150.0), "bob").await?;
        let c = store.create(Rate::new("Coffee", 3.5), "carol").await?;
        store.delete(&c.id).await?;

        let reloaded = file_store(&path).await?;
        let before = store.list(None, None, Pagination::new(0, 100)).await;
        let after = reloaded.list(None, None, Pagination::new(0, 100)).await;
        assert_eq!(before, after);
        assert_eq!(after.len(), 2);
        assert_eq!(reloaded.read(&b.id).await?.rate_type, Some(RateType::ExternalRate));
        assert_eq!(reloaded.read(&a.id).await?.modified_by.as_deref(), Some("bob"));

        let _ = tokio::fs::remove_dir_all(path.parent().unwrap()).await;
        Ok(())
    }

    #[tokio::test]
    async fn corrupt_data_file_fails_construction() -> Result<(), anyhow::Error> {
        let path = tmp_data_file();
        tokio::fs::create_dir_all(path.parent().unwrap()).await?;
        tokio::fs::write(&path, b"[{\"title\": ").await?;
        assert!(matches!(file_store(&path).await, Err(ServiceError::Storage(_))));

        tokio::fs::write(&path, br#"[{"title": "No id", "amount": 1.0}]"#).await?;
        assert!(matches!(file_store(&path).await, Err(ServiceError::Storage(_))));

        let _ = tokio::fs::remove_dir_all(path.parent().unwrap()).await;
        Ok(())
    }

    #[tokio::test]
    async fn failed_export_rolls_back_mutation() -> Result<(), anyhow::Error> {
        let gateway = Arc::new(FlakyGateway::default());
        let store = RateStore::new(Arc::clone(&gateway), RateDefaults::default()).await?;
        let kept = store.create(Rate::new("Consulting", 120.0), "alice").await?;
        assert_eq!(gateway.exported.lock().unwrap().len(), 1);

        gateway.fail.store(true, Ordering::SeqCst);
        assert!(matches!(store.create(Rate::new("Lost", 1.0), "alice").await, Err(ServiceError::Storage(_))));
        assert!(matches!(store.update(&kept.id, Rate::new("Changed", 1.0), "bob").await, Err(ServiceError::Storage(_))));
        assert!(matches!(store.delete(&kept.id).await, Err(ServiceError::Storage(_))));

        let all = store.list(None, None, Pagination::default()).await;
        assert_eq!(all, vec![kept]);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_creates_are_all_kept() -> Result<(), anyhow::Error> {
        let path = tmp_data_file();
        let store = file_store(&path).await?;

        let mut handles = Vec::new();
        for i in 0..32 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move { store.create(Rate::new(format!("rate {i:02}"), i as f64), "alice").await }));
        }
        for h in handles {
            h.await??;
        }

        assert_eq!(store.count().await, 32);
        let reloaded = file_store(&path).await?;
        assert_eq!(reloaded.count().await, 32);

        let _ = tokio::fs::remove_dir_all(path.parent().unwrap()).await;
        Ok(())
    }
}
