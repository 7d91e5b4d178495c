//! Storage, KV and blob ports
//!
//! Hexagonal seams: the engine talks to persistence through these traits
//! and never embeds business rules in them. The relational store behind
//! [`FormStore`]/[`ResponseStore`] uses parameterized statements; the
//! [`KvStore`] backs rate-limit counters and anti-resubmission markers;
//! the [`BlobStore`] hosts uploaded media.
//!
//! In-memory implementations ship here for tests and embedding.

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::model::{Form, FormStatus, Response};
use crate::{FormError, Result};

// =============================================================================
// Ports
// =============================================================================

/// Form row persistence.
#[async_trait]
pub trait FormStore: Send + Sync {
    /// Insert a new form. Implementations with a unique slug constraint
    /// report a duplicate as [`FormError::Conflict`].
    async fn insert(&self, form: &Form) -> Result<()>;

    /// Full-row update by id.
    async fn update(&self, form: &Form) -> Result<()>;

    /// Resolve a form by slug, falling back to id (public lookups accept
    /// either).
    async fn find_by_slug_or_id(&self, key: &str) -> Result<Option<Form>>;

    /// Resolve by slug only (slug allocation probes).
    async fn find_by_slug(&self, slug: &str) -> Result<Option<Form>>;

    /// All forms, most recently updated first.
    async fn list_all(&self) -> Result<Vec<Form>>;

    /// Delete by slug. Response cascade is orchestrated by the service.
    async fn delete(&self, slug: &str) -> Result<()>;
}

/// Response row persistence. The `data` payload is opaque free-form
/// key→value per row; no fixed column set.
#[async_trait]
pub trait ResponseStore: Send + Sync {
    async fn insert(&self, response: &Response) -> Result<()>;

    async fn find_by_id(&self, id: &str) -> Result<Option<Response>>;

    /// Responses for a form, newest first.
    async fn list_by_form(&self, slug: &str) -> Result<Vec<Response>>;

    async fn count_by_form(&self, slug: &str) -> Result<u64>;

    /// Full replace of the `data` map for one row.
    async fn update_data(&self, id: &str, data: HashMap<String, Value>) -> Result<()>;

    async fn delete(&self, id: &str) -> Result<()>;

    async fn delete_all_by_form(&self, slug: &str) -> Result<()>;
}

/// Expiring key-value collaborator for rate-limit counters and dedupe
/// markers.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn put(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<()>;
}

/// External media host for uploaded files. Failures surface as a
/// user-facing upload error, never a silent inline fallback.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Upload a file, returning its public URL.
    async fn upload(&self, filename: &str, bytes: Vec<u8>) -> Result<String>;
}

// =============================================================================
// In-memory implementations
// =============================================================================

/// In-memory form store (tests and embedding).
#[derive(Default)]
pub struct InMemoryFormStore {
    forms: RwLock<HashMap<String, Form>>,
}

impl InMemoryFormStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FormStore for InMemoryFormStore {
    async fn insert(&self, form: &Form) -> Result<()> {
        let mut forms = self.forms.write();
        if forms.values().any(|f| f.slug == form.slug) {
            return Err(FormError::Conflict(form.slug.clone()));
        }
        forms.insert(form.id.clone(), form.clone());
        Ok(())
    }

    async fn update(&self, form: &Form) -> Result<()> {
        let mut forms = self.forms.write();
        if !forms.contains_key(&form.id) {
            return Err(FormError::NotFound);
        }
        forms.insert(form.id.clone(), form.clone());
        Ok(())
    }

    async fn find_by_slug_or_id(&self, key: &str) -> Result<Option<Form>> {
        let forms = self.forms.read();
        Ok(forms
            .values()
            .find(|f| f.slug == key || f.id == key)
            .cloned())
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<Form>> {
        let forms = self.forms.read();
        Ok(forms.values().find(|f| f.slug == slug).cloned())
    }

    async fn list_all(&self) -> Result<Vec<Form>> {
        let forms = self.forms.read();
        let mut all: Vec<Form> = forms.values().cloned().collect();
        all.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(all)
    }

    async fn delete(&self, slug: &str) -> Result<()> {
        let mut forms = self.forms.write();
        forms.retain(|_, f| f.slug != slug);
        Ok(())
    }
}

/// In-memory response store (tests and embedding).
#[derive(Default)]
pub struct InMemoryResponseStore {
    responses: RwLock<Vec<Response>>,
}

impl InMemoryResponseStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResponseStore for InMemoryResponseStore {
    async fn insert(&self, response: &Response) -> Result<()> {
        self.responses.write().push(response.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Response>> {
        let responses = self.responses.read();
        Ok(responses.iter().find(|r| r.id == id).cloned())
    }

    async fn list_by_form(&self, slug: &str) -> Result<Vec<Response>> {
        let responses = self.responses.read();
        let mut rows: Vec<Response> = responses
            .iter()
            .filter(|r| r.form_slug == slug)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
        Ok(rows)
    }

    async fn count_by_form(&self, slug: &str) -> Result<u64> {
        let responses = self.responses.read();
        Ok(responses.iter().filter(|r| r.form_slug == slug).count() as u64)
    }

    async fn update_data(&self, id: &str, data: HashMap<String, Value>) -> Result<()> {
        let mut responses = self.responses.write();
        match responses.iter_mut().find(|r| r.id == id) {
            Some(row) => {
                row.data = data;
                Ok(())
            }
            None => Err(FormError::ResponseNotFound),
        }
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.responses.write().retain(|r| r.id != id);
        Ok(())
    }

    async fn delete_all_by_form(&self, slug: &str) -> Result<()> {
        self.responses.write().retain(|r| r.form_slug != slug);
        Ok(())
    }
}

/// In-memory expiring KV (tests and embedding).
#[derive(Default)]
pub struct InMemoryKvStore {
    entries: DashMap<String, (String, Instant)>,
}

impl InMemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for InMemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let expired = match self.entries.get(key) {
            Some(entry) => {
                if entry.value().1 > Instant::now() {
                    return Ok(Some(entry.value().0.clone()));
                }
                true
            }
            None => false,
        };
        if expired {
            self.entries.remove(key);
        }
        Ok(None)
    }

    async fn put(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<()> {
        let expires = Instant::now() + Duration::from_secs(ttl_seconds);
        self.entries
            .insert(key.to_string(), (value.to_string(), expires));
        Ok(())
    }
}

/// In-memory blob host returning synthetic public URLs.
#[derive(Default)]
pub struct InMemoryBlobStore {
    blobs: DashMap<String, Vec<u8>>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn upload(&self, filename: &str, bytes: Vec<u8>) -> Result<String> {
        let key = format!("{}/{}", uuid::Uuid::new_v4(), filename);
        let url = format!("https://media.local/{key}");
        self.blobs.insert(key, bytes);
        Ok(url)
    }
}

/// Convenience: flip a stored form's status in place (admin toggle).
pub async fn set_status(store: &dyn FormStore, slug: &str, status: FormStatus) -> Result<Form> {
    let mut form = store
        .find_by_slug_or_id(slug)
        .await?
        .ok_or(FormError::NotFound)?;
    form.status = status;
    form.touch();
    store.update(&form).await?;
    Ok(form)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Field, FieldType};

    #[tokio::test]
    async fn test_form_store_insert_and_lookup() {
        let store = InMemoryFormStore::new();
        let form = Form::create("Feedback", "feedback", vec![Field::new("q", FieldType::Text)]);
        store.insert(&form).await.unwrap();

        let by_slug = store.find_by_slug_or_id("feedback").await.unwrap();
        assert!(by_slug.is_some());
        let by_id = store.find_by_slug_or_id(&form.id).await.unwrap();
        assert!(by_id.is_some());
    }

    #[tokio::test]
    async fn test_form_store_rejects_duplicate_slug() {
        let store = InMemoryFormStore::new();
        store
            .insert(&Form::create("A", "same", vec![]))
            .await
            .unwrap();
        let err = store.insert(&Form::create("B", "same", vec![])).await;
        assert!(matches!(err, Err(FormError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_response_store_newest_first_and_count() {
        let store = InMemoryResponseStore::new();
        let mut first = Response::create("f1", "feedback", HashMap::new());
        first.submitted_at = chrono::Utc::now() - chrono::Duration::seconds(60);
        let second = Response::create("f1", "feedback", HashMap::new());

        store.insert(&first).await.unwrap();
        store.insert(&second).await.unwrap();

        let rows = store.list_by_form("feedback").await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id, second.id);
        assert_eq!(store.count_by_form("feedback").await.unwrap(), 2);
        assert_eq!(store.count_by_form("other").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_response_store_delete_all_by_form() {
        let store = InMemoryResponseStore::new();
        store
            .insert(&Response::create("f1", "a", HashMap::new()))
            .await
            .unwrap();
        store
            .insert(&Response::create("f2", "b", HashMap::new()))
            .await
            .unwrap();

        store.delete_all_by_form("a").await.unwrap();
        assert_eq!(store.count_by_form("a").await.unwrap(), 0);
        assert_eq!(store.count_by_form("b").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_kv_store_expiry() {
        let kv = InMemoryKvStore::new();
        kv.put("marker", "true", 3600).await.unwrap();
        assert_eq!(kv.get("marker").await.unwrap().as_deref(), Some("true"));

        kv.put("gone", "true", 0).await.unwrap();
        assert_eq!(kv.get("gone").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_blob_store_returns_public_url() {
        let blobs = InMemoryBlobStore::new();
        let url = blobs.upload("photo.png", vec![1, 2, 3]).await.unwrap();
        assert!(url.starts_with("https://"));
        assert!(url.ends_with("/photo.png"));
    }
}
