//! Service façade
//!
//! Wires the slug allocator, schema checks, stores, submission gate and
//! view engine into the operations the outer HTTP layer calls. Routing,
//! auth and response encoding stay outside; every operation here returns
//! a success payload or a typed rejection from the crate taxonomy.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use crate::export::{self, ExportSheet};
use crate::gate::{RateLimitConfig, SubmissionGate};
use crate::model::{DesignSettings, Field, Form, FormStatus, Response};
use crate::schema;
use crate::slug;
use crate::store::{BlobStore, FormStore, KvStore, ResponseStore};
use crate::view::{self, FieldStats, ResponseQuery, TableView};
use crate::{FormError, Result};

/// Admin input for "validate and create form".
#[derive(Clone, Debug, Default)]
pub struct FormDraft {
    pub title: String,
    pub description: String,
    pub fields: Vec<Field>,
    pub design: Option<DesignSettings>,
}

pub struct FormService {
    forms: Arc<dyn FormStore>,
    responses: Arc<dyn ResponseStore>,
    blobs: Option<Arc<dyn BlobStore>>,
    gate: SubmissionGate,
}

impl FormService {
    pub fn new(
        forms: Arc<dyn FormStore>,
        responses: Arc<dyn ResponseStore>,
        kv: Option<Arc<dyn KvStore>>,
    ) -> Self {
        let gate = SubmissionGate::new(forms.clone(), responses.clone(), kv);
        Self {
            forms,
            responses,
            blobs: None,
            gate,
        }
    }

    pub fn with_blobs(mut self, blobs: Arc<dyn BlobStore>) -> Self {
        self.blobs = Some(blobs);
        self
    }

    pub fn with_rate_config(mut self, config: RateLimitConfig) -> Self {
        self.gate = self.gate.with_config(config);
        self
    }

    // =========================================================================
    // Admin: form lifecycle
    // =========================================================================

    /// Validate and create a form: sanity-check the schema, allocate a
    /// unique slug from the title and insert the row.
    pub async fn create_form(&self, draft: FormDraft) -> Result<Form> {
        let title = {
            let t = draft.title.trim();
            if t.is_empty() {
                "Untitled Form".to_string()
            } else {
                t.to_string()
            }
        };
        schema::check_fields(&draft.fields)?;

        let slug = slug::allocate(self.forms.as_ref(), &title).await?;
        let mut form = Form::create(&title, &slug, draft.fields);
        form.description = draft.description.clone();
        form.design = draft.design.unwrap_or_default();
        form.design.form_title = title;
        form.design.form_description = draft.description;

        self.forms.insert(&form).await?;
        info!(slug = %form.slug, id = %form.id, "form created");
        Ok(form)
    }

    /// Full update of title, fields and design by form id. The slug is
    /// never rewritten: response linkage survives renames.
    pub async fn update_form(&self, id: &str, draft: FormDraft) -> Result<Form> {
        schema::check_fields(&draft.fields)?;

        let mut form = self
            .forms
            .find_by_slug_or_id(id)
            .await?
            .ok_or(FormError::NotFound)?;

        form.title = draft.title;
        form.description = draft.description.clone();
        form.fields = draft.fields;
        if let Some(design) = draft.design {
            form.design = design;
        }
        form.design.form_title = form.title.clone();
        form.design.form_description = draft.description;
        form.touch();

        self.forms.update(&form).await?;
        info!(slug = %form.slug, "form updated");
        Ok(form)
    }

    pub async fn set_status(&self, slug: &str, status: FormStatus) -> Result<Form> {
        let form = crate::store::set_status(self.forms.as_ref(), slug, status).await?;
        info!(slug = %form.slug, ?status, "form status changed");
        Ok(form)
    }

    /// Delete a form and cascade its responses.
    pub async fn delete_form(&self, slug: &str) -> Result<()> {
        self.forms.delete(slug).await?;
        self.responses.delete_all_by_form(slug).await?;
        info!(slug, "form deleted with responses");
        Ok(())
    }

    pub async fn get_form(&self, key: &str) -> Result<Form> {
        self.forms
            .find_by_slug_or_id(key)
            .await?
            .ok_or(FormError::NotFound)
    }

    pub async fn list_forms(&self) -> Result<Vec<Form>> {
        self.forms.list_all().await
    }

    // =========================================================================
    // Public: submission
    // =========================================================================

    /// Validate and submit a response (the full gate sequence).
    pub async fn submit(
        &self,
        slug: &str,
        submitter: &str,
        payload: &serde_json::Map<String, Value>,
    ) -> Result<Response> {
        self.gate.submit(slug, submitter, payload).await
    }

    /// Host an uploaded file, returning its public URL for the payload.
    pub async fn upload_media(&self, filename: &str, bytes: Vec<u8>) -> Result<String> {
        match &self.blobs {
            Some(blobs) => blobs.upload(filename, bytes).await,
            None => Err(FormError::UploadError("no media host configured".into())),
        }
    }

    // =========================================================================
    // Admin: response views and exports
    // =========================================================================

    /// Responses for a form with optional filter/sort/search applied.
    pub async fn list_responses(&self, slug: &str, query: &ResponseQuery) -> Result<Vec<Response>> {
        let form = self.get_form(slug).await?;
        let rows = self.responses.list_by_form(&form.slug).await?;
        Ok(query.apply(rows))
    }

    pub async fn response_count(&self, slug: &str) -> Result<u64> {
        let form = self.get_form(slug).await?;
        self.responses.count_by_form(&form.slug).await
    }

    /// Tabular projection of the (filtered) responses.
    pub async fn response_table(&self, slug: &str, query: &ResponseQuery) -> Result<TableView> {
        let form = self.get_form(slug).await?;
        let rows = query.apply(self.responses.list_by_form(&form.slug).await?);
        Ok(view::table(&form.fields, &rows))
    }

    /// Categorical stats over the (filtered) responses.
    pub async fn stats(&self, slug: &str, query: &ResponseQuery) -> Result<Vec<FieldStats>> {
        let form = self.get_form(slug).await?;
        let rows = query.apply(self.responses.list_by_form(&form.slug).await?);
        Ok(view::stats(&form.fields, &rows))
    }

    /// Flattened export records for any format; CSV serializes locally,
    /// workbook/PDF renderers consume the same sheet.
    pub async fn export(&self, slug: &str, query: &ResponseQuery) -> Result<ExportSheet> {
        let form = self.get_form(slug).await?;
        let rows = query.apply(self.responses.list_by_form(&form.slug).await?);
        Ok(export::flatten(&form, &rows))
    }

    pub async fn export_csv(&self, slug: &str, query: &ResponseQuery) -> Result<String> {
        Ok(self.export(slug, query).await?.to_csv())
    }

    /// Admin edit: full replace of one response's data map.
    pub async fn update_response_data(
        &self,
        response_id: &str,
        data: HashMap<String, Value>,
    ) -> Result<()> {
        self.responses.update_data(response_id, data).await
    }

    pub async fn delete_response(&self, response_id: &str) -> Result<()> {
        self.responses.delete(response_id).await
    }

    /// Bulk delete of a form's responses, keeping the form.
    pub async fn clear_responses(&self, slug: &str) -> Result<()> {
        let form = self.get_form(slug).await?;
        self.responses.delete_all_by_form(&form.slug).await
    }
}
