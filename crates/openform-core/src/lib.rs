//! OpenForm Builder Core
//!
//! Self-hosted form builder engine replacing Typeform, JotForm, Google Forms.
//!
//! ## Features
//! - Admin-defined field schemas compiled into submission validators
//! - Open/closed state, response caps, single-response enforcement
//! - Opaque per-field response payloads keyed by field id
//! - Filterable/sortable response views, categorical stats, CSV export
//!
//! The HTTP layer, persistent storage engine, rate-limit KV and blob store
//! are collaborators behind the ports in [`store`]; this crate carries the
//! schema pipeline and the response query/export engine.

use thiserror::Error;

pub mod export;
pub mod gate;
pub mod model;
pub mod registry;
pub mod schema;
pub mod service;
pub mod slug;
pub mod store;
pub mod view;

pub use export::{ExportFormat, ExportSheet};
pub use gate::{RateLimitConfig, SubmissionGate};
pub use model::{DesignSettings, Field, FieldType, Form, FormStatus, Response};
pub use schema::CompiledSchema;
pub use service::{FormDraft, FormService};
pub use view::{FieldStats, ResponseQuery, SortOrder, TableView};

// =============================================================================
// Error Types
// =============================================================================

/// Crate-level error taxonomy.
///
/// Maps onto HTTP-equivalent statuses at the (out-of-scope) routing layer:
/// `NotFound` → 404, `Closed`/`LimitReached`/`AlreadySubmitted` → 403,
/// `Validation` → 400, `RateLimited` → 429, `Conflict` → 409,
/// `StorageError`/`UploadError` → 500.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormError {
    #[error("Form not found")]
    NotFound,

    #[error("Response not found")]
    ResponseNotFound,

    #[error("Form is closed")]
    Closed,

    #[error("Response limit reached")]
    LimitReached,

    #[error("You have already submitted this form.")]
    AlreadySubmitted,

    #[error("Validation error: {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("Too many requests")]
    RateLimited,

    #[error("Slug conflict: {0}")]
    Conflict(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Upload error: {0}")]
    UploadError(String),
}

impl FormError {
    /// Build a validation rejection for a named field.
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Whether this rejection is an expected user-facing outcome rather
    /// than an anomaly worth alerting on.
    pub fn is_expected(&self) -> bool {
        !matches!(self, Self::StorageError(_) | Self::UploadError(_))
    }
}

pub type Result<T> = std::result::Result<T, FormError>;
