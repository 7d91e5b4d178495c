//! Core data model: forms, fields, design settings, responses.
//!
//! Wire names match the stored JSON produced by the admin builder
//! (camelCase design keys, snake_case field type tags), so rows written by
//! earlier deployments deserialize unchanged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// =============================================================================
// Core Types
// =============================================================================

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Form {
    pub id: String,
    /// URL-safe unique identifier derived from the title. Immutable once
    /// responses exist; response linkage is by `id`, not slug.
    pub slug: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub status: FormStatus,
    pub fields: Vec<Field>,
    #[serde(default)]
    pub design: DesignSettings,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Form {
    pub fn create(title: impl Into<String>, slug: impl Into<String>, fields: Vec<Field>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            slug: slug.into(),
            title: title.into(),
            description: String::new(),
            status: FormStatus::Open,
            fields,
            design: DesignSettings::default(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == FormStatus::Open
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FormStatus {
    #[default]
    Open,
    Closed,
}

/// A single admin-authored field. `id` values are stable once a form has
/// responses; changing the semantics of an existing id retroactively
/// reinterprets historical data (documented limitation).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub id: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    /// Option labels for choice types.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    /// Target URL for `success_link` fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_url: Option<String>,
    /// Embedded media URL for `image` fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
}

impl Field {
    pub fn new(id: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            id: id.into(),
            field_type,
            label: String::new(),
            required: false,
            placeholder: None,
            options: Vec::new(),
            link_url: None,
            media_url: None,
        }
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn options(mut self, options: Vec<String>) -> Self {
        self.options = options;
        self
    }

    /// Display name for user-facing messages: label, falling back to id.
    pub fn display_name(&self) -> &str {
        if self.label.is_empty() {
            &self.id
        } else {
            &self.label
        }
    }
}

/// The closed set of field kinds. Classification behavior (data-bearing,
/// value shape, options, categorical) lives in [`crate::registry`].
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Text,
    Textarea,
    Email,
    Phone,
    Number,
    Date,
    Time,
    Select,
    Radio,
    Checkbox,
    CheckboxGroup,
    File,
    Image,
    Description,
    SuccessLink,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignSettings {
    #[serde(default)]
    pub theme_color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub banner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_light: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_dark: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_title: Option<String>,
    #[serde(default)]
    pub form_title: String,
    #[serde(default)]
    pub form_description: String,
    /// Soft cap checked at submission time, not a storage constraint. A
    /// race between concurrent submissions near the cap may transiently
    /// exceed it by a small margin.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_limit: Option<u32>,
    #[serde(default = "default_true")]
    pub allow_multiple_responses: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_upload: Option<MediaUploadConfig>,
}

impl Default for DesignSettings {
    fn default() -> Self {
        Self {
            theme_color: "#db4437".to_string(),
            banner: None,
            logo_light: None,
            logo_dark: None,
            web_title: None,
            form_title: String::new(),
            form_description: String::new(),
            response_limit: None,
            allow_multiple_responses: true,
            media_upload: None,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Upload target for `file` fields (unsigned-preset style media host).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaUploadConfig {
    #[serde(default)]
    pub cloud_name: String,
    #[serde(default)]
    pub preset: String,
}

/// A stored submission. `data` maps field id to value; its shape is fixed
/// by the owning form's fields at submission time and is never re-validated
/// against a later schema version.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Response {
    pub id: String,
    pub form_id: String,
    pub form_slug: String,
    pub data: HashMap<String, serde_json::Value>,
    pub submitted_at: DateTime<Utc>,
}

impl Response {
    pub fn create(
        form_id: impl Into<String>,
        form_slug: impl Into<String>,
        data: HashMap<String, serde_json::Value>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            form_id: form_id.into(),
            form_slug: form_slug.into(),
            data,
            submitted_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_type_wire_names() {
        let json = serde_json::to_string(&FieldType::CheckboxGroup).unwrap();
        assert_eq!(json, "\"checkbox_group\"");
        let json = serde_json::to_string(&FieldType::SuccessLink).unwrap();
        assert_eq!(json, "\"success_link\"");

        let t: FieldType = serde_json::from_str("\"textarea\"").unwrap();
        assert_eq!(t, FieldType::Textarea);
    }

    #[test]
    fn test_design_defaults_allow_multiple() {
        let design: DesignSettings = serde_json::from_str("{}").unwrap();
        assert!(design.allow_multiple_responses);
        assert!(design.response_limit.is_none());
    }

    #[test]
    fn test_design_camel_case_round_trip() {
        let raw = r##"{"themeColor":"#4285F4","allowMultipleResponses":false,"responseLimit":10,"logoLight":"l.png"}"##;
        let design: DesignSettings = serde_json::from_str(raw).unwrap();
        assert_eq!(design.theme_color, "#4285F4");
        assert!(!design.allow_multiple_responses);
        assert_eq!(design.response_limit, Some(10));
        assert_eq!(design.logo_light.as_deref(), Some("l.png"));
    }

    #[test]
    fn test_field_display_name_falls_back_to_id() {
        let field = Field::new("vote", FieldType::Radio);
        assert_eq!(field.display_name(), "vote");
        let field = field.label("Your vote");
        assert_eq!(field.display_name(), "Your vote");
    }

    #[test]
    fn test_form_status_wire_names() {
        assert_eq!(serde_json::to_string(&FormStatus::Open).unwrap(), "\"open\"");
        let s: FormStatus = serde_json::from_str("\"closed\"").unwrap();
        assert_eq!(s, FormStatus::Closed);
    }
}
