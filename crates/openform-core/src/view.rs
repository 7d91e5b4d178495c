//! Response View Engine
//!
//! Operates over an in-memory set of already-fetched response rows plus
//! the owning form's fields: filter/sort/search, tabular projection with
//! canonical display strings, and categorical stats. Export flattening in
//! [`crate::export`] reuses the same projection.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;

use crate::model::{Field, FieldType, Response};

/// Filter value meaning "no constraint on this field".
pub const FILTER_ALL: &str = "__all__";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    Newest,
    Oldest,
}

/// Optional, combinable constraints over a response set.
#[derive(Clone, Debug, Default)]
pub struct ResponseQuery {
    /// Case-insensitive substring match across all stringified values.
    pub search: Option<String>,
    /// Per-field equality filter; membership for array-valued fields.
    pub filters: HashMap<String, String>,
    pub sort: SortOrder,
}

impl ResponseQuery {
    pub fn search(mut self, query: impl Into<String>) -> Self {
        self.search = Some(query.into());
        self
    }

    pub fn filter(mut self, field_id: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.insert(field_id.into(), value.into());
        self
    }

    pub fn sort(mut self, order: SortOrder) -> Self {
        self.sort = order;
        self
    }

    /// Apply search, filters and sort, returning the surviving subset.
    pub fn apply(&self, rows: Vec<Response>) -> Vec<Response> {
        let needle = self
            .search
            .as_deref()
            .map(str::to_lowercase)
            .filter(|s| !s.is_empty());

        let mut out: Vec<Response> = rows
            .into_iter()
            .filter(|r| self.matches(r, needle.as_deref()))
            .collect();

        // Stable sort: ties keep their store order.
        match self.sort {
            SortOrder::Newest => out.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at)),
            SortOrder::Oldest => out.sort_by(|a, b| a.submitted_at.cmp(&b.submitted_at)),
        }
        out
    }

    fn matches(&self, row: &Response, needle: Option<&str>) -> bool {
        if let Some(needle) = needle {
            let hit = row
                .data
                .values()
                .any(|v| search_text(v).to_lowercase().contains(needle));
            if !hit {
                return false;
            }
        }

        for (field_id, wanted) in &self.filters {
            if wanted.is_empty() || wanted == FILTER_ALL {
                continue;
            }
            match row.data.get(field_id) {
                Some(Value::Array(items)) => {
                    if !items.iter().any(|v| scalar_text(v) == *wanted) {
                        return false;
                    }
                }
                Some(v) => {
                    if scalar_text(v) != *wanted {
                        return false;
                    }
                }
                None => return false,
            }
        }
        true
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn search_text(value: &Value) -> String {
    match value {
        Value::Array(items) => items
            .iter()
            .map(scalar_text)
            .collect::<Vec<_>>()
            .join(","),
        other => scalar_text(other),
    }
}

// =============================================================================
// Tabular projection
// =============================================================================

/// One column per data-bearing field in schema order, prefixed by the
/// submission timestamp column.
#[derive(Clone, Debug)]
pub struct TableView {
    pub columns: Vec<String>,
    pub rows: Vec<TableRow>,
}

#[derive(Clone, Debug)]
pub struct TableRow {
    pub response_id: String,
    pub submitted_at: DateTime<Utc>,
    pub cells: Vec<String>,
}

/// Project responses onto the schema as display strings.
pub fn table(fields: &[Field], rows: &[Response]) -> TableView {
    let data_fields: Vec<&Field> = fields
        .iter()
        .filter(|f| f.field_type.is_data_bearing())
        .collect();

    let mut columns = Vec::with_capacity(data_fields.len() + 1);
    columns.push("Submitted At".to_string());
    columns.extend(data_fields.iter().map(|f| f.display_name().to_string()));

    let table_rows = rows
        .iter()
        .map(|r| {
            let mut cells = Vec::with_capacity(data_fields.len() + 1);
            cells.push(format_timestamp(r.submitted_at));
            cells.extend(
                data_fields
                    .iter()
                    .map(|f| display_value(f, r, fields)),
            );
            TableRow {
                response_id: r.id.clone(),
                submitted_at: r.submitted_at,
                cells,
            }
        })
        .collect();

    TableView {
        columns,
        rows: table_rows,
    }
}

pub(crate) fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Canonical display string for one field of one row: arrays joined by
/// `, `, booleans as `Yes`/`No`, null/empty as a placeholder dash, file
/// URLs as derived filenames.
pub fn display_value(field: &Field, response: &Response, all_fields: &[Field]) -> String {
    let value = match response.data.get(&field.id) {
        None | Some(Value::Null) => return "-".to_string(),
        Some(v) => v,
    };

    match value {
        Value::String(s) if s.is_empty() => "-".to_string(),
        Value::String(s) => {
            if field.field_type == FieldType::File && s.starts_with("http") {
                display_filename(s, response, all_fields)
            } else {
                s.clone()
            }
        }
        Value::Array(items) if items.is_empty() => "-".to_string(),
        Value::Array(items) => items
            .iter()
            .map(scalar_text)
            .collect::<Vec<_>>()
            .join(", "),
        Value::Bool(true) => "Yes".to_string(),
        Value::Bool(false) => "No".to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

// =============================================================================
// Filename derivation for file fields
// =============================================================================

/// Last path segment of an uploaded-media URL, query-stripped and
/// percent-decoded. Non-URLs pass through unchanged; segments that do
/// not decode to valid UTF-8 are kept raw rather than mangled.
pub fn filename_from_url(url: &str) -> String {
    if !url.starts_with("http") {
        return url.to_string();
    }
    let last = url.rsplit('/').next().unwrap_or(url);
    let last = last.split('?').next().unwrap_or(last);
    match urlencoding::decode(last) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => last.to_string(),
    }
}

/// Display filename for an uploaded file: the URL-derived name, with its
/// base overridden by the row's "name"-ish field when one is populated
/// (a field whose id or label contains `name` but not `file`), keeping
/// the original extension.
pub fn display_filename(url: &str, response: &Response, fields: &[Field]) -> String {
    let original = filename_from_url(url);

    let name_field = fields.iter().find(|f| {
        let id = f.id.to_lowercase();
        let label = f.label.to_lowercase();
        (id.contains("name") && !id.contains("file"))
            || (!label.is_empty() && label.contains("name") && !label.contains("file"))
    });

    let name_value = name_field
        .and_then(|f| response.data.get(&f.id))
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let name_value = match name_value {
        Some(v) => v,
        None => return original,
    };

    let ext = match original.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() => ext,
        _ => "jpg",
    };

    let safe: String = name_value
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ' '))
        .collect();
    let safe = safe
        .trim()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_");

    if safe.is_empty() {
        original
    } else {
        format!("{safe}.{ext}")
    }
}

// =============================================================================
// Categorical stats
// =============================================================================

/// Tally table for one categorical field.
#[derive(Clone, Debug)]
pub struct FieldStats {
    pub field_id: String,
    pub label: String,
    /// Total tallies, not total rows: one row may contribute several for
    /// checkbox groups.
    pub total: u64,
    pub entries: Vec<StatEntry>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatEntry {
    pub label: String,
    pub count: u64,
    /// Percentage of total tallies, integer-rounded.
    pub percentage: u32,
}

/// Tally occurrence counts for every categorical field across the given
/// rows. Array values contribute one tally per element; booleans tally as
/// their `Yes`/`No` display strings.
pub fn stats(fields: &[Field], rows: &[Response]) -> Vec<FieldStats> {
    fields
        .iter()
        .filter(|f| f.field_type.is_categorical())
        .map(|field| {
            let mut counts: HashMap<String, u64> = HashMap::new();
            let mut total = 0u64;

            for row in rows {
                let value = match row.data.get(&field.id) {
                    None | Some(Value::Null) => continue,
                    Some(v) => v,
                };
                match value {
                    Value::Array(items) => {
                        for item in items {
                            let key = scalar_text(item);
                            if key.is_empty() {
                                continue;
                            }
                            *counts.entry(key).or_insert(0) += 1;
                            total += 1;
                        }
                    }
                    Value::Bool(b) => {
                        let key = if *b { "Yes" } else { "No" };
                        *counts.entry(key.to_string()).or_insert(0) += 1;
                        total += 1;
                    }
                    other => {
                        let key = scalar_text(other);
                        if key.is_empty() {
                            continue;
                        }
                        *counts.entry(key).or_insert(0) += 1;
                        total += 1;
                    }
                }
            }

            let mut entries: Vec<StatEntry> = counts
                .into_iter()
                .map(|(label, count)| StatEntry {
                    percentage: if total > 0 {
                        ((count as f64 / total as f64) * 100.0).round() as u32
                    } else {
                        0
                    },
                    label,
                    count,
                })
                .collect();
            entries.sort_by(|a, b| b.count.cmp(&a.count).then(a.label.cmp(&b.label)));

            FieldStats {
                field_id: field.id.clone(),
                label: field.display_name().to_string(),
                total,
                entries,
            }
        })
        .collect()
}

/// Distinct filter options per choice field, discovered from the rows
/// themselves, sorted for stable dropdown population.
pub fn filter_options(fields: &[Field], rows: &[Response]) -> HashMap<String, Vec<String>> {
    fields
        .iter()
        .filter(|f| f.field_type.supports_options())
        .map(|field| {
            let mut seen = std::collections::BTreeSet::new();
            for row in rows {
                match row.data.get(&field.id) {
                    Some(Value::Array(items)) => {
                        for item in items {
                            let s = scalar_text(item);
                            if !s.is_empty() {
                                seen.insert(s);
                            }
                        }
                    }
                    Some(v) => {
                        let s = scalar_text(v);
                        if !s.is_empty() {
                            seen.insert(s);
                        }
                    }
                    None => {}
                }
            }
            (field.id.clone(), seen.into_iter().collect())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(slug: &str, data: Value, secs_ago: i64) -> Response {
        let mut r = Response::create(
            "form-1",
            slug,
            match data {
                Value::Object(map) => map.into_iter().collect(),
                _ => panic!("expected object"),
            },
        );
        r.submitted_at = Utc::now() - chrono::Duration::seconds(secs_ago);
        r
    }

    fn survey_fields() -> Vec<Field> {
        vec![
            Field::new("name", FieldType::Text).label("Name"),
            Field::new("langs", FieldType::CheckboxGroup)
                .label("Languages")
                .options(vec!["A".into(), "B".into(), "C".into()]),
            Field::new("intro", FieldType::Description),
        ]
    }

    #[test]
    fn test_search_is_case_insensitive_across_values() {
        let rows = vec![
            row("s", json!({ "name": "Ann", "langs": ["A"] }), 10),
            row("s", json!({ "name": "Bob", "langs": ["B"] }), 5),
        ];
        let out = ResponseQuery::default().search("ann").apply(rows);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].data["name"], json!("Ann"));
    }

    #[test]
    fn test_field_filter_matches_array_membership() {
        let rows = vec![
            row("s", json!({ "name": "Ann", "langs": ["A", "B"] }), 10),
            row("s", json!({ "name": "Bob", "langs": ["C"] }), 5),
        ];
        let out = ResponseQuery::default().filter("langs", "B").apply(rows);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].data["name"], json!("Ann"));
    }

    #[test]
    fn test_all_sentinel_means_unconstrained() {
        let rows = vec![
            row("s", json!({ "langs": ["A"] }), 10),
            row("s", json!({ "langs": ["B"] }), 5),
        ];
        let out = ResponseQuery::default()
            .filter("langs", FILTER_ALL)
            .apply(rows);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_sort_orders_by_timestamp() {
        let rows = vec![
            row("s", json!({ "name": "older" }), 100),
            row("s", json!({ "name": "newer" }), 1),
        ];
        let newest = ResponseQuery::default().apply(rows.clone());
        assert_eq!(newest[0].data["name"], json!("newer"));
        let oldest = ResponseQuery::default().sort(SortOrder::Oldest).apply(rows);
        assert_eq!(oldest[0].data["name"], json!("older"));
    }

    #[test]
    fn test_table_skips_display_only_and_renders_canonically() {
        let fields = survey_fields();
        let rows = vec![row(
            "s",
            json!({ "name": "Ann", "langs": ["A", "B"], "intro": "ignored" }),
            0,
        )];
        let view = table(&fields, &rows);
        assert_eq!(view.columns, vec!["Submitted At", "Name", "Languages"]);
        assert_eq!(view.rows[0].cells[1], "Ann");
        assert_eq!(view.rows[0].cells[2], "A, B");
    }

    #[test]
    fn test_display_value_placeholders_and_booleans() {
        let agree = Field::new("agree", FieldType::Checkbox).label("Agree");
        let note = Field::new("note", FieldType::Text);
        let fields = vec![agree.clone(), note.clone()];

        let r = row("s", json!({ "agree": true, "note": "" }), 0);
        assert_eq!(display_value(&agree, &r, &fields), "Yes");
        assert_eq!(display_value(&note, &r, &fields), "-");

        let r = row("s", json!({ "agree": false }), 0);
        assert_eq!(display_value(&agree, &r, &fields), "No");
        assert_eq!(display_value(&note, &r, &fields), "-");
    }

    #[test]
    fn test_filename_from_url_strips_query_and_decodes() {
        assert_eq!(
            filename_from_url("https://media.local/v123/My%20Photo.png?v=2"),
            "My Photo.png"
        );
        assert_eq!(filename_from_url("not a url"), "not a url");
    }

    #[test]
    fn test_filename_from_url_keeps_raw_segment_on_bad_encoding() {
        // %FF is not valid UTF-8 once decoded; the segment stays raw.
        assert_eq!(
            filename_from_url("https://media.local/v1/a%FFb.png"),
            "a%FFb.png"
        );
    }

    #[test]
    fn test_display_filename_overrides_base_with_name_field() {
        let fields = vec![
            Field::new("name", FieldType::Text).label("Full Name"),
            Field::new("photo", FieldType::File).label("Photo"),
        ];
        let r = row(
            "s",
            json!({ "name": "Ann O'Leary!", "photo": "https://media.local/x/upload.png" }),
            0,
        );
        assert_eq!(
            display_filename("https://media.local/x/upload.png", &r, &fields),
            "Ann_OLeary.png"
        );
    }

    #[test]
    fn test_display_filename_ignores_file_named_fields() {
        let fields = vec![
            Field::new("filename", FieldType::Text),
            Field::new("photo", FieldType::File),
        ];
        let r = row(
            "s",
            json!({ "filename": "ignored", "photo": "https://media.local/x/raw.png" }),
            0,
        );
        assert_eq!(
            display_filename("https://media.local/x/raw.png", &r, &fields),
            "raw.png"
        );
    }

    #[test]
    fn test_stats_tallies_per_element_not_per_row() {
        let fields = survey_fields();
        let rows = vec![
            row("s", json!({ "langs": ["A", "B"] }), 3),
            row("s", json!({ "langs": ["A"] }), 2),
            row("s", json!({ "langs": ["B", "C"] }), 1),
        ];
        let all = stats(&fields, &rows);
        assert_eq!(all.len(), 1);
        let s = &all[0];
        assert_eq!(s.total, 5);
        assert_eq!(
            s.entries,
            vec![
                StatEntry { label: "A".into(), count: 2, percentage: 40 },
                StatEntry { label: "B".into(), count: 2, percentage: 40 },
                StatEntry { label: "C".into(), count: 1, percentage: 20 },
            ]
        );
    }

    #[test]
    fn test_stats_skip_non_categorical_fields() {
        let fields = survey_fields();
        let rows = vec![row("s", json!({ "name": "Ann" }), 0)];
        let all = stats(&fields, &rows);
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].field_id, "langs");
        assert_eq!(all[0].total, 0);
    }

    #[test]
    fn test_filter_options_discovered_from_rows() {
        let fields = survey_fields();
        let rows = vec![
            row("s", json!({ "langs": ["B", "A"] }), 1),
            row("s", json!({ "langs": ["C"] }), 0),
        ];
        let opts = filter_options(&fields, &rows);
        assert_eq!(opts["langs"], vec!["A", "B", "C"]);
        assert!(!opts.contains_key("name"));
    }
}
