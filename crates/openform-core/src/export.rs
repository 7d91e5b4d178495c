//! Export flattening
//!
//! Flattens (schema, rows) into plain records shared by every export
//! format. CSV is serialized here; spreadsheet workbooks and paginated PDF
//! tables are rendered by collaborators consuming the same [`ExportSheet`],
//! which guarantees export parity across formats by construction.

use crate::model::{Form, Response};
use crate::view;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Xlsx,
    Pdf,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Xlsx => "xlsx",
            Self::Pdf => "pdf",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            Self::Csv => "text/csv;charset=utf-8",
            Self::Xlsx => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            Self::Pdf => "application/pdf",
        }
    }
}

/// The flattened record set consumed by every export renderer. Column
/// derivation is identical to the tabular projection: submission
/// timestamp first, then one column per data-bearing field in schema
/// order, all cells canonical display strings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportSheet {
    pub title: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ExportSheet {
    /// Suggested download name, e.g. `Responses - Event Signup.csv`.
    pub fn file_name(&self, format: ExportFormat) -> String {
        format!("Responses - {}.{}", self.title, format.extension())
    }

    /// Serialize as CSV: UTF-8 BOM prefix for spreadsheet compatibility,
    /// every cell quoted with embedded quotes doubled.
    pub fn to_csv(&self) -> String {
        let mut csv = String::from("\u{feff}");
        push_csv_line(&mut csv, &self.headers);
        for row in &self.rows {
            push_csv_line(&mut csv, row);
        }
        csv
    }
}

fn push_csv_line(out: &mut String, cells: &[String]) {
    let mut first = true;
    for cell in cells {
        if !first {
            out.push(',');
        }
        first = false;
        out.push('"');
        out.push_str(&cell.replace('"', "\"\""));
        out.push('"');
    }
    out.push('\n');
}

/// Flatten responses for export through the tabular projection.
pub fn flatten(form: &Form, rows: &[Response]) -> ExportSheet {
    let table = view::table(&form.fields, rows);
    ExportSheet {
        title: form.title.clone(),
        headers: table.columns,
        rows: table.rows.into_iter().map(|r| r.cells).collect(),
    }
}
