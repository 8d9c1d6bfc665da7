//! Output formatting for status snapshots and migration reports
//!
//! Table output requires the `display` feature. Without it, table formats fall
//! back to pretty JSON.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::database::{MigrationReport, MigrationStatus};

/// Output format shared by library callers and the CLI
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    /// Table with rounded borders (default)
    #[default]
    Table,
    /// Markdown table
    Markdown,
    /// Compact JSON
    Json,
    /// Pretty-printed JSON with indentation
    JsonPretty,
}

impl OutputFormat {
    pub fn is_json(&self) -> bool {
        matches!(self, Self::Json | Self::JsonPretty)
    }

    pub fn all_names() -> &'static [&'static str] {
        &["table", "markdown", "json", "json-pretty"]
    }

    /// Serialize `value` for the JSON variants.
    pub fn to_json<T: Serialize>(&self, value: &T) -> String {
        match self {
            Self::Json => serde_json::to_string(value).unwrap_or_default(),
            _ => serde_json::to_string_pretty(value).unwrap_or_default(),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Table => write!(f, "table"),
            Self::Markdown => write!(f, "markdown"),
            Self::Json => write!(f, "json"),
            Self::JsonPretty => write!(f, "json-pretty"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" | "pretty" => Ok(Self::Table),
            "markdown" | "md" => Ok(Self::Markdown),
            "json" => Ok(Self::Json),
            "json-pretty" | "jsonpretty" => Ok(Self::JsonPretty),
            _ => Err(format!(
                "Unknown output format '{}'. Valid formats: {}",
                s,
                Self::all_names().join(", ")
            )),
        }
    }
}

/// One line of the status table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "display", derive(tabled::Tabled))]
pub struct MigrationRow {
    pub id: String,
    pub path: String,
    pub state: String,
    pub applied_at: String,
}

impl MigrationRow {
    /// Applied records first, then pending scripts.
    pub fn from_status(status: &MigrationStatus) -> Vec<MigrationRow> {
        let applied = status.applied.iter().map(|m| MigrationRow {
            id: m.id.to_string(),
            path: m.path.clone(),
            state: "applied".to_string(),
            applied_at: m.applied_at.to_rfc3339(),
        });
        let pending = status.pending.iter().map(|path| MigrationRow {
            id: path.split('_').next().unwrap_or_default().to_string(),
            path: path.clone(),
            state: "pending".to_string(),
            applied_at: String::new(),
        });
        applied.chain(pending).collect()
    }
}

#[cfg(feature = "display")]
fn render_rows(rows: &[MigrationRow], format: OutputFormat) -> String {
    use tabled::settings::Style;
    use tabled::Table;

    match format {
        OutputFormat::Markdown => Table::new(rows).with(Style::markdown()).to_string(),
        _ => Table::new(rows).with(Style::rounded()).to_string(),
    }
}

#[cfg(not(feature = "display"))]
fn render_rows(rows: &[MigrationRow], _format: OutputFormat) -> String {
    serde_json::to_string_pretty(rows).unwrap_or_default()
}

/// Render a status snapshot.
pub fn format_status(status: &MigrationStatus, format: OutputFormat) -> String {
    if format.is_json() {
        return format.to_json(status);
    }
    if !status.is_initialized && status.applied.is_empty() {
        return "database not initialized".to_string();
    }

    let mut out = format!(
        "schema version {} ({} applied, {} pending)",
        status.schema_version,
        status.applied.len(),
        status.pending.len()
    );
    let rows = MigrationRow::from_status(status);
    if !rows.is_empty() {
        out.push_str("\n\n");
        out.push_str(&render_rows(&rows, format));
    }
    out
}

/// Render the outcome of a migration run.
pub fn format_report(report: &MigrationReport, format: OutputFormat) -> String {
    if format.is_json() {
        return format.to_json(report);
    }

    let mut lines = Vec::new();
    if report.initialized {
        lines.push("initialized infrastructure schema".to_string());
    }
    if report.applied.is_empty() {
        lines.push("no pending migrations".to_string());
    }
    for path in &report.applied {
        lines.push(format!("applied {}", path));
    }
    lines.push(format!("schema version {}", report.schema_version));
    lines.join("\n")
}
