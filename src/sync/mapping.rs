use rusqlite::types::Value as SqlValue;

use crate::date_util::parse_date_loose;
use crate::error::{Error, Result};

/// How a sheet cell is coerced before it is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Number,
    Bool,
    Date,
}

/// One sheet header mapped onto one table column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMapping {
    pub header: &'static str,
    pub column: &'static str,
    pub kind: ColumnKind,
}

const fn col(header: &'static str, column: &'static str, kind: ColumnKind) -> ColumnMapping {
    ColumnMapping { header, column, kind }
}

/// Where a sheet lands in the warehouse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableMapping {
    pub target: &'static str,
    pub table: &'static str,
    pub columns: Vec<ColumnMapping>,
}

pub const TARGETS: &[&str] = &["campuses", "leads", "opportunities", "fellows", "property_pipeline"];

impl TableMapping {
    /// Look up one of the built-in sheet mappings by target name.
    pub fn builtin(target: &str) -> Result<Self> {
        use ColumnKind::*;
        let target = target.trim().to_lowercase().replace('-', "_");
        let mapping = match target.as_str() {
            "campuses" => TableMapping {
                target: "campuses",
                table: "dim_campuses",
                columns: vec![
                    col("Campus ID", "campus_id", Text),
                    col("Campus Name", "campus_name", Text),
                    col("Region", "region", Text),
                    col("Active", "is_active", Bool),
                ],
            },
            "leads" => TableMapping {
                target: "leads",
                table: "fact_leads",
                columns: vec![
                    col("Lead ID", "lead_id", Text),
                    col("Created Date", "created_date", Date),
                    col("Campus", "campus_name", Text),
                    col("Lead Source", "lead_source", Text),
                ],
            },
            "opportunities" => TableMapping {
                target: "opportunities",
                table: "fact_opportunities",
                columns: vec![
                    col("Opportunity ID", "opportunity_id", Text),
                    col("Close Date", "close_date", Date),
                    col("Campus", "campus_name", Text),
                    col("Stage", "stage", Text),
                    col("Won", "is_won", Bool),
                    col("ARR", "arr", Number),
                ],
            },
            "fellows" => TableMapping {
                target: "fellows",
                table: "dim_fellows",
                columns: vec![
                    col("Fellow ID", "fellow_id", Text),
                    col("Name", "fellow_name", Text),
                    col("Email", "email", Text),
                    col("Campus", "campus_name", Text),
                    col("Cohort", "cohort", Text),
                    col("Role", "role", Text),
                    col("Active", "is_active", Bool),
                ],
            },
            "property_pipeline" => TableMapping {
                target: "property_pipeline",
                table: "fact_property_pipeline",
                columns: vec![
                    col("Property ID", "property_id", Text),
                    col("Address", "address", Text),
                    col("City", "city", Text),
                    col("Campus", "campus_name", Text),
                    col("Stage", "stage", Text),
                    col("Asking Price", "asking_price", Number),
                    col("Square Feet", "square_feet", Number),
                    col("Shortlisted", "is_shortlisted", Bool),
                    col("Updated", "updated_date", Date),
                ],
            },
            other => {
                return Err(Error::Import {
                    target: other.to_string(),
                    message: format!("unknown import target; expected one of {}", TARGETS.join(", ")),
                })
            }
        };
        Ok(mapping)
    }

    pub fn column_names(&self) -> Vec<&'static str> {
        self.columns.iter().map(|c| c.column).collect()
    }

    /// For each mapped column, the index of its header in `headers`.
    /// Exact matches win; otherwise the first case-insensitive, trimmed match.
    pub fn resolve_headers(&self, headers: &[String]) -> Vec<Option<usize>> {
        self.columns
            .iter()
            .map(|c| {
                headers
                    .iter()
                    .position(|h| h == c.header)
                    .or_else(|| {
                        headers
                            .iter()
                            .position(|h| h.trim().eq_ignore_ascii_case(c.header))
                    })
            })
            .collect()
    }
}

/// Coerce a sheet cell for a column kind.
///
/// Blank text, unparseable numbers and unparseable dates become NULL.
/// Booleans are never NULL: anything outside the truthy set is `0`.
pub fn coerce_cell(cell: &str, kind: ColumnKind) -> SqlValue {
    let cell = cell.trim();
    match kind {
        ColumnKind::Text if cell.is_empty() => SqlValue::Null,
        ColumnKind::Text => SqlValue::Text(cell.to_string()),
        ColumnKind::Number => {
            let cleaned: String = cell
                .chars()
                .filter(|c| !matches!(c, '$' | ',' | ' '))
                .collect();
            match cleaned.parse::<f64>() {
                Ok(n) if n.is_finite() => SqlValue::Real(n),
                _ => SqlValue::Null,
            }
        }
        ColumnKind::Bool => SqlValue::Integer(i64::from(is_truthy(cell))),
        ColumnKind::Date => parse_date_loose(cell)
            .map(|d| SqlValue::Text(d.format("%Y-%m-%d").to_string()))
            .unwrap_or(SqlValue::Null),
    }
}

fn is_truthy(cell: &str) -> bool {
    matches!(
        cell.to_lowercase().as_str(),
        "true" | "yes" | "y" | "1" | "x" | "✓" | "checked"
    )
}
