//! Data operations and their SQL-like rendering.

use serde_json::{Map, Value};
use std::fmt;

/// One stored record: a JSON object that always carries an integer `id`.
pub type Record = Map<String, Value>;

/// Equality filter: every key must equal the given value.
pub type Filter = Map<String, Value>;

/// A data operation on a model (table).
///
/// Model names use dotted notation (`res.partner`); the rendered SQL uses
/// the underscored table name (`res_partner`).
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Create {
        model: String,
        values: Map<String, Value>,
    },
    Read {
        model: String,
        ids: Vec<i64>,
    },
    Search {
        model: String,
        filter: Filter,
        limit: Option<usize>,
    },
    Count {
        model: String,
        filter: Filter,
    },
    Write {
        model: String,
        ids: Vec<i64>,
        values: Map<String, Value>,
    },
    Unlink {
        model: String,
        ids: Vec<i64>,
    },
}

impl Operation {
    #[must_use]
    pub fn model(&self) -> &str {
        match self {
            Self::Create { model, .. }
            | Self::Read { model, .. }
            | Self::Search { model, .. }
            | Self::Count { model, .. }
            | Self::Write { model, .. }
            | Self::Unlink { model, .. } => model,
        }
    }

    /// Returns `true` for operations that change stored data.
    #[must_use]
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            Self::Create { .. } | Self::Write { .. } | Self::Unlink { .. }
        )
    }
}

/// Result of [`Connection::execute`](super::Connection::execute).
#[derive(Debug, Clone, PartialEq)]
pub enum OperationResult {
    /// Id of the created record.
    Created(i64),
    /// Matching records, ordered by id.
    Records(Vec<Record>),
    Count(usize),
    /// Number of records written or deleted.
    Affected(usize),
}

fn table_name(model: &str) -> String {
    model.replace('.', "_")
}

fn id_list(ids: &[i64]) -> String {
    ids.iter()
        .map(i64::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn where_clause(filter: &Filter) -> String {
    if filter.is_empty() {
        return String::new();
    }
    let terms: Vec<String> = filter
        .iter()
        .map(|(k, v)| format!("\"{k}\" = {v}"))
        .collect();
    format!(" WHERE {}", terms.join(" AND "))
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create { model, values } => {
                let columns: Vec<String> = values.keys().map(|k| format!("\"{k}\"")).collect();
                let row: Vec<String> = values.values().map(Value::to_string).collect();
                write!(
                    f,
                    "INSERT INTO \"{}\" ({}) VALUES ({})",
                    table_name(model),
                    columns.join(", "),
                    row.join(", ")
                )
            }
            Self::Read { model, ids } => write!(
                f,
                "SELECT * FROM \"{}\" WHERE \"id\" IN ({})",
                table_name(model),
                id_list(ids)
            ),
            Self::Search {
                model,
                filter,
                limit,
            } => {
                write!(
                    f,
                    "SELECT * FROM \"{}\"{} ORDER BY \"id\"",
                    table_name(model),
                    where_clause(filter)
                )?;
                if let Some(limit) = limit {
                    write!(f, " LIMIT {limit}")?;
                }
                Ok(())
            }
            Self::Count { model, filter } => write!(
                f,
                "SELECT COUNT(*) FROM \"{}\"{}",
                table_name(model),
                where_clause(filter)
            ),
            Self::Write { model, ids, values } => {
                let sets: Vec<String> = values
                    .iter()
                    .map(|(k, v)| format!("\"{k}\" = {v}"))
                    .collect();
                write!(
                    f,
                    "UPDATE \"{}\" SET {} WHERE \"id\" IN ({})",
                    table_name(model),
                    sets.join(", "),
                    id_list(ids)
                )
            }
            Self::Unlink { model, ids } => write!(
                f,
                "DELETE FROM \"{}\" WHERE \"id\" IN ({})",
                table_name(model),
                id_list(ids)
            ),
        }
    }
}
