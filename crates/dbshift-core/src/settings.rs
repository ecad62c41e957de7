use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

/// Hard ceiling used when the caller supplies no (or an invalid) page size.
pub const DEFAULT_PAGE_SIZE: u64 = 10_000;

/// Per-table column filter: either the whole table or a named subset.
///
/// In the parameter file an array of column names selects a subset; any
/// other value (`true`, a string, a number) means the whole table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ColumnFilter {
    AllColumns,
    Columns(HashSet<String>),
}

impl Serialize for ColumnFilter {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::AllColumns => serializer.serialize_bool(true),
            Self::Columns(cols) => cols.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for ColumnFilter {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        match value {
            serde_json::Value::Array(items) => {
                let cols = items
                    .into_iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect();
                Ok(Self::Columns(cols))
            }
            _ => Ok(Self::AllColumns),
        }
    }
}

/// Settings governing one replacement run. Built once by the parameter
/// collaborator and immutable thereafter.
#[derive(Clone, Debug, Default)]
pub struct RunSettings {
    /// Rows fetched per page. Zero means "use the default".
    pub page_size: u64,
    /// Whether `*BLOB` columns take part in replacement.
    pub include_blob: bool,
    /// Restrict processing to tables whose name starts with this prefix.
    pub table_prefix: Option<String>,
    /// Register identity pairs for e-mail domains derived from source URLs.
    pub protect_email: bool,
    /// Columns excluded from replacement, per table.
    pub exclude: HashMap<String, ColumnFilter>,
    /// When non-empty, only listed tables/columns take part.
    pub include: HashMap<String, ColumnFilter>,
}

impl RunSettings {
    /// Effective page size, falling back to [`DEFAULT_PAGE_SIZE`].
    pub fn effective_page_size(&self) -> u64 {
        if self.page_size == 0 {
            DEFAULT_PAGE_SIZE
        } else {
            self.page_size
        }
    }

    /// Whether the include/exclude filters leave this column in play.
    pub fn column_allowed(&self, table: &str, column: &str) -> bool {
        match self.exclude.get(table) {
            Some(ColumnFilter::AllColumns) => return false,
            Some(ColumnFilter::Columns(cols)) if cols.contains(column) => return false,
            _ => {}
        }

        if self.include.is_empty() {
            return true;
        }
        match self.include.get(table) {
            None => false,
            Some(ColumnFilter::AllColumns) => true,
            Some(ColumnFilter::Columns(cols)) => cols.contains(column),
        }
    }
}
