use serde::{Deserialize, Serialize};

use crate::settings::RunSettings;

/// Prepared-statement bind classification of a column, derived from the
/// `COLUMN_TYPE` reported by the server. Only `Text` (and `Blob`, when blob
/// inclusion is requested) columns are candidates for string replacement;
/// the remaining classes exist so every column the introspection sees gets a
/// definite classification.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BindClass {
    Text,
    Blob,
    NarrowInt,
    WideInt,
    Numeric,
    Temporal,
}

impl BindClass {
    /// Classify a raw `COLUMN_TYPE` string such as `varchar(255)`,
    /// `bigint(20) unsigned` or `datetime`.
    ///
    /// Order matters: temporal types are checked first because `datetime`
    /// otherwise matches the integer probe, and unsigned/big integers are
    /// split off before the narrow integer catch-all.
    pub fn classify(column_type: &str) -> Self {
        let ty = column_type.to_ascii_lowercase();
        let has = |needle: &str| ty.contains(needle);

        if has("date") || has("time") || has("year") {
            Self::Temporal
        } else if has("bigint") || ((has("int") || has("integer")) && has("unsigned")) {
            Self::WideInt
        } else if has("dec") || has("double") || has("fixed") || has("float") || has("numeric") {
            Self::Numeric
        } else if has("blob") {
            Self::Blob
        } else if has("int") || has("bool") {
            Self::NarrowInt
        } else {
            // char, varchar, text, json, enum, set, bit and anything new
            Self::Text
        }
    }
}

impl std::fmt::Display for BindClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Blob => write!(f, "blob"),
            Self::NarrowInt => write!(f, "narrow_int"),
            Self::WideInt => write!(f, "wide_int"),
            Self::Numeric => write!(f, "numeric"),
            Self::Temporal => write!(f, "temporal"),
        }
    }
}

impl std::str::FromStr for BindClass {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(Self::Text),
            "blob" => Ok(Self::Blob),
            "narrow_int" => Ok(Self::NarrowInt),
            "wide_int" => Ok(Self::WideInt),
            "numeric" => Ok(Self::Numeric),
            "temporal" => Ok(Self::Temporal),
            other => Err(format!("unknown bind class: {other}")),
        }
    }
}

/// A single column as the introspection reports it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ColumnMeta {
    pub name: String,
    pub bind: BindClass,
}

/// All columns of one base table, in ordinal order.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TableColumns {
    pub table: String,
    pub columns: Vec<ColumnMeta>,
}

impl TableColumns {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
        }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnMeta> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Names of the columns that are candidates for string replacement under
    /// the given settings: text columns, blob columns when blob inclusion is
    /// on, narrowed by the table prefix filter and the per-table
    /// include/exclude filters.
    pub fn eligible(&self, settings: &RunSettings) -> Vec<String> {
        if let Some(prefix) = &settings.table_prefix {
            if !self.table.starts_with(prefix.as_str()) {
                return Vec::new();
            }
        }

        self.columns
            .iter()
            .filter(|c| match c.bind {
                BindClass::Text => true,
                BindClass::Blob => settings.include_blob,
                _ => false,
            })
            .filter(|c| settings.column_allowed(&self.table, &c.name))
            .map(|c| c.name.clone())
            .collect()
    }
}
