use dbshift_core::BindClass;

/// One cell value as stored or bound.
///
/// Text and blob contents are raw bytes; character-set decoding is
/// deliberately not attempted, since replacement operates on bytes.
#[derive(Clone, Debug, PartialEq)]
pub enum SqlValue {
    Null,
    Text(Vec<u8>),
    Blob(Vec<u8>),
    NarrowInt(i64),
    WideInt(u64),
    Numeric(f64),
    /// Date/time values kept in their textual server form.
    Temporal(String),
}

impl SqlValue {
    pub fn bind_class(&self) -> Option<BindClass> {
        match self {
            Self::Null => None,
            Self::Text(_) => Some(BindClass::Text),
            Self::Blob(_) => Some(BindClass::Blob),
            Self::NarrowInt(_) => Some(BindClass::NarrowInt),
            Self::WideInt(_) => Some(BindClass::WideInt),
            Self::Numeric(_) => Some(BindClass::Numeric),
            Self::Temporal(_) => Some(BindClass::Temporal),
        }
    }

    /// The replaceable byte payload, if this value has one.
    pub fn bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Text(b) | Self::Blob(b) => Some(b),
            _ => None,
        }
    }

    /// Rebuild the value with new bytes, keeping the text/blob class.
    pub fn with_bytes(&self, bytes: Vec<u8>) -> Self {
        match self {
            Self::Blob(_) => Self::Blob(bytes),
            _ => Self::Text(bytes),
        }
    }
}

/// One fetched row: its cursor position and the candidate cells, in
/// column order.
#[derive(Clone, Debug, PartialEq)]
pub struct PageRow {
    pub seq: u64,
    pub cells: Vec<(String, SqlValue)>,
}
