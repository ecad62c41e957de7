use thiserror::Error;

/// Failures from the database layer.
///
/// The engine's reaction differs per variant: some abort the run, some
/// skip the table being processed, and some only skip the row at hand.
/// The classification helpers encode that policy in one place.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Connecting failed even after retrying.
    #[error("connection failed after {attempts} attempt(s): {message}")]
    Connection { attempts: u32, message: String },

    /// A write lock could not be taken.
    #[error("could not lock table `{table}`: {message}")]
    Lock { table: String, message: String },

    /// Schema introspection failed; nothing sensible can run without it.
    #[error("schema introspection failed: {0}")]
    Schema(String),

    /// Adding or dropping the cursor column failed.
    #[error("schema change on `{table}` failed: {message}")]
    Ddl { table: String, message: String },

    /// The number of bound parameters does not match the statement.
    #[error("bind mismatch on `{table}`: statement wants {expected} parameters, {built} were built")]
    BindMismatch {
        table: String,
        expected: usize,
        built: usize,
    },

    /// A query or session statement failed.
    #[error("query failed ({context}): {message}")]
    Query { context: String, message: String },

    /// Writing one row back failed.
    #[error("update of `{table}` row {seq} failed: {message}")]
    Update {
        table: String,
        seq: u64,
        message: String,
    },
}

impl StoreError {
    /// Errors that end the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Schema(_))
    }

    /// Errors that abandon the current table but let the run continue.
    pub fn skips_table(&self) -> bool {
        matches!(
            self,
            Self::Lock { .. } | Self::Ddl { .. } | Self::Query { .. }
        )
    }

    /// Errors confined to a single row.
    pub fn skips_row(&self) -> bool {
        matches!(self, Self::Update { .. } | Self::BindMismatch { .. })
    }
}
