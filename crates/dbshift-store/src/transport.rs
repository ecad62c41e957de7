use dbshift_core::TableColumns;

use crate::error::StoreError;
use crate::value::{PageRow, SqlValue};

/// Everything the rewrite engine needs from a database.
///
/// The trait is deliberately semantic rather than a SQL pass-through:
/// each method is one step of the scan/lock/update protocol, which
/// keeps the engine backend-agnostic and lets tests run against
/// [`crate::memory::MemoryTransport`] without a server.
pub trait Transport {
    /// Column metadata for every base table. Leftover cursor columns
    /// from an aborted earlier run are dropped during this scan and do
    /// not appear in the result.
    fn introspect(&mut self) -> Result<Vec<TableColumns>, StoreError>;

    /// Take a write lock on one table.
    fn lock_table(&mut self, table: &str) -> Result<(), StoreError>;

    /// Release every lock held by this session.
    fn unlock_tables(&mut self) -> Result<(), StoreError>;

    /// Turn foreign-key enforcement off for this session, remembering
    /// the prior setting.
    fn suspend_fk_checks(&mut self) -> Result<(), StoreError>;

    /// Restore foreign-key enforcement to the remembered setting.
    fn restore_fk_checks(&mut self) -> Result<(), StoreError>;

    /// Add the temporary cursor column to a table.
    fn add_sequence_column(&mut self, table: &str, column: &str) -> Result<(), StoreError>;

    /// Number the rows whose candidate cells match any probe pattern,
    /// densely from 1, in the cursor column. Returns the count of rows
    /// numbered.
    fn assign_sequence(
        &mut self,
        table: &str,
        column: &str,
        eligible: &[String],
        probes: &[String],
    ) -> Result<u64, StoreError>;

    /// Fetch the rows with cursor values in `(lo, lo + page]`, still
    /// re-checked against the probe patterns, ordered by cursor.
    fn fetch_page(
        &mut self,
        table: &str,
        column: &str,
        eligible: &[String],
        probes: &[String],
        lo: u64,
        page: u64,
    ) -> Result<Vec<PageRow>, StoreError>;

    /// Write changed cells of one row, addressed by cursor value.
    /// Returns whether a row was actually updated.
    fn update_row(
        &mut self,
        table: &str,
        column: &str,
        seq: u64,
        cells: &[(String, SqlValue)],
    ) -> Result<bool, StoreError>;

    /// Drop the temporary cursor column.
    fn drop_column(&mut self, table: &str, column: &str) -> Result<(), StoreError>;

    /// Base tables whose names start with `prefix`.
    fn list_tables(&mut self, prefix: &str) -> Result<Vec<String>, StoreError>;

    /// Rename one table.
    fn rename_table(&mut self, from: &str, to: &str) -> Result<(), StoreError>;
}
