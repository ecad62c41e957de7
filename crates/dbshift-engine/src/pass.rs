use tracing::{debug, info, warn};

use dbshift_core::{sequence, ReplacementSet, RunSettings, TableColumns, TableCounters};
use dbshift_serial::rewrite_cell;
use dbshift_store::{PageRow, SqlValue, Transport};

use crate::EngineError;

/// One full pass over one table: lock, number the matching rows,
/// rewrite them page by page, then tear the cursor column down and
/// unlock.
///
/// Returns `None` when the table was skipped (no candidate columns, or
/// a lock/DDL/query failure confined to this table). Only failures
/// fatal to the whole run propagate as `Err`.
pub(crate) fn run_table<T: Transport>(
    transport: &mut T,
    table: &TableColumns,
    settings: &RunSettings,
    set: &ReplacementSet,
    probes: &[String],
) -> Result<Option<TableCounters>, EngineError> {
    let eligible = table.eligible(settings);
    if eligible.is_empty() {
        debug!(table = %table.table, "no candidate columns, skipping");
        return Ok(None);
    }

    // Mint the cursor name before touching the table; re-mint on the
    // unlikely clash with an existing column.
    let mut cursor = sequence::sequence_column_name()?;
    while table.has_column(&cursor) {
        cursor = sequence::sequence_column_name()?;
    }

    if let Err(e) = transport.lock_table(&table.table) {
        warn!(table = %table.table, error = %e, "could not lock, skipping table");
        return Ok(None);
    }

    if let Err(e) = transport.add_sequence_column(&table.table, &cursor) {
        warn!(table = %table.table, error = %e, "could not add cursor column, skipping table");
        if let Err(e) = transport.unlock_tables() {
            warn!(table = %table.table, error = %e, "unlock failed");
        }
        return Ok(None);
    }

    let outcome = scan(transport, &table.table, &cursor, &eligible, settings, set, probes);

    // Cleanup runs whatever the scan outcome was; the cursor column
    // must not outlive the pass.
    if let Err(e) = transport.drop_column(&table.table, &cursor) {
        warn!(table = %table.table, column = %cursor, error = %e, "could not drop cursor column");
    }
    if let Err(e) = transport.unlock_tables() {
        warn!(table = %table.table, error = %e, "unlock failed");
    }

    match outcome {
        Ok(counters) => {
            info!(
                table = %table.table,
                rows_found = counters.rows_found,
                rows_updated = counters.rows_updated,
                "table done"
            );
            Ok(Some(counters))
        }
        Err(EngineError::Store(e)) if e.skips_table() => {
            warn!(table = %table.table, error = %e, "abandoning table");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

fn scan<T: Transport>(
    transport: &mut T,
    table: &str,
    cursor: &str,
    eligible: &[String],
    settings: &RunSettings,
    set: &ReplacementSet,
    probes: &[String],
) -> Result<TableCounters, EngineError> {
    let rows_found = transport.assign_sequence(table, cursor, eligible, probes)?;
    let page = settings.effective_page_size();
    let mut rows_updated = 0;

    for page_index in 0..rows_found.div_ceil(page) {
        let lo = page_index * page;
        let rows = match transport.fetch_page(table, cursor, eligible, probes, lo, page) {
            Ok(rows) => rows,
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => {
                warn!(table, lo, error = %e, "page fetch failed, moving to next range");
                continue;
            }
        };
        for row in rows {
            let changed = rewrite_row(&row, set)?;
            if changed.is_empty() {
                continue;
            }
            match transport.update_row(table, cursor, row.seq, &changed) {
                Ok(true) => rows_updated += 1,
                Ok(false) => {}
                Err(e) if e.skips_row() => {
                    warn!(table, seq = row.seq, error = %e, "row update failed, continuing");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    Ok(TableCounters { rows_found, rows_updated })
}

/// Rewrite every candidate cell of one row, returning only the cells
/// whose bytes actually changed.
fn rewrite_row(
    row: &PageRow,
    set: &ReplacementSet,
) -> Result<Vec<(String, SqlValue)>, EngineError> {
    let mut changed = Vec::new();
    for (name, value) in &row.cells {
        let Some(bytes) = value.bytes() else { continue };
        let (rewritten, count) = rewrite_cell(bytes, set)?;
        if count > 0 && rewritten.as_slice() != bytes {
            changed.push((name.clone(), value.with_bytes(rewritten)));
        }
    }
    Ok(changed)
}
