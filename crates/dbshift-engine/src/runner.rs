use tracing::{info, warn};

use dbshift_core::{ReplacementSet, RunReport, RunSettings};
use dbshift_store::Transport;

use crate::pass;
use crate::EngineError;

/// Execute one replacement run over every base table.
///
/// Foreign-key enforcement is suspended once for the whole run and
/// restored at the end; each table then goes through its own
/// lock/number/page/unlock cycle. Tables without candidate columns are
/// never locked at all.
pub fn run<T: Transport>(
    transport: &mut T,
    settings: &RunSettings,
    set: &ReplacementSet,
    probes: &[String],
) -> Result<RunReport, EngineError> {
    let mut report = RunReport {
        replacements: set.pairs().to_vec(),
        ..Default::default()
    };
    if set.is_empty() || probes.is_empty() {
        info!("no replacements registered, nothing to do");
        return Ok(report);
    }

    let tables = transport.introspect()?;
    info!(tables = tables.len(), "schema loaded");

    if let Err(e) = transport.suspend_fk_checks() {
        warn!(error = %e, "could not suspend foreign key checks");
    }

    // The restore must run even when a table pass fails fatally, so
    // the error is held until after it.
    let mut fatal = Ok(());
    for table in &tables {
        match pass::run_table(transport, table, settings, set, probes) {
            Ok(Some(counters)) => report.record(&table.table, counters),
            Ok(None) => {}
            Err(e) => {
                fatal = Err(e);
                break;
            }
        }
    }

    if let Err(e) = transport.restore_fk_checks() {
        warn!(error = %e, "could not restore foreign key checks");
    }
    fatal?;

    info!(
        rows_found = report.total_rows_found(),
        rows_updated = report.total_rows_updated(),
        "run complete"
    );
    Ok(report)
}
