use tracing::{info, warn};

use dbshift_core::RunReport;
use dbshift_store::Transport;

use crate::EngineError;

/// Rename every base table carrying `from` as its name prefix so it
/// carries `to` instead. Each table is renamed under its own write
/// lock; a table that cannot be locked or renamed is logged and left
/// as it was.
pub fn rename_prefix<T: Transport>(
    transport: &mut T,
    from: &str,
    to: &str,
    report: &mut RunReport,
) -> Result<(), EngineError> {
    if from.is_empty() || from == to {
        return Ok(());
    }

    let tables = transport.list_tables(from)?;
    if tables.is_empty() {
        info!(prefix = from, "no tables carry the prefix");
        return Ok(());
    }

    if let Err(e) = transport.suspend_fk_checks() {
        warn!(error = %e, "could not suspend foreign key checks");
    }

    for table in tables {
        let Some(stem) = table.strip_prefix(from) else {
            continue;
        };
        let target = format!("{to}{stem}");

        if let Err(e) = transport.lock_table(&table) {
            warn!(table = %table, error = %e, "could not lock, leaving table name as is");
            continue;
        }
        match transport.rename_table(&table, &target) {
            Ok(()) => {
                info!(from = %table, to = %target, "table renamed");
                report.renamed.push((table.clone(), target));
            }
            Err(e) => warn!(table = %table, error = %e, "rename failed, leaving table name as is"),
        }
        if let Err(e) = transport.unlock_tables() {
            warn!(table = %table, error = %e, "unlock failed");
        }
    }

    if let Err(e) = transport.restore_fk_checks() {
        warn!(error = %e, "could not restore foreign key checks");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbshift_core::BindClass;
    use dbshift_store::memory::MemoryTransport;

    fn seeded() -> MemoryTransport {
        let mut mem = MemoryTransport::new();
        mem.add_table("wp_posts", &[("body", BindClass::Text)]);
        mem.add_table("wp_users", &[("name", BindClass::Text)]);
        mem.add_table("other", &[("x", BindClass::Text)]);
        mem
    }

    #[test]
    fn renames_every_prefixed_table() {
        let mut mem = seeded();
        let mut report = RunReport::default();
        rename_prefix(&mut mem, "wp_", "site_", &mut report).unwrap();

        assert!(mem.table("site_posts").is_some());
        assert!(mem.table("site_users").is_some());
        assert!(mem.table("wp_posts").is_none());
        assert!(mem.table("other").is_some());
        assert_eq!(
            report.renamed,
            vec![
                ("wp_posts".to_string(), "site_posts".to_string()),
                ("wp_users".to_string(), "site_users".to_string()),
            ]
        );
    }

    #[test]
    fn identical_prefixes_are_a_no_op() {
        let mut mem = seeded();
        let mut report = RunReport::default();
        rename_prefix(&mut mem, "wp_", "wp_", &mut report).unwrap();
        assert!(report.renamed.is_empty());
        assert!(mem.events.is_empty());
    }

    #[test]
    fn lock_failure_leaves_the_table_alone() {
        let mut mem = seeded();
        mem.fail_lock.insert("wp_posts".into());
        let mut report = RunReport::default();
        rename_prefix(&mut mem, "wp_", "site_", &mut report).unwrap();

        assert!(mem.table("wp_posts").is_some());
        assert!(mem.table("site_users").is_some());
        assert_eq!(report.renamed.len(), 1);
    }
}
