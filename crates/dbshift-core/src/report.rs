use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Per-table outcome of a replacement pass.
///
/// `rows_found` is fixed at the instant the sequence column is populated;
/// `rows_updated` counts rows whose UPDATE actually succeeded.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TableCounters {
    pub rows_found: u64,
    pub rows_updated: u64,
}

/// Everything a caller needs to render or persist the outcome of a run.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RunReport {
    /// Counters per processed table. Skipped tables do not appear.
    pub tables: BTreeMap<String, TableCounters>,
    /// The registered search → replacement pairs, in registration order.
    pub replacements: Vec<(String, String)>,
    /// Tables renamed during a prefix rename, old name → new name.
    pub renamed: Vec<(String, String)>,
}

impl RunReport {
    pub fn record(&mut self, table: &str, counters: TableCounters) {
        self.tables.insert(table.to_string(), counters);
    }

    pub fn total_rows_found(&self) -> u64 {
        self.tables.values().map(|c| c.rows_found).sum()
    }

    pub fn total_rows_updated(&self) -> u64 {
        self.tables.values().map(|c| c.rows_updated).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn totals_sum_over_tables() {
        let mut report = RunReport::default();
        report.record("a", TableCounters { rows_found: 10, rows_updated: 4 });
        report.record("b", TableCounters { rows_found: 5, rows_updated: 5 });
        assert_eq!(report.total_rows_found(), 15);
        assert_eq!(report.total_rows_updated(), 9);
    }

    #[test]
    fn serde_roundtrip() {
        let mut report = RunReport::default();
        report.record("t", TableCounters { rows_found: 2, rows_updated: 1 });
        report.replacements.push(("old".into(), "new".into()));
        let json = serde_json::to_string(&report).unwrap();
        let parsed: RunReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.tables["t"].rows_found, 2);
        assert_eq!(parsed.replacements.len(), 1);
    }
}
