//! In-memory [`Transport`] for tests: the same protocol surface as the
//! live backend, over plain vectors, with fault injection for lock and
//! update failures and an event log for asserting call order.

use std::collections::{BTreeMap, HashSet};

use dbshift_core::{BindClass, ColumnMeta, TableColumns};

use crate::error::StoreError;
use crate::transport::Transport;
use crate::value::{PageRow, SqlValue};

#[derive(Clone, Debug, Default)]
pub struct MemTable {
    pub columns: Vec<ColumnMeta>,
    pub rows: Vec<BTreeMap<String, SqlValue>>,
    /// Cursor values aligned with `rows`; `None` while unnumbered.
    seq: Vec<Option<u64>>,
    cursor_column: Option<String>,
}

#[derive(Default)]
pub struct MemoryTransport {
    tables: BTreeMap<String, MemTable>,
    pub fail_lock: HashSet<String>,
    pub fail_update: HashSet<(String, u64)>,
    /// Page fetches to fail, keyed by `(table, lo)`.
    pub fail_fetch: HashSet<(String, u64)>,
    /// Tables whose sequence assignment fails fatally, as when the
    /// session dies mid-run.
    pub fail_sequence: HashSet<String>,
    pub events: Vec<String>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_table(&mut self, name: &str, columns: &[(&str, BindClass)]) {
        let table = MemTable {
            columns: columns
                .iter()
                .map(|(n, bind)| ColumnMeta { name: n.to_string(), bind: *bind })
                .collect(),
            ..Default::default()
        };
        self.tables.insert(name.to_string(), table);
    }

    pub fn add_row(&mut self, table: &str, cells: &[(&str, SqlValue)]) {
        if let Some(t) = self.tables.get_mut(table) {
            t.rows.push(
                cells
                    .iter()
                    .map(|(n, v)| (n.to_string(), v.clone()))
                    .collect(),
            );
            t.seq.push(None);
        }
    }

    pub fn table(&self, name: &str) -> Option<&MemTable> {
        self.tables.get(name)
    }

    pub fn cell(&self, table: &str, row: usize, column: &str) -> Option<&SqlValue> {
        self.tables.get(table)?.rows.get(row)?.get(column)
    }

    fn table_mut(&mut self, name: &str) -> Result<&mut MemTable, StoreError> {
        self.tables.get_mut(name).ok_or_else(|| StoreError::Query {
            context: name.to_string(),
            message: "no such table".into(),
        })
    }

    fn row_matches(
        row: &BTreeMap<String, SqlValue>,
        eligible: &[String],
        probes: &[String],
    ) -> bool {
        eligible.iter().any(|col| {
            row.get(col)
                .and_then(|v| v.bytes())
                .is_some_and(|bytes| probes.iter().any(|p| like_match(p.as_bytes(), bytes)))
        })
    }
}

impl Transport for MemoryTransport {
    fn introspect(&mut self) -> Result<Vec<TableColumns>, StoreError> {
        self.events.push("introspect".into());
        Ok(self
            .tables
            .iter()
            .map(|(name, t)| TableColumns {
                table: name.clone(),
                columns: t.columns.clone(),
            })
            .collect())
    }

    fn lock_table(&mut self, table: &str) -> Result<(), StoreError> {
        if self.fail_lock.contains(table) {
            return Err(StoreError::Lock {
                table: table.to_string(),
                message: "injected".into(),
            });
        }
        self.events.push(format!("lock {table}"));
        Ok(())
    }

    fn unlock_tables(&mut self) -> Result<(), StoreError> {
        self.events.push("unlock".into());
        Ok(())
    }

    fn suspend_fk_checks(&mut self) -> Result<(), StoreError> {
        self.events.push("fk off".into());
        Ok(())
    }

    fn restore_fk_checks(&mut self) -> Result<(), StoreError> {
        self.events.push("fk on".into());
        Ok(())
    }

    fn add_sequence_column(&mut self, table: &str, column: &str) -> Result<(), StoreError> {
        self.events.push(format!("add column {table}.{column}"));
        let t = self.table_mut(table)?;
        t.cursor_column = Some(column.to_string());
        t.seq = vec![None; t.rows.len()];
        Ok(())
    }

    fn assign_sequence(
        &mut self,
        table: &str,
        _column: &str,
        eligible: &[String],
        probes: &[String],
    ) -> Result<u64, StoreError> {
        if self.fail_sequence.contains(table) {
            return Err(StoreError::Connection {
                attempts: 1,
                message: "injected".into(),
            });
        }
        self.events.push(format!("sequence {table}"));
        let t = self.table_mut(table)?;
        let mut next = 0u64;
        for (i, row) in t.rows.iter().enumerate() {
            if Self::row_matches(row, eligible, probes) {
                next += 1;
                t.seq[i] = Some(next);
            } else {
                t.seq[i] = None;
            }
        }
        Ok(next)
    }

    fn fetch_page(
        &mut self,
        table: &str,
        _column: &str,
        eligible: &[String],
        probes: &[String],
        lo: u64,
        page: u64,
    ) -> Result<Vec<PageRow>, StoreError> {
        if self.fail_fetch.contains(&(table.to_string(), lo)) {
            return Err(StoreError::Query {
                context: table.to_string(),
                message: "injected".into(),
            });
        }
        self.events.push(format!("page {table} {lo}"));
        let t = self.table_mut(table)?;
        let mut out = Vec::new();
        for (i, row) in t.rows.iter().enumerate() {
            let Some(seq) = t.seq[i] else { continue };
            if seq <= lo || seq > lo + page {
                continue;
            }
            if !Self::row_matches(row, eligible, probes) {
                continue;
            }
            let cells = eligible
                .iter()
                .filter_map(|col| row.get(col).map(|v| (col.clone(), v.clone())))
                .collect();
            out.push(PageRow { seq, cells });
        }
        out.sort_by_key(|r| r.seq);
        Ok(out)
    }

    fn update_row(
        &mut self,
        table: &str,
        _column: &str,
        seq: u64,
        cells: &[(String, SqlValue)],
    ) -> Result<bool, StoreError> {
        if self.fail_update.contains(&(table.to_string(), seq)) {
            return Err(StoreError::Update {
                table: table.to_string(),
                seq,
                message: "injected".into(),
            });
        }
        self.events.push(format!("update {table} {seq}"));
        let t = self.table_mut(table)?;
        let Some(i) = t.seq.iter().position(|s| *s == Some(seq)) else {
            return Ok(false);
        };
        for (name, value) in cells {
            t.rows[i].insert(name.clone(), value.clone());
        }
        Ok(true)
    }

    fn drop_column(&mut self, table: &str, column: &str) -> Result<(), StoreError> {
        self.events.push(format!("drop column {table}.{column}"));
        let t = self.table_mut(table)?;
        if t.cursor_column.as_deref() == Some(column) {
            t.cursor_column = None;
            t.seq = vec![None; t.rows.len()];
        }
        Ok(())
    }

    fn list_tables(&mut self, prefix: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .tables
            .keys()
            .filter(|name| name.starts_with(prefix))
            .cloned()
            .collect())
    }

    fn rename_table(&mut self, from: &str, to: &str) -> Result<(), StoreError> {
        self.events.push(format!("rename {from} {to}"));
        let Some(t) = self.tables.remove(from) else {
            return Err(StoreError::Ddl {
                table: from.to_string(),
                message: "no such table".into(),
            });
        };
        self.tables.insert(to.to_string(), t);
        Ok(())
    }
}

/// SQL `LIKE` over bytes: `%` matches any run, `_` one byte, backslash
/// escapes the next byte.
pub fn like_match(pattern: &[u8], subject: &[u8]) -> bool {
    match pattern.split_first() {
        None => subject.is_empty(),
        Some((b'%', rest)) => (0..=subject.len()).any(|i| like_match(rest, &subject[i..])),
        Some((b'_', rest)) => !subject.is_empty() && like_match(rest, &subject[1..]),
        Some((b'\\', rest)) => match rest.split_first() {
            Some((&literal, rest)) => {
                subject.first() == Some(&literal) && like_match(rest, &subject[1..])
            }
            None => subject.is_empty(),
        },
        Some((&literal, rest)) => {
            subject.first() == Some(&literal) && like_match(rest, &subject[1..])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_wildcards() {
        assert!(like_match(b"%old.test%", b"visit http://old.test now"));
        assert!(like_match(b"%old.test%", b"old.test"));
        assert!(!like_match(b"%old.test%", b"old_test")); // dot is literal
        assert!(like_match(b"a_c", b"abc"));
        assert!(!like_match(b"a_c", b"ac"));
    }

    #[test]
    fn like_escapes() {
        assert!(like_match(b"%50\\%%", b"take 50% off"));
        assert!(!like_match(b"%50\\%%", b"take 50 off"));
        assert!(like_match(b"%a\\_b%", b"a_b"));
        assert!(!like_match(b"%a\\_b%", b"axb"));
    }

    #[test]
    fn sequence_numbers_only_matching_rows_densely() {
        let mut mem = MemoryTransport::new();
        mem.add_table("t", &[("body", BindClass::Text)]);
        mem.add_row("t", &[("body", SqlValue::Text(b"has old.test".to_vec()))]);
        mem.add_row("t", &[("body", SqlValue::Text(b"nothing".to_vec()))]);
        mem.add_row("t", &[("body", SqlValue::Text(b"old.test again".to_vec()))]);

        mem.add_sequence_column("t", "c").unwrap();
        let found = mem
            .assign_sequence("t", "c", &["body".into()], &["%old.test%".into()])
            .unwrap();
        assert_eq!(found, 2);

        let rows = mem
            .fetch_page("t", "c", &["body".into()], &["%old.test%".into()], 0, 10)
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].seq, 1);
        assert_eq!(rows[1].seq, 2);
    }

    #[test]
    fn page_bounds_are_half_open_above_lo() {
        let mut mem = MemoryTransport::new();
        mem.add_table("t", &[("body", BindClass::Text)]);
        for i in 0..5 {
            mem.add_row("t", &[("body", SqlValue::Text(format!("x{i}").into_bytes()))]);
        }
        mem.add_sequence_column("t", "c").unwrap();
        mem.assign_sequence("t", "c", &["body".into()], &["%x%".into()]).unwrap();

        let page = mem
            .fetch_page("t", "c", &["body".into()], &["%x%".into()], 2, 2)
            .unwrap();
        let seqs: Vec<u64> = page.iter().map(|r| r.seq).collect();
        assert_eq!(seqs, vec![3, 4]);
    }

    #[test]
    fn injected_failures_surface_as_errors() {
        let mut mem = MemoryTransport::new();
        mem.add_table("t", &[("body", BindClass::Text)]);
        mem.fail_lock.insert("t".into());
        assert!(matches!(mem.lock_table("t"), Err(StoreError::Lock { .. })));

        mem.fail_update.insert(("t".into(), 1));
        let err = mem.update_row("t", "c", 1, &[]).unwrap_err();
        assert!(err.skips_row());

        mem.fail_fetch.insert(("t".into(), 0));
        let err = mem.fetch_page("t", "c", &[], &[], 0, 10).unwrap_err();
        assert!(err.skips_table());

        mem.fail_sequence.insert("t".into());
        let err = mem.assign_sequence("t", "c", &[], &[]).unwrap_err();
        assert!(err.is_fatal());
    }
}
