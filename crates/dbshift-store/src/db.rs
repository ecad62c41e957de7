use std::time::Duration;

use mysql::prelude::Queryable;
use mysql::{Conn, OptsBuilder, Params, Row, SslOpts, Value};
use serde::Deserialize;
use tracing::{debug, info, warn};

use dbshift_core::replacements::escape_like;
use dbshift_core::sequence::sequence_column_comment;
use dbshift_core::TableColumns;

use crate::error::StoreError;
use crate::schema::{organize_columns, RawColumn};
use crate::transport::Transport;
use crate::value::{PageRow, SqlValue};

const CONNECT_ATTEMPTS: u32 = 3;
const CONNECT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Connection parameters, usually read from the parameter file.
#[derive(Clone, Debug, Deserialize)]
pub struct ConnectInfo {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub user: String,
    #[serde(default)]
    pub password: String,
    pub database: String,
    #[serde(default)]
    pub ssl: bool,
}

fn default_port() -> u16 {
    3306
}

/// Live backend over one MySQL session.
///
/// A single session matters: table locks, the user variables behind
/// sequence numbering and the saved foreign-key setting are all
/// session-scoped.
pub struct MySqlTransport {
    conn: Conn,
    database: String,
}

impl MySqlTransport {
    /// Connect, retrying a few times before giving up. Servers under a
    /// connection cap commonly admit a late attempt.
    pub fn connect(info: &ConnectInfo) -> Result<Self, StoreError> {
        let mut last = String::new();
        for attempt in 1..=CONNECT_ATTEMPTS {
            let mut opts = OptsBuilder::new()
                .ip_or_hostname(Some(info.host.as_str()))
                .tcp_port(info.port)
                .user(Some(info.user.as_str()))
                .pass(Some(info.password.as_str()))
                .db_name(Some(info.database.as_str()));
            if info.ssl {
                opts = opts.ssl_opts(SslOpts::default());
            }
            match Conn::new(opts) {
                Ok(conn) => {
                    debug!(host = %info.host, database = %info.database, "connected");
                    return Ok(Self {
                        conn,
                        database: info.database.clone(),
                    });
                }
                Err(e) => {
                    last = e.to_string();
                    warn!(attempt, error = %last, "connection attempt failed");
                    if attempt < CONNECT_ATTEMPTS {
                        std::thread::sleep(CONNECT_RETRY_DELAY);
                    }
                }
            }
        }
        Err(StoreError::Connection {
            attempts: CONNECT_ATTEMPTS,
            message: last,
        })
    }

    fn exec_rows(
        &mut self,
        sql: &str,
        params: Vec<Value>,
        context: &str,
    ) -> Result<Vec<Row>, StoreError> {
        verify_binds(sql, params.len(), context)?;
        self.conn
            .exec(sql, Params::Positional(params))
            .map_err(|e| StoreError::Query {
                context: context.to_string(),
                message: e.to_string(),
            })
    }
}

impl Transport for MySqlTransport {
    fn introspect(&mut self) -> Result<Vec<TableColumns>, StoreError> {
        const SQL: &str = "SELECT c.TABLE_NAME, c.COLUMN_NAME, c.COLUMN_TYPE, c.COLUMN_COMMENT \
             FROM INFORMATION_SCHEMA.COLUMNS c \
             JOIN INFORMATION_SCHEMA.TABLES t \
               ON t.TABLE_SCHEMA = c.TABLE_SCHEMA AND t.TABLE_NAME = c.TABLE_NAME \
             WHERE c.TABLE_SCHEMA = ? AND t.TABLE_TYPE = 'BASE TABLE' \
             ORDER BY c.TABLE_NAME, c.ORDINAL_POSITION";

        let rows: Vec<(String, String, String, String)> = self
            .conn
            .exec(SQL, (self.database.as_str(),))
            .map_err(|e| StoreError::Schema(e.to_string()))?;

        let raw = rows
            .into_iter()
            .map(|(table, column, column_type, comment)| RawColumn {
                table,
                column,
                column_type,
                comment,
            })
            .collect();
        let (tables, residual) = organize_columns(raw);

        for (table, column) in residual {
            info!(table, column, "dropping leftover cursor column");
            if let Err(e) = self.drop_column(&table, &column) {
                warn!(table, column, error = %e, "could not drop leftover cursor column");
            }
        }
        Ok(tables)
    }

    fn lock_table(&mut self, table: &str) -> Result<(), StoreError> {
        self.conn
            .query_drop(lock_sql(table))
            .map_err(|e| StoreError::Lock {
                table: table.to_string(),
                message: e.to_string(),
            })
    }

    fn unlock_tables(&mut self) -> Result<(), StoreError> {
        self.conn
            .query_drop("UNLOCK TABLES")
            .map_err(|e| StoreError::Query {
                context: "unlock".into(),
                message: e.to_string(),
            })
    }

    fn suspend_fk_checks(&mut self) -> Result<(), StoreError> {
        self.conn
            .query_drop(
                "SET @DBSHIFT_FOREIGN_KEY_CHECKS = @@FOREIGN_KEY_CHECKS, FOREIGN_KEY_CHECKS = 0",
            )
            .map_err(|e| StoreError::Query {
                context: "suspend foreign key checks".into(),
                message: e.to_string(),
            })
    }

    fn restore_fk_checks(&mut self) -> Result<(), StoreError> {
        self.conn
            .query_drop("SET FOREIGN_KEY_CHECKS = @DBSHIFT_FOREIGN_KEY_CHECKS")
            .map_err(|e| StoreError::Query {
                context: "restore foreign key checks".into(),
                message: e.to_string(),
            })
    }

    fn add_sequence_column(&mut self, table: &str, column: &str) -> Result<(), StoreError> {
        self.conn
            .query_drop(add_sequence_sql(table, column))
            .map_err(|e| StoreError::Ddl {
                table: table.to_string(),
                message: e.to_string(),
            })
    }

    fn assign_sequence(
        &mut self,
        table: &str,
        column: &str,
        eligible: &[String],
        probes: &[String],
    ) -> Result<u64, StoreError> {
        if eligible.is_empty() || probes.is_empty() {
            return Ok(0);
        }
        let sql = assign_sequence_sql(table, column, eligible, probes.len());
        let params = probe_params(eligible.len(), probes);
        verify_binds(&sql, params.len(), table)?;
        self.conn
            .exec_drop(sql, Params::Positional(params))
            .map_err(|e| StoreError::Query {
                context: table.to_string(),
                message: e.to_string(),
            })?;
        Ok(self.conn.affected_rows())
    }

    fn fetch_page(
        &mut self,
        table: &str,
        column: &str,
        eligible: &[String],
        probes: &[String],
        lo: u64,
        page: u64,
    ) -> Result<Vec<PageRow>, StoreError> {
        if eligible.is_empty() || probes.is_empty() {
            return Ok(Vec::new());
        }
        let sql = page_sql(table, column, eligible, probes.len());
        let mut params = vec![Value::UInt(lo), Value::UInt(lo + page)];
        params.extend(probe_params(eligible.len(), probes));

        let rows = self.exec_rows(&sql, params, table)?;
        let mut page_rows = Vec::with_capacity(rows.len());
        for row in rows {
            let values: Vec<Value> = (0..row.len())
                .map(|i| row.as_ref(i).cloned().unwrap_or(Value::NULL))
                .collect();
            let Some(first) = values.first() else { continue };
            let seq = seq_from(first).ok_or_else(|| StoreError::Query {
                context: table.to_string(),
                message: "cursor column returned a non-integer".into(),
            })?;
            let cells = eligible
                .iter()
                .zip(values.into_iter().skip(1))
                .map(|(name, value)| (name.clone(), from_sql(value)))
                .collect();
            page_rows.push(PageRow { seq, cells });
        }
        Ok(page_rows)
    }

    fn update_row(
        &mut self,
        table: &str,
        column: &str,
        seq: u64,
        cells: &[(String, SqlValue)],
    ) -> Result<bool, StoreError> {
        if cells.is_empty() {
            return Ok(false);
        }
        let names: Vec<String> = cells.iter().map(|(name, _)| name.clone()).collect();
        let sql = update_sql(table, column, &names);
        let mut params: Vec<Value> = cells.iter().map(|(_, value)| to_sql(value)).collect();
        params.push(Value::UInt(seq));
        verify_binds(&sql, params.len(), table)?;

        self.conn
            .exec_drop(sql, Params::Positional(params))
            .map_err(|e| StoreError::Update {
                table: table.to_string(),
                seq,
                message: e.to_string(),
            })?;
        Ok(self.conn.affected_rows() > 0)
    }

    fn drop_column(&mut self, table: &str, column: &str) -> Result<(), StoreError> {
        self.conn
            .query_drop(drop_column_sql(table, column))
            .map_err(|e| StoreError::Ddl {
                table: table.to_string(),
                message: e.to_string(),
            })
    }

    fn list_tables(&mut self, prefix: &str) -> Result<Vec<String>, StoreError> {
        const SQL: &str = "SELECT TABLE_NAME FROM INFORMATION_SCHEMA.TABLES \
             WHERE TABLE_SCHEMA = ? AND TABLE_TYPE = 'BASE TABLE' AND TABLE_NAME LIKE ? \
             ORDER BY TABLE_NAME";
        let pattern = format!("{}%", escape_like(prefix));
        self.conn
            .exec(SQL, (self.database.as_str(), pattern))
            .map_err(|e| StoreError::Query {
                context: "list tables".into(),
                message: e.to_string(),
            })
    }

    fn rename_table(&mut self, from: &str, to: &str) -> Result<(), StoreError> {
        self.conn
            .query_drop(rename_sql(from, to))
            .map_err(|e| StoreError::Ddl {
                table: from.to_string(),
                message: e.to_string(),
            })
    }
}

/// Backtick-quote an identifier.
fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Single-quote a string literal for embedding in DDL, where the server
/// offers no placeholder.
fn quote_string(s: &str) -> String {
    format!("'{}'", s.replace('\\', "\\\\").replace('\'', "''"))
}

fn verify_binds(sql: &str, built: usize, table: &str) -> Result<(), StoreError> {
    let expected = sql.bytes().filter(|&b| b == b'?').count();
    if expected != built {
        return Err(StoreError::BindMismatch {
            table: table.to_string(),
            expected,
            built,
        });
    }
    Ok(())
}

pub(crate) fn lock_sql(table: &str) -> String {
    format!("LOCK TABLE {} WRITE", quote_ident(table))
}

pub(crate) fn add_sequence_sql(table: &str, column: &str) -> String {
    format!(
        "ALTER TABLE {} ADD {} BIGINT(20) UNSIGNED DEFAULT NULL UNIQUE COMMENT {} FIRST",
        quote_ident(table),
        quote_ident(column),
        quote_string(&sequence_column_comment(column)),
    )
}

/// `(col LIKE ? OR col LIKE ? OR ...)` over every candidate column,
/// column-major: all probes of one column before the next column.
pub(crate) fn match_clause(eligible: &[String], probe_count: usize) -> String {
    let terms: Vec<String> = eligible
        .iter()
        .flat_map(|col| {
            let col = quote_ident(col);
            (0..probe_count).map(move |_| format!("{col} LIKE ?"))
        })
        .collect();
    format!("({})", terms.join(" OR "))
}

pub(crate) fn assign_sequence_sql(
    table: &str,
    column: &str,
    eligible: &[String],
    probe_count: usize,
) -> String {
    format!(
        "UPDATE {} JOIN (SELECT @dbshift_row := 0) AS dbshift_init \
         SET {} = (@dbshift_row := @dbshift_row + 1) WHERE {}",
        quote_ident(table),
        quote_ident(column),
        match_clause(eligible, probe_count),
    )
}

pub(crate) fn page_sql(
    table: &str,
    column: &str,
    eligible: &[String],
    probe_count: usize,
) -> String {
    let cursor = quote_ident(column);
    let cols: Vec<String> = eligible.iter().map(|c| quote_ident(c)).collect();
    format!(
        "SELECT {cursor}, {} FROM {} WHERE {cursor} > ? AND {cursor} <= ? AND {} \
         ORDER BY {cursor} ASC",
        cols.join(", "),
        quote_ident(table),
        match_clause(eligible, probe_count),
    )
}

pub(crate) fn update_sql(table: &str, column: &str, cols: &[String]) -> String {
    let sets: Vec<String> = cols.iter().map(|c| format!("{} = ?", quote_ident(c))).collect();
    format!(
        "UPDATE {} SET {} WHERE {} = ?",
        quote_ident(table),
        sets.join(", "),
        quote_ident(column),
    )
}

pub(crate) fn drop_column_sql(table: &str, column: &str) -> String {
    format!("ALTER TABLE {} DROP {}", quote_ident(table), quote_ident(column))
}

pub(crate) fn rename_sql(from: &str, to: &str) -> String {
    format!("ALTER TABLE {} RENAME {}", quote_ident(from), quote_ident(to))
}

/// Probe patterns bound column-major to match [`match_clause`].
fn probe_params(column_count: usize, probes: &[String]) -> Vec<Value> {
    let mut params = Vec::with_capacity(column_count * probes.len());
    for _ in 0..column_count {
        for probe in probes {
            params.push(Value::Bytes(probe.clone().into_bytes()));
        }
    }
    params
}

fn seq_from(value: &Value) -> Option<u64> {
    match value {
        Value::UInt(u) => Some(*u),
        Value::Int(i) => u64::try_from(*i).ok(),
        Value::Bytes(b) => std::str::from_utf8(b).ok()?.parse().ok(),
        _ => None,
    }
}

fn from_sql(value: Value) -> SqlValue {
    match value {
        Value::NULL => SqlValue::Null,
        Value::Bytes(b) => SqlValue::Text(b),
        Value::Int(i) => SqlValue::NarrowInt(i),
        Value::UInt(u) => SqlValue::WideInt(u),
        Value::Float(f) => SqlValue::Numeric(f64::from(f)),
        Value::Double(d) => SqlValue::Numeric(d),
        other => SqlValue::Temporal(other.as_sql(true)),
    }
}

fn to_sql(value: &SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::NULL,
        SqlValue::Text(b) | SqlValue::Blob(b) => Value::Bytes(b.clone()),
        SqlValue::NarrowInt(i) => Value::Int(*i),
        SqlValue::WideInt(u) => Value::UInt(*u),
        SqlValue::Numeric(n) => Value::Double(*n),
        SqlValue::Temporal(s) => Value::Bytes(s.clone().into_bytes()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn identifiers_are_backtick_quoted() {
        assert_eq!(quote_ident("posts"), "`posts`");
        assert_eq!(quote_ident("odd`name"), "`odd``name`");
    }

    #[test]
    fn lock_statement() {
        assert_eq!(lock_sql("wp_posts"), "LOCK TABLE `wp_posts` WRITE");
    }

    #[test]
    fn cursor_column_ddl_carries_marker_comment() {
        let sql = add_sequence_sql("wp_posts", "_dbs_seq_0A1B2C3D");
        assert!(sql.starts_with("ALTER TABLE `wp_posts` ADD `_dbs_seq_0A1B2C3D` "));
        assert!(sql.contains("BIGINT(20) UNSIGNED DEFAULT NULL UNIQUE COMMENT"));
        assert!(sql.contains("temporarily added by dbshift"));
        assert!(sql.ends_with(" FIRST"));
    }

    #[test]
    fn match_clause_is_column_major() {
        assert_eq!(
            match_clause(&cols(&["a", "b"]), 2),
            "(`a` LIKE ? OR `a` LIKE ? OR `b` LIKE ? OR `b` LIKE ?)"
        );
    }

    #[test]
    fn sequence_assignment_numbers_matching_rows() {
        let sql = assign_sequence_sql("t", "c", &cols(&["body"]), 1);
        assert_eq!(
            sql,
            "UPDATE `t` JOIN (SELECT @dbshift_row := 0) AS dbshift_init \
             SET `c` = (@dbshift_row := @dbshift_row + 1) WHERE (`body` LIKE ?)"
        );
    }

    #[test]
    fn page_query_selects_cursor_then_candidates() {
        let sql = page_sql("t", "c", &cols(&["title", "body"]), 1);
        assert_eq!(
            sql,
            "SELECT `c`, `title`, `body` FROM `t` \
             WHERE `c` > ? AND `c` <= ? AND (`title` LIKE ? OR `body` LIKE ?) \
             ORDER BY `c` ASC"
        );
    }

    #[test]
    fn update_addresses_row_by_cursor() {
        let sql = update_sql("t", "c", &cols(&["title", "body"]));
        assert_eq!(sql, "UPDATE `t` SET `title` = ?, `body` = ? WHERE `c` = ?");
    }

    #[test]
    fn probe_params_align_with_match_clause() {
        let sql = assign_sequence_sql("t", "c", &cols(&["a", "b"]), 3);
        let params = probe_params(2, &cols(&["%x%", "%y%", "%z%"]));
        assert!(verify_binds(&sql, params.len(), "t").is_ok());
        // column-major: both columns see the probes in the same order
        assert_eq!(params[0], Value::Bytes(b"%x%".to_vec()));
        assert_eq!(params[3], Value::Bytes(b"%x%".to_vec()));
    }

    #[test]
    fn bind_mismatch_is_caught_before_execution() {
        let err = verify_binds("SELECT ? , ?", 1, "t").unwrap_err();
        assert!(matches!(
            err,
            StoreError::BindMismatch { expected: 2, built: 1, .. }
        ));
        assert!(err.skips_row());
    }

    #[test]
    fn ddl_statements() {
        assert_eq!(drop_column_sql("t", "c"), "ALTER TABLE `t` DROP `c`");
        assert_eq!(rename_sql("old_posts", "new_posts"), "ALTER TABLE `old_posts` RENAME `new_posts`");
    }
}
