use dbshift_core::{sequence, BindClass, ColumnMeta, TableColumns};

/// One row of the column introspection query, before grouping.
#[derive(Clone, Debug)]
pub struct RawColumn {
    pub table: String,
    pub column: String,
    pub column_type: String,
    pub comment: String,
}

/// Group raw introspection rows into per-table metadata.
///
/// Rows must arrive ordered by table then ordinal position. Columns
/// recognized as leftover cursor columns from an aborted run are split
/// out for the caller to drop and are excluded from the metadata.
pub fn organize_columns(rows: Vec<RawColumn>) -> (Vec<TableColumns>, Vec<(String, String)>) {
    let mut tables: Vec<TableColumns> = Vec::new();
    let mut residual = Vec::new();

    for row in rows {
        if sequence::is_residual_sequence_column(&row.column, &row.comment) {
            residual.push((row.table, row.column));
            continue;
        }
        if tables.last().map(|t| t.table.as_str()) != Some(row.table.as_str()) {
            tables.push(TableColumns::new(row.table.clone()));
        }
        if let Some(current) = tables.last_mut() {
            current.columns.push(ColumnMeta {
                name: row.column,
                bind: BindClass::classify(&row.column_type),
            });
        }
    }

    (tables, residual)
}
