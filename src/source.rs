use crate::connector::{Connector, ScopedConnection};
use crate::data::model::Table;
use crate::error::Result;

/// Statement the scoring run reads its input from.
pub const INPUT_QUERY: &str = "SELECT * FROM input_table";

/// Run `sql` on a fresh connection and materialize every row.
///
/// Column names come from the result descriptor. The connection is closed
/// whether or not the statement succeeds; nothing is retried.
pub fn query(connector: &dyn Connector, sql: &str) -> Result<Table> {
    log::info!("fetching input: {sql}");
    let mut conn = ScopedConnection::open(connector)?;
    let result = conn.execute(sql, &[])?;
    conn.close()?;

    let table = Table::from_rows(result.columns, result.rows)?;
    log::info!("fetched {} rows x {} columns", table.len(), table.width());
    Ok(table)
}
