use duckdb::{params, Connection};
use log::info;

use crate::registry;

/// Check if a table exists in the duckdb database.
pub fn table_exists(conn: &Connection, table_name: &str) -> Result<bool, duckdb::Error> {
    let count: i64 = conn.query_row(
        "SELECT count(*) FROM information_schema.tables WHERE table_name = ?",
        params![table_name],
        |row| row.get(0),
    )?;
    Ok(count == 1)
}

/// Check if rows for one year are present in a table.
pub fn partition_exists(
    conn: &Connection,
    table_name: &str,
    year: &str,
) -> Result<bool, duckdb::Error> {
    // table names come from the static registry, never from user input
    let sql = format!(
        "SELECT EXISTS (SELECT 1 FROM {} WHERE partition_year = CAST(? AS INTEGER))",
        table_name
    );
    conn.query_row(&sql, params![year], |row| row.get(0))
}

/// The `dataset_datetime` stamped on a partition.  All rows of a
/// partition carry the same stamp, so any row will do.
pub fn partition_datetime(
    conn: &Connection,
    table_name: &str,
    year: &str,
) -> Result<Option<String>, duckdb::Error> {
    let sql = format!(
        "SELECT dataset_datetime FROM {} WHERE partition_year = CAST(? AS INTEGER) LIMIT 1",
        table_name
    );
    match conn.query_row(&sql, params![year], |row| row.get(0)) {
        Ok(stamp) => Ok(Some(stamp)),
        Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Delete the rows of one year.  A no-op when nothing matches.
pub fn drop_partition(
    conn: &Connection,
    table_name: &str,
    year: &str,
) -> Result<usize, duckdb::Error> {
    let sql = format!(
        "DELETE FROM {} WHERE partition_year = CAST(? AS INTEGER)",
        table_name
    );
    conn.execute(&sql, params![year])
}

/// Drop every table known to the registry.  Dropping an absent table is
/// not an error, so the whole operation is idempotent.
pub fn drop_all_tables(conn: &Connection) -> Result<(), duckdb::Error> {
    for table_name in registry::table_names() {
        let sql = format!("DROP TABLE IF EXISTS {};", table_name);
        info!("drop table {} (query: {})", table_name, sql);
        conn.execute_batch(&sql)?;
    }
    Ok(())
}
