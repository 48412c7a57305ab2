//! Reporting views over the cache tables.

use ::duckdb::Connection;

/// Create the views used by status reporting.
///
/// - `vw_cache_counts`: record count, ticker count and newest cache date per source
/// - `vw_cache_days`: record count per source and cache date
pub fn create_views(connection: &Connection) -> Result<(), ::duckdb::Error> {
    connection.execute_batch(
        r"
CREATE OR REPLACE VIEW vw_cache_counts AS
SELECT
    source,
    COUNT(*) AS record_count,
    COUNT(DISTINCT ticker) AS ticker_count,
    MAX(cache_date) AS newest_cache_date
FROM stock_cache
GROUP BY source;

CREATE OR REPLACE VIEW vw_cache_days AS
SELECT
    source,
    cache_date,
    COUNT(*) AS record_count
FROM stock_cache
GROUP BY source, cache_date;
",
    )
}
