//! Versioned schema for the cache database.

use ::duckdb::{params, Connection};

struct Migration {
    version: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: "0001_stock_cache",
        sql: r#"
CREATE TABLE IF NOT EXISTS stock_cache (
    ticker TEXT NOT NULL,
    source TEXT NOT NULL,
    cache_date TEXT NOT NULL,
    data_json TEXT NOT NULL,
    collected_at TEXT NOT NULL,
    collected_at_ms BIGINT NOT NULL,
    PRIMARY KEY(ticker, source, cache_date)
);

CREATE TABLE IF NOT EXISTS latest_cache (
    ticker TEXT PRIMARY KEY,
    source TEXT NOT NULL,
    cache_date TEXT NOT NULL,
    data_json TEXT NOT NULL,
    collected_at TEXT NOT NULL,
    collected_at_ms BIGINT NOT NULL
);
"#,
    },
    Migration {
        version: "0002_budget_and_metadata",
        sql: r#"
CREATE TABLE IF NOT EXISTS source_budget (
    source TEXT PRIMARY KEY,
    last_call_at TEXT,
    last_call_ms BIGINT,
    last_call_date TEXT,
    daily_call_count BIGINT NOT NULL DEFAULT 0,
    max_daily_calls BIGINT NOT NULL DEFAULT 1,
    last_success_at TEXT
);

CREATE TABLE IF NOT EXISTS cache_metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#,
    },
];

/// Apply every migration that has not been recorded in `schema_migrations`.
pub fn apply_migrations(connection: &Connection) -> Result<(), ::duckdb::Error> {
    connection.execute_batch(
        r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version TEXT PRIMARY KEY,
    applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#,
    )?;

    for migration in MIGRATIONS {
        let applied_count: i64 = connection.query_row(
            "SELECT COUNT(*) FROM schema_migrations WHERE version = ?",
            params![migration.version],
            |row| row.get(0),
        )?;

        if applied_count == 0 {
            connection.execute_batch(migration.sql)?;
            connection.execute(
                "INSERT INTO schema_migrations (version) VALUES (?)",
                params![migration.version],
            )?;
            tracing::debug!(version = migration.version, "applied cache schema migration");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_recorded_once() {
        let connection = Connection::open_in_memory().expect("in-memory db");
        apply_migrations(&connection).expect("first run");
        apply_migrations(&connection).expect("second run is a no-op");

        let applied: i64 = connection
            .query_row("SELECT COUNT(*) FROM schema_migrations", [], |row| row.get(0))
            .expect("count");
        assert_eq!(applied, MIGRATIONS.len() as i64);
    }
}
