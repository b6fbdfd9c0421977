use anyhow::Result;
use rusqlite::Connection;

/// Initialize database schema
///
/// # Errors
///
/// Returns an error if table or index creation fails
pub fn init_schema(conn: &Connection) -> Result<()> {
    // Cookies table - one row per (domain, name); values are opaque strings.
    // Domains are case-insensitive, names are not.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS cookies (
            domain TEXT NOT NULL COLLATE NOCASE,
            name TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (domain, name)
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_cookies_domain ON cookies(domain)",
        [],
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();

        let count: i32 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='cookies'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_domain_key_ignores_case() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn.execute(
            "INSERT INTO cookies VALUES ('ZaDark.com', 'k', 'a', '2024-01-01T00:00:00Z')",
            [],
        )
        .unwrap();

        let duplicate = conn.execute(
            "INSERT INTO cookies VALUES ('zadark.com', 'k', 'b', '2024-01-01T00:00:00Z')",
            [],
        );
        assert!(duplicate.is_err());

        let other_name = conn.execute(
            "INSERT INTO cookies VALUES ('zadark.com', 'K', 'b', '2024-01-01T00:00:00Z')",
            [],
        );
        assert!(other_name.is_ok());
    }
}
