use std::path::Path;

use rusqlite::Connection;

pub type DBError = rusqlite::Error;
pub type DBResult<T> = Result<T, DBError>;

pub mod constants {
    macro_rules! env_or_default {
        ($name:expr, $default:expr) => {
            if let Some(s) = option_env!($name) {
                s
            } else {
                $default
            }
        };
    }

    pub const DB_FILE: &str = env_or_default!("CHARTS_DB_FILE", "spotify_charts.db");
    pub const DATA_DIR: &str = env_or_default!("CHARTS_DATA_DIR", "weekly_data");
    pub const ENV_FILE: &str = env_or_default!("CHARTS_ENV_FILE", ".env");
}

const SCHEMA: &str = "\
    CREATE TABLE IF NOT EXISTS tracks (\
        track_id     TEXT PRIMARY KEY,\
        track_name   TEXT NOT NULL,\
        artist_names TEXT NOT NULL\
    );\
    CREATE TABLE IF NOT EXISTS weekly_charts (\
        id       INTEGER PRIMARY KEY AUTOINCREMENT,\
        week_id  TEXT NOT NULL,\
        country  TEXT NOT NULL,\
        rank     INTEGER NOT NULL,\
        streams  INTEGER NOT NULL,\
        track_id TEXT NOT NULL,\
        FOREIGN KEY (track_id) REFERENCES tracks(track_id),\
        UNIQUE (week_id, country, track_id)\
    );";

pub fn open(path: impl AsRef<Path>) -> DBResult<Connection> {
    let conn = Connection::open(path)?;
    conn.pragma_update(None, "foreign_keys", true)?;
    Ok(conn)
}

/// Create both tables if absent. Safe to call on every start.
pub fn init_schema(conn: &Connection) -> DBResult<()> {
    conn.execute_batch(SCHEMA)
}

pub fn open_default() -> DBResult<Connection> {
    let conn = open(constants::DB_FILE)?;
    init_schema(&conn)?;
    Ok(conn)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mem() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "foreign_keys", true).unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    #[test]
    fn schema_init_is_idempotent() {
        let conn = mem();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();
    }

    #[test]
    fn weekly_charts_unique_triple() {
        let conn = mem();
        conn.execute(
            "INSERT INTO tracks (track_id, track_name, artist_names) VALUES ('abc', 'Song A', '[\"Artist A\"]')",
            [],
        )
        .unwrap();

        let insert = "INSERT OR IGNORE INTO weekly_charts (week_id, country, rank, streams, track_id) \
                      VALUES ('2024-05-02', 'US', 1, 1000000, 'abc')";
        assert_eq!(conn.execute(insert, []).unwrap(), 1);
        assert_eq!(conn.execute(insert, []).unwrap(), 0);
    }

    #[test]
    fn entry_requires_existing_track() {
        let conn = mem();
        let err = conn.execute(
            "INSERT INTO weekly_charts (week_id, country, rank, streams, track_id) \
             VALUES ('2024-05-02', 'US', 1, 0, 'nope')",
            [],
        );
        assert!(err.is_err());
    }
}
