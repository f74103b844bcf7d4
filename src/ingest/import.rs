use std::path::Path;

use rusqlite::{Connection, params};

use chs::{error::Result, model::ChartRecord, snapshot};

const INSERT_TRACK: &str = "INSERT OR IGNORE INTO tracks (track_id, track_name, artist_names) \
                            VALUES (?1, ?2, ?3)";
const INSERT_ENTRY: &str = "INSERT OR IGNORE INTO weekly_charts (week_id, country, rank, streams, track_id) \
                            VALUES (?1, ?2, ?3, ?4, ?5)";

/// Upsert one snapshot's records inside a single transaction.
///
/// Tracks are first-seen-wins; chart entries dedup on the
/// (week, country, track) unique constraint. The returned count is the
/// number of chart rows actually inserted, so re-importing a file that is
/// already in the database reports 0 and changes nothing.
pub fn import_records(conn: &mut Connection, records: &[ChartRecord]) -> Result<usize> {
    let tx = conn.transaction()?;
    let mut inserted = 0;
    {
        let mut track_stmt = tx.prepare_cached(INSERT_TRACK)?;
        let mut entry_stmt = tx.prepare_cached(INSERT_ENTRY)?;

        for record in records {
            let artist_names = serde_json::to_string(&record.artist_names)?;
            track_stmt.execute(params![record.track_id, record.track_name, artist_names])?;
            inserted += entry_stmt.execute(params![
                record.week_id,
                record.country,
                record.rank,
                record.streams,
                record.track_id,
            ])?;
        }
    }
    tx.commit()?;
    Ok(inserted)
}

pub fn import_snapshot(conn: &mut Connection, path: &Path) -> Result<usize> {
    let records = snapshot::read(path)?;
    import_records(conn, &records)
}
