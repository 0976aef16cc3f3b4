//! Append-only observation log backed by SQLite.
//!
//! Snapshots, analyses and embeddings are only ever inserted, never
//! updated or deleted, which keeps historical scores reproducible even
//! if the scoring formula changes later. Every operation opens its own
//! connection against a WAL database, so a single writer can append
//! while readers run concurrently.

use crate::error::{MonitorError, Result};
use crate::models::report::{HistoryEntry, ScoreStats, TrendPoint};
use crate::models::snapshot::DirectorySnapshot;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};

const DB_SCHEMA_VERSION: i64 = 1;

pub struct ObservationStore {
    db_path: PathBuf,
}

impl ObservationStore {
    /// Open (or create) the database and bring the schema up to date.
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let store = Self {
            db_path: db_path.as_ref().to_path_buf(),
        };
        let conn = store.connect()?;
        initialize_schema(&conn)?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.db_path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(conn)
    }

    /// Persist one snapshot with its score. Returns the monotonically
    /// increasing snapshot id.
    pub fn append_snapshot(&self, snapshot: &DirectorySnapshot, score: f64) -> Result<i64> {
        let conn = self.connect()?;
        let payload = serde_json::to_string(snapshot)?;

        conn.execute(
            "INSERT INTO snapshots (timestamp, root_path, total_files, total_dirs,
                                    messiness_score, structure_hash, snapshot_data)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                snapshot.timestamp.to_rfc3339(),
                snapshot.root_path,
                snapshot.total_files as i64,
                snapshot.total_dirs as i64,
                score,
                snapshot.structure_hash,
                payload,
            ],
        )?;

        Ok(conn.last_insert_rowid())
    }

    /// Persist the narrative for an existing snapshot. Fails with
    /// [`MonitorError::UnknownSnapshot`] when the id does not exist.
    pub fn append_analysis(&self, snapshot_id: i64, narrative: &str, alert: bool) -> Result<()> {
        let conn = self.connect()?;
        self.ensure_snapshot_exists(&conn, snapshot_id)?;

        conn.execute(
            "INSERT INTO analyses (snapshot_id, timestamp, narrative, alert_triggered)
             VALUES (?1, ?2, ?3, ?4)",
            params![snapshot_id, Utc::now().to_rfc3339(), narrative, alert as i64],
        )?;

        Ok(())
    }

    /// Persist an embedding vector for an existing snapshot. Optional and
    /// independent of the analysis record.
    pub fn append_embedding(&self, snapshot_id: i64, vector: &[f32]) -> Result<()> {
        let conn = self.connect()?;
        self.ensure_snapshot_exists(&conn, snapshot_id)?;

        conn.execute(
            "INSERT INTO embeddings (snapshot_id, vector) VALUES (?1, ?2)",
            params![snapshot_id, serde_json::to_string(vector)?],
        )?;

        Ok(())
    }

    /// Recent analysis history, newest-first.
    pub fn fetch_recent(&self, limit: usize) -> Result<Vec<HistoryEntry>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT s.timestamp, s.messiness_score, a.narrative, a.alert_triggered
             FROM snapshots s
             LEFT JOIN analyses a ON a.snapshot_id = s.id
             ORDER BY s.id DESC
             LIMIT ?1",
        )?;

        let entries = stmt
            .query_map(params![limit as i64], |row| {
                let raw_ts: String = row.get(0)?;
                Ok(HistoryEntry {
                    timestamp: parse_timestamp(0, raw_ts)?,
                    messiness_score: row.get(1)?,
                    narrative: row.get(2)?,
                    alert: row.get::<_, Option<i64>>(3)?.map(|v| v != 0),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(entries)
    }

    /// Trend window starting at `start`, oldest-first.
    pub fn fetch_window(&self, start: DateTime<Utc>) -> Result<Vec<TrendPoint>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT timestamp, messiness_score, total_files, total_dirs
             FROM snapshots
             WHERE timestamp >= ?1
             ORDER BY timestamp ASC",
        )?;

        let points = stmt
            .query_map(params![start.to_rfc3339()], |row| {
                let raw_ts: String = row.get(0)?;
                Ok(TrendPoint {
                    timestamp: parse_timestamp(0, raw_ts)?,
                    messiness_score: row.get(1)?,
                    total_files: row.get::<_, i64>(2)? as u64,
                    total_dirs: row.get::<_, i64>(3)? as u64,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(points)
    }

    /// Aggregate statistics over all scores ever recorded.
    pub fn aggregate(&self) -> Result<ScoreStats> {
        let conn = self.connect()?;
        let stats = conn.query_row(
            "SELECT COUNT(*), AVG(messiness_score), MIN(messiness_score), MAX(messiness_score)
             FROM snapshots",
            [],
            |row| {
                Ok(ScoreStats {
                    total_scans: row.get::<_, i64>(0)? as u64,
                    avg_score: row.get::<_, Option<f64>>(1)?.unwrap_or(0.0),
                    min_score: row.get::<_, Option<f64>>(2)?.unwrap_or(0.0),
                    max_score: row.get::<_, Option<f64>>(3)?.unwrap_or(0.0),
                })
            },
        )?;

        Ok(stats)
    }

    /// Every stored embedding with its snapshot payload, in insertion
    /// (chronological) order. Used to rebuild the retrieval cache.
    pub fn fetch_all_embeddings(&self) -> Result<Vec<(i64, Vec<f32>, DirectorySnapshot)>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT e.snapshot_id, e.vector, s.snapshot_data
             FROM embeddings e
             JOIN snapshots s ON e.snapshot_id = s.id
             ORDER BY e.id ASC",
        )?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut out = Vec::with_capacity(rows.len());
        for (snapshot_id, vector_json, snapshot_json) in rows {
            let vector: Vec<f32> = serde_json::from_str(&vector_json)?;
            let snapshot: DirectorySnapshot = serde_json::from_str(&snapshot_json)?;
            out.push((snapshot_id, vector, snapshot));
        }

        Ok(out)
    }

    fn ensure_snapshot_exists(&self, conn: &Connection, snapshot_id: i64) -> Result<()> {
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM snapshots WHERE id = ?1)",
            params![snapshot_id],
            |row| row.get(0),
        )?;

        if exists {
            Ok(())
        } else {
            Err(MonitorError::UnknownSnapshot(snapshot_id))
        }
    }
}

fn initialize_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "PRAGMA foreign_keys = ON;
         PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;",
    )?;

    let version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

    if version < 1 {
        apply_migration_1(conn)?;
        conn.pragma_update(None, "user_version", DB_SCHEMA_VERSION)?;
    }

    Ok(())
}

fn apply_migration_1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS snapshots (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            timestamp TEXT NOT NULL,
            root_path TEXT NOT NULL,
            total_files INTEGER NOT NULL DEFAULT 0,
            total_dirs INTEGER NOT NULL DEFAULT 0,
            messiness_score REAL NOT NULL,
            structure_hash TEXT NOT NULL,
            snapshot_data TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS analyses (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            snapshot_id INTEGER NOT NULL REFERENCES snapshots(id),
            timestamp TEXT NOT NULL,
            narrative TEXT NOT NULL,
            alert_triggered INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS embeddings (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            snapshot_id INTEGER NOT NULL REFERENCES snapshots(id),
            vector TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_snapshots_timestamp ON snapshots(timestamp);
        CREATE INDEX IF NOT EXISTS idx_analyses_snapshot_id ON analyses(snapshot_id);
        CREATE INDEX IF NOT EXISTS idx_embeddings_snapshot_id ON embeddings(snapshot_id);
        ",
    )?;

    Ok(())
}

fn parse_timestamp(idx: usize, raw: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| {
            rusqlite::Error::FromSqlConversionFailure(
                idx,
                rusqlite::types::Type::Text,
                Box::new(err),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::collections::BTreeMap;

    fn snapshot_at(timestamp: DateTime<Utc>, total_files: u64) -> DirectorySnapshot {
        let mut file_types = BTreeMap::new();
        file_types.insert("rs".to_string(), total_files);

        DirectorySnapshot {
            timestamp,
            root_path: "/tmp/watched".to_string(),
            total_files,
            total_dirs: 2,
            file_types,
            depth_distribution: BTreeMap::from([(0, 2), (1, 0)]),
            naming_violations: vec!["Space in filename: a b.txt".to_string()],
            structure_hash: "abc123".to_string(),
            largest_files: Vec::new(),
        }
    }

    fn open_store() -> (tempfile::TempDir, ObservationStore) {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = ObservationStore::open(dir.path().join("messlens.db")).expect("open store");
        (dir, store)
    }

    #[test]
    fn snapshot_ids_are_monotonically_increasing() {
        let (_dir, store) = open_store();
        let first = store
            .append_snapshot(&snapshot_at(Utc::now(), 1), 1.0)
            .expect("append");
        let second = store
            .append_snapshot(&snapshot_at(Utc::now(), 2), 2.0)
            .expect("append");
        assert!(second > first);
    }

    #[test]
    fn aggregate_covers_all_scores() {
        let (_dir, store) = open_store();
        for score in [2.0, 4.0, 9.0] {
            store
                .append_snapshot(&snapshot_at(Utc::now(), 1), score)
                .expect("append");
        }

        let stats = store.aggregate().expect("aggregate");
        assert_eq!(stats.total_scans, 3);
        assert_eq!(stats.min_score, 2.0);
        assert_eq!(stats.max_score, 9.0);
        assert!(stats.min_score <= stats.avg_score && stats.avg_score <= stats.max_score);
        assert!((stats.avg_score - 5.0).abs() < 1e-9);
    }

    #[test]
    fn aggregate_on_empty_store_is_zeroed() {
        let (_dir, store) = open_store();
        let stats = store.aggregate().expect("aggregate");
        assert_eq!(stats.total_scans, 0);
        assert_eq!(stats.avg_score, 0.0);
    }

    #[test]
    fn analysis_for_unknown_snapshot_is_rejected() {
        let (_dir, store) = open_store();
        let err = store
            .append_analysis(999, "narrative", false)
            .expect_err("must reject");
        assert!(matches!(err, MonitorError::UnknownSnapshot(999)));

        let err = store
            .append_embedding(999, &[0.1, 0.2])
            .expect_err("must reject");
        assert!(matches!(err, MonitorError::UnknownSnapshot(999)));
    }

    #[test]
    fn history_is_newest_first_and_joins_analyses() {
        let (_dir, store) = open_store();
        let now = Utc::now();

        let first = store
            .append_snapshot(&snapshot_at(now - Duration::hours(2), 1), 1.0)
            .expect("append");
        store
            .append_analysis(first, "first narrative", false)
            .expect("analysis");

        // Snapshot without analysis still shows up with empty fields.
        store
            .append_snapshot(&snapshot_at(now, 2), 8.0)
            .expect("append");

        let history = store.fetch_recent(10).expect("history");
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].messiness_score, 8.0);
        assert!(history[0].narrative.is_none());
        assert_eq!(history[1].narrative.as_deref(), Some("first narrative"));
        assert_eq!(history[1].alert, Some(false));

        let limited = store.fetch_recent(1).expect("history");
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].messiness_score, 8.0);
    }

    #[test]
    fn window_filters_by_start_and_sorts_ascending() {
        let (_dir, store) = open_store();
        let now = Utc::now();

        store
            .append_snapshot(&snapshot_at(now - Duration::days(40), 1), 1.0)
            .expect("append");
        store
            .append_snapshot(&snapshot_at(now - Duration::days(2), 2), 2.0)
            .expect("append");
        store
            .append_snapshot(&snapshot_at(now - Duration::days(1), 3), 3.0)
            .expect("append");

        let window = store.fetch_window(now - Duration::days(30)).expect("window");
        assert_eq!(window.len(), 2);
        assert!(window[0].timestamp < window[1].timestamp);
        assert_eq!(window[0].messiness_score, 2.0);
    }

    #[test]
    fn embeddings_round_trip_with_snapshot_payload() {
        let (_dir, store) = open_store();
        let snapshot = snapshot_at(Utc::now(), 7);
        let id = store.append_snapshot(&snapshot, 3.5).expect("append");
        store
            .append_embedding(id, &[0.25, -0.5, 1.0])
            .expect("embedding");

        let rows = store.fetch_all_embeddings().expect("fetch");
        assert_eq!(rows.len(), 1);
        let (got_id, vector, got_snapshot) = &rows[0];
        assert_eq!(*got_id, id);
        assert_eq!(vector, &vec![0.25, -0.5, 1.0]);
        assert_eq!(got_snapshot.total_files, 7);
        assert_eq!(got_snapshot.structure_hash, snapshot.structure_hash);
    }

    #[test]
    fn corrupt_timestamp_row_surfaces_as_error() {
        let (_dir, store) = open_store();
        store
            .append_snapshot(&snapshot_at(Utc::now(), 1), 1.0)
            .expect("append");

        // Damage a row behind the store's back. Reads must report it
        // rather than silently shrinking history and trends.
        let conn = Connection::open(store.path()).expect("raw connection");
        conn.execute("UPDATE snapshots SET timestamp = 'not-a-date'", [])
            .expect("corrupt row");

        let err = store.fetch_recent(10).expect_err("must surface");
        assert!(matches!(err, MonitorError::Database(_)));

        let err = store
            .fetch_window(Utc::now() - Duration::days(1))
            .expect_err("must surface");
        assert!(matches!(err, MonitorError::Database(_)));
    }

    #[test]
    fn reopening_preserves_data_and_schema_version() {
        let dir = tempfile::tempdir().expect("temp dir");
        let db_path = dir.path().join("messlens.db");

        {
            let store = ObservationStore::open(&db_path).expect("open");
            store
                .append_snapshot(&snapshot_at(Utc::now(), 1), 4.2)
                .expect("append");
        }

        let store = ObservationStore::open(&db_path).expect("reopen");
        let stats = store.aggregate().expect("aggregate");
        assert_eq!(stats.total_scans, 1);

        let conn = Connection::open(&db_path).expect("raw connection");
        let version: i64 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .expect("schema version");
        assert_eq!(version, DB_SCHEMA_VERSION);
    }
}
