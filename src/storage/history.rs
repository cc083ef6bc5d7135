//! SQLite-backed record of training runs and their per-epoch metrics.

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Connection};
use std::path::Path;

/// Row describing one training invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct RunRecord {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub samples: usize,
    pub train_size: usize,
    pub val_size: usize,
    pub seed: u64,
    pub stats_digest: String,
    /// Set once the model artifact is written
    pub model_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EpochRecord {
    pub epoch: usize,
    pub avg_loss: Option<f32>,
    pub val_accuracy: Option<f32>,
}

pub struct RunHistory {
    conn: Connection,
}

impl RunHistory {
    /// Open or create the history DB at path.
    pub fn open(path: &Path) -> Result<Self, rusqlite::Error> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS runs (
                run_id TEXT PRIMARY KEY,
                started_at INTEGER NOT NULL,
                samples INTEGER NOT NULL,
                train_size INTEGER NOT NULL,
                val_size INTEGER NOT NULL,
                seed TEXT NOT NULL,
                stats_digest TEXT NOT NULL,
                model_path TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_runs_started ON runs(started_at);
            CREATE TABLE IF NOT EXISTS epochs (
                run_id TEXT NOT NULL REFERENCES runs(run_id),
                epoch INTEGER NOT NULL,
                avg_loss REAL,
                val_accuracy REAL,
                PRIMARY KEY (run_id, epoch)
            );
            "#,
        )?;
        Ok(Self { conn })
    }

    pub fn begin_run(&self, run: &RunRecord) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "INSERT INTO runs (run_id, started_at, samples, train_size, val_size, seed, stats_digest, model_path)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                run.run_id,
                run.started_at.timestamp_millis(),
                run.samples as i64,
                run.train_size as i64,
                run.val_size as i64,
                // u64 does not fit SQLite's signed integer
                run.seed.to_string(),
                run.stats_digest,
                run.model_path,
            ],
        )?;
        Ok(())
    }

    pub fn record_epoch(&self, run_id: &str, epoch: &EpochRecord) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "INSERT OR REPLACE INTO epochs (run_id, epoch, avg_loss, val_accuracy) VALUES (?1, ?2, ?3, ?4)",
            params![
                run_id,
                epoch.epoch as i64,
                epoch.avg_loss.map(f64::from),
                epoch.val_accuracy.map(f64::from),
            ],
        )?;
        Ok(())
    }

    pub fn finish_run(&self, run_id: &str, model_path: &str) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "UPDATE runs SET model_path = ?1 WHERE run_id = ?2",
            params![model_path, run_id],
        )?;
        Ok(())
    }

    /// Most recent runs first.
    pub fn recent_runs(&self, limit: usize) -> Result<Vec<RunRecord>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(
            "SELECT run_id, started_at, samples, train_size, val_size, seed, stats_digest, model_path
             FROM runs ORDER BY started_at DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            let started: i64 = row.get(1)?;
            let seed: String = row.get(5)?;
            Ok(RunRecord {
                run_id: row.get(0)?,
                started_at: Utc
                    .timestamp_millis_opt(started)
                    .single()
                    .unwrap_or_default(),
                samples: row.get::<_, i64>(2)? as usize,
                train_size: row.get::<_, i64>(3)? as usize,
                val_size: row.get::<_, i64>(4)? as usize,
                seed: seed.parse().unwrap_or_default(),
                stats_digest: row.get(6)?,
                model_path: row.get(7)?,
            })
        })?;
        rows.collect()
    }

    pub fn epochs(&self, run_id: &str) -> Result<Vec<EpochRecord>, rusqlite::Error> {
        let mut stmt = self
            .conn
            .prepare("SELECT epoch, avg_loss, val_accuracy FROM epochs WHERE run_id = ?1 ORDER BY epoch")?;
        let rows = stmt.query_map(params![run_id], |row| {
            Ok(EpochRecord {
                epoch: row.get::<_, i64>(0)? as usize,
                avg_loss: row.get::<_, Option<f64>>(1)?.map(|v| v as f32),
                val_accuracy: row.get::<_, Option<f64>>(2)?.map(|v| v as f32),
            })
        })?;
        rows.collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(id: &str, ms: i64) -> RunRecord {
        RunRecord {
            run_id: id.to_string(),
            started_at: Utc.timestamp_millis_opt(ms).single().unwrap(),
            samples: 100,
            train_size: 80,
            val_size: 20,
            seed: u64::MAX,
            stats_digest: "abc".to_string(),
            model_path: None,
        }
    }

    #[test]
    fn runs_and_epochs_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let history = RunHistory::open(&dir.path().join("history.db")).unwrap();
        history.begin_run(&run("r1", 1_000)).unwrap();
        history.begin_run(&run("r2", 2_000)).unwrap();
        history
            .record_epoch(
                "r2",
                &EpochRecord {
                    epoch: 1,
                    avg_loss: Some(0.5),
                    val_accuracy: None,
                },
            )
            .unwrap();
        history.finish_run("r2", "model.json").unwrap();

        let runs = history.recent_runs(10).unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].run_id, "r2");
        assert_eq!(runs[0].seed, u64::MAX);
        assert_eq!(runs[0].model_path.as_deref(), Some("model.json"));
        assert_eq!(runs[1].model_path, None);

        let epochs = history.epochs("r2").unwrap();
        assert_eq!(epochs.len(), 1);
        assert_eq!(epochs[0].avg_loss, Some(0.5));
        assert_eq!(epochs[0].val_accuracy, None);
        assert!(history.epochs("r1").unwrap().is_empty());
    }
}
