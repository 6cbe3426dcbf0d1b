//! SQLite persistence layer.
//!
//! RULE: Only this file talks to the database.
//! Everything else goes through `SnapshotStore` / `SnapshotSink` or the
//! run and event-log methods below.

use rusqlite::{params, Connection, OptionalExtension};

use crate::{
    error::{InjectError, InjectResult},
    event::EventLogEntry,
    particle::{Field, ParticleRecord, SnapshotData},
    snapshot_id::SnapshotId,
    types::Vec3,
};

use super::{SnapshotMetadata, SnapshotSink, SnapshotStore};

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) the replay database at `path`.
    pub fn open(path: &str) -> InjectResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> InjectResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> InjectResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_foundation.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/002_snapshots.sql"))?;
        Ok(())
    }

    // ── Run ────────────────────────────────────────────────────

    pub fn insert_run(
        &self,
        run_id:     &str,
        label:      &str,
        version:    &str,
        started_at: &str,
    ) -> InjectResult<()> {
        self.conn.execute(
            "INSERT INTO run (run_id, label, version, started_at) VALUES (?1, ?2, ?3, ?4)",
            params![run_id, label, version, started_at],
        )?;
        Ok(())
    }

    // ── Event log ──────────────────────────────────────────────

    pub fn append_event(&self, entry: &EventLogEntry) -> InjectResult<()> {
        self.conn.execute(
            "INSERT INTO event_log (run_id, step, sim_time, event_type, payload)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                entry.run_id,
                entry.step as i64,
                entry.sim_time,
                entry.event_type,
                entry.payload,
            ],
        )?;
        Ok(())
    }

    pub fn events_for_run(&self, run_id: &str) -> InjectResult<Vec<EventLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, run_id, step, sim_time, event_type, payload
             FROM event_log WHERE run_id = ?1
             ORDER BY id ASC",
        )?;
        let entries = stmt
            .query_map(params![run_id], |row| {
                Ok(EventLogEntry {
                    id:         Some(row.get(0)?),
                    run_id:     row.get(1)?,
                    step:       row.get::<_, i64>(2)? as u64,
                    sim_time:   row.get(3)?,
                    event_type: row.get(4)?,
                    payload:    row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    // ── Snapshots ──────────────────────────────────────────────

    /// All stored snapshot ids in time order.
    pub fn snapshot_ids(&self) -> InjectResult<Vec<SnapshotId>> {
        let mut stmt = self
            .conn
            .prepare("SELECT snapshot_id FROM snapshot ORDER BY time ASC, snapshot_id ASC")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .map(|r| r.map(SnapshotId::from))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    pub fn snapshot_count(&self) -> InjectResult<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM snapshot", [], |row| row.get(0))?;
        Ok(count)
    }
}

/// Column expression per field; unrequested fields read back as zero.
fn field_columns(fields: &[Field]) -> String {
    let pick = |field: Field, cols: &'static str, zeros: &'static str| {
        if fields.contains(&field) { cols } else { zeros }
    };
    [
        pick(Field::Position, "x, y, z", "0.0, 0.0, 0.0"),
        pick(Field::Velocity, "vx, vy, vz", "0.0, 0.0, 0.0"),
        pick(Field::ScalarA, "scalar_a", "0.0"),
        pick(Field::ScalarB, "scalar_b", "0.0"),
    ]
    .join(", ")
}

impl SnapshotStore for SqliteStore {
    fn metadata(&self, id: &SnapshotId) -> InjectResult<SnapshotMetadata> {
        let row = self
            .conn
            .query_row(
                "SELECT time, particle_count FROM snapshot WHERE snapshot_id = ?1",
                params![id.as_str()],
                |row| Ok((row.get::<_, f64>(0)?, row.get::<_, i64>(1)?)),
            )
            .optional()?;

        let (time, count) = row.ok_or_else(|| InjectError::SnapshotNotFound { id: id.clone() })?;
        if count < 0 || !time.is_finite() {
            return Err(InjectError::SnapshotRead {
                id:     id.clone(),
                reason: format!("malformed header: time={time}, particle_count={count}"),
            });
        }
        Ok(SnapshotMetadata { time, particle_count: count as usize })
    }

    fn load(&self, id: &SnapshotId, fields: &[Field]) -> InjectResult<Vec<ParticleRecord>> {
        let meta = self.metadata(id)?;

        let sql = format!(
            "SELECT idx, {}, dead FROM particle WHERE snapshot_id = ?1 ORDER BY idx ASC",
            field_columns(fields)
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![id.as_str()], |row| {
                let idx: i64 = row.get(0)?;
                let record = ParticleRecord {
                    position: Vec3::new(row.get(1)?, row.get(2)?, row.get(3)?),
                    velocity: Vec3::new(row.get(4)?, row.get(5)?, row.get(6)?),
                    scalar_a: row.get(7)?,
                    scalar_b: row.get(8)?,
                    dead:     row.get::<_, i64>(9)? != 0,
                };
                Ok((idx, record))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        if rows.len() != meta.particle_count {
            return Err(InjectError::SnapshotRead {
                id:     id.clone(),
                reason: format!(
                    "header says {} particles, found {}",
                    meta.particle_count,
                    rows.len()
                ),
            });
        }
        let mut particles = Vec::with_capacity(rows.len());
        for (expected, (idx, record)) in rows.into_iter().enumerate() {
            if idx != expected as i64 {
                return Err(InjectError::SnapshotRead {
                    id:     id.clone(),
                    reason: format!("particle index gap: expected {expected}, found {idx}"),
                });
            }
            particles.push(record);
        }
        Ok(particles)
    }
}

impl SnapshotSink for SqliteStore {
    fn insert_snapshot(&mut self, id: &SnapshotId, data: &SnapshotData) -> InjectResult<()> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT OR REPLACE INTO snapshot (snapshot_id, time, particle_count)
             VALUES (?1, ?2, ?3)",
            params![id.as_str(), data.time, data.particle_count() as i64],
        )?;
        tx.execute(
            "DELETE FROM particle WHERE snapshot_id = ?1",
            params![id.as_str()],
        )?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO particle
                 (snapshot_id, idx, x, y, z, vx, vy, vz, scalar_a, scalar_b, dead)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            )?;
            for (idx, p) in data.particles.iter().enumerate() {
                stmt.execute(params![
                    id.as_str(),
                    idx as i64,
                    p.position.x,
                    p.position.y,
                    p.position.z,
                    p.velocity.x,
                    p.velocity.y,
                    p.velocity.z,
                    p.scalar_a,
                    p.scalar_b,
                    p.dead as i64,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}
