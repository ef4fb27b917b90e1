// ==========================================
// 加药管理系统 - 液位读数仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 同一储槽同一天只保留一笔，写入以 id 为准覆盖
// ==========================================

use crate::domain::reading::Reading;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, Row};
use std::sync::{Arc, Mutex, MutexGuard};

const READING_COLUMNS: &str = r#"
    id, tank_id, timestamp, level_cm, calculated_volume, calculated_weight_kg,
    applied_specific_gravity, supply_id, added_amount_liters, operator_name
"#;

const UPSERT_SQL: &str = r#"
    INSERT INTO reading (
        id, tank_id, timestamp, level_cm, calculated_volume, calculated_weight_kg,
        applied_specific_gravity, supply_id, added_amount_liters, operator_name
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
    ON CONFLICT(id) DO UPDATE SET
        tank_id = excluded.tank_id,
        timestamp = excluded.timestamp,
        level_cm = excluded.level_cm,
        calculated_volume = excluded.calculated_volume,
        calculated_weight_kg = excluded.calculated_weight_kg,
        applied_specific_gravity = excluded.applied_specific_gravity,
        supply_id = excluded.supply_id,
        added_amount_liters = excluded.added_amount_liters,
        operator_name = excluded.operator_name
"#;

// ==========================================
// ReadingRepository - 液位读数仓储
// ==========================================
pub struct ReadingRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ReadingRepository {
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<Reading> {
        Ok(Reading {
            id: row.get(0)?,
            tank_id: row.get(1)?,
            timestamp: row.get(2)?,
            level_cm: row.get(3)?,
            calculated_volume: row.get(4)?,
            calculated_weight_kg: row.get(5)?,
            applied_specific_gravity: row.get(6)?,
            supply_id: row.get(7)?,
            added_amount_liters: row.get(8)?,
            operator_name: row.get(9)?,
        })
    }

    fn execute_upsert(conn: &Connection, r: &Reading) -> rusqlite::Result<usize> {
        conn.execute(
            UPSERT_SQL,
            params![
                r.id,
                r.tank_id,
                r.timestamp,
                r.level_cm,
                r.calculated_volume,
                r.calculated_weight_kg,
                r.applied_specific_gravity,
                r.supply_id,
                r.added_amount_liters,
                r.operator_name,
            ],
        )
    }

    /// 查询读数；tank_id 为空时返回全部储槽
    ///
    /// 按 timestamp 升序
    pub fn list(&self, tank_id: Option<&str>) -> RepositoryResult<Vec<Reading>> {
        let conn = self.get_conn()?;
        let readings = match tank_id {
            Some(id) => {
                let sql = format!(
                    "SELECT {} FROM reading WHERE tank_id = ?1 ORDER BY timestamp, id",
                    READING_COLUMNS
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(params![id], Self::map_row)?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
            None => {
                let sql = format!("SELECT {} FROM reading ORDER BY timestamp, tank_id, id", READING_COLUMNS);
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map([], Self::map_row)?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
        };
        Ok(readings)
    }

    pub fn upsert(&self, reading: &Reading) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        Self::execute_upsert(&conn, reading)?;
        Ok(())
    }

    /// 批量写入（单事务）
    pub fn upsert_batch(&self, readings: &[Reading]) -> RepositoryResult<usize> {
        let mut conn = self.get_conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        for r in readings {
            Self::execute_upsert(&tx, r)?;
        }
        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(readings.len())
    }

    /// 更新已存在的读数（不存在时报 NotFound）
    pub fn update(&self, reading: &Reading) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            r#"
            UPDATE reading SET
                tank_id = ?2, timestamp = ?3, level_cm = ?4, calculated_volume = ?5,
                calculated_weight_kg = ?6, applied_specific_gravity = ?7, supply_id = ?8,
                added_amount_liters = ?9, operator_name = ?10
            WHERE id = ?1
            "#,
            params![
                reading.id,
                reading.tank_id,
                reading.timestamp,
                reading.level_cm,
                reading.calculated_volume,
                reading.calculated_weight_kg,
                reading.applied_specific_gravity,
                reading.supply_id,
                reading.added_amount_liters,
                reading.operator_name,
            ],
        )?;
        if affected == 0 {
            return Err(RepositoryError::not_found("Reading", &reading.id));
        }
        Ok(())
    }

    pub fn delete(&self, id: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute("DELETE FROM reading WHERE id = ?1", params![id])?;
        if affected == 0 {
            return Err(RepositoryError::not_found("Reading", id));
        }
        Ok(())
    }
}
