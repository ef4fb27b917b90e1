// ==========================================
// 加药管理系统 - 异常纪录与重要备注仓储
// ==========================================

use crate::domain::annotation::{FluctuationAlert, ImportantNote};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, Row};
use std::sync::{Arc, Mutex, MutexGuard};

// ==========================================
// AlertRepository - 液位异常纪录
// ==========================================
pub struct AlertRepository {
    conn: Arc<Mutex<Connection>>,
}

impl AlertRepository {
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<FluctuationAlert> {
        Ok(FluctuationAlert {
            id: row.get(0)?,
            tank_id: row.get(1)?,
            tank_name: row.get(2)?,
            reading_id: row.get(3)?,
            date_str: row.get(4)?,
            reason: row.get(5)?,
            current_value: row.get(6)?,
            prev_value: row.get(7)?,
            next_value: row.get(8)?,
            is_possible_refill: row.get(9)?,
            created_at: row.get(10)?,
        })
    }

    /// 批量写入（单事务），同 id 覆盖
    pub fn insert_batch(&self, alerts: &[FluctuationAlert]) -> RepositoryResult<usize> {
        let mut conn = self.get_conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        for a in alerts {
            tx.execute(
                r#"
                INSERT OR REPLACE INTO fluctuation_alert (
                    id, tank_id, tank_name, reading_id, date_str, reason,
                    current_value, prev_value, next_value, is_possible_refill, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                "#,
                params![
                    a.id,
                    a.tank_id,
                    a.tank_name,
                    a.reading_id,
                    a.date_str,
                    a.reason,
                    a.current_value,
                    a.prev_value,
                    a.next_value,
                    a.is_possible_refill,
                    a.created_at,
                ],
            )?;
        }
        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(alerts.len())
    }

    /// 最新的在前
    pub fn list(&self, tank_id: Option<&str>) -> RepositoryResult<Vec<FluctuationAlert>> {
        let conn = self.get_conn()?;
        let base = r#"
            SELECT id, tank_id, tank_name, reading_id, date_str, reason,
                   current_value, prev_value, next_value, is_possible_refill, created_at
            FROM fluctuation_alert
        "#;
        let alerts = match tank_id {
            Some(id) => {
                let sql = format!("{} WHERE tank_id = ?1 ORDER BY created_at DESC, date_str DESC", base);
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(params![id], Self::map_row)?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
            None => {
                let sql = format!("{} ORDER BY created_at DESC, date_str DESC", base);
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map([], Self::map_row)?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
        };
        Ok(alerts)
    }
}

// ==========================================
// NoteRepository - 重要备注
// ==========================================
pub struct NoteRepository {
    conn: Arc<Mutex<Connection>>,
}

impl NoteRepository {
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<ImportantNote> {
        Ok(ImportantNote {
            id: row.get(0)?,
            tank_id: row.get(1)?,
            date: row.get(2)?,
            area: row.get(3)?,
            chemical_name: row.get(4)?,
            note: row.get(5)?,
            created_at: row.get(6)?,
        })
    }

    pub fn upsert(&self, note: &ImportantNote) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT OR REPLACE INTO important_note (id, tank_id, date, area, chemical_name, note, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                note.id,
                note.tank_id,
                note.date,
                note.area,
                note.chemical_name,
                note.note,
                note.created_at,
            ],
        )?;
        Ok(())
    }

    /// 按日期倒序
    pub fn list(&self, tank_id: Option<&str>) -> RepositoryResult<Vec<ImportantNote>> {
        let conn = self.get_conn()?;
        let base = "SELECT id, tank_id, date, area, chemical_name, note, created_at FROM important_note";
        let notes = match tank_id {
            Some(id) => {
                let sql = format!("{} WHERE tank_id = ?1 ORDER BY date DESC, created_at DESC", base);
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(params![id], Self::map_row)?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
            None => {
                let sql = format!("{} ORDER BY date DESC, created_at DESC", base);
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map([], Self::map_row)?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
        };
        Ok(notes)
    }

    pub fn delete(&self, id: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute("DELETE FROM important_note WHERE id = ?1", params![id])?;
        if affected == 0 {
            return Err(RepositoryError::not_found("ImportantNote", id));
        }
        Ok(())
    }
}
