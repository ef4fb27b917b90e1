// ==========================================
// 加药管理系统 - 周参数仓储（冷却水 / 锅炉水）
// ==========================================
// (tank_id, date) 唯一: 同储槽同一周重复保存时覆盖
// ==========================================

use crate::domain::params::{BwsParameterRecord, CwsParameterRecord};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, Row};
use std::sync::{Arc, Mutex, MutexGuard};

const CWS_COLUMNS: &str = r#"
    id, tank_id, date, circulation_rate, temp_outlet, temp_return, temp_diff,
    cws_hardness, makeup_hardness, concentration_cycles, target_ppm
"#;

const BWS_COLUMNS: &str = "id, tank_id, date, steam_production, target_ppm";

pub struct ParamRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ParamRepository {
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 冷却水参数
    // ==========================================

    fn map_cws(row: &Row<'_>) -> rusqlite::Result<CwsParameterRecord> {
        Ok(CwsParameterRecord {
            id: row.get(0)?,
            tank_id: row.get(1)?,
            date: row.get(2)?,
            circulation_rate: row.get(3)?,
            temp_outlet: row.get(4)?,
            temp_return: row.get(5)?,
            temp_diff: row.get(6)?,
            cws_hardness: row.get(7)?,
            makeup_hardness: row.get(8)?,
            concentration_cycles: row.get(9)?,
            target_ppm: row.get(10)?,
        })
    }

    /// 冷却水参数历史（date 升序）
    pub fn list_cws(&self, tank_id: Option<&str>) -> RepositoryResult<Vec<CwsParameterRecord>> {
        let conn = self.get_conn()?;
        let records = match tank_id {
            Some(id) => {
                let sql = format!("SELECT {} FROM cws_param WHERE tank_id = ?1 ORDER BY date", CWS_COLUMNS);
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(params![id], Self::map_cws)?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
            None => {
                let sql = format!("SELECT {} FROM cws_param ORDER BY tank_id, date", CWS_COLUMNS);
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map([], Self::map_cws)?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
        };
        Ok(records)
    }

    /// 按 (tank_id, date) 覆盖写入
    pub fn upsert_cws(&self, rec: &CwsParameterRecord) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO cws_param (
                id, tank_id, date, circulation_rate, temp_outlet, temp_return, temp_diff,
                cws_hardness, makeup_hardness, concentration_cycles, target_ppm
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ON CONFLICT(tank_id, date) DO UPDATE SET
                circulation_rate = excluded.circulation_rate,
                temp_outlet = excluded.temp_outlet,
                temp_return = excluded.temp_return,
                temp_diff = excluded.temp_diff,
                cws_hardness = excluded.cws_hardness,
                makeup_hardness = excluded.makeup_hardness,
                concentration_cycles = excluded.concentration_cycles,
                target_ppm = excluded.target_ppm
            "#,
            params![
                rec.id,
                rec.tank_id,
                rec.date,
                rec.circulation_rate,
                rec.temp_outlet,
                rec.temp_return,
                rec.temp_diff,
                rec.cws_hardness,
                rec.makeup_hardness,
                rec.concentration_cycles,
                rec.target_ppm,
            ],
        )?;
        Ok(())
    }

    pub fn update_cws(&self, rec: &CwsParameterRecord) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            r#"
            UPDATE cws_param SET
                tank_id = ?2, date = ?3, circulation_rate = ?4, temp_outlet = ?5, temp_return = ?6,
                temp_diff = ?7, cws_hardness = ?8, makeup_hardness = ?9,
                concentration_cycles = ?10, target_ppm = ?11
            WHERE id = ?1
            "#,
            params![
                rec.id,
                rec.tank_id,
                rec.date,
                rec.circulation_rate,
                rec.temp_outlet,
                rec.temp_return,
                rec.temp_diff,
                rec.cws_hardness,
                rec.makeup_hardness,
                rec.concentration_cycles,
                rec.target_ppm,
            ],
        )?;
        if affected == 0 {
            return Err(RepositoryError::not_found("CwsParameterRecord", &rec.id));
        }
        Ok(())
    }

    pub fn delete_cws(&self, id: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute("DELETE FROM cws_param WHERE id = ?1", params![id])?;
        if affected == 0 {
            return Err(RepositoryError::not_found("CwsParameterRecord", id));
        }
        Ok(())
    }

    // ==========================================
    // 锅炉水参数
    // ==========================================

    fn map_bws(row: &Row<'_>) -> rusqlite::Result<BwsParameterRecord> {
        Ok(BwsParameterRecord {
            id: row.get(0)?,
            tank_id: row.get(1)?,
            date: row.get(2)?,
            steam_production: row.get(3)?,
            target_ppm: row.get(4)?,
        })
    }

    pub fn list_bws(&self, tank_id: Option<&str>) -> RepositoryResult<Vec<BwsParameterRecord>> {
        let conn = self.get_conn()?;
        let records = match tank_id {
            Some(id) => {
                let sql = format!("SELECT {} FROM bws_param WHERE tank_id = ?1 ORDER BY date", BWS_COLUMNS);
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(params![id], Self::map_bws)?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
            None => {
                let sql = format!("SELECT {} FROM bws_param ORDER BY tank_id, date", BWS_COLUMNS);
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map([], Self::map_bws)?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
        };
        Ok(records)
    }

    pub fn upsert_bws(&self, rec: &BwsParameterRecord) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO bws_param (id, tank_id, date, steam_production, target_ppm)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(tank_id, date) DO UPDATE SET
                steam_production = excluded.steam_production,
                target_ppm = excluded.target_ppm
            "#,
            params![rec.id, rec.tank_id, rec.date, rec.steam_production, rec.target_ppm],
        )?;
        Ok(())
    }

    pub fn update_bws(&self, rec: &BwsParameterRecord) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "UPDATE bws_param SET tank_id = ?2, date = ?3, steam_production = ?4, target_ppm = ?5 WHERE id = ?1",
            params![rec.id, rec.tank_id, rec.date, rec.steam_production, rec.target_ppm],
        )?;
        if affected == 0 {
            return Err(RepositoryError::not_found("BwsParameterRecord", &rec.id));
        }
        Ok(())
    }

    pub fn delete_bws(&self, id: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute("DELETE FROM bws_param WHERE id = ?1", params![id])?;
        if affected == 0 {
            return Err(RepositoryError::not_found("BwsParameterRecord", id));
        }
        Ok(())
    }
}
