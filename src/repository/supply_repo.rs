// ==========================================
// 加药管理系统 - 药剂合约仓储
// ==========================================
// (tank_id, start_date) 唯一: 同一储槽同一生效日重复保存时覆盖原合约
// 读取顺序: start_date 升序，同日以写入顺序 (seq) 为准
// ==========================================

use crate::domain::supply::ChemicalSupply;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex, MutexGuard};

const SUPPLY_COLUMNS: &str = r#"
    id, tank_id, supplier_name, chemical_name, specific_gravity,
    price, start_date, target_ppm, notes
"#;

pub struct SupplyRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SupplyRepository {
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<ChemicalSupply> {
        Ok(ChemicalSupply {
            id: row.get(0)?,
            tank_id: row.get(1)?,
            supplier_name: row.get(2)?,
            chemical_name: row.get(3)?,
            specific_gravity: row.get(4)?,
            price: row.get(5)?,
            start_date: row.get(6)?,
            target_ppm: row.get(7)?,
            notes: row.get(8)?,
        })
    }

    /// 按 (tank_id, start_date) 覆盖写入
    ///
    /// 返回实际落库的合约 id（覆盖时沿用原 id）
    fn execute_upsert(conn: &Connection, s: &ChemicalSupply) -> RepositoryResult<String> {
        conn.execute(
            r#"
            INSERT INTO chemical_supply (
                id, tank_id, supplier_name, chemical_name, specific_gravity,
                price, start_date, target_ppm, notes
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(tank_id, start_date) DO UPDATE SET
                supplier_name = excluded.supplier_name,
                chemical_name = excluded.chemical_name,
                specific_gravity = excluded.specific_gravity,
                price = excluded.price,
                target_ppm = excluded.target_ppm,
                notes = excluded.notes
            "#,
            params![
                s.id,
                s.tank_id,
                s.supplier_name,
                s.chemical_name,
                s.specific_gravity,
                s.price,
                s.start_date,
                s.target_ppm,
                s.notes,
            ],
        )?;
        let id: String = conn.query_row(
            "SELECT id FROM chemical_supply WHERE tank_id = ?1 AND start_date = ?2",
            params![s.tank_id, s.start_date],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    /// 查询合约；tank_id 为空时返回全部
    pub fn list(&self, tank_id: Option<&str>) -> RepositoryResult<Vec<ChemicalSupply>> {
        let conn = self.get_conn()?;
        let supplies = match tank_id {
            Some(id) => {
                let sql = format!(
                    "SELECT {} FROM chemical_supply WHERE tank_id = ?1 ORDER BY start_date, seq",
                    SUPPLY_COLUMNS
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(params![id], Self::map_row)?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
            None => {
                let sql = format!(
                    "SELECT {} FROM chemical_supply ORDER BY tank_id, start_date, seq",
                    SUPPLY_COLUMNS
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map([], Self::map_row)?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
        };
        Ok(supplies)
    }

    pub fn find_by_id(&self, id: &str) -> RepositoryResult<Option<ChemicalSupply>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM chemical_supply WHERE id = ?1", SUPPLY_COLUMNS);
        let supply = conn.query_row(&sql, params![id], Self::map_row).optional()?;
        Ok(supply)
    }

    pub fn upsert(&self, supply: &ChemicalSupply) -> RepositoryResult<String> {
        let conn = self.get_conn()?;
        Self::execute_upsert(&conn, supply)
    }

    /// 批量写入（单事务），返回落库 id 列表
    pub fn upsert_batch(&self, supplies: &[ChemicalSupply]) -> RepositoryResult<Vec<String>> {
        let mut conn = self.get_conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        let mut ids = Vec::with_capacity(supplies.len());
        for s in supplies {
            ids.push(Self::execute_upsert(&tx, s)?);
        }
        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(ids)
    }

    /// 按 id 更新全部字段
    ///
    /// 改到的生效日与同储槽其他合约冲突时报唯一约束违反
    pub fn update(&self, supply: &ChemicalSupply) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            r#"
            UPDATE chemical_supply SET
                tank_id = ?2, supplier_name = ?3, chemical_name = ?4, specific_gravity = ?5,
                price = ?6, start_date = ?7, target_ppm = ?8, notes = ?9
            WHERE id = ?1
            "#,
            params![
                supply.id,
                supply.tank_id,
                supply.supplier_name,
                supply.chemical_name,
                supply.specific_gravity,
                supply.price,
                supply.start_date,
                supply.target_ppm,
                supply.notes,
            ],
        )?;
        if affected == 0 {
            return Err(RepositoryError::not_found("ChemicalSupply", &supply.id));
        }
        Ok(())
    }

    /// 指定日期生效中的合约: start_date ≤ date 中最新的一笔
    pub fn find_active(&self, tank_id: &str, date: i64) -> RepositoryResult<Option<ChemicalSupply>> {
        let conn = self.get_conn()?;
        let sql = format!(
            r#"
            SELECT {} FROM chemical_supply
            WHERE tank_id = ?1 AND start_date <= ?2
            ORDER BY start_date DESC, seq DESC
            LIMIT 1
            "#,
            SUPPLY_COLUMNS
        );
        let supply = conn
            .query_row(&sql, params![tank_id, date], Self::map_row)
            .optional()?;
        Ok(supply)
    }
}
