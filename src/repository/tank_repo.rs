// ==========================================
// 加药管理系统 - 储槽仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 储槽删除不级联删除读数
// ==========================================

use crate::domain::tank::{Tank, TankDimensions};
use crate::domain::types::{CalculationMethod, HeadType, InputUnit, ShapeType, SystemCategory};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex, MutexGuard};

const TANK_COLUMNS: &str = r#"
    id, name, system_type, capacity_liters, factor, shape_type,
    diameter, length, width, height, sensor_offset, head_type,
    input_unit, safe_min_level, validation_threshold, sg_range_min, sg_range_max,
    calculation_method, sort_order, description
"#;

pub struct TankRepository {
    conn: Arc<Mutex<Connection>>,
}

impl TankRepository {
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<Tank> {
        Ok(Tank {
            id: row.get(0)?,
            name: row.get(1)?,
            system: SystemCategory::from_str(&row.get::<_, String>(2)?),
            capacity_liters: row.get(3)?,
            factor: row.get(4)?,
            shape_type: row
                .get::<_, Option<String>>(5)?
                .and_then(|s| ShapeType::from_str(&s)),
            dimensions: TankDimensions {
                diameter: row.get(6)?,
                length: row.get(7)?,
                width: row.get(8)?,
                height: row.get(9)?,
                sensor_offset: row.get(10)?,
                head_type: row.get::<_, Option<String>>(11)?.map(|s| HeadType::from_str(&s)),
            },
            input_unit: InputUnit::from_str(&row.get::<_, String>(12)?),
            safe_min_level: row.get(13)?,
            validation_threshold: row.get(14)?,
            sg_range_min: row.get(15)?,
            sg_range_max: row.get(16)?,
            calculation_method: CalculationMethod::from_str(&row.get::<_, String>(17)?),
            sort_order: row.get(18)?,
            description: row.get(19)?,
        })
    }

    /// 全部储槽（按 sort_order、名称排序）
    pub fn list(&self) -> RepositoryResult<Vec<Tank>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM tank ORDER BY sort_order, name", TANK_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let tanks = stmt
            .query_map([], Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tanks)
    }

    pub fn find_by_id(&self, id: &str) -> RepositoryResult<Option<Tank>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM tank WHERE id = ?1", TANK_COLUMNS);
        let tank = conn.query_row(&sql, params![id], Self::map_row).optional()?;
        Ok(tank)
    }

    /// 新增或覆盖
    pub fn upsert(&self, tank: &Tank) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let d = &tank.dimensions;
        conn.execute(
            r#"
            INSERT INTO tank (
                id, name, system_type, capacity_liters, factor, shape_type,
                diameter, length, width, height, sensor_offset, head_type,
                input_unit, safe_min_level, validation_threshold, sg_range_min, sg_range_max,
                calculation_method, sort_order, description
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                system_type = excluded.system_type,
                capacity_liters = excluded.capacity_liters,
                factor = excluded.factor,
                shape_type = excluded.shape_type,
                diameter = excluded.diameter,
                length = excluded.length,
                width = excluded.width,
                height = excluded.height,
                sensor_offset = excluded.sensor_offset,
                head_type = excluded.head_type,
                input_unit = excluded.input_unit,
                safe_min_level = excluded.safe_min_level,
                validation_threshold = excluded.validation_threshold,
                sg_range_min = excluded.sg_range_min,
                sg_range_max = excluded.sg_range_max,
                calculation_method = excluded.calculation_method,
                sort_order = excluded.sort_order,
                description = excluded.description
            "#,
            params![
                tank.id,
                tank.name,
                tank.system.to_db_str(),
                tank.capacity_liters,
                tank.factor,
                tank.shape_type.as_ref().map(|s| s.to_db_str()),
                d.diameter,
                d.length,
                d.width,
                d.height,
                d.sensor_offset,
                d.head_type.as_ref().map(|h| h.to_db_str()),
                tank.input_unit.to_db_str(),
                tank.safe_min_level,
                tank.validation_threshold,
                tank.sg_range_min,
                tank.sg_range_max,
                tank.calculation_method.to_db_str(),
                tank.sort_order,
                tank.description,
            ],
        )?;
        Ok(())
    }

    /// 删除储槽（读数保留）
    pub fn delete(&self, id: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute("DELETE FROM tank WHERE id = ?1", params![id])?;
        if affected == 0 {
            return Err(RepositoryError::not_found("Tank", id));
        }
        Ok(())
    }
}
