// ==========================================
// 加药管理系统 - SQLite 连接与建表
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为
// - 统一 busy_timeout，减少并发写入时的偶发 busy 错误
// - 建表幂等（CREATE TABLE IF NOT EXISTS），启动时执行
// ==========================================
// 读数不设外键: 储槽删除后历史读数仍保留
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前 schema 版本
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS tank (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    system_type TEXT NOT NULL DEFAULT 'OTHER',
    capacity_liters REAL,
    factor REAL,
    shape_type TEXT,
    diameter REAL,
    length REAL,
    width REAL,
    height REAL,
    sensor_offset REAL,
    head_type TEXT,
    input_unit TEXT NOT NULL DEFAULT 'CM',
    safe_min_level REAL,
    validation_threshold REAL,
    sg_range_min REAL,
    sg_range_max REAL,
    calculation_method TEXT NOT NULL DEFAULT 'NONE',
    sort_order INTEGER NOT NULL DEFAULT 0,
    description TEXT
);

CREATE TABLE IF NOT EXISTS reading (
    id TEXT PRIMARY KEY,
    tank_id TEXT NOT NULL,
    timestamp INTEGER NOT NULL,
    level_cm REAL NOT NULL,
    calculated_volume REAL NOT NULL,
    calculated_weight_kg REAL NOT NULL,
    applied_specific_gravity REAL NOT NULL DEFAULT 1.0,
    supply_id TEXT,
    added_amount_liters REAL NOT NULL DEFAULT 0,
    operator_name TEXT
);
CREATE INDEX IF NOT EXISTS idx_reading_tank_ts ON reading(tank_id, timestamp);

CREATE TABLE IF NOT EXISTS chemical_supply (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    tank_id TEXT NOT NULL,
    supplier_name TEXT NOT NULL DEFAULT '',
    chemical_name TEXT NOT NULL,
    specific_gravity REAL NOT NULL,
    price REAL,
    start_date INTEGER NOT NULL,
    target_ppm REAL,
    notes TEXT,
    UNIQUE (tank_id, start_date)
);

CREATE TABLE IF NOT EXISTS cws_param (
    id TEXT PRIMARY KEY,
    tank_id TEXT NOT NULL,
    date INTEGER NOT NULL,
    circulation_rate REAL,
    temp_outlet REAL,
    temp_return REAL,
    temp_diff REAL,
    cws_hardness REAL,
    makeup_hardness REAL,
    concentration_cycles REAL,
    target_ppm REAL,
    UNIQUE (tank_id, date)
);

CREATE TABLE IF NOT EXISTS bws_param (
    id TEXT PRIMARY KEY,
    tank_id TEXT NOT NULL,
    date INTEGER NOT NULL,
    steam_production REAL,
    target_ppm REAL,
    UNIQUE (tank_id, date)
);

CREATE TABLE IF NOT EXISTS fluctuation_alert (
    id TEXT PRIMARY KEY,
    tank_id TEXT NOT NULL,
    tank_name TEXT NOT NULL,
    reading_id TEXT NOT NULL,
    date_str TEXT NOT NULL,
    reason TEXT NOT NULL,
    current_value REAL NOT NULL,
    prev_value REAL NOT NULL,
    next_value REAL,
    is_possible_refill INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS important_note (
    id TEXT PRIMARY KEY,
    tank_id TEXT,
    date INTEGER NOT NULL,
    area TEXT,
    chemical_name TEXT,
    note TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS config_kv (
    scope_id TEXT NOT NULL DEFAULT 'global',
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (scope_id, key)
);
"#;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// foreign_keys 与 busy_timeout 都需要"每个连接"单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 建表（幂等）并记录 schema 版本
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;
    Ok(())
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

/// 默认数据库路径: <数据目录>/chem-dosing/chem_dosing.db
pub fn default_db_path() -> std::path::PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("chem-dosing")
        .join("chem_dosing.db")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        assert_eq!(read_schema_version(&conn).unwrap(), None);

        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();
        assert_eq!(read_schema_version(&conn).unwrap(), Some(CURRENT_SCHEMA_VERSION));
    }

    #[test]
    fn test_default_db_path_file_name() {
        let path = default_db_path();
        assert_eq!(path.file_name().and_then(|n| n.to_str()), Some("chem_dosing.db"));
    }
}
