// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 临时数据库、测试储槽/读数/合约、临时表格文件
// ==========================================

#![allow(dead_code)]

use chem_dosing::db::{init_schema, open_sqlite_connection};
use chem_dosing::domain::types::{CalculationMethod, SystemCategory};
use chem_dosing::engine::normalizer::local_midnight_ms;
use chem_dosing::{ChemicalSupply, DosingApi, DosingSettings, Reading, SqliteStorage, Tank};
use chrono::NaiveDate;
use std::error::Error;
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;

/// 创建临时测试数据库并初始化 schema
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file.path().to_str().ok_or("非 UTF-8 路径")?.to_string();

    let conn = open_sqlite_connection(&db_path)?;
    init_schema(&conn)?;

    Ok((temp_file, db_path))
}

/// 打开临时数据库上的存储服务
pub fn open_storage(db_path: &str) -> Arc<SqliteStorage> {
    Arc::new(SqliteStorage::open(db_path).expect("Failed to open storage"))
}

/// 以固定"今天"构造 API
pub fn create_api(storage: Arc<SqliteStorage>, today: NaiveDate) -> DosingApi {
    DosingApi::new(storage, DosingSettings::default()).with_today(today)
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("invalid date")
}

/// 冷却水储槽: 线性系数 10 L/cm，容量 1000 L，比重范围 [1.0, 1.5]
pub fn cooling_tank(id: &str, name: &str) -> Tank {
    let mut tank = Tank::new(id, name, SystemCategory::Cooling);
    tank.factor = Some(10.0);
    tank.capacity_liters = Some(1000.0);
    tank.sg_range_min = Some(1.0);
    tank.sg_range_max = Some(1.5);
    tank.calculation_method = CalculationMethod::CwsBlowdown;
    tank
}

pub fn reading(tank: &Tank, day: NaiveDate, level_cm: f64) -> Reading {
    let volume = level_cm * tank.factor.unwrap_or(0.0);
    Reading {
        id: format!("{}-{}", tank.id, day),
        tank_id: tank.id.clone(),
        timestamp: local_midnight_ms(day),
        level_cm,
        calculated_volume: volume,
        calculated_weight_kg: volume,
        applied_specific_gravity: 1.0,
        supply_id: None,
        added_amount_liters: 0.0,
        operator_name: None,
    }
}

pub fn supply(tank_id: &str, start: NaiveDate, sg: f64, ppm: Option<f64>) -> ChemicalSupply {
    ChemicalSupply {
        id: uuid::Uuid::new_v4().to_string(),
        tank_id: tank_id.to_string(),
        supplier_name: "测试供应商".to_string(),
        chemical_name: "缓蚀剂".to_string(),
        specific_gravity: sg,
        price: Some(40.0),
        start_date: local_midnight_ms(start),
        target_ppm: ppm,
        notes: None,
    }
}

/// 写入临时 CSV 文件（保留 .csv 扩展名）
pub fn write_csv(content: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".csv")
        .tempfile()
        .expect("Failed to create temp csv");
    file.write_all(content.as_bytes()).expect("Failed to write csv");
    file.flush().expect("Failed to flush csv");
    file
}

pub fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-6,
        "expected {}, got {}",
        expected,
        actual
    );
}
