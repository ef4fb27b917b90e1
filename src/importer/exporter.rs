// ==========================================
// 加药管理系统 - 读数导出
// ==========================================
// CSV 栏位: Date, Tank, Level(cm), Volume(L), Weight(kg), SG, Operator
// 每笔读数一行，按日期、储槽排序顺序排列
// 已删除储槽的读数以储槽 ID 代替名称
// ==========================================

use crate::domain::reading::Reading;
use crate::domain::tank::Tank;
use crate::engine::normalizer::format_day;
use crate::importer::error::{ImportError, ImportResult};
use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tracing::{info, instrument};

pub const EXPORT_HEADERS: [&str; 7] = [
    "Date",
    "Tank",
    "Level(cm)",
    "Volume(L)",
    "Weight(kg)",
    "SG",
    "Operator",
];

/// 写出读数 CSV，返回数据行数
pub fn write_readings_csv<W: Write>(writer: W, readings: &[Reading], tanks: &[Tank]) -> ImportResult<usize> {
    let tank_map: HashMap<&str, &Tank> = tanks.iter().map(|t| (t.id.as_str(), t)).collect();

    let mut sorted: Vec<&Reading> = readings.iter().collect();
    sorted.sort_by_key(|r| {
        let order = tank_map.get(r.tank_id.as_str()).map_or(i32::MAX, |t| t.sort_order);
        (r.timestamp, order, r.tank_id.clone())
    });

    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer
        .write_record(EXPORT_HEADERS)
        .map_err(|e| ImportError::CsvWriteError(e.to_string()))?;

    for r in &sorted {
        let tank_name = tank_map
            .get(r.tank_id.as_str())
            .map_or(r.tank_id.as_str(), |t| t.name.as_str());
        csv_writer
            .write_record([
                format_day(r.timestamp),
                tank_name.to_string(),
                format!("{:.1}", r.level_cm),
                format!("{:.2}", r.calculated_volume),
                format!("{:.2}", r.calculated_weight_kg),
                format!("{:.3}", r.applied_specific_gravity),
                r.operator_name.clone().unwrap_or_default(),
            ])
            .map_err(|e| ImportError::CsvWriteError(e.to_string()))?;
    }
    csv_writer
        .flush()
        .map_err(|e| ImportError::CsvWriteError(e.to_string()))?;
    Ok(sorted.len())
}

/// 导出到文件
#[instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn export_readings<P: AsRef<Path>>(path: P, readings: &[Reading], tanks: &[Tank]) -> ImportResult<usize> {
    let file = File::create(path.as_ref())?;
    let rows = write_readings_csv(file, readings, tanks)?;
    info!(rows, "读数导出完成");
    Ok(rows)
}
