// ==========================================
// 加药管理系统 - 液位导入
// ==========================================
// 两阶段流程:
//   1. plan: 解析 + 标准化 + 派生值 + 异常检测（纯计算，不写库）
//   2. commit: 由 API 层在确认后写入读数与异常记录
// 规则:
// - 同储槽同日已有读数 → 覆盖并保留原 ID
// - 晚于今天的日期一律拒绝并计数
// - 低于安全液位的读数列入警告（不阻挡）
// ==========================================

use crate::config::settings::DosingSettings;
use crate::domain::reading::{Reading, ReadingInput};
use crate::domain::tank::Tank;
use crate::engine::anomaly::{detect_anomalies, AnomalyReport};
use crate::engine::normalizer::{day_of, format_day, local_midnight_ms, LevelNormalizer};
use crate::engine::recalc::recalculate_reading;
use crate::engine::supply_resolver::SupplyTimeline;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::field_mapper::{map_level_sheet, RowIssue};
use crate::importer::file_parser::RawSheet;
use crate::importer::tank_lookup::TankLookup;
use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// 低液位警告
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LowLevelWarning {
    pub tank_id: String,
    pub tank_name: String,
    pub date: String,
    pub level_cm: f64,
    /// 与储槽录入单位相同
    pub safe_min_level: f64,
}

/// 导入计划（待确认）
#[derive(Debug, Clone, Default)]
pub struct LevelImportPlan {
    pub candidates: Vec<Reading>,
    /// 覆盖既有同日读数的笔数
    pub updated_count: usize,
    pub anomalies: AnomalyReport,
    pub low_level_warnings: Vec<LowLevelWarning>,
    pub issues: Vec<RowIssue>,
    pub unmapped_columns: Vec<String>,
    pub unknown_tanks: Vec<String>,
    pub skipped_future: usize,
    pub skipped_invalid: usize,
    /// 经 ×100 换算的液位笔数
    pub converted_count: usize,
}

impl LevelImportPlan {
    /// 存在异常时须人工确认才能写入
    pub fn requires_confirmation(&self) -> bool {
        !self.anomalies.is_empty()
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped_future + self.skipped_invalid
    }

    /// 同储槽同日的待写入读数以后者为准
    fn push_candidate(&mut self, reading: Reading, is_update: bool) {
        let day = day_of(reading.timestamp);
        if let Some(pos) = self
            .candidates
            .iter()
            .position(|c| c.tank_id == reading.tank_id && day_of(c.timestamp) == day)
        {
            self.candidates[pos] = reading;
            return;
        }
        if is_update {
            self.updated_count += 1;
        }
        self.candidates.push(reading);
    }
}

pub struct LevelImporter<'a> {
    tanks: &'a [Tank],
    existing: &'a [Reading],
    supplies: &'a SupplyTimeline,
    settings: &'a DosingSettings,
    today: NaiveDate,
}

impl<'a> LevelImporter<'a> {
    pub fn new(
        tanks: &'a [Tank],
        existing: &'a [Reading],
        supplies: &'a SupplyTimeline,
        settings: &'a DosingSettings,
        today: NaiveDate,
    ) -> Self {
        Self {
            tanks,
            existing,
            supplies,
            settings,
            today,
        }
    }

    /// 批量液位表 → 导入计划
    #[instrument(skip_all, fields(rows = sheet.rows.len()))]
    pub fn plan(&self, sheet: &RawSheet) -> ImportResult<LevelImportPlan> {
        let mapped = map_level_sheet(sheet, self.today)?;
        let lookup = TankLookup::new(self.tanks);
        let mut normalizer = LevelNormalizer::new();

        let mut plan = LevelImportPlan {
            issues: mapped.issues.clone(),
            unmapped_columns: mapped.unmapped_columns.clone(),
            ..Default::default()
        };
        plan.skipped_invalid = mapped.invalid_row_count();

        for row in &mapped.records {
            let tank_name = &row.record.tank_name;
            let tank = match lookup.find(tank_name) {
                Some(tank) => tank,
                None => {
                    warn!(row = row.row_number, tank_name = %tank_name, "找不到储槽，跳过整行");
                    plan.unknown_tanks.push(tank_name.clone());
                    plan.issues.push(RowIssue {
                        row: row.row_number,
                        field: None,
                        message: format!("找不到储槽: {}", tank_name),
                    });
                    plan.skipped_invalid += 1;
                    continue;
                }
            };

            for cell in &row.record.cells {
                if cell.date > self.today {
                    warn!(row = row.row_number, date = %cell.date, "日期晚于今天，已拒绝");
                    plan.skipped_future += 1;
                    continue;
                }
                let level_cm = match normalizer.normalize(&cell.raw_level, tank) {
                    Some(level) => level,
                    None => {
                        warn!(row = row.row_number, raw = %cell.raw_level, "液位无法解析，跳过");
                        plan.issues.push(RowIssue {
                            row: row.row_number,
                            field: Some(cell.date.to_string()),
                            message: format!("液位无法解析: {}", cell.raw_level),
                        });
                        plan.skipped_invalid += 1;
                        continue;
                    }
                };

                if tank.is_below_safe_level(level_cm) {
                    plan.low_level_warnings.push(low_level_warning(tank, cell.date, level_cm));
                }
                let (reading, is_update) = self.build_candidate(tank, cell.date, level_cm, None, None);
                plan.push_candidate(reading, is_update);
            }
        }

        plan.converted_count = normalizer.converted_count;
        plan.anomalies = detect_anomalies(&plan.candidates, self.existing, self.tanks, self.settings);

        info!(
            candidates = plan.candidates.len(),
            updated = plan.updated_count,
            skipped = plan.skipped_count(),
            converted = plan.converted_count,
            anomalies = plan.anomalies.len(),
            "液位导入计划完成"
        );
        Ok(plan)
    }

    /// 人工录入单笔读数 → 导入计划
    #[instrument(skip_all, fields(tank_id = %input.tank_id, date = %input.date))]
    pub fn plan_manual(&self, input: &ReadingInput) -> ImportResult<LevelImportPlan> {
        let tank = TankLookup::new(self.tanks)
            .find(&input.tank_id)
            .ok_or_else(|| ImportError::UnknownTank(input.tank_id.clone()))?;
        if input.date > self.today {
            return Err(ImportError::FutureDate(input.date.to_string()));
        }

        let mut normalizer = LevelNormalizer::new();
        let level_cm = normalizer
            .normalize(&input.raw_level, tank)
            .ok_or_else(|| ImportError::InvalidValue {
                field: "level".to_string(),
                value: input.raw_level.clone(),
            })?;
        if let Some(added) = input.added_amount_liters.filter(|v| *v < 0.0 || !v.is_finite()) {
            return Err(ImportError::InvalidValue {
                field: "added_amount_liters".to_string(),
                value: added.to_string(),
            });
        }

        let mut plan = LevelImportPlan {
            converted_count: normalizer.converted_count,
            ..Default::default()
        };
        if tank.is_below_safe_level(level_cm) {
            plan.low_level_warnings.push(low_level_warning(tank, input.date, level_cm));
        }
        let (reading, is_update) = self.build_candidate(
            tank,
            input.date,
            level_cm,
            input.added_amount_liters,
            input.operator_name.clone(),
        );
        plan.push_candidate(reading, is_update);
        plan.anomalies = detect_anomalies(&plan.candidates, self.existing, self.tanks, self.settings);
        Ok(plan)
    }

    /// 组装待写入读数并计算派生值
    ///
    /// 同日既有读数保留 ID；补药量与记录人未提供时沿用既有值
    fn build_candidate(
        &self,
        tank: &Tank,
        date: NaiveDate,
        level_cm: f64,
        added_amount_liters: Option<f64>,
        operator_name: Option<String>,
    ) -> (Reading, bool) {
        let existing = self
            .existing
            .iter()
            .find(|r| r.tank_id == tank.id && day_of(r.timestamp) == date);

        let base = Reading {
            id: existing
                .map(|r| r.id.clone())
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            tank_id: tank.id.clone(),
            timestamp: local_midnight_ms(date),
            level_cm,
            calculated_volume: 0.0,
            calculated_weight_kg: 0.0,
            applied_specific_gravity: 1.0,
            supply_id: None,
            added_amount_liters: added_amount_liters
                .or_else(|| existing.map(|r| r.added_amount_liters))
                .unwrap_or(0.0),
            operator_name: operator_name.or_else(|| existing.and_then(|r| r.operator_name.clone())),
        };
        (recalculate_reading(tank, &base, self.supplies), existing.is_some())
    }
}

fn low_level_warning(tank: &Tank, date: NaiveDate, level_cm: f64) -> LowLevelWarning {
    LowLevelWarning {
        tank_id: tank.id.clone(),
        tank_name: tank.name.clone(),
        date: format_day(local_midnight_ms(date)),
        level_cm,
        safe_min_level: tank.safe_min_level.unwrap_or(0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::supply::ChemicalSupply;
    use crate::domain::types::{InputUnit, SystemCategory};

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn tanks() -> Vec<Tank> {
        let mut ct = Tank::new("T1", "CT-1 缓蚀剂", SystemCategory::Cooling);
        ct.factor = Some(10.0);
        ct.capacity_liters = Some(2000.0);
        ct.safe_min_level = Some(50.0);

        let mut boiler = Tank::new("T2", "锅炉清罐剂", SystemCategory::Boiler);
        boiler.factor = Some(10.0);
        boiler.capacity_liters = Some(2000.0);
        boiler.input_unit = InputUnit::Percent;
        vec![ct, boiler]
    }

    fn sheet(headers: &[&str], rows: &[&[&str]]) -> RawSheet {
        RawSheet::from_rows(
            headers.iter().map(|h| h.to_string()).collect(),
            rows.iter()
                .map(|r| r.iter().map(|v| v.to_string()).collect())
                .collect(),
        )
    }

    fn existing_reading(id: &str, date: NaiveDate, level: f64) -> Reading {
        Reading {
            id: id.to_string(),
            tank_id: "T1".to_string(),
            timestamp: local_midnight_ms(date),
            level_cm: level,
            calculated_volume: level * 10.0,
            calculated_weight_kg: level * 10.0,
            applied_specific_gravity: 1.0,
            supply_id: None,
            added_amount_liters: 0.0,
            operator_name: Some("李工".to_string()),
        }
    }

    #[test]
    fn test_plan_builds_candidates_with_derived_values() {
        let tanks = tanks();
        let supplies = SupplyTimeline::new(&[ChemicalSupply {
            id: "S1".to_string(),
            tank_id: "T1".to_string(),
            supplier_name: "甲".to_string(),
            chemical_name: "缓蚀剂".to_string(),
            specific_gravity: 1.2,
            price: None,
            start_date: local_midnight_ms(ymd(2024, 1, 1)),
            target_ppm: None,
            notes: None,
        }]);
        let settings = DosingSettings::default();
        let importer = LevelImporter::new(&tanks, &[], &supplies, &settings, ymd(2024, 5, 10));

        let sheet = sheet(
            &["儲槽名稱", "2024/5/1", "2024/5/2", "2024/5/20"],
            &[&["CT-1 缓蚀剂", "120", "118", "100"], &["锅炉清罐剂", "1.5", "", ""]],
        );
        let plan = importer.plan(&sheet).unwrap();

        assert_eq!(plan.candidates.len(), 3);
        assert_eq!(plan.skipped_future, 1);
        assert_eq!(plan.converted_count, 1);

        let first = &plan.candidates[0];
        assert_eq!(first.calculated_volume, 1200.0);
        assert!((first.calculated_weight_kg - 1440.0).abs() < 1e-9);
        assert_eq!(first.supply_id.as_deref(), Some("S1"));

        let boiler = plan.candidates.iter().find(|r| r.tank_id == "T2").unwrap();
        assert_eq!(boiler.level_cm, 150.0);
        assert!(!plan.requires_confirmation());
    }

    #[test]
    fn test_same_day_upsert_keeps_id() {
        let tanks = tanks();
        let existing = vec![existing_reading("OLD", ymd(2024, 5, 1), 120.0)];
        let settings = DosingSettings::default();
        let supplies = SupplyTimeline::default();
        let importer = LevelImporter::new(&tanks, &existing, &supplies, &settings, ymd(2024, 5, 10));

        let sheet = sheet(&["Tank", "2024-05-01"], &[&["CT-1 缓蚀剂", "119"]]);
        let plan = importer.plan(&sheet).unwrap();

        assert_eq!(plan.updated_count, 1);
        assert_eq!(plan.candidates[0].id, "OLD");
        assert_eq!(plan.candidates[0].level_cm, 119.0);
        assert_eq!(plan.candidates[0].operator_name.as_deref(), Some("李工"));
    }

    #[test]
    fn test_unknown_tank_and_low_level() {
        let tanks = tanks();
        let settings = DosingSettings::default();
        let supplies = SupplyTimeline::default();
        let importer = LevelImporter::new(&tanks, &[], &supplies, &settings, ymd(2024, 5, 10));

        let sheet = sheet(
            &["儲槽", "2024/5/1"],
            &[&["CT-9 未知", "100"], &["CT-1 缓蚀剂", "40"]],
        );
        let plan = importer.plan(&sheet).unwrap();

        assert_eq!(plan.unknown_tanks, vec!["CT-9 未知".to_string()]);
        assert_eq!(plan.candidates.len(), 1);
        assert_eq!(plan.low_level_warnings.len(), 1);
        assert_eq!(plan.low_level_warnings[0].safe_min_level, 50.0);
    }

    #[test]
    fn test_anomaly_requires_confirmation() {
        let tanks = tanks();
        // 2000 L × 30% = 600 L/天；1200 → 300 L 为 900 L/天
        let existing = vec![existing_reading("E1", ymd(2024, 5, 1), 120.0)];
        let settings = DosingSettings::default();
        let supplies = SupplyTimeline::default();
        let importer = LevelImporter::new(&tanks, &existing, &supplies, &settings, ymd(2024, 5, 10));

        let sheet = sheet(&["儲槽", "2024/5/2"], &[&["CT-1 缓蚀剂", "30"]]);
        let plan = importer.plan(&sheet).unwrap();
        assert!(plan.requires_confirmation());
        assert_eq!(plan.anomalies.len(), 1);
    }

    #[test]
    fn test_manual_entry() {
        let tanks = tanks();
        let existing = vec![existing_reading("E1", ymd(2024, 5, 1), 120.0)];
        let settings = DosingSettings::default();
        let supplies = SupplyTimeline::default();
        let importer = LevelImporter::new(&tanks, &existing, &supplies, &settings, ymd(2024, 5, 10));

        let input = ReadingInput {
            tank_id: "T1".to_string(),
            date: ymd(2024, 5, 2),
            raw_level: "150".to_string(),
            added_amount_liters: Some(400.0),
            operator_name: Some("张工".to_string()),
        };
        let plan = importer.plan_manual(&input).unwrap();
        assert_eq!(plan.candidates.len(), 1);
        assert_eq!(plan.candidates[0].added_amount_liters, 400.0);
        // 1200 + 400 − 1500 = 100 L，未超阈值
        assert!(!plan.requires_confirmation());

        let future = ReadingInput {
            date: ymd(2024, 5, 11),
            ..input.clone()
        };
        assert!(matches!(importer.plan_manual(&future), Err(ImportError::FutureDate(_))));

        let bad = ReadingInput {
            raw_level: "abc".to_string(),
            ..input
        };
        assert!(matches!(
            importer.plan_manual(&bad),
            Err(ImportError::InvalidValue { .. })
        ));
    }
}
