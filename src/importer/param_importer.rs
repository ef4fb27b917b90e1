// ==========================================
// 加药管理系统 - 生产参数导入（冷却水 / 锅炉水）
// ==========================================
// 规则:
// - 参数日期 = 行内日期，否则为导入时指定日期；一律归到所在周周一
// - 周一晚于今天 → 拒绝并计数
// - 冷却水区域 CT-1 / CT-2 → 展开到区域内全部冷却水储槽
// - 冷却水缺漏字段回退: 本行 → 同批前一笔 → 该储槽最近一笔历史
// - 同 (储槽, 周) 既有记录沿用其 ID（覆盖更新）
// ==========================================

use crate::domain::params::{BwsParameterRecord, CwsParameterRecord};
use crate::domain::tank::Tank;
use crate::engine::aggregator::week_start;
use crate::engine::fallback::{cws_field_chain, CwsFieldContext};
use crate::engine::normalizer::local_midnight_ms;
use crate::importer::error::ImportResult;
use crate::importer::field_mapper::{map_bws_sheet, map_cws_sheet, CwsRow, CwsTarget, RowIssue};
use crate::importer::file_parser::RawSheet;
use crate::importer::tank_lookup::TankLookup;
use chrono::NaiveDate;
use std::collections::HashMap;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct ParamImportPlan<T> {
    pub records: Vec<T>,
    pub issues: Vec<RowIssue>,
    pub unmapped_columns: Vec<String>,
    pub unknown_targets: Vec<String>,
    pub skipped_future: usize,
    pub skipped: usize,
    /// 由回退链补齐的字段数
    pub filled_fields: usize,
}

impl<T> ParamImportPlan<T> {
    fn new(issues: Vec<RowIssue>, unmapped_columns: Vec<String>, skipped: usize) -> Self {
        Self {
            records: Vec::new(),
            issues,
            unmapped_columns,
            unknown_targets: Vec::new(),
            skipped_future: 0,
            skipped,
            filled_fields: 0,
        }
    }

    fn reject_unknown(&mut self, row: usize, name: &str) {
        warn!(row, target = %name, "找不到对应储槽，跳过");
        self.unknown_targets.push(name.to_string());
        self.issues.push(RowIssue {
            row,
            field: None,
            message: format!("找不到储槽: {}", name),
        });
        self.skipped += 1;
    }
}

pub struct ParamImporter<'a> {
    tanks: &'a [Tank],
    cws_history: &'a [CwsParameterRecord],
    bws_history: &'a [BwsParameterRecord],
    today: NaiveDate,
}

type CwsField = fn(&CwsParameterRecord) -> Option<f64>;

/// 可由回退链补齐的冷却水字段
const FILLABLE_CWS_FIELDS: [(&str, CwsField); 3] = [
    ("circulation_rate", circulation_rate),
    ("temp_outlet", temp_outlet),
    ("temp_return", temp_return),
];

fn circulation_rate(r: &CwsParameterRecord) -> Option<f64> {
    r.circulation_rate
}

fn temp_outlet(r: &CwsParameterRecord) -> Option<f64> {
    r.temp_outlet
}

fn temp_return(r: &CwsParameterRecord) -> Option<f64> {
    r.temp_return
}

fn temp_diff(r: &CwsParameterRecord) -> Option<f64> {
    r.temp_diff
}

impl<'a> ParamImporter<'a> {
    pub fn new(
        tanks: &'a [Tank],
        cws_history: &'a [CwsParameterRecord],
        bws_history: &'a [BwsParameterRecord],
        today: NaiveDate,
    ) -> Self {
        Self {
            tanks,
            cws_history,
            bws_history,
            today,
        }
    }

    /// 该储槽在指定周之前最近一笔冷却水参数
    fn latest_cws_before(&self, tank_id: &str, week_ms: i64) -> Option<&'a CwsParameterRecord> {
        self.cws_history
            .iter()
            .filter(|r| r.tank_id == tank_id && r.date < week_ms)
            .max_by_key(|r| r.date)
    }

    /// 冷却水参数表 → 导入计划
    #[instrument(skip_all, fields(rows = sheet.rows.len(), week = %week_date))]
    pub fn plan_cws(
        &self,
        sheet: &RawSheet,
        week_date: NaiveDate,
    ) -> ImportResult<ParamImportPlan<CwsParameterRecord>> {
        let mapped = map_cws_sheet(sheet, self.today)?;
        let lookup = TankLookup::new(self.tanks);
        let mut plan = ParamImportPlan::new(
            mapped.issues.clone(),
            mapped.unmapped_columns.clone(),
            mapped.invalid_row_count(),
        );
        let mut batch_prior: HashMap<String, CwsParameterRecord> = HashMap::new();

        for row in &mapped.records {
            let record = &row.record;
            let monday = week_start(record.date.unwrap_or(week_date));
            if monday > self.today {
                warn!(row = row.row_number, week = %monday, "参数周晚于今天，已拒绝");
                plan.skipped_future += 1;
                continue;
            }

            let targets: Vec<&Tank> = match &record.target {
                CwsTarget::Area(area) => lookup.cooling_area(area),
                CwsTarget::Tank(name) => lookup.find(name).into_iter().collect(),
            };
            if targets.is_empty() {
                let name = match &record.target {
                    CwsTarget::Area(area) | CwsTarget::Tank(area) => area.as_str(),
                };
                plan.reject_unknown(row.row_number, name);
                continue;
            }

            let week_ms = local_midnight_ms(monday);
            for tank in targets {
                let (filled, count) = self.fill_cws(
                    tank,
                    record,
                    week_ms,
                    batch_prior.get(&tank.id),
                );
                plan.filled_fields += count;
                batch_prior.insert(tank.id.clone(), filled.clone());
                plan.records.push(filled);
            }
        }

        info!(
            records = plan.records.len(),
            skipped = plan.skipped,
            future = plan.skipped_future,
            filled = plan.filled_fields,
            "冷却水参数导入计划完成"
        );
        Ok(plan)
    }

    /// 组装单一储槽的冷却水参数并补齐缺漏字段
    fn fill_cws(
        &self,
        tank: &Tank,
        row: &CwsRow,
        week_ms: i64,
        batch_prior: Option<&CwsParameterRecord>,
    ) -> (CwsParameterRecord, usize) {
        let existing_id = self
            .cws_history
            .iter()
            .find(|r| r.tank_id == tank.id && r.date == week_ms)
            .map(|r| r.id.clone());

        let mut record = CwsParameterRecord {
            id: existing_id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            tank_id: tank.id.clone(),
            date: week_ms,
            circulation_rate: row.circulation_rate,
            temp_outlet: row.temp_outlet,
            temp_return: row.temp_return,
            temp_diff: row.temp_diff,
            cws_hardness: row.cws_hardness,
            makeup_hardness: row.makeup_hardness,
            concentration_cycles: row.concentration_cycles,
            target_ppm: row.target_ppm,
        };

        let history = self.latest_cws_before(&tank.id, week_ms);
        let mut filled = 0;
        let mut resolved = Vec::with_capacity(FILLABLE_CWS_FIELDS.len());
        {
            let ctx = CwsFieldContext {
                row: &record,
                batch_prior,
                history_latest: history,
            };
            for (name, field) in FILLABLE_CWS_FIELDS {
                let value = cws_field_chain(field).resolve(&ctx);
                if let Some(r) = value.filter(|r| r.source != "row") {
                    debug!(tank_id = %tank.id, field = name, source = r.source, "参数字段回退");
                    filled += 1;
                }
                resolved.push(value.map(|r| r.value));
            }
        }
        record.circulation_rate = resolved[0];
        record.temp_outlet = resolved[1];
        record.temp_return = resolved[2];

        // 温差: 本行 → 由温度推导 → 回退链
        if record.temp_diff.is_none() {
            record.temp_diff = record.effective_temp_diff().or_else(|| {
                let ctx = CwsFieldContext {
                    row: &record,
                    batch_prior,
                    history_latest: history,
                };
                cws_field_chain(temp_diff).resolve(&ctx).map(|r| {
                    filled += 1;
                    r.value
                })
            });
        }
        (record, filled)
    }

    /// 锅炉参数表 → 导入计划
    #[instrument(skip_all, fields(rows = sheet.rows.len(), week = %week_date))]
    pub fn plan_bws(
        &self,
        sheet: &RawSheet,
        week_date: NaiveDate,
    ) -> ImportResult<ParamImportPlan<BwsParameterRecord>> {
        let mapped = map_bws_sheet(sheet, self.today)?;
        let lookup = TankLookup::new(self.tanks);
        let mut plan = ParamImportPlan::new(
            mapped.issues.clone(),
            mapped.unmapped_columns.clone(),
            mapped.invalid_row_count(),
        );

        for row in &mapped.records {
            let record = &row.record;
            let monday = week_start(record.date.unwrap_or(week_date));
            if monday > self.today {
                warn!(row = row.row_number, week = %monday, "参数周晚于今天，已拒绝");
                plan.skipped_future += 1;
                continue;
            }
            let tank = match lookup.find(&record.tank_name) {
                Some(tank) => tank,
                None => {
                    plan.reject_unknown(row.row_number, &record.tank_name);
                    continue;
                }
            };

            let week_ms = local_midnight_ms(monday);
            let existing_id = self
                .bws_history
                .iter()
                .find(|r| r.tank_id == tank.id && r.date == week_ms)
                .map(|r| r.id.clone());
            plan.records.push(BwsParameterRecord {
                id: existing_id.unwrap_or_else(|| Uuid::new_v4().to_string()),
                tank_id: tank.id.clone(),
                date: week_ms,
                steam_production: record.steam_production,
                target_ppm: record.target_ppm,
            });
        }

        info!(
            records = plan.records.len(),
            skipped = plan.skipped,
            future = plan.skipped_future,
            "锅炉参数导入计划完成"
        );
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::SystemCategory;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sheet(headers: &[&str], rows: &[&[&str]]) -> RawSheet {
        RawSheet::from_rows(
            headers.iter().map(|h| h.to_string()).collect(),
            rows.iter()
                .map(|r| r.iter().map(|v| v.to_string()).collect())
                .collect(),
        )
    }

    fn tanks() -> Vec<Tank> {
        vec![
            Tank::new("T1", "CT-1 缓蚀剂", SystemCategory::Cooling),
            Tank::new("T2", "CT-1 阻垢剂", SystemCategory::Cooling),
            Tank::new("T3", "CT-2 杀菌剂", SystemCategory::Cooling),
            Tank::new("B1", "锅炉清罐剂", SystemCategory::Boiler),
        ]
    }

    #[test]
    fn test_area_expands_to_cooling_tanks() {
        let tanks = tanks();
        let importer = ParamImporter::new(&tanks, &[], &[], ymd(2024, 6, 1));
        let sheet = sheet(
            &["區域", "循環水量", "出水溫度", "回水溫度", "冷卻水硬度", "補充水硬度"],
            &[&["CT-1", "500", "30", "35", "800", "200"]],
        );
        // 2024-05-08 为周三，归到 5/6
        let plan = importer.plan_cws(&sheet, ymd(2024, 5, 8)).unwrap();

        assert_eq!(plan.records.len(), 2);
        for record in &plan.records {
            assert_eq!(record.date, local_midnight_ms(ymd(2024, 5, 6)));
            assert_eq!(record.temp_diff, Some(5.0));
        }
        assert_eq!(plan.filled_fields, 0);
    }

    #[test]
    fn test_missing_fields_filled_from_history() {
        let tanks = tanks();
        let history = vec![CwsParameterRecord {
            id: "H1".to_string(),
            tank_id: "T3".to_string(),
            date: local_midnight_ms(ymd(2024, 4, 29)),
            circulation_rate: Some(450.0),
            temp_outlet: Some(29.0),
            temp_return: Some(34.5),
            ..Default::default()
        }];
        let importer = ParamImporter::new(&tanks, &history, &[], ymd(2024, 6, 1));
        let sheet = sheet(
            &["儲槽名稱", "冷卻水硬度", "補充水硬度"],
            &[&["CT-2 杀菌剂", "900", "300"]],
        );
        let plan = importer.plan_cws(&sheet, ymd(2024, 5, 6)).unwrap();

        let record = &plan.records[0];
        assert_eq!(record.circulation_rate, Some(450.0));
        assert_eq!(record.temp_diff, Some(5.5));
        assert_eq!(record.cws_hardness, Some(900.0));
        assert_eq!(plan.filled_fields, 3);
        assert_ne!(record.id, "H1");
    }

    #[test]
    fn test_future_week_rejected_and_unknown_area() {
        let tanks = tanks();
        let importer = ParamImporter::new(&tanks, &[], &[], ymd(2024, 5, 8));
        let sheet = sheet(
            &["區域", "日期", "循環水量"],
            &[&["CT-1", "2024/5/20", "500"], &["CT-9", "2024/5/6", "500"]],
        );
        let plan = importer.plan_cws(&sheet, ymd(2024, 5, 6)).unwrap();

        assert!(plan.records.is_empty());
        assert_eq!(plan.skipped_future, 1);
        assert_eq!(plan.unknown_targets, vec!["CT-9".to_string()]);
    }

    #[test]
    fn test_bws_reuses_existing_week_id() {
        let tanks = tanks();
        let history = vec![BwsParameterRecord {
            id: "W1".to_string(),
            tank_id: "B1".to_string(),
            date: local_midnight_ms(ymd(2024, 5, 6)),
            steam_production: Some(600.0),
            target_ppm: None,
        }];
        let importer = ParamImporter::new(&tanks, &[], &history, ymd(2024, 6, 1));
        let sheet = sheet(&["儲槽", "蒸汽量"], &[&["锅炉清罐剂", "700"]]);
        let plan = importer.plan_bws(&sheet, ymd(2024, 5, 9)).unwrap();

        assert_eq!(plan.records.len(), 1);
        assert_eq!(plan.records[0].id, "W1");
        assert_eq!(plan.records[0].steam_production, Some(700.0));
    }
}
