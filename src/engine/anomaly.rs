// ==========================================
// 加药管理系统 - 液位异常检测
// ==========================================
// 输入: 待写入读数（导入/人工录入） + 既有读数 + 储槽
// 输出: AnomalyReport（纯函数，不写库）
// 流程: 调用方先检测，存在异常时由操作员确认后再落库（读数 + 警报）
// ==========================================
// 规则:
// - 日阈值 = 容量 × 阈值% / 100
// - level_change = (前笔体积 + 本笔补药量) − 本笔体积
// - daily_change = |level_change| / 间隔天数，严格大于日阈值才告警
// - level_change < 0 且 daily_change > 日阈值 × 12 → 可能补药，否则 → 用量异常
// ==========================================

use crate::config::settings::DosingSettings;
use crate::domain::annotation::FluctuationAlert;
use crate::domain::reading::Reading;
use crate::domain::tank::Tank;
use crate::engine::normalizer::{day_of, diff_days, format_day};
use crate::engine::volume::effective_capacity;
use crate::i18n;
use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// 异常分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeClass {
    PossibleRefill,
    AbnormalConsumption,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Anomaly {
    pub reading_id: String,
    pub tank_id: String,
    pub tank_name: String,
    pub date: String,
    pub current_value: f64,
    pub prev_value: f64,
    pub next_value: Option<f64>,
    pub level_change: f64,
    pub daily_change: f64,
    pub daily_threshold: f64,
    pub class: ChangeClass,
    pub message: String,
}

impl Anomaly {
    pub fn is_possible_refill(&self) -> bool {
        self.class == ChangeClass::PossibleRefill
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AnomalyReport {
    pub anomalies: Vec<Anomaly>,
}

impl AnomalyReport {
    pub fn is_empty(&self) -> bool {
        self.anomalies.is_empty()
    }

    pub fn len(&self) -> usize {
        self.anomalies.len()
    }

    pub fn refill_count(&self) -> usize {
        self.anomalies.iter().filter(|a| a.is_possible_refill()).count()
    }

    /// 确认后转换为警报记录
    pub fn to_alerts(&self, created_at: NaiveDateTime) -> Vec<FluctuationAlert> {
        self.anomalies
            .iter()
            .map(|a| FluctuationAlert {
                id: Uuid::new_v4().to_string(),
                tank_id: a.tank_id.clone(),
                tank_name: a.tank_name.clone(),
                reading_id: a.reading_id.clone(),
                date_str: a.date.clone(),
                reason: a.message.clone(),
                current_value: a.current_value,
                prev_value: a.prev_value,
                next_value: a.next_value,
                is_possible_refill: a.is_possible_refill(),
                created_at,
            })
            .collect()
    }
}

/// 日阈值 (L/天)
pub fn daily_threshold(tank: &Tank, settings: &DosingSettings) -> f64 {
    let pct = tank
        .validation_threshold
        .unwrap_or(settings.default_threshold_pct);
    effective_capacity(tank) * pct / 100.0
}

/// 判定单一变化量
///
/// # 返回
/// - None: 未超过日阈值或天数非正
/// - Some(ChangeClass): 异常分类
pub fn classify_change(
    level_change: f64,
    days: f64,
    daily_threshold: f64,
    refill_multiplier: f64,
) -> Option<ChangeClass> {
    if days <= 0.0 {
        return None;
    }
    let daily_change = level_change.abs() / days;
    if daily_change <= daily_threshold {
        return None;
    }
    if level_change < 0.0 && daily_change > daily_threshold * refill_multiplier {
        Some(ChangeClass::PossibleRefill)
    } else {
        Some(ChangeClass::AbnormalConsumption)
    }
}

/// 套用提示模板
pub fn format_anomaly_message(
    template: Option<&str>,
    daily_change: f64,
    limit: f64,
    unit: &str,
    class: ChangeClass,
) -> String {
    let text = match class {
        ChangeClass::PossibleRefill => i18n::t("anomaly.possible_refill"),
        ChangeClass::AbnormalConsumption => i18n::t("anomaly.abnormal_consumption"),
    };
    let template = match template.filter(|t| !t.trim().is_empty()) {
        Some(t) => t.to_string(),
        None => i18n::t("anomaly.default_template"),
    };
    template
        .replace("{diff}", &format!("{:.1}", daily_change))
        .replace("{limit}", &format!("{:.1}", limit))
        .replace("{unit}", unit)
        .replace("{text}", &text)
}

/// 检测待写入读数的异常
///
/// 同一储槽同一日历日，待写入读数取代既有读数；
/// 仅检查待写入读数与其时间上的前一笔
#[instrument(skip_all, fields(candidates = candidates.len(), existing = existing.len()))]
pub fn detect_anomalies(
    candidates: &[Reading],
    existing: &[Reading],
    tanks: &[Tank],
    settings: &DosingSettings,
) -> AnomalyReport {
    let tank_map: HashMap<&str, &Tank> = tanks.iter().map(|t| (t.id.as_str(), t)).collect();

    // 按储槽分组，同日多笔待写入读数取最后一笔
    let mut candidates_by_tank: BTreeMap<&str, BTreeMap<chrono::NaiveDate, &Reading>> = BTreeMap::new();
    for r in candidates {
        candidates_by_tank
            .entry(r.tank_id.as_str())
            .or_default()
            .insert(day_of(r.timestamp), r);
    }

    let mut report = AnomalyReport::default();
    for (tank_id, new_by_day) in candidates_by_tank {
        let tank = match tank_map.get(tank_id) {
            Some(t) => *t,
            None => {
                warn!(tank_id, "储槽不存在，跳过异常检测");
                continue;
            }
        };
        let limit = daily_threshold(tank, settings);

        let mut timeline: Vec<(&Reading, bool)> = existing
            .iter()
            .filter(|r| r.tank_id == tank_id && !new_by_day.contains_key(&day_of(r.timestamp)))
            .map(|r| (r, false))
            .chain(new_by_day.values().map(|r| (*r, true)))
            .collect();
        timeline.sort_by_key(|(r, _)| r.timestamp);

        for idx in 1..timeline.len() {
            let (curr, is_new) = timeline[idx];
            if !is_new {
                continue;
            }
            let prev = timeline[idx - 1].0;
            let days = diff_days(prev.timestamp, curr.timestamp);
            let level_change =
                prev.calculated_volume + curr.added_amount_liters - curr.calculated_volume;

            let class = match classify_change(level_change, days, limit, settings.refill_multiplier) {
                Some(c) => c,
                None => continue,
            };
            let daily_change = level_change.abs() / days;
            let message = format_anomaly_message(
                settings.anomaly_message_template.as_deref(),
                daily_change,
                limit,
                "L",
                class,
            );

            report.anomalies.push(Anomaly {
                reading_id: curr.id.clone(),
                tank_id: tank.id.clone(),
                tank_name: tank.name.clone(),
                date: format_day(curr.timestamp),
                current_value: curr.calculated_volume,
                prev_value: prev.calculated_volume,
                next_value: timeline.get(idx + 1).map(|(r, _)| r.calculated_volume),
                level_change,
                daily_change,
                daily_threshold: limit,
                class,
                message,
            });
        }
    }

    if !report.is_empty() {
        info!(
            anomalies = report.len(),
            refills = report.refill_count(),
            "检测到液位异常，需人工确认"
        );
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::SystemCategory;
    use crate::engine::normalizer::local_midnight_ms;
    use chrono::NaiveDate;

    fn ts(d: u32) -> i64 {
        local_midnight_ms(NaiveDate::from_ymd_opt(2024, 5, d).unwrap())
    }

    fn reading(id: &str, day: u32, volume: f64, added: f64) -> Reading {
        Reading {
            id: id.to_string(),
            tank_id: "T1".to_string(),
            timestamp: ts(day),
            level_cm: 0.0,
            calculated_volume: volume,
            calculated_weight_kg: volume,
            applied_specific_gravity: 1.0,
            supply_id: None,
            added_amount_liters: added,
            operator_name: None,
        }
    }

    fn tank(capacity: f64) -> Tank {
        let mut t = Tank::new("T1", "CT-1 缓蚀剂", SystemCategory::Cooling);
        t.capacity_liters = Some(capacity);
        t
    }

    #[test]
    fn test_threshold_is_strict() {
        // 容量 1000 × 30% = 300
        assert_eq!(classify_change(300.0, 1.0, 300.0, 12.0), None);
        assert_eq!(
            classify_change(300.01, 1.0, 300.0, 12.0),
            Some(ChangeClass::AbnormalConsumption)
        );
        assert_eq!(daily_threshold(&tank(1000.0), &DosingSettings::default()), 300.0);
    }

    #[test]
    fn test_refill_requires_twelve_times_threshold() {
        assert_eq!(
            classify_change(-4000.0, 1.0, 100.0, 12.0),
            Some(ChangeClass::PossibleRefill)
        );
        assert_eq!(
            classify_change(-500.0, 1.0, 100.0, 12.0),
            Some(ChangeClass::AbnormalConsumption)
        );
        // 大幅下降永远不是补药
        assert_eq!(
            classify_change(4000.0, 1.0, 100.0, 12.0),
            Some(ChangeClass::AbnormalConsumption)
        );
    }

    #[test]
    fn test_change_averaged_over_days() {
        // 900 / 3 = 300 → 不告警
        assert_eq!(classify_change(900.0, 3.0, 300.0, 12.0), None);
        assert_eq!(classify_change(900.0, 0.0, 300.0, 12.0), None);
    }

    #[test]
    fn test_detect_against_existing_predecessor() {
        let existing = vec![reading("E1", 1, 5000.0, 0.0), reading("E2", 2, 4900.0, 0.0)];
        let candidates = vec![reading("N1", 3, 4000.0, 0.0)];
        let report = detect_anomalies(&candidates, &existing, &[tank(1000.0)], &DosingSettings::default());

        assert_eq!(report.len(), 1);
        let a = &report.anomalies[0];
        assert_eq!(a.reading_id, "N1");
        assert_eq!(a.prev_value, 4900.0);
        assert_eq!(a.current_value, 4000.0);
        assert_eq!(a.next_value, None);
        assert_eq!(a.class, ChangeClass::AbnormalConsumption);
        assert!(a.message.contains("900.0"));
        assert!(a.message.contains("300.0"));
    }

    #[test]
    fn test_candidate_replaces_same_day_existing() {
        // 既有 5/2 读数 1000 L 被同日新读数 4850 L 取代，不应与旧值比较
        let existing = vec![
            reading("E1", 1, 5000.0, 0.0),
            reading("E2", 2, 1000.0, 0.0),
            reading("E3", 3, 4700.0, 0.0),
        ];
        let candidates = vec![reading("N2", 2, 4850.0, 0.0)];
        let report = detect_anomalies(&candidates, &existing, &[tank(1000.0)], &DosingSettings::default());
        assert!(report.is_empty());
    }

    #[test]
    fn test_added_amount_explains_rise() {
        let existing = vec![reading("E1", 1, 1000.0, 0.0)];
        let candidates = vec![reading("N1", 2, 4800.0, 4000.0)];
        let report = detect_anomalies(&candidates, &existing, &[tank(1000.0)], &DosingSettings::default());
        assert!(report.is_empty());
    }

    #[test]
    fn test_large_rise_flagged_as_refill_with_next_value() {
        let existing = vec![reading("E1", 1, 500.0, 0.0), reading("E3", 5, 8900.0, 0.0)];
        let candidates = vec![reading("N1", 2, 9500.0, 0.0)];
        let mut settings = DosingSettings::default();
        settings.anomaly_message_template = Some("{text}: {diff}/{limit} {unit}".to_string());

        let report = detect_anomalies(&candidates, &existing, &[tank(2000.0)], &settings);
        assert_eq!(report.len(), 1);
        let a = &report.anomalies[0];
        assert!(a.is_possible_refill());
        assert_eq!(a.next_value, Some(8900.0));
        assert!(a.message.ends_with("9000.0/600.0 L"));

        let alerts = report.to_alerts(chrono::Local::now().naive_local());
        assert_eq!(alerts.len(), 1);
        assert!(alerts[0].is_possible_refill);
        assert_eq!(alerts[0].reading_id, "N1");
    }

    #[test]
    fn test_first_reading_has_no_predecessor() {
        let candidates = vec![reading("N1", 1, 9000.0, 0.0)];
        let report = detect_anomalies(&candidates, &[], &[tank(1000.0)], &DosingSettings::default());
        assert!(report.is_empty());
    }
}
