// ==========================================
// 加药管理系统 - 用量报表
// ==========================================
// 单一储槽 + 单一口径（L / kg / 成本）:
// - 日序列: 扩展至整周的范围
// - 周序列: 实际 vs 理论 + 偏差
// - 月序列: 实际 vs 理论 + 偏差（严格范围）
// ==========================================

use crate::domain::params::{BwsParameterRecord, CwsParameterRecord};
use crate::domain::reading::Reading;
use crate::domain::tank::Tank;
use crate::domain::types::UsageMetric;
use crate::engine::aggregator::{aggregate_monthly, aggregate_weekly, extend_to_full_weeks};
use crate::engine::consumption::{reconstruct_daily_usage, select_window};
use crate::engine::normalizer::local_midnight_ms;
use crate::engine::supply_resolver::SupplyTimeline;
use crate::engine::theoretical::{deviation_pct, TheoreticalCalculator};
use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, instrument};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyPoint {
    pub date: NaiveDate,
    pub usage: f64,
    pub level: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeeklyPoint {
    pub week_start: NaiveDate,
    pub actual: f64,
    pub theoretical: f64,
    pub deviation_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyPoint {
    pub year: i32,
    pub month: u32,
    pub actual: f64,
    pub theoretical: f64,
    pub deviation_pct: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct UsageReport {
    pub tank_id: String,
    pub tank_name: String,
    pub metric: UsageMetric,
    pub unit: &'static str,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub daily: Vec<DailyPoint>,
    pub weekly: Vec<WeeklyPoint>,
    pub monthly: Vec<MonthlyPoint>,
}

impl UsageReport {
    /// 严格范围内的实际合计
    pub fn total_actual(&self) -> f64 {
        self.monthly.iter().map(|m| m.actual).sum()
    }

    pub fn total_theoretical(&self) -> f64 {
        self.monthly.iter().map(|m| m.theoretical).sum()
    }
}

/// 报表所需的全部输入（由调用方一次性取好）
pub struct UsageReportInput<'a> {
    pub tank: &'a Tank,
    pub readings: &'a [Reading],
    pub supplies: &'a SupplyTimeline,
    pub cws_history: &'a [CwsParameterRecord],
    pub bws_history: &'a [BwsParameterRecord],
}

/// 生成用量报表
#[instrument(skip(input), fields(tank_id = %input.tank.id, metric = %metric))]
pub fn build_usage_report(
    input: &UsageReportInput<'_>,
    start: NaiveDate,
    end: NaiveDate,
    metric: UsageMetric,
    today: NaiveDate,
) -> UsageReport {
    let tank = input.tank;
    let (ext_start, ext_end) = extend_to_full_weeks(start, end);

    let window = select_window(
        input.readings,
        &tank.id,
        local_midnight_ms(ext_start),
        local_midnight_ms(ext_end),
    );
    let series = reconstruct_daily_usage(&window, metric, input.supplies);

    let calculator = TheoreticalCalculator::new(
        tank,
        input.supplies,
        input.cws_history,
        input.bws_history,
        today,
    );

    let daily: Vec<DailyPoint> = series
        .range(ext_start..=ext_end)
        .map(|(date, usage)| DailyPoint {
            date: *date,
            usage: usage.usage,
            level: usage.level,
        })
        .collect();

    let weekly: Vec<WeeklyPoint> = aggregate_weekly(&series, start, end)
        .into_iter()
        .map(|bucket| {
            let theoretical = calculator.weekly(bucket.week_start, metric);
            WeeklyPoint {
                week_start: bucket.week_start,
                actual: bucket.total,
                theoretical,
                deviation_pct: deviation_pct(bucket.total, theoretical),
            }
        })
        .collect();

    let monthly: Vec<MonthlyPoint> = aggregate_monthly(&series, start, end)
        .into_iter()
        .map(|bucket| {
            let theoretical =
                calculator.monthly(bucket.year, bucket.month, metric, Some((start, end)));
            MonthlyPoint {
                year: bucket.year,
                month: bucket.month,
                actual: bucket.total,
                theoretical,
                deviation_pct: deviation_pct(bucket.total, theoretical),
            }
        })
        .collect();

    info!(
        days = daily.len(),
        weeks = weekly.len(),
        months = monthly.len(),
        "用量报表生成完成"
    );

    UsageReport {
        tank_id: tank.id.clone(),
        tank_name: tank.name.clone(),
        metric,
        unit: metric.unit(),
        start,
        end,
        daily,
        weekly,
        monthly,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::supply::ChemicalSupply;
    use crate::domain::types::{CalculationMethod, SystemCategory};
    use chrono::Duration;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn reading(day: NaiveDate, volume: f64) -> Reading {
        Reading {
            id: format!("R-{}", day),
            tank_id: "B1".to_string(),
            timestamp: local_midnight_ms(day),
            level_cm: volume / 10.0,
            calculated_volume: volume,
            calculated_weight_kg: volume,
            applied_specific_gravity: 1.0,
            supply_id: None,
            added_amount_liters: 0.0,
            operator_name: None,
        }
    }

    #[test]
    fn test_report_actual_vs_theoretical() {
        let mut tank = Tank::new("B1", "锅炉清罐剂", SystemCategory::Boiler);
        tank.calculation_method = CalculationMethod::BwsSteam;

        // 5/6 ~ 5/20 每天消耗 2 kg
        let readings = vec![reading(ymd(2024, 5, 6), 100.0), reading(ymd(2024, 5, 20), 72.0)];
        let supplies = SupplyTimeline::new(&[ChemicalSupply {
            id: "S1".to_string(),
            tank_id: "B1".to_string(),
            supplier_name: "供应商".to_string(),
            chemical_name: "清罐剂".to_string(),
            specific_gravity: 1.0,
            price: Some(30.0),
            start_date: local_midnight_ms(ymd(2024, 1, 1)),
            target_ppm: Some(20.0),
            notes: None,
        }]);
        // 周蒸汽 700 t → 理论 2 kg/天
        let bws = vec![
            BwsParameterRecord {
                id: "W1".to_string(),
                tank_id: "B1".to_string(),
                date: local_midnight_ms(ymd(2024, 5, 6)),
                steam_production: Some(700.0),
                target_ppm: None,
            },
            BwsParameterRecord {
                id: "W2".to_string(),
                tank_id: "B1".to_string(),
                date: local_midnight_ms(ymd(2024, 5, 13)),
                steam_production: Some(1400.0),
                target_ppm: None,
            },
        ];
        let input = UsageReportInput {
            tank: &tank,
            readings: &readings,
            supplies: &supplies,
            cws_history: &[],
            bws_history: &bws,
        };

        let report = build_usage_report(
            &input,
            ymd(2024, 5, 8),
            ymd(2024, 5, 14),
            UsageMetric::Weight,
            ymd(2024, 12, 31),
        );

        assert_eq!(report.unit, "kg");
        assert_eq!(report.weekly.len(), 2);
        assert!((report.weekly[0].actual - 14.0).abs() < 1e-9);
        assert!((report.weekly[0].theoretical - 14.0).abs() < 1e-9);
        assert_eq!(report.weekly[0].deviation_pct, 0.0);
        assert!((report.weekly[1].theoretical - 28.0).abs() < 1e-9);
        assert!((report.weekly[1].deviation_pct + 50.0).abs() < 1e-9);

        // 月: 5/8 ~ 5/14 实际 7 天 × 2，理论 5/8~5/12 × 2 + 5/13~5/14 × 4
        assert_eq!(report.monthly.len(), 1);
        assert!((report.total_actual() - 14.0).abs() < 1e-9);
        assert!((report.total_theoretical() - 18.0).abs() < 1e-9);

        // 日序列覆盖扩展后的整周
        assert_eq!(report.daily.first().map(|d| d.date), Some(ymd(2024, 5, 6)));
        assert_eq!(
            report.daily.last().map(|d| d.date),
            Some(ymd(2024, 5, 6) + Duration::days(13))
        );
    }
}
