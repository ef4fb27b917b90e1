// ==========================================
// 加药管理系统 - 用量重建
// ==========================================
// 输入: 单一储槽按时间排序的读数（含窗口前后各一笔边界读数）
// 输出: 日历日 → {日用量, 液位}
// 规则:
// - 相邻两笔读数之间的用量平均分摊到 [prev, next) 的每一天
// - 净液位上升且无补药记录 → 日用量记 0（不记负用量）
// - 成本口径按"每一天"各自的生效合约单价计价
// - 不在任何区间内的日期不产生条目（缺值而非 0）
// ==========================================

use crate::domain::reading::Reading;
use crate::domain::types::UsageMetric;
use crate::engine::normalizer::{day_of, diff_days, local_midnight_ms};
use crate::engine::supply_resolver::SupplyTimeline;
use chrono::{Duration, NaiveDate};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, instrument};

/// 单日用量
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DailyUsage {
    pub usage: f64,
    /// 该日有读数时为读数液位 (cm)
    pub level: Option<f64>,
}

/// 日历日 → 单日用量
pub type DailySeries = BTreeMap<NaiveDate, DailyUsage>;

/// 截取窗口读数
///
/// 返回单一储槽在 [start_ms, end_ms] 内的读数，
/// 外加窗口前最近一笔与窗口后最近一笔，保证边界区间连续
pub fn select_window(readings: &[Reading], tank_id: &str, start_ms: i64, end_ms: i64) -> Vec<Reading> {
    let mut tank_readings: Vec<&Reading> = readings.iter().filter(|r| r.tank_id == tank_id).collect();
    tank_readings.sort_by_key(|r| r.timestamp);

    let before = tank_readings.iter().rev().find(|r| r.timestamp < start_ms);
    let after = tank_readings.iter().find(|r| r.timestamp > end_ms);

    let mut window: Vec<Reading> = Vec::new();
    if let Some(r) = before {
        window.push((*r).clone());
    }
    window.extend(
        tank_readings
            .iter()
            .filter(|r| r.timestamp >= start_ms && r.timestamp <= end_ms)
            .map(|r| (*r).clone()),
    );
    if let Some(r) = after {
        window.push((*r).clone());
    }
    window
}

/// 读数在指定口径下的存量值
fn metric_value(reading: &Reading, metric: UsageMetric) -> f64 {
    match metric {
        UsageMetric::Volume => reading.calculated_volume,
        UsageMetric::Weight | UsageMetric::Cost => reading.calculated_weight_kg,
    }
}

/// 补药量在指定口径下的值（kg 口径用该读数快照比重换算）
fn added_in_metric(reading: &Reading, metric: UsageMetric) -> f64 {
    match metric {
        UsageMetric::Volume => reading.added_amount_liters,
        UsageMetric::Weight | UsageMetric::Cost => reading.added_amount_kg(),
    }
}

/// 区间日均用量: max(0, (start + added − end) / days)
pub fn interval_daily_usage(prev: &Reading, next: &Reading, metric: UsageMetric) -> Option<f64> {
    let days = diff_days(prev.timestamp, next.timestamp);
    if days <= 0.0 {
        return None;
    }
    let total = metric_value(prev, metric) + added_in_metric(next, metric) - metric_value(next, metric);
    Some((total / days).max(0.0))
}

/// 重建日用量序列
#[instrument(skip(readings, supplies), fields(count = readings.len()))]
pub fn reconstruct_daily_usage(
    readings: &[Reading],
    metric: UsageMetric,
    supplies: &SupplyTimeline,
) -> DailySeries {
    let mut sorted: Vec<&Reading> = readings.iter().collect();
    sorted.sort_by_key(|r| r.timestamp);

    let mut series = DailySeries::new();
    for pair in sorted.windows(2) {
        let (prev, next) = (pair[0], pair[1]);
        let daily = match interval_daily_usage(prev, next, metric) {
            Some(v) => v,
            None => {
                debug!(tank_id = %prev.tank_id, "跳过非递增读数区间");
                continue;
            }
        };

        let prev_day = day_of(prev.timestamp);
        let mut day = prev_day;
        while local_midnight_ms(day) < next.timestamp {
            let usage = match metric {
                UsageMetric::Cost => {
                    let price = supplies
                        .active_at(&prev.tank_id, local_midnight_ms(day))
                        .and_then(|s| s.price)
                        .unwrap_or(0.0);
                    daily * price
                }
                _ => daily,
            };
            let level = if day == prev_day { Some(prev.level_cm) } else { None };
            series.insert(day, DailyUsage { usage, level });
            day += Duration::days(1);
        }
    }
    series
}
