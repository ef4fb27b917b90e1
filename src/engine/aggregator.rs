// ==========================================
// 加药管理系统 - 周/月聚合
// ==========================================
// 周: 以周一为起点（周一 ~ 周日）
// 月: 按 (年, 月) 分桶，只统计严格选定范围内的日期
// 日序列的构建范围为"选定范围向两端扩展至整周"
// ==========================================

use crate::engine::consumption::DailySeries;
use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;
use std::collections::BTreeMap;

/// 所在周的周一
pub fn week_start(day: NaiveDate) -> NaiveDate {
    day - Duration::days(day.weekday().num_days_from_monday() as i64)
}

/// 选定范围扩展至完整周: (起始周周一, 结束周周日)
pub fn extend_to_full_weeks(start: NaiveDate, end: NaiveDate) -> (NaiveDate, NaiveDate) {
    (week_start(start), week_start(end) + Duration::days(6))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeeklyBucket {
    pub week_start: NaiveDate,
    pub total: f64,
    /// 有用量条目的天数（无读数覆盖的日期不计入）
    pub days_with_data: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyBucket {
    pub year: i32,
    pub month: u32,
    pub total: f64,
    pub days_with_data: usize,
}

/// 周聚合
///
/// 输出覆盖 [start, end] 扩展后的每一周，无数据的周合计为 0
pub fn aggregate_weekly(series: &DailySeries, start: NaiveDate, end: NaiveDate) -> Vec<WeeklyBucket> {
    let (first, last) = extend_to_full_weeks(start, end);

    let mut buckets: BTreeMap<NaiveDate, WeeklyBucket> = BTreeMap::new();
    let mut monday = first;
    while monday <= last {
        buckets.insert(
            monday,
            WeeklyBucket {
                week_start: monday,
                total: 0.0,
                days_with_data: 0,
            },
        );
        monday += Duration::days(7);
    }

    for (day, usage) in series.range(first..=last) {
        if let Some(bucket) = buckets.get_mut(&week_start(*day)) {
            bucket.total += usage.usage;
            bucket.days_with_data += 1;
        }
    }
    buckets.into_values().collect()
}

/// 月聚合（严格范围）
pub fn aggregate_monthly(series: &DailySeries, start: NaiveDate, end: NaiveDate) -> Vec<MonthlyBucket> {
    let mut buckets: BTreeMap<(i32, u32), MonthlyBucket> = BTreeMap::new();
    for (year, month) in months_between(start, end) {
        buckets.insert(
            (year, month),
            MonthlyBucket {
                year,
                month,
                total: 0.0,
                days_with_data: 0,
            },
        );
    }

    if start <= end {
        for (day, usage) in series.range(start..=end) {
            if let Some(bucket) = buckets.get_mut(&(day.year(), day.month())) {
                bucket.total += usage.usage;
                bucket.days_with_data += 1;
            }
        }
    }
    buckets.into_values().collect()
}

/// [start, end] 跨越的所有 (年, 月)，升序
pub fn months_between(start: NaiveDate, end: NaiveDate) -> Vec<(i32, u32)> {
    let mut months = Vec::new();
    if start > end {
        return months;
    }
    let (mut year, mut month) = (start.year(), start.month());
    while (year, month) <= (end.year(), end.month()) {
        months.push((year, month));
        if month == 12 {
            year += 1;
            month = 1;
        } else {
            month += 1;
        }
    }
    months
}
