// ==========================================
// 加药管理系统 - 理论用量计算
// ==========================================
// CWS_BLOWDOWN（冷却水排放量模型）:
//   蒸发量 E = 循环量 × 温差 × 1.8 × 24 × 天数 / 1000 (m³)
//   浓缩倍数 C = 冷却水硬度 / 补充水硬度 → 人工设定倍数(>1) → 1
//   排放量 B = E / (C − 1)，C ≤ 1 时为 0
//   理论药量 (kg) = B × 目标 ppm / 1000
// BWS_STEAM（锅炉蒸汽量模型）:
//   日蒸汽量 = 周蒸汽量 / 7，理论药量 (kg) = 日蒸汽量 × ppm / 1000
// ==========================================
// 红线: 月/周合计一律逐日累加（每天各自查覆盖周参数与当日合约）
//       无参数覆盖的日期记 0，未来日期跳过
// ==========================================

use crate::domain::params::{BwsParameterRecord, CwsParameterRecord};
use crate::domain::supply::ChemicalSupply;
use crate::domain::tank::Tank;
use crate::domain::types::{CalculationMethod, UsageMetric};
use crate::engine::fallback::FallbackChain;
use crate::engine::normalizer::{day_of, local_midnight_ms};
use crate::engine::supply_resolver::SupplyTimeline;
use chrono::{Datelike, Duration, NaiveDate};

/// 经验蒸发系数
pub const EVAPORATION_COEFFICIENT: f64 = 1.8;

// ==========================================
// 公式
// ==========================================

/// 浓缩倍数
pub fn concentration_cycles(record: &CwsParameterRecord) -> f64 {
    match (record.cws_hardness, record.makeup_hardness) {
        (Some(cws), Some(makeup)) if makeup > 0.0 => cws / makeup,
        _ => match record.concentration_cycles {
            Some(c) if c > 1.0 => c,
            _ => 1.0,
        },
    }
}

/// 蒸发量 (m³)
pub fn evaporation_m3(circulation_rate: f64, temp_diff: f64, period_days: f64) -> f64 {
    circulation_rate * temp_diff * EVAPORATION_COEFFICIENT * 24.0 * period_days / 1000.0
}

/// 排放量 (m³)，浓缩倍数 ≤ 1 时无法计算排放，记 0
pub fn blowdown_m3(evaporation: f64, cycles: f64) -> f64 {
    if cycles > 1.0 {
        evaporation / (cycles - 1.0)
    } else {
        0.0
    }
}

/// 冷却水理论药量 (kg)；循环量或温差缺失时为 0
pub fn cws_blowdown_kg(record: &CwsParameterRecord, period_days: f64, target_ppm: f64) -> f64 {
    let (rate, temp_diff) = match (record.circulation_rate, record.effective_temp_diff()) {
        (Some(rate), Some(diff)) => (rate, diff),
        _ => return 0.0,
    };
    let evaporation = evaporation_m3(rate, temp_diff, period_days);
    blowdown_m3(evaporation, concentration_cycles(record)) * target_ppm / 1000.0
}

/// 锅炉理论药量 (kg)
pub fn bws_steam_kg(record: &BwsParameterRecord, period_days: f64, target_ppm: f64) -> f64 {
    let daily_steam = record.steam_production.unwrap_or(0.0) / 7.0;
    daily_steam * period_days * target_ppm / 1000.0
}

/// 实际 vs 理论偏差 %，理论为 0 时记 0
pub fn deviation_pct(actual: f64, theoretical: f64) -> f64 {
    if theoretical == 0.0 {
        0.0
    } else {
        (actual - theoretical) / theoretical * 100.0
    }
}

/// 覆盖某日的周参数: week_start ≤ day < week_start + 7 天，多笔时取较晚者
///
/// 按日历日比较（夏令时切换周的毫秒跨度不等于 7 × 24h）
fn covering<T>(records: &[T], week_start_of: impl Fn(&T) -> i64, day: NaiveDate) -> Option<&T> {
    records
        .iter()
        .filter(|r| {
            let start = day_of(week_start_of(r));
            start <= day && day < start + Duration::days(7)
        })
        .max_by_key(|r| week_start_of(r))
}

// ==========================================
// TheoreticalCalculator - 单一储槽逐日理论用量
// ==========================================
pub struct TheoreticalCalculator<'a> {
    tank: &'a Tank,
    supplies: &'a SupplyTimeline,
    cws: &'a [CwsParameterRecord],
    bws: &'a [BwsParameterRecord],
    today: NaiveDate,
}

struct DayContext<'a> {
    contract: Option<&'a ChemicalSupply>,
    inherited: Option<f64>,
    record_ppm: Option<f64>,
}

impl<'a> TheoreticalCalculator<'a> {
    pub fn new(
        tank: &'a Tank,
        supplies: &'a SupplyTimeline,
        cws: &'a [CwsParameterRecord],
        bws: &'a [BwsParameterRecord],
        today: NaiveDate,
    ) -> Self {
        Self {
            tank,
            supplies,
            cws,
            bws,
            today,
        }
    }

    /// 单日理论用量（按口径换算）
    pub fn daily(&self, day: NaiveDate, metric: UsageMetric) -> f64 {
        if day > self.today {
            return 0.0;
        }
        let day_ms = local_midnight_ms(day);
        let contract = self.supplies.active_at(&self.tank.id, day_ms);

        let (kg_per_ppm, record_ppm) = match self.tank.calculation_method {
            CalculationMethod::None => return 0.0,
            CalculationMethod::CwsBlowdown => {
                match covering(self.cws, |r: &CwsParameterRecord| r.date, day) {
                    Some(rec) => (cws_blowdown_kg(rec, 1.0, 1.0), rec.target_ppm),
                    None => return 0.0,
                }
            }
            CalculationMethod::BwsSteam => {
                match covering(self.bws, |r: &BwsParameterRecord| r.date, day) {
                    Some(rec) => (bws_steam_kg(rec, 1.0, 1.0), rec.target_ppm),
                    None => return 0.0,
                }
            }
        };

        let ctx = DayContext {
            contract,
            inherited: self.supplies.inherited_ppm(&self.tank.id, day_ms),
            record_ppm,
        };
        let ppm = match ppm_chain().resolve(&ctx) {
            Some(resolved) => resolved.value,
            None => return 0.0,
        };
        let kg = kg_per_ppm * ppm;

        match metric {
            UsageMetric::Weight => kg,
            UsageMetric::Volume => match contract.map(|c| c.specific_gravity) {
                Some(sg) if sg > 0.0 => kg / sg,
                _ => kg,
            },
            UsageMetric::Cost => kg * contract.and_then(|c| c.price).unwrap_or(0.0),
        }
    }

    /// [start, end] 逐日合计
    pub fn range_total(&self, start: NaiveDate, end: NaiveDate, metric: UsageMetric) -> f64 {
        let mut total = 0.0;
        let mut day = start;
        while day <= end {
            total += self.daily(day, metric);
            day += Duration::days(1);
        }
        total
    }

    /// 周合计（week_start 起 7 天）
    pub fn weekly(&self, week_start: NaiveDate, metric: UsageMetric) -> f64 {
        self.range_total(week_start, week_start + Duration::days(6), metric)
    }

    /// 月合计；clip 给定时只累加落在 clip 范围内的日期
    pub fn monthly(
        &self,
        year: i32,
        month: u32,
        metric: UsageMetric,
        clip: Option<(NaiveDate, NaiveDate)>,
    ) -> f64 {
        let (first, last) = match month_bounds(year, month) {
            Some(bounds) => bounds,
            None => return 0.0,
        };
        let (start, end) = match clip {
            Some((clip_start, clip_end)) => (first.max(clip_start), last.min(clip_end)),
            None => (first, last),
        };
        if start > end {
            return 0.0;
        }
        self.range_total(start, end, metric)
    }
}

/// 当日 ppm: 当日合约 → 较早合约继承 → 周参数记录
fn ppm_chain<'a>() -> FallbackChain<'a, DayContext<'a>, f64> {
    FallbackChain::<'a, DayContext<'a>, f64>::new()
        .then("contract", |ctx| ctx.contract.and_then(|c| c.target_ppm))
        .then("inherited", |ctx| ctx.inherited)
        .then("param_record", |ctx| ctx.record_ppm)
}

/// 月份首末日
pub fn month_bounds(year: i32, month: u32) -> Option<(NaiveDate, NaiveDate)> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next_first = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    Some((first, next_first.pred_opt()?))
}

/// 日期所在 (年, 月)
pub fn year_month(day: NaiveDate) -> (i32, u32) {
    (day.year(), day.month())
}
