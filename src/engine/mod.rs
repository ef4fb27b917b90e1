// ==========================================
// 加药管理系统 - 引擎层
// ==========================================
// 职责: 液位换算、用量重建、异常检测、理论用量核算
// 红线: Engine 不拼 SQL，只处理已取好的记录集；今天日期由调用方传入
// ==========================================

pub mod aggregator;
pub mod anomaly;
pub mod consumption;
pub mod fallback;
pub mod normalizer;
pub mod recalc;
pub mod supply_resolver;
pub mod theoretical;
pub mod usage_report;
pub mod volume;

// 重导出核心引擎
pub use aggregator::{aggregate_monthly, aggregate_weekly, extend_to_full_weeks, week_start};
pub use anomaly::{detect_anomalies, Anomaly, AnomalyReport, ChangeClass};
pub use consumption::{reconstruct_daily_usage, select_window, DailySeries, DailyUsage};
pub use fallback::{FallbackChain, Resolved};
pub use normalizer::{
    local_midnight_ms, normalize_timestamp, parse_flexible_date_key, DateLike, LevelNormalizer,
};
pub use recalc::{recalc_tank_readings, recalculate_reading};
pub use supply_resolver::{get_active_supply, SupplyTimeline};
pub use theoretical::{deviation_pct, TheoreticalCalculator};
pub use usage_report::{build_usage_report, UsageReport, UsageReportInput};
pub use volume::{calculate_volume, calculate_weight, effective_capacity};
