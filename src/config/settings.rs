// ==========================================
// 加药管理系统 - 计算设置
// ==========================================
// 显式传入各计算函数的设置对象（不使用全局单例）
// 持久化于 config_kv，见 ConfigManager::load_settings
// ==========================================

use crate::domain::tank::DEFAULT_VALIDATION_THRESHOLD_PCT;
use serde::{Deserialize, Serialize};

/// 判定"可能补药"的倍数（相对日阈值）
pub const DEFAULT_REFILL_MULTIPLIER: f64 = 12.0;

/// 用量图表默认窗口天数
pub const DEFAULT_USAGE_WINDOW_DAYS: i64 = 90;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DosingSettings {
    /// 异常提示模板，支持 {diff} {limit} {unit} {text}；None 时使用内置中文提示
    pub anomaly_message_template: Option<String>,
    /// 储槽未设定阈值时的默认百分比
    pub default_threshold_pct: f64,
    pub refill_multiplier: f64,
    pub usage_window_days: i64,
    pub locale: String,
}

impl Default for DosingSettings {
    fn default() -> Self {
        Self {
            anomaly_message_template: None,
            default_threshold_pct: DEFAULT_VALIDATION_THRESHOLD_PCT,
            refill_multiplier: DEFAULT_REFILL_MULTIPLIER,
            usage_window_days: DEFAULT_USAGE_WINDOW_DAYS,
            locale: "zh-CN".to_string(),
        }
    }
}
