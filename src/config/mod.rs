// ==========================================
// 加药管理系统 - 配置层
// ==========================================
// 职责: 计算设置的定义与持久化
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod settings;

// 重导出核心配置类型
pub use config_manager::{config_keys, ConfigManager};
pub use settings::{DosingSettings, DEFAULT_REFILL_MULTIPLIER, DEFAULT_USAGE_WINDOW_DAYS};
