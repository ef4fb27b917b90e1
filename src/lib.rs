// ==========================================
// 加药管理系统 - 核心库
// ==========================================
// 储槽液位、药剂合约、冷却水/锅炉水周参数
// 实际用量 vs 理论用量核算
// 技术栈: Rust + SQLite
// ==========================================

// 初始化国际化系统
rust_i18n::i18n!("locales", fallback = "zh-CN");

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 引擎层 - 纯计算
pub mod engine;

// 导入层 - 表格文件导入/导出
pub mod importer;

// 数据仓储层 - 数据访问
pub mod repository;

// 配置层 - 计算设置
pub mod config;

// API 层 - 业务流程
pub mod api;

// 数据库基础设施（连接初始化/建表）
pub mod db;

// 日志系统
pub mod logging;

// 国际化
pub mod i18n;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域
pub use domain::{
    BwsParameterRecord, ChemicalSupply, CwsParameterRecord, FluctuationAlert, ImportantNote, Reading,
    ReadingInput, SystemCategory, Tank, UsageMetric,
};

// 引擎
pub use engine::{detect_anomalies, AnomalyReport, SupplyTimeline, UsageReport};

// 配置
pub use config::{ConfigManager, DosingSettings};

// 存储
pub use repository::{SqliteStorage, StorageService};

// API
pub use api::{ApiError, ApiResult, DosingApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "加药管理系统";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
