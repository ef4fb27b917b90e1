// ==========================================
// 加药管理系统 - API 层
// ==========================================
// 职责: 面向操作界面/命令行的业务流程接口
// ==========================================

pub mod dosing_api;
pub mod error;

// 重导出核心类型
pub use dosing_api::{
    DosingApi, LevelImportSummary, ParamImportSummary, SupplyImportSummary, SupplySaveOutcome,
};
pub use error::{ApiError, ApiResult};
