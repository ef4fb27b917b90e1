// ==========================================
// 加药管理系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod annotation;
pub mod params;
pub mod reading;
pub mod supply;
pub mod tank;
pub mod types;

// 重导出核心类型
pub use annotation::{FluctuationAlert, ImportantNote};
pub use params::{BwsParameterRecord, CwsParameterRecord};
pub use reading::{Reading, ReadingInput};
pub use supply::ChemicalSupply;
pub use tank::{Tank, TankDimensions, DEFAULT_VALIDATION_THRESHOLD_PCT};
pub use types::{CalculationMethod, HeadType, InputUnit, ShapeType, SystemCategory, UsageMetric};
