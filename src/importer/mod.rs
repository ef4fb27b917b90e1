// ==========================================
// 加药管理系统 - 导入层
// ==========================================
// 职责: 表格文件 → 强类型记录 → 导入计划（待确认）；读数导出
// 支持: Excel (.xlsx/.xls), CSV
// 红线: 导入层不写库，落库由 API 层在确认后执行
// ==========================================

pub mod error;
pub mod exporter;
pub mod field_mapper;
pub mod file_parser;
pub mod level_importer;
pub mod param_importer;
pub mod supply_importer;
pub mod tank_lookup;

// 重导出核心类型
pub use error::{ImportError, ImportResult};
pub use exporter::{export_readings, write_readings_csv};
pub use field_mapper::{MappedSheet, RowIssue};
pub use file_parser::{CsvParser, ExcelParser, FileParser, RawRow, RawSheet, UniversalFileParser};
pub use level_importer::{LevelImportPlan, LevelImporter, LowLevelWarning};
pub use param_importer::{ParamImportPlan, ParamImporter};
pub use supply_importer::{check_specific_gravity, SgWarning, SupplyImportPlan, SupplyImporter};
pub use tank_lookup::TankLookup;
