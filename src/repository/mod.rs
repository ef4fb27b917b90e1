// ==========================================
// 加药管理系统 - 数据仓储层
// ==========================================
// 职责: 数据访问，不含业务逻辑
// 对外接口: StorageService（异步），实现: SqliteStorage
// ==========================================

pub mod annotation_repo;
pub mod error;
pub mod param_repo;
pub mod reading_repo;
pub mod sqlite_storage;
pub mod storage;
pub mod supply_repo;
pub mod tank_repo;

// 重导出核心类型
pub use annotation_repo::{AlertRepository, NoteRepository};
pub use error::{RepositoryError, RepositoryResult};
pub use param_repo::ParamRepository;
pub use reading_repo::ReadingRepository;
pub use sqlite_storage::SqliteStorage;
pub use storage::StorageService;
pub use supply_repo::SupplyRepository;
pub use tank_repo::TankRepository;
