// ==========================================
// 加药管理系统 - 存储服务接口
// ==========================================
// 职责: 按实体提供 CRUD，后写覆盖先写
// 红线: 不含业务逻辑（比重重算、异常检测均在引擎层）
// ==========================================

use crate::domain::annotation::{FluctuationAlert, ImportantNote};
use crate::domain::params::{BwsParameterRecord, CwsParameterRecord};
use crate::domain::reading::Reading;
use crate::domain::supply::ChemicalSupply;
use crate::domain::tank::Tank;
use crate::repository::error::RepositoryResult;
use async_trait::async_trait;

#[async_trait]
pub trait StorageService: Send + Sync {
    // ===== 储槽 =====

    /// 全部储槽（按排序顺序）
    async fn get_tanks(&self) -> RepositoryResult<Vec<Tank>>;

    async fn save_tank(&self, tank: &Tank) -> RepositoryResult<()>;

    /// 删除储槽，读数保留
    async fn delete_tank(&self, id: &str) -> RepositoryResult<()>;

    // ===== 液位读数 =====

    /// 读数（timestamp 升序）；tank_id 为空时返回全部
    async fn get_readings(&self, tank_id: Option<&str>) -> RepositoryResult<Vec<Reading>>;

    async fn save_reading(&self, reading: &Reading) -> RepositoryResult<()>;

    /// 批量保存，返回写入笔数
    async fn save_readings_batch(&self, readings: &[Reading]) -> RepositoryResult<usize>;

    async fn update_reading(&self, reading: &Reading) -> RepositoryResult<()>;

    async fn delete_reading(&self, id: &str) -> RepositoryResult<()>;

    // ===== 药剂合约 =====

    /// 合约（start_date 升序）；tank_id 为空时返回全部
    async fn get_supplies(&self, tank_id: Option<&str>) -> RepositoryResult<Vec<ChemicalSupply>>;

    /// 保存合约，同储槽同生效日已存在时覆盖；返回落库 id
    async fn save_supply(&self, supply: &ChemicalSupply) -> RepositoryResult<String>;

    async fn update_supply(&self, supply: &ChemicalSupply) -> RepositoryResult<()>;

    async fn add_supplies_batch(&self, supplies: &[ChemicalSupply]) -> RepositoryResult<Vec<String>>;

    /// 指定时刻生效的合约
    async fn get_active_supply(&self, tank_id: &str, timestamp: i64) -> RepositoryResult<Option<ChemicalSupply>>;

    // ===== 冷却水参数 =====

    async fn get_cws_params_history(&self, tank_id: Option<&str>) -> RepositoryResult<Vec<CwsParameterRecord>>;

    async fn save_cws_param(&self, record: &CwsParameterRecord) -> RepositoryResult<()>;

    async fn update_cws_param_record(&self, record: &CwsParameterRecord) -> RepositoryResult<()>;

    async fn delete_cws_param_record(&self, id: &str) -> RepositoryResult<()>;

    // ===== 锅炉水参数 =====

    async fn get_bws_params_history(&self, tank_id: Option<&str>) -> RepositoryResult<Vec<BwsParameterRecord>>;

    async fn save_bws_param(&self, record: &BwsParameterRecord) -> RepositoryResult<()>;

    async fn update_bws_param_record(&self, record: &BwsParameterRecord) -> RepositoryResult<()>;

    async fn delete_bws_param_record(&self, id: &str) -> RepositoryResult<()>;

    // ===== 异常纪录 / 备注 =====

    async fn save_alerts_batch(&self, alerts: &[FluctuationAlert]) -> RepositoryResult<usize>;

    async fn get_alerts(&self, tank_id: Option<&str>) -> RepositoryResult<Vec<FluctuationAlert>>;

    async fn save_note(&self, note: &ImportantNote) -> RepositoryResult<()>;

    async fn get_notes(&self, tank_id: Option<&str>) -> RepositoryResult<Vec<ImportantNote>>;

    async fn delete_note(&self, id: &str) -> RepositoryResult<()>;
}
