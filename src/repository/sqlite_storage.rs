// ==========================================
// 加药管理系统 - SQLite 存储服务实现
// ==========================================
// 所有仓储共享同一个 Arc<Mutex<Connection>>
// ==========================================

use crate::db::{configure_sqlite_connection, init_schema, open_sqlite_connection};
use crate::domain::annotation::{FluctuationAlert, ImportantNote};
use crate::domain::params::{BwsParameterRecord, CwsParameterRecord};
use crate::domain::reading::Reading;
use crate::domain::supply::ChemicalSupply;
use crate::domain::tank::Tank;
use crate::repository::annotation_repo::{AlertRepository, NoteRepository};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::param_repo::ParamRepository;
use crate::repository::reading_repo::ReadingRepository;
use crate::repository::storage::StorageService;
use crate::repository::supply_repo::SupplyRepository;
use crate::repository::tank_repo::TankRepository;
use async_trait::async_trait;
use rusqlite::Connection;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

pub struct SqliteStorage {
    tanks: TankRepository,
    readings: ReadingRepository,
    supplies: SupplyRepository,
    params: ParamRepository,
    alerts: AlertRepository,
    notes: NoteRepository,
}

impl SqliteStorage {
    /// 打开（或创建）数据库文件并建表
    pub fn open(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;
        init_schema(&conn)?;
        info!(db_path, "数据库已就绪");
        Ok(Self::build(Arc::new(Mutex::new(conn))))
    }

    /// 从已有连接创建（重新应用 PRAGMA 并建表）
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        {
            let guard = conn
                .lock()
                .map_err(|e| RepositoryError::LockError(e.to_string()))?;
            configure_sqlite_connection(&guard)?;
            init_schema(&guard)?;
        }
        Ok(Self::build(conn))
    }

    fn build(conn: Arc<Mutex<Connection>>) -> Self {
        Self {
            tanks: TankRepository::from_connection(conn.clone()),
            readings: ReadingRepository::from_connection(conn.clone()),
            supplies: SupplyRepository::from_connection(conn.clone()),
            params: ParamRepository::from_connection(conn.clone()),
            alerts: AlertRepository::from_connection(conn.clone()),
            notes: NoteRepository::from_connection(conn),
        }
    }
}

#[async_trait]
impl StorageService for SqliteStorage {
    async fn get_tanks(&self) -> RepositoryResult<Vec<Tank>> {
        self.tanks.list()
    }

    async fn save_tank(&self, tank: &Tank) -> RepositoryResult<()> {
        self.tanks.upsert(tank)
    }

    async fn delete_tank(&self, id: &str) -> RepositoryResult<()> {
        self.tanks.delete(id)
    }

    async fn get_readings(&self, tank_id: Option<&str>) -> RepositoryResult<Vec<Reading>> {
        self.readings.list(tank_id)
    }

    async fn save_reading(&self, reading: &Reading) -> RepositoryResult<()> {
        self.readings.upsert(reading)
    }

    async fn save_readings_batch(&self, readings: &[Reading]) -> RepositoryResult<usize> {
        let n = self.readings.upsert_batch(readings)?;
        debug!(count = n, "读数批量写入");
        Ok(n)
    }

    async fn update_reading(&self, reading: &Reading) -> RepositoryResult<()> {
        self.readings.update(reading)
    }

    async fn delete_reading(&self, id: &str) -> RepositoryResult<()> {
        self.readings.delete(id)
    }

    async fn get_supplies(&self, tank_id: Option<&str>) -> RepositoryResult<Vec<ChemicalSupply>> {
        self.supplies.list(tank_id)
    }

    async fn save_supply(&self, supply: &ChemicalSupply) -> RepositoryResult<String> {
        self.supplies.upsert(supply)
    }

    async fn update_supply(&self, supply: &ChemicalSupply) -> RepositoryResult<()> {
        self.supplies.update(supply)
    }

    async fn add_supplies_batch(&self, supplies: &[ChemicalSupply]) -> RepositoryResult<Vec<String>> {
        self.supplies.upsert_batch(supplies)
    }

    async fn get_active_supply(&self, tank_id: &str, timestamp: i64) -> RepositoryResult<Option<ChemicalSupply>> {
        self.supplies.find_active(tank_id, timestamp)
    }

    async fn get_cws_params_history(&self, tank_id: Option<&str>) -> RepositoryResult<Vec<CwsParameterRecord>> {
        self.params.list_cws(tank_id)
    }

    async fn save_cws_param(&self, record: &CwsParameterRecord) -> RepositoryResult<()> {
        self.params.upsert_cws(record)
    }

    async fn update_cws_param_record(&self, record: &CwsParameterRecord) -> RepositoryResult<()> {
        self.params.update_cws(record)
    }

    async fn delete_cws_param_record(&self, id: &str) -> RepositoryResult<()> {
        self.params.delete_cws(id)
    }

    async fn get_bws_params_history(&self, tank_id: Option<&str>) -> RepositoryResult<Vec<BwsParameterRecord>> {
        self.params.list_bws(tank_id)
    }

    async fn save_bws_param(&self, record: &BwsParameterRecord) -> RepositoryResult<()> {
        self.params.upsert_bws(record)
    }

    async fn update_bws_param_record(&self, record: &BwsParameterRecord) -> RepositoryResult<()> {
        self.params.update_bws(record)
    }

    async fn delete_bws_param_record(&self, id: &str) -> RepositoryResult<()> {
        self.params.delete_bws(id)
    }

    async fn save_alerts_batch(&self, alerts: &[FluctuationAlert]) -> RepositoryResult<usize> {
        self.alerts.insert_batch(alerts)
    }

    async fn get_alerts(&self, tank_id: Option<&str>) -> RepositoryResult<Vec<FluctuationAlert>> {
        self.alerts.list(tank_id)
    }

    async fn save_note(&self, note: &ImportantNote) -> RepositoryResult<()> {
        self.notes.upsert(note)
    }

    async fn get_notes(&self, tank_id: Option<&str>) -> RepositoryResult<Vec<ImportantNote>> {
        self.notes.list(tank_id)
    }

    async fn delete_note(&self, id: &str) -> RepositoryResult<()> {
        self.notes.delete(id)
    }
}
