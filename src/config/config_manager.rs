// ==========================================
// 加药管理系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写
// 存储: config_kv 表 (key-value + scope)，目前只用 global scope
// ==========================================

use crate::config::settings::{DosingSettings, DEFAULT_REFILL_MULTIPLIER, DEFAULT_USAGE_WINDOW_DAYS};
use crate::db::{configure_sqlite_connection, open_sqlite_connection};
use crate::domain::tank::DEFAULT_VALIDATION_THRESHOLD_PCT;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection};
use serde_json::json;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::warn;

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径（须已建表）
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 会对传入连接再次应用统一 PRAGMA（幂等）
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        {
            let guard = conn
                .lock()
                .map_err(|e| RepositoryError::LockError(e.to_string()))?;
            configure_sqlite_connection(&guard)?;
        }
        Ok(Self { conn })
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 读取 global scope 的配置值
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    pub fn get_config_value(&self, key: &str) -> RepositoryResult<Option<String>> {
        let conn = self.get_conn()?;
        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 写入 global scope 的配置值（UPSERT）
    pub fn set_config_value(&self, key: &str, value: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn delete_config_value(&self, key: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "DELETE FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
        )?;
        Ok(())
    }

    /// 解析数值型配置，缺失或格式错误时取默认值
    fn get_parsed_or<T: FromStr + Copy>(&self, key: &str, default: T) -> RepositoryResult<T> {
        let Some(raw) = self.get_config_value(key)? else {
            return Ok(default);
        };
        match raw.trim().parse::<T>() {
            Ok(v) => Ok(v),
            Err(_) => {
                warn!(config_key = key, value = %raw, "配置值格式错误，使用默认值");
                Ok(default)
            }
        }
    }

    /// 读取计算设置
    pub fn load_settings(&self) -> RepositoryResult<DosingSettings> {
        let template = self
            .get_config_value(config_keys::ANOMALY_MESSAGE_TEMPLATE)?
            .filter(|t| !t.trim().is_empty());
        let locale = self
            .get_config_value(config_keys::LOCALE)?
            .filter(|l| !l.trim().is_empty())
            .unwrap_or_else(|| DosingSettings::default().locale);

        Ok(DosingSettings {
            anomaly_message_template: template,
            default_threshold_pct: self
                .get_parsed_or(config_keys::DEFAULT_THRESHOLD_PCT, DEFAULT_VALIDATION_THRESHOLD_PCT)?,
            refill_multiplier: self.get_parsed_or(config_keys::REFILL_MULTIPLIER, DEFAULT_REFILL_MULTIPLIER)?,
            usage_window_days: self.get_parsed_or(config_keys::USAGE_WINDOW_DAYS, DEFAULT_USAGE_WINDOW_DAYS)?,
            locale,
        })
    }

    /// 保存计算设置；模板为 None 时删除该键
    pub fn save_settings(&self, settings: &DosingSettings) -> RepositoryResult<()> {
        match &settings.anomaly_message_template {
            Some(t) => self.set_config_value(config_keys::ANOMALY_MESSAGE_TEMPLATE, t)?,
            None => self.delete_config_value(config_keys::ANOMALY_MESSAGE_TEMPLATE)?,
        }
        self.set_config_value(
            config_keys::DEFAULT_THRESHOLD_PCT,
            &settings.default_threshold_pct.to_string(),
        )?;
        self.set_config_value(config_keys::REFILL_MULTIPLIER, &settings.refill_multiplier.to_string())?;
        self.set_config_value(config_keys::USAGE_WINDOW_DAYS, &settings.usage_window_days.to_string())?;
        self.set_config_value(config_keys::LOCALE, &settings.locale)?;
        Ok(())
    }

    /// 所有 global 配置的快照（JSON）
    pub fn get_config_snapshot(&self) -> RepositoryResult<String> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;

        let mut config_map: HashMap<String, String> = HashMap::new();
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;
        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        serde_json::to_string(&json!(config_map)).map_err(|e| RepositoryError::Other(e.into()))
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    pub const ANOMALY_MESSAGE_TEMPLATE: &str = "anomaly_message_template";
    pub const DEFAULT_THRESHOLD_PCT: &str = "default_threshold_pct";
    pub const REFILL_MULTIPLIER: &str = "refill_multiplier";
    pub const USAGE_WINDOW_DAYS: &str = "usage_window_days";
    pub const LOCALE: &str = "locale";
}
