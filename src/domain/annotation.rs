// ==========================================
// 加药管理系统 - 注记与波动警报
// ==========================================
// FluctuationAlert: 异常检测经人工确认后的审计记录
// ImportantNote: 操作员备注
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FluctuationAlert {
    pub id: String,
    pub tank_id: String,
    pub tank_name: String,
    pub reading_id: String,
    pub date_str: String,
    pub reason: String,
    pub current_value: f64,
    pub prev_value: f64,
    pub next_value: Option<f64>,
    pub is_possible_refill: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportantNote {
    pub id: String,
    pub tank_id: Option<String>,
    pub date: i64,
    pub area: Option<String>,
    pub chemical_name: Option<String>,
    pub note: String,
    pub created_at: NaiveDateTime,
}
