// ==========================================
// 加药管理系统 - 液位读数领域模型
// ==========================================
// calculated_volume / calculated_weight_kg 为派生缓存值，
// 必须与 level_cm、储槽几何、applied_specific_gravity 在最后一次保存时保持一致
// ==========================================

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub id: String,
    pub tank_id: String,
    pub timestamp: i64, // 本地零点 epoch 毫秒
    pub level_cm: f64,
    pub calculated_volume: f64,
    pub calculated_weight_kg: f64,
    pub applied_specific_gravity: f64,
    pub supply_id: Option<String>,
    pub added_amount_liters: f64,
    pub operator_name: Option<String>,
}

impl Reading {
    /// 补药量换算到 kg（使用本读数快照的比重）
    pub fn added_amount_kg(&self) -> f64 {
        self.added_amount_liters * self.applied_specific_gravity
    }
}

/// 人工录入的单笔读数（尚未计算派生值）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadingInput {
    pub tank_id: String,
    pub date: chrono::NaiveDate,
    pub raw_level: String,
    pub added_amount_liters: Option<f64>,
    pub operator_name: Option<String>,
}
