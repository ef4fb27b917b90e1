// ==========================================
// 加药管理系统 - 药剂合约领域模型
// ==========================================
// 同一储槽的多份合约按 start_date 构成时间线，
// 任一时刻生效的合约为 start_date ≤ 该时刻的最新一份
// ==========================================

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChemicalSupply {
    pub id: String,
    pub tank_id: String,
    pub supplier_name: String,
    pub chemical_name: String,
    pub specific_gravity: f64,
    pub price: Option<f64>, // 元/kg
    pub start_date: i64,    // 本地零点 epoch 毫秒
    pub target_ppm: Option<f64>,
    pub notes: Option<String>,
}
