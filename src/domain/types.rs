// ==========================================
// 加药管理系统 - 领域类型定义
// ==========================================
// 储槽分类 / 形状 / 输入单位 / 理论用量算法 / 显示口径
// 所有枚举统一提供 to_db_str / from_str，与 SQLite 存储字符串对齐
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 系统分类 (System Category)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SystemCategory {
    Cooling, // 冷却水
    Boiler,  // 锅炉水
    Denox,   // 脱硝
    Other,   // 其他
}

impl fmt::Display for SystemCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl SystemCategory {
    /// 从字符串解析系统分类（未知值归为 OTHER）
    pub fn from_str(s: &str) -> Self {
        match s.trim().to_uppercase().as_str() {
            "COOLING" | "CWS" | "冷却水" => SystemCategory::Cooling,
            "BOILER" | "BWS" | "锅炉" | "锅炉水" => SystemCategory::Boiler,
            "DENOX" | "脱硝" => SystemCategory::Denox,
            _ => SystemCategory::Other,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            SystemCategory::Cooling => "COOLING",
            SystemCategory::Boiler => "BOILER",
            SystemCategory::Denox => "DENOX",
            SystemCategory::Other => "OTHER",
        }
    }
}

// ==========================================
// 储槽形状 (Shape Type)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShapeType {
    VerticalCylinder,   // 立式圆柱
    HorizontalCylinder, // 卧式圆柱
    Rectangular,        // 方形
}

impl fmt::Display for ShapeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl ShapeType {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "VERTICAL_CYLINDER" | "VERTICAL" => Some(ShapeType::VerticalCylinder),
            "HORIZONTAL_CYLINDER" | "HORIZONTAL" => Some(ShapeType::HorizontalCylinder),
            "RECTANGULAR" | "RECT" => Some(ShapeType::Rectangular),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            ShapeType::VerticalCylinder => "VERTICAL_CYLINDER",
            ShapeType::HorizontalCylinder => "HORIZONTAL_CYLINDER",
            ShapeType::Rectangular => "RECTANGULAR",
        }
    }
}

// ==========================================
// 卧式储槽封头类型 (Head Type)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HeadType {
    Flat,           // 平封头
    Ellipsoidal2To1, // 2:1 标准椭圆封头
    Hemispherical,  // 半球封头
}

impl HeadType {
    /// 未知值按平封头处理（不计封头体积）
    pub fn from_str(s: &str) -> Self {
        match s.trim().to_uppercase().as_str() {
            "ELLIPSOIDAL" | "ELLIPSOIDAL_2_1" | "ELLIPSOIDAL2TO1" | "2:1" => {
                HeadType::Ellipsoidal2To1
            }
            "HEMISPHERICAL" | "HEMISPHERE" => HeadType::Hemispherical,
            _ => HeadType::Flat,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            HeadType::Flat => "FLAT",
            HeadType::Ellipsoidal2To1 => "ELLIPSOIDAL_2_1",
            HeadType::Hemispherical => "HEMISPHERICAL",
        }
    }
}

// ==========================================
// 液位输入单位 (Input Unit)
// ==========================================
// PERCENT: 历史命名，实际为现场以"米"录入，系统乘以 100 转为 cm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InputUnit {
    Cm,
    Percent,
}

impl InputUnit {
    pub fn from_str(s: &str) -> Self {
        match s.trim().to_uppercase().as_str() {
            "PERCENT" | "%" | "M" => InputUnit::Percent,
            _ => InputUnit::Cm,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            InputUnit::Cm => "CM",
            InputUnit::Percent => "PERCENT",
        }
    }
}

// ==========================================
// 理论用量算法 (Calculation Method)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CalculationMethod {
    None,
    CwsBlowdown, // 冷却水排放量模型
    BwsSteam,    // 锅炉蒸汽量模型
}

impl fmt::Display for CalculationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl CalculationMethod {
    pub fn from_str(s: &str) -> Self {
        match s.trim().to_uppercase().as_str() {
            "CWS_BLOWDOWN" => CalculationMethod::CwsBlowdown,
            "BWS_STEAM" => CalculationMethod::BwsSteam,
            _ => CalculationMethod::None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            CalculationMethod::None => "NONE",
            CalculationMethod::CwsBlowdown => "CWS_BLOWDOWN",
            CalculationMethod::BwsSteam => "BWS_STEAM",
        }
    }
}

// ==========================================
// 用量显示口径 (Usage Metric)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UsageMetric {
    Volume, // 升 (L)
    Weight, // 公斤 (kg)
    Cost,   // 金额 (按单日合约单价)
}

impl fmt::Display for UsageMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.unit())
    }
}

impl UsageMetric {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "L" | "VOLUME" => Some(UsageMetric::Volume),
            "KG" | "WEIGHT" => Some(UsageMetric::Weight),
            "COST" | "TWD" | "NTD" => Some(UsageMetric::Cost),
            _ => None,
        }
    }

    /// 显示单位
    pub fn unit(&self) -> &'static str {
        match self {
            UsageMetric::Volume => "L",
            UsageMetric::Weight => "kg",
            UsageMetric::Cost => "元",
        }
    }
}
