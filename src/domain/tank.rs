// ==========================================
// 加药管理系统 - 储槽领域模型
// ==========================================
// 储槽删除后其历史液位记录仍保留（不做级联删除）
// ==========================================

use crate::domain::types::{CalculationMethod, HeadType, InputUnit, ShapeType, SystemCategory};
use serde::{Deserialize, Serialize};

/// 异常检测默认阈值（储槽容量百分比）
pub const DEFAULT_VALIDATION_THRESHOLD_PCT: f64 = 30.0;

// ==========================================
// TankDimensions - 储槽几何尺寸（单位: cm）
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TankDimensions {
    pub diameter: Option<f64>,
    pub length: Option<f64>, // 卧式: 直段长度 / 方形: 长
    pub width: Option<f64>,  // 方形: 宽
    pub height: Option<f64>, // 最大液位高度
    pub sensor_offset: Option<f64>,
    pub head_type: Option<HeadType>,
}

// ==========================================
// Tank - 储槽
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tank {
    pub id: String,
    pub name: String,
    pub system: SystemCategory,
    pub capacity_liters: Option<f64>,
    pub factor: Option<f64>, // 旧版线性换算系数 (L/cm)
    pub shape_type: Option<ShapeType>,
    pub dimensions: TankDimensions,
    pub input_unit: InputUnit,
    pub safe_min_level: Option<f64>, // 与 input_unit 同单位
    pub validation_threshold: Option<f64>,
    pub sg_range_min: Option<f64>,
    pub sg_range_max: Option<f64>,
    pub calculation_method: CalculationMethod,
    pub sort_order: i32,
    pub description: Option<String>,
}

impl Tank {
    /// 创建最小可用储槽（其余字段为空/默认）
    pub fn new(id: impl Into<String>, name: impl Into<String>, system: SystemCategory) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            system,
            capacity_liters: None,
            factor: None,
            shape_type: None,
            dimensions: TankDimensions::default(),
            input_unit: InputUnit::Cm,
            safe_min_level: None,
            validation_threshold: None,
            sg_range_min: None,
            sg_range_max: None,
            calculation_method: CalculationMethod::None,
            sort_order: 0,
            description: None,
        }
    }

    /// 异常检测阈值百分比（未设置时 30%）
    pub fn threshold_pct(&self) -> f64 {
        self.validation_threshold
            .unwrap_or(DEFAULT_VALIDATION_THRESHOLD_PCT)
    }

    /// 比重是否落在合格范围内（未设置的边界不做限制）
    pub fn sg_in_range(&self, sg: f64) -> bool {
        let above_min = self.sg_range_min.map_or(true, |min| sg >= min);
        let below_max = self.sg_range_max.map_or(true, |max| sg <= max);
        above_min && below_max
    }

    /// 液位（cm）是否低于安全液位
    ///
    /// safe_min_level 与 input_unit 同单位，PERCENT 模式需换算为 cm 再比较
    pub fn is_below_safe_level(&self, level_cm: f64) -> bool {
        match self.safe_min_level {
            Some(min) => {
                let min_cm = match self.input_unit {
                    InputUnit::Percent => min * 100.0,
                    InputUnit::Cm => min,
                };
                level_cm < min_cm
            }
            None => false,
        }
    }
}
