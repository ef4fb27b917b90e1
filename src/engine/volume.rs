// ==========================================
// 加药管理系统 - 体积/重量计算
// ==========================================
// 输入: 储槽几何 + 液位 (cm)
// 输出: 液体体积 (L) / 重量 (kg)
// 约定: 尺寸单位 cm，cm³ / 1000 = L
// ==========================================

use crate::domain::tank::Tank;
use crate::domain::types::{HeadType, ShapeType};
use std::f64::consts::PI;

/// 容量无法取得时的异常检测兜底容量 (L)
pub const FALLBACK_CAPACITY_LITERS: f64 = 10_000.0;

const CM3_PER_LITER: f64 = 1_000.0;

/// 根据液位计算体积 (L)
///
/// # 规则
/// 1. 液位先扣除 sensor_offset，再限制在 [0, height]（height 未设定时只限制下限）
/// 2. 按形状套用几何公式
/// 3. 几何尺寸不足时退回旧版线性系数: level × factor
pub fn calculate_volume(tank: &Tank, level_cm: f64) -> f64 {
    let dims = &tank.dimensions;
    let offset = dims.sensor_offset.unwrap_or(0.0);
    let mut h = (level_cm - offset).max(0.0);
    if let Some(height) = positive(dims.height) {
        h = h.min(height);
    }

    match geometric_volume(tank, h) {
        Some(volume) => volume,
        None => level_cm.max(0.0) * tank.factor.unwrap_or(0.0),
    }
}

/// 重量 (kg) = 体积 × 比重，比重缺失按 1.0
pub fn calculate_weight(volume_liters: f64, specific_gravity: Option<f64>) -> f64 {
    volume_liters * specific_gravity.unwrap_or(1.0)
}

/// 由几何尺寸推得的满槽容量 (L)
pub fn geometric_capacity(tank: &Tank) -> Option<f64> {
    let dims = &tank.dimensions;
    let full_height = match tank.shape_type? {
        ShapeType::HorizontalCylinder => positive(dims.diameter)?,
        ShapeType::VerticalCylinder | ShapeType::Rectangular => positive(dims.height)?,
    };
    geometric_volume(tank, full_height)
}

/// 异常检测使用的容量: 声明容量 → 几何容量 → 10,000 L
pub fn effective_capacity(tank: &Tank) -> f64 {
    positive(tank.capacity_liters)
        .or_else(|| geometric_capacity(tank))
        .unwrap_or(FALLBACK_CAPACITY_LITERS)
}

/// 几何体积；尺寸不足返回 None
fn geometric_volume(tank: &Tank, h: f64) -> Option<f64> {
    let dims = &tank.dimensions;
    match tank.shape_type? {
        ShapeType::VerticalCylinder => {
            let r = positive(dims.diameter)? / 2.0;
            Some(PI * r * r * h / CM3_PER_LITER)
        }
        ShapeType::HorizontalCylinder => {
            let diameter = positive(dims.diameter)?;
            let length = positive(dims.length)?;
            let head_type = dims.head_type.unwrap_or(HeadType::Flat);
            Some(horizontal_cylinder_volume(diameter, length, head_type, h))
        }
        ShapeType::Rectangular => {
            let length = positive(dims.length)?;
            let width = positive(dims.width)?;
            Some(length * width * h / CM3_PER_LITER)
        }
    }
}

/// 卧式圆柱部分充液体积 (L)
///
/// 直段: 弓形面积 × 长度
/// 封头（两端合计）:
/// - 半球: 两端合为一球，球缺体积 πh²(3R−h)/3
/// - 2:1 椭圆: 两端合为扁椭球（轴向半轴 R/2），体积为同液位球缺的 1/2
/// - 平封头: 0
fn horizontal_cylinder_volume(diameter: f64, length: f64, head_type: HeadType, h: f64) -> f64 {
    let r = diameter / 2.0;
    let h = h.clamp(0.0, diameter);

    let segment_area = if h <= 0.0 {
        0.0
    } else if h >= diameter {
        PI * r * r
    } else {
        let ratio = ((r - h) / r).clamp(-1.0, 1.0);
        r * r * ratio.acos() - (r - h) * (2.0 * r * h - h * h).max(0.0).sqrt()
    };

    let spherical_cap = PI * h * h * (3.0 * r - h) / 3.0;
    let heads = match head_type {
        HeadType::Flat => 0.0,
        HeadType::Hemispherical => spherical_cap,
        HeadType::Ellipsoidal2To1 => spherical_cap * 0.5,
    };

    (segment_area * length + heads) / CM3_PER_LITER
}

fn positive(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v > 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::tank::TankDimensions;
    use crate::domain::types::SystemCategory;

    fn vertical_tank() -> Tank {
        let mut tank = Tank::new("T1", "CT-1 缓蚀剂", SystemCategory::Cooling);
        tank.shape_type = Some(ShapeType::VerticalCylinder);
        tank.dimensions = TankDimensions {
            diameter: Some(200.0),
            height: Some(300.0),
            ..Default::default()
        };
        tank
    }

    fn horizontal_tank(head_type: HeadType) -> Tank {
        let mut tank = Tank::new("T2", "锅炉脱氧剂", SystemCategory::Boiler);
        tank.shape_type = Some(ShapeType::HorizontalCylinder);
        tank.dimensions = TankDimensions {
            diameter: Some(100.0),
            length: Some(300.0),
            head_type: Some(head_type),
            ..Default::default()
        };
        tank
    }

    #[test]
    fn test_vertical_cylinder_volume() {
        let tank = vertical_tank();
        // π × 100² × 100 / 1000 = 3141.59 L
        let v = calculate_volume(&tank, 100.0);
        assert!((v - 3141.59).abs() < 0.01);
    }

    #[test]
    fn test_vertical_cylinder_clamped_to_height() {
        let tank = vertical_tank();
        assert_eq!(calculate_volume(&tank, 500.0), calculate_volume(&tank, 300.0));
        assert_eq!(calculate_volume(&tank, -20.0), 0.0);
    }

    #[test]
    fn test_sensor_offset_subtracted() {
        let mut tank = vertical_tank();
        tank.dimensions.sensor_offset = Some(10.0);
        let with_offset = calculate_volume(&tank, 110.0);
        let plain = calculate_volume(&vertical_tank(), 100.0);
        assert!((with_offset - plain).abs() < 1e-9);
    }

    #[test]
    fn test_rectangular_volume() {
        let mut tank = Tank::new("T3", "脱硝尿素", SystemCategory::Denox);
        tank.shape_type = Some(ShapeType::Rectangular);
        tank.dimensions = TankDimensions {
            length: Some(200.0),
            width: Some(100.0),
            height: Some(150.0),
            ..Default::default()
        };
        // 200 × 100 × 50 / 1000 = 1000 L
        assert!((calculate_volume(&tank, 50.0) - 1000.0).abs() < 1e-9);
        assert_eq!(geometric_capacity(&tank), Some(3000.0));
    }

    #[test]
    fn test_horizontal_cylinder_half_and_full() {
        let tank = horizontal_tank(HeadType::Flat);
        let full = PI * 50.0 * 50.0 * 300.0 / 1000.0;
        let half = calculate_volume(&tank, 50.0);
        assert!((half - full / 2.0).abs() < 1e-6);
        assert!((calculate_volume(&tank, 100.0) - full).abs() < 1e-6);
        assert!((calculate_volume(&tank, 150.0) - full).abs() < 1e-6);
    }

    #[test]
    fn test_horizontal_heads_add_volume() {
        let flat = calculate_volume(&horizontal_tank(HeadType::Flat), 100.0);
        let ellip = calculate_volume(&horizontal_tank(HeadType::Ellipsoidal2To1), 100.0);
        let hemi = calculate_volume(&horizontal_tank(HeadType::Hemispherical), 100.0);

        // 满槽: 半球封头合计 4/3 π R³，椭圆封头为其一半
        let sphere = 4.0 / 3.0 * PI * 50.0_f64.powi(3) / 1000.0;
        assert!((hemi - flat - sphere).abs() < 1e-6);
        assert!((ellip - flat - sphere / 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_volume_monotonic_in_level() {
        let tanks = vec![
            vertical_tank(),
            horizontal_tank(HeadType::Flat),
            horizontal_tank(HeadType::Ellipsoidal2To1),
            horizontal_tank(HeadType::Hemispherical),
        ];
        for tank in tanks {
            let max = tank
                .dimensions
                .height
                .or(tank.dimensions.diameter)
                .unwrap();
            let mut prev = calculate_volume(&tank, 0.0);
            let mut level = 0.5;
            while level <= max {
                let v = calculate_volume(&tank, level);
                assert!(v + 1e-9 >= prev, "{} 在 {}cm 处体积下降", tank.name, level);
                prev = v;
                level += 0.5;
            }
        }
    }

    #[test]
    fn test_factor_fallback_without_geometry() {
        let mut tank = Tank::new("T4", "旧储槽", SystemCategory::Other);
        tank.factor = Some(12.5);
        assert_eq!(calculate_volume(&tank, 40.0), 500.0);

        // 有形状但缺直径同样退回
        tank.shape_type = Some(ShapeType::VerticalCylinder);
        assert_eq!(calculate_volume(&tank, 40.0), 500.0);
    }

    #[test]
    fn test_weight_defaults_sg() {
        assert_eq!(calculate_weight(100.0, Some(1.2)), 120.0);
        assert_eq!(calculate_weight(100.0, None), 100.0);
    }

    #[test]
    fn test_effective_capacity_chain() {
        let mut tank = vertical_tank();
        tank.capacity_liters = Some(8000.0);
        assert_eq!(effective_capacity(&tank), 8000.0);

        tank.capacity_liters = None;
        let geo = PI * 100.0 * 100.0 * 300.0 / 1000.0;
        assert!((effective_capacity(&tank) - geo).abs() < 1e-6);

        let bare = Tank::new("T5", "未知", SystemCategory::Other);
        assert_eq!(effective_capacity(&bare), FALLBACK_CAPACITY_LITERS);
    }
}
