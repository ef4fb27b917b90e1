// ==========================================
// 加药管理系统 - 读数派生值重算
// ==========================================
// 触发时机:
// - 单笔读数保存（手动录入 / 批量导入）
// - 合约保存后对该储槽全部读数级联重算
// - 人工"重算储槽"
// 规则: 体积由几何 + 液位决定；比重取读数当日生效合约，无合约按 1.0
// 红线: 纯函数，只返回需要回写的读数
// ==========================================

use crate::domain::reading::Reading;
use crate::domain::tank::Tank;
use crate::engine::supply_resolver::SupplyTimeline;
use crate::engine::volume::{calculate_volume, calculate_weight};
use tracing::{debug, instrument};

const EPSILON: f64 = 1e-6;

/// 重算单笔读数的派生字段
pub fn recalculate_reading(tank: &Tank, reading: &Reading, supplies: &SupplyTimeline) -> Reading {
    let volume = calculate_volume(tank, reading.level_cm);
    let active = supplies.active_at(&tank.id, reading.timestamp);
    let sg = active.map(|s| s.specific_gravity).unwrap_or(1.0);

    Reading {
        calculated_volume: volume,
        calculated_weight_kg: calculate_weight(volume, Some(sg)),
        applied_specific_gravity: sg,
        supply_id: active.map(|s| s.id.clone()),
        ..reading.clone()
    }
}

fn derived_changed(before: &Reading, after: &Reading) -> bool {
    (before.calculated_volume - after.calculated_volume).abs() > EPSILON
        || (before.calculated_weight_kg - after.calculated_weight_kg).abs() > EPSILON
        || (before.applied_specific_gravity - after.applied_specific_gravity).abs() > EPSILON
        || before.supply_id != after.supply_id
}

/// 级联重算某储槽全部读数，返回派生值发生变化的读数
#[instrument(skip(tank, readings, supplies), fields(tank_id = %tank.id))]
pub fn recalc_tank_readings(tank: &Tank, readings: &[Reading], supplies: &SupplyTimeline) -> Vec<Reading> {
    let changed: Vec<Reading> = readings
        .iter()
        .filter(|r| r.tank_id == tank.id)
        .filter_map(|r| {
            let updated = recalculate_reading(tank, r, supplies);
            derived_changed(r, &updated).then_some(updated)
        })
        .collect();

    debug!(total = readings.len(), changed = changed.len(), "读数级联重算");
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::supply::ChemicalSupply;
    use crate::domain::types::SystemCategory;

    fn tank() -> Tank {
        let mut tank = Tank::new("T1", "CT-1 阻垢剂", SystemCategory::Cooling);
        tank.factor = Some(10.0);
        tank
    }

    fn supply(id: &str, start: i64, sg: f64) -> ChemicalSupply {
        ChemicalSupply {
            id: id.to_string(),
            tank_id: "T1".to_string(),
            supplier_name: "供应商".to_string(),
            chemical_name: "阻垢剂".to_string(),
            specific_gravity: sg,
            price: None,
            start_date: start,
            target_ppm: None,
            notes: None,
        }
    }

    fn reading(id: &str, ts: i64, level: f64) -> Reading {
        let volume = level * 10.0;
        Reading {
            id: id.to_string(),
            tank_id: "T1".to_string(),
            timestamp: ts,
            level_cm: level,
            calculated_volume: volume,
            calculated_weight_kg: volume,
            applied_specific_gravity: 1.0,
            supply_id: None,
            added_amount_liters: 0.0,
            operator_name: Some("王工".to_string()),
        }
    }

    #[test]
    fn test_recalculate_uses_active_contract() {
        let supplies = SupplyTimeline::new(&[supply("S1", 100, 1.2)]);
        let updated = recalculate_reading(&tank(), &reading("R1", 200, 50.0), &supplies);

        assert_eq!(updated.id, "R1");
        assert_eq!(updated.calculated_volume, 500.0);
        assert!((updated.calculated_weight_kg - 600.0).abs() < 1e-9);
        assert_eq!(updated.applied_specific_gravity, 1.2);
        assert_eq!(updated.supply_id.as_deref(), Some("S1"));
        assert_eq!(updated.operator_name.as_deref(), Some("王工"));
    }

    #[test]
    fn test_cascade_returns_only_changed() {
        // 新合约从 300 起生效，只影响其后的读数
        let supplies = SupplyTimeline::new(&[supply("S2", 300, 1.5)]);
        let readings = vec![reading("R1", 200, 50.0), reading("R2", 400, 40.0)];

        let changed = recalc_tank_readings(&tank(), &readings, &supplies);
        assert_eq!(changed.len(), 1);
        assert_eq!(changed[0].id, "R2");
        assert!((changed[0].calculated_weight_kg - 600.0).abs() < 1e-9);

        // 再次重算无变化
        let rerun = recalc_tank_readings(&tank(), &changed, &supplies);
        assert!(rerun.is_empty());
    }
}
