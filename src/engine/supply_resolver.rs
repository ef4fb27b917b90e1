// ==========================================
// 加药管理系统 - 生效合约解析
// ==========================================
// 规则: 同储槽 start_date ≤ 查询时刻的合约中取 start_date 最大者
// 同日并列时取较晚保存者（存储顺序靠后者）
// 红线: 无副作用、幂等
// ==========================================

use crate::domain::supply::ChemicalSupply;
use std::collections::HashMap;

/// 在合约列表中查找生效合约
pub fn get_active_supply<'a>(
    supplies: &'a [ChemicalSupply],
    tank_id: &str,
    timestamp: i64,
) -> Option<&'a ChemicalSupply> {
    supplies
        .iter()
        .filter(|s| s.tank_id == tank_id && s.start_date <= timestamp)
        // max_by_key 遇到相同键返回最后一个
        .max_by_key(|s| s.start_date)
}

// ==========================================
// SupplyTimeline - 按储槽预排序的合约时间线
// ==========================================
// 用途: 逐日计算（成本、理论用量）需要大量查询，预先按储槽分组排序
#[derive(Debug, Clone, Default)]
pub struct SupplyTimeline {
    by_tank: HashMap<String, Vec<ChemicalSupply>>,
}

impl SupplyTimeline {
    pub fn new(supplies: &[ChemicalSupply]) -> Self {
        let mut by_tank: HashMap<String, Vec<ChemicalSupply>> = HashMap::new();
        for supply in supplies {
            by_tank
                .entry(supply.tank_id.clone())
                .or_default()
                .push(supply.clone());
        }
        // 稳定排序保留同日合约的保存顺序
        for list in by_tank.values_mut() {
            list.sort_by_key(|s| s.start_date);
        }
        Self { by_tank }
    }

    /// 查询时刻生效的合约
    pub fn active_at(&self, tank_id: &str, timestamp: i64) -> Option<&ChemicalSupply> {
        let list = self.by_tank.get(tank_id)?;
        let idx = list.partition_point(|s| s.start_date <= timestamp);
        if idx == 0 {
            None
        } else {
            list.get(idx - 1)
        }
    }

    /// 该储槽在 timestamp 之前（含）最近一笔设有 target_ppm 的合约的 ppm
    pub fn inherited_ppm(&self, tank_id: &str, timestamp: i64) -> Option<f64> {
        self.by_tank
            .get(tank_id)?
            .iter()
            .rev()
            .filter(|s| s.start_date <= timestamp)
            .find_map(|s| s.target_ppm)
    }

    /// 该储槽全部合约（按 start_date 升序）
    pub fn for_tank(&self, tank_id: &str) -> &[ChemicalSupply] {
        self.by_tank.get(tank_id).map(Vec::as_slice).unwrap_or(&[])
    }
}
