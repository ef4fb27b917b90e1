// ==========================================
// 加药管理系统 - 合约导入
// ==========================================
// 规则:
// - 目标 ppm 回退: 本行 → 同批次该储槽较早一行 → 历史合约 → 无
// - 比重超出储槽合格范围 → 软警告，需确认后写入
// - 同储槽同生效日的既有合约沿用其 ID（覆盖更新）
// ==========================================

use crate::domain::supply::ChemicalSupply;
use crate::domain::tank::Tank;
use crate::engine::fallback::{target_ppm_chain, PpmContext};
use crate::engine::normalizer::local_midnight_ms;
use crate::engine::supply_resolver::SupplyTimeline;
use crate::importer::error::ImportResult;
use crate::importer::field_mapper::{map_supply_sheet, RowIssue};
use crate::importer::file_parser::RawSheet;
use crate::importer::tank_lookup::TankLookup;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// 比重超出范围警告
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SgWarning {
    pub supply_id: String,
    pub tank_id: String,
    pub tank_name: String,
    pub specific_gravity: f64,
    pub sg_range_min: Option<f64>,
    pub sg_range_max: Option<f64>,
}

/// 单笔合约的比重检查
pub fn check_specific_gravity(tank: &Tank, supply: &ChemicalSupply) -> Option<SgWarning> {
    if tank.sg_in_range(supply.specific_gravity) {
        return None;
    }
    Some(SgWarning {
        supply_id: supply.id.clone(),
        tank_id: tank.id.clone(),
        tank_name: tank.name.clone(),
        specific_gravity: supply.specific_gravity,
        sg_range_min: tank.sg_range_min,
        sg_range_max: tank.sg_range_max,
    })
}

#[derive(Debug, Clone, Default)]
pub struct SupplyImportPlan {
    pub supplies: Vec<ChemicalSupply>,
    pub sg_warnings: Vec<SgWarning>,
    pub issues: Vec<RowIssue>,
    pub unmapped_columns: Vec<String>,
    pub unknown_tanks: Vec<String>,
    pub skipped: usize,
    /// 目标 ppm 来自继承（非本行）的笔数
    pub inherited_ppm_count: usize,
}

impl SupplyImportPlan {
    pub fn requires_confirmation(&self) -> bool {
        !self.sg_warnings.is_empty()
    }
}

pub struct SupplyImporter<'a> {
    tanks: &'a [Tank],
    history: &'a SupplyTimeline,
}

impl<'a> SupplyImporter<'a> {
    pub fn new(tanks: &'a [Tank], history: &'a SupplyTimeline) -> Self {
        Self { tanks, history }
    }

    #[instrument(skip_all, fields(rows = sheet.rows.len()))]
    pub fn plan(&self, sheet: &RawSheet, today: NaiveDate) -> ImportResult<SupplyImportPlan> {
        let mapped = map_supply_sheet(sheet, today)?;
        let lookup = TankLookup::new(self.tanks);
        let chain = target_ppm_chain();

        let mut plan = SupplyImportPlan {
            issues: mapped.issues.clone(),
            unmapped_columns: mapped.unmapped_columns.clone(),
            skipped: mapped.invalid_row_count(),
            ..Default::default()
        };

        // 按生效日排序，"同批较早一行"即排序后的前序行
        let mut rows: Vec<_> = mapped.records.iter().collect();
        rows.sort_by_key(|r| r.record.start_date);

        let mut batch_ppm: HashMap<String, f64> = HashMap::new();
        for row in rows {
            let record = &row.record;
            let tank = match lookup.find(&record.tank_name) {
                Some(tank) => tank,
                None => {
                    warn!(row = row.row_number, tank_name = %record.tank_name, "找不到储槽，跳过");
                    plan.unknown_tanks.push(record.tank_name.clone());
                    plan.issues.push(RowIssue {
                        row: row.row_number,
                        field: None,
                        message: format!("找不到储槽: {}", record.tank_name),
                    });
                    plan.skipped += 1;
                    continue;
                }
            };

            let start_date = local_midnight_ms(record.start_date);
            let ctx = PpmContext {
                tank_id: &tank.id,
                start_date,
                row_ppm: record.target_ppm,
                batch_prior_ppm: batch_ppm.get(&tank.id).copied(),
                history: self.history,
            };
            let resolved = chain.resolve(&ctx);
            if let Some(r) = resolved.filter(|r| r.source != "row") {
                debug!(tank_id = %tank.id, source = r.source, ppm = r.value, "目标 ppm 继承");
                plan.inherited_ppm_count += 1;
            }
            let target_ppm = resolved.map(|r| r.value);
            if let Some(ppm) = target_ppm {
                batch_ppm.insert(tank.id.clone(), ppm);
            }

            let existing_id = self
                .history
                .for_tank(&tank.id)
                .iter()
                .rev()
                .find(|s| s.start_date == start_date)
                .map(|s| s.id.clone());

            let supply = ChemicalSupply {
                id: existing_id.unwrap_or_else(|| Uuid::new_v4().to_string()),
                tank_id: tank.id.clone(),
                supplier_name: record.supplier_name.clone(),
                chemical_name: record.chemical_name.clone(),
                specific_gravity: record.specific_gravity,
                price: record.price,
                start_date,
                target_ppm,
                notes: record.notes.clone(),
            };
            if let Some(warning) = check_specific_gravity(tank, &supply) {
                warn!(tank_id = %tank.id, sg = supply.specific_gravity, "比重超出合格范围");
                plan.sg_warnings.push(warning);
            }
            plan.supplies.push(supply);
        }

        info!(
            supplies = plan.supplies.len(),
            skipped = plan.skipped,
            sg_warnings = plan.sg_warnings.len(),
            "合约导入计划完成"
        );
        Ok(plan)
    }
}
