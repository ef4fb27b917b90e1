// ==========================================
// 加药管理系统 - 业务流程 API
// ==========================================
// 职责: 串联 导入 → 引擎 → 存储 的完整流程
// 两段式写入: prepare_* 只生成计划，commit_* 在确认后落库
// 只读查询并发发出；合约保存 → 比重重算严格按顺序执行
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::config::settings::DosingSettings;
use crate::domain::annotation::{FluctuationAlert, ImportantNote};
use crate::domain::reading::{Reading, ReadingInput};
use crate::domain::supply::ChemicalSupply;
use crate::domain::tank::Tank;
use crate::domain::types::UsageMetric;
use crate::engine::normalizer::{local_midnight_ms, today_local};
use crate::engine::recalc::{recalc_tank_readings, recalculate_reading};
use crate::engine::supply_resolver::SupplyTimeline;
use crate::engine::usage_report::{build_usage_report, UsageReport, UsageReportInput};
use crate::i18n::{t, t_with_args};
use crate::importer::exporter;
use crate::importer::file_parser::UniversalFileParser;
use crate::importer::level_importer::{LevelImportPlan, LevelImporter};
use crate::importer::param_importer::ParamImporter;
use crate::importer::supply_importer::{check_specific_gravity, SupplyImportPlan, SupplyImporter};
use crate::repository::storage::StorageService;
use chrono::{Duration, Local, NaiveDate};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

// ==========================================
// 响应结构
// ==========================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LevelImportSummary {
    pub imported: usize,
    pub updated: usize,
    pub skipped: usize,
    pub alerts_saved: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SupplySaveOutcome {
    pub supply_id: String,
    /// 重算后有变化的读数笔数
    pub recalculated: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SupplyImportSummary {
    pub imported: usize,
    pub skipped: usize,
    pub recalculated: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParamImportSummary {
    pub saved: usize,
    pub skipped: usize,
    pub skipped_future: usize,
    pub filled_fields: usize,
    pub unknown_targets: Vec<String>,
}

// ==========================================
// DosingApi
// ==========================================
pub struct DosingApi {
    storage: Arc<dyn StorageService>,
    settings: DosingSettings,
    /// 固定"今天"（测试用），None 时取本地日期
    today: Option<NaiveDate>,
}

impl DosingApi {
    pub fn new(storage: Arc<dyn StorageService>, settings: DosingSettings) -> Self {
        Self {
            storage,
            settings,
            today: None,
        }
    }

    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub fn settings(&self) -> &DosingSettings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: DosingSettings) {
        self.settings = settings;
    }

    fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(today_local)
    }

    async fn require_tank(&self, tank_id: &str) -> ApiResult<Tank> {
        self.storage
            .get_tanks()
            .await?
            .into_iter()
            .find(|t| t.id == tank_id)
            .ok_or_else(|| ApiError::NotFound(format!("Tank(id={})", tank_id)))
    }

    // ==========================================
    // 液位读数
    // ==========================================

    /// 读取液位表并生成导入计划（不落库）
    #[instrument(skip(self, path), fields(path = %path.as_ref().display()))]
    pub async fn prepare_level_import<P: AsRef<Path> + Send>(&self, path: P) -> ApiResult<LevelImportPlan> {
        let sheet = UniversalFileParser.parse(path.as_ref())?;
        let (tanks, readings, supplies) = futures::try_join!(
            self.storage.get_tanks(),
            self.storage.get_readings(None),
            self.storage.get_supplies(None),
        )?;
        let timeline = SupplyTimeline::new(&supplies);
        let plan = LevelImporter::new(&tanks, &readings, &timeline, &self.settings, self.today()).plan(&sheet)?;
        info!(
            candidates = plan.candidates.len(),
            anomalies = plan.anomalies.len(),
            skipped = plan.skipped_count(),
            "液位导入计划已生成"
        );
        Ok(plan)
    }

    /// 人工录入单笔读数，生成导入计划（不落库）
    #[instrument(skip(self, input), fields(tank_id = %input.tank_id))]
    pub async fn prepare_manual_reading(&self, input: &ReadingInput) -> ApiResult<LevelImportPlan> {
        let (tanks, readings, supplies) = futures::try_join!(
            self.storage.get_tanks(),
            self.storage.get_readings(None),
            self.storage.get_supplies(None),
        )?;
        let timeline = SupplyTimeline::new(&supplies);
        let plan =
            LevelImporter::new(&tanks, &readings, &timeline, &self.settings, self.today()).plan_manual(input)?;
        Ok(plan)
    }

    /// 确认并写入读数；存在异常时须 confirmed = true
    ///
    /// 确认后异常一并存为异常纪录
    #[instrument(skip(self, plan), fields(candidates = plan.candidates.len()))]
    pub async fn commit_level_import(&self, plan: &LevelImportPlan, confirmed: bool) -> ApiResult<LevelImportSummary> {
        if plan.requires_confirmation() && !confirmed {
            return Err(ApiError::ConfirmationRequired(format!(
                "{} ({})",
                t("common.confirm_required"),
                plan.anomalies.len()
            )));
        }

        let imported = if plan.candidates.is_empty() {
            0
        } else {
            self.storage.save_readings_batch(&plan.candidates).await?
        };

        let alerts = plan.anomalies.to_alerts(Local::now().naive_local());
        let alerts_saved = if alerts.is_empty() {
            0
        } else {
            self.storage.save_alerts_batch(&alerts).await?
        };

        let summary = LevelImportSummary {
            imported,
            updated: plan.updated_count,
            skipped: plan.skipped_count(),
            alerts_saved,
        };
        let ok = summary.imported.to_string();
        let skipped = summary.skipped.to_string();
        info!(
            "{}",
            t_with_args("import.summary", &[("ok", ok.as_str()), ("skipped", skipped.as_str())])
        );
        Ok(summary)
    }

    /// 修改既有读数，派生值按当日生效合约重算
    pub async fn update_reading(&self, reading: &Reading) -> ApiResult<Reading> {
        let tank = self.require_tank(&reading.tank_id).await?;
        let supplies = self.storage.get_supplies(Some(&tank.id)).await?;
        let updated = recalculate_reading(&tank, reading, &SupplyTimeline::new(&supplies));
        self.storage.update_reading(&updated).await?;
        Ok(updated)
    }

    pub async fn delete_reading(&self, id: &str) -> ApiResult<()> {
        self.storage.delete_reading(id).await?;
        Ok(())
    }

    // ==========================================
    // 药剂合约
    // ==========================================

    /// 按储槽的合约全集重算其全部读数，只写回有变化者
    async fn cascade_recalc(&self, tank: &Tank) -> ApiResult<usize> {
        let (supplies, readings) = futures::try_join!(
            self.storage.get_supplies(Some(&tank.id)),
            self.storage.get_readings(Some(&tank.id)),
        )?;
        let changed = recalc_tank_readings(tank, &readings, &SupplyTimeline::new(&supplies));
        if !changed.is_empty() {
            self.storage.save_readings_batch(&changed).await?;
        }
        info!(tank_id = %tank.id, changed = changed.len(), "储槽读数重算完成");
        Ok(changed.len())
    }

    fn check_supply(&self, tank: &Tank, supply: &ChemicalSupply, confirmed: bool) -> ApiResult<()> {
        if !(supply.specific_gravity.is_finite() && supply.specific_gravity > 0.0) {
            return Err(ApiError::InvalidInput(format!(
                "specific_gravity={}",
                supply.specific_gravity
            )));
        }
        if let Some(w) = check_specific_gravity(tank, supply) {
            if !confirmed {
                let fmt = |v: Option<f64>| v.map_or_else(|| "-".to_string(), |x| x.to_string());
                let (sg, min, max) = (w.specific_gravity.to_string(), fmt(w.sg_range_min), fmt(w.sg_range_max));
                return Err(ApiError::ConfirmationRequired(t_with_args(
                    "import.sg_out_of_range",
                    &[
                        ("tank", w.tank_name.as_str()),
                        ("sg", sg.as_str()),
                        ("min", min.as_str()),
                        ("max", max.as_str()),
                    ],
                )));
            }
            warn!(tank_id = %tank.id, sg = w.specific_gravity, "比重超出范围，已确认保存");
        }
        Ok(())
    }

    /// 保存合约并重算该储槽读数
    ///
    /// 比重超出储槽范围时须 confirmed = true
    #[instrument(skip(self, supply), fields(tank_id = %supply.tank_id))]
    pub async fn save_supply(&self, supply: &ChemicalSupply, confirmed: bool) -> ApiResult<SupplySaveOutcome> {
        let tank = self.require_tank(&supply.tank_id).await?;
        self.check_supply(&tank, supply, confirmed)?;

        let supply_id = self.storage.save_supply(supply).await?;
        let recalculated = self.cascade_recalc(&tank).await?;
        Ok(SupplySaveOutcome {
            supply_id,
            recalculated,
        })
    }

    #[instrument(skip(self, supply), fields(supply_id = %supply.id))]
    pub async fn update_supply(&self, supply: &ChemicalSupply, confirmed: bool) -> ApiResult<SupplySaveOutcome> {
        let tank = self.require_tank(&supply.tank_id).await?;
        self.check_supply(&tank, supply, confirmed)?;

        self.storage.update_supply(supply).await?;
        let recalculated = self.cascade_recalc(&tank).await?;
        Ok(SupplySaveOutcome {
            supply_id: supply.id.clone(),
            recalculated,
        })
    }

    #[instrument(skip(self, path), fields(path = %path.as_ref().display()))]
    pub async fn prepare_supply_import<P: AsRef<Path> + Send>(&self, path: P) -> ApiResult<SupplyImportPlan> {
        let sheet = UniversalFileParser.parse(path.as_ref())?;
        let (tanks, supplies) = futures::try_join!(self.storage.get_tanks(), self.storage.get_supplies(None))?;
        let timeline = SupplyTimeline::new(&supplies);
        let plan = SupplyImporter::new(&tanks, &timeline).plan(&sheet, self.today())?;
        Ok(plan)
    }

    /// 确认并写入合约；比重警告须 confirmed = true
    ///
    /// 写入后逐个储槽依次重算
    #[instrument(skip(self, plan), fields(supplies = plan.supplies.len()))]
    pub async fn commit_supply_import(&self, plan: &SupplyImportPlan, confirmed: bool) -> ApiResult<SupplyImportSummary> {
        if plan.requires_confirmation() && !confirmed {
            return Err(ApiError::ConfirmationRequired(format!(
                "{} ({})",
                t("common.confirm_required"),
                plan.sg_warnings.len()
            )));
        }

        let ids = if plan.supplies.is_empty() {
            Vec::new()
        } else {
            self.storage.add_supplies_batch(&plan.supplies).await?
        };

        let tank_ids: BTreeSet<&str> = plan.supplies.iter().map(|s| s.tank_id.as_str()).collect();
        let tanks = self.storage.get_tanks().await?;
        let mut recalculated = 0;
        for tank in tanks.iter().filter(|t| tank_ids.contains(t.id.as_str())) {
            recalculated += self.cascade_recalc(tank).await?;
        }

        Ok(SupplyImportSummary {
            imported: ids.len(),
            skipped: plan.skipped,
            recalculated,
        })
    }

    // ==========================================
    // 周参数
    // ==========================================

    /// 导入冷却水参数（week_date 所在周）
    #[instrument(skip(self, path), fields(path = %path.as_ref().display(), week = %week_date))]
    pub async fn import_cws_params<P: AsRef<Path> + Send>(
        &self,
        path: P,
        week_date: NaiveDate,
    ) -> ApiResult<ParamImportSummary> {
        let sheet = UniversalFileParser.parse(path.as_ref())?;
        let (tanks, cws, bws) = futures::try_join!(
            self.storage.get_tanks(),
            self.storage.get_cws_params_history(None),
            self.storage.get_bws_params_history(None),
        )?;
        let plan = ParamImporter::new(&tanks, &cws, &bws, self.today()).plan_cws(&sheet, week_date)?;

        for record in &plan.records {
            self.storage.save_cws_param(record).await?;
        }
        Ok(ParamImportSummary {
            saved: plan.records.len(),
            skipped: plan.skipped,
            skipped_future: plan.skipped_future,
            filled_fields: plan.filled_fields,
            unknown_targets: plan.unknown_targets,
        })
    }

    /// 导入锅炉水参数（week_date 所在周）
    #[instrument(skip(self, path), fields(path = %path.as_ref().display(), week = %week_date))]
    pub async fn import_bws_params<P: AsRef<Path> + Send>(
        &self,
        path: P,
        week_date: NaiveDate,
    ) -> ApiResult<ParamImportSummary> {
        let sheet = UniversalFileParser.parse(path.as_ref())?;
        let (tanks, cws, bws) = futures::try_join!(
            self.storage.get_tanks(),
            self.storage.get_cws_params_history(None),
            self.storage.get_bws_params_history(None),
        )?;
        let plan = ParamImporter::new(&tanks, &cws, &bws, self.today()).plan_bws(&sheet, week_date)?;

        for record in &plan.records {
            self.storage.save_bws_param(record).await?;
        }
        Ok(ParamImportSummary {
            saved: plan.records.len(),
            skipped: plan.skipped,
            skipped_future: plan.skipped_future,
            filled_fields: plan.filled_fields,
            unknown_targets: plan.unknown_targets,
        })
    }

    // ==========================================
    // 报表 / 导出 / 重算
    // ==========================================

    /// 用量报表（日/周/月，实际 vs 理论）
    #[instrument(skip(self))]
    pub async fn usage_report(
        &self,
        tank_id: &str,
        start: NaiveDate,
        end: NaiveDate,
        metric: UsageMetric,
    ) -> ApiResult<UsageReport> {
        if start > end {
            return Err(ApiError::InvalidInput(format!("start {} > end {}", start, end)));
        }
        let (tanks, readings, supplies, cws, bws) = futures::try_join!(
            self.storage.get_tanks(),
            self.storage.get_readings(Some(tank_id)),
            self.storage.get_supplies(Some(tank_id)),
            self.storage.get_cws_params_history(Some(tank_id)),
            self.storage.get_bws_params_history(Some(tank_id)),
        )?;
        let tank = tanks
            .iter()
            .find(|t| t.id == tank_id)
            .ok_or_else(|| ApiError::NotFound(format!("Tank(id={})", tank_id)))?;

        let timeline = SupplyTimeline::new(&supplies);
        let input = UsageReportInput {
            tank,
            readings: &readings,
            supplies: &timeline,
            cws_history: &cws,
            bws_history: &bws,
        };
        Ok(build_usage_report(&input, start, end, metric, self.today()))
    }

    /// 以设置中的窗口天数截止今天生成报表
    pub async fn usage_report_recent(&self, tank_id: &str, metric: UsageMetric) -> ApiResult<UsageReport> {
        let end = self.today();
        let start = end - Duration::days((self.settings.usage_window_days - 1).max(0));
        self.usage_report(tank_id, start, end, metric).await
    }

    /// 导出全部读数为 CSV，返回行数
    #[instrument(skip(self, path), fields(path = %path.as_ref().display()))]
    pub async fn export_readings<P: AsRef<Path> + Send>(&self, path: P) -> ApiResult<usize> {
        let (readings, tanks) = futures::try_join!(self.storage.get_readings(None), self.storage.get_tanks())?;
        Ok(exporter::export_readings(path.as_ref(), &readings, &tanks)?)
    }

    /// 手动重算储槽全部读数
    pub async fn recalc_tank(&self, tank_id: &str) -> ApiResult<usize> {
        let tank = self.require_tank(tank_id).await?;
        self.cascade_recalc(&tank).await
    }

    // ==========================================
    // 异常纪录 / 备注
    // ==========================================

    pub async fn list_alerts(&self, tank_id: Option<&str>) -> ApiResult<Vec<FluctuationAlert>> {
        Ok(self.storage.get_alerts(tank_id).await?)
    }

    pub async fn add_note(
        &self,
        tank_id: Option<String>,
        date: NaiveDate,
        area: Option<String>,
        chemical_name: Option<String>,
        note: &str,
    ) -> ApiResult<ImportantNote> {
        if note.trim().is_empty() {
            return Err(ApiError::InvalidInput("note".to_string()));
        }
        let record = ImportantNote {
            id: Uuid::new_v4().to_string(),
            tank_id,
            date: local_midnight_ms(date),
            area,
            chemical_name,
            note: note.trim().to_string(),
            created_at: Local::now().naive_local(),
        };
        self.storage.save_note(&record).await?;
        Ok(record)
    }

    pub async fn list_notes(&self, tank_id: Option<&str>) -> ApiResult<Vec<ImportantNote>> {
        Ok(self.storage.get_notes(tank_id).await?)
    }

    pub async fn delete_note(&self, id: &str) -> ApiResult<()> {
        self.storage.delete_note(id).await?;
        Ok(())
    }
}
