// ==========================================
// 加药管理系统 - 取值回退链
// ==========================================
// 多层"本笔 → 同批前一笔 → 历史记录 → 默认"的取值规则
// 统一建模为有序的解析步骤，逐一尝试，首个 Some 即采用
// 每个结果附带来源名称，便于日志与审计
// ==========================================

use crate::domain::params::CwsParameterRecord;
use crate::engine::supply_resolver::SupplyTimeline;

/// 解析结果与来源
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolved<T> {
    pub value: T,
    pub source: &'static str,
}

type Step<'a, C, T> = (&'static str, Box<dyn Fn(&C) -> Option<T> + 'a>);

/// 有序回退链
pub struct FallbackChain<'a, C, T> {
    steps: Vec<Step<'a, C, T>>,
}

impl<'a, C, T> Default for FallbackChain<'a, C, T> {
    fn default() -> Self {
        Self { steps: Vec::new() }
    }
}

impl<'a, C, T> FallbackChain<'a, C, T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一个解析步骤
    pub fn then<F>(mut self, source: &'static str, step: F) -> Self
    where
        F: Fn(&C) -> Option<T> + 'a,
    {
        self.steps.push((source, Box::new(step)));
        self
    }

    /// 依序尝试，返回首个命中
    pub fn resolve(&self, ctx: &C) -> Option<Resolved<T>> {
        self.steps.iter().find_map(|(source, step)| {
            step(ctx).map(|value| Resolved {
                value,
                source: *source,
            })
        })
    }

    /// 步骤名称（按优先顺序）
    pub fn sources(&self) -> Vec<&'static str> {
        self.steps.iter().map(|(name, _)| *name).collect()
    }
}

// ==========================================
// 合约目标 ppm
// ==========================================

pub struct PpmContext<'a> {
    pub tank_id: &'a str,
    pub start_date: i64,
    pub row_ppm: Option<f64>,
    /// 同一导入批次中该储槽较早一笔合约的 ppm
    pub batch_prior_ppm: Option<f64>,
    pub history: &'a SupplyTimeline,
}

/// 合约 ppm: 本笔 → 同批前一笔 → 历史合约
pub fn target_ppm_chain<'a>() -> FallbackChain<'a, PpmContext<'a>, f64> {
    FallbackChain::<'a, PpmContext<'a>, f64>::new()
        .then("row", |ctx| ctx.row_ppm)
        .then("batch", |ctx| ctx.batch_prior_ppm)
        .then("history", |ctx| {
            ctx.history.inherited_ppm(ctx.tank_id, ctx.start_date)
        })
}

// ==========================================
// 冷却水参数字段
// ==========================================

pub struct CwsFieldContext<'a> {
    pub row: &'a CwsParameterRecord,
    pub batch_prior: Option<&'a CwsParameterRecord>,
    pub history_latest: Option<&'a CwsParameterRecord>,
}

/// 冷却水参数单字段: 本笔 → 同批前一笔 → 历史最近一笔
pub fn cws_field_chain<'a>(
    field: fn(&CwsParameterRecord) -> Option<f64>,
) -> FallbackChain<'a, CwsFieldContext<'a>, f64> {
    FallbackChain::<'a, CwsFieldContext<'a>, f64>::new()
        .then("row", move |ctx| field(ctx.row))
        .then("batch", move |ctx| ctx.batch_prior.and_then(field))
        .then("history", move |ctx| ctx.history_latest.and_then(field))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::supply::ChemicalSupply;

    #[test]
    fn test_chain_respects_order() {
        let chain: FallbackChain<(Option<i32>, Option<i32>), i32> = FallbackChain::new()
            .then("first", |c: &(Option<i32>, Option<i32>)| c.0)
            .then("second", |c: &(Option<i32>, Option<i32>)| c.1);

        assert_eq!(chain.sources(), vec!["first", "second"]);
        assert_eq!(
            chain.resolve(&(Some(1), Some(2))),
            Some(Resolved { value: 1, source: "first" })
        );
        assert_eq!(
            chain.resolve(&(None, Some(2))),
            Some(Resolved { value: 2, source: "second" })
        );
        assert_eq!(chain.resolve(&(None, None)), None);
    }

    #[test]
    fn test_target_ppm_falls_back_to_history() {
        let history = SupplyTimeline::new(&[ChemicalSupply {
            id: "S0".to_string(),
            tank_id: "T1".to_string(),
            supplier_name: "供应商".to_string(),
            chemical_name: "阻垢剂".to_string(),
            specific_gravity: 1.1,
            price: None,
            start_date: 100,
            target_ppm: Some(35.0),
            notes: None,
        }]);
        let chain = target_ppm_chain();

        let ctx = PpmContext {
            tank_id: "T1",
            start_date: 500,
            row_ppm: None,
            batch_prior_ppm: None,
            history: &history,
        };
        assert_eq!(chain.resolve(&ctx).unwrap().source, "history");

        let ctx = PpmContext {
            batch_prior_ppm: Some(42.0),
            ..ctx
        };
        assert_eq!(chain.resolve(&ctx).unwrap().value, 42.0);
    }

    #[test]
    fn test_cws_field_chain() {
        let row = CwsParameterRecord::default();
        let history = CwsParameterRecord {
            circulation_rate: Some(480.0),
            ..Default::default()
        };
        let ctx = CwsFieldContext {
            row: &row,
            batch_prior: None,
            history_latest: Some(&history),
        };
        let resolved = cws_field_chain(|r| r.circulation_rate).resolve(&ctx).unwrap();
        assert_eq!(resolved.value, 480.0);
        assert_eq!(resolved.source, "history");
    }
}
