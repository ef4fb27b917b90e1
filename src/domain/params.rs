// ==========================================
// 加药管理系统 - 生产参数领域模型
// ==========================================
// 冷却水 (CWS) / 锅炉水 (BWS) 周参数快照
// 每个 (tank_id, date) 仅一笔，date 为该周周一零点
// ==========================================

use serde::{Deserialize, Serialize};

// ==========================================
// CwsParameterRecord - 冷却水周参数
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CwsParameterRecord {
    pub id: String,
    pub tank_id: String,
    pub date: i64,
    pub circulation_rate: Option<f64>, // m³/h
    pub temp_outlet: Option<f64>,      // °C
    pub temp_return: Option<f64>,      // °C
    pub temp_diff: Option<f64>,
    pub cws_hardness: Option<f64>,     // ppm
    pub makeup_hardness: Option<f64>,  // ppm
    pub concentration_cycles: Option<f64>, // 人工设定浓缩倍数
    pub target_ppm: Option<f64>,
}

impl CwsParameterRecord {
    /// 温差：优先使用已存的 temp_diff，否则由进出水温度推导
    pub fn effective_temp_diff(&self) -> Option<f64> {
        if let Some(diff) = self.temp_diff {
            return Some(diff);
        }
        match (self.temp_return, self.temp_outlet) {
            (Some(ret), Some(out)) => Some((ret - out).abs()),
            _ => None,
        }
    }
}

// ==========================================
// BwsParameterRecord - 锅炉水周参数
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BwsParameterRecord {
    pub id: String,
    pub tank_id: String,
    pub date: i64,
    pub steam_production: Option<f64>, // 当周蒸汽产量 (t)
    pub target_ppm: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temp_diff_derived_from_temperatures() {
        let rec = CwsParameterRecord {
            temp_outlet: Some(30.0),
            temp_return: Some(36.5),
            ..Default::default()
        };
        assert_eq!(rec.effective_temp_diff(), Some(6.5));

        let manual = CwsParameterRecord {
            temp_diff: Some(4.0),
            temp_outlet: Some(30.0),
            temp_return: Some(36.5),
            ..Default::default()
        };
        assert_eq!(manual.effective_temp_diff(), Some(4.0));
    }
}
