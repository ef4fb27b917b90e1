// ==========================================
// 加药管理系统 - 字段映射器
// ==========================================
// 职责: 表头别名 → 标准字段，行 → 强类型记录
// 四类表格:
//   A 液位: 储槽名称 + 每个日期一栏
//   B 合约: 储槽/供应商/药剂/比重/单价/生效日期/目标 ppm/备注
//   C 冷却水参数: 区域(CT-1/CT-2)或储槽 + 循环量/温度/硬度/浓缩倍数
//   D 锅炉参数: 储槽 + 周蒸汽量
// 输出: 有效记录 + 无效行清单 + 未识别栏位
// ==========================================

use crate::engine::normalizer::parse_flexible_date_key;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::file_parser::{RawRow, RawSheet};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashMap;

// ==========================================
// 标准字段与别名
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    TankName,
    Area,
    Date,
    Supplier,
    Chemical,
    SpecificGravity,
    Price,
    StartDate,
    TargetPpm,
    Notes,
    CirculationRate,
    TempOutlet,
    TempReturn,
    TempDiff,
    CwsHardness,
    MakeupHardness,
    ConcentrationCycles,
    SteamProduction,
}

impl Field {
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            Field::TankName => &["儲槽名稱", "储槽名称", "儲槽", "储槽", "TankName", "Tank"],
            Field::Area => &["區域", "区域", "Area", "冷卻水塔", "冷却水塔"],
            Field::Date => &["日期", "Date", "週起始日", "周起始日", "WeekStart", "Week"],
            Field::Supplier => &["供應商", "供应商", "Supplier", "SupplierName"],
            Field::Chemical => &["藥劑名稱", "药剂名称", "藥劑", "药剂", "Chemical", "ChemicalName"],
            Field::SpecificGravity => &["比重", "SG", "SpecificGravity"],
            Field::Price => &["單價", "单价", "Price", "單價(元/kg)", "单价(元/kg)"],
            Field::StartDate => &["生效日期", "開始日期", "开始日期", "StartDate"],
            Field::TargetPpm => &["目標濃度", "目标浓度", "目標ppm", "目标ppm", "TargetPPM", "ppm"],
            Field::Notes => &["備註", "备注", "Notes", "Note"],
            Field::CirculationRate => &["循環水量", "循环水量", "循環量", "循环量", "CirculationRate"],
            Field::TempOutlet => &["出水溫度", "出水温度", "TempOutlet", "OutletTemp"],
            Field::TempReturn => &["回水溫度", "回水温度", "TempReturn", "ReturnTemp"],
            Field::TempDiff => &["溫差", "温差", "TempDiff", "ΔT"],
            Field::CwsHardness => &["冷卻水硬度", "冷却水硬度", "CwsHardness"],
            Field::MakeupHardness => &["補充水硬度", "补充水硬度", "MakeupHardness"],
            Field::ConcentrationCycles => &["濃縮倍數", "浓缩倍数", "ConcentrationCycles", "Cycles"],
            Field::SteamProduction => &["蒸汽量", "蒸汽產量", "蒸汽产量", "SteamProduction", "Steam"],
        }
    }

    /// 显示名（取第一个别名）
    pub fn label(&self) -> &'static str {
        self.aliases()[0]
    }
}

/// 表头比对用的正规化: 去空白、底线，英文小写
fn normalize_header(header: &str) -> String {
    header
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

// ==========================================
// HeaderIndex - 表头 → 标准字段
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct HeaderIndex {
    columns: HashMap<Field, String>,
    unmapped: Vec<String>,
}

impl HeaderIndex {
    /// 只在候选字段中比对；同一字段出现多栏时取最左栏
    pub fn build(headers: &[String], fields: &[Field]) -> Self {
        let mut index = HeaderIndex::default();
        for header in headers.iter().filter(|h| !h.trim().is_empty()) {
            let key = normalize_header(header);
            let matched = fields.iter().find(|f| {
                f.aliases().iter().any(|alias| normalize_header(alias) == key)
            });
            match matched {
                Some(field) if !index.columns.contains_key(field) => {
                    index.columns.insert(*field, header.clone());
                }
                _ => index.unmapped.push(header.clone()),
            }
        }
        index
    }

    pub fn has(&self, field: Field) -> bool {
        self.columns.contains_key(&field)
    }

    pub fn column(&self, field: Field) -> Option<&str> {
        self.columns.get(&field).map(String::as_str)
    }

    pub fn unmapped(&self) -> &[String] {
        &self.unmapped
    }

    fn require(&self, field: Field) -> ImportResult<()> {
        if self.has(field) {
            Ok(())
        } else {
            Err(ImportError::MissingColumn(field.label().to_string()))
        }
    }
}

// ==========================================
// 映射结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowIssue {
    pub row: usize,
    pub field: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MappedRow<T> {
    pub row_number: usize,
    pub record: T,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MappedSheet<T> {
    pub records: Vec<MappedRow<T>>,
    pub issues: Vec<RowIssue>,
    pub unmapped_columns: Vec<String>,
}

impl<T> MappedSheet<T> {
    fn new(unmapped_columns: Vec<String>) -> Self {
        Self {
            records: Vec::new(),
            issues: Vec::new(),
            unmapped_columns,
        }
    }

    fn push(&mut self, row_number: usize, result: Result<T, Vec<RowIssue>>) {
        match result {
            Ok(record) => self.records.push(MappedRow { row_number, record }),
            Err(issues) => self.issues.extend(issues),
        }
    }

    /// 无效行数（同一行多项问题只计一次）
    pub fn invalid_row_count(&self) -> usize {
        let mut rows: Vec<usize> = self.issues.iter().map(|i| i.row).collect();
        rows.dedup();
        rows.len()
    }
}

/// 数值解析: 去除千分位与空白
pub fn parse_number(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ',')
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

// ==========================================
// RowReader - 单行读取并收集问题
// ==========================================
struct RowReader<'a> {
    index: &'a HeaderIndex,
    row: &'a RawRow,
    today: NaiveDate,
    issues: Vec<RowIssue>,
}

impl<'a> RowReader<'a> {
    fn new(index: &'a HeaderIndex, row: &'a RawRow, today: NaiveDate) -> Self {
        Self {
            index,
            row,
            today,
            issues: Vec::new(),
        }
    }

    fn issue(&mut self, field: Field, message: impl Into<String>) {
        self.issues.push(RowIssue {
            row: self.row.row_number,
            field: Some(field.label().to_string()),
            message: message.into(),
        });
    }

    fn raw(&self, field: Field) -> Option<&'a str> {
        let column = self.index.column(field)?;
        self.row.get(column)
    }

    fn text(&self, field: Field) -> Option<String> {
        self.raw(field).map(|v| v.trim().to_string())
    }

    fn required_text(&mut self, field: Field) -> Option<String> {
        let value = self.text(field);
        if value.is_none() {
            self.issue(field, "必填栏位为空");
        }
        value
    }

    fn number(&mut self, field: Field) -> Option<f64> {
        let raw = self.raw(field)?;
        let value = parse_number(raw);
        if value.is_none() {
            self.issue(field, format!("无法解析为数值: {}", raw));
        }
        value
    }

    fn required_number(&mut self, field: Field) -> Option<f64> {
        if self.raw(field).is_none() {
            self.issue(field, "必填栏位为空");
            return None;
        }
        self.number(field)
    }

    fn date(&mut self, field: Field) -> Option<NaiveDate> {
        let raw = self.raw(field)?;
        let value = parse_flexible_date_key(raw, self.today);
        if value.is_none() {
            self.issue(field, format!("无法解析日期: {}", raw));
        }
        value
    }

    fn required_date(&mut self, field: Field) -> Option<NaiveDate> {
        if self.raw(field).is_none() {
            self.issue(field, "必填栏位为空");
            return None;
        }
        self.date(field)
    }

    fn finish<T>(self, record: Option<T>) -> Result<T, Vec<RowIssue>> {
        match record {
            Some(record) if self.issues.is_empty() => Ok(record),
            _ => Err(self.issues),
        }
    }
}

// ==========================================
// A. 液位表
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct LevelCell {
    pub date: NaiveDate,
    pub raw_level: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LevelRow {
    pub tank_name: String,
    pub cells: Vec<LevelCell>,
}

pub fn map_level_sheet(sheet: &RawSheet, today: NaiveDate) -> ImportResult<MappedSheet<LevelRow>> {
    let index = HeaderIndex::build(&sheet.headers, &[Field::TankName]);
    index.require(Field::TankName)?;

    // 未识别栏位中可解析为日期者即为日期栏
    let mut date_columns: Vec<(String, NaiveDate)> = Vec::new();
    let mut unmapped = Vec::new();
    for header in index.unmapped() {
        match parse_flexible_date_key(header, today) {
            Some(date) => date_columns.push((header.clone(), date)),
            None => unmapped.push(header.clone()),
        }
    }

    let mut mapped = MappedSheet::new(unmapped);
    for row in &sheet.rows {
        let mut reader = RowReader::new(&index, row, today);
        let tank_name = reader.required_text(Field::TankName);
        let cells: Vec<LevelCell> = date_columns
            .iter()
            .filter_map(|(header, date)| {
                row.get(header).map(|raw| LevelCell {
                    date: *date,
                    raw_level: raw.to_string(),
                })
            })
            .collect();
        let record = tank_name.map(|tank_name| LevelRow { tank_name, cells });
        mapped.push(row.row_number, reader.finish(record));
    }
    Ok(mapped)
}

// ==========================================
// B. 合约表
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct SupplyRow {
    pub tank_name: String,
    pub supplier_name: String,
    pub chemical_name: String,
    pub specific_gravity: f64,
    pub price: Option<f64>,
    pub start_date: NaiveDate,
    pub target_ppm: Option<f64>,
    pub notes: Option<String>,
}

const SUPPLY_FIELDS: &[Field] = &[
    Field::TankName,
    Field::Supplier,
    Field::Chemical,
    Field::SpecificGravity,
    Field::Price,
    Field::StartDate,
    Field::TargetPpm,
    Field::Notes,
];

pub fn map_supply_sheet(sheet: &RawSheet, today: NaiveDate) -> ImportResult<MappedSheet<SupplyRow>> {
    let index = HeaderIndex::build(&sheet.headers, SUPPLY_FIELDS);
    for field in [Field::TankName, Field::Chemical, Field::SpecificGravity, Field::StartDate] {
        index.require(field)?;
    }

    let mut mapped = MappedSheet::new(index.unmapped().to_vec());
    for row in &sheet.rows {
        let mut reader = RowReader::new(&index, row, today);
        let tank_name = reader.required_text(Field::TankName);
        let chemical_name = reader.required_text(Field::Chemical);
        let specific_gravity = reader.required_number(Field::SpecificGravity);
        let start_date = reader.required_date(Field::StartDate);
        let price = reader.number(Field::Price);
        let target_ppm = reader.number(Field::TargetPpm);
        let supplier_name = reader.text(Field::Supplier).unwrap_or_default();
        let notes = reader.text(Field::Notes);

        if let Some(sg) = specific_gravity.filter(|sg| *sg <= 0.0) {
            reader.issue(Field::SpecificGravity, format!("比重必须大于 0: {}", sg));
        }

        let record = match (tank_name, chemical_name, specific_gravity, start_date) {
            (Some(tank_name), Some(chemical_name), Some(specific_gravity), Some(start_date)) => {
                Some(SupplyRow {
                    tank_name,
                    supplier_name,
                    chemical_name,
                    specific_gravity,
                    price,
                    start_date,
                    target_ppm,
                    notes,
                })
            }
            _ => None,
        };
        mapped.push(row.row_number, reader.finish(record));
    }
    Ok(mapped)
}

// ==========================================
// C. 冷却水参数表
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub enum CwsTarget {
    /// 冷却水塔区域（CT-1 / CT-2），套用到区域内全部冷却水储槽
    Area(String),
    Tank(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CwsRow {
    pub target: CwsTarget,
    pub date: Option<NaiveDate>,
    pub circulation_rate: Option<f64>,
    pub temp_outlet: Option<f64>,
    pub temp_return: Option<f64>,
    pub temp_diff: Option<f64>,
    pub cws_hardness: Option<f64>,
    pub makeup_hardness: Option<f64>,
    pub concentration_cycles: Option<f64>,
    pub target_ppm: Option<f64>,
}

const CWS_FIELDS: &[Field] = &[
    Field::Area,
    Field::TankName,
    Field::Date,
    Field::CirculationRate,
    Field::TempOutlet,
    Field::TempReturn,
    Field::TempDiff,
    Field::CwsHardness,
    Field::MakeupHardness,
    Field::ConcentrationCycles,
    Field::TargetPpm,
];

pub fn map_cws_sheet(sheet: &RawSheet, today: NaiveDate) -> ImportResult<MappedSheet<CwsRow>> {
    let index = HeaderIndex::build(&sheet.headers, CWS_FIELDS);
    if !index.has(Field::Area) && !index.has(Field::TankName) {
        return Err(ImportError::MissingColumn(format!(
            "{} / {}",
            Field::Area.label(),
            Field::TankName.label()
        )));
    }

    let mut mapped = MappedSheet::new(index.unmapped().to_vec());
    for row in &sheet.rows {
        let mut reader = RowReader::new(&index, row, today);
        let target = match (reader.text(Field::Area), reader.text(Field::TankName)) {
            (Some(area), _) => Some(CwsTarget::Area(area)),
            (None, Some(tank)) => Some(CwsTarget::Tank(tank)),
            (None, None) => {
                reader.issue(Field::Area, "区域与储槽名称均为空");
                None
            }
        };
        let date = reader.date(Field::Date);
        let record = target.map(|target| CwsRow {
            target,
            date,
            circulation_rate: reader.number(Field::CirculationRate),
            temp_outlet: reader.number(Field::TempOutlet),
            temp_return: reader.number(Field::TempReturn),
            temp_diff: reader.number(Field::TempDiff),
            cws_hardness: reader.number(Field::CwsHardness),
            makeup_hardness: reader.number(Field::MakeupHardness),
            concentration_cycles: reader.number(Field::ConcentrationCycles),
            target_ppm: reader.number(Field::TargetPpm),
        });
        mapped.push(row.row_number, reader.finish(record));
    }
    Ok(mapped)
}

// ==========================================
// D. 锅炉参数表
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct BwsRow {
    pub tank_name: String,
    pub date: Option<NaiveDate>,
    pub steam_production: Option<f64>,
    pub target_ppm: Option<f64>,
}

const BWS_FIELDS: &[Field] = &[
    Field::TankName,
    Field::Date,
    Field::SteamProduction,
    Field::TargetPpm,
];

pub fn map_bws_sheet(sheet: &RawSheet, today: NaiveDate) -> ImportResult<MappedSheet<BwsRow>> {
    let index = HeaderIndex::build(&sheet.headers, BWS_FIELDS);
    index.require(Field::TankName)?;
    index.require(Field::SteamProduction)?;

    let mut mapped = MappedSheet::new(index.unmapped().to_vec());
    for row in &sheet.rows {
        let mut reader = RowReader::new(&index, row, today);
        let tank_name = reader.required_text(Field::TankName);
        let date = reader.date(Field::Date);
        let steam_production = reader.required_number(Field::SteamProduction);
        let target_ppm = reader.number(Field::TargetPpm);
        let record = tank_name.map(|tank_name| BwsRow {
            tank_name,
            date,
            steam_production,
            target_ppm,
        });
        mapped.push(row.row_number, reader.finish(record));
    }
    Ok(mapped)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sheet(headers: &[&str], rows: &[&[&str]]) -> RawSheet {
        RawSheet::from_rows(
            headers.iter().map(|h| h.to_string()).collect(),
            rows.iter()
                .map(|r| r.iter().map(|v| v.to_string()).collect())
                .collect(),
        )
    }

    #[test]
    fn test_header_aliases() {
        let headers: Vec<String> = ["儲槽名稱", "Tank Name", "比重", "Color"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let index = HeaderIndex::build(&headers, SUPPLY_FIELDS);

        assert_eq!(index.column(Field::TankName), Some("儲槽名稱"));
        assert_eq!(index.column(Field::SpecificGravity), Some("比重"));
        // 同字段第二栏与无法识别的栏位都列为未映射
        assert_eq!(index.unmapped(), &["Tank Name".to_string(), "Color".to_string()]);
    }

    #[test]
    fn test_level_sheet_date_columns() {
        let sheet = sheet(
            &["储槽名称", "2024/5/1", "5/2", "温度"],
            &[&["CT-1 缓蚀剂", "120", "", "30"], &["", "100", "90", ""]],
        );
        let mapped = map_level_sheet(&sheet, ymd(2024, 6, 1)).unwrap();

        assert_eq!(mapped.unmapped_columns, vec!["温度".to_string()]);
        assert_eq!(mapped.records.len(), 1);
        let row = &mapped.records[0].record;
        assert_eq!(row.tank_name, "CT-1 缓蚀剂");
        assert_eq!(
            row.cells,
            vec![LevelCell {
                date: ymd(2024, 5, 1),
                raw_level: "120".to_string()
            }]
        );
        assert_eq!(mapped.issues.len(), 1);
        assert_eq!(mapped.issues[0].row, 3);
    }

    #[test]
    fn test_level_sheet_requires_tank_column() {
        let sheet = sheet(&["2024/5/1"], &[&["120"]]);
        assert!(matches!(
            map_level_sheet(&sheet, ymd(2024, 6, 1)),
            Err(ImportError::MissingColumn(_))
        ));
    }

    #[test]
    fn test_supply_sheet_collects_invalid_rows() {
        let sheet = sheet(
            &["儲槽", "供應商", "藥劑名稱", "比重", "單價", "生效日期", "目標ppm"],
            &[
                &["CT-1", "甲公司", "缓蚀剂", "1.25", "1,200", "2024/3/1", "50"],
                &["CT-2", "乙公司", "阻垢剂", "abc", "", "2024/3/1", ""],
                &["CT-3", "乙公司", "阻垢剂", "1.1", "", "", ""],
            ],
        );
        let mapped = map_supply_sheet(&sheet, ymd(2024, 6, 1)).unwrap();

        assert_eq!(mapped.records.len(), 1);
        let record = &mapped.records[0].record;
        assert_eq!(record.price, Some(1200.0));
        assert_eq!(record.start_date, ymd(2024, 3, 1));
        assert_eq!(record.target_ppm, Some(50.0));

        assert_eq!(mapped.invalid_row_count(), 2);
        assert_eq!(mapped.issues[0].field.as_deref(), Some("比重"));
    }

    #[test]
    fn test_cws_sheet_area_or_tank() {
        let sheet = sheet(
            &["區域", "儲槽名稱", "循環水量", "溫差", "冷卻水硬度", "補充水硬度"],
            &[
                &["CT-1", "", "500", "5", "800", "200"],
                &["", "CT-2 阻垢剂", "", "", "", ""],
            ],
        );
        let mapped = map_cws_sheet(&sheet, ymd(2024, 6, 1)).unwrap();

        assert_eq!(mapped.records.len(), 2);
        assert_eq!(mapped.records[0].record.target, CwsTarget::Area("CT-1".to_string()));
        assert_eq!(mapped.records[0].record.circulation_rate, Some(500.0));
        assert_eq!(
            mapped.records[1].record.target,
            CwsTarget::Tank("CT-2 阻垢剂".to_string())
        );
        assert_eq!(mapped.records[1].record.circulation_rate, None);
    }

    #[test]
    fn test_bws_sheet() {
        let sheet = sheet(
            &["储槽", "蒸汽量", "目标ppm"],
            &[&["锅炉清罐剂", "700", "20"], &["锅炉脱氧剂", "", ""]],
        );
        let mapped = map_bws_sheet(&sheet, ymd(2024, 6, 1)).unwrap();
        assert_eq!(mapped.records.len(), 1);
        assert_eq!(mapped.records[0].record.steam_production, Some(700.0));
        assert_eq!(mapped.issues.len(), 1);
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number(" 1,234.5 "), Some(1234.5));
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("n/a"), None);
    }
}
