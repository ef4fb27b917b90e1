// ==========================================
// 加药管理系统 - 单位与日期标准化
// ==========================================
// 职责:
// - 液位原始值 → cm（PERCENT 模式或带 % 标记时 ×100）
// - 各种日期表示 → 本地零点 epoch 毫秒
// - 报表表头日期解析（西元 / 民国 / 仅月日 / Excel 序列值）
// 红线: 纯函数，不做 I/O
// ==========================================

use crate::domain::tank::Tank;
use crate::domain::types::InputUnit;
use chrono::{Datelike, Duration, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

/// 一天的毫秒数
pub const MS_PER_DAY: i64 = 86_400_000;

/// 民国纪年偏移
const ROC_YEAR_OFFSET: i32 = 1911;

/// Excel 序列值合理范围（约 1902 ~ 2173 年）
const EXCEL_SERIAL_MIN: f64 = 1_000.0;
const EXCEL_SERIAL_MAX: f64 = 100_000.0;
/// 与年份重叠的整数（"2024"）不按 Excel 序列值解析
const YEAR_LIKE_MIN: f64 = 1_900.0;
const YEAR_LIKE_MAX: f64 = 2_200.0;

// ==========================================
// 液位标准化
// ==========================================

/// 液位标准化器
///
/// 同一批导入共用一个实例，converted_count 用于导入结束时提示操作员
#[derive(Debug, Default)]
pub struct LevelNormalizer {
    pub converted_count: usize,
}

impl LevelNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// 将原始液位值转换为 cm
    ///
    /// # 规则
    /// - 储槽为 PERCENT 模式（现场录入单位为米）或原始值带 `%` → ×100
    /// - 其他 → 原样返回
    ///
    /// # 返回
    /// - None: 空值或无法解析为数字
    pub fn normalize(&mut self, raw: &str, tank: &Tank) -> Option<f64> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }

        let has_percent_marker = trimmed.contains('%');
        let numeric: String = trimmed
            .chars()
            .filter(|c| *c != '%' && *c != ',' && !c.is_whitespace())
            .collect();
        let value = numeric.parse::<f64>().ok().filter(|v| v.is_finite())?;

        if tank.input_unit == InputUnit::Percent || has_percent_marker {
            self.converted_count += 1;
            Some(value * 100.0)
        } else {
            Some(value)
        }
    }
}

// ==========================================
// 时间戳标准化
// ==========================================

/// 可被标准化的日期输入
#[derive(Debug, Clone, Copy)]
pub enum DateLike<'a> {
    Text(&'a str),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    /// 视为已标准化，原样返回
    EpochMillis(i64),
}

/// 标准化为本地零点 epoch 毫秒
///
/// # 返回
/// - None: 空字符串或无法解析
pub fn normalize_timestamp(input: DateLike<'_>) -> Option<i64> {
    match input {
        DateLike::EpochMillis(ms) => Some(ms),
        DateLike::Date(date) => Some(local_midnight_ms(date)),
        DateLike::DateTime(dt) => Some(local_midnight_ms(dt.date())),
        DateLike::Text(text) => {
            let text = text.trim();
            if text.is_empty() {
                return None;
            }
            parse_western_date(text).map(local_midnight_ms)
        }
    }
}

/// 指定日期本地零点的 epoch 毫秒
pub fn local_midnight_ms(date: NaiveDate) -> i64 {
    let naive = date.and_time(NaiveTime::default());
    match Local.from_local_datetime(&naive).earliest() {
        Some(dt) => dt.timestamp_millis(),
        // 夏令时跳变导致零点不存在时按 UTC 处理
        None => Utc.from_utc_datetime(&naive).timestamp_millis(),
    }
}

/// epoch 毫秒对应的本地日历日
pub fn day_of(ms: i64) -> NaiveDate {
    Local
        .timestamp_millis_opt(ms)
        .earliest()
        .map(|dt| dt.date_naive())
        .unwrap_or_default()
}

/// 显示用日期格式 YYYY/MM/DD
pub fn format_day(ms: i64) -> String {
    day_of(ms).format("%Y/%m/%d").to_string()
}

/// 本地当日
pub fn today_local() -> NaiveDate {
    Local::now().date_naive()
}

/// 两个时间戳相差的天数（可为小数）
pub fn diff_days(from_ms: i64, to_ms: i64) -> f64 {
    (to_ms - from_ms) as f64 / MS_PER_DAY as f64
}

/// Excel 序列值 → 日期（1900 日期系统，基准 1899-12-30）
pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 1.0 || serial > 2_958_465.0 {
        return None;
    }
    let base = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    base.checked_add_signed(Duration::days(serial.floor() as i64))
}

// ==========================================
// 表头日期解析
// ==========================================

/// 解析来源不一的表头日期
///
/// # 解析顺序
/// 0. 纯数字且在 Excel 序列值范围内（年份形态的整数除外）→ Excel 日期
/// 1. 含 4 位数年份 → 西元日期
/// 2. 民国纪年 `YY[/.-]MM[/.-]DD`，0 < YY < 200，year = YY + 1911
/// 3. 仅月日 → 补当年
/// 4. 英文月份名（无年份）→ 补当年
///
/// 仅月日的字符串绝不落到 2001 年等默认年份
pub fn parse_flexible_date_key(key: &str, today: NaiveDate) -> Option<NaiveDate> {
    let key = key.trim();
    if key.is_empty() {
        return None;
    }

    if let Ok(serial) = key.parse::<f64>() {
        let year_like = serial.fract() == 0.0 && (YEAR_LIKE_MIN..=YEAR_LIKE_MAX).contains(&serial);
        if (EXCEL_SERIAL_MIN..EXCEL_SERIAL_MAX).contains(&serial) && !key.contains('-') && !year_like {
            return excel_serial_to_date(serial);
        }
    }

    if has_four_digit_year(key) {
        return parse_western_date(key);
    }

    if let Some(date) = parse_roc_date(key) {
        return Some(date);
    }

    if let Some(date) = parse_month_day(key, today.year()) {
        return Some(date);
    }

    parse_month_name(key, today.year())
}

/// 是否包含连续 4 位以上数字
fn has_four_digit_year(s: &str) -> bool {
    let mut run = 0;
    for c in s.chars() {
        if c.is_ascii_digit() {
            run += 1;
            if run >= 4 {
                return true;
            }
        } else {
            run = 0;
        }
    }
    false
}

/// 西元日期（含时间部分时只取日期）
fn parse_western_date(s: &str) -> Option<NaiveDate> {
    const DATE_FORMATS: [&str; 9] = [
        "%Y-%m-%d",
        "%Y/%m/%d",
        "%Y.%m.%d",
        "%Y%m%d",
        "%Y年%m月%d日",
        "%m/%d/%Y",
        "%b %d, %Y",
        "%B %d, %Y",
        "%d %b %Y",
    ];
    const DATETIME_FORMATS: [&str; 7] = [
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
        "%Y/%m/%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%Y/%m/%d %H:%M",
        "%m/%d/%Y %H:%M",
    ];

    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Local).date_naive());
    }
    None
}

/// 按 / . - 切分后全部为数字的片段
fn split_numeric(s: &str) -> Option<Vec<&str>> {
    let parts: Vec<&str> = s.split(['/', '.', '-']).collect();
    if parts
        .iter()
        .all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()))
    {
        Some(parts)
    } else {
        None
    }
}

/// 民国纪年日期
fn parse_roc_date(s: &str) -> Option<NaiveDate> {
    let parts = split_numeric(s)?;
    if parts.len() != 3 || parts[0].len() > 3 || parts[1].len() > 2 || parts[2].len() > 2 {
        return None;
    }
    let roc_year: i32 = parts[0].parse().ok()?;
    if roc_year <= 0 || roc_year >= 200 {
        return None;
    }
    let month: u32 = parts[1].parse().ok()?;
    let day: u32 = parts[2].parse().ok()?;
    NaiveDate::from_ymd_opt(roc_year + ROC_YEAR_OFFSET, month, day)
}

/// 仅月日（1/15、01-15、1月15日）
fn parse_month_day(s: &str, year: i32) -> Option<NaiveDate> {
    if let Ok(d) = NaiveDate::parse_from_str(&format!("{}年{}", year, s), "%Y年%m月%d日") {
        return Some(d);
    }
    let parts = split_numeric(s)?;
    if parts.len() != 2 || parts[0].len() > 2 || parts[1].len() > 2 {
        return None;
    }
    let month: u32 = parts[0].parse().ok()?;
    let day: u32 = parts[1].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// 英文月份名（Jan 15 / 15-Jan / January 15）
fn parse_month_name(s: &str, year: i32) -> Option<NaiveDate> {
    const FORMATS: [&str; 4] = ["%b %d %Y", "%B %d %Y", "%d-%b %Y", "%d %b %Y"];
    let with_year = format!("{} {}", s, year);
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(&with_year, fmt).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::SystemCategory;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_level_passthrough_in_cm_mode() {
        let tank = Tank::new("T1", "CT-1 分散剂", SystemCategory::Cooling);
        let mut normalizer = LevelNormalizer::new();

        assert_eq!(normalizer.normalize("123.5", &tank), Some(123.5));
        assert_eq!(normalizer.converted_count, 0);
    }

    #[test]
    fn test_level_percent_mode_and_marker() {
        let mut tank = Tank::new("T1", "CT-1 分散剂", SystemCategory::Cooling);
        let mut normalizer = LevelNormalizer::new();

        // 带 % 标记即换算
        assert_eq!(normalizer.normalize("1.25%", &tank), Some(125.0));

        tank.input_unit = InputUnit::Percent;
        assert_eq!(normalizer.normalize(" 0.8 ", &tank), Some(80.0));
        assert_eq!(normalizer.converted_count, 2);
    }

    #[test]
    fn test_level_invalid_values() {
        let tank = Tank::new("T1", "CT-1 分散剂", SystemCategory::Cooling);
        let mut normalizer = LevelNormalizer::new();

        assert_eq!(normalizer.normalize("", &tank), None);
        assert_eq!(normalizer.normalize("N/A", &tank), None);
        assert_eq!(normalizer.converted_count, 0);
    }

    #[test]
    fn test_normalize_timestamp_snaps_to_midnight() {
        let ms = normalize_timestamp(DateLike::Text("2024-03-05T15:30:00")).unwrap();
        assert_eq!(ms, local_midnight_ms(ymd(2024, 3, 5)));
        assert_eq!(day_of(ms), ymd(2024, 3, 5));
    }

    #[test]
    fn test_normalize_timestamp_idempotent() {
        let first = normalize_timestamp(DateLike::Text("2024/12/31")).unwrap();
        let second = normalize_timestamp(DateLike::EpochMillis(first)).unwrap();
        assert_eq!(first, second);

        let dt = ymd(2023, 7, 1).and_hms_opt(18, 45, 0).unwrap();
        let from_dt = normalize_timestamp(DateLike::DateTime(dt)).unwrap();
        assert_eq!(normalize_timestamp(DateLike::EpochMillis(from_dt)), Some(from_dt));
    }

    #[test]
    fn test_normalize_timestamp_invalid() {
        assert_eq!(normalize_timestamp(DateLike::Text("")), None);
        assert_eq!(normalize_timestamp(DateLike::Text("not a date")), None);
    }

    #[test]
    fn test_parse_roc_date() {
        let today = ymd(2024, 6, 1);
        assert_eq!(parse_flexible_date_key("111-05-20", today), Some(ymd(2022, 5, 20)));
        assert_eq!(parse_flexible_date_key("113/1/2", today), Some(ymd(2024, 1, 2)));
        assert_eq!(parse_flexible_date_key("99.12.31", today), Some(ymd(2010, 12, 31)));
    }

    #[test]
    fn test_parse_western_date() {
        let today = ymd(2024, 6, 1);
        assert_eq!(parse_flexible_date_key("2023-11-07", today), Some(ymd(2023, 11, 7)));
        assert_eq!(parse_flexible_date_key("2023/1/7", today), Some(ymd(2023, 1, 7)));
        assert_eq!(parse_flexible_date_key("2023-13-40", today), None);
    }

    #[test]
    fn test_parse_western_date_spreadsheet_variants() {
        let today = ymd(2024, 6, 1);
        assert_eq!(parse_flexible_date_key("5/1/2024", today), Some(ymd(2024, 5, 1)));
        assert_eq!(parse_flexible_date_key("05/01/2024 07:00", today), Some(ymd(2024, 5, 1)));
        assert_eq!(parse_flexible_date_key("2024/05/01 00:00", today), Some(ymd(2024, 5, 1)));
        assert_eq!(parse_flexible_date_key("2024-05-01 08:30", today), Some(ymd(2024, 5, 1)));
        assert_eq!(parse_flexible_date_key("May 1, 2024", today), Some(ymd(2024, 5, 1)));
        assert_eq!(parse_flexible_date_key("September 30, 2023", today), Some(ymd(2023, 9, 30)));
        assert_eq!(parse_flexible_date_key("Sep 30, 2023", today), Some(ymd(2023, 9, 30)));
    }

    #[test]
    fn test_year_like_integer_is_not_excel_serial() {
        let today = ymd(2024, 6, 1);
        assert_eq!(parse_flexible_date_key("2024", today), None);
        assert_eq!(parse_flexible_date_key("1999", today), None);
        // 超出年份区间的整数仍按序列值
        assert_eq!(parse_flexible_date_key("45306", today), Some(ymd(2024, 1, 15)));
    }

    #[test]
    fn test_bare_month_day_uses_current_year() {
        let today = ymd(2024, 6, 1);
        assert_eq!(parse_flexible_date_key("1/15", today), Some(ymd(2024, 1, 15)));
        assert_eq!(parse_flexible_date_key("03-08", today), Some(ymd(2024, 3, 8)));
        assert_eq!(parse_flexible_date_key("1月15日", today), Some(ymd(2024, 1, 15)));
        assert_eq!(parse_flexible_date_key("Jan 15", today), Some(ymd(2024, 1, 15)));
    }

    #[test]
    fn test_excel_serial_header() {
        let today = ymd(2024, 6, 1);
        // 45306 = 2024-01-15
        assert_eq!(parse_flexible_date_key("45306", today), Some(ymd(2024, 1, 15)));
        assert_eq!(excel_serial_to_date(0.0), None);
    }

    #[test]
    fn test_unparseable_key() {
        let today = ymd(2024, 6, 1);
        assert_eq!(parse_flexible_date_key("储槽名称", today), None);
        assert_eq!(parse_flexible_date_key("", today), None);
        assert_eq!(parse_flexible_date_key("250-01-01", today), None);
    }
}
