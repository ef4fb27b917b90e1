// ==========================================
// 加药管理系统 - 文件解析器
// ==========================================
// 支持: Excel (.xlsx/.xls) / CSV (.csv)
// 输出: 保序表头 + 以表头为键的行（只取第一个工作表）
// Excel 日期储存格以序列值文本输出，由日期正规化处理
// ==========================================

use crate::importer::error::{ImportError, ImportResult};
use calamine::{open_workbook_auto, Reader};
use csv::ReaderBuilder;
use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

/// 原始行（row_number 为表格中的 1 起始行号，含表头行）
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRow {
    pub row_number: usize,
    pub cells: HashMap<String, String>,
}

impl RawRow {
    pub fn get(&self, header: &str) -> Option<&str> {
        self.cells
            .get(header)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }
}

/// 原始工作表
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawSheet {
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
}

impl RawSheet {
    /// 由表头与行值构建，空白行跳过
    pub fn from_rows(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let mut sheet = RawSheet {
            headers,
            rows: Vec::new(),
        };
        for (idx, values) in rows.into_iter().enumerate() {
            let cells: HashMap<String, String> = sheet
                .headers
                .iter()
                .zip(values)
                .filter(|(h, _)| !h.is_empty())
                .map(|(h, v)| (h.clone(), v.trim().to_string()))
                .collect();
            if cells.values().all(|v| v.is_empty()) {
                continue;
            }
            sheet.rows.push(RawRow {
                row_number: idx + 2,
                cells,
            });
        }
        sheet
    }
}

pub trait FileParser {
    fn parse(&self, file_path: &Path) -> ImportResult<RawSheet>;
}

fn ensure_exists(path: &Path) -> ImportResult<()> {
    if path.exists() {
        Ok(())
    } else {
        Err(ImportError::FileNotFound(path.display().to_string()))
    }
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}

// ==========================================
// CSV Parser
// ==========================================
pub struct CsvParser;

impl FileParser for CsvParser {
    fn parse(&self, file_path: &Path) -> ImportResult<RawSheet> {
        ensure_exists(file_path)?;
        let ext = extension_of(file_path);
        if ext != "csv" {
            return Err(ImportError::UnsupportedFormat(ext));
        }

        let file = File::open(file_path)?;
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true) // 允许行长度不一致
            .from_reader(file);

        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim().trim_start_matches('\u{feff}').to_string())
            .collect();

        let mut rows = Vec::new();
        for result in reader.records() {
            let record = result?;
            rows.push(record.iter().map(|v| v.to_string()).collect());
        }

        Ok(RawSheet::from_rows(headers, rows))
    }
}

// ==========================================
// Excel Parser
// ==========================================
pub struct ExcelParser;

impl FileParser for ExcelParser {
    fn parse(&self, file_path: &Path) -> ImportResult<RawSheet> {
        ensure_exists(file_path)?;
        let ext = extension_of(file_path);
        if ext != "xlsx" && ext != "xls" {
            return Err(ImportError::UnsupportedFormat(ext));
        }

        let mut workbook = open_workbook_auto(file_path)?;
        let sheet_name = workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| ImportError::ExcelParseError("Excel 文件无工作表".to_string()))?;
        let range = workbook.worksheet_range(&sheet_name)?;

        let mut rows = range.rows();
        let headers: Vec<String> = rows
            .next()
            .ok_or(ImportError::EmptySheet)?
            .iter()
            .map(|cell| cell.to_string().trim().to_string())
            .collect();

        let data: Vec<Vec<String>> = rows
            .map(|row| row.iter().map(|cell| cell.to_string()).collect())
            .collect();

        Ok(RawSheet::from_rows(headers, data))
    }
}

// ==========================================
// 通用文件解析器（根据扩展名自动选择）
// ==========================================
pub struct UniversalFileParser;

impl UniversalFileParser {
    pub fn parse<P: AsRef<Path>>(&self, file_path: P) -> ImportResult<RawSheet> {
        let path = file_path.as_ref();
        match extension_of(path).as_str() {
            "csv" => CsvParser.parse(path),
            "xlsx" | "xls" => ExcelParser.parse(path),
            other => Err(ImportError::UnsupportedFormat(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::Builder;

    fn csv_file(lines: &[&str]) -> tempfile::NamedTempFile {
        let mut file = Builder::new().suffix(".csv").tempfile().unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        file
    }

    #[test]
    fn test_csv_keeps_header_order() {
        let file = csv_file(&["儲槽名稱,2024/5/1,2024/5/2", "CT-1 缓蚀剂,120,115"]);
        let sheet = CsvParser.parse(file.path()).unwrap();

        assert_eq!(sheet.headers, vec!["儲槽名稱", "2024/5/1", "2024/5/2"]);
        assert_eq!(sheet.rows.len(), 1);
        assert_eq!(sheet.rows[0].row_number, 2);
        assert_eq!(sheet.rows[0].get("2024/5/2"), Some("115"));
    }

    #[test]
    fn test_csv_skips_blank_rows_and_keeps_row_numbers() {
        let file = csv_file(&["Tank,Level", "A,1", ",", "B,2"]);
        let sheet = CsvParser.parse(file.path()).unwrap();

        assert_eq!(sheet.rows.len(), 2);
        assert_eq!(sheet.rows[1].row_number, 4);
        assert_eq!(sheet.rows[1].get("Tank"), Some("B"));
    }

    #[test]
    fn test_missing_file_and_bad_extension() {
        assert!(matches!(
            CsvParser.parse(Path::new("non_existent.csv")),
            Err(ImportError::FileNotFound(_))
        ));
        assert!(matches!(
            UniversalFileParser.parse("levels.txt"),
            Err(ImportError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_empty_cell_reads_as_none() {
        let row = RawRow {
            row_number: 2,
            cells: [("Price".to_string(), String::new())].into_iter().collect(),
        };
        assert_eq!(row.get("Price"), None);
    }
}
