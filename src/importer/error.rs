// ==========================================
// 加药管理系统 - 导入模块错误类型
// ==========================================
// 文件级错误中止整个导入；行级问题以 RowIssue 收集，不走错误通道
// ==========================================

use thiserror::Error;

/// 导入模块错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 文件相关错误 =====
    #[error("文件不存在: {0}")]
    FileNotFound(String),

    #[error("文件格式不支持: {0}（仅支持 .xlsx/.xls/.csv）")]
    UnsupportedFormat(String),

    #[error("文件读取失败: {0}")]
    FileReadError(String),

    #[error("Excel 解析失败: {0}")]
    ExcelParseError(String),

    #[error("CSV 解析失败: {0}")]
    CsvParseError(String),

    #[error("CSV 写出失败: {0}")]
    CsvWriteError(String),

    // ===== 表结构错误 =====
    #[error("工作表无数据")]
    EmptySheet,

    #[error("缺少必要栏位: {0}")]
    MissingColumn(String),

    #[error("参数日期无效: {0}")]
    InvalidWeekDate(String),

    // ===== 单笔录入错误 =====
    #[error("找不到储槽: {0}")]
    UnknownTank(String),

    #[error("日期晚于今天: {0}")]
    FutureDate(String),

    #[error("数值无效 (字段 {field}): {value}")]
    InvalidValue { field: String, value: String },

    // ===== 通用错误 =====
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::FileReadError(err.to_string())
    }
}

impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::CsvParseError(err.to_string())
    }
}

impl From<calamine::Error> for ImportError {
    fn from(err: calamine::Error) -> Self {
        ImportError::ExcelParseError(err.to_string())
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;
