// ==========================================
// 加药管理系统 - API 层错误类型
// ==========================================
// 职责: 将导入/仓储错误转换为面向操作员的错误消息
// 软阻断（异常、比重超限）以 ConfirmationRequired 返回，确认后重新提交
// ==========================================

use crate::importer::error::ImportError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    // ===== 业务规则 =====
    #[error("需要确认: {0}")]
    ConfirmationRequired(String),

    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    // ===== 下层错误 =====
    #[error("导入失败: {0}")]
    ImportError(#[from] ImportError),

    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("唯一约束违反: {0}")]
    UniqueConstraintViolation(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => ApiError::NotFound(format!("{}(id={})", entity, id)),
            RepositoryError::UniqueConstraintViolation(msg) => ApiError::UniqueConstraintViolation(msg),
            RepositoryError::FieldValueError { field, message } => {
                ApiError::InvalidInput(format!("{}: {}", field, message))
            }
            RepositoryError::Other(e) => ApiError::Other(e),
            other => ApiError::DatabaseError(other.to_string()),
        }
    }
}

impl ApiError {
    /// 是否为需要确认的软阻断
    pub fn is_confirmation_required(&self) -> bool {
        matches!(self, ApiError::ConfirmationRequired(_))
    }
}

/// API 层 Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_not_found_maps_to_not_found() {
        let api: ApiError = RepositoryError::not_found("Tank", "T9").into();
        assert!(matches!(api, ApiError::NotFound(ref m) if m.contains("T9")));
    }

    #[test]
    fn test_lock_error_maps_to_database_error() {
        let api: ApiError = RepositoryError::LockError("poisoned".to_string()).into();
        assert!(matches!(api, ApiError::DatabaseError(_)));
        assert!(!api.is_confirmation_required());
    }
}
