use crate::domain::error::DomainError;
use crate::domain::model::TenantId;
use crate::domain::port::{RepositoryError, TenantError};
use rust_decimal::Decimal;

/// アプリケーション層のエラー型
/// ドメインエラー、リポジトリエラーをラップし、在庫不足を業務上のシグナルとして表す
#[derive(Debug, thiserror::Error)]
pub enum ApplicationError {
    /// 在庫不足（呼び出し元に返す業務シグナルで、システム障害ではない）
    #[error("Insufficient stock for item {item_code}: required {required}, on hand {on_hand}")]
    InsufficientStock {
        item_code: String,
        required: Decimal,
        on_hand: Decimal,
    },
    /// エンティティが見つからない
    #[error("Not found: {0}")]
    NotFound(String),
    /// 業務ルール違反（返品数量の超過、存在しない在庫行への返品など）
    #[error("Business rule violated: {0}")]
    BusinessRule(String),
    /// テナントの契約が無効
    #[error("Tenant {0} is not active")]
    TenantInactive(TenantId),
    /// ドメインエラー（値の検証失敗）
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),
    /// リポジトリエラー（永続化の失敗）
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

impl ApplicationError {
    /// 呼び出し元が再試行してよいエラーかチェック
    /// ロック待ちタイムアウト、デッドロック、バージョン競合が該当する
    pub fn is_retryable(&self) -> bool {
        matches!(self, ApplicationError::Repository(err) if err.is_transient())
    }
}

impl From<TenantError> for ApplicationError {
    fn from(err: TenantError) -> Self {
        match err {
            TenantError::Inactive(tenant_id) => ApplicationError::TenantInactive(tenant_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_insufficient_stock_message() {
        let err = ApplicationError::InsufficientStock {
            item_code: "X".to_string(),
            required: dec!(5),
            on_hand: dec!(3),
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for item X: required 5, on hand 3"
        );
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_deadlock_is_retryable() {
        let err = ApplicationError::from(RepositoryError::Transient("1213".to_string()));
        assert!(err.is_retryable());
        let err = ApplicationError::from(RepositoryError::OperationFailed("x".to_string()));
        assert!(!err.is_retryable());
    }
}
