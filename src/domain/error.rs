/// ドメイン層のエラー型
/// ビジネスルール違反を表現する
#[derive(Debug, Clone, PartialEq)]
pub enum DomainError {
    /// 在庫不足（手持ち数量が要求数量に満たない）
    InsufficientInventory,
    /// 無効な数量（例: 0以下の数量、手持ちを負にする調整）
    InvalidQuantity(String),
    /// 無効な値
    InvalidValue(String),
}

impl std::fmt::Display for DomainError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DomainError::InsufficientInventory => write!(f, "Insufficient inventory"),
            DomainError::InvalidQuantity(msg) => write!(f, "Invalid quantity: {}", msg),
            DomainError::InvalidValue(msg) => write!(f, "Invalid value: {}", msg),
        }
    }
}

impl std::error::Error for DomainError {}
