use crate::domain::error::DomainError;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;

/// Uuidをラップする識別子型を定義する
macro_rules! uuid_identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// 新しい一意の識別子を生成
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// UUIDから識別子を作成
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// 文字列から識別子を作成
            pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
                let uuid = Uuid::parse_str(s)?;
                Ok(Self(uuid))
            }

            /// 内部のUUIDを取得
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }
    };
}

uuid_identifier!(
    /// テナントの一意識別子
    /// すべての操作とクエリはテナント単位で分離される
    TenantId
);

uuid_identifier!(
    /// 品目の一意識別子
    ItemId
);

uuid_identifier!(
    /// 倉庫（保管場所）の一意識別子
    StoreId
);

/// 調達依頼の識別子（自動採番）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProcurementId(i64);

impl ProcurementId {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for ProcurementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 在庫引当の発生元（作業指示など）への不透明な参照
/// 期日が分かっている場合は調達依頼の必要期日に引き継がれる
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OriginRef {
    reference: String,
    due_date: Option<NaiveDate>,
}

impl OriginRef {
    /// 新しい発生元参照を作成
    /// 参照文字列は空にできない
    pub fn new(reference: impl Into<String>, due_date: Option<NaiveDate>) -> Result<Self, DomainError> {
        let reference = reference.into();
        if reference.trim().is_empty() {
            return Err(DomainError::InvalidValue(
                "発生元参照は空にできません".to_string(),
            ));
        }
        Ok(Self {
            reference,
            due_date,
        })
    }

    /// 参照文字列を取得
    pub fn reference(&self) -> &str {
        &self.reference
    }

    /// 期日を取得
    pub fn due_date(&self) -> Option<NaiveDate> {
        self.due_date
    }
}

impl fmt::Display for OriginRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.reference)
    }
}

/// 数量が正であることを検証する
///
/// # Arguments
/// * `quantity` - 検証する数量
///
/// # Returns
/// * `Ok(Decimal)` - 正の数量
/// * `Err(DomainError::InvalidQuantity)` - 0以下の数量
pub fn positive_quantity(quantity: Decimal) -> Result<Decimal, DomainError> {
    if quantity <= Decimal::ZERO {
        return Err(DomainError::InvalidQuantity(format!(
            "数量は正である必要があります: {}",
            quantity
        )));
    }
    Ok(quantity)
}

/// 原価計算方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RateType {
    /// 固定単価
    Standard,
    /// 移動加重平均
    Avg,
}

impl fmt::Display for RateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RateType::Standard => "STANDARD",
            RateType::Avg => "AVG",
        };
        write!(f, "{}", s)
    }
}

impl RateType {
    /// 文字列からRateTypeを作成
    pub fn from_string(s: &str) -> Result<Self, DomainError> {
        match s {
            "STANDARD" => Ok(RateType::Standard),
            "AVG" => Ok(RateType::Avg),
            _ => Err(DomainError::InvalidValue(format!("無効な原価計算方式: {}", s))),
        }
    }
}

/// 元帳の取引種別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TxType {
    In,
    Out,
    Adjust,
}

impl fmt::Display for TxType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TxType::In => "IN",
            TxType::Out => "OUT",
            TxType::Adjust => "ADJUST",
        };
        write!(f, "{}", s)
    }
}

impl TxType {
    /// 文字列からTxTypeを作成
    pub fn from_string(s: &str) -> Result<Self, DomainError> {
        match s {
            "IN" => Ok(TxType::In),
            "OUT" => Ok(TxType::Out),
            "ADJUST" => Ok(TxType::Adjust),
            _ => Err(DomainError::InvalidValue(format!("無効な取引種別: {}", s))),
        }
    }
}

/// 元帳エントリを発生させた業務イベントの種別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RefType {
    WoIssue,
    PoReceipt,
    Adjustment,
    Transfer,
    WoReturn,
}

impl fmt::Display for RefType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RefType::WoIssue => "WO_ISSUE",
            RefType::PoReceipt => "PO_RECEIPT",
            RefType::Adjustment => "ADJUSTMENT",
            RefType::Transfer => "TRANSFER",
            RefType::WoReturn => "WO_RETURN",
        };
        write!(f, "{}", s)
    }
}

impl RefType {
    /// 文字列からRefTypeを作成
    pub fn from_string(s: &str) -> Result<Self, DomainError> {
        match s {
            "WO_ISSUE" => Ok(RefType::WoIssue),
            "PO_RECEIPT" => Ok(RefType::PoReceipt),
            "ADJUSTMENT" => Ok(RefType::Adjustment),
            "TRANSFER" => Ok(RefType::Transfer),
            "WO_RETURN" => Ok(RefType::WoReturn),
            _ => Err(DomainError::InvalidValue(format!("無効な参照種別: {}", s))),
        }
    }
}

/// 在庫の増減方向
/// IN/OUTは種別から決まり、ADJUSTのみ明示的に保持する
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Inbound,
    Outbound,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Direction::Inbound => "INBOUND",
            Direction::Outbound => "OUTBOUND",
        };
        write!(f, "{}", s)
    }
}

impl Direction {
    /// 文字列からDirectionを作成
    pub fn from_string(s: &str) -> Result<Self, DomainError> {
        match s {
            "INBOUND" => Ok(Direction::Inbound),
            "OUTBOUND" => Ok(Direction::Outbound),
            _ => Err(DomainError::InvalidValue(format!("無効な増減方向: {}", s))),
        }
    }
}

/// 調達依頼のステータス
/// DRAFT → RECEIVED の一方向のみ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcurementStatus {
    /// 起票済み（未入荷）
    Draft,
    /// 入荷済み
    Received,
}

impl fmt::Display for ProcurementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProcurementStatus::Draft => "DRAFT",
            ProcurementStatus::Received => "RECEIVED",
        };
        write!(f, "{}", s)
    }
}

impl ProcurementStatus {
    /// 文字列からProcurementStatusを作成
    pub fn from_string(s: &str) -> Result<Self, DomainError> {
        match s {
            "DRAFT" => Ok(ProcurementStatus::Draft),
            "RECEIVED" => Ok(ProcurementStatus::Received),
            _ => Err(DomainError::InvalidValue(format!(
                "無効な調達依頼ステータス: {}",
                s
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_creation() {
        let id1 = ItemId::new();
        let id2 = ItemId::new();
        assert_ne!(id1, id2, "Each ItemId should be unique");
    }

    #[test]
    fn test_identifier_from_string() {
        let store_id = StoreId::new();
        let parsed = StoreId::from_string(&store_id.to_string()).unwrap();
        assert_eq!(parsed, store_id);
        assert!(TenantId::from_string("not-a-uuid").is_err());
    }

    #[test]
    fn test_positive_quantity() {
        assert!(positive_quantity(Decimal::ONE).is_ok());
        assert!(positive_quantity(Decimal::ZERO).is_err());
        assert!(positive_quantity(Decimal::NEGATIVE_ONE).is_err());
    }

    #[test]
    fn test_origin_ref_rejects_blank_reference() {
        assert!(OriginRef::new("   ", None).is_err());
        let origin = OriginRef::new("WO-1001", NaiveDate::from_ymd_opt(2026, 11, 1)).unwrap();
        assert_eq!(origin.reference(), "WO-1001");
        assert_eq!(origin.due_date(), NaiveDate::from_ymd_opt(2026, 11, 1));
    }

    #[test]
    fn test_ref_type_string_conversion() {
        for ref_type in [
            RefType::WoIssue,
            RefType::PoReceipt,
            RefType::Adjustment,
            RefType::Transfer,
            RefType::WoReturn,
        ] {
            assert_eq!(RefType::from_string(&ref_type.to_string()).unwrap(), ref_type);
        }
        assert!(RefType::from_string("SHIPMENT").is_err());
    }

    #[test]
    fn test_procurement_status_from_string() {
        assert_eq!(
            ProcurementStatus::from_string("RECEIVED").unwrap(),
            ProcurementStatus::Received
        );
        assert!(ProcurementStatus::from_string("CANCELLED").is_err());
    }
}
