use crate::domain::model::RateType;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 品目登録用のリクエストDTO
#[derive(Serialize, Deserialize)]
pub struct RegisterItemRequest {
    pub code: String,
    pub name: String,
    pub unit_of_measure: String,
    pub rate: Decimal,
    pub rate_type: RateType,
    #[serde(default)]
    pub tax_percent: Decimal,
}

/// 在庫確保用のリクエストDTO
#[derive(Serialize, Deserialize)]
pub struct EnsureStockRequest {
    pub store_id: Uuid,
    pub qty: Decimal,
    pub origin_ref: Option<String>,
    pub due_date: Option<NaiveDate>,
}

/// 全倉庫での在庫確保用のリクエストDTO
#[derive(Serialize, Deserialize)]
pub struct EnsureAnyStoreRequest {
    pub qty: Decimal,
    pub origin_ref: Option<String>,
    pub due_date: Option<NaiveDate>,
}

/// 作業指示への払出し・返品用のリクエストDTO
#[derive(Serialize, Deserialize)]
pub struct WorkOrderMovementRequest {
    pub qty: Decimal,
    pub work_order_ref: String,
}

/// 入荷用のリクエストDTO
#[derive(Serialize, Deserialize)]
pub struct ReceiveRequest {
    pub qty: Decimal,
    pub procurement_id: Option<i64>,
    pub unit_cost: Option<Decimal>,
}

/// 在庫訂正用のリクエストDTO
#[derive(Serialize, Deserialize)]
pub struct AdjustRequest {
    pub delta: Decimal,
    pub note: Option<String>,
}

/// 引当・引当解放用のリクエストDTO
#[derive(Serialize, Deserialize)]
pub struct QuantityRequest {
    pub qty: Decimal,
}

/// 調達依頼一覧取得用のクエリパラメータ
#[derive(Deserialize)]
pub struct ProcurementQueryParams {
    pub status: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_register_item_request_defaults_tax() {
        let json = r#"{"code":"CBL-10","name":"Cable","unit_of_measure":"m","rate":"12.5","rate_type":"AVG"}"#;
        let request: RegisterItemRequest = serde_json::from_str(json).unwrap();

        assert_eq!(request.rate, dec!(12.5));
        assert_eq!(request.rate_type, RateType::Avg);
        assert_eq!(request.tax_percent, Decimal::ZERO);
    }

    #[test]
    fn test_ensure_request_with_due_date() {
        let json = format!(
            r#"{{"store_id":"{}","qty":5,"origin_ref":"WO-1","due_date":"2026-12-01"}}"#,
            Uuid::new_v4()
        );
        let request: EnsureStockRequest = serde_json::from_str(&json).unwrap();

        assert_eq!(request.qty, dec!(5));
        assert_eq!(request.due_date, NaiveDate::from_ymd_opt(2026, 12, 1));
    }

    #[test]
    fn test_receive_request_optional_fields() {
        let request: ReceiveRequest = serde_json::from_str(r#"{"qty":3}"#).unwrap();

        assert!(request.procurement_id.is_none());
        assert!(request.unit_cost.is_none());
    }
}
