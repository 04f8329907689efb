use crate::domain::model::{Item, ProcurementRequest, StoreId, TenantId};
use crate::domain::port::{Notification, PROCUREMENT_CATEGORY};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// 在庫不足検出イベント
/// 振替で解消できず調達依頼を起票したときに発生する
#[derive(Debug, Clone)]
pub struct StockShortageDetected {
    /// テナントID
    pub tenant_id: TenantId,
    /// 品目コード
    pub item_code: String,
    /// 品目名
    pub item_name: String,
    /// 単位
    pub unit_of_measure: String,
    /// 要求された倉庫（全倉庫で判定した場合はNone）
    pub store_id: Option<StoreId>,
    /// 要求数量
    pub required: Decimal,
    /// 判定時点の手持ち数量
    pub on_hand: Decimal,
    /// 起票した調達依頼
    pub procurement: ProcurementRequest,
    /// イベント発生日時
    pub occurred_at: DateTime<Utc>,
}

impl StockShortageDetected {
    /// 新しい在庫不足検出イベントを作成
    pub fn new(
        item: &Item,
        store_id: Option<StoreId>,
        required: Decimal,
        on_hand: Decimal,
        procurement: ProcurementRequest,
    ) -> Self {
        Self {
            tenant_id: item.tenant_id(),
            item_code: item.code().to_string(),
            item_name: item.name().to_string(),
            unit_of_measure: item.unit_of_measure().to_string(),
            store_id,
            required,
            on_hand,
            procurement,
            occurred_at: Utc::now(),
        }
    }

    /// 調達担当者向けの通知に変換する
    /// 参照IDは調達依頼ID
    pub fn to_notification(&self) -> Notification {
        let location = match self.store_id {
            Some(store) => format!("store {}", store),
            None => "any store".to_string(),
        };
        let origin = self
            .procurement
            .raised_from_work_order_ref()
            .unwrap_or("-");
        let required_by = self
            .procurement
            .required_by()
            .map(|d| d.to_string())
            .unwrap_or_else(|| "-".to_string());

        let body = format!(
            "Item {} ({}) is short at {}.\n\
             Required: {} {}\n\
             On hand: {} {}\n\
             Procurement request #{} raised for {} {}.\n\
             Origin: {}\n\
             Required by: {}",
            self.item_code,
            self.item_name,
            location,
            self.required,
            self.unit_of_measure,
            self.on_hand,
            self.unit_of_measure,
            self.procurement.id(),
            self.procurement.qty(),
            self.unit_of_measure,
            origin,
            required_by,
        );

        Notification {
            tenant_id: self.tenant_id,
            subject: format!("Procurement required: {}", self.item_code),
            body,
            category: PROCUREMENT_CATEGORY.to_string(),
            reference_id: self.procurement.id().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{
        ItemId, NewItem, NewProcurementRequest, OriginRef, ProcurementId, RateType,
    };
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    #[test]
    fn test_shortage_renders_procurement_notification() {
        let tenant = TenantId::new();
        let item = Item::new(
            tenant,
            ItemId::new(),
            NewItem {
                code: "FLT-200".to_string(),
                name: "Air filter".to_string(),
                unit_of_measure: "pcs".to_string(),
                rate: dec!(12.5),
                rate_type: RateType::Standard,
                tax_percent: dec!(5),
            },
        )
        .unwrap();
        let origin = OriginRef::new("WO-9", NaiveDate::from_ymd_opt(2026, 11, 1)).unwrap();
        let procurement =
            NewProcurementRequest::for_shortage(tenant, item.id(), dec!(2), Some(&origin))
                .unwrap()
                .into_request(ProcurementId::new(41));

        let event = StockShortageDetected::new(&item, None, dec!(5), dec!(3), procurement);
        let notification = event.to_notification();

        assert_eq!(notification.tenant_id, tenant);
        assert_eq!(notification.category, "PROCUREMENT");
        assert_eq!(notification.reference_id, "41");
        assert_eq!(notification.subject, "Procurement required: FLT-200");
        assert!(notification.body.contains("WO-9"));
        assert!(notification.body.contains("2026-11-01"));
        assert!(notification.body.contains("any store"));
    }
}
