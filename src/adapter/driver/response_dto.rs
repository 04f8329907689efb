use crate::domain::model::{Item, ItemStock, ProcurementRequest, StockLedgerEntry};
use rust_decimal::Decimal;
use serde::Serialize;

/// 品目用のレスポンスDTO
#[derive(Serialize)]
pub struct ItemResponse {
    pub item_id: String,
    pub code: String,
    pub name: String,
    pub unit_of_measure: String,
    pub rate: Decimal,
    pub rate_type: String,
    pub tax_percent: Decimal,
}

/// 在庫用のレスポンスDTO
#[derive(Serialize)]
pub struct StockResponse {
    pub item_id: String,
    pub store_id: String,
    pub qty_on_hand: Decimal,
    pub qty_reserved: Decimal,
    pub qty_available: Decimal,
    pub as_of: String,
    pub version: i64,
}

/// 品目の全倉庫の在庫用のレスポンスDTO
#[derive(Serialize)]
pub struct StockSummaryResponse {
    pub item_id: String,
    pub total_on_hand: Decimal,
    pub stores: Vec<StockResponse>,
}

/// 元帳エントリ用のレスポンスDTO
#[derive(Serialize)]
pub struct LedgerEntryResponse {
    pub id: i64,
    pub store_id: String,
    pub tx_type: String,
    pub direction: String,
    pub ref_type: String,
    pub ref_id: Option<String>,
    pub qty: Decimal,
    pub rate: Option<Decimal>,
    pub balance_after: Decimal,
    pub occurred_at: String,
}

/// 調達依頼用のレスポンスDTO
#[derive(Serialize)]
pub struct ProcurementResponse {
    pub procurement_id: i64,
    pub item_id: String,
    pub qty: Decimal,
    pub status: String,
    pub raised_from_work_order_ref: Option<String>,
    pub required_by: Option<String>,
    pub created_at: String,
}

impl ItemResponse {
    /// ドメインオブジェクトからItemResponseを作成
    pub fn from_item(item: &Item) -> Self {
        Self {
            item_id: item.id().to_string(),
            code: item.code().to_string(),
            name: item.name().to_string(),
            unit_of_measure: item.unit_of_measure().to_string(),
            rate: item.rate(),
            rate_type: item.rate_type().to_string(),
            tax_percent: item.tax_percent(),
        }
    }
}

impl StockResponse {
    /// ドメインオブジェクトからStockResponseを作成
    pub fn from_stock(stock: &ItemStock) -> Self {
        Self {
            item_id: stock.item_id().to_string(),
            store_id: stock.store_id().to_string(),
            qty_on_hand: stock.qty_on_hand(),
            qty_reserved: stock.qty_reserved(),
            qty_available: stock.qty_available(),
            as_of: stock.as_of().to_rfc3339(),
            version: stock.version(),
        }
    }
}

impl LedgerEntryResponse {
    /// ドメインオブジェクトからLedgerEntryResponseを作成
    pub fn from_entry(entry: &StockLedgerEntry) -> Self {
        Self {
            id: entry.id,
            store_id: entry.store_id.to_string(),
            tx_type: entry.tx_type.to_string(),
            direction: entry.direction.to_string(),
            ref_type: entry.ref_type.to_string(),
            ref_id: entry.ref_id.clone(),
            qty: entry.qty,
            rate: entry.rate,
            balance_after: entry.balance_after,
            occurred_at: entry.occurred_at.to_rfc3339(),
        }
    }
}

impl ProcurementResponse {
    /// ドメインオブジェクトからProcurementResponseを作成
    pub fn from_request(request: &ProcurementRequest) -> Self {
        Self {
            procurement_id: request.id().value(),
            item_id: request.item_id().to_string(),
            qty: request.qty(),
            status: request.status().to_string(),
            raised_from_work_order_ref: request.raised_from_work_order_ref().map(str::to_string),
            required_by: request.required_by().map(|d| d.to_string()),
            created_at: request.created_at().to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{ItemId, StoreId, TenantId};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    #[test]
    fn test_stock_response_reports_available() {
        let stock = ItemStock::reconstruct(
            TenantId::new(),
            ItemId::new(),
            StoreId::new(),
            dec!(10),
            dec!(4),
            Utc::now(),
            2,
        );

        let response = StockResponse::from_stock(&stock);

        assert_eq!(response.qty_available, dec!(6));
        assert_eq!(response.version, 2);
    }
}
