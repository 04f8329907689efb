use crate::application::ApplicationError;
use crate::domain::model::{
    ItemId, ItemStock, ProcurementId, ProcurementRequest, ProcurementStatus, StockLedgerEntry,
    StoreId, TenantId,
};
use crate::domain::port::{InventoryStore, TenantGuard};
use crate::domain::service::total_on_hand;
use rust_decimal::Decimal;
use std::sync::Arc;

/// 在庫クエリサービス
/// 読み取り専用の在庫・元帳・調達依頼の照会を提供する
pub struct InventoryQueryService {
    store: Arc<dyn InventoryStore>,
    tenant_guard: Arc<dyn TenantGuard>,
}

impl InventoryQueryService {
    /// 新しい在庫クエリサービスを作成
    ///
    /// # Arguments
    /// * `store` - 在庫ストア
    /// * `tenant_guard` - テナントの契約状態の確認
    pub fn new(store: Arc<dyn InventoryStore>, tenant_guard: Arc<dyn TenantGuard>) -> Self {
        Self {
            store,
            tenant_guard,
        }
    }

    /// (品目, 倉庫) の在庫を取得
    ///
    /// # Returns
    /// * `Ok(Some(ItemStock))` - 在庫が見つかった
    /// * `Ok(None)` - 在庫行が存在しない
    /// * `Err(ApplicationError)` - 取得失敗
    pub async fn get_stock(
        &self,
        tenant_id: TenantId,
        item_id: ItemId,
        store_id: StoreId,
    ) -> Result<Option<ItemStock>, ApplicationError> {
        self.tenant_guard.assert_active(tenant_id).await?;
        let mut uow = self.store.begin().await?;
        let stock = uow.find_stock(tenant_id, item_id, store_id).await?;
        uow.rollback().await?;
        Ok(stock)
    }

    /// 品目のすべての倉庫の在庫を取得
    /// 在庫行の作成順で並べて返す
    pub async fn list_stock_for_item(
        &self,
        tenant_id: TenantId,
        item_id: ItemId,
    ) -> Result<Vec<ItemStock>, ApplicationError> {
        self.tenant_guard.assert_active(tenant_id).await?;
        let mut uow = self.store.begin().await?;
        let stocks = uow.list_stocks_for_item(tenant_id, item_id).await?;
        uow.rollback().await?;
        Ok(stocks)
    }

    /// 品目の全倉庫の手持ち数量の合計を取得
    pub async fn total_on_hand(
        &self,
        tenant_id: TenantId,
        item_id: ItemId,
    ) -> Result<Decimal, ApplicationError> {
        let stocks = self.list_stock_for_item(tenant_id, item_id).await?;
        Ok(total_on_hand(&stocks))
    }

    /// (品目, 倉庫) の元帳を発生順に取得
    pub async fn ledger_history(
        &self,
        tenant_id: TenantId,
        item_id: ItemId,
        store_id: StoreId,
    ) -> Result<Vec<StockLedgerEntry>, ApplicationError> {
        self.tenant_guard.assert_active(tenant_id).await?;
        let mut uow = self.store.begin().await?;
        let entries = uow.ledger_for(tenant_id, item_id, store_id).await?;
        uow.rollback().await?;
        Ok(entries)
    }

    /// 調達依頼を取得
    /// ステータスを指定した場合はそのステータスのみ返す
    pub async fn list_procurement_requests(
        &self,
        tenant_id: TenantId,
        status: Option<ProcurementStatus>,
    ) -> Result<Vec<ProcurementRequest>, ApplicationError> {
        self.tenant_guard.assert_active(tenant_id).await?;
        let mut uow = self.store.begin().await?;
        let requests = uow.list_procurements(tenant_id, status).await?;
        uow.rollback().await?;
        Ok(requests)
    }

    /// 調達依頼IDで調達依頼を取得
    ///
    /// # Returns
    /// * `Ok(ProcurementRequest)` - 調達依頼が見つかった
    /// * `Err(ApplicationError::NotFound)` - 調達依頼が見つからなかった
    pub async fn get_procurement_request(
        &self,
        tenant_id: TenantId,
        id: ProcurementId,
    ) -> Result<ProcurementRequest, ApplicationError> {
        self.tenant_guard.assert_active(tenant_id).await?;
        let mut uow = self.store.begin().await?;
        let request = uow.find_procurement(tenant_id, id).await?;
        uow.rollback().await?;
        request.ok_or_else(|| {
            ApplicationError::NotFound(format!("調達依頼が見つかりません: {}", id))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::driven::{ConfiguredTenantGuard, InMemoryInventoryStore};
    use crate::domain::model::{NewLedgerEntry, RefType};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn service(store: Arc<InMemoryInventoryStore>) -> InventoryQueryService {
        InventoryQueryService::new(store, Arc::new(ConfiguredTenantGuard::allow_all()))
    }

    #[tokio::test]
    async fn test_total_on_hand_sums_all_stores() {
        let tenant = TenantId::new();
        let item = ItemId::new();
        let store = Arc::new(InMemoryInventoryStore::new());
        store
            .seed_stock(ItemStock::reconstruct(tenant, item, StoreId::new(), dec!(3), dec!(0), Utc::now(), 0))
            .await;
        store
            .seed_stock(ItemStock::reconstruct(tenant, item, StoreId::new(), dec!(4.5), dec!(0), Utc::now(), 0))
            .await;
        // 別テナントの在庫は含まれない
        store
            .seed_stock(ItemStock::reconstruct(TenantId::new(), item, StoreId::new(), dec!(100), dec!(0), Utc::now(), 0))
            .await;

        let total = service(store).total_on_hand(tenant, item).await.unwrap();

        assert_eq!(total, dec!(7.5));
    }

    #[tokio::test]
    async fn test_get_stock_missing_row_is_none() {
        let store = Arc::new(InMemoryInventoryStore::new());
        let result = service(store)
            .get_stock(TenantId::new(), ItemId::new(), StoreId::new())
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_ledger_history_in_append_order() {
        let tenant = TenantId::new();
        let item = ItemId::new();
        let store_id = StoreId::new();
        let store = Arc::new(InMemoryInventoryStore::new());
        let mut uow = store.begin().await.unwrap();
        uow.append_ledger(
            NewLedgerEntry::inbound(tenant, item, store_id, RefType::PoReceipt, None, dec!(5), None, dec!(5))
                .unwrap(),
        )
        .await
        .unwrap();
        uow.append_ledger(
            NewLedgerEntry::outbound(tenant, item, store_id, RefType::WoIssue, Some("WO-1".into()), dec!(2), None, dec!(3))
                .unwrap(),
        )
        .await
        .unwrap();
        uow.commit().await.unwrap();

        let entries = service(store)
            .ledger_history(tenant, item, store_id)
            .await
            .unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].ref_type, RefType::PoReceipt);
        assert_eq!(entries[1].balance_after, dec!(3));
    }

    #[tokio::test]
    async fn test_get_procurement_request_not_found() {
        let store = Arc::new(InMemoryInventoryStore::new());
        let result = service(store)
            .get_procurement_request(TenantId::new(), ProcurementId::new(99))
            .await;
        assert!(matches!(result, Err(ApplicationError::NotFound(_))));
    }
}
