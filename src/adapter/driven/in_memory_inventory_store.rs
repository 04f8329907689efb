use crate::domain::model::{
    Item, ItemId, ItemStock, NewLedgerEntry, NewProcurementRequest, ProcurementId,
    ProcurementRequest, ProcurementStatus, StockLedgerEntry, StoreId, TenantId,
};
use crate::domain::port::{InventoryStore, InventoryUnitOfWork, RepositoryError};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// ストア全体の状態
/// 在庫行と元帳は追加順に保持する
#[derive(Debug, Clone, Default)]
struct State {
    items: Vec<Item>,
    stocks: Vec<ItemStock>,
    ledger: Vec<StockLedgerEntry>,
    procurements: Vec<ProcurementRequest>,
    next_ledger_id: i64,
    next_procurement_id: i64,
}

impl State {
    fn stock_index(&self, tenant_id: TenantId, item_id: ItemId, store_id: StoreId) -> Option<usize> {
        self.stocks.iter().position(|s| {
            s.tenant_id() == tenant_id && s.item_id() == item_id && s.store_id() == store_id
        })
    }
}

/// インメモリ在庫ストア
/// ユニットオブワークはストア全体のロックを保持し、作業用のコピーに書き込む。
/// コミットでコピーを反映し、破棄すると書き込みは捨てられる（直列化可能）。
#[derive(Clone, Default)]
pub struct InMemoryInventoryStore {
    state: Arc<Mutex<State>>,
}

impl InMemoryInventoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 品目を直接登録する（テスト・ローカル実行用）
    pub async fn seed_item(&self, item: Item) {
        let mut state = self.state.lock().await;
        state
            .items
            .retain(|i| !(i.tenant_id() == item.tenant_id() && i.id() == item.id()));
        state.items.push(item);
    }

    /// 在庫行を直接登録する（テスト・ローカル実行用）
    /// 元帳は書かないため、元帳残高との照合の確認にも使う
    pub async fn seed_stock(&self, stock: ItemStock) {
        let mut state = self.state.lock().await;
        match state.stock_index(stock.tenant_id(), stock.item_id(), stock.store_id()) {
            Some(index) => state.stocks[index] = stock,
            None => state.stocks.push(stock),
        }
    }
}

#[async_trait]
impl InventoryStore for InMemoryInventoryStore {
    async fn begin(&self) -> Result<Box<dyn InventoryUnitOfWork>, RepositoryError> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(InMemoryUnitOfWork { guard, working }))
    }
}

/// インメモリのユニットオブワーク
pub struct InMemoryUnitOfWork {
    guard: OwnedMutexGuard<State>,
    working: State,
}

#[async_trait]
impl InventoryUnitOfWork for InMemoryUnitOfWork {
    async fn find_item(
        &mut self,
        tenant_id: TenantId,
        item_id: ItemId,
    ) -> Result<Option<Item>, RepositoryError> {
        Ok(self
            .working
            .items
            .iter()
            .find(|i| i.tenant_id() == tenant_id && i.id() == item_id)
            .cloned())
    }

    async fn lock_item(
        &mut self,
        tenant_id: TenantId,
        item_id: ItemId,
    ) -> Result<Option<Item>, RepositoryError> {
        // ストア全体のロックを保持しているため、行ロックは不要
        self.find_item(tenant_id, item_id).await
    }

    async fn find_item_by_code(
        &mut self,
        tenant_id: TenantId,
        code: &str,
    ) -> Result<Option<Item>, RepositoryError> {
        Ok(self
            .working
            .items
            .iter()
            .find(|i| i.tenant_id() == tenant_id && i.code() == code)
            .cloned())
    }

    async fn insert_item(&mut self, item: &Item) -> Result<(), RepositoryError> {
        let duplicate = self.working.items.iter().any(|i| {
            i.tenant_id() == item.tenant_id() && (i.id() == item.id() || i.code() == item.code())
        });
        if duplicate {
            return Err(RepositoryError::OperationFailed(format!(
                "品目が既に存在します: {}",
                item.code()
            )));
        }
        self.working.items.push(item.clone());
        Ok(())
    }

    async fn update_item_rate(&mut self, item: &Item) -> Result<(), RepositoryError> {
        let stored = self
            .working
            .items
            .iter_mut()
            .find(|i| i.tenant_id() == item.tenant_id() && i.id() == item.id())
            .ok_or_else(|| {
                RepositoryError::OperationFailed(format!("品目が存在しません: {}", item.id()))
            })?;
        *stored = item.clone();
        Ok(())
    }

    async fn find_stock(
        &mut self,
        tenant_id: TenantId,
        item_id: ItemId,
        store_id: StoreId,
    ) -> Result<Option<ItemStock>, RepositoryError> {
        Ok(self
            .working
            .stock_index(tenant_id, item_id, store_id)
            .map(|index| self.working.stocks[index].clone()))
    }

    async fn lock_stock(
        &mut self,
        tenant_id: TenantId,
        item_id: ItemId,
        store_id: StoreId,
    ) -> Result<Option<ItemStock>, RepositoryError> {
        // ストア全体のロックを保持しているため、行ロックは不要
        self.find_stock(tenant_id, item_id, store_id).await
    }

    async fn lock_or_create_stock(
        &mut self,
        tenant_id: TenantId,
        item_id: ItemId,
        store_id: StoreId,
    ) -> Result<ItemStock, RepositoryError> {
        if let Some(index) = self.working.stock_index(tenant_id, item_id, store_id) {
            return Ok(self.working.stocks[index].clone());
        }
        let stock = ItemStock::empty(tenant_id, item_id, store_id);
        self.working.stocks.push(stock.clone());
        Ok(stock)
    }

    async fn list_stocks_for_item(
        &mut self,
        tenant_id: TenantId,
        item_id: ItemId,
    ) -> Result<Vec<ItemStock>, RepositoryError> {
        Ok(self
            .working
            .stocks
            .iter()
            .filter(|s| s.tenant_id() == tenant_id && s.item_id() == item_id)
            .cloned()
            .collect())
    }

    async fn save_stock(&mut self, stock: &ItemStock) -> Result<i64, RepositoryError> {
        let index = self
            .working
            .stock_index(stock.tenant_id(), stock.item_id(), stock.store_id())
            .filter(|&index| self.working.stocks[index].version() == stock.version())
            .ok_or_else(|| {
                RepositoryError::VersionConflict(format!(
                    "在庫が他の処理で更新されています: item={}, store={}, version={}",
                    stock.item_id(),
                    stock.store_id(),
                    stock.version()
                ))
            })?;

        let version = stock.version() + 1;
        self.working.stocks[index] = ItemStock::reconstruct(
            stock.tenant_id(),
            stock.item_id(),
            stock.store_id(),
            stock.qty_on_hand(),
            stock.qty_reserved(),
            stock.as_of(),
            version,
        );
        Ok(version)
    }

    async fn append_ledger(
        &mut self,
        entry: NewLedgerEntry,
    ) -> Result<StockLedgerEntry, RepositoryError> {
        self.working.next_ledger_id += 1;
        let entry = entry.into_entry(self.working.next_ledger_id);
        self.working.ledger.push(entry.clone());
        Ok(entry)
    }

    async fn ledger_for(
        &mut self,
        tenant_id: TenantId,
        item_id: ItemId,
        store_id: StoreId,
    ) -> Result<Vec<StockLedgerEntry>, RepositoryError> {
        let mut entries: Vec<StockLedgerEntry> = self
            .working
            .ledger
            .iter()
            .filter(|e| e.tenant_id == tenant_id && e.item_id == item_id && e.store_id == store_id)
            .cloned()
            .collect();
        entries.sort_by(|a, b| a.occurred_at.cmp(&b.occurred_at).then(a.id.cmp(&b.id)));
        Ok(entries)
    }

    async fn insert_procurement(
        &mut self,
        request: NewProcurementRequest,
    ) -> Result<ProcurementRequest, RepositoryError> {
        self.working.next_procurement_id += 1;
        let request = request.into_request(ProcurementId::new(self.working.next_procurement_id));
        self.working.procurements.push(request.clone());
        Ok(request)
    }

    async fn find_procurement(
        &mut self,
        tenant_id: TenantId,
        id: ProcurementId,
    ) -> Result<Option<ProcurementRequest>, RepositoryError> {
        Ok(self
            .working
            .procurements
            .iter()
            .find(|p| p.tenant_id() == tenant_id && p.id() == id)
            .cloned())
    }

    async fn save_procurement(
        &mut self,
        request: &ProcurementRequest,
    ) -> Result<(), RepositoryError> {
        let stored = self
            .working
            .procurements
            .iter_mut()
            .find(|p| p.tenant_id() == request.tenant_id() && p.id() == request.id())
            .ok_or_else(|| {
                RepositoryError::OperationFailed(format!(
                    "調達依頼が存在しません: {}",
                    request.id()
                ))
            })?;
        *stored = request.clone();
        Ok(())
    }

    async fn list_procurements(
        &mut self,
        tenant_id: TenantId,
        status: Option<ProcurementStatus>,
    ) -> Result<Vec<ProcurementRequest>, RepositoryError> {
        Ok(self
            .working
            .procurements
            .iter()
            .filter(|p| p.tenant_id() == tenant_id)
            .filter(|p| status.map_or(true, |s| p.status() == s))
            .cloned()
            .collect())
    }

    async fn commit(self: Box<Self>) -> Result<(), RepositoryError> {
        let InMemoryUnitOfWork { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), RepositoryError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::RefType;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_uncommitted_writes_are_discarded() {
        let store = InMemoryInventoryStore::new();
        let (tenant, item, store_id) = (TenantId::new(), ItemId::new(), StoreId::new());

        {
            let mut uow = store.begin().await.unwrap();
            uow.lock_or_create_stock(tenant, item, store_id).await.unwrap();
            // コミットせずに破棄
        }

        let mut uow = store.begin().await.unwrap();
        assert!(uow.find_stock(tenant, item, store_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_commit_publishes_writes() {
        let store = InMemoryInventoryStore::new();
        let (tenant, item, store_id) = (TenantId::new(), ItemId::new(), StoreId::new());

        let mut uow = store.begin().await.unwrap();
        let mut stock = uow.lock_or_create_stock(tenant, item, store_id).await.unwrap();
        stock.increase(dec!(4));
        assert_eq!(uow.save_stock(&stock).await.unwrap(), 1);
        uow.append_ledger(
            NewLedgerEntry::inbound(tenant, item, store_id, RefType::PoReceipt, None, dec!(4), None, dec!(4))
                .unwrap(),
        )
        .await
        .unwrap();
        uow.commit().await.unwrap();

        let mut uow = store.begin().await.unwrap();
        let stock = uow.find_stock(tenant, item, store_id).await.unwrap().unwrap();
        assert_eq!(stock.qty_on_hand(), dec!(4));
        assert_eq!(stock.version(), 1);
        assert_eq!(uow.ledger_for(tenant, item, store_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_stale_version_is_rejected() {
        let store = InMemoryInventoryStore::new();
        let (tenant, item, store_id) = (TenantId::new(), ItemId::new(), StoreId::new());

        let mut uow = store.begin().await.unwrap();
        let mut stock = uow.lock_or_create_stock(tenant, item, store_id).await.unwrap();
        stock.increase(dec!(1));
        uow.save_stock(&stock).await.unwrap();

        // 同じ読み込み結果でもう一度保存するとバージョンが合わない
        let result = uow.save_stock(&stock).await;
        assert!(matches!(result, Err(RepositoryError::VersionConflict(_))));
    }

    #[tokio::test]
    async fn test_queries_are_tenant_scoped() {
        let store = InMemoryInventoryStore::new();
        let (item, store_id) = (ItemId::new(), StoreId::new());
        let tenant_a = TenantId::new();
        let tenant_b = TenantId::new();

        let mut uow = store.begin().await.unwrap();
        uow.lock_or_create_stock(tenant_a, item, store_id).await.unwrap();
        uow.commit().await.unwrap();

        let mut uow = store.begin().await.unwrap();
        assert!(uow.find_stock(tenant_b, item, store_id).await.unwrap().is_none());
        assert!(uow.list_stocks_for_item(tenant_b, item).await.unwrap().is_empty());
    }
}
