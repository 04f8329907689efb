use crate::application::ApplicationError;
use crate::domain::error::DomainError;
use crate::domain::event::StockShortageDetected;
use crate::domain::model::{
    net_issued_to, positive_quantity, replay_balance, Item, ItemId, ItemStock, NewItem,
    NewLedgerEntry, NewProcurementRequest, OriginRef, ProcurementId, ProcurementRequest, RefType,
    StockLedgerEntry, StoreId, TenantId,
};
use crate::domain::port::{InventoryStore, InventoryUnitOfWork, NotificationSink, TenantGuard};
use crate::domain::service::{lock_order, total_on_hand, transfer_sources};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

mod inventory_query_service;

pub use inventory_query_service::InventoryQueryService;

/// 元帳の再生結果と在庫の手持ち数量を比較した結果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconciliationReport {
    pub tenant_id: TenantId,
    pub item_id: ItemId,
    pub store_id: StoreId,
    /// 照合前の手持ち数量
    pub recorded_on_hand: Decimal,
    /// 元帳を再生した残高
    pub ledger_balance: Decimal,
    /// 手持ち数量を元帳残高で置き換えたか
    pub corrected: bool,
}

/// 在庫アプリケーションサービス
/// 倉庫間の振替、作業指示への払出し、入荷、返品を調整する
///
/// 各操作は1つ以上のユニットオブワークで実行され、同時に2つを保持することはない。
pub struct InventoryApplicationService {
    store: Arc<dyn InventoryStore>,
    notification_sink: Arc<dyn NotificationSink>,
    tenant_guard: Arc<dyn TenantGuard>,
}

impl InventoryApplicationService {
    /// 新しい在庫アプリケーションサービスを作成
    ///
    /// # Arguments
    /// * `store` - 在庫ストア
    /// * `notification_sink` - 在庫不足の通知先
    /// * `tenant_guard` - テナントの契約状態の確認
    pub fn new(
        store: Arc<dyn InventoryStore>,
        notification_sink: Arc<dyn NotificationSink>,
        tenant_guard: Arc<dyn TenantGuard>,
    ) -> Self {
        Self {
            store,
            notification_sink,
            tenant_guard,
        }
    }

    /// 品目を登録する
    ///
    /// # Returns
    /// * `Ok(Item)` - 登録された品目
    /// * `Err(ApplicationError::BusinessRule)` - 同じコードの品目が既にある
    /// * `Err(ApplicationError::Domain)` - 入力値が不正
    #[instrument(skip_all, fields(tenant = %tenant_id, code = %input.code))]
    pub async fn register_item(
        &self,
        tenant_id: TenantId,
        input: NewItem,
    ) -> Result<Item, ApplicationError> {
        self.tenant_guard.assert_active(tenant_id).await?;
        let item = Item::new(tenant_id, ItemId::new(), input)?;

        let mut uow = self.store.begin().await?;
        if uow
            .find_item_by_code(tenant_id, item.code())
            .await?
            .is_some()
        {
            return Err(ApplicationError::BusinessRule(format!(
                "品目コードが既に登録されています: {}",
                item.code()
            )));
        }
        uow.insert_item(&item).await?;
        uow.commit().await?;

        info!(item = %item.id(), "Item registered");
        Ok(item)
    }

    /// 倉庫に必要数量の在庫を確保する
    /// 不足分は他の倉庫から作成順に振り替え、それでも足りなければ調達依頼を起票する
    ///
    /// 振替は1回ごとにコミットされるため、最終的に在庫不足を返した場合でも残る。
    /// 調達依頼は独立したユニットオブワークでコミットしてから通知し、その後で在庫不足を返す。
    ///
    /// # Arguments
    /// * `tenant_id` - テナントID
    /// * `item_id` - 品目ID
    /// * `store_id` - 在庫を確保する倉庫
    /// * `qty` - 必要数量
    /// * `origin` - 発生元の参照（調達依頼に引き継がれる）
    ///
    /// # Returns
    /// * `Ok(())` - 倉庫に必要数量がある
    /// * `Err(ApplicationError::InsufficientStock)` - 不足分の調達依頼を起票した
    /// * `Err(ApplicationError)` - その他の失敗
    #[instrument(skip_all, fields(tenant = %tenant_id, item = %item_id, store = %store_id, qty = %qty))]
    pub async fn ensure_stock_or_raise_procurement(
        &self,
        tenant_id: TenantId,
        item_id: ItemId,
        store_id: StoreId,
        qty: Decimal,
        origin: Option<OriginRef>,
    ) -> Result<(), ApplicationError> {
        self.tenant_guard.assert_active(tenant_id).await?;
        let qty = positive_quantity(qty)?;

        let mut uow = self.store.begin().await?;
        let item = require_item(uow.as_mut(), tenant_id, item_id).await?;
        let on_hand = on_hand_at(uow.as_mut(), tenant_id, item_id, store_id).await?;
        if on_hand >= qty {
            uow.rollback().await?;
            return Ok(());
        }
        let candidates = uow.list_stocks_for_item(tenant_id, item_id).await?;
        uow.rollback().await?;

        let mut deficit = qty - on_hand;
        debug!(deficit = %deficit, "Rebalancing from other stores");
        // 走査前の数量は古い可能性があるため、不足が解消するまですべての候補を順に試す
        for source in transfer_sources(store_id, &candidates) {
            if deficit <= Decimal::ZERO {
                break;
            }
            let moved = self
                .transfer(tenant_id, item_id, source, store_id, deficit)
                .await?;
            deficit -= moved;
        }

        let mut uow = self.store.begin().await?;
        let on_hand = on_hand_at(uow.as_mut(), tenant_id, item_id, store_id).await?;
        uow.rollback().await?;
        if on_hand >= qty {
            return Ok(());
        }

        self.raise_procurement(&item, Some(store_id), qty, on_hand, origin.as_ref())
            .await?;
        Err(ApplicationError::InsufficientStock {
            item_code: item.code().to_string(),
            required: qty,
            on_hand,
        })
    }

    /// 全倉庫の合計で必要数量があるかを確認する
    /// 振替は行わず、不足していれば調達依頼を起票する
    ///
    /// # Returns
    /// * `Ok(())` - 全倉庫の合計が必要数量以上
    /// * `Err(ApplicationError::InsufficientStock)` - 不足分の調達依頼を起票した
    #[instrument(skip_all, fields(tenant = %tenant_id, item = %item_id, qty = %qty))]
    pub async fn ensure_stock_or_raise_procurement_any_store(
        &self,
        tenant_id: TenantId,
        item_id: ItemId,
        qty: Decimal,
        origin: Option<OriginRef>,
    ) -> Result<(), ApplicationError> {
        self.tenant_guard.assert_active(tenant_id).await?;
        let qty = positive_quantity(qty)?;

        let mut uow = self.store.begin().await?;
        let item = require_item(uow.as_mut(), tenant_id, item_id).await?;
        let stocks = uow.list_stocks_for_item(tenant_id, item_id).await?;
        uow.rollback().await?;

        let on_hand = total_on_hand(&stocks);
        if on_hand >= qty {
            return Ok(());
        }

        self.raise_procurement(&item, None, qty, on_hand, origin.as_ref())
            .await?;
        Err(ApplicationError::InsufficientStock {
            item_code: item.code().to_string(),
            required: qty,
            on_hand,
        })
    }

    /// 作業指示へ在庫を払い出す
    /// 在庫行をロックしてから再検証し、消費分の引当も解放する
    ///
    /// # Arguments
    /// * `work_order_ref` - 払出し先の作業指示
    ///
    /// # Returns
    /// * `Ok(StockLedgerEntry)` - 追記された出庫エントリ
    /// * `Err(ApplicationError::InsufficientStock)` - ロック時点で手持ちが不足（変更なし）
    #[instrument(skip_all, fields(tenant = %tenant_id, item = %item_id, store = %store_id, qty = %qty, work_order = %work_order_ref))]
    pub async fn deduct(
        &self,
        tenant_id: TenantId,
        item_id: ItemId,
        store_id: StoreId,
        qty: Decimal,
        work_order_ref: &str,
    ) -> Result<StockLedgerEntry, ApplicationError> {
        self.tenant_guard.assert_active(tenant_id).await?;
        let qty = positive_quantity(qty)?;
        let work_order = OriginRef::new(work_order_ref, None)?;

        let mut uow = self.store.begin().await?;
        let item = require_item(uow.as_mut(), tenant_id, item_id).await?;
        let Some(mut stock) = uow.lock_stock(tenant_id, item_id, store_id).await? else {
            return Err(insufficient(&item, qty, Decimal::ZERO));
        };
        if !stock.has_available_stock(qty) {
            return Err(insufficient(&item, qty, stock.qty_on_hand()));
        }

        stock.deduct(qty)?;
        uow.save_stock(&stock).await?;
        let entry = uow
            .append_ledger(NewLedgerEntry::outbound(
                tenant_id,
                item_id,
                store_id,
                RefType::WoIssue,
                Some(work_order.reference().to_string()),
                qty,
                Some(item.rate()),
                stock.qty_on_hand(),
            )?)
            .await?;
        uow.commit().await?;

        info!(balance = %entry.balance_after, "Stock issued to work order");
        Ok(entry)
    }

    /// 入荷を記録する
    /// 在庫行が無ければ作成し、AVG品目で入荷単価があれば移動平均単価を再計算する
    ///
    /// # Arguments
    /// * `procurement_id` - 対応する調達依頼（あれば入荷済みにする）
    /// * `unit_cost` - 入荷単価
    ///
    /// # Returns
    /// * `Ok(StockLedgerEntry)` - 追記された入庫エントリ
    #[instrument(skip_all, fields(tenant = %tenant_id, item = %item_id, store = %store_id, qty = %qty))]
    pub async fn receive(
        &self,
        tenant_id: TenantId,
        item_id: ItemId,
        store_id: StoreId,
        qty: Decimal,
        procurement_id: Option<ProcurementId>,
        unit_cost: Option<Decimal>,
    ) -> Result<StockLedgerEntry, ApplicationError> {
        self.tenant_guard.assert_active(tenant_id).await?;
        let qty = positive_quantity(qty)?;
        if let Some(cost) = unit_cost {
            if cost < Decimal::ZERO {
                return Err(DomainError::InvalidValue(format!(
                    "入荷単価は0以上である必要があります: {}",
                    cost
                ))
                .into());
            }
        }

        let mut uow = self.store.begin().await?;
        require_item(uow.as_mut(), tenant_id, item_id).await?;
        let mut stock = uow
            .lock_or_create_stock(tenant_id, item_id, store_id)
            .await?;
        // 在庫行の後に品目行をロックし、ロック後の単価から移動平均を計算する
        let mut item = require_locked_item(uow.as_mut(), tenant_id, item_id).await?;

        if let Some(cost) = unit_cost {
            if item.apply_receipt_cost(stock.qty_on_hand(), qty, cost) {
                uow.update_item_rate(&item).await?;
                debug!(rate = %item.rate(), "Average rate recomputed");
            }
        }

        stock.increase(qty);
        uow.save_stock(&stock).await?;
        let entry = uow
            .append_ledger(NewLedgerEntry::inbound(
                tenant_id,
                item_id,
                store_id,
                RefType::PoReceipt,
                procurement_id.map(|id| id.to_string()),
                qty,
                unit_cost,
                stock.qty_on_hand(),
            )?)
            .await?;

        if let Some(id) = procurement_id {
            match uow.find_procurement(tenant_id, id).await? {
                Some(mut request) if request.item_id() == item_id => {
                    if request.mark_received() {
                        uow.save_procurement(&request).await?;
                        info!(procurement = %id, "Procurement request received");
                    }
                }
                Some(request) => debug!(
                    procurement = %id,
                    requested_item = %request.item_id(),
                    "Procurement request is for another item"
                ),
                None => debug!(procurement = %id, "No matching procurement request"),
            }
        }
        uow.commit().await?;

        info!(balance = %entry.balance_after, "Stock received");
        Ok(entry)
    }

    /// 作業指示からの返品を記録する
    /// 引当には触れず、在庫行が存在しない倉庫には返品できない
    ///
    /// # Returns
    /// * `Ok(StockLedgerEntry)` - 追記された入庫エントリ
    /// * `Err(ApplicationError::BusinessRule)` - 在庫行が無い、または払出し数量を超える返品
    #[instrument(skip_all, fields(tenant = %tenant_id, item = %item_id, store = %store_id, qty = %qty, work_order = %work_order_ref))]
    pub async fn return_from_work_order(
        &self,
        tenant_id: TenantId,
        item_id: ItemId,
        store_id: StoreId,
        qty: Decimal,
        work_order_ref: &str,
    ) -> Result<StockLedgerEntry, ApplicationError> {
        self.tenant_guard.assert_active(tenant_id).await?;
        let qty = positive_quantity(qty)?;
        let work_order = OriginRef::new(work_order_ref, None)?;

        let mut uow = self.store.begin().await?;
        let item = require_item(uow.as_mut(), tenant_id, item_id).await?;
        let Some(mut stock) = uow.lock_stock(tenant_id, item_id, store_id).await? else {
            return Err(ApplicationError::BusinessRule(format!(
                "在庫行が見つかりません: item={}, store={}",
                item_id, store_id
            )));
        };

        let ledger = uow.ledger_for(tenant_id, item_id, store_id).await?;
        let issued = net_issued_to(&ledger, work_order.reference());
        if qty > issued {
            return Err(ApplicationError::BusinessRule(format!(
                "返品数量 {} が作業指示 {} への払出し数量 {} を超えています",
                qty,
                work_order.reference(),
                issued
            )));
        }

        stock.increase(qty);
        uow.save_stock(&stock).await?;
        let entry = uow
            .append_ledger(NewLedgerEntry::inbound(
                tenant_id,
                item_id,
                store_id,
                RefType::WoReturn,
                Some(work_order.reference().to_string()),
                qty,
                Some(item.rate()),
                stock.qty_on_hand(),
            )?)
            .await?;
        uow.commit().await?;

        info!(balance = %entry.balance_after, "Stock returned from work order");
        Ok(entry)
    }

    /// 符号付きの数量で在庫を訂正する（棚卸差異など）
    /// 元帳にはADJUSTエントリを追記する
    #[instrument(skip_all, fields(tenant = %tenant_id, item = %item_id, store = %store_id, delta = %delta))]
    pub async fn adjust(
        &self,
        tenant_id: TenantId,
        item_id: ItemId,
        store_id: StoreId,
        delta: Decimal,
        note: Option<String>,
    ) -> Result<StockLedgerEntry, ApplicationError> {
        self.tenant_guard.assert_active(tenant_id).await?;

        let mut uow = self.store.begin().await?;
        let item = require_item(uow.as_mut(), tenant_id, item_id).await?;
        let mut stock = uow
            .lock_or_create_stock(tenant_id, item_id, store_id)
            .await?;

        stock.adjust(delta)?;
        uow.save_stock(&stock).await?;
        let entry = uow
            .append_ledger(NewLedgerEntry::adjustment(
                tenant_id,
                item_id,
                store_id,
                delta,
                note,
                Some(item.rate()),
                stock.qty_on_hand(),
            )?)
            .await?;
        uow.commit().await?;

        info!(balance = %entry.balance_after, "Stock adjusted");
        Ok(entry)
    }

    /// 在庫を引き当てる
    /// 元帳には記録しない
    ///
    /// # Returns
    /// * `Ok(ItemStock)` - 引当後の在庫
    /// * `Err(ApplicationError::InsufficientStock)` - 未引当の数量が不足（手持ちには未引当数量を報告）
    #[instrument(skip_all, fields(tenant = %tenant_id, item = %item_id, store = %store_id, qty = %qty))]
    pub async fn reserve(
        &self,
        tenant_id: TenantId,
        item_id: ItemId,
        store_id: StoreId,
        qty: Decimal,
    ) -> Result<ItemStock, ApplicationError> {
        self.tenant_guard.assert_active(tenant_id).await?;
        let qty = positive_quantity(qty)?;

        let mut uow = self.store.begin().await?;
        let item = require_item(uow.as_mut(), tenant_id, item_id).await?;
        let Some(mut stock) = uow.lock_stock(tenant_id, item_id, store_id).await? else {
            return Err(insufficient(&item, qty, Decimal::ZERO));
        };
        if stock.qty_available() < qty {
            return Err(insufficient(&item, qty, stock.qty_available()));
        }

        stock.reserve(qty)?;
        uow.save_stock(&stock).await?;
        uow.commit().await?;

        debug!(reserved = %stock.qty_reserved(), "Stock reserved");
        Ok(stock)
    }

    /// 引当を解放する
    #[instrument(skip_all, fields(tenant = %tenant_id, item = %item_id, store = %store_id, qty = %qty))]
    pub async fn release_reservation(
        &self,
        tenant_id: TenantId,
        item_id: ItemId,
        store_id: StoreId,
        qty: Decimal,
    ) -> Result<ItemStock, ApplicationError> {
        self.tenant_guard.assert_active(tenant_id).await?;
        let qty = positive_quantity(qty)?;

        let mut uow = self.store.begin().await?;
        let mut stock = require_locked_stock(uow.as_mut(), tenant_id, item_id, store_id).await?;
        stock.release(qty);
        uow.save_stock(&stock).await?;
        uow.commit().await?;

        debug!(reserved = %stock.qty_reserved(), "Reservation released");
        Ok(stock)
    }

    /// 元帳を再生して手持ち数量と照合する
    /// 食い違いがあれば手持ち数量を元帳残高で置き換える
    #[instrument(skip_all, fields(tenant = %tenant_id, item = %item_id, store = %store_id))]
    pub async fn reconcile(
        &self,
        tenant_id: TenantId,
        item_id: ItemId,
        store_id: StoreId,
    ) -> Result<ReconciliationReport, ApplicationError> {
        self.tenant_guard.assert_active(tenant_id).await?;

        let mut uow = self.store.begin().await?;
        let mut stock = require_locked_stock(uow.as_mut(), tenant_id, item_id, store_id).await?;
        let ledger = uow.ledger_for(tenant_id, item_id, store_id).await?;
        let recorded_on_hand = stock.qty_on_hand();
        let ledger_balance = replay_balance(&ledger);

        let corrected = recorded_on_hand != ledger_balance;
        if corrected {
            stock.restate_on_hand(ledger_balance);
            uow.save_stock(&stock).await?;
            warn!(
                recorded = %recorded_on_hand,
                ledger = %ledger_balance,
                "On-hand restated from ledger"
            );
        }
        uow.commit().await?;

        Ok(ReconciliationReport {
            tenant_id,
            item_id,
            store_id,
            recorded_on_hand,
            ledger_balance,
            corrected,
        })
    }

    /// 1回分の倉庫間移動を独立したユニットオブワークで実行する
    /// 移動元の手持ちはロック後に読み直し、`min(手持ち, 不足数量)` を移動する
    ///
    /// # Returns
    /// * `Ok(Decimal)` - 移動した数量（移動できなければ0）
    async fn transfer(
        &self,
        tenant_id: TenantId,
        item_id: ItemId,
        source: StoreId,
        target: StoreId,
        deficit: Decimal,
    ) -> Result<Decimal, ApplicationError> {
        let mut uow = self.store.begin().await?;
        let item = require_item(uow.as_mut(), tenant_id, item_id).await?;

        // デッドロックを避けるため倉庫IDの昇順でロックする
        let (source_stock, mut target_stock) = if lock_order(source, target).0 == source {
            let source_stock = uow.lock_stock(tenant_id, item_id, source).await?;
            let target_stock = uow.lock_or_create_stock(tenant_id, item_id, target).await?;
            (source_stock, target_stock)
        } else {
            let target_stock = uow.lock_or_create_stock(tenant_id, item_id, target).await?;
            let source_stock = uow.lock_stock(tenant_id, item_id, source).await?;
            (source_stock, target_stock)
        };

        let Some(mut source_stock) = source_stock else {
            uow.rollback().await?;
            return Ok(Decimal::ZERO);
        };
        let moved = source_stock.qty_on_hand().min(deficit);
        if moved <= Decimal::ZERO {
            uow.rollback().await?;
            return Ok(Decimal::ZERO);
        }

        source_stock.transfer_out(moved)?;
        target_stock.increase(moved);
        uow.save_stock(&source_stock).await?;
        uow.save_stock(&target_stock).await?;
        uow.append_ledger(NewLedgerEntry::outbound(
            tenant_id,
            item_id,
            source,
            RefType::Transfer,
            Some(target.to_string()),
            moved,
            Some(item.rate()),
            source_stock.qty_on_hand(),
        )?)
        .await?;
        uow.append_ledger(NewLedgerEntry::inbound(
            tenant_id,
            item_id,
            target,
            RefType::Transfer,
            Some(source.to_string()),
            moved,
            Some(item.rate()),
            target_stock.qty_on_hand(),
        )?)
        .await?;
        uow.commit().await?;

        debug!(from = %source, to = %target, qty = %moved, "Stock transferred");
        Ok(moved)
    }

    /// 不足分の調達依頼を独立したユニットオブワークで起票し、コミット後に通知する
    /// 通知の失敗はログに残すだけで、起票結果には影響しない
    async fn raise_procurement(
        &self,
        item: &Item,
        store_id: Option<StoreId>,
        required: Decimal,
        on_hand: Decimal,
        origin: Option<&OriginRef>,
    ) -> Result<ProcurementRequest, ApplicationError> {
        let request = NewProcurementRequest::for_shortage(
            item.tenant_id(),
            item.id(),
            required - on_hand,
            origin,
        )?;

        let mut uow = self.store.begin().await?;
        let procurement = uow.insert_procurement(request).await?;
        uow.commit().await?;

        warn!(
            required = %required,
            on_hand = %on_hand,
            procurement = %procurement.id(),
            shortage = %procurement.qty(),
            "Stock shortage, procurement request raised"
        );

        let event = StockShortageDetected::new(item, store_id, required, on_hand, procurement.clone());
        if let Err(e) = self.notification_sink.notify(event.to_notification()).await {
            warn!(error = %e, procurement = %procurement.id(), "Shortage notification failed");
        }

        Ok(procurement)
    }
}

async fn require_item(
    uow: &mut dyn InventoryUnitOfWork,
    tenant_id: TenantId,
    item_id: ItemId,
) -> Result<Item, ApplicationError> {
    uow.find_item(tenant_id, item_id)
        .await?
        .ok_or_else(|| ApplicationError::NotFound(format!("品目が見つかりません: {}", item_id)))
}

async fn require_locked_item(
    uow: &mut dyn InventoryUnitOfWork,
    tenant_id: TenantId,
    item_id: ItemId,
) -> Result<Item, ApplicationError> {
    uow.lock_item(tenant_id, item_id)
        .await?
        .ok_or_else(|| ApplicationError::NotFound(format!("品目が見つかりません: {}", item_id)))
}

async fn require_locked_stock(
    uow: &mut dyn InventoryUnitOfWork,
    tenant_id: TenantId,
    item_id: ItemId,
    store_id: StoreId,
) -> Result<ItemStock, ApplicationError> {
    uow.lock_stock(tenant_id, item_id, store_id)
        .await?
        .ok_or_else(|| {
            ApplicationError::NotFound(format!(
                "在庫が見つかりません: item={}, store={}",
                item_id, store_id
            ))
        })
}

/// 在庫行が無い場合は0
async fn on_hand_at(
    uow: &mut dyn InventoryUnitOfWork,
    tenant_id: TenantId,
    item_id: ItemId,
    store_id: StoreId,
) -> Result<Decimal, ApplicationError> {
    Ok(uow
        .find_stock(tenant_id, item_id, store_id)
        .await?
        .map(|stock| stock.qty_on_hand())
        .unwrap_or(Decimal::ZERO))
}

fn insufficient(item: &Item, required: Decimal, on_hand: Decimal) -> ApplicationError {
    ApplicationError::InsufficientStock {
        item_code: item.code().to_string(),
        required,
        on_hand,
    }
}
