use crate::domain::error::DomainError;
use crate::domain::model::{ItemId, StoreId, TenantId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

/// 在庫集約
/// (テナント, 品目, 倉庫) ごとの手持ち数量と引当数量を管理する
///
/// 手持ち数量は元帳の累計残高のキャッシュであり、元帳が正とされる。
/// `version` は楽観的な競合検出に使用し、保存時にストア側でインクリメントされる。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemStock {
    tenant_id: TenantId,
    item_id: ItemId,
    store_id: StoreId,
    qty_on_hand: Decimal,
    qty_reserved: Decimal,
    as_of: DateTime<Utc>,
    version: i64,
}

impl ItemStock {
    /// 数量0の在庫を作成
    /// 初回入荷または移動先として初めて使われる倉庫で遅延生成される
    pub fn empty(tenant_id: TenantId, item_id: ItemId, store_id: StoreId) -> Self {
        Self {
            tenant_id,
            item_id,
            store_id,
            qty_on_hand: Decimal::ZERO,
            qty_reserved: Decimal::ZERO,
            as_of: Utc::now(),
            version: 0,
        }
    }

    /// データベースから取得したデータで在庫を再構築
    pub fn reconstruct(
        tenant_id: TenantId,
        item_id: ItemId,
        store_id: StoreId,
        qty_on_hand: Decimal,
        qty_reserved: Decimal,
        as_of: DateTime<Utc>,
        version: i64,
    ) -> Self {
        Self {
            tenant_id,
            item_id,
            store_id,
            qty_on_hand,
            qty_reserved,
            as_of,
            version,
        }
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn item_id(&self) -> ItemId {
        self.item_id
    }

    pub fn store_id(&self) -> StoreId {
        self.store_id
    }

    /// 手持ち数量を取得
    pub fn qty_on_hand(&self) -> Decimal {
        self.qty_on_hand
    }

    /// 引当数量を取得
    pub fn qty_reserved(&self) -> Decimal {
        self.qty_reserved
    }

    /// 引当されていない数量を取得
    pub fn qty_available(&self) -> Decimal {
        (self.qty_on_hand - self.qty_reserved).max(Decimal::ZERO)
    }

    pub fn as_of(&self) -> DateTime<Utc> {
        self.as_of
    }

    /// 読み込み時点のバージョンを取得
    pub fn version(&self) -> i64 {
        self.version
    }

    /// 指定された数量の在庫が手持ちにあるかチェック
    ///
    /// # Arguments
    /// * `quantity` - チェックする数量
    ///
    /// # Returns
    /// * `true` - 在庫が十分にある
    /// * `false` - 在庫が不足している
    pub fn has_available_stock(&self, quantity: Decimal) -> bool {
        self.qty_on_hand >= quantity
    }

    /// 作業指示への払出しで在庫を消費する
    /// 消費分の引当も解放する（引当数量は負にならないよう0で止める）
    ///
    /// # Returns
    /// * `Ok(())` - 払出し成功
    /// * `Err(DomainError::InsufficientInventory)` - 在庫不足
    pub fn deduct(&mut self, quantity: Decimal) -> Result<(), DomainError> {
        if !self.has_available_stock(quantity) {
            return Err(DomainError::InsufficientInventory);
        }
        self.qty_on_hand -= quantity;
        self.qty_reserved = (self.qty_reserved - quantity).max(Decimal::ZERO);
        self.touch();
        Ok(())
    }

    /// 入荷・返品・移動入庫で在庫を増やす
    /// 引当数量には触れない
    pub fn increase(&mut self, quantity: Decimal) {
        self.qty_on_hand += quantity;
        self.touch();
    }

    /// 移動出庫で在庫を減らす
    /// 引当数量は新しい手持ち数量を超えないよう切り詰める
    pub fn transfer_out(&mut self, quantity: Decimal) -> Result<(), DomainError> {
        if !self.has_available_stock(quantity) {
            return Err(DomainError::InsufficientInventory);
        }
        self.qty_on_hand -= quantity;
        self.clamp_reservation();
        self.touch();
        Ok(())
    }

    /// 符号付きの数量で在庫を訂正する
    ///
    /// # Returns
    /// * `Ok(())` - 訂正成功
    /// * `Err(DomainError::InvalidQuantity)` - 0の訂正、または手持ちが負になる訂正
    pub fn adjust(&mut self, delta: Decimal) -> Result<(), DomainError> {
        if delta.is_zero() {
            return Err(DomainError::InvalidQuantity(
                "訂正数量は0にできません".to_string(),
            ));
        }
        let new_on_hand = self.qty_on_hand + delta;
        if new_on_hand < Decimal::ZERO {
            return Err(DomainError::InvalidQuantity(format!(
                "訂正後の手持ち数量が負になります: {}",
                new_on_hand
            )));
        }
        self.qty_on_hand = new_on_hand;
        self.clamp_reservation();
        self.touch();
        Ok(())
    }

    /// 在庫を引き当てる
    ///
    /// # Returns
    /// * `Ok(())` - 引当成功
    /// * `Err(DomainError::InsufficientInventory)` - 未引当の数量が不足している
    pub fn reserve(&mut self, quantity: Decimal) -> Result<(), DomainError> {
        if self.qty_available() < quantity {
            return Err(DomainError::InsufficientInventory);
        }
        self.qty_reserved += quantity;
        self.touch();
        Ok(())
    }

    /// 引当を解放する（引当数量は0で止める）
    pub fn release(&mut self, quantity: Decimal) {
        self.qty_reserved = (self.qty_reserved - quantity).max(Decimal::ZERO);
        self.touch();
    }

    /// 元帳から再計算した残高で手持ち数量を置き換える
    pub fn restate_on_hand(&mut self, ledger_balance: Decimal) {
        self.qty_on_hand = ledger_balance;
        self.clamp_reservation();
        self.touch();
    }

    fn clamp_reservation(&mut self) {
        self.qty_reserved = self
            .qty_reserved
            .min(self.qty_on_hand)
            .max(Decimal::ZERO);
    }

    fn touch(&mut self) {
        self.as_of = Utc::now();
    }
}
