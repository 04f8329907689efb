use crate::domain::error::DomainError;
use crate::domain::model::{Direction, ItemId, RefType, StoreId, TenantId, TxType};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

/// 追記前の元帳エントリ
/// 採番前の状態で、ストアに追記されると `StockLedgerEntry` になる
#[derive(Debug, Clone, PartialEq)]
pub struct NewLedgerEntry {
    pub tenant_id: TenantId,
    pub item_id: ItemId,
    pub store_id: StoreId,
    pub tx_type: TxType,
    pub direction: Direction,
    pub ref_type: RefType,
    pub ref_id: Option<String>,
    pub qty: Decimal,
    pub rate: Option<Decimal>,
    pub balance_after: Decimal,
    pub occurred_at: DateTime<Utc>,
}

impl NewLedgerEntry {
    #[allow(clippy::too_many_arguments)]
    fn build(
        tenant_id: TenantId,
        item_id: ItemId,
        store_id: StoreId,
        tx_type: TxType,
        direction: Direction,
        ref_type: RefType,
        ref_id: Option<String>,
        qty: Decimal,
        rate: Option<Decimal>,
        balance_after: Decimal,
    ) -> Result<Self, DomainError> {
        if qty <= Decimal::ZERO {
            return Err(DomainError::InvalidQuantity(format!(
                "元帳の数量は正である必要があります: {}",
                qty
            )));
        }
        Ok(Self {
            tenant_id,
            item_id,
            store_id,
            tx_type,
            direction,
            ref_type,
            ref_id,
            qty,
            rate,
            balance_after,
            occurred_at: Utc::now(),
        })
    }

    /// 入庫エントリを作成
    #[allow(clippy::too_many_arguments)]
    pub fn inbound(
        tenant_id: TenantId,
        item_id: ItemId,
        store_id: StoreId,
        ref_type: RefType,
        ref_id: Option<String>,
        qty: Decimal,
        rate: Option<Decimal>,
        balance_after: Decimal,
    ) -> Result<Self, DomainError> {
        Self::build(
            tenant_id,
            item_id,
            store_id,
            TxType::In,
            Direction::Inbound,
            ref_type,
            ref_id,
            qty,
            rate,
            balance_after,
        )
    }

    /// 出庫エントリを作成
    #[allow(clippy::too_many_arguments)]
    pub fn outbound(
        tenant_id: TenantId,
        item_id: ItemId,
        store_id: StoreId,
        ref_type: RefType,
        ref_id: Option<String>,
        qty: Decimal,
        rate: Option<Decimal>,
        balance_after: Decimal,
    ) -> Result<Self, DomainError> {
        Self::build(
            tenant_id,
            item_id,
            store_id,
            TxType::Out,
            Direction::Outbound,
            ref_type,
            ref_id,
            qty,
            rate,
            balance_after,
        )
    }

    /// 訂正エントリを作成
    /// 数量は訂正量の絶対値、増減は符号から決まる
    pub fn adjustment(
        tenant_id: TenantId,
        item_id: ItemId,
        store_id: StoreId,
        delta: Decimal,
        note: Option<String>,
        rate: Option<Decimal>,
        balance_after: Decimal,
    ) -> Result<Self, DomainError> {
        let direction = if delta.is_sign_negative() {
            Direction::Outbound
        } else {
            Direction::Inbound
        };
        Self::build(
            tenant_id,
            item_id,
            store_id,
            TxType::Adjust,
            direction,
            RefType::Adjustment,
            note,
            delta.abs(),
            rate,
            balance_after,
        )
    }

    /// 採番済みの元帳エントリに変換
    pub fn into_entry(self, id: i64) -> StockLedgerEntry {
        StockLedgerEntry {
            id,
            tenant_id: self.tenant_id,
            item_id: self.item_id,
            store_id: self.store_id,
            tx_type: self.tx_type,
            direction: self.direction,
            ref_type: self.ref_type,
            ref_id: self.ref_id,
            qty: self.qty,
            rate: self.rate,
            balance_after: self.balance_after,
            occurred_at: self.occurred_at,
        }
    }
}

/// 在庫元帳エントリ
/// 一度書き込まれたら変更も削除もされない
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StockLedgerEntry {
    pub id: i64,
    pub tenant_id: TenantId,
    pub item_id: ItemId,
    pub store_id: StoreId,
    pub tx_type: TxType,
    pub direction: Direction,
    pub ref_type: RefType,
    pub ref_id: Option<String>,
    pub qty: Decimal,
    pub rate: Option<Decimal>,
    pub balance_after: Decimal,
    pub occurred_at: DateTime<Utc>,
}

impl StockLedgerEntry {
    /// 符号付きの数量を取得（入庫は正、出庫は負）
    pub fn signed_qty(&self) -> Decimal {
        match self.direction {
            Direction::Inbound => self.qty,
            Direction::Outbound => -self.qty,
        }
    }

    /// 指定された参照を持つエントリかチェック
    pub fn references(&self, ref_type: RefType, ref_id: &str) -> bool {
        self.ref_type == ref_type && self.ref_id.as_deref() == Some(ref_id)
    }
}

/// 元帳を再生して残高を計算する
pub fn replay_balance<'a>(entries: impl IntoIterator<Item = &'a StockLedgerEntry>) -> Decimal {
    entries
        .into_iter()
        .fold(Decimal::ZERO, |balance, entry| balance + entry.signed_qty())
}

/// 作業指示へ払い出された正味数量を計算する
/// 払出し（WO_ISSUE）から返品（WO_RETURN）を差し引く
pub fn net_issued_to<'a>(
    entries: impl IntoIterator<Item = &'a StockLedgerEntry>,
    work_order_ref: &str,
) -> Decimal {
    entries.into_iter().fold(Decimal::ZERO, |net, entry| {
        if entry.references(RefType::WoIssue, work_order_ref) {
            net + entry.qty
        } else if entry.references(RefType::WoReturn, work_order_ref) {
            net - entry.qty
        } else {
            net
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn ids() -> (TenantId, ItemId, StoreId) {
        (TenantId::new(), ItemId::new(), StoreId::new())
    }

    #[test]
    fn test_entry_rejects_non_positive_quantity() {
        let (tenant, item, store) = ids();
        let result = NewLedgerEntry::inbound(
            tenant,
            item,
            store,
            RefType::PoReceipt,
            None,
            Decimal::ZERO,
            None,
            Decimal::ZERO,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_adjustment_direction_follows_sign() {
        let (tenant, item, store) = ids();
        let entry = NewLedgerEntry::adjustment(tenant, item, store, dec!(-2), None, None, dec!(3))
            .unwrap()
            .into_entry(1);
        assert_eq!(entry.tx_type, TxType::Adjust);
        assert_eq!(entry.direction, Direction::Outbound);
        assert_eq!(entry.qty, dec!(2));
        assert_eq!(entry.signed_qty(), dec!(-2));
    }

    #[test]
    fn test_replay_balance() {
        let (tenant, item, store) = ids();
        let entries = vec![
            NewLedgerEntry::inbound(tenant, item, store, RefType::PoReceipt, None, dec!(10), None, dec!(10))
                .unwrap()
                .into_entry(1),
            NewLedgerEntry::outbound(tenant, item, store, RefType::WoIssue, Some("WO-1".into()), dec!(4), None, dec!(6))
                .unwrap()
                .into_entry(2),
            NewLedgerEntry::adjustment(tenant, item, store, dec!(1), None, None, dec!(7))
                .unwrap()
                .into_entry(3),
        ];
        assert_eq!(replay_balance(&entries), dec!(7));
    }

    #[test]
    fn test_net_issued_to_work_order() {
        let (tenant, item, store) = ids();
        let entries = vec![
            NewLedgerEntry::outbound(tenant, item, store, RefType::WoIssue, Some("WO-1".into()), dec!(5), None, dec!(5))
                .unwrap()
                .into_entry(1),
            NewLedgerEntry::outbound(tenant, item, store, RefType::WoIssue, Some("WO-2".into()), dec!(2), None, dec!(3))
                .unwrap()
                .into_entry(2),
            NewLedgerEntry::inbound(tenant, item, store, RefType::WoReturn, Some("WO-1".into()), dec!(1), None, dec!(4))
                .unwrap()
                .into_entry(3),
        ];
        assert_eq!(net_issued_to(&entries, "WO-1"), dec!(4));
        assert_eq!(net_issued_to(&entries, "WO-2"), dec!(2));
        assert_eq!(net_issued_to(&entries, "WO-3"), Decimal::ZERO);
    }
}
