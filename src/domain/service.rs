// ドメインサービス
// 複数の在庫集約にまたがるビジネスロジックを実装

use crate::domain::model::{ItemStock, StoreId};
use rust_decimal::Decimal;

/// 在庫不足を埋めるための移動元の候補を走査順に並べる
///
/// 候補は与えられた順（在庫行の作成順）のまま返す（先頭適合）。
/// 移動先の倉庫だけを除外し、手持ち数量では絞り込まない。
/// スナップショットの数量は古い可能性があるため、移動量は各移動元をロックしてから決める。
pub fn transfer_sources(target: StoreId, candidates: &[ItemStock]) -> Vec<StoreId> {
    candidates
        .iter()
        .map(ItemStock::store_id)
        .filter(|&store_id| store_id != target)
        .collect()
}

/// 全倉庫の手持ち数量の合計
pub fn total_on_hand(stocks: &[ItemStock]) -> Decimal {
    stocks.iter().map(ItemStock::qty_on_hand).sum()
}

/// 移動で2つの在庫行をロックする順序を決める
/// 倉庫IDの昇順に並べる
pub fn lock_order(a: StoreId, b: StoreId) -> (StoreId, StoreId) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}
