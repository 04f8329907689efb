// 出力ポート
// ドメイン層が外部に依存する機能をトレイトとして定義
// アダプター層でこれらのトレイトを実装する

use crate::domain::model::{
    Item, ItemId, ItemStock, NewLedgerEntry, NewProcurementRequest, ProcurementId,
    ProcurementRequest, ProcurementStatus, StockLedgerEntry, StoreId, TenantId,
};
use async_trait::async_trait;
use serde::Serialize;

/// リポジトリエラー型
/// リポジトリ操作で発生するエラーを表現する
#[derive(Debug, Clone, PartialEq)]
#[allow(clippy::enum_variant_names)]
pub enum RepositoryError {
    /// データベース接続に失敗
    ConnectionFailed(String),
    /// 操作に失敗
    OperationFailed(String),
    /// データの取得に失敗
    FetchFailed(String),
    /// 読み込み後に他の書き込みでバージョンが進んでいた
    VersionConflict(String),
    /// ロック待ちタイムアウトやデッドロック（再試行可能）
    Transient(String),
}

impl RepositoryError {
    /// 再試行で解消する可能性があるエラーかチェック
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            RepositoryError::VersionConflict(_) | RepositoryError::Transient(_)
        )
    }
}

impl std::fmt::Display for RepositoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RepositoryError::ConnectionFailed(msg) => write!(f, "Connection failed: {}", msg),
            RepositoryError::OperationFailed(msg) => write!(f, "Operation failed: {}", msg),
            RepositoryError::FetchFailed(msg) => write!(f, "Fetch failed: {}", msg),
            RepositoryError::VersionConflict(msg) => write!(f, "Version conflict: {}", msg),
            RepositoryError::Transient(msg) => write!(f, "Transient failure: {}", msg),
        }
    }
}

impl std::error::Error for RepositoryError {}

/// 在庫ストアトレイト
/// トランザクション単位（ユニットオブワーク）の開始を抽象化する
#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// 新しいユニットオブワークを開始する
    ///
    /// # Returns
    /// * `Ok(Box<dyn InventoryUnitOfWork>)` - 開始したユニットオブワーク
    /// * `Err(RepositoryError)` - 開始失敗
    async fn begin(&self) -> Result<Box<dyn InventoryUnitOfWork>, RepositoryError>;
}

/// 在庫ユニットオブワークトレイト
/// 1つのトランザクション内で品目・在庫・元帳・調達依頼を読み書きする
///
/// すべての操作はテナントで絞り込まれる。
/// `commit` せずに破棄された場合、書き込みはすべて取り消される。
#[async_trait]
pub trait InventoryUnitOfWork: Send {
    /// 品目IDで品目を検索する
    ///
    /// # Returns
    /// * `Ok(Some(Item))` - 品目が見つかった
    /// * `Ok(None)` - 品目が見つからなかった
    /// * `Err(RepositoryError)` - 検索失敗
    async fn find_item(
        &mut self,
        tenant_id: TenantId,
        item_id: ItemId,
    ) -> Result<Option<Item>, RepositoryError>;

    /// 品目行を排他ロックして読み込む
    /// 単価の読み込みから更新までの間、他のトランザクションの単価更新を待たせる
    async fn lock_item(
        &mut self,
        tenant_id: TenantId,
        item_id: ItemId,
    ) -> Result<Option<Item>, RepositoryError>;

    /// 品目コードで品目を検索する
    async fn find_item_by_code(
        &mut self,
        tenant_id: TenantId,
        code: &str,
    ) -> Result<Option<Item>, RepositoryError>;

    /// 品目を登録する
    async fn insert_item(&mut self, item: &Item) -> Result<(), RepositoryError>;

    /// 品目の単価を更新する
    async fn update_item_rate(&mut self, item: &Item) -> Result<(), RepositoryError>;

    /// 在庫をロックせずに読み込む
    async fn find_stock(
        &mut self,
        tenant_id: TenantId,
        item_id: ItemId,
        store_id: StoreId,
    ) -> Result<Option<ItemStock>, RepositoryError>;

    /// 在庫行を排他ロックして読み込む
    /// ロックはコミットまたはロールバックまで保持される
    ///
    /// # Returns
    /// * `Ok(Some(ItemStock))` - ロックした在庫
    /// * `Ok(None)` - 在庫行が存在しない
    /// * `Err(RepositoryError)` - 読み込み失敗
    async fn lock_stock(
        &mut self,
        tenant_id: TenantId,
        item_id: ItemId,
        store_id: StoreId,
    ) -> Result<Option<ItemStock>, RepositoryError>;

    /// 在庫行が無ければ数量0で作成し、排他ロックして読み込む
    async fn lock_or_create_stock(
        &mut self,
        tenant_id: TenantId,
        item_id: ItemId,
        store_id: StoreId,
    ) -> Result<ItemStock, RepositoryError>;

    /// 品目のすべての倉庫の在庫を取得する
    /// 在庫行の作成順で並べて返す
    async fn list_stocks_for_item(
        &mut self,
        tenant_id: TenantId,
        item_id: ItemId,
    ) -> Result<Vec<ItemStock>, RepositoryError>;

    /// 在庫を保存する
    /// 読み込み時のバージョンと一致する場合のみ書き込み、バージョンを1進める
    ///
    /// # Returns
    /// * `Ok(i64)` - 保存後のバージョン
    /// * `Err(RepositoryError::VersionConflict)` - バージョン不一致
    /// * `Err(RepositoryError)` - 保存失敗
    async fn save_stock(&mut self, stock: &ItemStock) -> Result<i64, RepositoryError>;

    /// 元帳にエントリを追記する
    ///
    /// # Returns
    /// * `Ok(StockLedgerEntry)` - 採番済みのエントリ
    /// * `Err(RepositoryError)` - 追記失敗
    async fn append_ledger(
        &mut self,
        entry: NewLedgerEntry,
    ) -> Result<StockLedgerEntry, RepositoryError>;

    /// (品目, 倉庫) の元帳を取得する
    /// 発生日時、同時刻の場合は追記順で並べて返す
    async fn ledger_for(
        &mut self,
        tenant_id: TenantId,
        item_id: ItemId,
        store_id: StoreId,
    ) -> Result<Vec<StockLedgerEntry>, RepositoryError>;

    /// 調達依頼を起票する
    ///
    /// # Returns
    /// * `Ok(ProcurementRequest)` - 採番済みの調達依頼
    /// * `Err(RepositoryError)` - 起票失敗
    async fn insert_procurement(
        &mut self,
        request: NewProcurementRequest,
    ) -> Result<ProcurementRequest, RepositoryError>;

    /// 調達依頼IDで調達依頼を検索する
    async fn find_procurement(
        &mut self,
        tenant_id: TenantId,
        id: ProcurementId,
    ) -> Result<Option<ProcurementRequest>, RepositoryError>;

    /// 調達依頼のステータスを保存する
    async fn save_procurement(
        &mut self,
        request: &ProcurementRequest,
    ) -> Result<(), RepositoryError>;

    /// 調達依頼を取得する
    /// ステータスを指定した場合はそのステータスのみ、起票順で並べて返す
    async fn list_procurements(
        &mut self,
        tenant_id: TenantId,
        status: Option<ProcurementStatus>,
    ) -> Result<Vec<ProcurementRequest>, RepositoryError>;

    /// 書き込みを確定する
    async fn commit(self: Box<Self>) -> Result<(), RepositoryError>;

    /// 書き込みを取り消す
    async fn rollback(self: Box<Self>) -> Result<(), RepositoryError>;
}

/// 通知カテゴリ（調達）
pub const PROCUREMENT_CATEGORY: &str = "PROCUREMENT";

/// 外部に送る通知
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub tenant_id: TenantId,
    pub subject: String,
    pub body: String,
    pub category: String,
    pub reference_id: String,
}

/// 通知エラー
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("Notification delivery failed: {0}")]
    DeliveryFailed(String),
}

/// 通知送信トレイト
/// 在庫不足時の通知先を抽象化するポート
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// 通知を送信する
    async fn notify(&self, notification: Notification) -> Result<(), NotificationError>;
}

/// テナント状態エラー
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TenantError {
    #[error("Tenant {0} is not active")]
    Inactive(TenantId),
}

/// テナントガードトレイト
/// すべての操作の前にテナントの契約が有効かを確認する
#[async_trait]
pub trait TenantGuard: Send + Sync {
    async fn assert_active(&self, tenant_id: TenantId) -> Result<(), TenantError>;
}
