use crate::adapter::database_error::DatabaseError;
use crate::domain::error::DomainError;
use crate::domain::model::{
    Direction, Item, ItemId, ItemStock, NewLedgerEntry, NewProcurementRequest, ProcurementId,
    ProcurementRequest, ProcurementStatus, RateType, RefType, StockLedgerEntry, StoreId, TenantId,
    TxType,
};
use crate::domain::port::{InventoryStore, InventoryUnitOfWork, RepositoryError};
use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

// MySQL関連のインポート
use sqlx::mysql::MySqlRow;
use sqlx::{MySql, Pool, Row, Transaction};

const STOCK_COLUMNS: &str =
    "tenant_id, item_id, store_id, qty_on_hand, qty_reserved, as_of, version";
const LEDGER_COLUMNS: &str = "id, tenant_id, item_id, store_id, tx_type, direction, ref_type, \
     ref_id, qty, rate, balance_after, occurred_at";
const PROCUREMENT_COLUMNS: &str =
    "id, tenant_id, item_id, qty, status, raised_from_work_order_ref, required_by, created_at";
const ITEM_COLUMNS: &str =
    "tenant_id, id, code, name, unit_of_measure, rate, rate_type, tax_percent";

/// MySQL在庫ストア
/// MySQLのトランザクションを1つのユニットオブワークとして提供する
#[derive(Clone)]
pub struct MySqlInventoryStore {
    pool: Pool<MySql>,
}

impl MySqlInventoryStore {
    /// 新しいMySQL在庫ストアを作成
    ///
    /// # Arguments
    /// * `pool` - MySQLコネクションプール
    pub fn new(pool: Pool<MySql>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InventoryStore for MySqlInventoryStore {
    async fn begin(&self) -> Result<Box<dyn InventoryUnitOfWork>, RepositoryError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(db_error("トランザクションの開始に失敗しました"))?;
        Ok(Box::new(MySqlUnitOfWork { tx }))
    }
}

/// MySQLトランザクション上のユニットオブワーク
/// コミットせずに破棄するとsqlxがロールバックする
pub struct MySqlUnitOfWork {
    tx: Transaction<'static, MySql>,
}

impl MySqlUnitOfWork {
    async fn select_stock(
        &mut self,
        tenant_id: TenantId,
        item_id: ItemId,
        store_id: StoreId,
        for_update: bool,
    ) -> Result<Option<ItemStock>, RepositoryError> {
        let sql = format!(
            "SELECT {} FROM item_stock WHERE tenant_id = ? AND item_id = ? AND store_id = ?{}",
            STOCK_COLUMNS,
            if for_update { " FOR UPDATE" } else { "" }
        );
        let row = sqlx::query(&sql)
            .bind(tenant_id.to_string())
            .bind(item_id.to_string())
            .bind(store_id.to_string())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_error("在庫の取得に失敗しました"))?;

        row.as_ref().map(stock_from_row).transpose()
    }
}

#[async_trait]
impl InventoryUnitOfWork for MySqlUnitOfWork {
    async fn find_item(
        &mut self,
        tenant_id: TenantId,
        item_id: ItemId,
    ) -> Result<Option<Item>, RepositoryError> {
        let sql = format!(
            "SELECT {} FROM items WHERE tenant_id = ? AND id = ?",
            ITEM_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(tenant_id.to_string())
            .bind(item_id.to_string())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_error("品目の取得に失敗しました"))?;

        row.as_ref().map(item_from_row).transpose()
    }

    async fn lock_item(
        &mut self,
        tenant_id: TenantId,
        item_id: ItemId,
    ) -> Result<Option<Item>, RepositoryError> {
        let sql = format!(
            "SELECT {} FROM items WHERE tenant_id = ? AND id = ? FOR UPDATE",
            ITEM_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(tenant_id.to_string())
            .bind(item_id.to_string())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_error("品目のロックに失敗しました"))?;

        row.as_ref().map(item_from_row).transpose()
    }

    async fn find_item_by_code(
        &mut self,
        tenant_id: TenantId,
        code: &str,
    ) -> Result<Option<Item>, RepositoryError> {
        let sql = format!(
            "SELECT {} FROM items WHERE tenant_id = ? AND code = ?",
            ITEM_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(tenant_id.to_string())
            .bind(code)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_error("品目の取得に失敗しました"))?;

        row.as_ref().map(item_from_row).transpose()
    }

    async fn insert_item(&mut self, item: &Item) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO items (tenant_id, id, code, name, unit_of_measure, rate, rate_type, tax_percent)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(item.tenant_id().to_string())
        .bind(item.id().to_string())
        .bind(item.code())
        .bind(item.name())
        .bind(item.unit_of_measure())
        .bind(item.rate())
        .bind(item.rate_type().to_string())
        .bind(item.tax_percent())
        .execute(&mut *self.tx)
        .await
        .map_err(db_error("品目の登録に失敗しました"))?;

        Ok(())
    }

    async fn update_item_rate(&mut self, item: &Item) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE items SET rate = ? WHERE tenant_id = ? AND id = ?")
            .bind(item.rate())
            .bind(item.tenant_id().to_string())
            .bind(item.id().to_string())
            .execute(&mut *self.tx)
            .await
            .map_err(db_error("品目単価の更新に失敗しました"))?;

        Ok(())
    }

    async fn find_stock(
        &mut self,
        tenant_id: TenantId,
        item_id: ItemId,
        store_id: StoreId,
    ) -> Result<Option<ItemStock>, RepositoryError> {
        self.select_stock(tenant_id, item_id, store_id, false).await
    }

    async fn lock_stock(
        &mut self,
        tenant_id: TenantId,
        item_id: ItemId,
        store_id: StoreId,
    ) -> Result<Option<ItemStock>, RepositoryError> {
        self.select_stock(tenant_id, item_id, store_id, true).await
    }

    async fn lock_or_create_stock(
        &mut self,
        tenant_id: TenantId,
        item_id: ItemId,
        store_id: StoreId,
    ) -> Result<ItemStock, RepositoryError> {
        // 既存の行には触れず、無い場合だけ数量0で作成する
        sqlx::query(
            r#"
            INSERT INTO item_stock (tenant_id, item_id, store_id, qty_on_hand, qty_reserved, as_of, version)
            VALUES (?, ?, ?, 0, 0, ?, 0)
            ON DUPLICATE KEY UPDATE id = id
            "#,
        )
        .bind(tenant_id.to_string())
        .bind(item_id.to_string())
        .bind(store_id.to_string())
        .bind(Utc::now())
        .execute(&mut *self.tx)
        .await
        .map_err(db_error("在庫行の作成に失敗しました"))?;

        self.select_stock(tenant_id, item_id, store_id, true)
            .await?
            .ok_or_else(|| {
                RepositoryError::FetchFailed(format!(
                    "作成した在庫行が見つかりません: item={}, store={}",
                    item_id, store_id
                ))
            })
    }

    async fn list_stocks_for_item(
        &mut self,
        tenant_id: TenantId,
        item_id: ItemId,
    ) -> Result<Vec<ItemStock>, RepositoryError> {
        // 在庫行の作成順（自動採番ID順）で並べる
        let sql = format!(
            "SELECT {} FROM item_stock WHERE tenant_id = ? AND item_id = ? ORDER BY id ASC",
            STOCK_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(tenant_id.to_string())
            .bind(item_id.to_string())
            .fetch_all(&mut *self.tx)
            .await
            .map_err(db_error("在庫一覧の取得に失敗しました"))?;

        rows.iter().map(stock_from_row).collect()
    }

    async fn save_stock(&mut self, stock: &ItemStock) -> Result<i64, RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE item_stock
            SET qty_on_hand = ?, qty_reserved = ?, as_of = ?, version = version + 1
            WHERE tenant_id = ? AND item_id = ? AND store_id = ? AND version = ?
            "#,
        )
        .bind(stock.qty_on_hand())
        .bind(stock.qty_reserved())
        .bind(stock.as_of())
        .bind(stock.tenant_id().to_string())
        .bind(stock.item_id().to_string())
        .bind(stock.store_id().to_string())
        .bind(stock.version())
        .execute(&mut *self.tx)
        .await
        .map_err(db_error("在庫の保存に失敗しました"))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::VersionConflict(format!(
                "在庫が他の処理で更新されています: item={}, store={}, version={}",
                stock.item_id(),
                stock.store_id(),
                stock.version()
            )));
        }
        Ok(stock.version() + 1)
    }

    async fn append_ledger(
        &mut self,
        entry: NewLedgerEntry,
    ) -> Result<StockLedgerEntry, RepositoryError> {
        let result = sqlx::query(
            r#"
            INSERT INTO stock_ledger
                (tenant_id, item_id, store_id, tx_type, direction, ref_type, ref_id, qty, rate, balance_after, occurred_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.tenant_id.to_string())
        .bind(entry.item_id.to_string())
        .bind(entry.store_id.to_string())
        .bind(entry.tx_type.to_string())
        .bind(entry.direction.to_string())
        .bind(entry.ref_type.to_string())
        .bind(entry.ref_id.as_deref())
        .bind(entry.qty)
        .bind(entry.rate)
        .bind(entry.balance_after)
        .bind(entry.occurred_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db_error("元帳の追記に失敗しました"))?;

        Ok(entry.into_entry(result.last_insert_id() as i64))
    }

    async fn ledger_for(
        &mut self,
        tenant_id: TenantId,
        item_id: ItemId,
        store_id: StoreId,
    ) -> Result<Vec<StockLedgerEntry>, RepositoryError> {
        let sql = format!(
            "SELECT {} FROM stock_ledger \
             WHERE tenant_id = ? AND item_id = ? AND store_id = ? \
             ORDER BY occurred_at ASC, id ASC",
            LEDGER_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(tenant_id.to_string())
            .bind(item_id.to_string())
            .bind(store_id.to_string())
            .fetch_all(&mut *self.tx)
            .await
            .map_err(db_error("元帳の取得に失敗しました"))?;

        rows.iter().map(ledger_from_row).collect()
    }

    async fn insert_procurement(
        &mut self,
        request: NewProcurementRequest,
    ) -> Result<ProcurementRequest, RepositoryError> {
        let result = sqlx::query(
            r#"
            INSERT INTO procurement_requests
                (tenant_id, item_id, qty, status, raised_from_work_order_ref, required_by, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(request.tenant_id.to_string())
        .bind(request.item_id.to_string())
        .bind(request.qty)
        .bind(ProcurementStatus::Draft.to_string())
        .bind(request.raised_from_work_order_ref.as_deref())
        .bind(request.required_by)
        .bind(request.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db_error("調達依頼の起票に失敗しました"))?;

        Ok(request.into_request(ProcurementId::new(result.last_insert_id() as i64)))
    }

    async fn find_procurement(
        &mut self,
        tenant_id: TenantId,
        id: ProcurementId,
    ) -> Result<Option<ProcurementRequest>, RepositoryError> {
        let sql = format!(
            "SELECT {} FROM procurement_requests WHERE tenant_id = ? AND id = ?",
            PROCUREMENT_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(tenant_id.to_string())
            .bind(id.value())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_error("調達依頼の取得に失敗しました"))?;

        row.as_ref().map(procurement_from_row).transpose()
    }

    async fn save_procurement(
        &mut self,
        request: &ProcurementRequest,
    ) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE procurement_requests SET status = ? WHERE tenant_id = ? AND id = ?")
            .bind(request.status().to_string())
            .bind(request.tenant_id().to_string())
            .bind(request.id().value())
            .execute(&mut *self.tx)
            .await
            .map_err(db_error("調達依頼の保存に失敗しました"))?;

        Ok(())
    }

    async fn list_procurements(
        &mut self,
        tenant_id: TenantId,
        status: Option<ProcurementStatus>,
    ) -> Result<Vec<ProcurementRequest>, RepositoryError> {
        let rows = match status {
            Some(status) => {
                let sql = format!(
                    "SELECT {} FROM procurement_requests WHERE tenant_id = ? AND status = ? ORDER BY id ASC",
                    PROCUREMENT_COLUMNS
                );
                sqlx::query(&sql)
                    .bind(tenant_id.to_string())
                    .bind(status.to_string())
                    .fetch_all(&mut *self.tx)
                    .await
            }
            None => {
                let sql = format!(
                    "SELECT {} FROM procurement_requests WHERE tenant_id = ? ORDER BY id ASC",
                    PROCUREMENT_COLUMNS
                );
                sqlx::query(&sql)
                    .bind(tenant_id.to_string())
                    .fetch_all(&mut *self.tx)
                    .await
            }
        }
        .map_err(db_error("調達依頼一覧の取得に失敗しました"))?;

        rows.iter().map(procurement_from_row).collect()
    }

    async fn commit(self: Box<Self>) -> Result<(), RepositoryError> {
        self.tx
            .commit()
            .await
            .map_err(db_error("コミットに失敗しました"))
    }

    async fn rollback(self: Box<Self>) -> Result<(), RepositoryError> {
        self.tx
            .rollback()
            .await
            .map_err(db_error("ロールバックに失敗しました"))
    }
}

/// sqlxのエラーを分類してリポジトリエラーに変換する
/// ロック待ちタイムアウトとデッドロックは再試行可能なエラーになる
fn db_error(context: &'static str) -> impl FnOnce(sqlx::Error) -> RepositoryError {
    move |e| match DatabaseError::from(e) {
        DatabaseError::QueryError(msg) => {
            DatabaseError::QueryError(format!("{}: {}", context, msg)).into()
        }
        other => other.into(),
    }
}

fn column<'r, T>(row: &'r MySqlRow, name: &str) -> Result<T, RepositoryError>
where
    T: sqlx::Decode<'r, MySql> + sqlx::Type<MySql>,
{
    row.try_get(name)
        .map_err(|e| RepositoryError::FetchFailed(format!("{}の取得に失敗しました: {}", name, e)))
}

fn uuid_column(row: &MySqlRow, name: &str) -> Result<Uuid, RepositoryError> {
    let value: String = column(row, name)?;
    Uuid::parse_str(&value)
        .map_err(|e| RepositoryError::FetchFailed(format!("{}の解析に失敗しました: {}", name, e)))
}

fn enum_column<T>(
    row: &MySqlRow,
    name: &str,
    parse: fn(&str) -> Result<T, DomainError>,
) -> Result<T, RepositoryError> {
    let value: String = column(row, name)?;
    parse(&value).map_err(|e| RepositoryError::FetchFailed(e.to_string()))
}

fn item_from_row(row: &MySqlRow) -> Result<Item, RepositoryError> {
    Ok(Item::reconstruct(
        TenantId::from_uuid(uuid_column(row, "tenant_id")?),
        ItemId::from_uuid(uuid_column(row, "id")?),
        column(row, "code")?,
        column(row, "name")?,
        column(row, "unit_of_measure")?,
        column(row, "rate")?,
        enum_column(row, "rate_type", RateType::from_string)?,
        column(row, "tax_percent")?,
    ))
}

fn stock_from_row(row: &MySqlRow) -> Result<ItemStock, RepositoryError> {
    Ok(ItemStock::reconstruct(
        TenantId::from_uuid(uuid_column(row, "tenant_id")?),
        ItemId::from_uuid(uuid_column(row, "item_id")?),
        StoreId::from_uuid(uuid_column(row, "store_id")?),
        column(row, "qty_on_hand")?,
        column(row, "qty_reserved")?,
        column(row, "as_of")?,
        column(row, "version")?,
    ))
}

fn ledger_from_row(row: &MySqlRow) -> Result<StockLedgerEntry, RepositoryError> {
    Ok(StockLedgerEntry {
        id: column(row, "id")?,
        tenant_id: TenantId::from_uuid(uuid_column(row, "tenant_id")?),
        item_id: ItemId::from_uuid(uuid_column(row, "item_id")?),
        store_id: StoreId::from_uuid(uuid_column(row, "store_id")?),
        tx_type: enum_column(row, "tx_type", TxType::from_string)?,
        direction: enum_column(row, "direction", Direction::from_string)?,
        ref_type: enum_column(row, "ref_type", RefType::from_string)?,
        ref_id: column(row, "ref_id")?,
        qty: column(row, "qty")?,
        rate: column(row, "rate")?,
        balance_after: column(row, "balance_after")?,
        occurred_at: column(row, "occurred_at")?,
    })
}

fn procurement_from_row(row: &MySqlRow) -> Result<ProcurementRequest, RepositoryError> {
    Ok(ProcurementRequest::reconstruct(
        ProcurementId::new(column(row, "id")?),
        TenantId::from_uuid(uuid_column(row, "tenant_id")?),
        ItemId::from_uuid(uuid_column(row, "item_id")?),
        column(row, "qty")?,
        enum_column(row, "status", ProcurementStatus::from_string)?,
        column(row, "raised_from_work_order_ref")?,
        column(row, "required_by")?,
        column(row, "created_at")?,
    ))
}
