// ドメインモデル（エンティティと値オブジェクト）

mod value_objects;
mod item;
mod item_stock;
mod stock_ledger;
mod procurement_request;

pub use value_objects::{
    TenantId, ItemId, StoreId, ProcurementId,
    OriginRef,
    RateType, TxType, RefType, Direction, ProcurementStatus,
    positive_quantity,
};

pub use item::{Item, NewItem, RATE_SCALE, rolling_average};
pub use item_stock::ItemStock;
pub use stock_ledger::{NewLedgerEntry, StockLedgerEntry, net_issued_to, replay_balance};
pub use procurement_request::{NewProcurementRequest, ProcurementRequest};
