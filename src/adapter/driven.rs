// 駆動される側アダプター（ストア実装など）

mod configured_tenant_guard;
mod in_memory_inventory_store;
mod mysql_inventory_store;
mod tracing_notification_sink;

pub use configured_tenant_guard::ConfiguredTenantGuard;
pub use in_memory_inventory_store::InMemoryInventoryStore;
pub use mysql_inventory_store::MySqlInventoryStore;
pub use tracing_notification_sink::TracingNotificationSink;
