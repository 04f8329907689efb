use fieldservice_inventory::adapter::driven::{
    ConfiguredTenantGuard, MySqlInventoryStore, TracingNotificationSink,
};
use fieldservice_inventory::adapter::driver::rest_api::{create_router, AppState};
use fieldservice_inventory::adapter::{AppConfig, DatabaseMigration};
use fieldservice_inventory::application::service::{
    InventoryApplicationService, InventoryQueryService,
};

use sqlx::mysql::MySqlPoolOptions;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // .envファイルから環境変数を読み込む
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("fieldservice_inventory=debug,tower_http=debug,sqlx=warn")
        }))
        .init();

    // 設定を読み込む
    let config = AppConfig::load()?;
    info!(
        host = %config.database.host,
        port = config.database.port,
        suspended_tenants = config.tenants.suspended.len(),
        "Configuration loaded"
    );

    // 接続プールを作成
    let pool = MySqlPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.connection_string())
        .await?;
    info!("Database pool created");

    // マイグレーションを実行
    DatabaseMigration::new(pool.clone()).run().await?;

    // 駆動されるアダプターを作成
    let store = Arc::new(MySqlInventoryStore::new(pool));
    let notification_sink = Arc::new(TracingNotificationSink::new());
    let tenant_guard = Arc::new(ConfiguredTenantGuard::new(
        config.tenants.suspended.iter().copied(),
    ));

    // アプリケーション状態を作成
    let app_state = AppState {
        inventory_service: Arc::new(InventoryApplicationService::new(
            store.clone(),
            notification_sink,
            tenant_guard.clone(),
        )),
        inventory_query_service: Arc::new(InventoryQueryService::new(store, tenant_guard)),
    };

    // REST APIルーターを作成
    let app = create_router()
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(app_state);

    // サーバーを起動
    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!(address = %address, "Inventory API listening");

    axum::serve(listener, app).await?;

    Ok(())
}
