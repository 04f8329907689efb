use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use uuid::Uuid;

use crate::adapter::driver::request_dto::{
    AdjustRequest, EnsureAnyStoreRequest, EnsureStockRequest, ProcurementQueryParams,
    QuantityRequest, ReceiveRequest, RegisterItemRequest, WorkOrderMovementRequest,
};
use crate::adapter::driver::response_dto::{
    ItemResponse, LedgerEntryResponse, ProcurementResponse, StockResponse, StockSummaryResponse,
};
use crate::application::service::{
    InventoryApplicationService, InventoryQueryService, ReconciliationReport,
};
use crate::application::ApplicationError;
use crate::domain::error::DomainError;
use crate::domain::model::{
    ItemId, NewItem, OriginRef, ProcurementId, ProcurementStatus, StoreId, TenantId,
};

/// 在庫不足の詳細
#[derive(Serialize, Deserialize)]
pub struct ShortageDetail {
    pub item_code: String,
    pub required: Decimal,
    pub on_hand: Decimal,
}

#[derive(Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shortage: Option<ShortageDetail>,
}

type ApiResult<T> = Result<T, (StatusCode, Json<ApiError>)>;

// アプリケーションサービスを含む状態
#[derive(Clone)]
pub struct AppState {
    pub inventory_service: Arc<InventoryApplicationService>,
    pub inventory_query_service: Arc<InventoryQueryService>,
}

// REST APIルーターを作成
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/tenants/:tenant_id/items", post(register_item))
        .route("/tenants/:tenant_id/items/:item_id/stock", get(get_item_stock))
        .route("/tenants/:tenant_id/items/:item_id/ensure", post(ensure_stock))
        .route(
            "/tenants/:tenant_id/items/:item_id/ensure-any",
            post(ensure_stock_any_store),
        )
        .route(
            "/tenants/:tenant_id/items/:item_id/stores/:store_id/ledger",
            get(get_ledger),
        )
        .route(
            "/tenants/:tenant_id/items/:item_id/stores/:store_id/deduct",
            post(deduct),
        )
        .route(
            "/tenants/:tenant_id/items/:item_id/stores/:store_id/receive",
            post(receive),
        )
        .route(
            "/tenants/:tenant_id/items/:item_id/stores/:store_id/return",
            post(return_from_work_order),
        )
        .route(
            "/tenants/:tenant_id/items/:item_id/stores/:store_id/adjust",
            post(adjust),
        )
        .route(
            "/tenants/:tenant_id/items/:item_id/stores/:store_id/reserve",
            post(reserve),
        )
        .route(
            "/tenants/:tenant_id/items/:item_id/stores/:store_id/release",
            post(release_reservation),
        )
        .route(
            "/tenants/:tenant_id/items/:item_id/stores/:store_id/reconcile",
            post(reconcile),
        )
        .route(
            "/tenants/:tenant_id/procurement-requests",
            get(get_procurement_requests),
        )
        .route(
            "/tenants/:tenant_id/procurement-requests/:procurement_id",
            get(get_procurement_request),
        )
}

// ヘルスチェックエンドポイント
async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "fieldservice-inventory",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

// 品目登録エンドポイント
async fn register_item(
    State(state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
    Json(request): Json<RegisterItemRequest>,
) -> ApiResult<(StatusCode, Json<ItemResponse>)> {
    let input = NewItem {
        code: request.code,
        name: request.name,
        unit_of_measure: request.unit_of_measure,
        rate: request.rate,
        rate_type: request.rate_type,
        tax_percent: request.tax_percent,
    };

    let item = state
        .inventory_service
        .register_item(TenantId::from_uuid(tenant_id), input)
        .await
        .map_err(map_application_error)?;

    Ok((StatusCode::CREATED, Json(ItemResponse::from_item(&item))))
}

// 品目の全倉庫の在庫取得エンドポイント
async fn get_item_stock(
    State(state): State<AppState>,
    Path((tenant_id, item_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<StockSummaryResponse>> {
    let stocks = state
        .inventory_query_service
        .list_stock_for_item(TenantId::from_uuid(tenant_id), ItemId::from_uuid(item_id))
        .await
        .map_err(map_application_error)?;

    Ok(Json(StockSummaryResponse {
        item_id: item_id.to_string(),
        total_on_hand: stocks.iter().map(|s| s.qty_on_hand()).sum(),
        stores: stocks.iter().map(StockResponse::from_stock).collect(),
    }))
}

// 在庫確保エンドポイント
async fn ensure_stock(
    State(state): State<AppState>,
    Path((tenant_id, item_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<EnsureStockRequest>,
) -> ApiResult<StatusCode> {
    let origin = origin_ref(request.origin_ref, request.due_date)?;

    state
        .inventory_service
        .ensure_stock_or_raise_procurement(
            TenantId::from_uuid(tenant_id),
            ItemId::from_uuid(item_id),
            StoreId::from_uuid(request.store_id),
            request.qty,
            origin,
        )
        .await
        .map_err(map_application_error)?;

    Ok(StatusCode::OK)
}

// 全倉庫での在庫確保エンドポイント
async fn ensure_stock_any_store(
    State(state): State<AppState>,
    Path((tenant_id, item_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<EnsureAnyStoreRequest>,
) -> ApiResult<StatusCode> {
    let origin = origin_ref(request.origin_ref, request.due_date)?;

    state
        .inventory_service
        .ensure_stock_or_raise_procurement_any_store(
            TenantId::from_uuid(tenant_id),
            ItemId::from_uuid(item_id),
            request.qty,
            origin,
        )
        .await
        .map_err(map_application_error)?;

    Ok(StatusCode::OK)
}

// 元帳取得エンドポイント
async fn get_ledger(
    State(state): State<AppState>,
    Path((tenant_id, item_id, store_id)): Path<(Uuid, Uuid, Uuid)>,
) -> ApiResult<Json<Vec<LedgerEntryResponse>>> {
    let entries = state
        .inventory_query_service
        .ledger_history(
            TenantId::from_uuid(tenant_id),
            ItemId::from_uuid(item_id),
            StoreId::from_uuid(store_id),
        )
        .await
        .map_err(map_application_error)?;

    Ok(Json(entries.iter().map(LedgerEntryResponse::from_entry).collect()))
}

// 作業指示への払出しエンドポイント
async fn deduct(
    State(state): State<AppState>,
    Path((tenant_id, item_id, store_id)): Path<(Uuid, Uuid, Uuid)>,
    Json(request): Json<WorkOrderMovementRequest>,
) -> ApiResult<Json<LedgerEntryResponse>> {
    let entry = state
        .inventory_service
        .deduct(
            TenantId::from_uuid(tenant_id),
            ItemId::from_uuid(item_id),
            StoreId::from_uuid(store_id),
            request.qty,
            &request.work_order_ref,
        )
        .await
        .map_err(map_application_error)?;

    Ok(Json(LedgerEntryResponse::from_entry(&entry)))
}

// 入荷エンドポイント
async fn receive(
    State(state): State<AppState>,
    Path((tenant_id, item_id, store_id)): Path<(Uuid, Uuid, Uuid)>,
    Json(request): Json<ReceiveRequest>,
) -> ApiResult<Json<LedgerEntryResponse>> {
    let entry = state
        .inventory_service
        .receive(
            TenantId::from_uuid(tenant_id),
            ItemId::from_uuid(item_id),
            StoreId::from_uuid(store_id),
            request.qty,
            request.procurement_id.map(ProcurementId::new),
            request.unit_cost,
        )
        .await
        .map_err(map_application_error)?;

    Ok(Json(LedgerEntryResponse::from_entry(&entry)))
}

// 作業指示からの返品エンドポイント
async fn return_from_work_order(
    State(state): State<AppState>,
    Path((tenant_id, item_id, store_id)): Path<(Uuid, Uuid, Uuid)>,
    Json(request): Json<WorkOrderMovementRequest>,
) -> ApiResult<Json<LedgerEntryResponse>> {
    let entry = state
        .inventory_service
        .return_from_work_order(
            TenantId::from_uuid(tenant_id),
            ItemId::from_uuid(item_id),
            StoreId::from_uuid(store_id),
            request.qty,
            &request.work_order_ref,
        )
        .await
        .map_err(map_application_error)?;

    Ok(Json(LedgerEntryResponse::from_entry(&entry)))
}

// 在庫訂正エンドポイント
async fn adjust(
    State(state): State<AppState>,
    Path((tenant_id, item_id, store_id)): Path<(Uuid, Uuid, Uuid)>,
    Json(request): Json<AdjustRequest>,
) -> ApiResult<Json<LedgerEntryResponse>> {
    let entry = state
        .inventory_service
        .adjust(
            TenantId::from_uuid(tenant_id),
            ItemId::from_uuid(item_id),
            StoreId::from_uuid(store_id),
            request.delta,
            request.note,
        )
        .await
        .map_err(map_application_error)?;

    Ok(Json(LedgerEntryResponse::from_entry(&entry)))
}

// 引当エンドポイント
async fn reserve(
    State(state): State<AppState>,
    Path((tenant_id, item_id, store_id)): Path<(Uuid, Uuid, Uuid)>,
    Json(request): Json<QuantityRequest>,
) -> ApiResult<Json<StockResponse>> {
    let stock = state
        .inventory_service
        .reserve(
            TenantId::from_uuid(tenant_id),
            ItemId::from_uuid(item_id),
            StoreId::from_uuid(store_id),
            request.qty,
        )
        .await
        .map_err(map_application_error)?;

    Ok(Json(StockResponse::from_stock(&stock)))
}

// 引当解放エンドポイント
async fn release_reservation(
    State(state): State<AppState>,
    Path((tenant_id, item_id, store_id)): Path<(Uuid, Uuid, Uuid)>,
    Json(request): Json<QuantityRequest>,
) -> ApiResult<Json<StockResponse>> {
    let stock = state
        .inventory_service
        .release_reservation(
            TenantId::from_uuid(tenant_id),
            ItemId::from_uuid(item_id),
            StoreId::from_uuid(store_id),
            request.qty,
        )
        .await
        .map_err(map_application_error)?;

    Ok(Json(StockResponse::from_stock(&stock)))
}

// 元帳との照合エンドポイント
async fn reconcile(
    State(state): State<AppState>,
    Path((tenant_id, item_id, store_id)): Path<(Uuid, Uuid, Uuid)>,
) -> ApiResult<Json<ReconciliationReport>> {
    let report = state
        .inventory_service
        .reconcile(
            TenantId::from_uuid(tenant_id),
            ItemId::from_uuid(item_id),
            StoreId::from_uuid(store_id),
        )
        .await
        .map_err(map_application_error)?;

    Ok(Json(report))
}

// 調達依頼一覧取得エンドポイント
async fn get_procurement_requests(
    State(state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
    query: Result<Query<ProcurementQueryParams>, axum::extract::rejection::QueryRejection>,
) -> ApiResult<Json<Vec<ProcurementResponse>>> {
    let Query(params) = query.map_err(|_| {
        bad_request("無効なクエリパラメータです".to_string(), "INVALID_PARAMETER")
    })?;
    let status = match params.status {
        Some(status_str) => Some(ProcurementStatus::from_string(&status_str).map_err(|_| {
            bad_request(format!("無効なステータス値: {}", status_str), "INVALID_STATUS")
        })?),
        None => None,
    };

    let requests = state
        .inventory_query_service
        .list_procurement_requests(TenantId::from_uuid(tenant_id), status)
        .await
        .map_err(map_application_error)?;

    Ok(Json(requests.iter().map(ProcurementResponse::from_request).collect()))
}

// 調達依頼詳細取得エンドポイント
async fn get_procurement_request(
    State(state): State<AppState>,
    Path((tenant_id, procurement_id)): Path<(Uuid, i64)>,
) -> ApiResult<Json<ProcurementResponse>> {
    let request = state
        .inventory_query_service
        .get_procurement_request(
            TenantId::from_uuid(tenant_id),
            ProcurementId::new(procurement_id),
        )
        .await
        .map_err(map_application_error)?;

    Ok(Json(ProcurementResponse::from_request(&request)))
}

fn origin_ref(
    reference: Option<String>,
    due_date: Option<chrono::NaiveDate>,
) -> ApiResult<Option<OriginRef>> {
    reference
        .map(|r| OriginRef::new(r, due_date))
        .transpose()
        .map_err(map_domain_error)
}

fn bad_request(message: String, code: &str) -> (StatusCode, Json<ApiError>) {
    (
        StatusCode::BAD_REQUEST,
        Json(ApiError {
            error: message,
            code: code.to_string(),
            shortage: None,
        }),
    )
}

// アプリケーションエラーをHTTPエラーにマッピング
fn map_application_error(err: ApplicationError) -> (StatusCode, Json<ApiError>) {
    let retryable = err.is_retryable();
    match err {
        ApplicationError::InsufficientStock {
            item_code,
            required,
            on_hand,
        } => (
            StatusCode::CONFLICT,
            Json(ApiError {
                error: format!("在庫が不足しています: {}", item_code),
                code: "INSUFFICIENT_STOCK".to_string(),
                shortage: Some(ShortageDetail {
                    item_code,
                    required,
                    on_hand,
                }),
            }),
        ),
        ApplicationError::NotFound(msg) => (
            StatusCode::NOT_FOUND,
            Json(ApiError {
                error: msg,
                code: "NOT_FOUND".to_string(),
                shortage: None,
            }),
        ),
        ApplicationError::BusinessRule(msg) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ApiError {
                error: msg,
                code: "BUSINESS_RULE_VIOLATION".to_string(),
                shortage: None,
            }),
        ),
        ApplicationError::TenantInactive(tenant_id) => (
            StatusCode::FORBIDDEN,
            Json(ApiError {
                error: format!("テナントの契約が無効です: {}", tenant_id),
                code: "TENANT_INACTIVE".to_string(),
                shortage: None,
            }),
        ),
        ApplicationError::Domain(domain_err) => map_domain_error(domain_err),
        ApplicationError::Repository(repo_err) if retryable => {
            error!(error = %repo_err, "Transient repository failure");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiError {
                    error: format!("{}", repo_err),
                    code: "RETRYABLE".to_string(),
                    shortage: None,
                }),
            )
        }
        ApplicationError::Repository(repo_err) => {
            error!(error = %repo_err, "Repository failure");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiError {
                    error: format!("{}", repo_err),
                    code: "REPOSITORY_ERROR".to_string(),
                    shortage: None,
                }),
            )
        }
    }
}

// ドメインエラーを適切なHTTPステータスコードとエラーコードにマッピング
fn map_domain_error(domain_err: DomainError) -> (StatusCode, Json<ApiError>) {
    match domain_err {
        DomainError::InsufficientInventory => (
            StatusCode::CONFLICT,
            Json(ApiError {
                error: "在庫が不足しています".to_string(),
                code: "INSUFFICIENT_INVENTORY".to_string(),
                shortage: None,
            }),
        ),
        DomainError::InvalidQuantity(msg) => bad_request(msg, "INVALID_QUANTITY"),
        DomainError::InvalidValue(msg) => bad_request(msg, "INVALID_VALUE"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::port::RepositoryError;
    use rust_decimal_macros::dec;

    #[test]
    fn test_insufficient_stock_maps_to_conflict() {
        let (status, Json(body)) = map_application_error(ApplicationError::InsufficientStock {
            item_code: "X".to_string(),
            required: dec!(5),
            on_hand: dec!(3),
        });

        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body.code, "INSUFFICIENT_STOCK");
        let shortage = body.shortage.unwrap();
        assert_eq!(shortage.required, dec!(5));
        assert_eq!(shortage.on_hand, dec!(3));
    }

    #[test]
    fn test_error_status_codes() {
        let cases = vec![
            (ApplicationError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (
                ApplicationError::BusinessRule("x".into()),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                ApplicationError::TenantInactive(TenantId::new()),
                StatusCode::FORBIDDEN,
            ),
            (
                ApplicationError::Domain(DomainError::InvalidQuantity("x".into())),
                StatusCode::BAD_REQUEST,
            ),
            (
                ApplicationError::Repository(RepositoryError::Transient("x".into())),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                ApplicationError::Repository(RepositoryError::OperationFailed("x".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            let (status, _) = map_application_error(err);
            assert_eq!(status, expected);
        }
    }
}
