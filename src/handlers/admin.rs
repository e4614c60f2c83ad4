//! Back-office endpoints; every route requires the `admin` role.

use axum::{
    extract::{Extension, Json, Path, Query, State},
    response::IntoResponse,
    routing::{get, post, put},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::{AuthRouterExt, AuthUser, ADMIN_ROLE};
use crate::entities::app_setting::Model as AppSettingModel;
use crate::handlers::common::{
    created_response, no_content_response, parse_order_status, parse_reservation_status,
    success_response, StatusFilter,
};
use crate::handlers::purchases::{ProofView, PurchaseView};
use crate::services::dashboard::DashboardSummary;
use crate::services::menu::{CategoryInput, CategoryView, MenuItemInput, MenuItemView};
use crate::services::reservations::ReservationView;
use crate::{errors::ServiceError, AppState};

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(dashboard))
        .route("/purchases", get(list_purchases))
        .route("/purchases/:id", axum::routing::delete(delete_purchase))
        .route("/purchases/:id/status", put(set_purchase_status))
        .route("/proofs/:id/verify", post(verify_proof))
        .route("/reservations", get(list_reservations))
        .route(
            "/reservations/:id",
            axum::routing::delete(delete_reservation),
        )
        .route("/reservations/:id/status", put(set_reservation_status))
        .route("/categories", post(create_category))
        .route("/categories/:id", put(update_category).delete(delete_category))
        .route("/menu-items", get(list_menu_items).post(create_menu_item))
        .route("/menu-items/:id", put(update_menu_item).delete(delete_menu_item))
        .route("/settings", get(list_settings))
        .route("/settings/:key", put(upsert_setting))
        .with_role(ADMIN_ROLE)
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct StatusUpdateRequest {
    pub status: String,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct VerifyProofRequest {
    pub approved: bool,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct UpsertSettingRequest {
    pub value: Value,
    pub category: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SettingView {
    pub key: String,
    pub value: Value,
    pub category: String,
    pub description: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl From<AppSettingModel> for SettingView {
    fn from(s: AppSettingModel) -> Self {
        Self {
            key: s.key,
            value: s.value,
            category: s.category,
            description: s.description,
            updated_at: s.updated_at,
        }
    }
}

/// Notification counts for the back office
#[utoipa::path(
    get,
    path = "/api/v1/admin/dashboard",
    responses(
        (status = 200, description = "Dashboard counts", body = crate::ApiResponse<DashboardSummary>),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn dashboard(State(state): State<AppState>) -> Result<impl IntoResponse, ServiceError> {
    Ok(success_response(state.services.dashboard.summary().await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/purchases",
    params(StatusFilter),
    responses((status = 200, description = "Purchases listed", body = crate::ApiResponse<Vec<PurchaseView>>)),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn list_purchases(
    State(state): State<AppState>,
    Query(filter): Query<StatusFilter>,
) -> Result<impl IntoResponse, ServiceError> {
    let status = filter.status.as_deref().map(parse_order_status).transpose()?;
    let purchases = state.services.status.list_purchases(status).await?;
    Ok(success_response(
        purchases
            .into_iter()
            .map(PurchaseView::from)
            .collect::<Vec<_>>(),
    ))
}

/// Set any purchase status; last write wins
#[utoipa::path(
    put,
    path = "/api/v1/admin/purchases/{id}/status",
    params(("id" = Uuid, Path, description = "Purchase id")),
    request_body = StatusUpdateRequest,
    responses(
        (status = 200, description = "Status set", body = crate::ApiResponse<PurchaseView>),
        (status = 404, description = "Purchase not found", body = crate::errors::ErrorResponse),
        (status = 422, description = "Unknown status", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn set_purchase_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<StatusUpdateRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let status = parse_order_status(&payload.status)?;
    let purchase = state.services.status.set_purchase_status(id, status).await?;
    Ok(success_response(PurchaseView::from(purchase)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/admin/purchases/{id}",
    params(("id" = Uuid, Path, description = "Purchase id")),
    responses(
        (status = 204, description = "Purchase deleted"),
        (status = 404, description = "Purchase not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn delete_purchase(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    state.services.status.delete_purchase(id).await?;
    Ok(no_content_response())
}

/// Approve or reject a payment proof
#[utoipa::path(
    post,
    path = "/api/v1/admin/proofs/{id}/verify",
    params(("id" = Uuid, Path, description = "Payment proof id")),
    request_body = VerifyProofRequest,
    responses(
        (status = 200, description = "Proof reviewed", body = crate::ApiResponse<ProofView>),
        (status = 400, description = "Proof already reviewed", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn verify_proof(
    State(state): State<AppState>,
    Extension(reviewer): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<VerifyProofRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let proof = state
        .services
        .payment_proof
        .verify(id, reviewer.user_id, payload.approved, payload.notes)
        .await?;
    Ok(success_response(ProofView::from(proof)))
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/reservations",
    params(StatusFilter),
    responses((status = 200, description = "Reservations listed", body = crate::ApiResponse<Vec<ReservationView>>)),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn list_reservations(
    State(state): State<AppState>,
    Query(filter): Query<StatusFilter>,
) -> Result<impl IntoResponse, ServiceError> {
    let status = filter
        .status
        .as_deref()
        .map(parse_reservation_status)
        .transpose()?;
    let reservations = state.services.reservations.list(status).await?;
    Ok(success_response(
        reservations
            .into_iter()
            .map(ReservationView::from)
            .collect::<Vec<_>>(),
    ))
}

#[utoipa::path(
    put,
    path = "/api/v1/admin/reservations/{id}/status",
    params(("id" = Uuid, Path, description = "Reservation id")),
    request_body = StatusUpdateRequest,
    responses(
        (status = 200, description = "Status set", body = crate::ApiResponse<ReservationView>),
        (status = 404, description = "Reservation not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn set_reservation_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<StatusUpdateRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let status = parse_reservation_status(&payload.status)?;
    let reservation = state
        .services
        .status
        .set_reservation_status(id, status)
        .await?;
    Ok(success_response(ReservationView::from(reservation)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/admin/reservations/{id}",
    params(("id" = Uuid, Path, description = "Reservation id")),
    responses((status = 204, description = "Reservation deleted")),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn delete_reservation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    state.services.reservations.delete(id).await?;
    Ok(no_content_response())
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/categories",
    request_body = CategoryInput,
    responses((status = 201, description = "Category created", body = crate::ApiResponse<CategoryView>)),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn create_category(
    State(state): State<AppState>,
    Json(payload): Json<CategoryInput>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(created_response(
        state.services.menu.create_category(payload).await?,
    ))
}

#[utoipa::path(
    put,
    path = "/api/v1/admin/categories/{id}",
    params(("id" = Uuid, Path, description = "Category id")),
    request_body = CategoryInput,
    responses((status = 200, description = "Category updated", body = crate::ApiResponse<CategoryView>)),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn update_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CategoryInput>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(success_response(
        state.services.menu.update_category(id, payload).await?,
    ))
}

#[utoipa::path(
    delete,
    path = "/api/v1/admin/categories/{id}",
    params(("id" = Uuid, Path, description = "Category id")),
    responses((status = 204, description = "Category deleted")),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn delete_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    state.services.menu.delete_category(id).await?;
    Ok(no_content_response())
}

/// All menu items, including unavailable ones
#[utoipa::path(
    get,
    path = "/api/v1/admin/menu-items",
    responses((status = 200, description = "Menu items listed", body = crate::ApiResponse<Vec<MenuItemView>>)),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn list_menu_items(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(success_response(state.services.menu.list_items().await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/menu-items",
    request_body = MenuItemInput,
    responses(
        (status = 201, description = "Menu item created", body = crate::ApiResponse<MenuItemView>),
        (status = 422, description = "Invalid field", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn create_menu_item(
    State(state): State<AppState>,
    Json(payload): Json<MenuItemInput>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(created_response(state.services.menu.create_item(payload).await?))
}

#[utoipa::path(
    put,
    path = "/api/v1/admin/menu-items/{id}",
    params(("id" = Uuid, Path, description = "Menu item id")),
    request_body = MenuItemInput,
    responses((status = 200, description = "Menu item updated", body = crate::ApiResponse<MenuItemView>)),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn update_menu_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<MenuItemInput>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(success_response(
        state.services.menu.update_item(id, payload).await?,
    ))
}

#[utoipa::path(
    delete,
    path = "/api/v1/admin/menu-items/{id}",
    params(("id" = Uuid, Path, description = "Menu item id")),
    responses((status = 204, description = "Menu item deleted")),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn delete_menu_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    state.services.menu.delete_item(id).await?;
    Ok(no_content_response())
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/settings",
    responses((status = 200, description = "Settings listed", body = crate::ApiResponse<Vec<SettingView>>)),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn list_settings(State(state): State<AppState>) -> Result<impl IntoResponse, ServiceError> {
    let settings = state.services.settings.list_all().await?;
    Ok(success_response(
        settings
            .into_iter()
            .map(SettingView::from)
            .collect::<Vec<_>>(),
    ))
}

/// Create or replace a setting; payment keys are checked against their schema
#[utoipa::path(
    put,
    path = "/api/v1/admin/settings/{key}",
    params(("key" = String, Path, description = "Setting key, e.g. payment.qris")),
    request_body = UpsertSettingRequest,
    responses(
        (status = 200, description = "Setting saved", body = crate::ApiResponse<SettingView>),
        (status = 422, description = "Malformed value", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn upsert_setting(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(payload): Json<UpsertSettingRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let saved = state
        .services
        .settings
        .upsert(&key, payload.value, payload.category, payload.description)
        .await?;
    Ok(success_response(SettingView::from(saved)))
}
