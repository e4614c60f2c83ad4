use axum::{
    extract::{Json, Path, State},
    response::IntoResponse,
    routing::{get, post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::handlers::common::{no_content_response, success_response, success_with_message};
use crate::{errors::ServiceError, services::cart::CartSummary, AppState};

/// Creates the router for cart endpoints
pub fn carts_routes() -> Router<AppState> {
    Router::new()
        .route("/:session", get(get_cart).delete(clear_cart))
        .route("/:session/items", post(add_to_cart))
        .route(
            "/:session/items/:item_id",
            put(update_cart_item).delete(remove_cart_item),
        )
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct AddItemRequest {
    pub menu_item_id: Uuid,
}

#[derive(Debug, Deserialize, Serialize, Validate, ToSchema)]
pub struct UpdateQuantityRequest {
    /// Zero removes the item
    #[validate(range(max = 999, message = "Jumlah per item maksimal 999"))]
    #[schema(maximum = 999)]
    pub quantity: u32,
}

/// Cart contents and totals
#[utoipa::path(
    get,
    path = "/api/v1/carts/{session}",
    params(("session" = String, Path, description = "Client-chosen cart session id")),
    responses(
        (status = 200, description = "Cart fetched", body = crate::ApiResponse<CartSummary>),
        (status = 400, description = "Invalid session id", body = crate::errors::ErrorResponse)
    ),
    tag = "carts"
)]
pub async fn get_cart(
    State(state): State<AppState>,
    Path(session): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(success_response(state.services.cart.summary(&session)?))
}

/// Add one unit of a menu item
#[utoipa::path(
    post,
    path = "/api/v1/carts/{session}/items",
    params(("session" = String, Path, description = "Client-chosen cart session id")),
    request_body = AddItemRequest,
    responses(
        (status = 200, description = "Item added", body = crate::ApiResponse<CartSummary>),
        (status = 400, description = "Item unavailable", body = crate::errors::ErrorResponse),
        (status = 404, description = "Menu item not found", body = crate::errors::ErrorResponse)
    ),
    tag = "carts"
)]
pub async fn add_to_cart(
    State(state): State<AppState>,
    Path(session): Path<String>,
    Json(payload): Json<AddItemRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let (summary, _change, message) = state
        .services
        .cart
        .add_item(&session, payload.menu_item_id)
        .await?;
    Ok(success_with_message(summary, message))
}

/// Set the quantity of a cart line
#[utoipa::path(
    put,
    path = "/api/v1/carts/{session}/items/{item_id}",
    params(
        ("session" = String, Path, description = "Client-chosen cart session id"),
        ("item_id" = Uuid, Path, description = "Menu item id")
    ),
    request_body = UpdateQuantityRequest,
    responses(
        (status = 200, description = "Quantity updated", body = crate::ApiResponse<CartSummary>),
        (status = 404, description = "Item not in cart", body = crate::errors::ErrorResponse),
        (status = 422, description = "Quantity out of range", body = crate::errors::ErrorResponse)
    ),
    tag = "carts"
)]
pub async fn update_cart_item(
    State(state): State<AppState>,
    Path((session, item_id)): Path<(String, Uuid)>,
    Json(payload): Json<UpdateQuantityRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    payload.validate()?;
    let summary = state
        .services
        .cart
        .set_quantity(&session, item_id, payload.quantity)?;
    Ok(success_response(summary))
}

/// Remove a cart line
#[utoipa::path(
    delete,
    path = "/api/v1/carts/{session}/items/{item_id}",
    params(
        ("session" = String, Path, description = "Client-chosen cart session id"),
        ("item_id" = Uuid, Path, description = "Menu item id")
    ),
    responses(
        (status = 200, description = "Item removed", body = crate::ApiResponse<CartSummary>),
        (status = 404, description = "Item not in cart", body = crate::errors::ErrorResponse)
    ),
    tag = "carts"
)]
pub async fn remove_cart_item(
    State(state): State<AppState>,
    Path((session, item_id)): Path<(String, Uuid)>,
) -> Result<impl IntoResponse, ServiceError> {
    let summary = state.services.cart.remove_item(&session, item_id)?;
    Ok(success_response(summary))
}

/// Empty the cart
#[utoipa::path(
    delete,
    path = "/api/v1/carts/{session}",
    params(("session" = String, Path, description = "Client-chosen cart session id")),
    responses((status = 204, description = "Cart cleared")),
    tag = "carts"
)]
pub async fn clear_cart(
    State(state): State<AppState>,
    Path(session): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    state.services.cart.clear(&session)?;
    Ok(no_content_response())
}
