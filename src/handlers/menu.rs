use axum::{extract::State, response::IntoResponse, routing::get, Router};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

use crate::entities::purchase::PaymentMethod;
use crate::handlers::common::success_response;
use crate::services::menu::{CategoryView, MenuSection};
use crate::services::settings::PaymentSettings;
use crate::{errors::ServiceError, AppState};

/// Public catalogue and storefront settings; no authentication
pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/menu", get(get_menu))
        .route("/categories", get(list_categories))
        .route("/payment-methods", get(payment_methods))
        .route("/site-content", get(site_content))
}

/// Methods offered at checkout, with the details shown on the payment page
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaymentMethodsResponse {
    pub available: Vec<PaymentMethod>,
    pub details: PaymentSettings,
}

#[utoipa::path(
    get,
    path = "/api/v1/menu",
    responses((status = 200, description = "Available menu grouped by category", body = crate::ApiResponse<Vec<MenuSection>>)),
    tag = "menu"
)]
pub async fn get_menu(State(state): State<AppState>) -> Result<impl IntoResponse, ServiceError> {
    Ok(success_response(state.services.menu.public_menu().await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/categories",
    responses((status = 200, description = "Categories listed", body = crate::ApiResponse<Vec<CategoryView>>)),
    tag = "menu"
)]
pub async fn list_categories(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(success_response(state.services.menu.list_categories().await?))
}

/// Never fails: a settings outage yields the last known or an empty set.
#[utoipa::path(
    get,
    path = "/api/v1/payment-methods",
    responses((status = 200, description = "Payment methods", body = crate::ApiResponse<PaymentMethodsResponse>)),
    tag = "settings"
)]
pub async fn payment_methods(State(state): State<AppState>) -> impl IntoResponse {
    let details = state.services.settings.payment_settings().await;
    success_response(PaymentMethodsResponse {
        available: details.available_methods(),
        details,
    })
}

#[utoipa::path(
    get,
    path = "/api/v1/site-content",
    responses((status = 200, description = "Public site settings", body = crate::ApiResponse<serde_json::Value>)),
    tag = "settings"
)]
pub async fn site_content(State(state): State<AppState>) -> Result<impl IntoResponse, ServiceError> {
    let content: Map<String, Value> = state.services.settings.site_content().await?;
    Ok(success_response(content))
}
