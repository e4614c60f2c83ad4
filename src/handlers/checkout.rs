use axum::{
    extract::{Extension, Json, Path, State},
    response::IntoResponse,
    routing::post,
    Router,
};
use uuid::Uuid;

use crate::auth::{AuthRouterExt, AuthUser};
use crate::handlers::common::{created_response, success_response};
use crate::handlers::purchases::PurchaseView;
use crate::services::checkout::{CheckoutRequest, CheckoutTicket};
use crate::{errors::ServiceError, AppState};

pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(checkout))
        .route("/:attempt_id/purchase", post(ensure_purchase))
        .with_auth()
}

/// Validate contact details and payment method, snapshot the cart
#[utoipa::path(
    post,
    path = "/api/v1/checkout",
    request_body = CheckoutRequest,
    responses(
        (status = 201, description = "Checkout staged", body = crate::ApiResponse<CheckoutTicket>),
        (status = 400, description = "Cart is empty", body = crate::errors::ErrorResponse),
        (status = 422, description = "Invalid field", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "checkout"
)]
pub async fn checkout(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CheckoutRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let ticket = state.services.checkout.checkout(payload, &user).await?;
    Ok(created_response(ticket))
}

/// Create the purchase for a checkout attempt, or return the one already created
#[utoipa::path(
    post,
    path = "/api/v1/checkout/{attempt_id}/purchase",
    params(("attempt_id" = Uuid, Path, description = "Checkout attempt id from the ticket")),
    responses(
        (status = 200, description = "Purchase ready", body = crate::ApiResponse<PurchaseView>),
        (status = 409, description = "Creation already in flight", body = crate::errors::ErrorResponse),
        (status = 502, description = "Creation failed; retry from checkout", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "checkout"
)]
pub async fn ensure_purchase(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(attempt_id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let purchase = state
        .services
        .purchases
        .ensure_purchase(attempt_id, &user)
        .await?;
    Ok(success_response(PurchaseView::from(purchase)))
}
