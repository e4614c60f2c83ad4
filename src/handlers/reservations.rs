use axum::{
    extract::{Extension, Json, State},
    response::IntoResponse,
    routing::post,
    Router,
};

use crate::auth::{AuthRouterExt, AuthUser};
use crate::handlers::common::{created_response, success_response};
use crate::services::reservations::{CreateReservationRequest, ReservationView};
use crate::{errors::ServiceError, AppState};

pub fn reservations_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_reservation).get(list_my_reservations))
        .with_auth()
}

/// Reserve a table
#[utoipa::path(
    post,
    path = "/api/v1/reservations",
    request_body = CreateReservationRequest,
    responses(
        (status = 201, description = "Reservation created", body = crate::ApiResponse<ReservationView>),
        (status = 422, description = "Invalid field", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "reservations"
)]
pub async fn create_reservation(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CreateReservationRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let reservation = state.services.reservations.create(payload, &user).await?;
    Ok(created_response(ReservationView::from(reservation)))
}

/// The caller's reservations
#[utoipa::path(
    get,
    path = "/api/v1/reservations",
    responses((status = 200, description = "Reservations listed", body = crate::ApiResponse<Vec<ReservationView>>)),
    security(("bearer_auth" = [])),
    tag = "reservations"
)]
pub async fn list_my_reservations(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, ServiceError> {
    let reservations = state.services.reservations.list_for_user(&user).await?;
    Ok(success_response(
        reservations
            .into_iter()
            .map(ReservationView::from)
            .collect::<Vec<_>>(),
    ))
}
