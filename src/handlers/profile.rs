use axum::{
    extract::{Extension, Json, State},
    response::IntoResponse,
    routing::get,
    Router,
};

use crate::auth::{AuthRouterExt, AuthUser};
use crate::handlers::common::success_response;
use crate::services::profiles::{ProfileView, UpsertProfileRequest};
use crate::{errors::ServiceError, AppState};

pub fn profile_routes() -> Router<AppState> {
    Router::new()
        .route("/profile", get(get_profile).put(upsert_profile))
        .with_auth()
}

#[utoipa::path(
    get,
    path = "/api/v1/me/profile",
    responses(
        (status = 200, description = "Profile fetched", body = crate::ApiResponse<ProfileView>),
        (status = 404, description = "Profile not created yet", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "profile"
)]
pub async fn get_profile(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, ServiceError> {
    let profile = state.services.profiles.get(&user).await?;
    Ok(success_response(ProfileView::from(profile)))
}

#[utoipa::path(
    put,
    path = "/api/v1/me/profile",
    request_body = UpsertProfileRequest,
    responses(
        (status = 200, description = "Profile saved", body = crate::ApiResponse<ProfileView>),
        (status = 422, description = "Invalid field", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "profile"
)]
pub async fn upsert_profile(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<UpsertProfileRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let profile = state.services.profiles.upsert(&user, payload).await?;
    Ok(success_response(ProfileView::from(profile)))
}
