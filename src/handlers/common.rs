use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::IntoParams;

use crate::entities::purchase::OrderStatus;
use crate::entities::reservation::ReservationStatus;
use crate::errors::ServiceError;
use crate::ApiResponse;

/// Standard success response
pub fn success_response<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(ApiResponse::success(data))).into_response()
}

/// Success response carrying a human-readable notice
pub fn success_with_message<T: Serialize>(data: T, message: impl Into<String>) -> Response {
    let mut body = ApiResponse::success(data);
    body.message = Some(message.into());
    (StatusCode::OK, Json(body)).into_response()
}

/// Standard created response
pub fn created_response<T: Serialize>(data: T) -> Response {
    (StatusCode::CREATED, Json(ApiResponse::success(data))).into_response()
}

/// Standard no content response
pub fn no_content_response() -> Response {
    StatusCode::NO_CONTENT.into_response()
}

/// Optional `?status=` filter on admin list endpoints
#[derive(Debug, Default, Deserialize, Serialize, IntoParams)]
pub struct StatusFilter {
    pub status: Option<String>,
}

pub fn parse_order_status(value: &str) -> Result<OrderStatus, ServiceError> {
    match value.trim() {
        "Diproses" => Ok(OrderStatus::Diproses),
        "Selesai" => Ok(OrderStatus::Selesai),
        "Dibatalkan" => Ok(OrderStatus::Dibatalkan),
        other => Err(ServiceError::field(
            "status",
            format!("Status pesanan tidak dikenal: {other}"),
        )),
    }
}

pub fn parse_reservation_status(value: &str) -> Result<ReservationStatus, ServiceError> {
    match value.trim() {
        "Menunggu" => Ok(ReservationStatus::Menunggu),
        "Dalam Proses" => Ok(ReservationStatus::DalamProses),
        "Selesai" => Ok(ReservationStatus::Selesai),
        "Batal" => Ok(ReservationStatus::Batal),
        other => Err(ServiceError::field(
            "status",
            format!("Status reservasi tidak dikenal: {other}"),
        )),
    }
}
