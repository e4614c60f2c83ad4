use axum::{
    extract::{Extension, Json, Multipart, Path, State},
    response::IntoResponse,
    routing::{get, post, put},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::{AuthRouterExt, AuthUser};
use crate::entities::payment_proof::{Model as ProofModel, VerificationStatus};
use crate::entities::purchase::{
    Model as PurchaseModel, OrderLine, OrderStatus, PaymentMethod, PaymentStatus,
};
use crate::handlers::common::{created_response, success_response};
use crate::services::payment_proof::ProofUpload;
use crate::{errors::ServiceError, AppState};

pub fn purchases_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_my_purchases))
        .route("/:id", get(get_purchase))
        .route("/:id/payment-method", put(change_payment_method))
        .route("/:id/proof", post(upload_proof).get(list_proofs))
        .with_auth()
}

/// Purchase as returned to clients
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PurchaseView {
    pub id: Uuid,
    pub user_id: Uuid,
    pub customer_name: String,
    pub phone: String,
    pub address: Option<String>,
    pub items: Vec<OrderLine>,
    pub total_amount: i64,
    pub payment_method: PaymentMethod,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_deadline: DateTime<Utc>,
    pub payment_proof_id: Option<Uuid>,
    /// False once a proof is linked or the order is finished
    pub payment_method_editable: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<PurchaseModel> for PurchaseView {
    fn from(p: PurchaseModel) -> Self {
        Self {
            payment_method_editable: !p.payment_method_locked(),
            id: p.id,
            user_id: p.user_id,
            customer_name: p.customer_name,
            phone: p.phone,
            address: p.address,
            items: p.items.0,
            total_amount: p.total_amount,
            payment_method: p.payment_method,
            status: p.status,
            payment_status: p.payment_status,
            payment_deadline: p.payment_deadline,
            payment_proof_id: p.payment_proof_id,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProofView {
    pub id: Uuid,
    pub purchase_id: Uuid,
    pub image_url: String,
    pub verification_status: VerificationStatus,
    pub uploaded_at: DateTime<Utc>,
    pub verified_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

impl From<ProofModel> for ProofView {
    fn from(p: ProofModel) -> Self {
        Self {
            id: p.id,
            purchase_id: p.purchase_id,
            image_url: p.image_url,
            verification_status: p.verification_status,
            uploaded_at: p.uploaded_at,
            verified_at: p.verified_at,
            notes: p.notes,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct ChangePaymentMethodRequest {
    pub payment_method: String,
}

/// Multipart body of a proof upload
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct ProofUploadForm {
    #[schema(value_type = String, format = Binary)]
    file: Vec<u8>,
}

/// The caller's purchases, newest first
#[utoipa::path(
    get,
    path = "/api/v1/purchases",
    responses((status = 200, description = "Purchases listed", body = crate::ApiResponse<Vec<PurchaseView>>)),
    security(("bearer_auth" = [])),
    tag = "purchases"
)]
pub async fn list_my_purchases(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, ServiceError> {
    let purchases = state.services.purchases.list_for_user(&user).await?;
    Ok(success_response(
        purchases
            .into_iter()
            .map(PurchaseView::from)
            .collect::<Vec<_>>(),
    ))
}

/// Load an existing purchase (returning to its payment page)
#[utoipa::path(
    get,
    path = "/api/v1/purchases/{id}",
    params(("id" = Uuid, Path, description = "Purchase id")),
    responses(
        (status = 200, description = "Purchase fetched", body = crate::ApiResponse<PurchaseView>),
        (status = 403, description = "Not the owner", body = crate::errors::ErrorResponse),
        (status = 404, description = "Purchase not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "purchases"
)]
pub async fn get_purchase(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let purchase = state.services.purchases.load_existing(id, &user).await?;
    Ok(success_response(PurchaseView::from(purchase)))
}

/// Change the payment method while the purchase is unpaid
#[utoipa::path(
    put,
    path = "/api/v1/purchases/{id}/payment-method",
    params(("id" = Uuid, Path, description = "Purchase id")),
    request_body = ChangePaymentMethodRequest,
    responses(
        (status = 200, description = "Method changed", body = crate::ApiResponse<PurchaseView>),
        (status = 400, description = "Purchase is locked", body = crate::errors::ErrorResponse),
        (status = 409, description = "Purchase changed concurrently", body = crate::errors::ErrorResponse),
        (status = 422, description = "Method unavailable", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "purchases"
)]
pub async fn change_payment_method(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ChangePaymentMethodRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let method = PaymentMethod::parse(&payload.payment_method).ok_or_else(|| {
        ServiceError::field("payment_method", "Metode pembayaran tidak dikenal")
    })?;
    let purchase = state
        .services
        .payment_method
        .change_method(id, &user, method)
        .await?;
    Ok(success_response(PurchaseView::from(purchase)))
}

/// Upload a payment proof image (multipart field `file`)
#[utoipa::path(
    post,
    path = "/api/v1/purchases/{id}/proof",
    params(("id" = Uuid, Path, description = "Purchase id")),
    request_body(content = ProofUploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Proof uploaded", body = crate::ApiResponse<ProofView>),
        (status = 400, description = "Payment already submitted", body = crate::errors::ErrorResponse),
        (status = 409, description = "Another proof was attached concurrently", body = crate::errors::ErrorResponse),
        (status = 422, description = "Invalid file", body = crate::errors::ErrorResponse),
        (status = 502, description = "Storage failure", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "purchases"
)]
pub async fn upload_proof(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ServiceError> {
    let upload = read_proof_field(multipart).await?;
    let proof = state.services.payment_proof.upload(id, &user, upload).await?;
    Ok(created_response(ProofView::from(proof)))
}

/// Proofs submitted for a purchase
#[utoipa::path(
    get,
    path = "/api/v1/purchases/{id}/proof",
    params(("id" = Uuid, Path, description = "Purchase id")),
    responses((status = 200, description = "Proofs listed", body = crate::ApiResponse<Vec<ProofView>>)),
    security(("bearer_auth" = [])),
    tag = "purchases"
)]
pub async fn list_proofs(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let proofs = state
        .services
        .payment_proof
        .list_for_purchase(id, &user)
        .await?;
    Ok(success_response(
        proofs.into_iter().map(ProofView::from).collect::<Vec<_>>(),
    ))
}

async fn read_proof_field(mut multipart: Multipart) -> Result<ProofUpload, ServiceError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServiceError::ValidationError(format!("Form upload tidak valid: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or("bukti").to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ServiceError::field("file", format!("Gagal membaca file: {e}")))?;
        return Ok(ProofUpload {
            file_name,
            content_type,
            bytes,
        });
    }
    Err(ServiceError::field("file", "File bukti pembayaran wajib diisi"))
}
