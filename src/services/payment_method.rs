use chrono::Utc;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::entities::purchase::{Model as PurchaseModel, PaymentMethod};
use crate::errors::ServiceError;
use crate::repositories::PurchaseStore;
use crate::services::settings::SettingsService;

/// Changes the payment method of an unpaid purchase
pub struct PaymentMethodService {
    store: Arc<dyn PurchaseStore>,
    settings: Arc<SettingsService>,
}

impl PaymentMethodService {
    pub fn new(store: Arc<dyn PurchaseStore>, settings: Arc<SettingsService>) -> Self {
        Self { store, settings }
    }

    #[instrument(skip(self, user), fields(user_id = %user.user_id))]
    pub async fn change_method(
        &self,
        purchase_id: Uuid,
        user: &AuthUser,
        method: PaymentMethod,
    ) -> Result<PurchaseModel, ServiceError> {
        let mut purchase = self
            .store
            .find_by_id(purchase_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Pesanan {purchase_id} tidak ditemukan")))?;
        if !purchase.is_owned_by(user.user_id) {
            return Err(ServiceError::Forbidden(
                "Pesanan milik pengguna lain".to_string(),
            ));
        }

        if purchase.payment_method_locked() {
            return Err(ServiceError::InvalidOperation(
                "Metode pembayaran tidak dapat diubah setelah bukti diunggah atau pesanan selesai"
                    .to_string(),
            ));
        }

        if !self.settings.available_methods().await.contains(&method) {
            return Err(ServiceError::field(
                "payment_method",
                "Metode pembayaran tidak tersedia",
            ));
        }

        if purchase.payment_method == method {
            return Ok(purchase);
        }

        let rows = self
            .store
            .update_payment_method_if_unlocked(purchase_id, method)
            .await?;
        if rows == 0 {
            warn!(%purchase_id, "payment method update lost to a concurrent change");
            return Err(ServiceError::Conflict(
                "Pesanan sudah berubah, muat ulang halaman pembayaran".to_string(),
            ));
        }

        info!(%purchase_id, from = %purchase.payment_method, to = %method, "payment method changed");
        purchase.payment_method = method;
        purchase.payment_proof_id = None;
        purchase.updated_at = Utc::now();
        Ok(purchase)
    }
}
