use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::auth::AuthUser;
use crate::entities::purchase::{OrderItems, PaymentMethod};
use crate::errors::ServiceError;
use crate::services::cart::CartRegistry;
use crate::services::purchase_creator::{OrderDraft, PurchaseCreator};
use crate::services::settings::SettingsService;

fn validate_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().chars().count() >= 2 {
        Ok(())
    } else {
        let mut err = ValidationError::new("length");
        err.message = Some("Nama minimal 2 karakter".into());
        Err(err)
    }
}

fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    if phone.trim().chars().count() >= 10 {
        Ok(())
    } else {
        let mut err = ValidationError::new("length");
        err.message = Some("Nomor telepon minimal 10 digit".into());
        Err(err)
    }
}

/// Contact details and payment choice submitted at checkout
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CheckoutRequest {
    #[validate(length(min = 1, max = 128))]
    pub cart_session_id: String,
    #[validate(custom = "validate_name")]
    pub name: String,
    #[validate(custom = "validate_phone")]
    pub phone: String,
    #[validate(length(max = 500))]
    pub address: Option<String>,
    pub payment_method: String,
}

/// Handle for the payment page; exchanged for a purchase exactly once
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CheckoutTicket {
    pub attempt_id: Uuid,
    pub total_amount: i64,
    pub payment_method: PaymentMethod,
}

pub struct CheckoutService {
    carts: Arc<CartRegistry>,
    settings: Arc<SettingsService>,
    creator: Arc<PurchaseCreator>,
}

impl CheckoutService {
    pub fn new(
        carts: Arc<CartRegistry>,
        settings: Arc<SettingsService>,
        creator: Arc<PurchaseCreator>,
    ) -> Self {
        Self {
            carts,
            settings,
            creator,
        }
    }

    /// Validates the checkout and snapshots the cart. Performs no store writes.
    #[instrument(skip(self, request, user), fields(user_id = %user.user_id))]
    pub async fn checkout(
        &self,
        request: CheckoutRequest,
        user: &AuthUser,
    ) -> Result<CheckoutTicket, ServiceError> {
        request.validate()?;

        let method = PaymentMethod::parse(&request.payment_method).ok_or_else(|| {
            ServiceError::field("payment_method", "Metode pembayaran tidak dikenal")
        })?;

        let available = self.settings.available_methods().await;
        if !available.contains(&method) {
            warn!(method = %method, "checkout with unavailable payment method");
            return Err(ServiceError::field(
                "payment_method",
                "Metode pembayaran tidak tersedia",
            ));
        }

        let cart = self.carts.snapshot(&request.cart_session_id);
        if cart.is_empty() {
            return Err(ServiceError::ValidationError(
                "Keranjang masih kosong".to_string(),
            ));
        }

        let items = OrderItems(cart.to_order_lines());
        let total_amount = items.total_amount().ok_or_else(|| {
            ServiceError::field("quantity", "Total keranjang terlalu besar")
        })?;
        let draft = OrderDraft {
            attempt_id: Uuid::new_v4(),
            user_id: user.user_id,
            customer_name: request.name.trim().to_string(),
            phone: request.phone.trim().to_string(),
            address: request
                .address
                .map(|a| a.trim().to_string())
                .filter(|a| !a.is_empty()),
            items: items.0,
            total_amount,
            payment_method: method,
            created_at: Utc::now(),
        };
        let ticket = CheckoutTicket {
            attempt_id: draft.attempt_id,
            total_amount: draft.total_amount,
            payment_method: method,
        };

        self.creator.stage(draft);
        self.carts.clear(&request.cart_session_id);

        info!(attempt_id = %ticket.attempt_id, total = ticket.total_amount, "checkout staged");
        Ok(ticket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::{MockPurchaseStore, MockSettingsStore};
    use crate::services::cart::CartProduct;
    use crate::services::test_fixtures::user;
    use crate::services::settings::{PAYMENT_CATEGORY, QRIS_KEY};
    use assert_matches::assert_matches;
    use serde_json::json;
    use std::time::Duration;

    fn settings_with_qris_only() -> Arc<SettingsService> {
        let mut store = MockSettingsStore::new();
        store.expect_list().returning(|_| {
            Ok(vec![crate::entities::app_setting::Model {
                key: QRIS_KEY.into(),
                value: json!({ "enabled": true, "merchant_name": "Kedai Kopi" }),
                category: PAYMENT_CATEGORY.into(),
                description: None,
                updated_at: Utc::now(),
            }])
        });
        Arc::new(SettingsService::new(
            Arc::new(store),
            Duration::from_secs(60),
            Duration::from_secs(1),
        ))
    }

    fn untouched_store() -> Arc<MockPurchaseStore> {
        let mut store = MockPurchaseStore::new();
        store.expect_insert().times(0);
        Arc::new(store)
    }

    fn filled_carts(session: &str) -> Arc<CartRegistry> {
        let carts = Arc::new(CartRegistry::new());
        carts.update(session, |cart| {
            let kopi = CartProduct {
                id: Uuid::new_v4(),
                name: "Kopi Susu".into(),
                price: 22_000,
                image_url: None,
            };
            cart.add(kopi.clone()).unwrap();
            cart.add(kopi).unwrap();
            cart.add(CartProduct {
                id: Uuid::new_v4(),
                name: "Roti Bakar".into(),
                price: 10_000,
                image_url: None,
            })
            .unwrap();
        });
        carts
    }

    fn request(method: &str) -> CheckoutRequest {
        CheckoutRequest {
            cart_session_id: "sess-1".into(),
            name: "Sari".into(),
            phone: "081234567890".into(),
            address: None,
            payment_method: method.into(),
        }
    }

    fn service(carts: Arc<CartRegistry>) -> (CheckoutService, Arc<PurchaseCreator>) {
        let creator = Arc::new(PurchaseCreator::new(untouched_store(), 24));
        (
            CheckoutService::new(carts, settings_with_qris_only(), creator.clone()),
            creator,
        )
    }

    #[tokio::test]
    async fn unavailable_method_is_rejected_before_any_write() {
        let carts = filled_carts("sess-1");
        let (service, _) = service(carts.clone());

        let err = service
            .checkout(request("bank_transfer"), &user(Uuid::new_v4()))
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::FieldValidation { ref field, .. } if field == "payment_method");
        assert!(!carts.snapshot("sess-1").is_empty());
    }

    #[tokio::test]
    async fn unknown_method_is_a_field_error() {
        let (service, _) = service(filled_carts("sess-1"));
        let err = service
            .checkout(request("cash"), &user(Uuid::new_v4()))
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::FieldValidation { ref field, .. } if field == "payment_method");
    }

    #[tokio::test]
    async fn short_phone_is_rejected() {
        let (service, _) = service(filled_carts("sess-1"));
        let mut req = request("qris");
        req.phone = "0812".into();
        let err = service.checkout(req, &user(Uuid::new_v4())).await.unwrap_err();
        assert_matches!(err, ServiceError::FieldValidation { ref field, .. } if field == "phone");
    }

    #[tokio::test]
    async fn empty_cart_is_rejected() {
        let (service, _) = service(Arc::new(CartRegistry::new()));
        let err = service
            .checkout(request("qris"), &user(Uuid::new_v4()))
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::ValidationError(_));
    }

    #[tokio::test]
    async fn valid_checkout_snapshots_and_clears_cart() {
        let carts = filled_carts("sess-1");
        let (service, creator) = service(carts.clone());
        let owner = Uuid::new_v4();

        let ticket = service.checkout(request("qris"), &user(owner)).await.unwrap();
        assert_eq!(ticket.total_amount, 54_000);
        assert_eq!(ticket.payment_method, PaymentMethod::Qris);
        assert!(carts.snapshot("sess-1").is_empty());

        let draft = creator.draft(ticket.attempt_id).unwrap();
        assert_eq!(draft.user_id, owner);
        assert_eq!(draft.items.len(), 2);
    }
}
