use utoipa::{
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Kedai API",
        version = "0.1.0",
        description = r#"
# Kedai café API

Menu browsing, carts, checkout with manual payment proofs, table reservations
and the administrative back office.

## Authentication

Bearer tokens are issued by the identity provider. Include the token in the
Authorization header:

```
Authorization: Bearer <jwt>
```

Routes under `/admin` additionally require the `admin` role.

## Error Handling

Errors share one body shape. Field-level validation failures carry `field`,
and failed purchase creation carries a `redirect` hint:

```json
{
  "error": "Unprocessable Entity",
  "message": "Nomor telepon minimal 10 digit",
  "field": "phone",
  "request_id": "3f2a...",
  "timestamp": "2024-06-01T00:00:00Z"
}
```
        "#
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "health", description = "Liveness and build information"),
        (name = "menu", description = "Public menu"),
        (name = "settings", description = "Public storefront settings"),
        (name = "carts", description = "Session carts"),
        (name = "checkout", description = "Checkout and purchase creation"),
        (name = "purchases", description = "Customer purchases and payment proofs"),
        (name = "reservations", description = "Table reservations"),
        (name = "profile", description = "Customer profile"),
        (name = "admin", description = "Back-office endpoints")
    ),
    paths(
        crate::handlers::health::liveness_check,
        crate::handlers::health::readiness_check,
        crate::handlers::health::api_status,

        crate::handlers::menu::get_menu,
        crate::handlers::menu::list_categories,
        crate::handlers::menu::payment_methods,
        crate::handlers::menu::site_content,

        crate::handlers::carts::get_cart,
        crate::handlers::carts::add_to_cart,
        crate::handlers::carts::update_cart_item,
        crate::handlers::carts::remove_cart_item,
        crate::handlers::carts::clear_cart,

        crate::handlers::checkout::checkout,
        crate::handlers::checkout::ensure_purchase,

        crate::handlers::purchases::list_my_purchases,
        crate::handlers::purchases::get_purchase,
        crate::handlers::purchases::change_payment_method,
        crate::handlers::purchases::upload_proof,
        crate::handlers::purchases::list_proofs,

        crate::handlers::reservations::create_reservation,
        crate::handlers::reservations::list_my_reservations,

        crate::handlers::profile::get_profile,
        crate::handlers::profile::upsert_profile,

        crate::handlers::admin::dashboard,
        crate::handlers::admin::list_purchases,
        crate::handlers::admin::set_purchase_status,
        crate::handlers::admin::delete_purchase,
        crate::handlers::admin::verify_proof,
        crate::handlers::admin::list_reservations,
        crate::handlers::admin::set_reservation_status,
        crate::handlers::admin::delete_reservation,
        crate::handlers::admin::create_category,
        crate::handlers::admin::update_category,
        crate::handlers::admin::delete_category,
        crate::handlers::admin::list_menu_items,
        crate::handlers::admin::create_menu_item,
        crate::handlers::admin::update_menu_item,
        crate::handlers::admin::delete_menu_item,
        crate::handlers::admin::list_settings,
        crate::handlers::admin::upsert_setting,
    ),
    components(
        schemas(
            crate::errors::ErrorResponse,
            crate::entities::purchase::PaymentMethod,
            crate::entities::purchase::OrderStatus,
            crate::entities::purchase::PaymentStatus,
            crate::entities::purchase::OrderLine,
            crate::entities::payment_proof::VerificationStatus,
            crate::entities::reservation::ReservationStatus,
            crate::services::cart::CartItem,
            crate::services::cart::CartSummary,
            crate::services::cart::CartChange,
            crate::services::checkout::CheckoutRequest,
            crate::services::checkout::CheckoutTicket,
            crate::services::settings::PaymentSettings,
            crate::services::dashboard::DashboardSummary,
            crate::handlers::purchases::PurchaseView,
            crate::handlers::purchases::ProofView,
            crate::handlers::admin::SettingView,
        )
    )
)]
pub struct ApiDocV1;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
        }
    }
}

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}
