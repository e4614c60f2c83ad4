#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{header, Method, Request},
    response::Response,
    Router,
};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;
use uuid::Uuid;

use kedai_api::{
    auth::{AuthConfig, AuthService, ADMIN_ROLE},
    config::AppConfig,
    db,
    handlers::AppServices,
    storage::{LocalObjectStorage, ObjectStorage},
    AppState,
};

/// Helper harness for spinning up the full router over a throwaway SQLite file.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    auth_service: Arc<AuthService>,
    pub customer_id: Uuid,
    pub admin_id: Uuid,
    _dir: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let db_path = dir.path().join("kedai_test.db");

        let mut cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", db_path.display()),
            "test_secret_key_for_testing_purposes_only_32chars".to_string(),
            "test".to_string(),
        );
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;
        cfg.cors_allow_any_origin = true;
        cfg.expiry_sweep_interval_secs = 0;
        cfg.storage_root = dir.path().join("uploads").display().to_string();
        cfg.max_proof_size_bytes = 1024;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");
        let db_arc = Arc::new(pool);

        let storage: Arc<dyn ObjectStorage> = Arc::new(LocalObjectStorage::new(
            cfg.storage_root.clone(),
            cfg.storage_public_base_url.clone(),
        ));
        let auth_service = Arc::new(AuthService::new(AuthConfig::from(&cfg)));
        let services = AppServices::new(db_arc.clone(), storage, &cfg);

        let state = AppState {
            db: db_arc,
            config: cfg,
            services,
        };
        let router = kedai_api::build_router(state.clone(), auth_service.clone())
            .expect("router builds");

        Self {
            router,
            state,
            auth_service,
            customer_id: Uuid::new_v4(),
            admin_id: Uuid::new_v4(),
            _dir: dir,
        }
    }

    pub fn token_for(&self, user_id: Uuid, roles: &[&str]) -> String {
        self.auth_service
            .generate_token(
                user_id,
                Some("Test User".to_string()),
                roles.iter().map(|r| r.to_string()).collect(),
            )
            .expect("token")
    }

    pub fn customer_token(&self) -> String {
        self.token_for(self.customer_id, &["customer"])
    }

    pub fn admin_token(&self) -> String {
        self.token_for(self.admin_id, &[ADMIN_ROLE])
    }

    /// Send a request against the router with an optional bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(tok) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", tok));
        }

        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(serde_json::to_vec(&json).expect("serialize json request body"))
            }
            None => Body::empty(),
        };

        self.send(builder.body(body).expect("failed to build request"))
            .await
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    pub async fn as_customer(&self, method: Method, uri: &str, body: Option<Value>) -> Response {
        let token = self.customer_token();
        self.request(method, uri, body, Some(&token)).await
    }

    pub async fn as_admin(&self, method: Method, uri: &str, body: Option<Value>) -> Response {
        let token = self.admin_token();
        self.request(method, uri, body, Some(&token)).await
    }

    /// Enables one payment method through the admin settings endpoint.
    pub async fn enable_method(&self, key: &str, value: Value) {
        let res = self
            .as_admin(
                Method::PUT,
                &format!("/api/v1/admin/settings/{key}"),
                Some(json!({ "value": value })),
            )
            .await;
        assert_eq!(res.status(), 200, "enabling {key}");
    }

    pub async fn enable_qris_and_bank(&self) {
        self.enable_method(
            "payment.qris",
            json!({ "enabled": true, "merchant_name": "Kedai Kopi" }),
        )
        .await;
        self.enable_method(
            "payment.bank_transfer",
            json!({
                "enabled": true,
                "accounts": [{
                    "bank_name": "BCA",
                    "account_number": "1234567890",
                    "account_name": "Kedai Kopi"
                }]
            }),
        )
        .await;
    }

    /// Creates a menu item via the admin API and returns its id.
    pub async fn seed_menu_item(&self, name: &str, price: i64) -> Uuid {
        let res = self
            .as_admin(
                Method::POST,
                "/api/v1/admin/menu-items",
                Some(json!({ "name": name, "price": price })),
            )
            .await;
        assert_eq!(res.status(), 201, "seeding {name}");
        let body = response_json(res).await;
        body["data"]["id"]
            .as_str()
            .and_then(|id| Uuid::parse_str(id).ok())
            .expect("menu item id")
    }

    pub async fn add_to_cart(&self, session: &str, item: Uuid, times: usize) {
        for _ in 0..times {
            let res = self
                .request(
                    Method::POST,
                    &format!("/api/v1/carts/{session}/items"),
                    Some(json!({ "menu_item_id": item })),
                    None,
                )
                .await;
            assert_eq!(res.status(), 200);
        }
    }

    /// Fills a cart with 2 x 22000 + 1 x 10000 and checks out as the customer.
    pub async fn checkout_standard_cart(&self, session: &str, method: &str) -> Value {
        let latte = self.seed_menu_item("Es Kopi Susu", 22_000).await;
        let toast = self.seed_menu_item("Roti Bakar", 10_000).await;
        self.add_to_cart(session, latte, 2).await;
        self.add_to_cart(session, toast, 1).await;

        let res = self
            .as_customer(
                Method::POST,
                "/api/v1/checkout",
                Some(json!({
                    "cart_session_id": session,
                    "name": "Sari",
                    "phone": "081234567890",
                    "address": "Jl. Melati 5",
                    "payment_method": method
                })),
            )
            .await;
        assert_eq!(res.status(), 201);
        response_json(res).await
    }
}

pub async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}
