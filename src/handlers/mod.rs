pub mod admin;
pub mod carts;
pub mod checkout;
pub mod common;
pub mod health;
pub mod menu;
pub mod profile;
pub mod purchases;
pub mod reservations;

use std::sync::Arc;

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::repositories::{
    MenuRepository, MenuStore, PaymentProofRepository, PaymentProofStore, ProfileRepository,
    ProfileStore, PurchaseRepository, PurchaseStore, ReservationRepository, ReservationStore,
    SettingsRepository, SettingsStore,
};
use crate::services::{
    cart::{CartRegistry, CartService},
    checkout::CheckoutService,
    dashboard::DashboardService,
    menu::MenuService,
    payment_method::PaymentMethodService,
    payment_proof::PaymentProofService,
    profiles::ProfileService,
    purchase_creator::PurchaseCreator,
    reservations::ReservationService,
    settings::SettingsService,
    status::StatusService,
};
use crate::storage::ObjectStorage;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub cart: Arc<CartService>,
    pub checkout: Arc<CheckoutService>,
    pub purchases: Arc<PurchaseCreator>,
    pub payment_method: Arc<PaymentMethodService>,
    pub payment_proof: Arc<PaymentProofService>,
    pub status: Arc<StatusService>,
    pub settings: Arc<SettingsService>,
    pub menu: Arc<MenuService>,
    pub reservations: Arc<ReservationService>,
    pub profiles: Arc<ProfileService>,
    pub dashboard: Arc<DashboardService>,
}

impl AppServices {
    /// Wires the SeaORM repositories and the given object storage into every service.
    pub fn new(db_pool: Arc<DbPool>, storage: Arc<dyn ObjectStorage>, cfg: &AppConfig) -> Self {
        let purchase_store: Arc<dyn PurchaseStore> =
            Arc::new(PurchaseRepository::new(db_pool.clone()));
        let proof_store: Arc<dyn PaymentProofStore> =
            Arc::new(PaymentProofRepository::new(db_pool.clone()));
        let reservation_store: Arc<dyn ReservationStore> =
            Arc::new(ReservationRepository::new(db_pool.clone()));
        let menu_store: Arc<dyn MenuStore> = Arc::new(MenuRepository::new(db_pool.clone()));
        let settings_store: Arc<dyn SettingsStore> =
            Arc::new(SettingsRepository::new(db_pool.clone()));
        let profile_store: Arc<dyn ProfileStore> = Arc::new(ProfileRepository::new(db_pool));

        let carts = Arc::new(CartRegistry::new());
        let settings = Arc::new(SettingsService::new(
            settings_store,
            cfg.settings_cache_ttl(),
            cfg.settings_fetch_timeout(),
        ));
        let purchases = Arc::new(PurchaseCreator::new(
            purchase_store.clone(),
            cfg.payment_deadline_hours,
        ));

        Self {
            cart: Arc::new(CartService::new(carts.clone(), menu_store.clone())),
            checkout: Arc::new(CheckoutService::new(
                carts,
                settings.clone(),
                purchases.clone(),
            )),
            purchases,
            payment_method: Arc::new(PaymentMethodService::new(
                purchase_store.clone(),
                settings.clone(),
            )),
            payment_proof: Arc::new(PaymentProofService::new(
                purchase_store.clone(),
                proof_store,
                storage,
                cfg.max_proof_size_bytes,
            )),
            status: Arc::new(StatusService::new(
                purchase_store.clone(),
                reservation_store.clone(),
            )),
            settings,
            menu: Arc::new(MenuService::new(menu_store)),
            reservations: Arc::new(ReservationService::new(reservation_store.clone())),
            profiles: Arc::new(ProfileService::new(profile_store)),
            dashboard: Arc::new(DashboardService::new(purchase_store, reservation_store)),
        }
    }
}
