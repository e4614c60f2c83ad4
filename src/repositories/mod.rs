//! Store ports and their SeaORM adapters.
//!
//! Services depend on the traits so that call counts and failure paths can be
//! exercised with mocks; the `*Repository` types are the production adapters.

use sea_orm::DatabaseConnection;
use std::sync::Arc;

pub mod menu_repository;
pub mod payment_proof_repository;
pub mod profile_repository;
pub mod purchase_repository;
pub mod reservation_repository;
pub mod settings_repository;

pub use menu_repository::{MenuRepository, MenuStore};
pub use payment_proof_repository::{PaymentProofRepository, PaymentProofStore};
pub use profile_repository::{ProfileRepository, ProfileStore};
pub use purchase_repository::{PurchaseRepository, PurchaseStore};
pub use reservation_repository::{ReservationRepository, ReservationStore};
pub use settings_repository::{SettingsRepository, SettingsStore};

#[cfg(test)]
pub use menu_repository::MockMenuStore;
#[cfg(test)]
pub use payment_proof_repository::MockPaymentProofStore;
#[cfg(test)]
pub use purchase_repository::MockPurchaseStore;
#[cfg(test)]
pub use reservation_repository::MockReservationStore;
#[cfg(test)]
pub use settings_repository::MockSettingsStore;

/// Repository trait for common database operations
pub trait Repository {
    fn get_db(&self) -> &DatabaseConnection;
}

#[derive(Debug, Clone)]
pub struct BaseRepository {
    db: Arc<DatabaseConnection>,
}

impl BaseRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

impl Repository for BaseRepository {
    fn get_db(&self) -> &DatabaseConnection {
        &self.db
    }
}
