use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::entities::purchase::{Model as PurchaseModel, OrderStatus};
use crate::entities::reservation::{Model as ReservationModel, ReservationStatus};
use crate::errors::ServiceError;
use crate::repositories::{PurchaseStore, ReservationStore};
use crate::services::cart::CartRegistry;
use crate::services::purchase_creator::PurchaseCreator;
use crate::tracing::with_outcome;

/// Admin status transitions. Any value may follow any value; last write wins.
pub struct StatusService {
    purchases: Arc<dyn PurchaseStore>,
    reservations: Arc<dyn ReservationStore>,
}

impl StatusService {
    pub fn new(purchases: Arc<dyn PurchaseStore>, reservations: Arc<dyn ReservationStore>) -> Self {
        Self {
            purchases,
            reservations,
        }
    }

    #[instrument(skip(self))]
    pub async fn set_purchase_status(
        &self,
        id: Uuid,
        status: OrderStatus,
    ) -> Result<PurchaseModel, ServiceError> {
        if self.purchases.set_status(id, status).await? == 0 {
            return Err(ServiceError::NotFound(format!("Pesanan {id} tidak ditemukan")));
        }
        info!(purchase_id = %id, %status, "purchase status set");
        self.purchases
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Pesanan {id} tidak ditemukan")))
    }

    #[instrument(skip(self))]
    pub async fn set_reservation_status(
        &self,
        id: Uuid,
        status: ReservationStatus,
    ) -> Result<ReservationModel, ServiceError> {
        if self.reservations.set_status(id, status).await? == 0 {
            return Err(ServiceError::NotFound(format!("Reservasi {id} tidak ditemukan")));
        }
        info!(reservation_id = %id, %status, "reservation status set");
        self.reservations
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Reservasi {id} tidak ditemukan")))
    }

    pub async fn list_purchases(
        &self,
        status: Option<OrderStatus>,
    ) -> Result<Vec<PurchaseModel>, ServiceError> {
        self.purchases.list(status).await
    }

    #[instrument(skip(self))]
    pub async fn delete_purchase(&self, id: Uuid) -> Result<(), ServiceError> {
        if self.purchases.delete(id).await? == 0 {
            return Err(ServiceError::NotFound(format!("Pesanan {id} tidak ditemukan")));
        }
        info!(purchase_id = %id, "purchase deleted");
        Ok(())
    }

    /// Cancels unpaid purchases past their payment deadline.
    pub async fn expire_overdue(&self, now: DateTime<Utc>) -> Result<u64, ServiceError> {
        let expired = self.purchases.expire_overdue(now).await?;
        if expired > 0 {
            info!(expired, "overdue purchases cancelled");
        }
        Ok(expired)
    }
}

/// Process-memory state trimmed by the sweeper: carts and checkout drafts
pub struct IdleSessions {
    pub carts: Arc<CartRegistry>,
    pub purchases: Arc<PurchaseCreator>,
    pub max_idle: Duration,
}

impl IdleSessions {
    /// Evicts carts and drafts idle longer than `max_idle`; returns `(carts, drafts)`.
    pub fn evict(&self, now: DateTime<Utc>) -> (usize, usize) {
        let carts = self.carts.evict_idle(self.max_idle);
        let drafts = chrono::Duration::from_std(self.max_idle)
            .ok()
            .and_then(|ttl| now.checked_sub_signed(ttl))
            .map_or(0, |cutoff| self.purchases.evict_stale_drafts(cutoff));
        (carts, drafts)
    }
}

/// Runs [`StatusService::expire_overdue`] and [`IdleSessions::evict`] on a
/// fixed interval until aborted.
pub fn spawn_sweeper(
    service: Arc<StatusService>,
    idle: IdleSessions,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let now = Utc::now();
            if let Err(e) = with_outcome("expire_overdue", service.expire_overdue(now)).await {
                warn!(error = %e, "overdue sweep failed; retrying on next tick");
            }
            let (carts, drafts) = idle.evict(now);
            if carts + drafts > 0 {
                info!(carts, drafts, "idle carts and drafts evicted");
            }
        }
    })
}
