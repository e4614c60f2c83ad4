use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::entities::purchase::{OrderStatus, PaymentStatus};
use crate::entities::reservation::ReservationStatus;
use crate::errors::ServiceError;
use crate::repositories::{PurchaseStore, ReservationStore};

/// Admin notification counts, recomputed on every request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DashboardSummary {
    pub purchases_in_progress: u64,
    pub proofs_awaiting_verification: u64,
    pub reservations_waiting: u64,
    pub completed_revenue: i64,
}

pub struct DashboardService {
    purchases: Arc<dyn PurchaseStore>,
    reservations: Arc<dyn ReservationStore>,
}

impl DashboardService {
    pub fn new(purchases: Arc<dyn PurchaseStore>, reservations: Arc<dyn ReservationStore>) -> Self {
        Self {
            purchases,
            reservations,
        }
    }

    pub async fn summary(&self) -> Result<DashboardSummary, ServiceError> {
        let (in_progress, awaiting, waiting, revenue) = futures::try_join!(
            self.purchases.count_by_status(OrderStatus::Diproses),
            self.purchases.count_by_payment_status(PaymentStatus::Uploaded),
            self.reservations.count_by_status(ReservationStatus::Menunggu),
            self.purchases.revenue_for_status(OrderStatus::Selesai),
        )?;
        Ok(DashboardSummary {
            purchases_in_progress: in_progress,
            proofs_awaiting_verification: awaiting,
            reservations_waiting: waiting,
            completed_revenue: revenue,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::{MockPurchaseStore, MockReservationStore};

    #[tokio::test]
    async fn summary_collects_each_count() {
        let mut purchases = MockPurchaseStore::new();
        purchases
            .expect_count_by_status()
            .withf(|s| *s == OrderStatus::Diproses)
            .returning(|_| Ok(5));
        purchases
            .expect_count_by_payment_status()
            .withf(|s| *s == PaymentStatus::Uploaded)
            .returning(|_| Ok(2));
        purchases
            .expect_revenue_for_status()
            .withf(|s| *s == OrderStatus::Selesai)
            .returning(|_| Ok(154_000));
        let mut reservations = MockReservationStore::new();
        reservations.expect_count_by_status().returning(|_| Ok(3));

        let service = DashboardService::new(Arc::new(purchases), Arc::new(reservations));
        assert_eq!(
            service.summary().await.unwrap(),
            DashboardSummary {
                purchases_in_progress: 5,
                proofs_awaiting_verification: 2,
                reservations_waiting: 3,
                completed_revenue: 154_000,
            }
        );
    }
}
