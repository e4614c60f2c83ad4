use chrono::{DateTime, Duration, Utc};
use dashmap::{mapref::entry::Entry, DashMap};
use metrics::counter;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::entities::purchase::{
    Model as PurchaseModel, OrderItems, OrderLine, OrderStatus, PaymentMethod, PaymentStatus,
};
use crate::errors::ServiceError;
use crate::repositories::PurchaseStore;

pub const CHECKOUT_REDIRECT: &str = "/checkout";

/// Immutable snapshot of a validated checkout, waiting for its purchase row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderDraft {
    pub attempt_id: Uuid,
    pub user_id: Uuid,
    pub customer_name: String,
    pub phone: String,
    pub address: Option<String>,
    pub items: Vec<OrderLine>,
    pub total_amount: i64,
    pub payment_method: PaymentMethod,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Latch {
    InFlight,
    Created(Uuid),
}

/// Creates at most one purchase row per checkout attempt.
///
/// The latch lives in process memory only; a restart or a second replica
/// does not share it.
pub struct PurchaseCreator {
    store: Arc<dyn PurchaseStore>,
    drafts: DashMap<Uuid, OrderDraft>,
    latches: DashMap<Uuid, Latch>,
    deadline: Duration,
}

impl PurchaseCreator {
    pub fn new(store: Arc<dyn PurchaseStore>, payment_deadline_hours: i64) -> Self {
        Self {
            store,
            drafts: DashMap::new(),
            latches: DashMap::new(),
            deadline: Duration::hours(payment_deadline_hours),
        }
    }

    pub fn stage(&self, draft: OrderDraft) {
        self.drafts.insert(draft.attempt_id, draft);
    }

    pub fn draft(&self, attempt_id: Uuid) -> Option<OrderDraft> {
        self.drafts.get(&attempt_id).map(|d| d.value().clone())
    }

    /// Drops drafts staged before `cutoff` that never became a purchase.
    pub fn evict_stale_drafts(&self, cutoff: DateTime<Utc>) -> usize {
        let before = self.drafts.len();
        self.drafts.retain(|_, draft| draft.created_at >= cutoff);
        before.saturating_sub(self.drafts.len())
    }

    /// Returns the purchase for a checkout attempt, inserting it on the first call.
    #[instrument(skip(self, user), fields(user_id = %user.user_id))]
    pub async fn ensure_purchase(
        &self,
        attempt_id: Uuid,
        user: &AuthUser,
    ) -> Result<PurchaseModel, ServiceError> {
        // The entry guard must be dropped before any await.
        let next = match self.latches.entry(attempt_id) {
            Entry::Occupied(entry) => match *entry.get() {
                Latch::Created(purchase_id) => Err(purchase_id),
                Latch::InFlight => {
                    warn!(%attempt_id, "purchase creation already in flight");
                    return Err(ServiceError::Conflict(
                        "Pesanan sedang dibuat, mohon tunggu".to_string(),
                    ));
                }
            },
            Entry::Vacant(entry) => {
                let draft = self
                    .draft(attempt_id)
                    .ok_or_else(|| ServiceError::NotFound("Checkout tidak ditemukan".to_string()))?;
                if draft.user_id != user.user_id {
                    return Err(ServiceError::Forbidden(
                        "Checkout milik pengguna lain".to_string(),
                    ));
                }
                entry.insert(Latch::InFlight);
                Ok(draft)
            }
        };
        let draft = match next {
            Ok(draft) => draft,
            Err(purchase_id) => return self.load_existing(purchase_id, user).await,
        };

        let purchase = self.build_purchase(&draft, Utc::now());
        match self.store.insert(purchase).await {
            Ok(created) => {
                self.latches.insert(attempt_id, Latch::Created(created.id));
                self.drafts.remove(&attempt_id);
                counter!("kedai_purchases_created_total", 1);
                info!(%attempt_id, purchase_id = %created.id, total = created.total_amount, "purchase created");
                Ok(created)
            }
            Err(e) => {
                self.latches.remove(&attempt_id);
                error!(%attempt_id, error = %e, "purchase insert failed; latch released");
                Err(match e {
                    ServiceError::ConstraintViolation(_) => e,
                    other => ServiceError::CheckoutFailed {
                        message: format!("Gagal membuat pesanan: {}", other.response_message()),
                        redirect: CHECKOUT_REDIRECT.to_string(),
                    },
                })
            }
        }
    }

    /// Loads a purchase the caller owns (admins may load any).
    pub async fn load_existing(
        &self,
        purchase_id: Uuid,
        user: &AuthUser,
    ) -> Result<PurchaseModel, ServiceError> {
        let purchase = self
            .store
            .find_by_id(purchase_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Pesanan {purchase_id} tidak ditemukan")))?;
        if !purchase.is_owned_by(user.user_id) && !user.is_admin() {
            return Err(ServiceError::Forbidden(
                "Pesanan milik pengguna lain".to_string(),
            ));
        }
        Ok(purchase)
    }

    pub async fn list_for_user(&self, user: &AuthUser) -> Result<Vec<PurchaseModel>, ServiceError> {
        self.store.list_for_user(user.user_id).await
    }

    fn build_purchase(&self, draft: &OrderDraft, now: DateTime<Utc>) -> PurchaseModel {
        PurchaseModel {
            id: Uuid::new_v4(),
            user_id: draft.user_id,
            customer_name: draft.customer_name.clone(),
            phone: draft.phone.clone(),
            address: draft.address.clone(),
            items: OrderItems(draft.items.clone()),
            total_amount: draft.total_amount,
            payment_method: draft.payment_method,
            status: OrderStatus::Diproses,
            payment_status: PaymentStatus::Pending,
            payment_deadline: now + self.deadline,
            payment_proof_id: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::purchase::OrderStatus;
    use crate::repositories::MockPurchaseStore;
    use crate::services::test_fixtures::{lines, purchase, user};
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use tokio::sync::Notify;

    fn draft(user_id: Uuid) -> OrderDraft {
        let items = lines();
        OrderDraft {
            attempt_id: Uuid::new_v4(),
            user_id,
            customer_name: "Sari".into(),
            phone: "081234567890".into(),
            address: None,
            total_amount: OrderItems(items.clone()).total_amount().unwrap(),
            items,
            payment_method: PaymentMethod::Qris,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn repeated_calls_insert_exactly_once() {
        let owner = Uuid::new_v4();
        let mut store = MockPurchaseStore::new();
        store.expect_insert().times(1).returning(Ok);
        store.expect_find_by_id().returning(move |id| {
            let mut p = purchase(owner);
            p.id = id;
            Ok(Some(p))
        });

        let creator = PurchaseCreator::new(Arc::new(store), 24);
        let d = draft(owner);
        let attempt = d.attempt_id;
        creator.stage(d);

        let first = creator.ensure_purchase(attempt, &user(owner)).await.unwrap();
        assert_eq!(first.total_amount, 54_000);
        assert_eq!(first.status, OrderStatus::Diproses);
        assert_eq!(first.payment_status, PaymentStatus::Pending);

        let second = creator.ensure_purchase(attempt, &user(owner)).await.unwrap();
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn deadline_is_offset_from_creation() {
        let owner = Uuid::new_v4();
        let mut store = MockPurchaseStore::new();
        store.expect_insert().times(1).returning(Ok);
        let creator = PurchaseCreator::new(Arc::new(store), 24);
        let d = draft(owner);
        let attempt = d.attempt_id;
        creator.stage(d);

        let p = creator.ensure_purchase(attempt, &user(owner)).await.unwrap();
        assert_eq!(p.payment_deadline - p.created_at, Duration::hours(24));
    }

    #[tokio::test]
    async fn failed_insert_releases_latch_and_keeps_draft() {
        let owner = Uuid::new_v4();
        let mut store = MockPurchaseStore::new();
        let mut seq = mockall::Sequence::new();
        store
            .expect_insert()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(ServiceError::ServiceUnavailable("db down".into())));
        store
            .expect_insert()
            .times(1)
            .in_sequence(&mut seq)
            .returning(Ok);

        let creator = PurchaseCreator::new(Arc::new(store), 24);
        let d = draft(owner);
        let attempt = d.attempt_id;
        creator.stage(d);

        let err = creator.ensure_purchase(attempt, &user(owner)).await.unwrap_err();
        assert_matches!(err, ServiceError::CheckoutFailed { ref redirect, .. } if redirect == CHECKOUT_REDIRECT);
        assert!(creator.draft(attempt).is_some());

        creator.ensure_purchase(attempt, &user(owner)).await.unwrap();
        assert!(creator.draft(attempt).is_none());
    }

    #[tokio::test]
    async fn constraint_violation_is_passed_through() {
        let owner = Uuid::new_v4();
        let mut store = MockPurchaseStore::new();
        store
            .expect_insert()
            .returning(|_| Err(ServiceError::ConstraintViolation("payment_method".into())));
        let creator = PurchaseCreator::new(Arc::new(store), 24);
        let d = draft(owner);
        let attempt = d.attempt_id;
        creator.stage(d);

        let err = creator.ensure_purchase(attempt, &user(owner)).await.unwrap_err();
        assert_matches!(err, ServiceError::ConstraintViolation(_));
    }

    #[tokio::test]
    async fn other_users_attempt_is_forbidden() {
        let mut store = MockPurchaseStore::new();
        store.expect_insert().times(0);
        let creator = PurchaseCreator::new(Arc::new(store), 24);
        let d = draft(Uuid::new_v4());
        let attempt = d.attempt_id;
        creator.stage(d);

        let err = creator
            .ensure_purchase(attempt, &user(Uuid::new_v4()))
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::Forbidden(_));
    }

    #[test]
    fn stale_drafts_are_evicted() {
        let creator = PurchaseCreator::new(Arc::new(MockPurchaseStore::new()), 24);
        let mut old = draft(Uuid::new_v4());
        old.created_at = Utc::now() - Duration::hours(48);
        let old_attempt = old.attempt_id;
        let fresh = draft(Uuid::new_v4());
        let fresh_attempt = fresh.attempt_id;
        creator.stage(old);
        creator.stage(fresh);

        assert_eq!(creator.evict_stale_drafts(Utc::now() - Duration::hours(24)), 1);
        assert!(creator.draft(old_attempt).is_none());
        assert!(creator.draft(fresh_attempt).is_some());
    }

    /// Store whose insert blocks until released, to hold the latch in flight.
    struct GatedStore {
        entered: Notify,
        release: Notify,
        inserts: std::sync::atomic::AtomicUsize,
    }

    #[async_trait]
    impl PurchaseStore for GatedStore {
        async fn insert(&self, purchase: PurchaseModel) -> Result<PurchaseModel, ServiceError> {
            self.inserts.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            self.entered.notify_one();
            self.release.notified().await;
            Ok(purchase)
        }
        async fn find_by_id(&self, _: Uuid) -> Result<Option<PurchaseModel>, ServiceError> {
            Ok(None)
        }
        async fn list_for_user(&self, _: Uuid) -> Result<Vec<PurchaseModel>, ServiceError> {
            Ok(vec![])
        }
        async fn list(&self, _: Option<OrderStatus>) -> Result<Vec<PurchaseModel>, ServiceError> {
            Ok(vec![])
        }
        async fn update_payment_method_if_unlocked(
            &self,
            _: Uuid,
            _: PaymentMethod,
        ) -> Result<u64, ServiceError> {
            Ok(0)
        }
        async fn attach_proof_if_pending(&self, _: Uuid, _: Uuid) -> Result<u64, ServiceError> {
            Ok(0)
        }
        async fn set_payment_state(
            &self,
            _: Uuid,
            _: PaymentStatus,
            _: Option<Uuid>,
        ) -> Result<u64, ServiceError> {
            Ok(0)
        }
        async fn set_status(&self, _: Uuid, _: OrderStatus) -> Result<u64, ServiceError> {
            Ok(0)
        }
        async fn delete(&self, _: Uuid) -> Result<u64, ServiceError> {
            Ok(0)
        }
        async fn expire_overdue(&self, _: DateTime<Utc>) -> Result<u64, ServiceError> {
            Ok(0)
        }
        async fn count_by_status(&self, _: OrderStatus) -> Result<u64, ServiceError> {
            Ok(0)
        }
        async fn count_by_payment_status(&self, _: PaymentStatus) -> Result<u64, ServiceError> {
            Ok(0)
        }
        async fn revenue_for_status(&self, _: OrderStatus) -> Result<i64, ServiceError> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn concurrent_call_while_in_flight_is_rejected() {
        let owner = Uuid::new_v4();
        let store = Arc::new(GatedStore {
            entered: Notify::new(),
            release: Notify::new(),
            inserts: Default::default(),
        });
        let creator = Arc::new(PurchaseCreator::new(store.clone(), 24));
        let d = draft(owner);
        let attempt = d.attempt_id;
        creator.stage(d);

        let first = {
            let creator = creator.clone();
            tokio::spawn(async move { creator.ensure_purchase(attempt, &user(owner)).await })
        };
        store.entered.notified().await;

        let second = creator.ensure_purchase(attempt, &user(owner)).await;
        assert_matches!(second, Err(ServiceError::Conflict(_)));

        store.release.notify_one();
        assert!(first.await.unwrap().is_ok());
        assert_eq!(store.inserts.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
