use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    sea_query::Expr, ColumnTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::entities::purchase::{
    ActiveModel as PurchaseActiveModel, Column, Entity as Purchase, Model as PurchaseModel,
    OrderStatus, PaymentMethod, PaymentStatus,
};
use crate::errors::ServiceError;

use super::{BaseRepository, Repository};

/// Persistence port for purchases
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PurchaseStore: Send + Sync {
    async fn insert(&self, purchase: PurchaseModel) -> Result<PurchaseModel, ServiceError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<PurchaseModel>, ServiceError>;

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<PurchaseModel>, ServiceError>;

    async fn list(&self, status: Option<OrderStatus>) -> Result<Vec<PurchaseModel>, ServiceError>;

    /// Changes the method only while the row is still unpaid, unlinked and
    /// non-terminal; returns the number of rows touched.
    async fn update_payment_method_if_unlocked(
        &self,
        id: Uuid,
        method: PaymentMethod,
    ) -> Result<u64, ServiceError>;

    /// Links `proof_id` and marks the purchase uploaded, but only while it is
    /// still pending with no proof; returns the number of rows touched.
    async fn attach_proof_if_pending(&self, id: Uuid, proof_id: Uuid)
        -> Result<u64, ServiceError>;

    /// Unconditional payment transition used by proof review.
    async fn set_payment_state(
        &self,
        id: Uuid,
        payment_status: PaymentStatus,
        proof_id: Option<Uuid>,
    ) -> Result<u64, ServiceError>;

    async fn set_status(&self, id: Uuid, status: OrderStatus) -> Result<u64, ServiceError>;

    async fn delete(&self, id: Uuid) -> Result<u64, ServiceError>;

    /// Cancels unpaid purchases whose deadline is before `now`.
    async fn expire_overdue(&self, now: DateTime<Utc>) -> Result<u64, ServiceError>;

    async fn count_by_status(&self, status: OrderStatus) -> Result<u64, ServiceError>;

    async fn count_by_payment_status(&self, status: PaymentStatus) -> Result<u64, ServiceError>;

    async fn revenue_for_status(&self, status: OrderStatus) -> Result<i64, ServiceError>;
}

/// SeaORM adapter for [`PurchaseStore`]
#[derive(Debug, Clone)]
pub struct PurchaseRepository {
    base: BaseRepository,
}

impl PurchaseRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }
}

#[async_trait]
impl PurchaseStore for PurchaseRepository {
    async fn insert(&self, purchase: PurchaseModel) -> Result<PurchaseModel, ServiceError> {
        let active: PurchaseActiveModel = purchase.into();
        Purchase::insert(active)
            .exec_with_returning(self.base.get_db())
            .await
            .map_err(ServiceError::from_db)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<PurchaseModel>, ServiceError> {
        Ok(Purchase::find_by_id(id).one(self.base.get_db()).await?)
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<PurchaseModel>, ServiceError> {
        Ok(Purchase::find()
            .filter(Column::UserId.eq(user_id))
            .order_by_desc(Column::CreatedAt)
            .all(self.base.get_db())
            .await?)
    }

    async fn list(&self, status: Option<OrderStatus>) -> Result<Vec<PurchaseModel>, ServiceError> {
        let mut query = Purchase::find().order_by_desc(Column::CreatedAt);
        if let Some(status) = status {
            query = query.filter(Column::Status.eq(status));
        }
        Ok(query.all(self.base.get_db()).await?)
    }

    async fn update_payment_method_if_unlocked(
        &self,
        id: Uuid,
        method: PaymentMethod,
    ) -> Result<u64, ServiceError> {
        let result = Purchase::update_many()
            .col_expr(Column::PaymentMethod, Expr::value(method))
            .col_expr(Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(Column::Id.eq(id))
            .filter(Column::PaymentStatus.eq(PaymentStatus::Pending))
            .filter(Column::PaymentProofId.is_null())
            .filter(Column::Status.is_not_in([OrderStatus::Selesai, OrderStatus::Dibatalkan]))
            .exec(self.base.get_db())
            .await
            .map_err(ServiceError::from_db)?;
        Ok(result.rows_affected)
    }

    async fn attach_proof_if_pending(
        &self,
        id: Uuid,
        proof_id: Uuid,
    ) -> Result<u64, ServiceError> {
        let result = Purchase::update_many()
            .col_expr(Column::PaymentStatus, Expr::value(PaymentStatus::Uploaded))
            .col_expr(Column::PaymentProofId, Expr::value(Some(proof_id)))
            .col_expr(Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(Column::Id.eq(id))
            .filter(Column::PaymentStatus.eq(PaymentStatus::Pending))
            .filter(Column::PaymentProofId.is_null())
            .exec(self.base.get_db())
            .await
            .map_err(ServiceError::from_db)?;
        Ok(result.rows_affected)
    }

    async fn set_payment_state(
        &self,
        id: Uuid,
        payment_status: PaymentStatus,
        proof_id: Option<Uuid>,
    ) -> Result<u64, ServiceError> {
        let result = Purchase::update_many()
            .col_expr(Column::PaymentStatus, Expr::value(payment_status))
            .col_expr(Column::PaymentProofId, Expr::value(proof_id))
            .col_expr(Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(Column::Id.eq(id))
            .exec(self.base.get_db())
            .await?;
        Ok(result.rows_affected)
    }

    async fn set_status(&self, id: Uuid, status: OrderStatus) -> Result<u64, ServiceError> {
        let result = Purchase::update_many()
            .col_expr(Column::Status, Expr::value(status))
            .col_expr(Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(Column::Id.eq(id))
            .exec(self.base.get_db())
            .await?;
        Ok(result.rows_affected)
    }

    async fn delete(&self, id: Uuid) -> Result<u64, ServiceError> {
        let result = Purchase::delete_by_id(id).exec(self.base.get_db()).await?;
        Ok(result.rows_affected)
    }

    async fn expire_overdue(&self, now: DateTime<Utc>) -> Result<u64, ServiceError> {
        let result = Purchase::update_many()
            .col_expr(Column::Status, Expr::value(OrderStatus::Dibatalkan))
            .col_expr(Column::UpdatedAt, Expr::value(now))
            .filter(Column::Status.eq(OrderStatus::Diproses))
            .filter(Column::PaymentStatus.eq(PaymentStatus::Pending))
            .filter(Column::PaymentDeadline.lt(now))
            .exec(self.base.get_db())
            .await?;
        Ok(result.rows_affected)
    }

    async fn count_by_status(&self, status: OrderStatus) -> Result<u64, ServiceError> {
        Ok(Purchase::find()
            .filter(Column::Status.eq(status))
            .count(self.base.get_db())
            .await?)
    }

    async fn count_by_payment_status(&self, status: PaymentStatus) -> Result<u64, ServiceError> {
        Ok(Purchase::find()
            .filter(Column::PaymentStatus.eq(status))
            .count(self.base.get_db())
            .await?)
    }

    async fn revenue_for_status(&self, status: OrderStatus) -> Result<i64, ServiceError> {
        // Summed here; Postgres SUM(bigint) yields numeric.
        let totals: Vec<i64> = Purchase::find()
            .select_only()
            .column(Column::TotalAmount)
            .filter(Column::Status.eq(status))
            .into_tuple()
            .all(self.base.get_db())
            .await?;
        Ok(totals.into_iter().sum())
    }
}
