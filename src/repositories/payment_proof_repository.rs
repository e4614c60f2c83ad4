use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    sea_query::Expr, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::entities::payment_proof::{
    ActiveModel as ProofActiveModel, Column, Entity as PaymentProof, Model as ProofModel,
    VerificationStatus,
};
use crate::errors::ServiceError;

use super::{BaseRepository, Repository};

/// Persistence port for payment proofs
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentProofStore: Send + Sync {
    async fn insert(&self, proof: ProofModel) -> Result<ProofModel, ServiceError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<ProofModel>, ServiceError>;

    async fn list_for_purchase(&self, purchase_id: Uuid) -> Result<Vec<ProofModel>, ServiceError>;

    async fn record_verification(
        &self,
        id: Uuid,
        status: VerificationStatus,
        reviewer: Uuid,
        notes: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<u64, ServiceError>;

    async fn delete(&self, id: Uuid) -> Result<u64, ServiceError>;
}

/// SeaORM adapter for [`PaymentProofStore`]
#[derive(Debug, Clone)]
pub struct PaymentProofRepository {
    base: BaseRepository,
}

impl PaymentProofRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }
}

#[async_trait]
impl PaymentProofStore for PaymentProofRepository {
    async fn insert(&self, proof: ProofModel) -> Result<ProofModel, ServiceError> {
        let active: ProofActiveModel = proof.into();
        PaymentProof::insert(active)
            .exec_with_returning(self.base.get_db())
            .await
            .map_err(ServiceError::from_db)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<ProofModel>, ServiceError> {
        Ok(PaymentProof::find_by_id(id).one(self.base.get_db()).await?)
    }

    async fn list_for_purchase(&self, purchase_id: Uuid) -> Result<Vec<ProofModel>, ServiceError> {
        Ok(PaymentProof::find()
            .filter(Column::PurchaseId.eq(purchase_id))
            .order_by_desc(Column::UploadedAt)
            .all(self.base.get_db())
            .await?)
    }

    async fn record_verification(
        &self,
        id: Uuid,
        status: VerificationStatus,
        reviewer: Uuid,
        notes: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<u64, ServiceError> {
        let result = PaymentProof::update_many()
            .col_expr(Column::VerificationStatus, Expr::value(status))
            .col_expr(Column::VerifiedBy, Expr::value(Some(reviewer)))
            .col_expr(Column::VerifiedAt, Expr::value(Some(at)))
            .col_expr(Column::Notes, Expr::value(notes))
            .filter(Column::Id.eq(id))
            .exec(self.base.get_db())
            .await?;
        Ok(result.rows_affected)
    }

    async fn delete(&self, id: Uuid) -> Result<u64, ServiceError> {
        let result = PaymentProof::delete_by_id(id)
            .exec(self.base.get_db())
            .await?;
        Ok(result.rows_affected)
    }
}
