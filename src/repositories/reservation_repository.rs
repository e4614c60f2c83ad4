use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::entities::reservation::{
    ActiveModel as ReservationActiveModel, Column, Entity as Reservation,
    Model as ReservationModel, ReservationStatus,
};
use crate::errors::ServiceError;

use super::{BaseRepository, Repository};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReservationStore: Send + Sync {
    async fn insert(&self, reservation: ReservationModel)
        -> Result<ReservationModel, ServiceError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<ReservationModel>, ServiceError>;

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<ReservationModel>, ServiceError>;

    async fn list(
        &self,
        status: Option<ReservationStatus>,
    ) -> Result<Vec<ReservationModel>, ServiceError>;

    async fn set_status(&self, id: Uuid, status: ReservationStatus) -> Result<u64, ServiceError>;

    async fn delete(&self, id: Uuid) -> Result<u64, ServiceError>;

    async fn count_by_status(&self, status: ReservationStatus) -> Result<u64, ServiceError>;
}

#[derive(Debug, Clone)]
pub struct ReservationRepository {
    base: BaseRepository,
}

impl ReservationRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }
}

#[async_trait]
impl ReservationStore for ReservationRepository {
    async fn insert(
        &self,
        reservation: ReservationModel,
    ) -> Result<ReservationModel, ServiceError> {
        let active: ReservationActiveModel = reservation.into();
        Reservation::insert(active)
            .exec_with_returning(self.base.get_db())
            .await
            .map_err(ServiceError::from_db)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<ReservationModel>, ServiceError> {
        Ok(Reservation::find_by_id(id).one(self.base.get_db()).await?)
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<ReservationModel>, ServiceError> {
        Ok(Reservation::find()
            .filter(Column::UserId.eq(user_id))
            .order_by_desc(Column::ReservationDate)
            .order_by_desc(Column::ReservationTime)
            .all(self.base.get_db())
            .await?)
    }

    async fn list(
        &self,
        status: Option<ReservationStatus>,
    ) -> Result<Vec<ReservationModel>, ServiceError> {
        let mut query = Reservation::find()
            .order_by_asc(Column::ReservationDate)
            .order_by_asc(Column::ReservationTime);
        if let Some(status) = status {
            query = query.filter(Column::Status.eq(status));
        }
        Ok(query.all(self.base.get_db()).await?)
    }

    async fn set_status(&self, id: Uuid, status: ReservationStatus) -> Result<u64, ServiceError> {
        let result = Reservation::update_many()
            .col_expr(Column::Status, Expr::value(status))
            .col_expr(Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(Column::Id.eq(id))
            .exec(self.base.get_db())
            .await?;
        Ok(result.rows_affected)
    }

    async fn delete(&self, id: Uuid) -> Result<u64, ServiceError> {
        let result = Reservation::delete_by_id(id)
            .exec(self.base.get_db())
            .await?;
        Ok(result.rows_affected)
    }

    async fn count_by_status(&self, status: ReservationStatus) -> Result<u64, ServiceError> {
        Ok(Reservation::find()
            .filter(Column::Status.eq(status))
            .count(self.base.get_db())
            .await?)
    }
}
