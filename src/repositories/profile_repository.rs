use async_trait::async_trait;
use sea_orm::{sea_query::OnConflict, DatabaseConnection, EntityTrait, IntoActiveModel};
use std::sync::Arc;
use uuid::Uuid;

use crate::entities::profile::{Column, Entity as Profile, Model as ProfileModel};
use crate::errors::ServiceError;

use super::{BaseRepository, Repository};

#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn find(&self, id: Uuid) -> Result<Option<ProfileModel>, ServiceError>;

    /// Inserts or replaces name, phone and role; `created_at` is kept on conflict.
    async fn upsert(&self, profile: ProfileModel) -> Result<ProfileModel, ServiceError>;
}

#[derive(Debug, Clone)]
pub struct ProfileRepository {
    base: BaseRepository,
}

impl ProfileRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }
}

#[async_trait]
impl ProfileStore for ProfileRepository {
    async fn find(&self, id: Uuid) -> Result<Option<ProfileModel>, ServiceError> {
        Ok(Profile::find_by_id(id).one(self.base.get_db()).await?)
    }

    async fn upsert(&self, profile: ProfileModel) -> Result<ProfileModel, ServiceError> {
        let id = profile.id;
        Profile::insert(profile.into_active_model())
            .on_conflict(
                OnConflict::column(Column::Id)
                    .update_columns([Column::FullName, Column::Phone, Column::Role, Column::UpdatedAt])
                    .to_owned(),
            )
            .exec(self.base.get_db())
            .await
            .map_err(ServiceError::from_db)?;

        Profile::find_by_id(id)
            .one(self.base.get_db())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Profile {} not found", id)))
    }
}
