use async_trait::async_trait;
use sea_orm::{
    sea_query::OnConflict, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel,
    QueryFilter, QueryOrder,
};
use std::sync::Arc;

use crate::entities::app_setting::{Column, Entity as AppSetting, Model as AppSettingModel};
use crate::errors::ServiceError;

use super::{BaseRepository, Repository};

/// Flat key/value settings store
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn list(&self, category: Option<String>) -> Result<Vec<AppSettingModel>, ServiceError>;

    async fn upsert(&self, setting: AppSettingModel) -> Result<AppSettingModel, ServiceError>;
}

#[derive(Debug, Clone)]
pub struct SettingsRepository {
    base: BaseRepository,
}

impl SettingsRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }
}

#[async_trait]
impl SettingsStore for SettingsRepository {
    async fn list(&self, category: Option<String>) -> Result<Vec<AppSettingModel>, ServiceError> {
        let mut query = AppSetting::find().order_by_asc(Column::Key);
        if let Some(category) = category {
            query = query.filter(Column::Category.eq(category));
        }
        Ok(query.all(self.base.get_db()).await?)
    }

    async fn upsert(&self, setting: AppSettingModel) -> Result<AppSettingModel, ServiceError> {
        let key = setting.key.clone();
        AppSetting::insert(setting.into_active_model())
            .on_conflict(
                OnConflict::column(Column::Key)
                    .update_columns([
                        Column::Value,
                        Column::Category,
                        Column::Description,
                        Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec(self.base.get_db())
            .await
            .map_err(ServiceError::from_db)?;

        AppSetting::find_by_id(key.clone())
            .one(self.base.get_db())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Setting {} not found", key)))
    }
}
