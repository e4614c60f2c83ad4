use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Unchanged, ColumnTrait, DatabaseConnection, EntityTrait,
    IntoActiveModel, QueryFilter, QueryOrder, Set,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::entities::category::{
    ActiveModel as CategoryActiveModel, Column as CategoryColumn, Entity as Category,
    Model as CategoryModel,
};
use crate::entities::menu_item::{
    ActiveModel as MenuItemActiveModel, Column as ItemColumn, Entity as MenuItem,
    Model as MenuItemModel,
};
use crate::errors::ServiceError;

use super::{BaseRepository, Repository};

/// Persistence port for categories and menu items
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MenuStore: Send + Sync {
    async fn list_categories(&self) -> Result<Vec<CategoryModel>, ServiceError>;

    async fn find_category(&self, id: Uuid) -> Result<Option<CategoryModel>, ServiceError>;

    async fn insert_category(&self, category: CategoryModel)
        -> Result<CategoryModel, ServiceError>;

    async fn update_category(&self, category: CategoryModel)
        -> Result<CategoryModel, ServiceError>;

    async fn delete_category(&self, id: Uuid) -> Result<u64, ServiceError>;

    async fn list_items(&self, available_only: bool) -> Result<Vec<MenuItemModel>, ServiceError>;

    async fn find_item(&self, id: Uuid) -> Result<Option<MenuItemModel>, ServiceError>;

    async fn insert_item(&self, item: MenuItemModel) -> Result<MenuItemModel, ServiceError>;

    async fn update_item(&self, item: MenuItemModel) -> Result<MenuItemModel, ServiceError>;

    async fn delete_item(&self, id: Uuid) -> Result<u64, ServiceError>;
}

#[derive(Debug, Clone)]
pub struct MenuRepository {
    base: BaseRepository,
}

impl MenuRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }
}

#[async_trait]
impl MenuStore for MenuRepository {
    async fn list_categories(&self) -> Result<Vec<CategoryModel>, ServiceError> {
        Ok(Category::find()
            .order_by_asc(CategoryColumn::SortOrder)
            .order_by_asc(CategoryColumn::Name)
            .all(self.base.get_db())
            .await?)
    }

    async fn find_category(&self, id: Uuid) -> Result<Option<CategoryModel>, ServiceError> {
        Ok(Category::find_by_id(id).one(self.base.get_db()).await?)
    }

    async fn insert_category(
        &self,
        category: CategoryModel,
    ) -> Result<CategoryModel, ServiceError> {
        Category::insert(category.into_active_model())
            .exec_with_returning(self.base.get_db())
            .await
            .map_err(ServiceError::from_db)
    }

    async fn update_category(
        &self,
        category: CategoryModel,
    ) -> Result<CategoryModel, ServiceError> {
        let active = CategoryActiveModel {
            id: Unchanged(category.id),
            name: Set(category.name),
            description: Set(category.description),
            sort_order: Set(category.sort_order),
            created_at: Unchanged(category.created_at),
        };
        active
            .update(self.base.get_db())
            .await
            .map_err(ServiceError::from_db)
    }

    async fn delete_category(&self, id: Uuid) -> Result<u64, ServiceError> {
        let result = Category::delete_by_id(id).exec(self.base.get_db()).await?;
        Ok(result.rows_affected)
    }

    async fn list_items(&self, available_only: bool) -> Result<Vec<MenuItemModel>, ServiceError> {
        let mut query = MenuItem::find().order_by_asc(ItemColumn::Name);
        if available_only {
            query = query.filter(ItemColumn::IsAvailable.eq(true));
        }
        Ok(query.all(self.base.get_db()).await?)
    }

    async fn find_item(&self, id: Uuid) -> Result<Option<MenuItemModel>, ServiceError> {
        Ok(MenuItem::find_by_id(id).one(self.base.get_db()).await?)
    }

    async fn insert_item(&self, item: MenuItemModel) -> Result<MenuItemModel, ServiceError> {
        MenuItem::insert(item.into_active_model())
            .exec_with_returning(self.base.get_db())
            .await
            .map_err(ServiceError::from_db)
    }

    async fn update_item(&self, item: MenuItemModel) -> Result<MenuItemModel, ServiceError> {
        let active = MenuItemActiveModel {
            id: Unchanged(item.id),
            category_id: Set(item.category_id),
            name: Set(item.name),
            description: Set(item.description),
            price: Set(item.price),
            image_url: Set(item.image_url),
            is_available: Set(item.is_available),
            created_at: Unchanged(item.created_at),
            updated_at: Set(item.updated_at),
        };
        active
            .update(self.base.get_db())
            .await
            .map_err(ServiceError::from_db)
    }

    async fn delete_item(&self, id: Uuid) -> Result<u64, ServiceError> {
        let result = MenuItem::delete_by_id(id).exec(self.base.get_db()).await?;
        Ok(result.rows_affected)
    }
}
