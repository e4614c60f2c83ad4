use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::entities::category::Model as CategoryModel;
use crate::entities::menu_item::Model as MenuItemModel;
use crate::errors::ServiceError;
use crate::repositories::MenuStore;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CategoryView {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
}

impl From<CategoryModel> for CategoryView {
    fn from(c: CategoryModel) -> Self {
        Self {
            id: c.id,
            name: c.name,
            description: c.description,
            sort_order: c.sort_order,
            created_at: c.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MenuItemView {
    pub id: Uuid,
    pub category_id: Option<Uuid>,
    pub name: String,
    pub description: Option<String>,
    pub price: i64,
    pub image_url: Option<String>,
    pub is_available: bool,
    pub updated_at: DateTime<Utc>,
}

impl From<MenuItemModel> for MenuItemView {
    fn from(m: MenuItemModel) -> Self {
        Self {
            id: m.id,
            category_id: m.category_id,
            name: m.name,
            description: m.description,
            price: m.price,
            image_url: m.image_url,
            is_available: m.is_available,
            updated_at: m.updated_at,
        }
    }
}

/// Public menu grouped by category; uncategorised items come last.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MenuSection {
    pub category: Option<CategoryView>,
    pub items: Vec<MenuItemView>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CategoryInput {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(max = 500))]
    pub description: Option<String>,
    #[serde(default)]
    pub sort_order: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct MenuItemInput {
    pub category_id: Option<Uuid>,
    #[validate(length(min = 1, max = 150))]
    pub name: String,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
    #[validate(range(
        min = 1,
        max = 100000000,
        message = "Harga harus antara 1 dan 100.000.000"
    ))]
    pub price: i64,
    #[validate(url)]
    pub image_url: Option<String>,
    #[serde(default = "default_available")]
    pub is_available: bool,
}

fn default_available() -> bool {
    true
}

pub struct MenuService {
    store: Arc<dyn MenuStore>,
}

impl MenuService {
    pub fn new(store: Arc<dyn MenuStore>) -> Self {
        Self { store }
    }

    pub async fn public_menu(&self) -> Result<Vec<MenuSection>, ServiceError> {
        let categories = self.store.list_categories().await?;
        let items = self.store.list_items(true).await?;
        Ok(group_by_category(categories, items))
    }

    pub async fn list_categories(&self) -> Result<Vec<CategoryView>, ServiceError> {
        Ok(self
            .store
            .list_categories()
            .await?
            .into_iter()
            .map(CategoryView::from)
            .collect())
    }

    pub async fn list_items(&self) -> Result<Vec<MenuItemView>, ServiceError> {
        Ok(self
            .store
            .list_items(false)
            .await?
            .into_iter()
            .map(MenuItemView::from)
            .collect())
    }

    #[instrument(skip(self, input))]
    pub async fn create_category(&self, input: CategoryInput) -> Result<CategoryView, ServiceError> {
        input.validate()?;
        let created = self
            .store
            .insert_category(CategoryModel {
                id: Uuid::new_v4(),
                name: input.name.trim().to_string(),
                description: input.description,
                sort_order: input.sort_order,
                created_at: Utc::now(),
            })
            .await?;
        info!(category_id = %created.id, "category created");
        Ok(created.into())
    }

    #[instrument(skip(self, input))]
    pub async fn update_category(
        &self,
        id: Uuid,
        input: CategoryInput,
    ) -> Result<CategoryView, ServiceError> {
        input.validate()?;
        let mut category = self
            .store
            .find_category(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Kategori {id} tidak ditemukan")))?;
        category.name = input.name.trim().to_string();
        category.description = input.description;
        category.sort_order = input.sort_order;
        Ok(self.store.update_category(category).await?.into())
    }

    pub async fn delete_category(&self, id: Uuid) -> Result<(), ServiceError> {
        if self.store.delete_category(id).await? == 0 {
            return Err(ServiceError::NotFound(format!("Kategori {id} tidak ditemukan")));
        }
        info!(category_id = %id, "category deleted");
        Ok(())
    }

    async fn ensure_category(&self, category_id: Option<Uuid>) -> Result<(), ServiceError> {
        if let Some(id) = category_id {
            if self.store.find_category(id).await?.is_none() {
                return Err(ServiceError::field("category_id", "Kategori tidak ditemukan"));
            }
        }
        Ok(())
    }

    #[instrument(skip(self, input))]
    pub async fn create_item(&self, input: MenuItemInput) -> Result<MenuItemView, ServiceError> {
        input.validate()?;
        self.ensure_category(input.category_id).await?;
        let now = Utc::now();
        let created = self
            .store
            .insert_item(MenuItemModel {
                id: Uuid::new_v4(),
                category_id: input.category_id,
                name: input.name.trim().to_string(),
                description: input.description,
                price: input.price,
                image_url: input.image_url,
                is_available: input.is_available,
                created_at: now,
                updated_at: now,
            })
            .await?;
        info!(menu_item_id = %created.id, price = created.price, "menu item created");
        Ok(created.into())
    }

    #[instrument(skip(self, input))]
    pub async fn update_item(
        &self,
        id: Uuid,
        input: MenuItemInput,
    ) -> Result<MenuItemView, ServiceError> {
        input.validate()?;
        self.ensure_category(input.category_id).await?;
        let mut item = self
            .store
            .find_item(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Menu {id} tidak ditemukan")))?;
        item.category_id = input.category_id;
        item.name = input.name.trim().to_string();
        item.description = input.description;
        item.price = input.price;
        item.image_url = input.image_url;
        item.is_available = input.is_available;
        item.updated_at = Utc::now();
        Ok(self.store.update_item(item).await?.into())
    }

    pub async fn delete_item(&self, id: Uuid) -> Result<(), ServiceError> {
        if self.store.delete_item(id).await? == 0 {
            return Err(ServiceError::NotFound(format!("Menu {id} tidak ditemukan")));
        }
        info!(menu_item_id = %id, "menu item deleted");
        Ok(())
    }
}

fn group_by_category(categories: Vec<CategoryModel>, items: Vec<MenuItemModel>) -> Vec<MenuSection> {
    let mut by_category: HashMap<Option<Uuid>, Vec<MenuItemView>> = HashMap::new();
    for item in items {
        by_category
            .entry(item.category_id)
            .or_default()
            .push(item.into());
    }

    let mut sections: Vec<MenuSection> = categories
        .into_iter()
        .filter_map(|category| {
            by_category.remove(&Some(category.id)).map(|items| MenuSection {
                category: Some(category.into()),
                items,
            })
        })
        .collect();

    // Items pointing at a deleted category are shown with the uncategorised ones.
    let mut rest: Vec<MenuItemView> = by_category.into_values().flatten().collect();
    if !rest.is_empty() {
        rest.sort_by(|a, b| a.name.cmp(&b.name));
        sections.push(MenuSection {
            category: None,
            items: rest,
        });
    }
    sections
}
