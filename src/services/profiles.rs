use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::auth::AuthUser;
use crate::entities::profile::Model as ProfileModel;
use crate::errors::ServiceError;
use crate::repositories::ProfileStore;

pub const CUSTOMER_ROLE: &str = "customer";

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpsertProfileRequest {
    #[validate(length(min = 2, max = 120, message = "Nama minimal 2 karakter"))]
    pub full_name: String,
    #[validate(length(min = 10, max = 20, message = "Nomor telepon minimal 10 digit"))]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProfileView {
    pub id: Uuid,
    pub full_name: String,
    pub phone: Option<String>,
    pub role: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ProfileModel> for ProfileView {
    fn from(p: ProfileModel) -> Self {
        Self {
            id: p.id,
            full_name: p.full_name,
            phone: p.phone,
            role: p.role,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

pub struct ProfileService {
    store: Arc<dyn ProfileStore>,
}

impl ProfileService {
    pub fn new(store: Arc<dyn ProfileStore>) -> Self {
        Self { store }
    }

    pub async fn get(&self, user: &AuthUser) -> Result<ProfileModel, ServiceError> {
        self.store
            .find(user.user_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Profil belum dibuat".to_string()))
    }

    /// The role mirrors the token; clients cannot set it.
    pub async fn upsert(
        &self,
        user: &AuthUser,
        request: UpsertProfileRequest,
    ) -> Result<ProfileModel, ServiceError> {
        request.validate()?;
        let now = Utc::now();
        let role = if user.is_admin() {
            crate::auth::ADMIN_ROLE
        } else {
            CUSTOMER_ROLE
        };
        let saved = self
            .store
            .upsert(ProfileModel {
                id: user.user_id,
                full_name: request.full_name.trim().to_string(),
                phone: request.phone.map(|p| p.trim().to_string()),
                role: role.to_string(),
                created_at: now,
                updated_at: now,
            })
            .await?;
        info!(user_id = %saved.id, "profile saved");
        Ok(saved)
    }
}
