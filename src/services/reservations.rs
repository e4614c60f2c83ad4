use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::auth::AuthUser;
use crate::entities::reservation::{Model as ReservationModel, ReservationStatus};
use crate::errors::ServiceError;
use crate::repositories::ReservationStore;

pub const MAX_GUESTS: i32 = 50;

fn validate_trimmed_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().chars().count() >= 2 {
        Ok(())
    } else {
        let mut err = ValidationError::new("length");
        err.message = Some("Nama minimal 2 karakter".into());
        Err(err)
    }
}

fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    if phone.trim().chars().count() >= 10 {
        Ok(())
    } else {
        let mut err = ValidationError::new("length");
        err.message = Some("Nomor telepon minimal 10 digit".into());
        Err(err)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateReservationRequest {
    #[validate(custom = "validate_trimmed_name")]
    pub name: String,
    #[validate(custom = "validate_phone")]
    pub phone: String,
    #[validate(email(message = "Email tidak valid"))]
    pub email: Option<String>,
    #[schema(value_type = String, format = Date)]
    pub reservation_date: NaiveDate,
    #[schema(value_type = String, example = "19:00:00")]
    pub reservation_time: NaiveTime,
    #[validate(range(min = 1, max = 50, message = "Jumlah tamu 1 sampai 50 orang"))]
    pub guest_count: i32,
    #[validate(length(max = 500))]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReservationView {
    pub id: Uuid,
    pub user_id: Uuid,
    pub customer_name: String,
    pub phone: String,
    pub email: Option<String>,
    #[schema(value_type = String, format = Date)]
    pub reservation_date: NaiveDate,
    #[schema(value_type = String)]
    pub reservation_time: NaiveTime,
    pub guest_count: i32,
    pub notes: Option<String>,
    pub status: ReservationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ReservationModel> for ReservationView {
    fn from(r: ReservationModel) -> Self {
        Self {
            id: r.id,
            user_id: r.user_id,
            customer_name: r.customer_name,
            phone: r.phone,
            email: r.email,
            reservation_date: r.reservation_date,
            reservation_time: r.reservation_time,
            guest_count: r.guest_count,
            notes: r.notes,
            status: r.status,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

pub struct ReservationService {
    store: Arc<dyn ReservationStore>,
}

impl ReservationService {
    pub fn new(store: Arc<dyn ReservationStore>) -> Self {
        Self { store }
    }

    #[instrument(skip(self, request, user), fields(user_id = %user.user_id))]
    pub async fn create(
        &self,
        request: CreateReservationRequest,
        user: &AuthUser,
    ) -> Result<ReservationModel, ServiceError> {
        request.validate()?;
        if request.reservation_date < Utc::now().date_naive() {
            return Err(ServiceError::field(
                "reservation_date",
                "Tanggal reservasi tidak boleh di masa lalu",
            ));
        }

        let now = Utc::now();
        let created = self
            .store
            .insert(ReservationModel {
                id: Uuid::new_v4(),
                user_id: user.user_id,
                customer_name: request.name.trim().to_string(),
                phone: request.phone.trim().to_string(),
                email: request.email.filter(|e| !e.trim().is_empty()),
                reservation_date: request.reservation_date,
                reservation_time: request.reservation_time,
                guest_count: request.guest_count,
                notes: request.notes,
                status: ReservationStatus::Menunggu,
                created_at: now,
                updated_at: now,
            })
            .await?;
        info!(reservation_id = %created.id, guests = created.guest_count, "reservation created");
        Ok(created)
    }

    pub async fn list_for_user(&self, user: &AuthUser) -> Result<Vec<ReservationModel>, ServiceError> {
        self.store.list_for_user(user.user_id).await
    }

    pub async fn list(
        &self,
        status: Option<ReservationStatus>,
    ) -> Result<Vec<ReservationModel>, ServiceError> {
        self.store.list(status).await
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        if self.store.delete(id).await? == 0 {
            return Err(ServiceError::NotFound(format!("Reservasi {id} tidak ditemukan")));
        }
        info!(reservation_id = %id, "reservation deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::MockReservationStore;
    use crate::services::test_fixtures::user;
    use assert_matches::assert_matches;
    use chrono::Duration;

    fn request(guests: i32, date: NaiveDate) -> CreateReservationRequest {
        CreateReservationRequest {
            name: "Budi".into(),
            phone: "081298765432".into(),
            email: Some("budi@example.com".into()),
            reservation_date: date,
            reservation_time: NaiveTime::from_hms_opt(19, 0, 0).unwrap(),
            guest_count: guests,
            notes: None,
        }
    }

    fn tomorrow() -> NaiveDate {
        (Utc::now() + Duration::days(1)).date_naive()
    }

    #[tokio::test]
    async fn valid_reservation_starts_waiting() {
        let mut store = MockReservationStore::new();
        store.expect_insert().times(1).returning(Ok);
        let service = ReservationService::new(Arc::new(store));
        let owner = Uuid::new_v4();

        let created = service.create(request(4, tomorrow()), &user(owner)).await.unwrap();
        assert_eq!(created.status, ReservationStatus::Menunggu);
        assert_eq!(created.user_id, owner);
    }

    #[tokio::test]
    async fn guest_count_bounds_are_enforced() {
        let mut store = MockReservationStore::new();
        store.expect_insert().times(0);
        let service = ReservationService::new(Arc::new(store));
        let who = user(Uuid::new_v4());

        for guests in [0, MAX_GUESTS + 1] {
            assert_matches!(
                service.create(request(guests, tomorrow()), &who).await,
                Err(ServiceError::FieldValidation { ref field, .. }) if field == "guest_count"
            );
        }
    }

    #[tokio::test]
    async fn past_date_is_rejected() {
        let mut store = MockReservationStore::new();
        store.expect_insert().times(0);
        let service = ReservationService::new(Arc::new(store));
        let yesterday = (Utc::now() - Duration::days(1)).date_naive();

        assert_matches!(
            service.create(request(2, yesterday), &user(Uuid::new_v4())).await,
            Err(ServiceError::FieldValidation { ref field, .. }) if field == "reservation_date"
        );
    }

    #[tokio::test]
    async fn invalid_email_is_rejected() {
        let mut store = MockReservationStore::new();
        store.expect_insert().times(0);
        let service = ReservationService::new(Arc::new(store));
        let mut req = request(2, tomorrow());
        req.email = Some("bukan-email".into());

        assert_matches!(
            service.create(req, &user(Uuid::new_v4())).await,
            Err(ServiceError::FieldValidation { ref field, .. }) if field == "email"
        );
    }
}
