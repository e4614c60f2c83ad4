//! Shared builders for service unit tests.

use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::auth::{AuthUser, ADMIN_ROLE};
use crate::entities::purchase::{
    Model as PurchaseModel, OrderItems, OrderLine, OrderStatus, PaymentMethod, PaymentStatus,
};

pub fn user(id: Uuid) -> AuthUser {
    AuthUser {
        user_id: id,
        name: Some("Sari".into()),
        email: None,
        roles: vec![],
    }
}

pub fn admin() -> AuthUser {
    AuthUser {
        roles: vec![ADMIN_ROLE.to_string()],
        ..user(Uuid::new_v4())
    }
}

pub fn lines() -> Vec<OrderLine> {
    vec![
        OrderLine {
            menu_item_id: Uuid::new_v4(),
            name: "Kopi Susu".into(),
            price: 22_000,
            quantity: 2,
            image_url: None,
        },
        OrderLine {
            menu_item_id: Uuid::new_v4(),
            name: "Roti Bakar".into(),
            price: 10_000,
            quantity: 1,
            image_url: None,
        },
    ]
}

/// Unpaid `Diproses` purchase owned by `owner`.
pub fn purchase(owner: Uuid) -> PurchaseModel {
    let now = Utc::now();
    let items = OrderItems(lines());
    PurchaseModel {
        id: Uuid::new_v4(),
        user_id: owner,
        customer_name: "Sari".into(),
        phone: "081234567890".into(),
        address: None,
        total_amount: items.total_amount().unwrap(),
        items,
        payment_method: PaymentMethod::Qris,
        status: OrderStatus::Diproses,
        payment_status: PaymentStatus::Pending,
        payment_deadline: now + Duration::hours(24),
        payment_proof_id: None,
        created_at: now,
        updated_at: now,
    }
}
