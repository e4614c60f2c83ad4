use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::FromJsonQueryResult;
use serde::{Deserialize, Serialize};
use strum::Display;
use utoipa::ToSchema;
use uuid::Uuid;

/// Customer purchase created from a checkout snapshot
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "purchases")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: Uuid,
    pub customer_name: String,
    pub phone: String,
    #[sea_orm(nullable)]
    pub address: Option<String>,
    /// Snapshot of the cart at checkout time, never a live reference
    #[sea_orm(column_type = "Json")]
    pub items: OrderItems,
    pub total_amount: i64,
    pub payment_method: PaymentMethod,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_deadline: DateTime<Utc>,
    #[sea_orm(nullable)]
    pub payment_proof_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::payment_proof::Entity")]
    PaymentProofs,
}

impl Related<super::payment_proof::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PaymentProofs.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// The payment method may only change while nothing has been paid or attached
    pub fn payment_method_locked(&self) -> bool {
        self.payment_status != PaymentStatus::Pending
            || self.payment_proof_id.is_some()
            || self.status.is_terminal()
    }

    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.user_id == user_id
    }
}

/// One ordered line, copied from the cart
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct OrderLine {
    pub menu_item_id: Uuid,
    pub name: String,
    pub price: i64,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl OrderLine {
    pub fn line_total(&self) -> Option<i64> {
        self.price.checked_mul(i64::from(self.quantity))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct OrderItems(pub Vec<OrderLine>);

impl OrderItems {
    /// `None` when the sum does not fit in an `i64`.
    pub fn total_amount(&self) -> Option<i64> {
        self.0
            .iter()
            .try_fold(0i64, |acc, line| acc.checked_add(line.line_total()?))
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumIter,
    DeriveActiveEnum,
    Display,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PaymentMethod {
    #[sea_orm(string_value = "qris")]
    Qris,
    #[sea_orm(string_value = "bank_transfer")]
    BankTransfer,
    #[sea_orm(string_value = "ewallet")]
    Ewallet,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 3] = [
        PaymentMethod::Qris,
        PaymentMethod::BankTransfer,
        PaymentMethod::Ewallet,
    ];

    /// Parses the wire value, accepting only the fixed enumeration
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "qris" => Some(Self::Qris),
            "bank_transfer" => Some(Self::BankTransfer),
            "ewallet" => Some(Self::Ewallet),
            _ => None,
        }
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumIter,
    DeriveActiveEnum,
    Display,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
pub enum OrderStatus {
    #[sea_orm(string_value = "Diproses")]
    Diproses,
    #[sea_orm(string_value = "Selesai")]
    Selesai,
    #[sea_orm(string_value = "Dibatalkan")]
    Dibatalkan,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Selesai | Self::Dibatalkan)
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumIter,
    DeriveActiveEnum,
    Display,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PaymentStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "uploaded")]
    Uploaded,
    #[sea_orm(string_value = "verified")]
    Verified,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(price: i64, quantity: u32) -> OrderLine {
        OrderLine {
            menu_item_id: Uuid::new_v4(),
            name: "Kopi Susu".to_string(),
            price,
            quantity,
            image_url: None,
        }
    }

    #[test]
    fn order_items_total_sums_line_totals() {
        let items = OrderItems(vec![line(22_000, 2), line(10_000, 1)]);
        assert_eq!(items.total_amount(), Some(54_000));
    }

    #[test]
    fn order_items_total_reports_overflow() {
        let items = OrderItems(vec![line(i64::MAX, 2)]);
        assert_eq!(items.total_amount(), None);
    }

    #[test]
    fn payment_method_parse_only_accepts_fixed_set() {
        assert_eq!(PaymentMethod::parse("qris"), Some(PaymentMethod::Qris));
        assert_eq!(
            PaymentMethod::parse("bank_transfer"),
            Some(PaymentMethod::BankTransfer)
        );
        assert_eq!(PaymentMethod::parse("ewallet"), Some(PaymentMethod::Ewallet));
        assert_eq!(PaymentMethod::parse("cash"), None);
        assert_eq!(PaymentMethod::parse("QRIS"), None);
    }

    #[test]
    fn payment_method_serializes_as_snake_case() {
        let json = serde_json::to_string(&PaymentMethod::BankTransfer).unwrap();
        assert_eq!(json, "\"bank_transfer\"");
        assert_eq!(PaymentMethod::BankTransfer.to_string(), "bank_transfer");
    }

    #[test]
    fn terminal_statuses() {
        assert!(!OrderStatus::Diproses.is_terminal());
        assert!(OrderStatus::Selesai.is_terminal());
        assert!(OrderStatus::Dibatalkan.is_terminal());
    }
}
