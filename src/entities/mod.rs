//! SeaORM entities for the café data model
pub mod app_setting;
pub mod category;
pub mod menu_item;
pub mod payment_proof;
pub mod profile;
pub mod purchase;
pub mod reservation;

pub use app_setting::{Entity as AppSetting, Model as AppSettingModel};
pub use category::{Entity as Category, Model as CategoryModel};
pub use menu_item::{Entity as MenuItem, Model as MenuItemModel};
pub use payment_proof::{Entity as PaymentProof, Model as PaymentProofModel, VerificationStatus};
pub use profile::{Entity as Profile, Model as ProfileModel};
pub use purchase::{
    Entity as Purchase, Model as PurchaseModel, OrderItems, OrderLine, OrderStatus,
    PaymentMethod, PaymentStatus,
};
pub use reservation::{Entity as Reservation, Model as ReservationModel, ReservationStatus};
