// Order & payment lifecycle
pub mod cart;
pub mod checkout;
pub mod payment_method;
pub mod payment_proof;
pub mod purchase_creator;
pub mod status;

// Back office
pub mod dashboard;
pub mod menu;
pub mod profiles;
pub mod reservations;
pub mod settings;

#[cfg(test)]
pub(crate) mod test_fixtures;
