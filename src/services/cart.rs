use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entities::menu_item::Model as MenuItemModel;
use crate::entities::purchase::OrderLine;
use crate::errors::ServiceError;
use crate::repositories::MenuStore;

const MAX_SESSION_ID_LEN: usize = 128;
/// Largest quantity a single cart line may hold
pub const MAX_LINE_QUANTITY: u32 = 999;

fn total_too_large() -> ServiceError {
    ServiceError::field("quantity", "Total keranjang terlalu besar")
}

fn quantity_too_large() -> ServiceError {
    ServiceError::field(
        "quantity",
        format!("Jumlah per item maksimal {}", MAX_LINE_QUANTITY),
    )
}

/// A selected menu item and how many of it are in the cart
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CartItem {
    /// Menu item id
    pub id: Uuid,
    pub name: String,
    pub price: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub quantity: u32,
}

impl CartItem {
    /// `None` when the product does not fit in an `i64`.
    pub fn line_total(&self) -> Option<i64> {
        self.price.checked_mul(i64::from(self.quantity))
    }
}

impl From<&CartItem> for OrderLine {
    fn from(item: &CartItem) -> Self {
        OrderLine {
            menu_item_id: item.id,
            name: item.name.clone(),
            price: item.price,
            quantity: item.quantity,
            image_url: item.image_url.clone(),
        }
    }
}

/// Catalog data needed to put an item in the cart
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartProduct {
    pub id: Uuid,
    pub name: String,
    pub price: i64,
    pub image_url: Option<String>,
}

impl From<MenuItemModel> for CartProduct {
    fn from(item: MenuItemModel) -> Self {
        Self {
            id: item.id,
            name: item.name,
            price: item.price,
            image_url: item.image_url,
        }
    }
}

/// What an `add` did, surfaced to the caller as a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CartChange {
    Added,
    Incremented { quantity: u32 },
}

impl CartChange {
    pub fn message(&self, name: &str) -> String {
        match self {
            CartChange::Added => format!("{} ditambahkan ke keranjang", name),
            CartChange::Incremented { quantity } => {
                format!("Jumlah {} di keranjang menjadi {}", name, quantity)
            }
        }
    }
}

/// In-memory cart: insertion-ordered items, each id at most once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cart {
    items: Vec<CartItem>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn add(&mut self, product: CartProduct) -> Result<CartChange, ServiceError> {
        if let Some(existing) = self.items.iter_mut().find(|i| i.id == product.id) {
            if existing.quantity >= MAX_LINE_QUANTITY {
                return Err(quantity_too_large());
            }
            existing.quantity += 1;
            return Ok(CartChange::Incremented {
                quantity: existing.quantity,
            });
        }

        self.items.push(CartItem {
            id: product.id,
            name: product.name,
            price: product.price,
            image_url: product.image_url,
            quantity: 1,
        });
        Ok(CartChange::Added)
    }

    pub fn remove(&mut self, id: Uuid) -> Option<CartItem> {
        let index = self.items.iter().position(|i| i.id == id)?;
        Some(self.items.remove(index))
    }

    /// A quantity below one removes the item; callers bound the upper end.
    pub fn set_quantity(&mut self, id: Uuid, quantity: u32) -> Option<CartItem> {
        if quantity < 1 {
            return self.remove(id);
        }
        let item = self.items.iter_mut().find(|i| i.id == id)?;
        item.quantity = quantity.min(MAX_LINE_QUANTITY);
        Some(item.clone())
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn total_items(&self) -> u64 {
        self.items.iter().map(|i| u64::from(i.quantity)).sum()
    }

    /// Sum of line totals, `None` on overflow.
    pub fn total_price(&self) -> Option<i64> {
        self.items
            .iter()
            .try_fold(0i64, |acc, item| acc.checked_add(item.line_total()?))
    }

    pub fn to_order_lines(&self) -> Vec<OrderLine> {
        self.items.iter().map(OrderLine::from).collect()
    }
}

/// Cart contents plus totals, as returned to clients
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CartSummary {
    pub items: Vec<CartItem>,
    pub total_items: u64,
    pub total_price: i64,
}

impl TryFrom<&Cart> for CartSummary {
    type Error = ServiceError;

    fn try_from(cart: &Cart) -> Result<Self, Self::Error> {
        Ok(Self {
            items: cart.items.clone(),
            total_items: cart.total_items(),
            total_price: cart.total_price().ok_or_else(total_too_large)?,
        })
    }
}

#[derive(Debug)]
struct TouchedCart {
    cart: Cart,
    touched_at: Instant,
}

impl Default for TouchedCart {
    fn default() -> Self {
        Self {
            cart: Cart::default(),
            touched_at: Instant::now(),
        }
    }
}

/// Carts keyed by client-chosen session id; process memory only.
///
/// Only [`CartRegistry::update`] creates an entry. Carts left idle are
/// dropped by [`CartRegistry::evict_idle`].
#[derive(Debug, Default)]
pub struct CartRegistry {
    carts: DashMap<String, TouchedCart>,
}

impl CartRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self, session: &str) -> Cart {
        self.carts
            .get(session)
            .map(|slot| slot.cart.clone())
            .unwrap_or_default()
    }

    /// Runs `f` against the session's cart, creating it if needed, while
    /// holding its shard lock.
    pub fn update<R>(&self, session: &str, f: impl FnOnce(&mut Cart) -> R) -> R {
        let mut slot = self.carts.entry(session.to_string()).or_default();
        slot.touched_at = Instant::now();
        f(&mut slot.cart)
    }

    /// Like [`CartRegistry::update`] but `None` for a session with no cart.
    pub fn update_existing<R>(&self, session: &str, f: impl FnOnce(&mut Cart) -> R) -> Option<R> {
        let mut slot = self.carts.get_mut(session)?;
        slot.touched_at = Instant::now();
        Some(f(&mut slot.cart))
    }

    pub fn clear(&self, session: &str) {
        self.carts.remove(session);
    }

    /// Drops carts untouched for longer than `max_idle`; returns how many.
    pub fn evict_idle(&self, max_idle: Duration) -> usize {
        let before = self.carts.len();
        self.carts
            .retain(|_, slot| slot.touched_at.elapsed() <= max_idle);
        before.saturating_sub(self.carts.len())
    }

    pub fn len(&self) -> usize {
        self.carts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.carts.is_empty()
    }
}

fn not_in_cart(menu_item_id: Uuid) -> ServiceError {
    ServiceError::NotFound(format!("Item {} is not in the cart", menu_item_id))
}

fn validate_session(session: &str) -> Result<(), ServiceError> {
    if session.trim().is_empty() || session.len() > MAX_SESSION_ID_LEN {
        return Err(ServiceError::ValidationError(
            "cart session id must be 1-128 characters".to_string(),
        ));
    }
    Ok(())
}

/// Cart operations backed by the menu for prices and availability
#[derive(Clone)]
pub struct CartService {
    registry: Arc<CartRegistry>,
    menu: Arc<dyn MenuStore>,
}

impl CartService {
    pub fn new(registry: Arc<CartRegistry>, menu: Arc<dyn MenuStore>) -> Self {
        Self { registry, menu }
    }

    pub fn registry(&self) -> &Arc<CartRegistry> {
        &self.registry
    }

    pub fn summary(&self, session: &str) -> Result<CartSummary, ServiceError> {
        validate_session(session)?;
        CartSummary::try_from(&self.registry.snapshot(session))
    }

    /// Adds one unit of a menu item. Price, name and image come from the menu.
    #[instrument(skip(self))]
    pub async fn add_item(
        &self,
        session: &str,
        menu_item_id: Uuid,
    ) -> Result<(CartSummary, CartChange, String), ServiceError> {
        validate_session(session)?;

        let item = self
            .menu
            .find_item(menu_item_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Menu item {} not found", menu_item_id)))?;
        if !item.is_available {
            return Err(ServiceError::InvalidOperation(format!(
                "{} sedang tidak tersedia",
                item.name
            )));
        }

        let name = item.name.clone();
        let (change, summary) = self.registry.update(session, |cart| {
            let mut next = cart.clone();
            let change = next.add(CartProduct::from(item))?;
            let summary = CartSummary::try_from(&next)?;
            *cart = next;
            Ok::<_, ServiceError>((change, summary))
        })?;

        info!(session, %menu_item_id, ?change, "cart item added");
        Ok((summary, change, change.message(&name)))
    }

    pub fn set_quantity(
        &self,
        session: &str,
        menu_item_id: Uuid,
        quantity: u32,
    ) -> Result<CartSummary, ServiceError> {
        validate_session(session)?;
        if quantity > MAX_LINE_QUANTITY {
            return Err(quantity_too_large());
        }
        self.registry
            .update_existing(session, |cart| {
                let mut next = cart.clone();
                next.set_quantity(menu_item_id, quantity)
                    .ok_or_else(|| not_in_cart(menu_item_id))?;
                let summary = CartSummary::try_from(&next)?;
                *cart = next;
                Ok(summary)
            })
            .unwrap_or_else(|| Err(not_in_cart(menu_item_id)))
    }

    pub fn remove_item(&self, session: &str, menu_item_id: Uuid) -> Result<CartSummary, ServiceError> {
        validate_session(session)?;
        self.registry
            .update_existing(session, |cart| {
                cart.remove(menu_item_id)
                    .ok_or_else(|| not_in_cart(menu_item_id))?;
                CartSummary::try_from(&*cart)
            })
            .unwrap_or_else(|| Err(not_in_cart(menu_item_id)))
    }

    pub fn clear(&self, session: &str) -> Result<(), ServiceError> {
        validate_session(session)?;
        self.registry.clear(session);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::MockMenuStore;
    use assert_matches::assert_matches;
    use chrono::Utc;
    use proptest::prelude::*;

    fn product(price: i64) -> CartProduct {
        CartProduct {
            id: Uuid::new_v4(),
            name: "Es Teh".into(),
            price,
            image_url: None,
        }
    }

    #[test]
    fn second_add_increments_instead_of_duplicating() {
        let mut cart = Cart::new();
        let p = product(8_000);
        assert_eq!(cart.add(p.clone()).unwrap(), CartChange::Added);
        assert_eq!(cart.add(p).unwrap(), CartChange::Incremented { quantity: 2 });
        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.total_items(), 2);
    }

    #[test]
    fn totals_match_example_order() {
        let mut cart = Cart::new();
        let coffee = product(22_000);
        let tea = product(10_000);
        cart.add(coffee.clone()).unwrap();
        cart.add(coffee).unwrap();
        cart.add(tea).unwrap();
        assert_eq!(cart.total_price(), Some(54_000));
        assert_eq!(cart.total_items(), 3);
    }

    #[test]
    fn set_quantity_overwrites() {
        let mut cart = Cart::new();
        let p = product(5_000);
        cart.add(p.clone()).unwrap();
        cart.set_quantity(p.id, 4);
        assert_eq!(cart.total_items(), 4);
        assert_eq!(cart.total_price(), Some(20_000));
    }

    #[test]
    fn clear_empties_cart() {
        let mut cart = Cart::new();
        cart.add(product(1_000)).unwrap();
        cart.clear();
        assert!(cart.is_empty());
        assert_eq!(cart.total_price(), Some(0));
    }

    #[test]
    fn line_quantity_is_capped() {
        let mut cart = Cart::new();
        let p = product(1_000);
        cart.add(p.clone()).unwrap();
        cart.set_quantity(p.id, MAX_LINE_QUANTITY);
        assert_matches!(
            cart.add(p.clone()),
            Err(ServiceError::FieldValidation { ref field, .. }) if field == "quantity"
        );
        cart.set_quantity(p.id, u32::MAX);
        assert_eq!(cart.total_items(), u64::from(MAX_LINE_QUANTITY));
    }

    #[test]
    fn overflowing_total_is_reported_not_wrapped() {
        let mut cart = Cart::new();
        let p = product(i64::MAX / 2);
        cart.add(p.clone()).unwrap();
        cart.set_quantity(p.id, 3);
        assert_eq!(cart.total_price(), None);
        assert_matches!(
            CartSummary::try_from(&cart),
            Err(ServiceError::FieldValidation { .. })
        );
    }

    proptest! {
        #[test]
        fn repeated_add_counts_every_unit(price in 1i64..1_000_000, n in 1u32..200) {
            let mut cart = Cart::new();
            let p = product(price);
            for _ in 0..n {
                cart.add(p.clone()).unwrap();
            }
            prop_assert_eq!(cart.total_items(), u64::from(n));
            prop_assert_eq!(cart.total_price(), Some(price * i64::from(n)));
            prop_assert_eq!(cart.items().len(), 1);
        }

        #[test]
        fn zero_quantity_is_removal(adds in 1u32..10, others in 0usize..4) {
            let target = product(12_000);
            let mut base = Cart::new();
            for _ in 0..others {
                base.add(product(3_000)).unwrap();
            }
            for _ in 0..adds {
                base.add(target.clone()).unwrap();
            }

            let mut via_zero = base.clone();
            let mut via_remove = base;
            via_zero.set_quantity(target.id, 0);
            via_remove.remove(target.id);
            prop_assert_eq!(via_zero, via_remove);
        }
    }

    fn menu_item(available: bool) -> MenuItemModel {
        let now = Utc::now();
        MenuItemModel {
            id: Uuid::new_v4(),
            category_id: None,
            name: "Kopi Susu".into(),
            description: None,
            price: 22_000,
            image_url: Some("http://img/kopi.png".into()),
            is_available: available,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn add_item_uses_menu_price() {
        let item = menu_item(true);
        let id = item.id;
        let mut menu = MockMenuStore::new();
        menu.expect_find_item()
            .returning(move |_| Ok(Some(item.clone())));

        let service = CartService::new(Arc::new(CartRegistry::new()), Arc::new(menu));
        let (summary, change, message) = service.add_item("s1", id).await.unwrap();
        assert_eq!(change, CartChange::Added);
        assert_eq!(summary.total_price, 22_000);
        assert!(message.contains("Kopi Susu"));

        let (summary, change, _) = service.add_item("s1", id).await.unwrap();
        assert_eq!(change, CartChange::Incremented { quantity: 2 });
        assert_eq!(summary.total_items, 2);
    }

    #[tokio::test]
    async fn unavailable_items_are_rejected() {
        let item = menu_item(false);
        let id = item.id;
        let mut menu = MockMenuStore::new();
        menu.expect_find_item()
            .returning(move |_| Ok(Some(item.clone())));

        let registry = Arc::new(CartRegistry::new());
        let service = CartService::new(registry.clone(), Arc::new(menu));
        let err = service.add_item("s1", id).await.unwrap_err();
        assert_matches!(err, ServiceError::InvalidOperation(_));
        assert!(registry.snapshot("s1").is_empty());
    }

    #[tokio::test]
    async fn removing_unknown_item_is_not_found() {
        let service = CartService::new(
            Arc::new(CartRegistry::new()),
            Arc::new(MockMenuStore::new()),
        );
        assert_matches!(
            service.remove_item("s1", Uuid::new_v4()),
            Err(ServiceError::NotFound(_))
        );
        assert_matches!(service.summary(""), Err(ServiceError::ValidationError(_)));
    }

    #[test]
    fn misses_on_unknown_sessions_do_not_create_carts() {
        let registry = Arc::new(CartRegistry::new());
        let service = CartService::new(registry.clone(), Arc::new(MockMenuStore::new()));

        assert_matches!(
            service.set_quantity("ghost-1", Uuid::new_v4(), 2),
            Err(ServiceError::NotFound(_))
        );
        assert_matches!(
            service.remove_item("ghost-2", Uuid::new_v4()),
            Err(ServiceError::NotFound(_))
        );
        assert!(service.summary("ghost-3").unwrap().items.is_empty());
        assert!(registry.is_empty());
    }

    #[test]
    fn set_quantity_above_cap_is_rejected() {
        let registry = Arc::new(CartRegistry::new());
        let p = product(5_000);
        registry.update("s1", |cart| cart.add(p.clone())).unwrap();
        let service = CartService::new(registry.clone(), Arc::new(MockMenuStore::new()));

        assert_matches!(
            service.set_quantity("s1", p.id, MAX_LINE_QUANTITY + 1),
            Err(ServiceError::FieldValidation { .. })
        );
        assert_eq!(service.set_quantity("s1", p.id, 3).unwrap().total_price, 15_000);
    }

    #[test]
    fn idle_carts_are_evicted() {
        let registry = CartRegistry::new();
        registry.update("s1", |cart| cart.add(product(1_000))).unwrap();
        registry.update("s2", |cart| cart.add(product(2_000))).unwrap();

        assert_eq!(registry.evict_idle(Duration::from_secs(3600)), 0);
        assert_eq!(registry.len(), 2);

        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(registry.evict_idle(Duration::ZERO), 2);
        assert!(registry.is_empty());
    }
}
