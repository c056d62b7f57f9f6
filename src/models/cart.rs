use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Prefix carried by every locally generated guest cart identifier.
pub const GUEST_ID_PREFIX: &str = "guest_";

/// Immutable snapshot of a catalog item taken at the moment it was added
/// to a cart. Owned by the embedding `CartItem`; later catalog edits do
/// not flow back into carts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartProduct {
    pub id: String,
    pub name: String,
    pub price: Decimal,
    pub image: String,
    pub sku: String,
}

/// A single line in a cart. At most one item per product id; adding the
/// same product again bumps `quantity` instead of duplicating the line.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub id: String,
    pub product_id: String,
    pub product: CartProduct,
    pub quantity: u32,
    pub added_at: DateTime<Utc>,
}

impl CartItem {
    /// Line item ids are derived, not random, so re-adding the same
    /// product in the same cart always lands on the same id.
    pub fn line_id(cart_id: &str, product_id: &str) -> String {
        format!("{}_{}", cart_id, product_id)
    }

    pub fn line_total(&self) -> Decimal {
        self.product.price * Decimal::from(self.quantity)
    }
}

/// Cart lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CartStatus {
    Active,
    Abandoned,
    Converted,
}

/// The cart itself. `total_items` and `total_price` are cached
/// projections of `items` and are recomputed after every local mutation;
/// they are never independent truth.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    pub id: String,
    /// Empty string for guest carts.
    pub user_id: String,
    pub items: Vec<CartItem>,
    pub total_items: u32,
    pub total_price: Decimal,
    pub updated_at: DateTime<Utc>,
    pub status: CartStatus,
}

impl Cart {
    /// Creates an empty active guest cart with the given identifier.
    pub fn guest(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            user_id: String::new(),
            items: Vec::new(),
            total_items: 0,
            total_price: Decimal::ZERO,
            updated_at: Utc::now(),
            status: CartStatus::Active,
        }
    }

    pub fn is_guest(&self) -> bool {
        self.user_id.is_empty()
    }

    pub fn item(&self, product_id: &str) -> Option<&CartItem> {
        self.items.iter().find(|i| i.product_id == product_id)
    }

    /// Recomputes the cached totals from the item sequence. Quantity
    /// sums saturate rather than wrap.
    pub fn recompute_totals(&mut self) {
        self.total_items = Self::summed_quantity(&self.items);
        self.total_price = self.items.iter().map(|i| i.line_total()).sum();
        self.updated_at = Utc::now();
    }

    fn summed_quantity(items: &[CartItem]) -> u32 {
        items
            .iter()
            .fold(0u32, |acc, i| acc.saturating_add(i.quantity))
    }

    /// Adds `quantity` of `product` to the cart, bumping the existing
    /// line when the product is already present. Returns `true` when a
    /// new line item was created. Totals are recomputed before return.
    pub fn upsert_item(&mut self, product: CartProduct, quantity: u32) -> bool {
        let new_line = match self.items.iter_mut().find(|i| i.product_id == product.id) {
            Some(item) => {
                item.quantity = item.quantity.saturating_add(quantity);
                false
            }
            None => {
                self.items.push(CartItem {
                    id: CartItem::line_id(&self.id, &product.id),
                    product_id: product.id.clone(),
                    product,
                    quantity,
                    added_at: Utc::now(),
                });
                true
            }
        };
        self.recompute_totals();
        new_line
    }

    /// Removes the line for `product_id`. Returns `false` when no such
    /// line exists (cart left untouched).
    pub fn remove_item(&mut self, product_id: &str) -> bool {
        let before = self.items.len();
        self.items.retain(|i| i.product_id != product_id);
        if self.items.len() == before {
            return false;
        }
        self.recompute_totals();
        true
    }

    /// Sets the quantity for `product_id`. Zero removes the line.
    /// Returns `false` when no such line exists.
    pub fn set_quantity(&mut self, product_id: &str, quantity: u32) -> bool {
        if quantity == 0 {
            return self.remove_item(product_id);
        }
        match self.items.iter_mut().find(|i| i.product_id == product_id) {
            Some(item) => {
                item.quantity = quantity;
                self.recompute_totals();
                true
            }
            None => false,
        }
    }

    /// Drops every line and zeroes the cached totals.
    pub fn clear_items(&mut self) {
        self.items.clear();
        self.recompute_totals();
    }

    /// Whether the cached totals currently match their derivation from
    /// `items`. Servers are trusted verbatim, so this only holds by
    /// construction for locally mutated carts; used in tests.
    pub fn totals_consistent(&self) -> bool {
        let items = Self::summed_quantity(&self.items);
        let price: Decimal = self.items.iter().map(|i| i.line_total()).sum();
        self.total_items == items && self.total_price == price
    }
}
