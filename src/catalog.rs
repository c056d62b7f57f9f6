use std::collections::HashMap;

use crate::models::CartProduct;

/// Synchronous product lookup used only for guest-mode mutations.
/// Every implementation adapts its own product representation into the
/// canonical `CartProduct` at this boundary.
pub trait ProductCatalog: Send + Sync {
    fn product_by_id(&self, id: &str) -> Option<CartProduct>;
}

/// Static in-memory catalog keyed by product id.
#[derive(Default)]
pub struct InMemoryCatalog {
    products: HashMap<String, CartProduct>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_products(products: impl IntoIterator<Item = CartProduct>) -> Self {
        Self {
            products: products.into_iter().map(|p| (p.id.clone(), p)).collect(),
        }
    }

    pub fn insert(&mut self, product: CartProduct) {
        self.products.insert(product.id.clone(), product);
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

impl ProductCatalog for InMemoryCatalog {
    fn product_by_id(&self, id: &str) -> Option<CartProduct> {
        self.products.get(id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_lookup_returns_snapshot() {
        let catalog = InMemoryCatalog::with_products([CartProduct {
            id: "p1".to_string(),
            name: "Widget".to_string(),
            price: dec!(9.99),
            image: "https://cdn.example.com/p1.jpg".to_string(),
            sku: "SKU-P1".to_string(),
        }]);

        let found = catalog.product_by_id("p1").expect("present");
        assert_eq!(found.name, "Widget");
        assert!(catalog.product_by_id("missing").is_none());
    }
}
