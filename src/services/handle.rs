use std::sync::Arc;

use rust_decimal::Decimal;

use crate::errors::CartError;
use crate::models::{Cart, CartItem};

use super::reconciler::{AuthState, CartReconciler, OperationFlags};

/// Thin clonable facade over the reconciler for consuming UI code:
/// derived totals, pending flags, and the mutation methods. Holds no
/// state of its own.
#[derive(Clone)]
pub struct CartHandle {
    inner: Arc<CartReconciler>,
}

impl CartHandle {
    pub fn new(inner: Arc<CartReconciler>) -> Self {
        Self { inner }
    }

    pub async fn initialize(&self, auth: AuthState) -> Result<Cart, CartError> {
        self.inner.initialize(auth).await
    }

    pub async fn items(&self) -> Vec<CartItem> {
        self.inner.snapshot().await.items
    }

    pub async fn total_items(&self) -> u32 {
        self.inner.snapshot().await.total_items
    }

    pub async fn total_price(&self) -> Decimal {
        self.inner.snapshot().await.total_price
    }

    pub async fn cart(&self) -> Cart {
        self.inner.snapshot().await
    }

    pub fn flags(&self) -> OperationFlags {
        self.inner.flags()
    }

    pub async fn add(&self, product_id: &str) -> Result<Cart, CartError> {
        self.inner.add(product_id).await
    }

    pub async fn add_to_cart(&self, product_id: &str, quantity: u32) -> Result<Cart, CartError> {
        self.inner.add_to_cart(product_id, quantity).await
    }

    pub async fn remove_item(&self, product_id: &str) -> Result<Cart, CartError> {
        self.inner.remove_item(product_id).await
    }

    pub async fn update_quantity(
        &self,
        product_id: &str,
        quantity: u32,
    ) -> Result<Cart, CartError> {
        self.inner.update_quantity(product_id, quantity).await
    }

    pub async fn clear_cart(&self) -> Result<Cart, CartError> {
        self.inner.clear_cart().await
    }

    pub async fn login(&self, user_id: &str) -> Result<Cart, CartError> {
        self.inner.login(user_id).await
    }

    pub async fn logout(&self) -> Result<Cart, CartError> {
        self.inner.logout().await
    }
}

impl From<Arc<CartReconciler>> for CartHandle {
    fn from(inner: Arc<CartReconciler>) -> Self {
        Self::new(inner)
    }
}
