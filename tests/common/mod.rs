#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::Notify;

use cartsync::{
    Cart, CartConfig, CartGateway, CartItem, CartProduct, CartStatus, CartStore, GatewayError,
    StorageError,
};

/// Scripted gateway double: responses are consumed in push order and
/// every call is recorded. An optional gate blocks each call until
/// notified, for interleaving tests.
pub struct MockGateway {
    responses: Mutex<VecDeque<Result<Cart, GatewayError>>>,
    calls: Mutex<Vec<String>>,
    gate: Mutex<Option<Arc<Notify>>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            gate: Mutex::new(None),
        }
    }

    pub fn push(&self, response: Result<Cart, GatewayError>) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub fn set_gate(&self, gate: Arc<Notify>) {
        *self.gate.lock().unwrap() = Some(gate);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    async fn respond(&self, call: String) -> Result<Cart, GatewayError> {
        self.calls.lock().unwrap().push(call);
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Err(GatewayError::Service {
                    status: 500,
                    message: "mock gateway exhausted".to_string(),
                })
            })
    }
}

#[async_trait]
impl CartGateway for MockGateway {
    async fn get_cart(&self) -> Result<Cart, GatewayError> {
        self.respond("get_cart".to_string()).await
    }

    async fn add_to_cart(&self, product_id: &str, quantity: u32) -> Result<Cart, GatewayError> {
        self.respond(format!("add_to_cart {} {}", product_id, quantity))
            .await
    }

    async fn update_quantity(
        &self,
        product_id: &str,
        quantity: u32,
    ) -> Result<Cart, GatewayError> {
        self.respond(format!("update_quantity {} {}", product_id, quantity))
            .await
    }

    async fn remove_from_cart(&self, product_id: &str) -> Result<Cart, GatewayError> {
        self.respond(format!("remove_from_cart {}", product_id)).await
    }

    async fn clear_cart(&self) -> Result<Cart, GatewayError> {
        self.respond("clear_cart".to_string()).await
    }
}

/// Store double whose writes always fail; reads succeed empty.
pub struct FailingStore;

impl CartStore for FailingStore {
    fn load(&self) -> Result<Option<Cart>, StorageError> {
        Ok(None)
    }

    fn save(&self, _cart: Option<&Cart>) -> Result<(), StorageError> {
        Err(StorageError::Unavailable("quota exceeded".to_string()))
    }

    fn clear(&self) -> Result<(), StorageError> {
        Err(StorageError::Unavailable("quota exceeded".to_string()))
    }

    fn load_guest_id(&self) -> Result<Option<String>, StorageError> {
        Ok(None)
    }

    fn save_guest_id(&self, _id: &str) -> Result<(), StorageError> {
        Err(StorageError::Unavailable("quota exceeded".to_string()))
    }
}

pub fn test_config() -> CartConfig {
    CartConfig::new("https://cart.example.com/api/")
}

pub fn product(id: &str, price: Decimal) -> CartProduct {
    CartProduct {
        id: id.to_string(),
        name: format!("Product {}", id),
        price,
        image: format!("https://cdn.example.com/{}.jpg", id),
        sku: format!("SKU-{}", id.to_uppercase()),
    }
}

/// Builds a server-side cart with consistent cached totals.
pub fn server_cart(id: &str, user_id: &str, lines: &[(&str, Decimal, u32)]) -> Cart {
    let items: Vec<CartItem> = lines
        .iter()
        .map(|(pid, price, qty)| CartItem {
            id: format!("{}_{}", id, pid),
            product_id: pid.to_string(),
            product: product(pid, *price),
            quantity: *qty,
            added_at: Utc::now(),
        })
        .collect();
    let total_items = items.iter().map(|i| i.quantity).sum();
    let total_price = items.iter().map(|i| i.line_total()).sum();
    Cart {
        id: id.to_string(),
        user_id: user_id.to_string(),
        items,
        total_items,
        total_price,
        updated_at: Utc::now(),
        status: CartStatus::Active,
    }
}
