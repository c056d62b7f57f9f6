//! Remote cart gateway: the black-box service that owns the
//! authoritative cart in authenticated mode. Every call returns the
//! server's full cart representation; the reconciler applies it
//! verbatim and never recomputes totals for remote responses.

use async_trait::async_trait;

use crate::errors::GatewayError;
use crate::models::Cart;

pub mod http;

pub use http::{HttpCartGateway, StaticToken, TokenProvider};

#[async_trait]
pub trait CartGateway: Send + Sync {
    async fn get_cart(&self) -> Result<Cart, GatewayError>;
    async fn add_to_cart(&self, product_id: &str, quantity: u32) -> Result<Cart, GatewayError>;
    async fn update_quantity(&self, product_id: &str, quantity: u32)
        -> Result<Cart, GatewayError>;
    async fn remove_from_cart(&self, product_id: &str) -> Result<Cart, GatewayError>;
    async fn clear_cart(&self) -> Result<Cart, GatewayError>;
}
