use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use tracing::instrument;
use url::Url;

use crate::config::CartConfig;
use crate::errors::{CartError, GatewayError};
use crate::models::Cart;

use super::CartGateway;

/// Supplies the bearer credential attached to gateway calls. Token
/// refresh-on-401 belongs to the collaborating auth layer; this only
/// reads whatever credential is current.
pub trait TokenProvider: Send + Sync {
    fn bearer_token(&self) -> Option<String>;
}

/// Fixed token, useful for tests and single-shot sessions.
pub struct StaticToken(pub String);

impl TokenProvider for StaticToken {
    fn bearer_token(&self) -> Option<String> {
        Some(self.0.clone())
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AddItemRequest<'a> {
    product_id: &'a str,
    quantity: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateQuantityRequest {
    quantity: u32,
}

/// REST client for the remote cart service.
///
/// Contract: `GET /cart`, `POST /cart/items`, `PUT /cart/items/{id}`,
/// `DELETE /cart/items/{id}`, `DELETE /cart`; each responds with the
/// authoritative cart as JSON.
pub struct HttpCartGateway {
    client: Client,
    base_url: Url,
    token_provider: Arc<dyn TokenProvider>,
}

impl HttpCartGateway {
    /// Build a gateway using a default reqwest client with the
    /// configured timeout.
    pub fn new(
        config: &CartConfig,
        token_provider: Arc<dyn TokenProvider>,
    ) -> Result<Self, CartError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.gateway_timeout_secs))
            .build()
            .map_err(|e| CartError::Config(format!("failed to construct http client: {}", e)))?;
        Self::with_client(config, token_provider, client)
    }

    /// Build a gateway from an existing client (useful for testing).
    pub fn with_client(
        config: &CartConfig,
        token_provider: Arc<dyn TokenProvider>,
        client: Client,
    ) -> Result<Self, CartError> {
        let mut base_url = Url::parse(&config.gateway_url)
            .map_err(|e| CartError::Config(format!("invalid gateway url: {}", e)))?;
        // Url::join treats a non-slash-terminated base as a file.
        if !base_url.path().ends_with('/') {
            base_url.set_path(&format!("{}/", base_url.path()));
        }
        Ok(Self {
            client,
            base_url,
            token_provider,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, GatewayError> {
        self.base_url
            .join(path)
            .map_err(|e| GatewayError::MalformedResponse(format!("bad endpoint {}: {}", path, e)))
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let mut builder = self.client.request(method, url);
        if let Some(token) = self.token_provider.bearer_token() {
            builder = builder.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        builder
    }

    /// Maps a gateway response to the authoritative cart or the error
    /// taxonomy: 401/403 unauthorized, 404 product-not-found, 400/422
    /// invalid-quantity, 5xx service error.
    async fn read_cart(response: Response, subject: &str) -> Result<Cart, GatewayError> {
        let status = response.status();
        if status.is_success() {
            return response
                .json::<Cart>()
                .await
                .map_err(|e| GatewayError::MalformedResponse(e.to_string()));
        }

        let message = response.text().await.unwrap_or_default();
        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => GatewayError::Unauthorized,
            StatusCode::NOT_FOUND => GatewayError::ProductNotFound(subject.to_string()),
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                GatewayError::InvalidQuantity(if message.is_empty() {
                    format!("rejected quantity for {}", subject)
                } else {
                    message
                })
            }
            _ => GatewayError::Service {
                status: status.as_u16(),
                message,
            },
        })
    }
}

#[async_trait]
impl CartGateway for HttpCartGateway {
    #[instrument(skip(self))]
    async fn get_cart(&self) -> Result<Cart, GatewayError> {
        let url = self.endpoint("cart")?;
        let response = self.request(Method::GET, url).send().await?;
        Self::read_cart(response, "cart").await
    }

    #[instrument(skip(self))]
    async fn add_to_cart(&self, product_id: &str, quantity: u32) -> Result<Cart, GatewayError> {
        let url = self.endpoint("cart/items")?;
        let response = self
            .request(Method::POST, url)
            .json(&AddItemRequest {
                product_id,
                quantity,
            })
            .send()
            .await?;
        Self::read_cart(response, product_id).await
    }

    #[instrument(skip(self))]
    async fn update_quantity(
        &self,
        product_id: &str,
        quantity: u32,
    ) -> Result<Cart, GatewayError> {
        let url = self.endpoint(&format!("cart/items/{}", product_id))?;
        let response = self
            .request(Method::PUT, url)
            .json(&UpdateQuantityRequest { quantity })
            .send()
            .await?;
        Self::read_cart(response, product_id).await
    }

    #[instrument(skip(self))]
    async fn remove_from_cart(&self, product_id: &str) -> Result<Cart, GatewayError> {
        let url = self.endpoint(&format!("cart/items/{}", product_id))?;
        let response = self.request(Method::DELETE, url).send().await?;
        Self::read_cart(response, product_id).await
    }

    #[instrument(skip(self))]
    async fn clear_cart(&self) -> Result<Cart, GatewayError> {
        let url = self.endpoint("cart")?;
        let response = self.request(Method::DELETE, url).send().await?;
        Self::read_cart(response, "cart").await
    }
}
