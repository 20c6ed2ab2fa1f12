//! Commerce Layer HTTP client

use super::types::{StockItem, StockItemsDocument, TokenGrant, TokenRequest};
use crate::config::CommerceConfig;
use crate::InventoryApi;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::Client;
use stockroom_core::{StockroomResult, UpstreamApiError, UpstreamAuthError};

const JSON_API: &str = "application/vnd.api+json";

/// Client-credentials Commerce Layer client.
pub struct CommerceLayerClient {
    client: Client,
    config: CommerceConfig,
}

impl CommerceLayerClient {
    /// Create a new client.
    ///
    /// The configured request timeout is applied to every call.
    pub fn new(config: CommerceConfig) -> StockroomResult<Self> {
        config.validate()?;
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| UpstreamAuthError::Transport {
                reason: format!("Failed to build HTTP client: {}", e),
            })?;
        Ok(Self { client, config })
    }

    fn token_url(&self) -> String {
        format!("{}/oauth/token", self.config.normalized_base_url())
    }

    fn stock_items_url(&self) -> String {
        format!("{}/api/stock_items", self.config.normalized_base_url())
    }
}

#[async_trait]
impl InventoryApi for CommerceLayerClient {
    async fn exchange_token(&self) -> StockroomResult<TokenGrant> {
        let body = TokenRequest {
            grant_type: "client_credentials",
            client_id: self.config.client_id.clone(),
            client_secret: self.config.client_secret.clone(),
            scope: self.config.scope.clone(),
        };

        let response = self
            .client
            .post(self.token_url())
            .header(ACCEPT, "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| UpstreamAuthError::Transport {
                reason: format!("HTTP request failed: {}", e),
            })?;

        let status = response.status();
        if status.is_success() {
            response.json::<TokenGrant>().await.map_err(|e| {
                UpstreamAuthError::InvalidResponse {
                    reason: format!("Failed to parse response: {}", e),
                }
                .into()
            })
        } else {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::warn!(status = status.as_u16(), "Token exchange rejected");
            Err(UpstreamAuthError::Rejected {
                status: status.as_u16(),
                body: error_text,
            }
            .into())
        }
    }

    async fn stock_items(&self, bearer_token: &str, sku_code: &str) -> StockroomResult<Vec<StockItem>> {
        let response = self
            .client
            .get(self.stock_items_url())
            .query(&[("filter[q][code_eq]", sku_code)])
            .header(AUTHORIZATION, format!("Bearer {}", bearer_token))
            .header(ACCEPT, JSON_API)
            .send()
            .await
            .map_err(|e| UpstreamApiError::Transport {
                sku: sku_code.to_string(),
                reason: format!("HTTP request failed: {}", e),
            })?;

        let status = response.status();
        if status.is_success() {
            let document: StockItemsDocument =
                response
                    .json()
                    .await
                    .map_err(|e| UpstreamApiError::InvalidResponse {
                        sku: sku_code.to_string(),
                        reason: format!("Failed to parse response: {}", e),
                    })?;
            Ok(document.into_items())
        } else {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::warn!(sku = sku_code, status = status.as_u16(), "Stock query rejected");
            Err(UpstreamApiError::Rejected {
                sku: sku_code.to_string(),
                status: status.as_u16(),
                body: error_text,
            }
            .into())
        }
    }
}

impl std::fmt::Debug for CommerceLayerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommerceLayerClient")
            .field("base_url", &self.config.base_url)
            .field("client_id", &self.config.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}
