/// Kite Connect portfolio client
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::auth::store::CredentialStore;
use crate::error::{CollectorError, Result};
use crate::types::{Config, Holding, TokenKind};

#[derive(Debug, Deserialize)]
struct HoldingsResponse {
    status: String,
    data: Option<Vec<Holding>>,
    message: Option<String>,
    error_type: Option<String>,
}

/// Read-only brokerage portfolio capability
#[async_trait]
pub trait BrokerApi: Send + Sync {
    async fn fetch_holdings(&self) -> Result<Vec<Holding>>;
}

/// Kite Connect REST adapter.
///
/// The access token is re-read from the store on every call so a renewal by
/// the lifecycle manager is observed on the next tick. A missing token is an
/// error here, never a re-auth attempt - that is the lifecycle manager's job.
pub struct KiteBrokerApi {
    client: Client,
    api_base: String,
    api_key: String,
    store: Arc<dyn CredentialStore>,
}

impl KiteBrokerApi {
    pub fn new(config: &Config, store: Arc<dyn CredentialStore>) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.http_timeout_sec))
            .build()?;

        Ok(KiteBrokerApi {
            client,
            api_base: config.broker_api_base.clone(),
            api_key: config.broker_api_key.clone(),
            store,
        })
    }
}

#[async_trait]
impl BrokerApi for KiteBrokerApi {
    async fn fetch_holdings(&self) -> Result<Vec<Holding>> {
        let access = self.store.read(TokenKind::Access).await?;

        let response = self
            .client
            .get(format!("{}/portfolio/holdings", self.api_base))
            .header(
                "Authorization",
                format!("token {}:{}", self.api_key, access.value),
            )
            .header("X-Kite-Version", "3")
            .send()
            .await?;

        let body: HoldingsResponse = response.json().await?;

        if body.status != "success" {
            return Err(CollectorError::BrokerApiError {
                code: body.error_type.unwrap_or_else(|| "unknown".to_string()),
                message: body.message.unwrap_or_else(|| "holdings request failed".to_string()),
            });
        }

        let holdings = body.data.unwrap_or_default();
        debug!("Fetched {} holdings", holdings.len());
        Ok(holdings)
    }
}
