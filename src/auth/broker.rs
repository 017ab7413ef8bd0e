/// Fyers auth capability: interactive login + refresh-token exchange
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::{CollectorError, Result};
use crate::types::Config;

#[derive(Debug, Serialize)]
struct ExchangeRequest {
    grant_type: String,
    #[serde(rename = "appIdHash")]
    app_id_hash: String,
    refresh_token: String,
    pin: String,
}

#[derive(Debug, Deserialize)]
struct ExchangeResponse {
    s: String,
    access_token: Option<String>,
    message: Option<String>,
}

/// Authentication capability.
///
/// `interactive_login` may involve a human in the loop and is only invoked
/// when the refresh token is missing or stale; the exchange endpoint runs
/// unattended on every reconcile.
#[async_trait]
pub trait AuthBroker: Send + Sync {
    /// Obtain a fresh refresh token
    async fn interactive_login(&self) -> Result<String>;

    /// Exchange a refresh token for a short-lived access token
    async fn exchange_refresh_for_access(&self, refresh_token: &str) -> Result<String>;
}

/// Production broker: shells out for the interactive flow, exchanges over
/// HTTPS in-process.
pub struct FyersAuthBroker {
    client: Client,
    exchange_url: String,
    app_id_hash: String,
    pin: String,
    login_command: Vec<String>,
}

impl FyersAuthBroker {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.http_timeout_sec))
            .build()?;

        Ok(FyersAuthBroker {
            client,
            exchange_url: config.auth_exchange_url.clone(),
            app_id_hash: config.app_id_hash.clone(),
            pin: config.pin.clone(),
            login_command: config.login_command.clone(),
        })
    }
}

#[async_trait]
impl AuthBroker for FyersAuthBroker {
    async fn interactive_login(&self) -> Result<String> {
        info!("Running interactive login: {:?}", self.login_command);

        let (program, args) = self
            .login_command
            .split_first()
            .ok_or_else(|| CollectorError::ConfigError("login_command is empty".to_string()))?;

        let output = Command::new(program)
            .args(args)
            // The flow may prompt the operator; keep stdin attached to the
            // terminal instead of the null device `output()` would use
            .stdin(std::process::Stdio::inherit())
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CollectorError::AuthenticationFailed(format!(
                "login command exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        // The login flow prints the refresh token on its final stdout line
        let stdout = String::from_utf8_lossy(&output.stdout);
        let token = stdout
            .lines()
            .rev()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .unwrap_or("")
            .to_string();

        if token.is_empty() {
            return Err(CollectorError::AuthenticationFailed(
                "login command produced no refresh token".to_string(),
            ));
        }

        info!("Interactive login completed, refresh token obtained");
        Ok(token)
    }

    async fn exchange_refresh_for_access(&self, refresh_token: &str) -> Result<String> {
        debug!("Exchanging refresh token at {}", self.exchange_url);

        let request = ExchangeRequest {
            grant_type: "refresh_token".to_string(),
            app_id_hash: self.app_id_hash.clone(),
            refresh_token: refresh_token.to_string(),
            pin: self.pin.clone(),
        };

        let response = self
            .client
            .post(&self.exchange_url)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        let body: ExchangeResponse = response.json().await?;

        if body.s != "ok" {
            warn!("Token exchange rejected: {:?}", body.message);
            return Err(CollectorError::TokenExchangeFailed(
                body.message
                    .unwrap_or_else(|| "exchange endpoint returned non-ok status".to_string()),
            ));
        }

        body.access_token.ok_or_else(|| {
            CollectorError::TokenExchangeFailed(
                "exchange response missing access_token".to_string(),
            )
        })
    }
}
