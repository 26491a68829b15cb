use std::time::Duration;

use serde::Deserialize;

use crate::{
    auth::TokenExchange,
    config::Config,
    domain::LedgerEntry,
    error::{Result, TrackerError},
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub expires_in: i64,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CharacterResponse {
    #[serde(rename = "CharacterID")]
    pub character_id: i64,
    #[serde(rename = "CharacterName", default)]
    pub character_name: String,
}

#[derive(Debug, Deserialize)]
pub struct LoyaltyPointsResponse {
    pub corporation_id: i64,
    #[serde(default)]
    pub loyalty_points: Option<i64>,
}

fn build_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(TrackerError::from)
}

/// Token endpoint client for the EVE SSO.
#[derive(Debug, Clone)]
pub struct SsoClient {
    client: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: Option<String>,
    redirect_uri: String,
}

impl SsoClient {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(SsoClient {
            client: build_client()?,
            token_url: config.token_url.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri: config.callback_url.to_string(),
        })
    }

    /// Posts a grant to the token endpoint. Transport and decoding failures
    /// come back as `Http`; only a non-success status is passed to `rejected`.
    async fn post_token_form(
        &self,
        params: &[(&str, &str)],
        rejected: fn(String) -> TrackerError,
    ) -> Result<TokenResponse> {
        let mut form: Vec<(&str, &str)> = params.iter().copied().collect();
        let mut request = self.client.post(&self.token_url);
        match &self.client_secret {
            Some(secret) => request = request.basic_auth(&self.client_id, Some(secret)),
            None => form.push(("client_id", self.client_id.as_str())),
        }

        let res = request.form(&form).send().await.inspect_err(|err| {
            tracing::error!("Error occurred in request to SSO token API: {:#?}", err)
        })?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            tracing::error!("SSO token API returned status_code={} body={}", status, body);
            return Err(rejected(format!("status_code={} body={}", status, body)));
        }

        res.json::<TokenResponse>().await.map_err(|err| {
            tracing::error!(
                "Error occurred while deserialising token response: {:#?}",
                err
            );
            TrackerError::from(err)
        })
    }
}

impl TokenExchange for SsoClient {
    async fn exchange_code(&self, code: &str, code_verifier: Option<&str>) -> Result<TokenResponse> {
        tracing::info!("Exchanging authorisation code...");

        let mut params = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.redirect_uri.as_str()),
        ];
        if let Some(verifier) = code_verifier {
            params.push(("code_verifier", verifier));
        }

        self.post_token_form(&params, TrackerError::AuthExchangeFailed)
            .await
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenResponse> {
        tracing::info!("Refreshing access token...");

        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];

        self.post_token_form(&params, TrackerError::RefreshFailed)
            .await
    }
}

/// Authenticated ESI client for a single character.
#[derive(Debug, Clone)]
pub struct EsiClient {
    client: reqwest::Client,
    base_url: String,
    verify_url: String,
}

impl EsiClient {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(EsiClient {
            client: build_client()?,
            base_url: config.esi_base_url.clone(),
            verify_url: config.verify_url.clone(),
        })
    }

    pub async fn verify_character(&self, access_token: &str) -> Result<CharacterResponse> {
        tracing::info!("Resolving character for access token...");

        let res = self
            .client
            .get(&self.verify_url)
            .bearer_auth(access_token)
            .send()
            .await
            .inspect_err(|err| {
                tracing::error!("Error occurred in request to SSO verify API: {:#?}", err)
            })?
            .error_for_status()?;

        res.json::<CharacterResponse>().await.map_err(|err| {
            tracing::error!(
                "Error occurred while deserialising verify response: {:#?}",
                err
            );
            TrackerError::from(err)
        })
    }

    pub async fn fetch_wallet(&self, access_token: &str, character_id: i64) -> Result<f64> {
        let res = self
            .client
            .get(format!(
                "{}/characters/{}/wallet/",
                self.base_url, character_id
            ))
            .bearer_auth(access_token)
            .send()
            .await
            .inspect_err(|err| {
                tracing::error!("Error occurred in request to ESI wallet API: {:#?}", err)
            })?
            .error_for_status()?;

        Ok(res.json::<f64>().await?)
    }

    pub async fn fetch_wallet_journal(
        &self,
        access_token: &str,
        character_id: i64,
    ) -> Result<Vec<LedgerEntry>> {
        tracing::debug!("Listing wallet journal for character_id={}", character_id);

        let res = self
            .client
            .get(format!(
                "{}/characters/{}/wallet/journal/",
                self.base_url, character_id
            ))
            .bearer_auth(access_token)
            .send()
            .await
            .inspect_err(|err| {
                tracing::error!(
                    "Error occurred in request to ESI wallet journal API: {:#?}",
                    err
                )
            })?
            .error_for_status()?;

        res.json::<Vec<LedgerEntry>>().await.map_err(|err| {
            tracing::error!(
                "Error occurred while deserialising journal response: {:#?}",
                err
            );
            TrackerError::from(err)
        })
    }

    pub async fn fetch_loyalty_points(&self, access_token: &str, character_id: i64) -> Result<i64> {
        let res = self
            .client
            .get(format!(
                "{}/characters/{}/loyalty/points/",
                self.base_url, character_id
            ))
            .bearer_auth(access_token)
            .send()
            .await
            .inspect_err(|err| {
                tracing::error!(
                    "Error occurred in request to ESI loyalty points API: {:#?}",
                    err
                )
            })?
            .error_for_status()?;

        let balances = res.json::<Vec<LoyaltyPointsResponse>>().await?;
        Ok(total_loyalty_points(&balances))
    }
}

/// Corporations reported without a balance contribute nothing.
pub fn total_loyalty_points(balances: &[LoyaltyPointsResponse]) -> i64 {
    balances
        .iter()
        .map(|balance| balance.loyalty_points.unwrap_or(0))
        .sum()
}
