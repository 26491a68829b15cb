//! Credential lifecycle: authorisation-code flow with optional PKCE, token
//! persistence, and refresh on demand.

use std::future::Future;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::Utc;
use sha2::{Digest, Sha256};
use url::form_urlencoded;

use crate::{
    config::Config,
    domain::Credential,
    error::{Result, TrackerError},
    eve::TokenResponse,
    store::JsonFile,
};

/// Token endpoint operations. Implementations map a non-success response to
/// `AuthExchangeFailed` or `RefreshFailed` respectively; a request that never
/// got an answer is `Http`.
pub trait TokenExchange {
    fn exchange_code(
        &self,
        code: &str,
        code_verifier: Option<&str>,
    ) -> impl Future<Output = Result<TokenResponse>> + Send;

    fn refresh_token(
        &self,
        refresh_token: &str,
    ) -> impl Future<Output = Result<TokenResponse>> + Send;
}

#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub url: String,
    pub state: String,
}

#[derive(Debug, Clone)]
pub struct Pkce {
    pub verifier: String,
    pub challenge: String,
}

#[derive(Debug)]
struct PendingAuthorization {
    state: String,
    code_verifier: Option<String>,
}

fn random_token() -> String {
    let bytes: [u8; 32] = rand::random();
    URL_SAFE_NO_PAD.encode(bytes)
}

pub fn generate_state() -> String {
    random_token()
}

pub fn pkce_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

pub fn generate_pkce() -> Pkce {
    let verifier = random_token();
    let challenge = pkce_challenge(&verifier);
    Pkce {
        verifier,
        challenge,
    }
}

pub struct CredentialManager<E> {
    exchange: E,
    store: JsonFile<Credential>,
    authorize_url: String,
    client_id: String,
    redirect_uri: String,
    scopes: Vec<String>,
    pkce: bool,
    pending: Option<PendingAuthorization>,
    credential: Option<Credential>,
}

impl<E: TokenExchange> CredentialManager<E> {
    /// Builds a manager seeded with whatever credential the store holds.
    pub fn new(config: &Config, exchange: E, store: JsonFile<Credential>) -> Result<Self> {
        let credential = store.load()?;
        if credential.is_some() {
            tracing::info!("Loaded stored credential from {}", store.path().display());
        }

        Ok(CredentialManager {
            exchange,
            store,
            authorize_url: config.authorize_url.clone(),
            client_id: config.client_id.clone(),
            redirect_uri: config.callback_url.to_string(),
            scopes: config.scopes.clone(),
            pkce: config.pkce,
            pending: None,
            credential,
        })
    }

    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    pub fn begin_authorization(&mut self) -> AuthorizationRequest {
        let state = generate_state();
        let pkce = self.pkce.then(generate_pkce);

        let mut serializer = form_urlencoded::Serializer::new(format!("{}?", self.authorize_url));
        serializer
            .append_pair("response_type", "code")
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("client_id", &self.client_id)
            .append_pair("scope", &self.scopes.join(" "))
            .append_pair("state", &state);
        if let Some(pkce) = &pkce {
            serializer
                .append_pair("code_challenge", &pkce.challenge)
                .append_pair("code_challenge_method", "S256");
        }
        let url = serializer.finish();

        if self.pending.is_some() {
            tracing::debug!("Replacing outstanding authorisation request");
        }
        self.pending = Some(PendingAuthorization {
            state: state.clone(),
            code_verifier: pkce.map(|pkce| pkce.verifier),
        });

        AuthorizationRequest { url, state }
    }

    pub async fn complete_authorization(
        &mut self,
        received_state: &str,
        code: &str,
    ) -> Result<Credential> {
        // A state value is good for one attempt only.
        let pending = self.pending.take().ok_or(TrackerError::AuthMismatch)?;
        if pending.state != received_state {
            tracing::warn!("Rejecting authorisation with unexpected state");
            return Err(TrackerError::AuthMismatch);
        }

        let response = self
            .exchange
            .exchange_code(code, pending.code_verifier.as_deref())
            .await?;

        let credential = Credential::new(
            response.access_token,
            response.refresh_token,
            response.expires_in,
            Utc::now(),
        );
        self.store.save(&credential)?;
        self.credential = Some(credential.clone());

        tracing::info!(
            "Authorisation complete, token expires at {}",
            credential.expires_at
        );

        Ok(credential)
    }

    pub async fn get_valid_token(&mut self) -> Result<String> {
        let credential = self.credential.as_ref().ok_or(TrackerError::ReauthRequired)?;

        if !credential.is_expired_at(Utc::now()) {
            return Ok(credential.access_token.clone());
        }

        if credential.refresh_token.is_none() {
            tracing::info!("Access token expired and no refresh token is available");
            return Err(TrackerError::ReauthRequired);
        }

        let refreshed = self.refresh(credential).await?;
        self.store.save(&refreshed)?;
        let access_token = refreshed.access_token.clone();
        self.credential = Some(refreshed);

        Ok(access_token)
    }

    pub async fn refresh(&self, credential: &Credential) -> Result<Credential> {
        let refresh_token = credential
            .refresh_token
            .as_deref()
            .ok_or(TrackerError::ReauthRequired)?;

        let response = self.exchange.refresh_token(refresh_token).await?;

        // The provider may keep the same refresh token and omit it.
        let refresh_token = response
            .refresh_token
            .or_else(|| credential.refresh_token.clone());

        let refreshed = Credential::new(
            response.access_token,
            refresh_token,
            response.expires_in,
            Utc::now(),
        );

        tracing::info!("Refreshed token, expires at {}", refreshed.expires_at);

        Ok(refreshed)
    }

    pub fn logout(&mut self) -> Result<()> {
        self.pending = None;
        self.credential = None;
        self.store.clear()
    }
}
