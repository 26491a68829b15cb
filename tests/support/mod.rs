#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use mission_tracker::{
    TrackerError,
    auth::TokenExchange,
    config::Config,
    eve::TokenResponse,
};

#[derive(Debug, Default)]
pub struct Calls {
    pub exchanges: Vec<(String, Option<String>)>,
    pub refreshes: Vec<String>,
}

/// In-memory token endpoint that records every call it receives.
#[derive(Clone, Default)]
pub struct FakeSso {
    pub calls: Arc<Mutex<Calls>>,
    pub fail_exchange: bool,
    pub fail_refresh: bool,
    pub rotate_refresh_token: bool,
}

impl FakeSso {
    pub fn exchange_count(&self) -> usize {
        self.calls.lock().unwrap().exchanges.len()
    }

    pub fn refresh_count(&self) -> usize {
        self.calls.lock().unwrap().refreshes.len()
    }

    pub fn last_verifier(&self) -> Option<String> {
        self.calls
            .lock()
            .unwrap()
            .exchanges
            .last()
            .and_then(|(_, verifier)| verifier.clone())
    }
}

impl TokenExchange for FakeSso {
    async fn exchange_code(
        &self,
        code: &str,
        code_verifier: Option<&str>,
    ) -> mission_tracker::Result<TokenResponse> {
        self.calls
            .lock()
            .unwrap()
            .exchanges
            .push((code.to_string(), code_verifier.map(String::from)));

        if self.fail_exchange {
            return Err(TrackerError::AuthExchangeFailed(String::from(
                "status_code=400 body=invalid_grant",
            )));
        }

        Ok(TokenResponse {
            access_token: format!("access-for-{}", code),
            expires_in: 1199,
            token_type: Some(String::from("Bearer")),
            refresh_token: Some(String::from("refresh-1")),
        })
    }

    async fn refresh_token(&self, refresh_token: &str) -> mission_tracker::Result<TokenResponse> {
        let count = {
            let mut calls = self.calls.lock().unwrap();
            calls.refreshes.push(refresh_token.to_string());
            calls.refreshes.len()
        };

        if self.fail_refresh {
            return Err(TrackerError::RefreshFailed(String::from(
                "status_code=400 body=invalid_token",
            )));
        }

        Ok(TokenResponse {
            access_token: format!("refreshed-{}", count),
            expires_in: 1199,
            token_type: Some(String::from("Bearer")),
            refresh_token: self
                .rotate_refresh_token
                .then(|| format!("refresh-{}", count + 1)),
        })
    }
}

pub fn test_config(pkce: bool, esi_base_url: &str) -> Config {
    Config::from_json(
        &serde_json::json!({
            "client_id": "test-client",
            "callback_url": "http://127.0.0.1:8080/callback",
            "scopes": ["esi-wallet.read_character_wallet.v1", "esi-characters.read_loyalty.v1"],
            "pkce": pkce,
            "esi_base_url": esi_base_url,
            "verify_url": format!("{}/verify", esi_base_url),
        })
        .to_string(),
    )
    .expect("test config")
}
