use std::path::Path;

use serde::Deserialize;
use url::{Host, Url};

use crate::error::{Result, TrackerError};

pub const DEFAULT_AUTHORIZE_URL: &str = "https://login.eveonline.com/v2/oauth/authorize";
pub const DEFAULT_TOKEN_URL: &str = "https://login.eveonline.com/v2/oauth/token";
pub const DEFAULT_VERIFY_URL: &str = "https://login.eveonline.com/oauth/verify";
pub const DEFAULT_ESI_BASE_URL: &str = "https://esi.evetech.net/latest";

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Scopes {
    List(Vec<String>),
    Joined(String),
}

impl Scopes {
    fn into_vec(self) -> Vec<String> {
        match self {
            Scopes::List(scopes) => scopes,
            Scopes::Joined(scopes) => scopes.split_whitespace().map(String::from).collect(),
        }
    }
}

/// On-disk shape of `config.json`. Every key is optional here so that a
/// missing one can be reported by name rather than as a serde error.
#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    client_id: Option<String>,
    client_secret: Option<String>,
    callback_url: Option<String>,
    scopes: Option<Scopes>,
    pkce: Option<bool>,
    authorize_url: Option<String>,
    token_url: Option<String>,
    verify_url: Option<String>,
    esi_base_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub client_id: String,
    pub client_secret: Option<String>,
    pub callback_url: Url,
    pub scopes: Vec<String>,
    pub pkce: bool,
    pub authorize_url: String,
    pub token_url: String,
    pub verify_url: String,
    pub esi_base_url: String,
}

impl Config {
    pub fn load(path: &Path) -> Result<Config> {
        if !path.exists() {
            return Err(TrackerError::ConfigMissing(format!(
                "config file {} not found",
                path.display()
            )));
        }
        let content = std::fs::read_to_string(path)?;
        Config::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Config> {
        let raw: RawConfig = serde_json::from_str(content)?;
        Config::from_raw(raw)
    }

    fn from_raw(raw: RawConfig) -> Result<Config> {
        let client_id = required(raw.client_id, "client_id")?;
        let callback_url = required(raw.callback_url, "callback_url")?;
        let scopes = raw
            .scopes
            .map(Scopes::into_vec)
            .ok_or_else(|| TrackerError::ConfigMissing(String::from("scopes")))?;

        let callback_url = Url::parse(&callback_url).map_err(|err| {
            TrackerError::ConfigMissing(format!("callback_url is not a valid URL: {}", err))
        })?;

        Ok(Config {
            client_id,
            client_secret: raw.client_secret.filter(|secret| !secret.is_empty()),
            callback_url,
            scopes,
            pkce: raw.pkce.unwrap_or(true),
            authorize_url: raw
                .authorize_url
                .unwrap_or_else(|| DEFAULT_AUTHORIZE_URL.to_string()),
            token_url: raw.token_url.unwrap_or_else(|| DEFAULT_TOKEN_URL.to_string()),
            verify_url: raw
                .verify_url
                .unwrap_or_else(|| DEFAULT_VERIFY_URL.to_string()),
            esi_base_url: raw
                .esi_base_url
                .unwrap_or_else(|| DEFAULT_ESI_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
        })
    }

    /// Loopback address the callback listener binds to. Any other host is
    /// refused so the listener is never reachable from the network.
    pub fn callback_bind_address(&self) -> Result<String> {
        let port = self
            .callback_url
            .port_or_known_default()
            .ok_or_else(|| TrackerError::ConfigMissing(String::from("callback_url port")))?;
        match self.callback_url.host() {
            Some(Host::Domain(domain)) if domain.eq_ignore_ascii_case("localhost") => {
                Ok(format!("localhost:{}", port))
            }
            Some(Host::Ipv4(ip)) if ip.is_loopback() => Ok(format!("{}:{}", ip, port)),
            Some(Host::Ipv6(ip)) if ip.is_loopback() => Ok(format!("[{}]:{}", ip, port)),
            Some(host) => Err(TrackerError::ConfigMissing(format!(
                "callback_url host {} is not a loopback address",
                host
            ))),
            None => Err(TrackerError::ConfigMissing(String::from("callback_url host"))),
        }
    }

    pub fn callback_path(&self) -> &str {
        self.callback_url.path()
    }
}

fn required(value: Option<String>, key: &str) -> Result<String> {
    match value {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(TrackerError::ConfigMissing(key.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_config_with_defaults() {
        let config = Config::from_json(
            r#"{
                "client_id": "abc",
                "callback_url": "http://localhost:8080/callback",
                "scopes": ["esi-wallet.read_character_wallet.v1"]
            }"#,
        )
        .expect("config");

        assert_eq!(config.client_id, "abc");
        assert!(config.client_secret.is_none());
        assert!(config.pkce);
        assert_eq!(config.token_url, DEFAULT_TOKEN_URL);
        assert_eq!(config.callback_bind_address().unwrap(), "localhost:8080");
        assert_eq!(config.callback_path(), "/callback");
    }

    #[test]
    fn accepts_space_separated_scopes() {
        let config = Config::from_json(
            r#"{
                "client_id": "abc",
                "callback_url": "http://127.0.0.1:9000/callback",
                "scopes": "scope.one scope.two"
            }"#,
        )
        .expect("config");

        assert_eq!(config.scopes, vec!["scope.one", "scope.two"]);
    }

    #[test]
    fn reports_first_missing_key() {
        let err = Config::from_json(r#"{"client_id": "abc", "scopes": []}"#).unwrap_err();
        match err {
            TrackerError::ConfigMissing(key) => assert_eq!(key, "callback_url"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn empty_client_secret_is_treated_as_absent() {
        let config = Config::from_json(
            r#"{
                "client_id": "abc",
                "client_secret": "",
                "callback_url": "http://localhost:8080/callback",
                "scopes": []
            }"#,
        )
        .expect("config");

        assert!(config.client_secret.is_none());
    }

    fn with_callback(callback_url: &str) -> Config {
        Config::from_json(&format!(
            r#"{{"client_id": "abc", "callback_url": "{}", "scopes": []}}"#,
            callback_url
        ))
        .expect("config")
    }

    #[test]
    fn callback_binds_only_to_loopback() {
        assert_eq!(
            with_callback("http://127.0.0.1:9000/callback")
                .callback_bind_address()
                .unwrap(),
            "127.0.0.1:9000"
        );
        assert_eq!(
            with_callback("http://[::1]:9000/callback")
                .callback_bind_address()
                .unwrap(),
            "[::1]:9000"
        );

        for callback_url in [
            "http://0.0.0.0:8080/callback",
            "http://192.168.1.5:8080/callback",
            "http://example.com/callback",
        ] {
            let err = with_callback(callback_url)
                .callback_bind_address()
                .unwrap_err();
            assert!(
                matches!(err, TrackerError::ConfigMissing(_)),
                "{callback_url} should be refused"
            );
        }
    }

    #[test]
    fn missing_file_is_config_missing() {
        let err = Config::load(Path::new("/nonexistent/config.json")).unwrap_err();
        assert!(matches!(err, TrackerError::ConfigMissing(_)));
    }
}
