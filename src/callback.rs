use std::{future::Future, net::SocketAddr, time::Duration};

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;
use tokio::{
    net::TcpListener,
    sync::{mpsc, oneshot},
};

use crate::error::{Result, TrackerError};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationCode {
    pub code: String,
    pub state: String,
}

#[derive(Clone)]
pub struct CallbackState {
    expected_state: String,
    outcome: mpsc::Sender<Result<AuthorizationCode>>,
}

impl CallbackState {
    pub fn new(
        expected_state: impl Into<String>,
        outcome: mpsc::Sender<Result<AuthorizationCode>>,
    ) -> Self {
        CallbackState {
            expected_state: expected_state.into(),
            outcome,
        }
    }
}

impl IntoResponse for TrackerError {
    fn into_response(self) -> Response {
        let status = match &self {
            TrackerError::AuthMismatch | TrackerError::BadRequest(_) => {
                tracing::info!("Bad request: {}", &self);
                StatusCode::BAD_REQUEST
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (
            status,
            Json(serde_json::json!({ "message": self.to_string() })),
        )
            .into_response()
    }
}

pub fn router(path: &str, state: CallbackState) -> Router {
    Router::new()
        .route(path, get(callback))
        .with_state(state)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.is_empty())
}

fn check_callback(expected_state: &str, params: CallbackParams) -> Result<AuthorizationCode> {
    // The state is checked before the code so a forged callback is rejected
    // whether or not it carries one.
    let state = non_empty(params.state)
        .ok_or_else(|| TrackerError::BadRequest(String::from("No state received")))?;
    if state != expected_state {
        return Err(TrackerError::AuthMismatch);
    }

    let code = non_empty(params.code)
        .ok_or_else(|| TrackerError::BadRequest(String::from("No authorisation code received")))?;

    Ok(AuthorizationCode { code, state })
}

pub async fn callback(
    State(state): State<CallbackState>,
    Query(params): Query<CallbackParams>,
) -> std::result::Result<(StatusCode, &'static str), TrackerError> {
    tracing::info!(
        "Received callback with code_present={} state_present={}",
        params.code.is_some(),
        params.state.is_some()
    );

    let checked = check_callback(&state.expected_state, params);

    // Only the first outcome is consumed; later requests are answered but ignored.
    let forwarded = match &checked {
        Ok(code) => Ok(code.clone()),
        Err(TrackerError::AuthMismatch) => Err(TrackerError::AuthMismatch),
        Err(err) => Err(TrackerError::BadRequest(err.to_string())),
    };
    let _ = state.outcome.try_send(forwarded);

    checked.map(|_| {
        (
            StatusCode::OK,
            "Login complete. You can close this window and return to the tracker.",
        )
    })
}

/// One-shot loopback listener for the SSO redirect.
pub struct CallbackListener {
    listener: TcpListener,
    path: String,
}

impl CallbackListener {
    pub async fn bind(address: &str, path: &str) -> Result<Self> {
        let listener = TcpListener::bind(address).await.inspect_err(|err| {
            tracing::error!("Failed to bind callback listener on {}: {}", address, err)
        })?;
        tracing::info!("Callback listener bound on {}{}", address, path);

        Ok(CallbackListener {
            listener,
            path: path.to_string(),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serves requests until the first callback arrives, the timeout elapses
    /// or `cancel` resolves, then shuts the listener down.
    pub async fn wait_for_code<F>(
        self,
        expected_state: &str,
        timeout: Duration,
        cancel: F,
    ) -> Result<AuthorizationCode>
    where
        F: Future<Output = ()>,
    {
        let (outcome_tx, mut outcome_rx) = mpsc::channel(1);
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let app = router(&self.path, CallbackState::new(expected_state, outcome_tx));
        let listener = self.listener;
        let mut server = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        let outcome = tokio::select! {
            received = outcome_rx.recv() => received.unwrap_or(Err(TrackerError::CallbackCancelled)),
            _ = tokio::time::sleep(timeout) => {
                tracing::warn!("No callback received within {}s", timeout.as_secs());
                Err(TrackerError::CallbackTimeout)
            }
            _ = cancel => {
                tracing::info!("Callback wait cancelled");
                Err(TrackerError::CallbackCancelled)
            }
        };

        let _ = shutdown_tx.send(());
        match tokio::time::timeout(SHUTDOWN_GRACE, &mut server).await {
            Ok(Ok(Ok(()))) => tracing::debug!("Callback listener stopped"),
            Ok(Ok(Err(err))) => tracing::error!("Callback listener failed: {}", err),
            Ok(Err(err)) => tracing::error!("Callback listener task failed: {}", err),
            Err(_) => {
                tracing::warn!("Callback listener did not stop within grace period");
                server.abort();
            }
        }

        outcome
    }
}
