use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::Value;
use tokio::sync::mpsc;
use tower::util::ServiceExt;

use mission_tracker::{
    TrackerError,
    callback::{CallbackListener, CallbackState, router},
};

async fn get(app: axum::Router, uri: &str) -> (StatusCode, Vec<u8>) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).expect("request"))
        .await
        .expect("response");
    let status = response.status();
    let body = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes()
        .to_vec();
    (status, body)
}

#[tokio::test]
async fn matching_callback_returns_ok_and_forwards_code() {
    let (tx, mut rx) = mpsc::channel(1);
    let app = router("/callback", CallbackState::new("expected", tx));

    let (status, _) = get(app, "/callback?code=abc%2B123&state=expected").await;

    assert_eq!(status, StatusCode::OK);
    let code = rx.recv().await.expect("outcome").expect("code");
    // Percent-encoded characters are decoded, not split on.
    assert_eq!(code.code, "abc+123");
    assert_eq!(code.state, "expected");
}

#[tokio::test]
async fn forged_state_is_rejected_even_with_code() {
    let (tx, mut rx) = mpsc::channel(1);
    let app = router("/callback", CallbackState::new("expected", tx));

    let (status, body) = get(app, "/callback?code=abc&state=forged").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let json: Value = serde_json::from_slice(&body).expect("json body");
    assert!(json["message"].as_str().unwrap_or("").contains("state"));
    assert!(matches!(
        rx.recv().await.expect("outcome"),
        Err(TrackerError::AuthMismatch)
    ));
}

#[tokio::test]
async fn missing_code_is_a_bad_request() {
    let (tx, mut rx) = mpsc::channel(1);
    let app = router("/callback", CallbackState::new("expected", tx));

    let (status, _) = get(app, "/callback?state=expected").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(matches!(
        rx.recv().await.expect("outcome"),
        Err(TrackerError::BadRequest(_))
    ));
}

#[tokio::test]
async fn other_paths_are_not_routed() {
    let (tx, _rx) = mpsc::channel(1);
    let app = router("/callback", CallbackState::new("expected", tx));

    let (status, _) = get(app, "/favicon.ico").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn listener_serves_one_callback_then_stops() {
    let listener = CallbackListener::bind("127.0.0.1:0", "/callback")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let url = format!("http://{}/callback?code=the-code&state=expected", addr);

    let (outcome, response) = tokio::join!(
        listener.wait_for_code("expected", Duration::from_secs(5), std::future::pending()),
        reqwest::get(&url)
    );

    let code = outcome.expect("authorization code");
    assert_eq!(code.code, "the-code");
    assert_eq!(response.expect("response").status(), reqwest::StatusCode::OK);

    // The port is released once the wait returns.
    assert!(reqwest::get(&url).await.is_err());
}

#[tokio::test]
async fn listener_reports_mismatch_from_forged_callback() {
    let listener = CallbackListener::bind("127.0.0.1:0", "/callback")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let url = format!("http://{}/callback?code=stolen&state=forged", addr);

    let (outcome, response) = tokio::join!(
        listener.wait_for_code("expected", Duration::from_secs(5), std::future::pending()),
        reqwest::get(&url)
    );

    assert!(matches!(outcome, Err(TrackerError::AuthMismatch)));
    assert_eq!(
        response.expect("response").status(),
        reqwest::StatusCode::BAD_REQUEST
    );
}

#[tokio::test]
async fn listener_times_out_when_browser_never_returns() {
    let listener = CallbackListener::bind("127.0.0.1:0", "/callback")
        .await
        .expect("bind");

    let outcome = listener
        .wait_for_code("expected", Duration::from_millis(50), std::future::pending())
        .await;

    assert!(matches!(outcome, Err(TrackerError::CallbackTimeout)));
}

#[tokio::test]
async fn listener_wait_can_be_cancelled() {
    let listener = CallbackListener::bind("127.0.0.1:0", "/callback")
        .await
        .expect("bind");

    let outcome = listener
        .wait_for_code("expected", Duration::from_secs(60), std::future::ready(()))
        .await;

    assert!(matches!(outcome, Err(TrackerError::CallbackCancelled)));
}
