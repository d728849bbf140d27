use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::body::{to_bytes, Body, Bytes};
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::routing::get;
use tower::ServiceExt;

use hookshot::web::{
    accept_event, health, ping, signature_header_value, HEADER_DELIVERY, HEADER_EVENT,
    HEADER_SIGNATURE, NOT_FOUND_MESSAGE, UNAUTHORIZED_MESSAGE,
};
use hookshot::{sign, Config, Router};

const SECRET: &str = "1234";
const BODY: &str = r#"{"event":"data"}"#;

fn app(hooks: Router) -> axum::Router {
    axum::Router::new()
        .route("/health", get(health))
        .route_service("/webhooks", hooks)
}

fn post(event: Option<&str>, signature: Option<&str>, body: &'static str) -> Request<Body> {
    let mut builder = Request::builder().method("POST").uri("/webhooks");
    if let Some(event) = event {
        builder = builder.header(HEADER_EVENT, event);
    }
    if let Some(signature) = signature {
        builder = builder.header(HEADER_SIGNATURE, signature);
    }
    builder.body(Body::from(body)).unwrap()
}

async fn body_string(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[test]
fn test_deployment_signature() {
    assert_eq!(
        sign(BODY.as_bytes(), SECRET),
        "ade133892a181fba3a21c163cd5cbc3f5f8e915c"
    );
}

#[tokio::test]
async fn test_deployment_scenario() {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);

    let mut hooks = Router::new(SECRET);
    hooks.handle_fn("deployment", move || {
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            StatusCode::OK
        }
    });
    let app = app(hooks);

    let signed = app
        .clone()
        .oneshot(post(
            Some("deployment"),
            Some("sha1=ade133892a181fba3a21c163cd5cbc3f5f8e915c"),
            BODY,
        ))
        .await
        .unwrap();
    assert_eq!(signed.status(), StatusCode::OK);

    let forged = app
        .clone()
        .oneshot(post(Some("deployment"), Some("invalid"), BODY))
        .await
        .unwrap();
    assert_eq!(forged.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_string(forged).await, UNAUTHORIZED_MESSAGE);

    let unknown = app
        .clone()
        .oneshot(post(Some("foobar"), Some("invalid"), BODY))
        .await
        .unwrap();
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_string(unknown).await, NOT_FOUND_MESSAGE);

    let missing_event = app
        .clone()
        .oneshot(post(None, None, BODY))
        .await
        .unwrap();
    assert_eq!(missing_event.status(), StatusCode::NOT_FOUND);

    let unsigned = app
        .clone()
        .oneshot(post(Some("deployment"), None, "not even json"))
        .await
        .unwrap();
    assert_eq!(unsigned.status(), StatusCode::OK);

    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_ping_and_accepted_events() {
    let config = Config {
        secret: SECRET.to_string(),
        ..Config::default()
    };

    let mut hooks = Router::from_config(&config);
    hooks.handle_fn("ping", ping);
    hooks.handle_fn("push", accept_event);
    let app = app(hooks);

    let signature = signature_header_value(b"{}", SECRET);

    let pong = app
        .clone()
        .oneshot(post(Some("ping"), Some(signature.as_str()), "{}"))
        .await
        .unwrap();
    assert_eq!(pong.status(), StatusCode::OK);
    assert_eq!(body_string(pong).await, "Pong");

    let mut request = post(Some("push"), Some(signature.as_str()), "{}");
    request
        .headers_mut()
        .insert(HEADER_DELIVERY, "f1d2d2f9".parse().unwrap());
    let accepted = app.clone().oneshot(request).await.unwrap();
    assert_eq!(accepted.status(), StatusCode::ACCEPTED);

    let json: serde_json::Value =
        serde_json::from_str(&body_string(accepted).await).unwrap();
    assert_eq!(json["event"], "push");
    assert_eq!(json["delivery"], "f1d2d2f9");
    assert_eq!(json["bytes"], 2);
}

#[tokio::test]
async fn test_handler_sees_signed_bytes() {
    let mut hooks = Router::new(SECRET);
    hooks.handle_fn("push", |body: Bytes| async move { body });
    let app = app(hooks);

    let payload = r#"{"ref":"refs/heads/main","commits":[]}"#;
    let signature = signature_header_value(payload.as_bytes(), SECRET);

    let response = app
        .oneshot(post(Some("push"), Some(signature.as_str()), payload))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, payload);
}

#[tokio::test]
async fn test_calculated_signature_from_config() {
    let config = Config {
        secret: SECRET.to_string(),
        set_calculated_signature_header: true,
        ..Config::default()
    };

    let mut hooks = Router::from_config(&config);
    hooks.handle_fn("deployment", || async { StatusCode::OK });

    let response = app(hooks)
        .oneshot(post(Some("deployment"), Some("sha1=bogus"), BODY))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(
        response.headers()["x-calculated-signature"],
        "sha1=ade133892a181fba3a21c163cd5cbc3f5f8e915c"
    );
}

#[tokio::test]
async fn test_body_limit_from_config() {
    let config = Config {
        max_body_bytes: 8,
        ..Config::default()
    };

    let mut hooks = Router::from_config(&config);
    hooks.handle_fn("deployment", || async { StatusCode::OK });

    let response = app(hooks)
        .oneshot(post(Some("deployment"), None, BODY))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_health() {
    let response = app(Router::new(SECRET))
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, r#"{"status":"ok"}"#);
}
