use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{HeaderMap, Request, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Router, middleware};
use http_body_util::BodyExt;
use tower::ServiceExt;

use redirect_relay::middleware::strip_identifying_headers;
use redirect_relay::page::{RedirectDelay, SECURITY_HEADERS};
use redirect_relay::{AppState, Profile, RelayConfig, router};

fn test_config() -> RelayConfig {
    RelayConfig {
        delay: RedirectDelay::new(Duration::ZERO, Duration::ZERO).unwrap(),
        ..RelayConfig::default()
    }
}

fn app_with(config: RelayConfig) -> (Router, Arc<AppState>) {
    let state = AppState::new(&config).unwrap();
    (router(Arc::clone(&state), config.allowed_origin.clone()), state)
}

fn app() -> Router {
    app_with(test_config()).0
}

fn from_peer(mut request: Request<Body>, last_octet: u8) -> Request<Body> {
    let addr = SocketAddr::from(([10, 0, 0, last_octet], 40_000));
    request.extensions_mut().insert(ConnectInfo(addr));
    request
}

fn get_req(uri: &str) -> Request<Body> {
    from_peer(Request::builder().uri(uri).body(Body::empty()).unwrap(), 1)
}

fn register_req(body: &str) -> Request<Body> {
    from_peer(
        Request::builder()
            .method("POST")
            .uri("/register")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_owned()))
            .unwrap(),
        1,
    )
}

async fn send(app: &Router, request: Request<Body>) -> Response {
    app.clone().oneshot(request).await.unwrap()
}

async fn body_string(response: Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn register(app: &Router, url: &str) -> String {
    let body = serde_json::json!({ "url": url }).to_string();
    let response = send(app, register_req(&body)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    json["id"].as_str().unwrap().to_string()
}

// the string passed to window.location.replace(...)
fn navigation_target(page: &str) -> String {
    let marker = "window.location.replace(";
    let start = page.find(marker).unwrap() + marker.len();
    let end = start + page[start..].find(");").unwrap();
    serde_json::from_str(&page[start..end]).unwrap()
}

#[tokio::test]
async fn health_reports_healthy() {
    let response = send(&app(), get_req("/health")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(json["status"], "healthy");
}

#[tokio::test]
async fn register_then_redirect_strips_tracking() {
    let app = app();
    let id = register(&app, "https://shop.example/x?utm_source=ad&gclid=1&ref=partner#track").await;

    let response = send(&app, get_req(&format!("/redirect/{id}"))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::REFERRER_POLICY], "no-referrer");
    for (name, value) in SECURITY_HEADERS {
        assert_eq!(response.headers()[*name], *value, "header {name}");
    }
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/html; charset=utf-8"
    );

    let page = body_string(response).await;
    assert_eq!(navigation_target(&page), "https://shop.example/x");
    assert!(!page.contains("utm_source"));
    assert!(!page.contains("#track"));
}

#[tokio::test]
async fn token_is_reusable_until_ttl() {
    let app = app();
    let id = register(&app, "https://example.com/a?keep=1").await;
    for _ in 0..2 {
        let response = send(&app, get_req(&format!("/redirect/{id}"))).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(navigation_target(&body_string(response).await), "https://example.com/a?keep=1");
    }
}

#[tokio::test]
async fn unknown_token_is_404() {
    let response = send(&app(), get_req("/redirect/unknown-token")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    // error responses are not cacheable either
    assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store, no-cache, must-revalidate, private");

    let well_formed_but_unknown = format!("/redirect/{}", "ab".repeat(16));
    let response = send(&app(), get_req(&well_formed_but_unknown)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn undecodable_token_is_404_with_security_headers() {
    let response = send(&app(), get_req("/redirect/%FF")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    for (name, value) in SECURITY_HEADERS {
        assert_eq!(response.headers()[*name], *value, "header {name}");
    }
    let json: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert!(json["error"].is_string());
}

#[tokio::test(start_paused = true)]
async fn expired_token_is_404() {
    let config = RelayConfig {
        token_ttl: Duration::from_secs(30),
        ..test_config()
    };
    let (app, _) = app_with(config);
    let id = register(&app, "https://example.com/").await;

    tokio::time::advance(Duration::from_secs(30)).await;
    let response = send(&app, get_req(&format!("/redirect/{id}"))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn register_requires_url() {
    let app = app();
    for body in ["{}", r#"{"url": ""}"#, r#"{"url": null}"#, r#"{"url": 42}"#, "not json"] {
        let response = send(&app, register_req(body)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body {body}");
        let json: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(json["error"], "URL is required");
    }
}

#[tokio::test]
async fn register_rejects_oversized_url() {
    let url = format!("https://example.com/?q={}", "a".repeat(9000));
    let body = serde_json::json!({ "url": url }).to_string();
    let response = send(&app(), register_req(&body)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(json["error"], "URL is too long");
}

#[tokio::test]
async fn register_body_over_limit_is_too_long() {
    // past the body limit the JSON is never parsed
    let url = format!("https://example.com/?q={}", "a".repeat(20_000));
    let body = serde_json::json!({ "url": url }).to_string();
    let response = send(&app(), register_req(&body)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(json["error"], "URL is too long");
}

#[tokio::test]
async fn invalid_stored_url_is_400() {
    let app = app();
    // register only checks for presence; cleaning happens on redirect
    let id = register(&app, "not a url").await;
    let response = send(&app, get_req(&format!("/redirect/{id}"))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let id = register(&app, "javascript:alert(1)").await;
    let response = send(&app, get_req(&format!("/redirect/{id}"))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn direct_redirect_cleans_query_url() {
    let app = app();
    let response = send(
        &app,
        get_req("/redirect?url=https%3A%2F%2Fexample.com%2Fp%3Fgclid%3D1%26a%3Db%23frag"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::REFERRER_POLICY], "no-referrer");
    assert_eq!(navigation_target(&body_string(response).await), "https://example.com/p?a=b");

    let response = send(&app, get_req("/redirect")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send(&app, get_req("/redirect?url=%2Frelative")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn rate_limit_rejects_after_limit() {
    let config = RelayConfig {
        rate_limit: 2,
        rate_window: Duration::from_secs(60),
        ..test_config()
    };
    let (app, _) = app_with(config);

    for _ in 0..2 {
        let response = send(&app, get_req("/redirect/unknown")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
    let response = send(&app, get_req("/redirect/unknown")).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().contains_key(header::RETRY_AFTER));

    // registration shares the same quota
    let response = send(&app, register_req(r#"{"url": "https://example.com"}"#)).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    // other peers and the health probe are unaffected
    let other_peer = from_peer(
        Request::builder().uri("/redirect/unknown").body(Body::empty()).unwrap(),
        2,
    );
    assert_eq!(send(&app, other_peer).await.status(), StatusCode::NOT_FOUND);
    assert_eq!(send(&app, get_req("/health")).await.status(), StatusCode::OK);
}

#[tokio::test(start_paused = true)]
async fn rate_limit_resets_in_new_window() {
    let config = RelayConfig {
        rate_limit: 1,
        rate_window: Duration::from_secs(10),
        ..test_config()
    };
    let (app, _) = app_with(config);

    assert_eq!(send(&app, get_req("/redirect/x")).await.status(), StatusCode::NOT_FOUND);
    assert_eq!(send(&app, get_req("/redirect/x")).await.status(), StatusCode::TOO_MANY_REQUESTS);

    tokio::time::advance(Duration::from_secs(10)).await;
    assert_eq!(send(&app, get_req("/redirect/x")).await.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn edge_profile_only_serves_direct_redirects() {
    let config = RelayConfig {
        profile: Profile::Edge,
        ..test_config()
    };
    let (app, _) = app_with(config);

    let response = send(&app, register_req(r#"{"url": "https://example.com"}"#)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = send(&app, get_req("/redirect?url=https%3A%2F%2Fexample.com%2F")).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn cors_allows_only_configured_origin() {
    let preflight = |origin: &str| {
        Request::builder()
            .method("OPTIONS")
            .uri("/register")
            .header(header::ORIGIN, origin)
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
            .body(Body::empty())
            .unwrap()
    };
    let app = app();

    let response = send(&app, preflight("http://localhost:5173")).await;
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "http://localhost:5173"
    );
    assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");

    let response = send(&app, preflight("https://evil.example")).await;
    assert!(!response.headers().contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
}

#[tokio::test]
async fn identifying_headers_never_reach_handlers() {
    async fn echo(headers: HeaderMap) -> impl IntoResponse {
        let mut names: Vec<_> = headers.keys().map(|k| k.as_str().to_string()).collect();
        names.sort();
        names.join(",")
    }
    let app = Router::new()
        .route("/echo", get(echo))
        .layer(middleware::from_fn(strip_identifying_headers));

    let request = Request::builder()
        .uri("/echo")
        .header(header::USER_AGENT, "Mozilla/5.0")
        .header(header::REFERER, "https://tracker.example/")
        .header(header::COOKIE, "sid=1")
        .header("x-forwarded-for", "203.0.113.9")
        .header("x-real-ip", "203.0.113.9")
        .header(header::FORWARDED, "for=203.0.113.9")
        .header(header::ACCEPT, "text/html")
        .body(Body::empty())
        .unwrap();
    let response = send(&app, request).await;
    assert_eq!(body_string(response).await, "accept");
}

#[tokio::test]
async fn metrics_are_exposed() {
    let app = app();
    register(&app, "https://example.com/").await;
    let response = send(&app, get_req("/metrics")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let text = body_string(response).await;
    assert!(text.contains("relay_registrations_total"));
    assert!(text.contains("relay_stored_tokens"));
}
