//! Route definitions and router setup
//!
//! Configures all API routes and middleware.

mod auth;
mod bhap;

use crate::config::Settings;
use crate::state::SharedState;
use axum::{
    http::{header, Method},
    routing::{get, post},
    Router,
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    request_id::MakeRequestUuid,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
    ServiceBuilderExt,
};
use tracing::Level;

/// Create the application router with all routes and middleware
pub fn create_router(state: SharedState, settings: &Settings) -> Router {
    let cors = build_cors_layer(settings);

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_request(DefaultOnRequest::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    let middleware = ServiceBuilder::new()
        .set_x_request_id(MakeRequestUuid)
        .layer(trace_layer)
        .layer(CompressionLayer::new())
        .layer(cors)
        .propagate_x_request_id();

    api_routes()
        .layer(middleware)
        .with_state(state)
}

/// Routes without the middleware stack
fn api_routes() -> Router<SharedState> {
    Router::new()
        .route("/health", get(health_check))
        // Accounts
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/refresh", post(auth::refresh))
        .route("/api/auth/me", get(auth::me))
        // BHAPs
        .route("/api/bhaps", get(bhap::list_bhaps).post(bhap::create_bhap))
        .route("/api/bhaps/{id}", get(bhap::get_bhap).put(bhap::edit_bhap))
        .route("/api/bhaps/{id}/status", post(bhap::change_status))
        .route("/api/bhaps/{id}/vote", post(bhap::cast_vote))
}

/// Build CORS layer from settings
fn build_cors_layer(settings: &Settings) -> CorsLayer {
    let origins: Vec<_> = settings
        .cors
        .allowed_origins
        .iter()
        .filter_map(|s| s.parse().ok())
        .collect();

    let layer = if origins.is_empty() {
        CorsLayer::new().allow_origin(Any)
    } else {
        CorsLayer::new().allow_origin(origins)
    };

    layer
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
        .max_age(Duration::from_secs(3600))
}

/// Health check endpoint
async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "success": true,
        "message": "Server is running fine.",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{create_tokens, Role};
    use crate::bhap::{BhapStore, MemoryStore, NewUser};
    use crate::config::BhapConfig;
    use crate::state::AppState;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    struct TestApp {
        router: Router,
        store: Arc<MemoryStore>,
    }

    fn app() -> TestApp {
        let store = Arc::new(MemoryStore::new());
        let state = Arc::new(AppState::new(store.clone(), BhapConfig::default()));
        TestApp {
            router: api_routes().with_state(state),
            store,
        }
    }

    /// Seed a user directly and return a bearer token for them
    async fn seed_user(store: &MemoryStore, first_name: &str, role: Role) -> String {
        let email = format!("{}@example.com", first_name.to_lowercase());
        let user = store
            .create_user(NewUser {
                email: email.clone(),
                password_hash: "unused".to_string(),
                first_name: first_name.to_string(),
                last_name: "Tester".to_string(),
                role,
            })
            .await
            .unwrap();
        create_tokens(user.id, &email, role).unwrap().access_token
    }

    async fn send(app: &TestApp, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header("authorization", format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => request
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        }
        .unwrap();

        let response = app.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_health() {
        let app = app();
        let (status, body) = send(&app, "GET", "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], json!(true));
    }

    #[tokio::test]
    async fn test_bhap_lifecycle_over_http() {
        let app = app();
        let author = seed_user(&app.store, "Alice", Role::Member).await;
        let bob = seed_user(&app.store, "Bob", Role::Member).await;
        let carol = seed_user(&app.store, "Carol", Role::Member).await;
        let admin = seed_user(&app.store, "Erin", Role::Admin).await;
        seed_user(&app.store, "Dave", Role::Member).await;

        let (status, body) = send(
            &app,
            "POST",
            "/api/bhaps",
            Some(&author),
            Some(json!({ "title": "Adopt semicolons", "content": "Line one\nLine two" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["bhap"]["id"], json!(0));
        assert_eq!(body["bhap"]["status"], json!("Draft"));

        let (_, body) = send(&app, "GET", "/api/bhaps/0", None, None).await;
        assert_eq!(body["mode"], json!("notLoggedIn"));
        assert_eq!(body["editable"], json!(true));

        let (_, body) = send(&app, "GET", "/api/bhaps/0", Some(&author), None).await;
        assert_eq!(body["mode"], json!("draftAuthor"));

        let (status, _) = send(
            &app,
            "POST",
            "/api/bhaps/0/status",
            Some(&author),
            Some(json!({ "status": "Discussion" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(
            &app,
            "POST",
            "/api/bhaps/0/vote",
            Some(&author),
            Some(json!({ "value": "Accepted" })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], json!("AUTHOR_CANNOT_VOTE"));

        for (token, value) in [(&bob, "Accepted"), (&admin, "Accepted"), (&carol, "Rejected")] {
            let (status, _) = send(
                &app,
                "POST",
                "/api/bhaps/0/vote",
                Some(token),
                Some(json!({ "value": value })),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let (status, body) = send(
            &app,
            "POST",
            "/api/bhaps/0/vote",
            Some(&bob),
            Some(json!({ "value": "Rejected" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], json!("DUPLICATE_VOTE"));

        let (_, body) = send(&app, "GET", "/api/bhaps/0", Some(&bob), None).await;
        assert_eq!(body["mode"], json!("discussionVoted"));
        assert_eq!(body["selectedVote"], json!("Accepted"));
        assert_eq!(
            body["tally"],
            json!({
                "acceptedCount": 2,
                "rejectedCount": 1,
                "undecidedCount": 1,
                "acceptedPct": 50,
                "rejectedPct": 25,
                "undecidedPct": 25
            })
        );

        let (status, _) = send(
            &app,
            "POST",
            "/api/bhaps/0/status",
            Some(&bob),
            Some(json!({ "status": "Accepted" })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = send(
            &app,
            "POST",
            "/api/bhaps/0/status",
            Some(&admin),
            Some(json!({ "status": "Accepted" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["bhap"]["status"], json!("Accepted"));

        let (_, body) = send(&app, "GET", "/api/bhaps/0", Some(&carol), None).await;
        assert_eq!(body["mode"], json!("finalized"));
    }

    #[tokio::test]
    async fn test_missing_and_malformed_ids() {
        let app = app();
        let (status, body) = send(&app, "GET", "/api/bhaps/12", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], json!("No BHAP with ID 12"));

        let (status, _) = send(&app, "GET", "/api/bhaps/twelve", None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_writes_require_a_token() {
        let app = app();
        let (status, _) = send(
            &app,
            "POST",
            "/api/bhaps",
            None,
            Some(json!({ "title": "Anonymous idea" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send(&app, "GET", "/api/bhaps", Some("garbage"), None).await;
        assert_eq!(status, StatusCode::OK, "listing ignores credentials");

        let (status, _) = send(&app, "GET", "/api/bhaps/0", Some("garbage"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "a bad token is not silently anonymous");
    }

    #[tokio::test]
    async fn test_register_and_login() {
        let app = app();
        let (status, body) = send(
            &app,
            "POST",
            "/api/auth/register",
            None,
            Some(json!({
                "email": "Grace@Example.com",
                "password": "compilers",
                "firstName": "Grace",
                "lastName": "Hopper"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["user"]["email"], json!("grace@example.com"));
        assert_eq!(body["user"]["role"], json!("member"));

        let (status, _) = send(
            &app,
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": "grace@example.com", "password": "wrong password" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = send(
            &app,
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": "grace@example.com", "password": "compilers" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let token = body["tokens"]["accessToken"].as_str().unwrap().to_string();

        let (status, body) = send(&app, "GET", "/api/auth/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["fullName"], json!("Grace Hopper"));
    }
}
