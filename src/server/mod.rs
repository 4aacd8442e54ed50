//! HTTP API for the subscription registry and delivery engine.
//!
//! Maps verbs and paths onto registry and delivery operations. All state
//! lives in an explicit [`AppState`] handed to the router; there are no
//! process-wide globals.
//!
//! # Routes
//!
//! ```text
//! GET    /api/v1/subs              list subscriptions
//! POST   /api/v1/subs              register {name, subscription}
//! DELETE /api/v1/subs              unregister {name} or {endpoint}
//! DELETE /api/v1/clear-subs        remove all
//! POST   /api/v1/notify            broadcast {title, message}
//! POST   /api/v1/notifyone         send {name, title, message}
//! GET    /api/v1/vapid-public-key  applicationServerKey for browsers
//! ```
//!
//! Anything else under `/api` is a JSON 404. Other paths serve the static
//! front-end when a public directory is configured, falling back to
//! `index.html` for client-side routes.

// Rust guideline compliant 2026-02

pub mod error;
pub mod handlers;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};

use crate::config::Config;
use crate::delivery::DeliveryEngine;
use crate::notifications::sender::{DeliveryOptions, PushSender, WebPushSender};
use crate::registry::Registry;
use crate::store::JsonFileStore;

/// Shared application context for handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Subscription registry.
    pub registry: Arc<Registry>,
    /// Delivery engine over the same registry.
    pub delivery: Arc<DeliveryEngine>,
    /// VAPID public key (base64url) handed to browsers.
    pub vapid_public_key: Arc<str>,
}

impl AppState {
    /// Wire up the production components from configuration.
    ///
    /// Opens the subscription file (a corrupt file is fatal) and builds the
    /// web push sender.
    pub fn from_config(config: &Config) -> Result<Self> {
        let store = JsonFileStore::new(&config.data_file);
        let registry = Arc::new(Registry::open(store).with_context(|| {
            format!("Failed to open subscription store {}", config.data_file.display())
        })?);

        let sender = WebPushSender::new(config.vapid.clone(), &config.contact, config.send_timeout)?;
        let delivery = DeliveryEngine::new(
            Arc::clone(&registry),
            Arc::new(sender),
            config.delivery_options(),
        );

        Ok(Self::new(registry, delivery, config.vapid.public_key_base64url()))
    }

    /// Assemble state from already-built components.
    pub fn new(registry: Arc<Registry>, delivery: DeliveryEngine, vapid_public_key: &str) -> Self {
        Self {
            registry,
            delivery: Arc::new(delivery),
            vapid_public_key: Arc::from(vapid_public_key),
        }
    }

    /// State over an arbitrary push sender, sharing `registry`.
    pub fn with_sender(
        registry: Arc<Registry>,
        sender: Arc<dyn PushSender>,
        options: DeliveryOptions,
        vapid_public_key: &str,
    ) -> Self {
        let delivery = DeliveryEngine::new(Arc::clone(&registry), sender, options);
        Self::new(registry, delivery, vapid_public_key)
    }
}

/// Build the application router.
pub fn router(state: AppState, public_dir: Option<&Path>) -> Router {
    let api = Router::new()
        .route(
            "/v1/subs",
            get(handlers::list_subscriptions)
                .post(handlers::add_subscription)
                .delete(handlers::remove_subscription),
        )
        .route("/v1/clear-subs", delete(handlers::clear_subscriptions))
        .route("/v1/notify", post(handlers::notify_all))
        .route("/v1/notifyone", post(handlers::notify_one))
        .route("/v1/vapid-public-key", get(handlers::vapid_public_key))
        .fallback(handlers::not_found);

    let app = Router::new().nest("/api", api);

    let app = match public_dir {
        Some(dir) => {
            let index = dir.join("index.html");
            app.fallback_service(ServeDir::new(dir).fallback(ServeFile::new(index)))
        }
        None => app.fallback(handlers::not_found),
    };

    app.layer(CorsLayer::permissive()).with_state(state)
}

/// Bind and serve until Ctrl-C or SIGTERM.
pub async fn serve(config: &Config, state: AppState) -> Result<()> {
    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    log::info!("[Http] Listening on {addr}");
    log::info!("[eznotif] Server is running on port {}", config.port);

    axum::serve(listener, router(state, config.public_dir.as_deref()))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    log::info!("[eznotif] Server stopped");
    Ok(())
}

/// Resolve on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                log::error!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    log::info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifications::sender::SendError;
    use crate::test_support::{subscription, MemoryStore, Outcome, ScriptedSender};
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    struct Harness {
        app: Router,
        registry: Arc<Registry>,
        store: MemoryStore,
        sender: Arc<ScriptedSender>,
    }

    fn harness() -> Harness {
        let store = MemoryStore::default();
        let registry = Arc::new(Registry::open(store.clone()).unwrap());
        let sender = Arc::new(ScriptedSender::default());
        let state = AppState::with_sender(
            Arc::clone(&registry),
            Arc::clone(&sender) as Arc<dyn PushSender>,
            DeliveryOptions::default(),
            "BPUBLICKEY",
        );
        Harness {
            app: router(state, None),
            registry,
            store,
            sender,
        }
    }

    fn subscribe_body(name: &str, endpoint: &str) -> Value {
        let sub = subscription(endpoint);
        json!({
            "name": name,
            "subscription": {
                "endpoint": sub.endpoint,
                "expirationTime": null,
                "keys": { "p256dh": sub.keys.p256dh, "auth": sub.keys.auth }
            }
        })
    }

    async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_subscribe_list_unsubscribe_flow() {
        let h = harness();

        let (status, body) = call(&h.app, "POST", "/api/v1/subs", Some(subscribe_body("alice", "https://p.example/e1"))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body, json!({}));

        let (status, body) = call(&h.app, "GET", "/api/v1/subs", None).await;
        assert_eq!(status, StatusCode::OK);
        let list = body.as_array().unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0]["name"], "alice");
        assert_eq!(list[0]["subscription"]["endpoint"], "https://p.example/e1");

        let (status, _) = call(&h.app, "POST", "/api/v1/subs", Some(subscribe_body("alice", "https://p.example/e1"))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(h.registry.len().await, 1);

        let (status, _) = call(&h.app, "DELETE", "/api/v1/subs", Some(json!({ "name": "alice" }))).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = call(&h.app, "DELETE", "/api/v1/subs", Some(json!({ "name": "alice" }))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Subscription not found");
    }

    #[tokio::test]
    async fn test_padded_name_round_trips() {
        let h = harness();
        call(&h.app, "POST", "/api/v1/subs", Some(subscribe_body(" alice ", "https://p.example/e1"))).await;

        let (status, _) = call(&h.app, "POST", "/api/v1/notifyone", Some(json!({ "name": " alice " }))).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = call(&h.app, "DELETE", "/api/v1/subs", Some(json!({ "name": " alice " }))).await;
        assert_eq!(status, StatusCode::OK);
        assert!(h.registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_subscribe_validation_errors() {
        let h = harness();

        let (status, body) = call(
            &h.app,
            "POST",
            "/api/v1/subs",
            Some(json!({ "name": "alice", "subscription": { "keys": {} } })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].as_str().unwrap().contains("endpoint"));

        let (status, _) = call(&h.app, "POST", "/api/v1/subs", Some(json!("not an object"))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = call(&h.app, "POST", "/api/v1/subs", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        assert!(h.registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_unsubscribe_by_endpoint() {
        let h = harness();
        call(&h.app, "POST", "/api/v1/subs", Some(subscribe_body("alice", "https://p.example/e1"))).await;
        call(&h.app, "POST", "/api/v1/subs", Some(subscribe_body("alice", "https://p.example/e2"))).await;

        let (status, _) = call(
            &h.app,
            "DELETE",
            "/api/v1/subs",
            Some(json!({ "endpoint": "https://p.example/e2" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let remaining = h.registry.list().await;
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].endpoint(), "https://p.example/e1");

        let (status, _) = call(&h.app, "DELETE", "/api/v1/subs", Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_clear_always_succeeds() {
        let h = harness();
        call(&h.app, "POST", "/api/v1/subs", Some(subscribe_body("alice", "https://p.example/e1"))).await;

        let (status, _) = call(&h.app, "DELETE", "/api/v1/clear-subs", None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = call(&h.app, "DELETE", "/api/v1/clear-subs", None).await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = call(&h.app, "GET", "/api/v1/subs", None).await;
        assert_eq!(body, json!([]));
    }

    #[tokio::test]
    async fn test_notify_prunes_gone_subscribers() {
        let h = harness();
        call(&h.app, "POST", "/api/v1/subs", Some(subscribe_body("healthy", "https://p.example/e1"))).await;
        call(&h.app, "POST", "/api/v1/subs", Some(subscribe_body("stale", "https://p.example/e2"))).await;
        h.sender.on("https://p.example/e2", Outcome::Fail(SendError::Gone { status: 410 }));

        let (status, body) = call(
            &h.app,
            "POST",
            "/api/v1/notify",
            Some(json!({ "title": "Hello", "message": "World" })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Notifications sent");
        assert_eq!(body["attempted"], 2);
        assert_eq!(body["succeeded"], 1);
        assert_eq!(body["failed"], 1);
        assert_eq!(body["removed"], 1);
        assert!(body.get("failures").is_none());

        let (_, list) = call(&h.app, "GET", "/api/v1/subs", None).await;
        let names: Vec<&str> = list
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["healthy"]);
    }

    #[tokio::test]
    async fn test_notify_one_outcomes() {
        let h = harness();
        call(&h.app, "POST", "/api/v1/subs", Some(subscribe_body("alice", "https://p.example/e1"))).await;
        call(&h.app, "POST", "/api/v1/subs", Some(subscribe_body("bob", "https://p.example/e2"))).await;
        call(&h.app, "POST", "/api/v1/subs", Some(subscribe_body("carol", "https://p.example/e3"))).await;
        h.sender
            .on("https://p.example/e2", Outcome::Fail(SendError::from_status(500, "down")))
            .on("https://p.example/e3", Outcome::Fail(SendError::Gone { status: 404 }));

        let (status, body) = call(&h.app, "POST", "/api/v1/notifyone", Some(json!({ "name": "alice", "title": "Hi" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Test notification sent");

        let (status, _) = call(&h.app, "POST", "/api/v1/notifyone", Some(json!({ "name": "ghost" }))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = call(&h.app, "POST", "/api/v1/notifyone", Some(json!({ "name": "bob" }))).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);

        let (status, _) = call(&h.app, "POST", "/api/v1/notifyone", Some(json!({ "name": "carol" }))).await;
        assert_eq!(status, StatusCode::GONE);

        let (status, _) = call(&h.app, "POST", "/api/v1/notifyone", Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let names: Vec<String> = h.registry.list().await.into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["alice".to_string(), "bob".to_string()]);
    }

    #[tokio::test]
    async fn test_store_failure_is_500_and_changes_nothing() {
        let h = harness();
        h.store.fail_saves(true);

        let (status, body) = call(&h.app, "POST", "/api/v1/subs", Some(subscribe_body("alice", "https://p.example/e1"))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Internal Server Error");
        assert!(h.registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_vapid_public_key_and_unknown_routes() {
        let h = harness();

        let (status, body) = call(&h.app, "GET", "/api/v1/vapid-public-key", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["publicKey"], "BPUBLICKEY");

        let (status, body) = call(&h.app, "GET", "/api/v1/nope", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Not Found");

        let (status, _) = call(&h.app, "GET", "/api/v2/subs", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_static_files_with_spa_fallback() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::write(tmp.path().join("index.html"), "<html>app</html>").unwrap();
        std::fs::write(tmp.path().join("sw.js"), "self.addEventListener('push', () => {});").unwrap();

        let store = MemoryStore::default();
        let registry = Arc::new(Registry::open(store).unwrap());
        let state = AppState::with_sender(
            Arc::clone(&registry),
            Arc::new(ScriptedSender::default()),
            DeliveryOptions::default(),
            "BPUBLICKEY",
        );
        let app = router(state, Some(tmp.path()));

        for (uri, expected) in [("/sw.js", "addEventListener"), ("/some/client/route", "app")] {
            let response = app
                .clone()
                .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK, "{uri}");
            let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            assert!(String::from_utf8_lossy(&bytes).contains(expected), "{uri}");
        }

        // API paths still answer JSON even with a public dir
        let (status, _) = call(&app, "GET", "/api/v1/subs", None).await;
        assert_eq!(status, StatusCode::OK);

        for uri in ["/api/v1/nope", "/api/v2/subs"] {
            let (status, body) = call(&app, "GET", uri, None).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
            assert_eq!(body["message"], "Not Found", "{uri}");
        }
    }
}
