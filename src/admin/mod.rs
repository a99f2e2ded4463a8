//! Operations endpoint, served on its own listener.
//!
//! Every route requires `Authorization: Bearer <admin.api_key>`.

pub mod auth;
pub mod handlers;

use std::sync::Arc;

use axum::{middleware, routing::get, Router};

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::auth::CachingAuthenticator;
use crate::health::HealthRegistry;

/// Shared state for admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub api_key: Arc<str>,
    pub realm: Arc<str>,
    pub health: Arc<HealthRegistry>,
    pub cache: Option<Arc<CachingAuthenticator>>,
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/healthcheck", get(get_healthcheck))
        .route("/admin/cache", get(get_cache).delete(flush_cache))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{CachePolicy, StaticAuthenticator};
    use crate::health::{HealthProbe, HealthStatus, StaticProbe};
    use async_trait::async_trait;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request, StatusCode},
    };
    use std::time::Duration;
    use tower::ServiceExt;

    struct Down;

    #[async_trait]
    impl HealthProbe for Down {
        fn name(&self) -> &str {
            "directory"
        }

        async fn check(&self) -> HealthStatus {
            HealthStatus::unhealthy("connection refused")
        }
    }

    fn state(probe: Arc<dyn HealthProbe>) -> AdminState {
        let mut health = HealthRegistry::new(Duration::from_secs(1));
        health.register(probe);
        let users = StaticAuthenticator::default().with_user("alice", "secret");
        let cache = CachingAuthenticator::wrap(
            Box::new(users),
            CachePolicy {
                ttl: Duration::from_secs(60),
                max_entries: 10,
                cache_denials: true,
            },
        );
        AdminState {
            api_key: Arc::from("ops-key"),
            realm: Arc::from("Test Realm"),
            health: Arc::new(health),
            cache: Some(Arc::new(cache)),
        }
    }

    fn request(method: Method, path: &str, key: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(key) = key {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", key));
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn json(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), 64 * 1024).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_requires_api_key() {
        let app = setup_admin_router(state(Arc::new(StaticProbe::new("gateway", "ok"))));
        let missing = app
            .clone()
            .oneshot(request(Method::GET, "/admin/status", None))
            .await
            .unwrap();
        assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

        let wrong = app
            .oneshot(request(Method::GET, "/admin/status", Some("guess")))
            .await
            .unwrap();
        assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_status() {
        let app = setup_admin_router(state(Arc::new(StaticProbe::new("gateway", "ok"))));
        let response = app
            .oneshot(request(Method::GET, "/admin/status", Some("ops-key")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json(response).await;
        assert_eq!(body["name"], "auth-gateway");
        assert_eq!(body["realm"], "Test Realm");
        assert_eq!(body["cache_enabled"], true);
    }

    #[tokio::test]
    async fn test_healthcheck_status_codes() {
        let healthy = setup_admin_router(state(Arc::new(StaticProbe::new("gateway", "ok"))))
            .oneshot(request(Method::GET, "/admin/healthcheck", Some("ops-key")))
            .await
            .unwrap();
        assert_eq!(healthy.status(), StatusCode::OK);

        let unhealthy = setup_admin_router(state(Arc::new(Down)))
            .oneshot(request(Method::GET, "/admin/healthcheck", Some("ops-key")))
            .await
            .unwrap();
        assert_eq!(unhealthy.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = json(unhealthy).await;
        assert_eq!(body["healthy"], false);
        assert_eq!(body["checks"]["directory"]["message"], "connection refused");
    }

    #[tokio::test]
    async fn test_cache_stats_and_flush() {
        let state = state(Arc::new(StaticProbe::new("gateway", "ok")));
        let cache = state.cache.clone().unwrap();
        let credentials = crate::auth::Credentials::new("alice", "secret");
        crate::auth::Authenticator::verify(cache.as_ref(), &credentials)
            .await
            .unwrap();
        assert_eq!(cache.len(), 1);

        let app = setup_admin_router(state);
        let stats = app
            .clone()
            .oneshot(request(Method::GET, "/admin/cache", Some("ops-key")))
            .await
            .unwrap();
        let body = json(stats).await;
        assert_eq!(body["entries"], 1);
        assert_eq!(body["misses"], 1);

        let flushed = app
            .oneshot(request(Method::DELETE, "/admin/cache", Some("ops-key")))
            .await
            .unwrap();
        assert_eq!(flushed.status(), StatusCode::NO_CONTENT);
        assert!(cache.is_empty());
    }
}
