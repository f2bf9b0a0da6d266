//! System routes.
//!
//! # Endpoints
//! - `GET /api/health`: liveness of the HTTP layer
//! - `GET /api/health/store`: leases a pooled connection and probes it
//! - `GET /api/info`: service description and the registered endpoints
//!
//! Domain routes are registered by their owners on the same
//! [`RouterBuilder`]; register them before [`register_info_route`] so the
//! endpoint list is complete.

pub mod handlers;

use std::sync::Arc;

use crate::config::AppConfig;
use crate::http::middleware::{BearerAuth, JsonBody, RequestLogger, TokenStore};
use crate::routing::{PatternError, RouteInfo, Router, RouterBuilder};
use crate::store::{ConnectionPool, ManageConnection};

/// A builder with the server name and the global chain
/// (request logger → bearer auth → JSON body) already installed.
pub fn base_builder(config: &AppConfig, tokens: Arc<dyn TokenStore>) -> RouterBuilder {
    let mut builder = RouterBuilder::new();
    builder
        .server_name(config.server.name.clone())
        .with_global(RequestLogger::default())
        .with_global(BearerAuth::new(tokens).with_public_paths(config.auth.public_paths.clone()))
        .with_global(JsonBody);
    builder
}

/// The complete router: global chain, system routes and `/api/info`.
pub fn build_router<M: ManageConnection>(
    config: &AppConfig,
    pool: ConnectionPool<M>,
    tokens: Arc<dyn TokenStore>,
) -> Result<Router, PatternError> {
    let mut builder = base_builder(config, tokens);
    register_system_routes(&mut builder, pool)?;
    register_info_route(&mut builder)?;
    Ok(builder.build())
}

/// Register `/api/health` and `/api/health/store`.
pub fn register_system_routes<M: ManageConnection>(
    builder: &mut RouterBuilder,
    pool: ConnectionPool<M>,
) -> Result<(), PatternError> {
    builder
        .get("/api/health", vec![], handlers::health)?
        .get("/api/health/store", vec![], move |_req, resp| {
            handlers::store_health(&pool, resp)
        })?;
    tracing::info!("System routes registered");
    Ok(())
}

/// Register `/api/info`, listing every route registered so far plus itself.
pub fn register_info_route(builder: &mut RouterBuilder) -> Result<(), PatternError> {
    const INFO_PATH: &str = "/api/info";

    let mut endpoints = builder.routes();
    endpoints.push(RouteInfo {
        method: "GET".to_string(),
        path: INFO_PATH.to_string(),
    });
    builder.get(INFO_PATH, vec![], move |_req, resp| {
        handlers::info(&endpoints, resp)
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::middleware::StaticTokenStore;
    use crate::http::request::Request;
    use crate::store::{MemoryStore, PoolConfig};
    use http::Method;
    use std::time::Duration;

    fn router(store: MemoryStore) -> crate::routing::Router {
        let pool = ConnectionPool::initialize(
            store,
            PoolConfig { size: 2, acquire_timeout: Duration::from_millis(50) },
        )
        .unwrap();
        let mut builder = RouterBuilder::new();
        register_system_routes(&mut builder, pool).unwrap();
        register_info_route(&mut builder).unwrap();
        builder.build()
    }

    #[test]
    fn health_reports_healthy() {
        let resp = router(MemoryStore::new()).dispatch(Request::new(Method::GET, "/api/health"));
        assert_eq!(resp.status, 200);
        let body = resp.body_json().unwrap();
        assert_eq!(body["code"], 0);
        assert_eq!(body["data"]["status"], "healthy");
        assert_eq!(body["data"]["service"], "ParkingServer");
    }

    #[test]
    fn info_lists_endpoints() {
        let resp = router(MemoryStore::new()).dispatch(Request::new(Method::GET, "/api/info"));
        let body = resp.body_json().unwrap();
        let paths: Vec<_> = body["data"]["endpoints"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["path"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(paths, ["/api/health", "/api/health/store", "/api/info"]);
    }

    #[test]
    fn store_health_reports_pool() {
        let resp =
            router(MemoryStore::new()).dispatch(Request::new(Method::GET, "/api/health/store"));
        let body = resp.body_json().unwrap();
        assert_eq!(body["data"]["status"], "healthy");
        assert_eq!(body["data"]["pool"]["size"], 2);
        assert_eq!(body["data"]["pool"]["leased"], 0);
    }

    #[test]
    fn full_router_applies_auth() {
        let config = AppConfig::default();
        let pool = ConnectionPool::initialize(MemoryStore::new(), PoolConfig::default()).unwrap();
        let tokens = Arc::new(StaticTokenStore::new(config.auth.tokens.clone()));
        let router = build_router(&config, pool, tokens).unwrap();

        let resp = router.dispatch(Request::new(Method::GET, "/api/health"));
        assert_eq!(resp.status, 200);
        assert_eq!(resp.header("server"), Some("ParkingServer/1.0"));
        assert!(resp.header("x-request-id").is_some());

        let resp = router.dispatch(Request::new(Method::GET, "/api/info"));
        assert_eq!(resp.status, 401);

        let mut req = Request::new(Method::GET, "/api/info");
        req.headers
            .insert("authorization", http::HeaderValue::from_static("Bearer admin-token-456"));
        assert_eq!(router.dispatch(req).status, 200);
    }

    #[test]
    fn offline_store_is_unavailable() {
        let store = MemoryStore::new();
        let router = router(store.clone());
        store.set_online(false);

        let resp = router.dispatch(Request::new(Method::GET, "/api/health/store"));
        assert_eq!(resp.status, 503);
        assert_eq!(resp.body_json().unwrap()["code"], 5003);
    }
}
