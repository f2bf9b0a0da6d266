use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::http::request::Request;
use crate::http::response::Response;
use crate::routing::{HandlerResult, RouteInfo};
use crate::store::{ConnectionPool, ManageConnection, PoolStatus};

pub const SERVICE_NAME: &str = "ParkingServer";

#[derive(Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    /// Unix time in milliseconds.
    pub timestamp: u64,
}

#[derive(Serialize)]
pub struct ApiInfo {
    pub name: &'static str,
    pub version: &'static str,
    pub description: &'static str,
    pub endpoints: Vec<RouteInfo>,
}

#[derive(Serialize)]
pub struct StoreHealth {
    pub status: &'static str,
    /// Pool-assigned id of the connection that answered the probe.
    pub connection: u64,
    pub pool: PoolStatus,
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

pub fn health(_req: &mut Request, resp: &mut Response) -> HandlerResult {
    resp.json_ok(&HealthStatus {
        status: "healthy",
        service: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
        timestamp: now_ms(),
    });
    Ok(())
}

pub fn info(endpoints: &[RouteInfo], resp: &mut Response) -> HandlerResult {
    resp.json_ok(&ApiInfo {
        name: "ParkingServer API",
        version: env!("CARGO_PKG_VERSION"),
        description: "Parking Management System API",
        endpoints: endpoints.to_vec(),
    });
    Ok(())
}

/// Lease a connection, probe it and report pool statistics.
pub fn store_health<M: ManageConnection>(
    pool: &ConnectionPool<M>,
    resp: &mut Response,
) -> HandlerResult {
    let mut conn = pool.acquire()?;
    let connection = conn.id();
    let alive = pool.manager().is_valid(&mut *conn);
    drop(conn);

    resp.json_ok(&StoreHealth {
        status: if alive { "healthy" } else { "degraded" },
        connection,
        pool: pool.status(),
    });
    Ok(())
}
