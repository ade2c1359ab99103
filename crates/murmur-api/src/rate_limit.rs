//! Fixed-window request limits per client IP.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    Json,
    extract::{ConnectInfo, Request, State},
    http::{HeaderValue, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Register and login: 20 attempts per 15 minutes.
pub const AUTH_LIMIT: (u32, Duration) = (20, Duration::from_secs(15 * 60));
/// Everything else under `/api`: 100 requests per minute.
pub const API_LIMIT: (u32, Duration) = (100, Duration::from_secs(60));

/// Prune expired windows once the table grows past this.
const PRUNE_AT: usize = 10_000;

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    hits: u32,
}

#[derive(Debug)]
pub struct RateLimiter {
    max: u32,
    window: Duration,
    message: &'static str,
    clients: Mutex<HashMap<IpAddr, Window>>,
}

#[derive(Serialize)]
struct LimitedBody {
    error: &'static str,
}

impl RateLimiter {
    pub fn new((max, window): (u32, Duration), message: &'static str) -> Self {
        Self {
            max,
            window,
            message,
            clients: Mutex::new(HashMap::new()),
        }
    }

    pub fn auth() -> Self {
        Self::new(AUTH_LIMIT, "Too many attempts. Please try again in 15 minutes.")
    }

    pub fn api() -> Self {
        Self::new(API_LIMIT, "Too many requests. Slow down!")
    }

    /// Count one hit for `ip` at `now`. `Err` carries how long until the
    /// window resets.
    pub async fn check_at(&self, ip: IpAddr, now: Instant) -> Result<(), Duration> {
        let mut clients = self.clients.lock().await;

        if clients.len() >= PRUNE_AT {
            let window = self.window;
            clients.retain(|_, w| now.duration_since(w.started) < window);
        }

        let entry = clients.entry(ip).or_insert(Window {
            started: now,
            hits: 0,
        });
        let elapsed = now.duration_since(entry.started);
        if elapsed >= self.window {
            *entry = Window {
                started: now,
                hits: 0,
            };
        }

        if entry.hits >= self.max {
            return Err(self.window - now.duration_since(entry.started));
        }
        entry.hits += 1;
        Ok(())
    }

    pub async fn check(&self, ip: IpAddr) -> Result<(), Duration> {
        self.check_at(ip, Instant::now()).await
    }
}

/// Client address from the connection. Requests served without connect
/// info (in-process tests) share one bucket.
fn client_ip(req: &Request) -> IpAddr {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

/// Middleware: reject with 429 once the caller's window is used up.
pub async fn limit(State(limiter): State<Arc<RateLimiter>>, req: Request, next: Next) -> Response {
    let ip = client_ip(&req);
    match limiter.check(ip).await {
        Ok(()) => next.run(req).await,
        Err(retry_after) => {
            warn!("Rate limit hit by {} on {}", ip, req.uri().path());
            debug!("{} may retry in {}s", ip, retry_after.as_secs());
            let mut res = (
                StatusCode::TOO_MANY_REQUESTS,
                Json(LimitedBody {
                    error: limiter.message,
                }),
            )
                .into_response();
            res.headers_mut().insert(
                header::RETRY_AFTER,
                HeaderValue::from(retry_after.as_secs().max(1)),
            );
            res
        }
    }
}
