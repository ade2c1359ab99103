//! In-process app for handler tests.

use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, Response, header};
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

use murmur_db::Database;
use murmur_gateway::auth::JwtVerifier;
use murmur_gateway::dispatcher::Dispatcher;
use murmur_gateway::store::SqliteStore;

use crate::auth::{AppState, AppStateInner};
use crate::rate_limit::RateLimiter;

const SECRET: &str = "handler-test-secret";

pub struct TestApp {
    pub state: AppState,
    pub store: Arc<SqliteStore>,
    router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let store = Arc::new(SqliteStore::new(db.clone()));
        let dispatcher = Dispatcher::new(store.clone(), Arc::new(JwtVerifier::new(SECRET)));
        let state: AppState = Arc::new(AppStateInner {
            db,
            jwt_secret: SECRET.into(),
            token_ttl: chrono::Duration::days(1),
            dispatcher,
            started_at: Instant::now(),
            auth_limiter: Arc::new(RateLimiter::auth()),
            api_limiter: Arc::new(RateLimiter::api()),
        });
        Self {
            router: crate::router(state.clone()),
            state,
            store,
        }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Response<Body> {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let req = match body {
            Some(body) => req
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => req.body(Body::empty()),
        };
        self.router.clone().oneshot(req.unwrap()).await.unwrap()
    }

    /// Register `username` and return its id and token.
    pub async fn register(&self, username: &str) -> (Uuid, String) {
        let res = self
            .request(
                Method::POST,
                "/api/register",
                None,
                Some(json!({"username": username, "password": "password123"})),
            )
            .await;
        let body = body_json(res).await;
        (
            body["user_id"].as_str().unwrap().parse().unwrap(),
            body["token"].as_str().unwrap().to_string(),
        )
    }
}

pub async fn body_json(res: Response<Body>) -> Value {
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
