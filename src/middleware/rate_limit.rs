use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;

/// Fixed window applied to the account routes: 10 requests per client
/// per 15 minutes.
pub const AUTH_RATE_LIMIT: u32 = 10;
pub const AUTH_RATE_WINDOW: Duration = Duration::from_secs(15 * 60);

const CLEANUP_THRESHOLD: usize = 1024;

#[derive(Debug)]
struct WindowState {
    start: Instant,
    count: u32,
}

#[derive(Clone)]
pub struct AuthRateLimiter {
    max_requests: u32,
    window: Duration,
    clients: Arc<Mutex<HashMap<String, WindowState>>>,
}

impl AuthRateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests: max_requests.max(1),
            window,
            clients: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn allow(&self, client: &str) -> bool {
        let mut guard = self.clients.lock().expect("rate limiter mutex poisoned");
        let now = Instant::now();

        if guard.len() > CLEANUP_THRESHOLD {
            let window = self.window;
            guard.retain(|_, state| now.duration_since(state.start) < window);
        }

        let state = guard.entry(client.to_string()).or_insert(WindowState {
            start: now,
            count: 0,
        });
        if now.duration_since(state.start) >= self.window {
            state.start = now;
            state.count = 0;
        }
        if state.count < self.max_requests {
            state.count += 1;
            true
        } else {
            false
        }
    }
}

pub fn new_auth_limiter() -> AuthRateLimiter {
    AuthRateLimiter::new(AUTH_RATE_LIMIT, AUTH_RATE_WINDOW)
}

pub async fn auth_limit_middleware(
    State(limiter): State<AuthRateLimiter>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let client = client_key(&req);
    if !limiter.allow(&client) {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({ "msg": "Too many requests. Try again later." })),
        )
            .into_response();
    }
    next.run(req).await
}

/// Client identity for rate limiting: first hop of X-Forwarded-For
/// when present (the app runs behind a proxy), otherwise the peer
/// address.
fn client_key(req: &Request<Body>) -> String {
    if let Some(forwarded) = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
    {
        if let Some(ip) = forwarded
            .split(',')
            .next()
            .map(str::trim)
            .filter(|part| !part.is_empty())
        {
            return ip.to_string();
        }
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
