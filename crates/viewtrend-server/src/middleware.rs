use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use axum::{
    extract::{Request, State},
    http::{
        header::{AUTHORIZATION, RETRY_AFTER, WWW_AUTHENTICATE},
        HeaderMap, HeaderValue,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use subtle::ConstantTimeEq;
use tokio::sync::Mutex;
use uuid::Uuid;
use viewtrend_core::AppConfig;

use crate::api::ApiError;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

const MAX_REQUEST_ID_LEN: usize = 128;
const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);

/// Request ID for the current request, stored as a request extension.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Bearer tokens accepted on protected routes.
#[derive(Debug, Clone)]
pub struct AuthState {
    api_keys: Arc<[String]>,
}

impl AuthState {
    /// Accepts the tokens in `VIEWTREND_API_KEYS`.
    ///
    /// # Errors
    ///
    /// Fails when no key is configured outside development.
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        Self::from_keys(&config.api_keys, config.is_development())
    }

    pub(crate) fn from_keys(keys: &[String], is_development: bool) -> anyhow::Result<Self> {
        let mut keys: Vec<String> = keys
            .iter()
            .map(|k| k.trim().to_owned())
            .filter(|k| !k.is_empty())
            .collect();
        keys.sort();
        keys.dedup();

        match (keys.is_empty(), is_development) {
            (false, _) => Ok(Self {
                api_keys: keys.into(),
            }),
            (true, true) => {
                tracing::warn!("VIEWTREND_API_KEYS is empty; protected routes are open");
                Ok(Self::disabled())
            }
            (true, false) => anyhow::bail!(
                "VIEWTREND_API_KEYS must list at least one bearer token outside development"
            ),
        }
    }

    #[must_use]
    pub fn disabled() -> Self {
        Self {
            api_keys: Arc::from(Vec::new()),
        }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        !self.api_keys.is_empty()
    }

    /// Compares against every key without short-circuiting on the first match.
    fn allows(&self, token: &str) -> bool {
        self.api_keys
            .iter()
            .fold(subtle::Choice::from(0), |acc, key| {
                acc | key.as_bytes().ct_eq(token.as_bytes())
            })
            .into()
    }
}

/// Per-minute request budget shared by every protected route. A budget of
/// zero turns the limiter off.
#[derive(Debug, Clone)]
pub struct RateLimitState {
    budget: u32,
    window: Duration,
    counter: Arc<Mutex<WindowCounter>>,
}

#[derive(Debug)]
struct WindowCounter {
    opened_at: Instant,
    used: u32,
}

#[derive(Debug, PartialEq, Eq)]
enum Admission {
    Allowed,
    Limited { retry_after: Duration },
}

impl RateLimitState {
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.rate_limit_per_minute, RATE_LIMIT_WINDOW)
    }

    #[must_use]
    pub fn new(budget: u32, window: Duration) -> Self {
        Self {
            budget,
            window,
            counter: Arc::new(Mutex::new(WindowCounter {
                opened_at: Instant::now(),
                used: 0,
            })),
        }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.budget > 0
    }

    async fn admit(&self) -> Admission {
        if !self.is_enabled() {
            return Admission::Allowed;
        }

        let mut counter = self.counter.lock().await;
        let now = Instant::now();
        if now.duration_since(counter.opened_at) >= self.window {
            counter.opened_at = now;
            counter.used = 0;
        }

        if counter.used < self.budget {
            counter.used += 1;
            Admission::Allowed
        } else {
            let open_for = now.duration_since(counter.opened_at);
            Admission::Limited {
                retry_after: self.window.saturating_sub(open_for),
            }
        }
    }
}

/// Whole seconds, rounded up, never below one.
fn retry_after_secs(wait: Duration) -> u64 {
    let secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
    secs.max(1)
}

/// Accepts a caller-supplied request ID only if it is short printable ASCII.
fn incoming_request_id(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(REQUEST_ID_HEADER)?.to_str().ok()?.trim();
    let usable = !value.is_empty()
        && value.len() <= MAX_REQUEST_ID_LEN
        && value.bytes().all(|b| b.is_ascii_graphic());
    usable.then(|| value.to_owned())
}

/// Error envelope for requests stopped before they reach a handler.
fn reject(req: &Request, code: &str, message: &str) -> Response {
    let request_id = req
        .extensions()
        .get::<RequestId>()
        .map(|id| id.0.clone())
        .unwrap_or_default();
    ApiError::new(request_id, code, message).into_response()
}

/// Tags every request with an ID, reusing a well-formed `x-request-id`
/// header and otherwise minting a `UUIDv4`. The ID is echoed on the response.
pub async fn request_id(mut req: Request, next: Next) -> Response {
    let id = incoming_request_id(req.headers()).unwrap_or_else(|| Uuid::new_v4().to_string());
    req.extensions_mut().insert(RequestId(id.clone()));

    let mut res = next.run(req).await;
    if let Ok(value) = HeaderValue::from_str(&id) {
        res.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    res
}

pub async fn require_bearer_auth(
    State(auth): State<AuthState>,
    req: Request,
    next: Next,
) -> Response {
    if !auth.is_enabled() {
        return next.run(req).await;
    }

    match bearer_token(req.headers()) {
        Some(token) if auth.allows(token) => next.run(req).await,
        _ => {
            let mut res = reject(&req, "unauthorized", "missing or invalid bearer token");
            res.headers_mut()
                .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
            res
        }
    }
}

pub async fn enforce_rate_limit(
    State(limiter): State<RateLimitState>,
    req: Request,
    next: Next,
) -> Response {
    match limiter.admit().await {
        Admission::Allowed => next.run(req).await,
        Admission::Limited { retry_after } => {
            tracing::debug!(retry_after = ?retry_after, "request rate limited");
            let mut res = reject(&req, "rate_limited", "rate limit exceeded");
            res.headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(retry_after_secs(retry_after)));
            res
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|s| !s.is_empty())
}
