//! Per-client rate limiting
//!
//! Token buckets keyed by client IP. Each budget (global, single, batch) is
//! its own [`RateLimiter`]; the middleware is layered onto the routes it
//! guards with `axum::middleware::from_fn_with_state`.

use std::collections::HashMap;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::time::Instant;

/// Seconds advertised in `Retry-After`
pub const RETRY_AFTER_SECS: u64 = 60;

/// How often idle buckets are swept
pub const CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

// ============================================================================
// Rate specification
// ============================================================================

/// A request budget such as `100/minute`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateSpec {
    pub requests: u32,
    pub period: Duration,
}

impl RateSpec {
    pub fn per_second(requests: u32) -> Self {
        Self {
            requests,
            period: Duration::from_secs(1),
        }
    }

    pub fn per_minute(requests: u32) -> Self {
        Self {
            requests,
            period: Duration::from_secs(60),
        }
    }

    pub fn per_hour(requests: u32) -> Self {
        Self {
            requests,
            period: Duration::from_secs(3600),
        }
    }

    /// Tokens regained per second
    fn refill_rate(&self) -> f64 {
        self.requests as f64 / self.period.as_secs_f64()
    }

    fn unit(&self) -> &'static str {
        match self.period.as_secs() {
            1 => "second",
            60 => "minute",
            3600 => "hour",
            _ => "period",
        }
    }
}

impl fmt::Display for RateSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} per 1 {}", self.requests, self.unit())
    }
}

/// Malformed rate string
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("expected <count>/<second|minute|hour>, got {0:?}")]
pub struct RateSpecError(String);

impl FromStr for RateSpec {
    type Err = RateSpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || RateSpecError(s.to_string());
        let (count, unit) = s.trim().split_once('/').ok_or_else(err)?;

        let requests: u32 = count.trim().parse().map_err(|_| err())?;
        if requests == 0 {
            return Err(err());
        }

        match unit.trim().to_ascii_lowercase().as_str() {
            "second" | "seconds" | "s" => Ok(Self::per_second(requests)),
            "minute" | "minutes" | "m" => Ok(Self::per_minute(requests)),
            "hour" | "hours" | "h" => Ok(Self::per_hour(requests)),
            _ => Err(err()),
        }
    }
}

// ============================================================================
// Limiter
// ============================================================================

/// Bucket key
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub enum RateLimitKey {
    Ip(IpAddr),
    /// Used when the peer address is unknown
    Shared,
}

impl fmt::Display for RateLimitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateLimitKey::Ip(ip) => write!(f, "{}", ip),
            RateLimitKey::Shared => f.write_str("unknown"),
        }
    }
}

#[derive(Debug, Clone)]
struct TokenBucket {
    tokens: f64,
    capacity: f64,
    refill_rate: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(spec: RateSpec, now: Instant) -> Self {
        Self {
            tokens: spec.requests as f64,
            capacity: spec.requests as f64,
            refill_rate: spec.refill_rate(),
            last_refill: now,
        }
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.capacity);
        self.last_refill = now;
    }

    fn try_consume(&mut self, now: Instant) -> bool {
        self.refill(now);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    fn is_full(&self) -> bool {
        self.tokens >= self.capacity
    }
}

/// Request rejected for exceeding its budget
#[derive(Debug, Clone, thiserror::Error)]
#[error("Rate limit exceeded: {limit}")]
pub struct RateLimitExceeded {
    pub limit: RateSpec,
}

#[derive(Serialize)]
struct RateLimitBody {
    error: &'static str,
    message: &'static str,
    detail: String,
}

impl IntoResponse for RateLimitExceeded {
    fn into_response(self) -> Response {
        let body = RateLimitBody {
            error: "Rate limit exceeded",
            message: "Too many requests. Please try again later.",
            detail: self.limit.to_string(),
        };

        let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
        response
            .headers_mut()
            .insert(header::RETRY_AFTER, HeaderValue::from(RETRY_AFTER_SECS));
        response
    }
}

/// In-memory token-bucket limiter for one budget
#[derive(Clone)]
pub struct RateLimiter {
    buckets: Arc<Mutex<HashMap<RateLimitKey, TokenBucket>>>,
    spec: RateSpec,
}

impl RateLimiter {
    pub fn new(spec: RateSpec) -> Self {
        Self {
            buckets: Arc::new(Mutex::new(HashMap::new())),
            spec,
        }
    }

    pub fn spec(&self) -> RateSpec {
        self.spec
    }

    /// Consume one token for `key`
    pub fn check(&self, key: RateLimitKey) -> Result<(), RateLimitExceeded> {
        let now = Instant::now();
        let mut buckets = self.buckets.lock();
        let bucket = buckets
            .entry(key)
            .or_insert_with(|| TokenBucket::new(self.spec, now));

        if bucket.try_consume(now) {
            Ok(())
        } else {
            Err(RateLimitExceeded { limit: self.spec })
        }
    }

    /// Drop buckets that have fully refilled
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut buckets = self.buckets.lock();
        let before = buckets.len();
        buckets.retain(|_, bucket| {
            bucket.refill(now);
            !bucket.is_full()
        });
        before - buckets.len()
    }

    /// Number of tracked clients
    pub fn len(&self) -> usize {
        self.buckets.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.lock().is_empty()
    }

    /// Periodically sweep idle buckets for the lifetime of the runtime
    pub fn spawn_cleanup(&self, every: Duration) {
        let limiter = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                let removed = limiter.sweep();
                if removed > 0 {
                    tracing::debug!(
                        removed,
                        remaining = limiter.len(),
                        limit = %limiter.spec,
                        "Cleaned up idle rate limit buckets"
                    );
                }
            }
        });
    }
}

impl fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimiter").field("spec", &self.spec).finish()
    }
}

/// The three request budgets
#[derive(Debug, Clone)]
pub struct RateLimits {
    pub global: RateLimiter,
    pub single: RateLimiter,
    pub batch: RateLimiter,
}

impl RateLimits {
    pub fn new(global: RateSpec, single: RateSpec, batch: RateSpec) -> Self {
        Self {
            global: RateLimiter::new(global),
            single: RateLimiter::new(single),
            batch: RateLimiter::new(batch),
        }
    }

    pub fn spawn_cleanup(&self, every: Duration) {
        for limiter in [&self.global, &self.single, &self.batch] {
            limiter.spawn_cleanup(every);
        }
    }
}

// ============================================================================
// Middleware
// ============================================================================

fn client_key(request: &Request) -> RateLimitKey {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| RateLimitKey::Ip(addr.ip()))
        .unwrap_or(RateLimitKey::Shared)
}

/// Rate limits requests by client IP
pub async fn rate_limit_by_ip(
    State(limiter): State<RateLimiter>,
    request: Request,
    next: Next,
) -> Response {
    let key = client_key(&request);

    match limiter.check(key) {
        Ok(()) => next.run(request).await,
        Err(exceeded) => {
            tracing::warn!(
                ip = %key,
                path = %request.uri().path(),
                method = %request.method(),
                limit = %exceeded.limit,
                "Rate limit exceeded"
            );
            exceeded.into_response()
        }
    }
}
