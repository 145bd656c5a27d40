// Middleware for rate limiting run submissions

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};
use dashmap::DashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

// ---------------------------------------------------------------------------
// Rate limiter: token-bucket per IP, shared across requests
// ---------------------------------------------------------------------------

/// Per-IP token bucket state
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Shared rate limiter state: clone freely (it's an Arc inside)
#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<RateLimiterInner>,
}

struct RateLimiterInner {
    /// Buckets keyed by source IP
    buckets: DashMap<IpAddr, Bucket>,
    /// Maximum tokens per IP (burst capacity)
    capacity: f64,
    /// Tokens added per second (sustained rate)
    refill_rate: f64,
}

impl RateLimiter {
    /// Create a rate limiter.
    ///
    /// - `requests_per_second`: sustained rate per IP
    /// - `burst`: maximum burst (capacity above sustained rate)
    pub fn new(requests_per_second: f64, burst: f64) -> Self {
        Self {
            inner: Arc::new(RateLimiterInner {
                buckets: DashMap::new(),
                capacity: burst,
                refill_rate: requests_per_second,
            }),
        }
    }

    /// Returns true if the request from `ip` is within rate limits.
    /// Consumes one token.
    pub fn check(&self, ip: IpAddr) -> bool {
        let now = Instant::now();
        let mut bucket = self.inner.buckets.entry(ip).or_insert_with(|| Bucket {
            tokens: self.inner.capacity,
            last_refill: now,
        });

        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.inner.refill_rate).min(self.inner.capacity);
        bucket.last_refill = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Purge buckets that have been idle for more than `idle`.
    pub fn purge_idle(&self, idle: Duration) {
        let now = Instant::now();
        self.inner
            .buckets
            .retain(|_, bucket| now.duration_since(bucket.last_refill) < idle);
    }

    /// Number of currently tracked IPs.
    pub fn tracked_ips(&self) -> usize {
        self.inner.buckets.len()
    }
}

/// Axum middleware that enforces per-IP rate limiting.
///
/// The limiter is read from the request extensions; without one every
/// request passes. Returns 429 Too Many Requests when the bucket for the
/// client IP is exhausted.
pub async fn rate_limit_middleware(
    request: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(limiter) = request.extensions().get::<RateLimiter>().cloned() else {
        return Ok(next.run(request).await);
    };

    let ip = extract_ip(&request).unwrap_or(IpAddr::from([127, 0, 0, 1]));

    if limiter.check(ip) {
        Ok(next.run(request).await)
    } else {
        tracing::warn!(ip = %ip, "Rate limit exceeded");
        Err(StatusCode::TOO_MANY_REQUESTS)
    }
}

/// Client IP: leftmost `X-Forwarded-For` entry, else the socket peer.
fn extract_ip(request: &Request<Body>) -> Option<IpAddr> {
    let forwarded = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|first| first.trim().parse::<IpAddr>().ok());

    forwarded.or_else(|| {
        request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip())
    })
}
