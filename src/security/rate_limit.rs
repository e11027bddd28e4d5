//! Fixed-window request caps per client IP
//!
//! Each client gets a counter that resets once its window has elapsed.
//! Requests whose address cannot be determined share one counter.

use crate::config::RateLimitSettings;
use crate::error::ApiError;
use crate::security::client_ip;
use axum::{
    body::Body,
    http::{HeaderMap, HeaderName, HeaderValue, Request},
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use ipnetwork::IpNetwork;
use std::{
    future::Future,
    net::IpAddr,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
    time::{Duration, Instant},
};
use tokio::time::interval;
use tower::{Layer, Service};
use tracing::{debug, warn};

const API_LIMIT_MESSAGE: &str = "Too many requests from this IP, please try again later.";
const INQUIRY_LIMIT_MESSAGE: &str =
    "Too many inquiry submissions from this IP, please try again later.";

const RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("ratelimit-limit");
const RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("ratelimit-remaining");
const RATELIMIT_RESET: HeaderName = HeaderName::from_static("ratelimit-reset");

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

/// Outcome of counting one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_after: Duration,
}

pub struct FixedWindowLimiter {
    windows: DashMap<Option<IpAddr>, Window>,
    max_requests: u32,
    window: Duration,
}

impl FixedWindowLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            windows: DashMap::new(),
            max_requests,
            window,
        }
    }

    /// Count a request from `client` at `now`
    pub fn check(&self, client: Option<IpAddr>, now: Instant) -> Decision {
        let mut entry = self.windows.entry(client).or_insert(Window {
            started: now,
            count: 0,
        });

        if now.duration_since(entry.started) >= self.window {
            *entry = Window {
                started: now,
                count: 0,
            };
        }

        let reset_after = self.window.saturating_sub(now.duration_since(entry.started));

        if entry.count >= self.max_requests {
            return Decision {
                allowed: false,
                limit: self.max_requests,
                remaining: 0,
                reset_after,
            };
        }

        entry.count += 1;

        Decision {
            allowed: true,
            limit: self.max_requests,
            remaining: self.max_requests - entry.count,
            reset_after,
        }
    }

    /// Drop windows that have already expired; returns how many were removed
    pub fn purge_expired(&self, now: Instant) -> usize {
        let before = self.windows.len();
        self.windows
            .retain(|_, w| now.duration_since(w.started) < self.window);
        before.saturating_sub(self.windows.len())
    }

    pub fn tracked_clients(&self) -> usize {
        self.windows.len()
    }
}

#[derive(Clone)]
pub struct RateLimitLayer {
    limiter: Arc<FixedWindowLimiter>,
    trusted_proxies: Arc<Vec<IpNetwork>>,
    message: &'static str,
}

impl RateLimitLayer {
    pub fn new(
        limiter: FixedWindowLimiter,
        trusted_proxies: Vec<IpNetwork>,
        message: &'static str,
    ) -> Self {
        Self {
            limiter: Arc::new(limiter),
            trusted_proxies: Arc::new(trusted_proxies),
            message,
        }
    }

    pub fn limiter(&self) -> &FixedWindowLimiter {
        &self.limiter
    }
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimitService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimitService {
            inner,
            layer: self.clone(),
        }
    }
}

#[derive(Clone)]
pub struct RateLimitService<S> {
    inner: S,
    layer: RateLimitLayer,
}

impl<S> Service<Request<Body>> for RateLimitService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let layer = self.layer.clone();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let client = client_ip(req.headers(), req.extensions(), &layer.trusted_proxies);
            let decision = layer.limiter.check(client, Instant::now());

            if !decision.allowed {
                warn!(
                    "Rate limit exceeded for {} on {}",
                    client.map(|ip| ip.to_string()).unwrap_or_else(|| "unknown client".to_string()),
                    req.uri().path()
                );
                let mut response = ApiError::RateLimited {
                    message: layer.message.to_string(),
                    retry_after: decision.reset_after,
                }
                .into_response();
                set_rate_limit_headers(response.headers_mut(), &decision);
                return Ok(response);
            }

            let mut response = inner.call(req).await?;
            set_rate_limit_headers(response.headers_mut(), &decision);
            Ok(response)
        })
    }
}

/// Standard `RateLimit-*` headers; an inner (stricter) limiter's values win
fn set_rate_limit_headers(headers: &mut HeaderMap, decision: &Decision) {
    let reset_secs = decision.reset_after.as_secs_f64().ceil() as u64;

    headers
        .entry(RATELIMIT_LIMIT)
        .or_insert(HeaderValue::from(decision.limit));
    headers
        .entry(RATELIMIT_REMAINING)
        .or_insert(HeaderValue::from(decision.remaining));
    headers
        .entry(RATELIMIT_RESET)
        .or_insert(HeaderValue::from(reset_secs));
}

/// The two limits the API applies: all of `/api`, and inquiry submissions
#[derive(Clone)]
pub struct RateLimits {
    pub api: RateLimitLayer,
    pub inquiries: RateLimitLayer,
}

impl RateLimits {
    pub fn new(settings: &RateLimitSettings, trusted_proxies: Vec<IpNetwork>) -> Self {
        Self {
            api: RateLimitLayer::new(
                FixedWindowLimiter::new(settings.api_max_requests, settings.window),
                trusted_proxies.clone(),
                API_LIMIT_MESSAGE,
            ),
            inquiries: RateLimitLayer::new(
                FixedWindowLimiter::new(settings.inquiry_max_requests, settings.window),
                trusted_proxies,
                INQUIRY_LIMIT_MESSAGE,
            ),
        }
    }

    /// Periodically forget clients whose windows have expired
    pub fn spawn_purge_task(&self, every: Duration) {
        let limits = self.clone();

        tokio::spawn(async move {
            let mut ticker = interval(every);

            loop {
                ticker.tick().await;
                let now = Instant::now();
                let removed = limits.api.limiter().purge_expired(now)
                    + limits.inquiries.limiter().purge_expired(now);
                if removed > 0 {
                    debug!("Purged {} expired rate-limit windows", removed);
                }
            }
        });
    }
}
