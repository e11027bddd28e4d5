mod health;
mod inquiries;
mod products;

pub use health::health_check;
pub use inquiries::create_inquiry;
pub use products::{get_product, list_products};

use crate::config::{Config, Environment};
use crate::error::{reveal_internal_errors, ApiError};
use crate::security::{client_ip, security_header_layers, RateLimits};
use crate::storage::Storage;
use axum::{
    body::Body,
    extract::OriginalUri,
    http::{header, HeaderValue, Method, Request},
    middleware::map_response,
    response::Response,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, info_span, Span};

/// Shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn Storage>,
    pub environment: Environment,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(storage: Arc<dyn Storage>, environment: Environment) -> Self {
        Self {
            storage,
            environment,
            started_at: Instant::now(),
        }
    }
}

/// Assemble routes and middleware
///
/// Layer order, outermost first: compression, request tracing, CORS,
/// security headers, error detail (non-production only), rate limits.
pub fn build_router(state: AppState, config: &Config, limits: &RateLimits) -> Router {
    let api = Router::new()
        .route("/health", get(health_check))
        .route("/products", get(list_products))
        .route("/products/:id", get(get_product))
        .route(
            "/inquiries",
            post(create_inquiry).layer(limits.inquiries.clone()),
        )
        // Unmatched /api paths still count against the client's cap
        .fallback(route_not_found)
        .layer(limits.api.clone());

    let mut app = Router::new()
        .route("/health", get(health_check))
        .nest("/api", api)
        .fallback(route_not_found)
        .with_state(state);

    if !config.environment.is_production() {
        app = app.layer(map_response(reveal_internal_errors));
    }

    for layer in security_header_layers() {
        app = app.layer(layer);
    }

    let trusted_proxies = config.trusted_proxies.clone();

    app.layer(cors_layer(&config.cors_origins))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(move |req: &Request<Body>| {
                    let ip = client_ip(req.headers(), req.extensions(), &trusted_proxies)
                        .map(|ip| ip.to_string())
                        .unwrap_or_default();
                    let user_agent = req
                        .headers()
                        .get(header::USER_AGENT)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("")
                        .to_string();

                    info_span!(
                        "request",
                        method = %req.method(),
                        uri = %req.uri(),
                        ip = %ip,
                        user_agent = %user_agent,
                    )
                })
                .on_response(|response: &Response, latency: Duration, _span: &Span| {
                    info!(
                        status = response.status().as_u16(),
                        duration_ms = latency.as_millis() as u64,
                        "request completed"
                    );
                }),
        )
        .layer(CompressionLayer::new())
}

async fn route_not_found(method: Method, OriginalUri(uri): OriginalUri) -> ApiError {
    ApiError::RouteNotFound {
        method: method.to_string(),
        path: uri.to_string(),
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .allow_credentials(true)
}
