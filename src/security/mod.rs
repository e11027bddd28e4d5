mod client_ip;
mod headers;
mod rate_limit;

pub use client_ip::client_ip;
pub use headers::security_header_layers;
pub use rate_limit::{Decision, FixedWindowLimiter, RateLimitLayer, RateLimits};
