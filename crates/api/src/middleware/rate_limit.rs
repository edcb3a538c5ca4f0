//! Per-client rate limits and client IP resolution.
//!
//! The same IP lookup feeds the limiter key and the `vnp_IpAddr` sent to
//! VNPay, so both see the shopper behind the load balancer.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::{HeaderMap, Request, request::Parts};
use governor::clock::QuantaInstant;
use governor::middleware::NoOpMiddleware;
use tower_governor::{GovernorError, GovernorLayer, governor::GovernorConfigBuilder};

/// Proxy headers that carry the real client address, most trusted first.
const CLIENT_IP_HEADERS: &[&str] = &["cf-connecting-ip", "x-forwarded-for", "x-real-ip"];

/// Best-effort client IP: proxy headers first, then the socket peer.
///
/// `X-Forwarded-For` contributes its first (client-most) entry.
#[must_use]
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<IpAddr> {
    CLIENT_IP_HEADERS
        .iter()
        .find_map(|name| {
            headers
                .get(*name)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.split(',').next())
                .and_then(|s| s.trim().parse::<IpAddr>().ok())
        })
        .or_else(|| peer.map(|addr| addr.ip()))
}

/// Handler extractor for the client IP. Never rejects.
#[derive(Debug, Clone, Copy)]
pub struct ClientIp(pub Option<IpAddr>);

impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        Ok(Self(client_ip(&parts.headers, peer)))
    }
}

/// Key extractor that rate limits per client IP, honouring proxy headers.
#[derive(Clone, Copy)]
pub struct ClientIpKeyExtractor;

impl tower_governor::key_extractor::KeyExtractor for ClientIpKeyExtractor {
    type Key = IpAddr;

    fn extract<T>(&self, req: &Request<T>) -> Result<Self::Key, GovernorError> {
        let peer = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        client_ip(req.headers(), peer).ok_or(GovernorError::UnableToExtractKey)
    }
}

/// Token bucket for one route group, keyed by client IP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quota {
    /// Seconds to earn back one request.
    pub replenish_secs: u64,
    pub burst: u32,
}

/// `/auth/*`: about ten attempts a minute once the burst is spent.
pub const AUTH_QUOTA: Quota = Quota {
    replenish_secs: 6,
    burst: 5,
};

/// Everything else under `/api/v1`.
pub const API_QUOTA: Quota = Quota {
    replenish_secs: 1,
    burst: 50,
};

pub type RateLimiterLayer =
    GovernorLayer<ClientIpKeyExtractor, NoOpMiddleware<QuantaInstant>, axum::body::Body>;

/// Build a per-IP limiter layer.
///
/// # Panics
///
/// Panics if `quota` has a zero period or burst. Both quotas above are
/// non-zero constants.
#[must_use]
pub fn limiter(quota: Quota) -> RateLimiterLayer {
    let config = GovernorConfigBuilder::default()
        .key_extractor(ClientIpKeyExtractor)
        .per_second(quota.replenish_secs)
        .burst_size(quota.burst)
        .finish()
        .expect("rate limit quotas are non-zero");
    GovernorLayer::new(Arc::new(config))
}

#[must_use]
pub fn auth_rate_limiter() -> RateLimiterLayer {
    limiter(AUTH_QUOTA)
}

#[must_use]
pub fn api_rate_limiter() -> RateLimiterLayer {
    limiter(API_QUOTA)
}
