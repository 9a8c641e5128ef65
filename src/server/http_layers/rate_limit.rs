//! Rate limiting for the auth routes using tower-governor.
//!
//! Per-IP limiting keyed on the connecting address; the governor layer is
//! assembled in server.rs where the config's type parameters are concrete.

use axum::extract::{ConnectInfo, Request};
use std::net::{IpAddr, SocketAddr};
use tower_governor::{key_extractor::KeyExtractor, GovernorError};

/// Login/register attempts allowed in a burst per IP.
pub const LOGIN_BURST: u32 = 10;

/// One attempt refills every this many seconds (10 per minute).
pub const LOGIN_REFILL_SECONDS: u64 = 6;

/// Extracts the client IP from ConnectInfo for IP-based rate limiting.
#[derive(Clone)]
pub struct IpKeyExtractor;

impl KeyExtractor for IpKeyExtractor {
    type Key = IpAddr;

    fn extract<T>(&self, req: &Request<T>) -> Result<Self::Key, GovernorError> {
        req.extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip())
            .ok_or(GovernorError::UnableToExtractKey)
    }
}
