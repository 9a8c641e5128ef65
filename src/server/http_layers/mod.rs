mod rate_limit;
mod requests_logging;
mod telemetry_layer;

#[cfg(feature = "slowdown")]
mod random_slowdown;

pub use rate_limit::{IpKeyExtractor, LOGIN_BURST, LOGIN_REFILL_SECONDS};
pub use requests_logging::{log_requests, RequestsLoggingLevel};
pub use telemetry_layer::{meta_from_headers, observe_requests};

#[cfg(feature = "slowdown")]
pub use random_slowdown::slowdown_request;
