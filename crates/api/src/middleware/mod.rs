//! HTTP middleware stack for the API.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (capture errors, transactions)
//! 2. CORS
//! 3. `TraceLayer` (request tracing)
//! 4. Request ID (add unique ID to each request)
//! 5. Rate limiting (governor), strict on `/auth`
//!
//! Authentication is done per handler with extractors from [`auth`].

pub mod auth;
pub mod rate_limit;
pub mod request_id;

pub use auth::{AuthRejection, RequireAdmin, RequirePartner, RequireUser};
pub use rate_limit::{ClientIp, api_rate_limiter, auth_rate_limiter, client_ip};
pub use request_id::request_id_middleware;
