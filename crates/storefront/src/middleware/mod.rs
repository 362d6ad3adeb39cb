//! HTTP middleware stack for the storefront.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (hub per request, HTTP transaction)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. Security headers
//! 5. Session layer (tower-sessions over a bounded `moka` cache)
//!
//! Auth is not a layer: the [`RequireAuth`], [`RequireAdmin`],
//! [`OptionalAuth`] and [`PageContext`] extractors restore the session on
//! demand.

pub mod auth;
pub mod page;
pub mod request_id;
pub mod security_headers;
pub mod session;

pub use auth::{AuthRejection, OptionalAuth, RequireAdmin, RequireAuth};
pub use page::PageContext;
pub use request_id::{RequestId, request_id_middleware};
pub use security_headers::security_headers_middleware;
pub use session::{SessionCache, create_session_layer};
