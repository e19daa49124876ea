//! Middleware module
//!
//! Cross-cutting request processing applied before handlers run

pub mod logging;
pub mod rate_limit;

pub use logging::{HandlerTimer, LoggingMiddleware};
pub use rate_limit::RateLimitMiddleware;
