//! Request logging and per-IP rate limiting for the produced HTTP
//! interfaces (§6).

pub mod logging;
pub mod rate_limit;

pub use logging::{request_logging, request_logging_simple};
pub use rate_limit::{RateLimitConfig, RateLimitLayer};
