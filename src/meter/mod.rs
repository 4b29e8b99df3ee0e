//! Per-host request metering: rate limiting, circuit breaking and backoff.

pub mod backoff;
pub mod breaker;
pub mod bucket;
