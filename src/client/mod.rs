//! HTTP client layer: single-attempt transport and the protected client.

pub mod http;
pub mod safe;

pub use http::{ReqwestTransport, RequestDescriptor, ResponseDescriptor, Transport};
pub use safe::{target_host, SafeHttpClient};
