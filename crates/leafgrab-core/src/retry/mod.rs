//! Retry and backoff policy.
//!
//! Error classification (timeouts, throttling, connection failures) and
//! backoff decisions live here so discovery probes and bulk fetch tasks
//! share one policy. A probe that exhausts its budget is reported as an
//! error to the caller, which decides what exhaustion means (discovery
//! treats it as "leaf absent", the bulk phase abandons the leaf).

mod classify;
mod policy;
mod run;

pub use classify::{classify, classify_curl_error, classify_http_status};
pub use policy::{ErrorKind, RetryDecision, RetryPolicy};
pub use run::run_with_retry;
