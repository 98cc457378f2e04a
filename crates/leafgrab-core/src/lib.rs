pub mod config;
pub mod logging;

pub mod acquire;
pub mod collection;
pub mod discover;
pub mod fetch;
pub mod fingerprint;
pub mod retry;
