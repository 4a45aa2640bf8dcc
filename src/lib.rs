pub mod api;
pub mod auth;
pub mod cli;
pub mod gateway;
pub mod headers;
pub mod inner;
pub mod remote;
pub mod store;

/// User agent for outbound service-to-service calls.
pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
