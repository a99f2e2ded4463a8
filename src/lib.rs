//! Authentication gateway library.
//!
//! Puts HTTP Basic authentication in front of a set of resources, verifying
//! credentials against a static user table or an LDAP directory (optionally
//! behind a TTL cache), and manages embedded components whose resources
//! follow the service's start/stop.

pub mod admin;
pub mod auth;
pub mod config;
pub mod health;
pub mod http;
pub mod index;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::schema::GatewayConfig;
pub use http::GatewayServer;
pub use lifecycle::{assemble, Gateway, RunningGateway, Shutdown, StartupError};
