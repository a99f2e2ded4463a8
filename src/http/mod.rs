//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, request ID, timeout, tracing)
//!     → gate.rs (extract Basic credentials, verify, attach Principal)
//!         ├─ missing/malformed/denied → response.rs 401 + challenge
//!         ├─ backend unavailable      → response.rs 503
//!         └─ granted                  → resources.rs
//! ```

pub mod gate;
pub mod resources;
pub mod response;
pub mod server;

pub use gate::{AuthGate, Rejection};
pub use server::GatewayServer;
