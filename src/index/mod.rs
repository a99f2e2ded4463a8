//! Embedded index engine.
//!
//! # Lifecycle
//! ```text
//! start():  create data dir → take node.lock → (optional) bind status listener
//! stop():   shut down listener (bounded) → remove node.lock
//! ```
//!
//! # Design Decisions
//! - The lock file makes a second node on the same data directory fail at
//!   startup instead of corrupting data later
//! - All resources are owned by the `Running` state and released together

pub mod engine;

pub use engine::{IndexEngine, NodeStatus};
