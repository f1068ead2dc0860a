//! Shared value types used across models, repositories, and engines.

pub mod id;

pub use id::*;
