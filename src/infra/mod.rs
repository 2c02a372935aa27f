//! Infrastructure adapters and runtime bootstrap.

pub mod engine;
pub mod error;
pub mod fonts;
pub mod telemetry;
