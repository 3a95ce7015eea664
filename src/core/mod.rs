//! Core types, constants, and error types.
//!
//! Everything here is free of runtime concerns and shared by the transport
//! and session layers.

mod constants;
mod error;
mod types;

pub use constants::*;
pub use error::*;
pub use types::*;
