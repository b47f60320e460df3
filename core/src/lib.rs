//! Core library for printwarden
//!
//! This crate defines the error taxonomy and the shared vocabulary types
//! used across all printwarden components.

pub mod error;
pub mod types;

// Re-exports
pub use error::{Error, Result};
pub use types::{ControllerFailMode, PrinterState};
