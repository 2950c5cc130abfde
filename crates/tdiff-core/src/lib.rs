//! tdiff Core Library
//!
//! This crate provides the truth data model and the error handling
//! shared across all tdiff components.

pub mod error;
pub mod types;

pub use error::{BoxError, Error, Result};
pub use types::*;
