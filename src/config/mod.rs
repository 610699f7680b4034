//! Configuration module
//!
//! Loads and validates the controller configuration: timing parameters,
//! strategy selection, safety policies and the intersection layout.

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{ConfigLimits, ConfigLoader, LoadResult, LoadWarning, LoaderOptions};
pub use schema::*;
pub use validation::{ValidationResult, Validator};
