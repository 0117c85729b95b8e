//! Shared types for the task board

pub mod error;

pub use error::{BoardError, Result};
