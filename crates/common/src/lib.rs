//! Shared types and the error-context helpers used across linkdrop crates.

pub mod error;
pub mod types;

pub use {
    error::FromMessage,
    types::ChatType,
};
