//! Common utilities and types shared across the offsync crates.
//!
//! This module provides the error type every crate reports through and the
//! small identifier types that cross crate boundaries.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::ItemId;
