//! Core types for the catalog search gateway.
//!
//! This module provides type-safe wrappers for the identifiers and price
//! values that flow through the search pipeline.

pub mod id;
pub mod price;

pub use id::*;
pub use price::{Price, PriceError};
