//! Catalog Search Gateway - Core shared types.
//!
//! This crate provides the domain types shared by the gateway binary:
//! type-safe entity identifiers and a currency-less decimal price.
//!
//! # Architecture
//!
//! The core crate contains only types and traits - no I/O, no database access,
//! no HTTP clients. This keeps it lightweight and allows it to be used from
//! the gateway's request, query-builder, and grouper modules alike.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for entity IDs and price

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
