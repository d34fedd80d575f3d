//! Cartwheel Core - Shared types library.
//!
//! This crate provides common types used across all Cartwheel components:
//! - `storefront` - Cart manager and its backing stores
//! - `cli` - Command-line shopper console
//!
//! # Architecture
//!
//! The core crate contains only types and pure helpers - no I/O, no database
//! access, no HTTP clients. This keeps it lightweight and allows it to be used
//! anywhere.
//!
//! # Modules
//!
//! - [`types`] - Type-safe IDs, prices, products, and variant selections

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
