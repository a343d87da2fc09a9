//! Cartwheel Core - Shared cart types library.
//!
//! This crate provides the canonical shapes every other Cartwheel component
//! agrees on:
//! - `storefront` - Cart view, reconciliation and checkout service
//! - `integration-tests` - End-to-end tests against in-process fakes
//!
//! # Architecture
//!
//! The core crate contains only types and pure cart arithmetic - no I/O, no
//! HTTP clients, no storage. Normalizing untrusted upstream JSON into these
//! types is the storefront's job.
//!
//! # Modules
//!
//! - [`types`] - Opaque IDs, prices, cart lines, products and checkout intents

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
