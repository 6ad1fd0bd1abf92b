//! Zynvo Core - Shared waitlist types.
//!
//! This crate provides the types used across all Zynvo components:
//! - `site` - Waitlist service behind the landing page and admin view
//! - `cli` - Operator tools for inspecting, syncing and exporting the waitlist
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no storage access,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Normalized emails, waitlist entries, stats and signup results

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
