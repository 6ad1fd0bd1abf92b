//! Zynvo waitlist site library.
//!
//! This crate provides the waitlist data-access layer and its HTTP surface
//! as a library, allowing it to be tested and reused by the CLI.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod error;
pub mod firestore;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;
