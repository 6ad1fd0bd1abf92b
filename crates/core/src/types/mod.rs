//! Core types for the Zynvo waitlist.
//!
//! This module provides type-safe wrappers for the waitlist domain.

pub mod email;
pub mod entry;
pub mod signup;
pub mod stats;
pub mod status;

pub use email::{Email, EmailError};
pub use entry::{TimestampMode, WaitlistEntry};
pub use signup::{QueueReason, SignupOutcome, SignupResult};
pub use stats::WaitlistStats;
pub use status::EntryStatus;
