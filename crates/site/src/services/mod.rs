//! Business logic services.

pub mod waitlist;
