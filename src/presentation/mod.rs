//! Presentation Layer
//!
//! Terminal rendering of session results.

pub mod console;
