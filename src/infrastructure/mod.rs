//! Infrastructure Layer
//!
//! Bluetooth transport and session plumbing, plus logging setup.

pub mod bluetooth;
pub mod logging;
