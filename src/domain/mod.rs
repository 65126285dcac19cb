//! Domain Layer
//!
//! Pure sensor data types and decoding. Nothing in here performs I/O except
//! settings persistence.

pub mod capability;
pub mod decoder;
pub mod error;
pub mod manifest;
pub mod profiles;
pub mod record;
pub mod settings;
