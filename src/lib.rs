//! BLE sensor GATT sessions
//!
//! Connects to standard Bluetooth LE sensor services (heart rate, running
//! and cycling speed and cadence, battery, health thermometer), resolves
//! their characteristics, reads their feature flags and streams decoded
//! measurements.

pub mod domain;
pub mod infrastructure;
pub mod presentation;
