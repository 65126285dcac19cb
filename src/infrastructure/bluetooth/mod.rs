//! Bluetooth Module
//!
//! GATT session protocol for standard BLE sensor services.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                   SessionController                      │
//! │   (owns the transport, runs one session per start)       │
//! └─────────────────────┬───────────────────────────────────┘
//!                       │
//!         ┌─────────────┼──────────────┐
//!         │             │              │
//!         ▼             ▼              ▼
//! ┌────────────┐  ┌───────────┐  ┌──────────────┐
//! │ Discovery  │  │  Feature  │  │ Notification │
//! │            │  │           │  │              │
//! │ - Manifest │  │ - Caps    │  │ - Pump task  │
//! │   matching │  │ - Sensor  │  │ - Decoding   │
//! │ - Timeout  │  │   location│  │ - Events     │
//! └────────────┘  └───────────┘  └──────────────┘
//!         │             │              │
//!         └─────────────┼──────────────┘
//!                       ▼
//!               ┌───────────────┐
//!               │ GattTransport │  (btleplug peripheral, or mock in tests)
//!               └───────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`transport`] - The transport trait and characteristic handles
//! - [`peripheral`] - btleplug implementation of the transport
//! - [`discovery`] - Manifest-driven characteristic discovery
//! - [`feature`] - Capability and sensor location reads
//! - [`notification`] - Measurement subscription and event stream
//! - [`session`] - Session controller tying the steps together
//! - [`error`] - Error taxonomy

pub mod discovery;
pub mod error;
pub mod feature;
#[cfg(test)]
mod mock;
pub mod notification;
pub mod peripheral;
pub mod session;
pub mod transport;

pub use peripheral::BtleplugTransport;
pub use session::{SessionConfig, SessionController, SessionOutcome};
