//! GATT Transport Interface
//!
//! The narrow surface the session core needs from a BLE stack. A transport
//! is one connected peripheral; the session controller owns it exclusively.

use crate::infrastructure::bluetooth::error::TransportError;
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use uuid::Uuid;

/// A service on the connected peripheral
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceHandle {
    pub uuid: Uuid,
}

impl ServiceHandle {
    pub fn new(uuid: Uuid) -> Self {
        Self { uuid }
    }
}

/// A discovered characteristic, opaque to everything but the transport
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CharacteristicHandle {
    pub uuid: Uuid,
    pub service_uuid: Uuid,
}

/// Ordered, unbounded sequence of raw payloads for one characteristic.
/// Ends when the peripheral disconnects.
pub type NotificationStream = Pin<Box<dyn Stream<Item = Vec<u8>> + Send>>;

#[async_trait]
pub trait GattTransport: Send + Sync {
    /// Discover the characteristics of `service` whose UUIDs are in `ids`
    async fn discover_characteristics(
        &self,
        service: &ServiceHandle,
        ids: &[Uuid],
    ) -> Result<Vec<CharacteristicHandle>, TransportError>;

    async fn read_value(
        &self,
        characteristic: &CharacteristicHandle,
    ) -> Result<Vec<u8>, TransportError>;

    /// Enable or disable notifications (or indications) on the peripheral
    async fn set_notify(
        &self,
        characteristic: &CharacteristicHandle,
        enabled: bool,
    ) -> Result<(), TransportError>;

    async fn notifications(
        &self,
        characteristic: &CharacteristicHandle,
    ) -> Result<NotificationStream, TransportError>;
}
