//! Peripheral Transport
//!
//! [`GattTransport`] over one connected `btleplug` peripheral. Works on every
//! platform btleplug supports (BlueZ, CoreBluetooth, WinRT).

use crate::domain::profiles::ServiceKind;
use crate::infrastructure::bluetooth::error::TransportError;
use crate::infrastructure::bluetooth::transport::{
    CharacteristicHandle, GattTransport, NotificationStream, ServiceHandle,
};
use async_trait::async_trait;
use btleplug::api::{
    Central, CentralEvent, Characteristic, Manager as _, Peripheral as _, ScanFilter,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::{future, StreamExt};
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// How often the adapter's peripheral list is polled while scanning
const SCAN_POLL_INTERVAL: Duration = Duration::from_millis(250);

pub struct BtleplugTransport {
    adapter: Adapter,
    peripheral: Peripheral,
}

impl BtleplugTransport {
    /// Scan for the first peripheral advertising `kind`'s service and
    /// connect to it.
    pub async fn connect_first(
        kind: ServiceKind,
        scan_timeout: Duration,
    ) -> Result<Self, TransportError> {
        let manager = Manager::new().await?;
        let adapter = manager
            .adapters()
            .await?
            .into_iter()
            .next()
            .ok_or(TransportError::NoAdapter)?;

        let service_uuid = kind.profile().service_uuid;
        info!("Scanning for {} peripherals ({:?})", kind, scan_timeout);
        adapter
            .start_scan(ScanFilter {
                services: vec![service_uuid],
            })
            .await?;

        let found =
            tokio::time::timeout(scan_timeout, find_advertiser(&adapter, service_uuid)).await;
        if let Err(e) = adapter.stop_scan().await {
            debug!("Failed to stop scan: {}", e);
        }

        let peripheral = match found {
            Ok(result) => result?,
            Err(_) => {
                warn!("No {} peripheral found within {:?}", kind, scan_timeout);
                return Err(TransportError::PeripheralNotFound(service_uuid));
            }
        };

        let name = peripheral
            .properties()
            .await?
            .and_then(|props| props.local_name)
            .unwrap_or_else(|| "Unknown".to_string());
        info!("Connecting to {} ({})", name, peripheral.id());
        peripheral.connect().await?;
        info!("Connected to {}", name);

        Ok(Self {
            adapter,
            peripheral,
        })
    }

    pub async fn disconnect(&self) -> Result<(), TransportError> {
        if self.peripheral.is_connected().await? {
            info!("Disconnecting from {}", self.peripheral.id());
            self.peripheral.disconnect().await?;
        }
        Ok(())
    }

    fn characteristic(
        &self,
        handle: &CharacteristicHandle,
    ) -> Result<Characteristic, TransportError> {
        self.peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == handle.uuid && c.service_uuid == handle.service_uuid)
            .ok_or(TransportError::UnknownCharacteristic(handle.uuid))
    }
}

async fn find_advertiser(
    adapter: &Adapter,
    service_uuid: Uuid,
) -> Result<Peripheral, TransportError> {
    loop {
        for peripheral in adapter.peripherals().await? {
            if let Ok(Some(props)) = peripheral.properties().await {
                if props.services.contains(&service_uuid) {
                    debug!("{} advertises {}", peripheral.id(), service_uuid);
                    return Ok(peripheral);
                }
            }
        }
        tokio::time::sleep(SCAN_POLL_INTERVAL).await;
    }
}

#[async_trait]
impl GattTransport for BtleplugTransport {
    async fn discover_characteristics(
        &self,
        service: &ServiceHandle,
        ids: &[Uuid],
    ) -> Result<Vec<CharacteristicHandle>, TransportError> {
        self.peripheral.discover_services().await?;
        Ok(self
            .peripheral
            .characteristics()
            .into_iter()
            .filter(|c| c.service_uuid == service.uuid && ids.contains(&c.uuid))
            .map(|c| CharacteristicHandle {
                uuid: c.uuid,
                service_uuid: c.service_uuid,
            })
            .collect())
    }

    async fn read_value(
        &self,
        characteristic: &CharacteristicHandle,
    ) -> Result<Vec<u8>, TransportError> {
        let characteristic = self.characteristic(characteristic)?;
        Ok(self.peripheral.read(&characteristic).await?)
    }

    async fn set_notify(
        &self,
        characteristic: &CharacteristicHandle,
        enabled: bool,
    ) -> Result<(), TransportError> {
        let characteristic = self.characteristic(characteristic)?;
        if enabled {
            self.peripheral.subscribe(&characteristic).await?;
        } else {
            self.peripheral.unsubscribe(&characteristic).await?;
        }
        Ok(())
    }

    /// Payloads of one characteristic until the peripheral disconnects
    async fn notifications(
        &self,
        characteristic: &CharacteristicHandle,
    ) -> Result<NotificationStream, TransportError> {
        let uuid = characteristic.uuid;
        let payloads = self
            .peripheral
            .notifications()
            .await?
            .filter_map(move |notification| {
                future::ready((notification.uuid == uuid).then_some(notification.value))
            });

        let id = self.peripheral.id();
        let mut central_events = self.adapter.events().await?;
        let disconnected = async move {
            while let Some(event) = central_events.next().await {
                if let CentralEvent::DeviceDisconnected(gone) = event {
                    if gone == id {
                        info!("Peripheral {} disconnected", gone);
                        break;
                    }
                }
            }
        };

        Ok(Box::pin(payloads.take_until(disconnected)))
    }
}
