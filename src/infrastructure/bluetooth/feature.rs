//! Feature and Location Reads
//!
//! One-shot bounded reads of characteristics that describe the sensor
//! rather than measure anything.

use crate::domain::capability::CapabilitySet;
use crate::domain::profiles::ServiceProfile;
use crate::domain::record::{LocationTable, SensorLocation};
use crate::infrastructure::bluetooth::error::FeatureError;
use crate::infrastructure::bluetooth::transport::{CharacteristicHandle, GattTransport};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Decode a feature characteristic value.
///
/// Feature values are 16-bit little endian; a single byte is zero-extended.
/// An empty value is an error, never an empty capability set.
pub fn decode_capabilities(
    profile: &ServiceProfile,
    bytes: &[u8],
) -> Result<CapabilitySet, FeatureError> {
    let raw = match bytes {
        [] => return Err(FeatureError::NoData),
        [low] => u16::from(*low),
        [low, high, ..] => u16::from_le_bytes([*low, *high]),
    };
    Ok(profile.capabilities_from(raw))
}

pub fn decode_location(table: LocationTable, bytes: &[u8]) -> Result<SensorLocation, FeatureError> {
    let code = bytes.first().ok_or(FeatureError::NoData)?;
    Ok(SensorLocation::from_code(table, *code))
}

#[derive(Debug, Clone, Copy)]
pub struct FeatureReader {
    timeout: Duration,
}

impl FeatureReader {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Read and decode the capability set of a service
    pub async fn read_capabilities<T: GattTransport + ?Sized>(
        &self,
        transport: &T,
        characteristic: &CharacteristicHandle,
        profile: &ServiceProfile,
    ) -> Result<CapabilitySet, FeatureError> {
        let bytes = self.read_bounded(transport, characteristic).await?;
        let capabilities = decode_capabilities(profile, &bytes)?;
        info!(
            "Sensor capabilities: {:?} (raw {:#06x})",
            capabilities.advertised(),
            capabilities.raw()
        );
        Ok(capabilities)
    }

    pub async fn read_sensor_location<T: GattTransport + ?Sized>(
        &self,
        transport: &T,
        characteristic: &CharacteristicHandle,
        table: LocationTable,
    ) -> Result<SensorLocation, FeatureError> {
        let bytes = self.read_bounded(transport, characteristic).await?;
        let location = decode_location(table, &bytes)?;
        info!("Sensor location: {:?}", location);
        Ok(location)
    }

    /// Exactly one read, bounded by the configured timeout
    async fn read_bounded<T: GattTransport + ?Sized>(
        &self,
        transport: &T,
        characteristic: &CharacteristicHandle,
    ) -> Result<Vec<u8>, FeatureError> {
        debug!("Reading characteristic {}", characteristic.uuid);
        match tokio::time::timeout(self.timeout, transport.read_value(characteristic)).await {
            Ok(Ok(bytes)) => {
                debug!("Read {} bytes: {:02X?}", bytes.len(), bytes);
                Ok(bytes)
            }
            Ok(Err(e)) => {
                warn!("Reading {} failed: {}", characteristic.uuid, e);
                Err(FeatureError::Transport(e))
            }
            Err(_) => {
                warn!(
                    "Reading {} timed out after {:?}",
                    characteristic.uuid, self.timeout
                );
                Err(FeatureError::Timeout(self.timeout))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::capability::Capability;
    use crate::domain::profiles::{uuids, ServiceKind};
    use crate::infrastructure::bluetooth::mock::{Call, MockTransport, Reply};

    fn rsc() -> &'static ServiceProfile {
        ServiceKind::RunningSpeedAndCadence.profile()
    }

    fn feature_handle() -> CharacteristicHandle {
        CharacteristicHandle {
            uuid: uuids::RSC_FEATURE,
            service_uuid: uuids::RUNNING_SPEED_AND_CADENCE,
        }
    }

    #[test]
    fn test_decode_single_byte() {
        let caps = decode_capabilities(rsc(), &[0b0000_0011]).unwrap();
        assert!(caps.contains(Capability::STRIDE_LENGTH));
        assert!(caps.contains(Capability::TOTAL_DISTANCE));
        assert!(!caps.contains(Capability::WALKING_OR_RUNNING_STATUS));
    }

    #[test]
    fn test_decode_two_bytes_little_endian() {
        let caps = decode_capabilities(rsc(), &[0x10, 0x00]).unwrap();
        assert!(caps.contains(Capability::MULTIPLE_SENSOR_LOCATIONS));
        assert_eq!(caps.raw(), 0x0010);
    }

    #[test]
    fn test_decode_zero_is_not_no_data() {
        let caps = decode_capabilities(rsc(), &[0x00]).unwrap();
        assert!(caps.is_reported());
        assert_eq!(caps.advertised(), Capability::empty());
    }

    #[test]
    fn test_decode_location() {
        assert_eq!(
            decode_location(LocationTable::Sensor, &[0x02]).unwrap(),
            SensorLocation::InShoe
        );
        assert!(matches!(
            decode_location(LocationTable::Sensor, &[]),
            Err(FeatureError::NoData)
        ));
    }

    #[tokio::test]
    async fn test_empty_read_is_no_data() {
        let (transport, _feed) = MockTransport::new(uuids::RUNNING_SPEED_AND_CADENCE, &[]);
        let transport = transport.with_read(uuids::RSC_FEATURE, Reply::Value(Vec::new()));

        let result = FeatureReader::new(Duration::from_millis(100))
            .read_capabilities(&transport, &feature_handle(), rsc())
            .await;

        assert!(matches!(result, Err(FeatureError::NoData)));
    }

    #[tokio::test]
    async fn test_read_times_out() {
        let (transport, _feed) = MockTransport::new(uuids::RUNNING_SPEED_AND_CADENCE, &[]);
        let transport = transport.with_read(uuids::RSC_FEATURE, Reply::Hang);
        let timeout = Duration::from_millis(20);

        let result = FeatureReader::new(timeout)
            .read_capabilities(&transport, &feature_handle(), rsc())
            .await;

        assert!(matches!(result, Err(FeatureError::Timeout(t)) if t == timeout));
    }

    #[tokio::test]
    async fn test_single_read_issued() {
        let (transport, _feed) = MockTransport::new(uuids::RUNNING_SPEED_AND_CADENCE, &[]);
        let transport = transport.with_read(uuids::RSC_FEATURE, Reply::Value(vec![0x07]));

        let caps = FeatureReader::new(Duration::from_millis(100))
            .read_capabilities(&transport, &feature_handle(), rsc())
            .await
            .unwrap();

        assert!(caps.contains(Capability::WALKING_OR_RUNNING_STATUS));
        assert_eq!(transport.calls(), vec![Call::Read(uuids::RSC_FEATURE)]);
    }

    #[tokio::test]
    async fn test_transport_failure() {
        let (transport, _feed) = MockTransport::new(uuids::RUNNING_SPEED_AND_CADENCE, &[]);
        let transport = transport.with_read(uuids::RSC_FEATURE, Reply::Fail("gatt error"));

        let result = FeatureReader::new(Duration::from_millis(100))
            .read_capabilities(&transport, &feature_handle(), rsc())
            .await;

        assert!(matches!(result, Err(FeatureError::Transport(_))));
    }
}
