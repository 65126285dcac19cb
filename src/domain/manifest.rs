//! Characteristic Manifests
//!
//! A manifest lists every characteristic a session cares about for one
//! service, tagged with the role it plays and whether the session can run
//! without it.

use crate::domain::error::ManifestError;
use std::borrow::Cow;
use std::collections::HashSet;
use std::fmt;
use uuid::Uuid;

/// Bluetooth Base UUID, the template for SIG-assigned 16-bit identifiers
const BLUETOOTH_BASE_UUID: u128 = 0x0000_0000_0000_1000_8000_0080_5f9b_34fb;

/// Expand a SIG-assigned 16-bit number into its full 128-bit UUID
pub const fn sig_uuid(short: u16) -> Uuid {
    Uuid::from_u128(BLUETOOTH_BASE_UUID | ((short as u128) << 96))
}

/// Logical name of a characteristic within a service session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CharacteristicRole {
    /// Notification-bearing measurement stream
    Measurement,
    /// One-shot capability bit-set
    Feature,
    /// Where the sensor is worn or mounted
    SensorLocation,
    ControlPoint,
    TemperatureType,
    IntermediateTemperature,
    MeasurementInterval,
}

impl fmt::Display for CharacteristicRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Measurement => "measurement",
            Self::Feature => "feature",
            Self::SensorLocation => "sensor location",
            Self::ControlPoint => "control point",
            Self::TemperatureType => "temperature type",
            Self::IntermediateTemperature => "intermediate temperature",
            Self::MeasurementInterval => "measurement interval",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManifestEntry {
    pub role: CharacteristicRole,
    pub uuid: Uuid,
    pub mandatory: bool,
}

impl ManifestEntry {
    pub const fn mandatory(role: CharacteristicRole, uuid: Uuid) -> Self {
        Self {
            role,
            uuid,
            mandatory: true,
        }
    }

    pub const fn optional(role: CharacteristicRole, uuid: Uuid) -> Self {
        Self {
            role,
            uuid,
            mandatory: false,
        }
    }
}

/// Ordered, immutable set of characteristics for one service type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceManifest {
    entries: Cow<'static, [ManifestEntry]>,
}

impl ServiceManifest {
    /// Build a manifest over a static table.
    ///
    /// The table is not checked here; the built-in tables are covered by
    /// [`ServiceManifest::validate`] in tests.
    pub const fn from_static(entries: &'static [ManifestEntry]) -> Self {
        Self {
            entries: Cow::Borrowed(entries),
        }
    }

    /// Build a manifest from runtime entries, rejecting inconsistent tables
    pub fn new(entries: Vec<ManifestEntry>) -> Result<Self, ManifestError> {
        let manifest = Self {
            entries: Cow::Owned(entries),
        };
        manifest.validate()?;
        Ok(manifest)
    }

    /// Check the manifest invariants: unique UUIDs, unique roles, and a
    /// mandatory measurement characteristic
    pub fn validate(&self) -> Result<(), ManifestError> {
        let mut uuids = HashSet::new();
        let mut roles = HashSet::new();
        for entry in self.entries.iter() {
            if !uuids.insert(entry.uuid) {
                return Err(ManifestError::DuplicateCharacteristic(entry.uuid));
            }
            if !roles.insert(entry.role) {
                return Err(ManifestError::DuplicateRole(entry.role));
            }
        }

        match self.entry(CharacteristicRole::Measurement) {
            Some(entry) if entry.mandatory => Ok(()),
            _ => Err(ManifestError::MissingMeasurement),
        }
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    /// Every characteristic UUID in manifest order, for a single discovery request
    pub fn uuids(&self) -> Vec<Uuid> {
        self.entries.iter().map(|e| e.uuid).collect()
    }

    pub fn mandatory(&self) -> impl Iterator<Item = &ManifestEntry> {
        self.entries.iter().filter(|e| e.mandatory)
    }

    pub fn entry(&self, role: CharacteristicRole) -> Option<&ManifestEntry> {
        self.entries.iter().find(|e| e.role == role)
    }

    pub fn entry_for_uuid(&self, uuid: &Uuid) -> Option<&ManifestEntry> {
        self.entries.iter().find(|e| &e.uuid == uuid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use CharacteristicRole::*;

    #[test]
    fn test_sig_uuid_expansion() {
        assert_eq!(
            sig_uuid(0x2A37).to_string(),
            "00002a37-0000-1000-8000-00805f9b34fb"
        );
        assert_eq!(
            sig_uuid(0x180D).to_string(),
            "0000180d-0000-1000-8000-00805f9b34fb"
        );
    }

    #[test]
    fn test_new_rejects_duplicate_uuid() {
        let result = ServiceManifest::new(vec![
            ManifestEntry::mandatory(Measurement, sig_uuid(0x2A53)),
            ManifestEntry::optional(SensorLocation, sig_uuid(0x2A53)),
        ]);
        assert!(matches!(
            result,
            Err(ManifestError::DuplicateCharacteristic(uuid)) if uuid == sig_uuid(0x2A53)
        ));
    }

    #[test]
    fn test_new_rejects_duplicate_role() {
        let result = ServiceManifest::new(vec![
            ManifestEntry::mandatory(Measurement, sig_uuid(0x2A53)),
            ManifestEntry::optional(Measurement, sig_uuid(0x2A54)),
        ]);
        assert!(matches!(result, Err(ManifestError::DuplicateRole(Measurement))));
    }

    #[test]
    fn test_new_requires_mandatory_measurement() {
        let optional_only = ServiceManifest::new(vec![ManifestEntry::optional(
            Measurement,
            sig_uuid(0x2A53),
        )]);
        assert!(matches!(optional_only, Err(ManifestError::MissingMeasurement)));

        let no_measurement =
            ServiceManifest::new(vec![ManifestEntry::mandatory(Feature, sig_uuid(0x2A54))]);
        assert!(matches!(no_measurement, Err(ManifestError::MissingMeasurement)));
    }

    #[test]
    fn test_lookup_helpers() {
        let manifest = ServiceManifest::new(vec![
            ManifestEntry::mandatory(Measurement, sig_uuid(0x2A53)),
            ManifestEntry::mandatory(Feature, sig_uuid(0x2A54)),
            ManifestEntry::optional(SensorLocation, sig_uuid(0x2A5D)),
        ])
        .unwrap();

        assert_eq!(
            manifest.uuids(),
            vec![sig_uuid(0x2A53), sig_uuid(0x2A54), sig_uuid(0x2A5D)]
        );
        assert_eq!(manifest.mandatory().count(), 2);
        assert_eq!(
            manifest.entry_for_uuid(&sig_uuid(0x2A5D)).map(|e| e.role),
            Some(SensorLocation)
        );
        assert!(manifest.entry(ControlPoint).is_none());
    }
}
