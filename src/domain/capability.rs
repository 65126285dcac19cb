//! Sensor capabilities decoded from feature characteristics

use bitflags::bitflags;

bitflags! {
    /// Optional measurement features a peripheral can advertise.
    ///
    /// These are service-independent; each service profile maps its own
    /// feature bit positions onto them.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Capability: u16 {
        const STRIDE_LENGTH = 1 << 0;
        const TOTAL_DISTANCE = 1 << 1;
        const WALKING_OR_RUNNING_STATUS = 1 << 2;
        const CALIBRATION_PROCEDURE = 1 << 3;
        const MULTIPLE_SENSOR_LOCATIONS = 1 << 4;
        const WHEEL_REVOLUTION_DATA = 1 << 5;
        const CRANK_REVOLUTION_DATA = 1 << 6;
    }
}

/// Position of a feature bit in a service's feature characteristic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureBit {
    pub mask: u16,
    pub capability: Capability,
}

impl FeatureBit {
    pub const fn new(bit: u8, capability: Capability) -> Self {
        Self {
            mask: 1 << bit,
            capability,
        }
    }
}

/// Capabilities a peripheral reported for the current connection.
///
/// A set is either *reported* (read from a feature characteristic) or
/// *unreported* (the service has no feature characteristic). Only reported
/// sets are used to flag unexpected fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CapabilitySet {
    advertised: Option<Capability>,
    raw: u16,
}

impl CapabilitySet {
    /// Decode a raw feature value using a service's bit table.
    /// Bits with no entry in the table are kept in [`CapabilitySet::raw`] only.
    pub fn from_feature_bits(raw: u16, table: &[FeatureBit]) -> Self {
        let advertised = table
            .iter()
            .filter(|bit| raw & bit.mask != 0)
            .fold(Capability::empty(), |acc, bit| acc | bit.capability);
        Self {
            advertised: Some(advertised),
            raw,
        }
    }

    /// The set used for services that have no feature characteristic
    pub const fn unreported() -> Self {
        Self {
            advertised: None,
            raw: 0,
        }
    }

    pub fn is_reported(&self) -> bool {
        self.advertised.is_some()
    }

    pub fn contains(&self, capability: Capability) -> bool {
        self.advertised
            .map(|advertised| advertised.contains(capability))
            .unwrap_or(false)
    }

    /// Whether a field gated by `capability` is expected to appear
    pub fn expects(&self, capability: Capability) -> bool {
        self.advertised
            .map(|advertised| advertised.contains(capability))
            .unwrap_or(true)
    }

    pub fn advertised(&self) -> Capability {
        self.advertised.unwrap_or_default()
    }

    pub fn raw(&self) -> u16 {
        self.raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &[FeatureBit] = &[
        FeatureBit::new(0, Capability::STRIDE_LENGTH),
        FeatureBit::new(1, Capability::TOTAL_DISTANCE),
        FeatureBit::new(4, Capability::MULTIPLE_SENSOR_LOCATIONS),
    ];

    #[test]
    fn test_from_feature_bits() {
        let set = CapabilitySet::from_feature_bits(0b1_0001, TABLE);
        assert!(set.is_reported());
        assert!(set.contains(Capability::STRIDE_LENGTH));
        assert!(set.contains(Capability::MULTIPLE_SENSOR_LOCATIONS));
        assert!(!set.contains(Capability::TOTAL_DISTANCE));
        assert_eq!(set.raw(), 0b1_0001);
    }

    #[test]
    fn test_zero_value_is_reported_but_empty() {
        let set = CapabilitySet::from_feature_bits(0, TABLE);
        assert!(set.is_reported());
        assert_eq!(set.advertised(), Capability::empty());
        assert!(!set.expects(Capability::STRIDE_LENGTH));
    }

    #[test]
    fn test_unknown_bits_only_kept_raw() {
        let set = CapabilitySet::from_feature_bits(0b0100, TABLE);
        assert_eq!(set.advertised(), Capability::empty());
        assert_eq!(set.raw(), 0b0100);
    }

    #[test]
    fn test_unreported_expects_everything() {
        let set = CapabilitySet::unreported();
        assert!(!set.is_reported());
        assert!(!set.contains(Capability::TOTAL_DISTANCE));
        assert!(set.expects(Capability::TOTAL_DISTANCE));
    }
}
