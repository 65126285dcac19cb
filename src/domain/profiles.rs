//! Supported sensor services
//!
//! Each [`ServiceKind`] selects one static [`ServiceProfile`]: the manifest to
//! discover, the layout to decode notifications with, and the table that
//! turns its feature characteristic into a [`CapabilitySet`].

use crate::domain::capability::{Capability, CapabilitySet, FeatureBit};
use crate::domain::decoder::{Encoding, FieldSpec, RecordLayout, StatusBit};
use crate::domain::manifest::{sig_uuid, CharacteristicRole, ManifestEntry, ServiceManifest};
use crate::domain::record::{LocationTable, MeasurementField, Unit};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use CharacteristicRole::*;
use MeasurementField::*;

/// Service UUIDs (Bluetooth SIG assigned numbers)
pub mod uuids {
    use super::sig_uuid;
    use uuid::Uuid;

    pub const HEALTH_THERMOMETER: Uuid = sig_uuid(0x1809);
    pub const HEART_RATE: Uuid = sig_uuid(0x180D);
    pub const BATTERY: Uuid = sig_uuid(0x180F);
    pub const RUNNING_SPEED_AND_CADENCE: Uuid = sig_uuid(0x1814);
    pub const CYCLING_SPEED_AND_CADENCE: Uuid = sig_uuid(0x1816);

    pub const BATTERY_LEVEL: Uuid = sig_uuid(0x2A19);
    pub const TEMPERATURE_MEASUREMENT: Uuid = sig_uuid(0x2A1C);
    pub const TEMPERATURE_TYPE: Uuid = sig_uuid(0x2A1D);
    pub const INTERMEDIATE_TEMPERATURE: Uuid = sig_uuid(0x2A1E);
    pub const MEASUREMENT_INTERVAL: Uuid = sig_uuid(0x2A21);
    pub const HEART_RATE_MEASUREMENT: Uuid = sig_uuid(0x2A37);
    pub const BODY_SENSOR_LOCATION: Uuid = sig_uuid(0x2A38);
    pub const HEART_RATE_CONTROL_POINT: Uuid = sig_uuid(0x2A39);
    pub const RSC_MEASUREMENT: Uuid = sig_uuid(0x2A53);
    pub const RSC_FEATURE: Uuid = sig_uuid(0x2A54);
    pub const SC_CONTROL_POINT: Uuid = sig_uuid(0x2A55);
    pub const CSC_MEASUREMENT: Uuid = sig_uuid(0x2A5B);
    pub const CSC_FEATURE: Uuid = sig_uuid(0x2A5C);
    pub const SENSOR_LOCATION: Uuid = sig_uuid(0x2A5D);
}

/// Tag selecting one supported sensor service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ServiceKind {
    HeartRate,
    RunningSpeedAndCadence,
    CyclingSpeedAndCadence,
    Battery,
    HealthThermometer,
}

impl ServiceKind {
    pub const ALL: [ServiceKind; 5] = [
        Self::HeartRate,
        Self::RunningSpeedAndCadence,
        Self::CyclingSpeedAndCadence,
        Self::Battery,
        Self::HealthThermometer,
    ];

    pub fn profile(self) -> &'static ServiceProfile {
        match self {
            Self::HeartRate => &HEART_RATE,
            Self::RunningSpeedAndCadence => &RUNNING_SPEED_AND_CADENCE,
            Self::CyclingSpeedAndCadence => &CYCLING_SPEED_AND_CADENCE,
            Self::Battery => &BATTERY,
            Self::HealthThermometer => &HEALTH_THERMOMETER,
        }
    }

    fn cli_name(self) -> &'static str {
        match self {
            Self::HeartRate => "heart-rate",
            Self::RunningSpeedAndCadence => "running",
            Self::CyclingSpeedAndCadence => "cycling",
            Self::Battery => "battery",
            Self::HealthThermometer => "thermometer",
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.cli_name())
    }
}

impl FromStr for ServiceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.cli_name() == wanted)
            .ok_or_else(|| {
                let names: Vec<_> = Self::ALL.iter().map(|k| k.cli_name()).collect();
                format!("unknown service '{}', expected one of: {}", s, names.join(", "))
            })
    }
}

/// Everything a session needs to know about one service type
#[derive(Debug)]
pub struct ServiceProfile {
    pub kind: ServiceKind,
    pub service_uuid: Uuid,
    pub manifest: ServiceManifest,
    pub layout: RecordLayout,
    /// Feature bit positions; empty for services without a feature characteristic
    pub feature_bits: &'static [FeatureBit],
    pub location_table: LocationTable,
}

impl ServiceProfile {
    pub fn capabilities_from(&self, raw: u16) -> CapabilitySet {
        CapabilitySet::from_feature_bits(raw, self.feature_bits)
    }
}

/// Resolution of RSC/CSC event times (1/1024 s)
const EVENT_TIME_SCALE: f64 = 1.0 / 1024.0;

const RSC_MANIFEST: &[ManifestEntry] = &[
    ManifestEntry::mandatory(Measurement, uuids::RSC_MEASUREMENT),
    ManifestEntry::mandatory(Feature, uuids::RSC_FEATURE),
    ManifestEntry::optional(SensorLocation, uuids::SENSOR_LOCATION),
    ManifestEntry::optional(ControlPoint, uuids::SC_CONTROL_POINT),
];

static RUNNING_SPEED_AND_CADENCE: ServiceProfile = ServiceProfile {
    kind: ServiceKind::RunningSpeedAndCadence,
    service_uuid: uuids::RUNNING_SPEED_AND_CADENCE,
    manifest: ServiceManifest::from_static(RSC_MANIFEST),
    layout: RecordLayout {
        has_flags: true,
        fields: &[
            FieldSpec::always(InstantaneousSpeed, Encoding::U16, Unit::MetersPerSecond)
                .scaled(1.0 / 256.0),
            FieldSpec::always(InstantaneousCadence, Encoding::U8, Unit::RevolutionsPerMinute),
            FieldSpec::flagged(StrideLength, 0x01, Encoding::U16, Unit::Centimeters)
                .advertised_by(Capability::STRIDE_LENGTH),
            FieldSpec::flagged(TotalDistance, 0x02, Encoding::U32, Unit::Meters)
                .advertised_by(Capability::TOTAL_DISTANCE),
        ],
        statuses: &[StatusBit::new(Running, 0x04)],
    },
    feature_bits: &[
        FeatureBit::new(0, Capability::STRIDE_LENGTH),
        FeatureBit::new(1, Capability::TOTAL_DISTANCE),
        FeatureBit::new(2, Capability::WALKING_OR_RUNNING_STATUS),
        FeatureBit::new(3, Capability::CALIBRATION_PROCEDURE),
        FeatureBit::new(4, Capability::MULTIPLE_SENSOR_LOCATIONS),
    ],
    location_table: LocationTable::Sensor,
};

const CSC_MANIFEST: &[ManifestEntry] = &[
    ManifestEntry::mandatory(Measurement, uuids::CSC_MEASUREMENT),
    ManifestEntry::mandatory(Feature, uuids::CSC_FEATURE),
    ManifestEntry::optional(SensorLocation, uuids::SENSOR_LOCATION),
    ManifestEntry::optional(ControlPoint, uuids::SC_CONTROL_POINT),
];

static CYCLING_SPEED_AND_CADENCE: ServiceProfile = ServiceProfile {
    kind: ServiceKind::CyclingSpeedAndCadence,
    service_uuid: uuids::CYCLING_SPEED_AND_CADENCE,
    manifest: ServiceManifest::from_static(CSC_MANIFEST),
    layout: RecordLayout {
        has_flags: true,
        fields: &[
            FieldSpec::flagged(WheelRevolutions, 0x01, Encoding::U32, Unit::Revolutions)
                .advertised_by(Capability::WHEEL_REVOLUTION_DATA),
            FieldSpec::flagged(LastWheelEventTime, 0x01, Encoding::U16, Unit::Seconds)
                .scaled(EVENT_TIME_SCALE)
                .advertised_by(Capability::WHEEL_REVOLUTION_DATA),
            FieldSpec::flagged(CrankRevolutions, 0x02, Encoding::U16, Unit::Revolutions)
                .advertised_by(Capability::CRANK_REVOLUTION_DATA),
            FieldSpec::flagged(LastCrankEventTime, 0x02, Encoding::U16, Unit::Seconds)
                .scaled(EVENT_TIME_SCALE)
                .advertised_by(Capability::CRANK_REVOLUTION_DATA),
        ],
        statuses: &[],
    },
    feature_bits: &[
        FeatureBit::new(0, Capability::WHEEL_REVOLUTION_DATA),
        FeatureBit::new(1, Capability::CRANK_REVOLUTION_DATA),
        FeatureBit::new(2, Capability::MULTIPLE_SENSOR_LOCATIONS),
    ],
    location_table: LocationTable::Sensor,
};

const HEART_RATE_MANIFEST: &[ManifestEntry] = &[
    ManifestEntry::mandatory(Measurement, uuids::HEART_RATE_MEASUREMENT),
    ManifestEntry::optional(SensorLocation, uuids::BODY_SENSOR_LOCATION),
    ManifestEntry::optional(ControlPoint, uuids::HEART_RATE_CONTROL_POINT),
];

static HEART_RATE: ServiceProfile = ServiceProfile {
    kind: ServiceKind::HeartRate,
    service_uuid: uuids::HEART_RATE,
    manifest: ServiceManifest::from_static(HEART_RATE_MANIFEST),
    layout: RecordLayout {
        has_flags: true,
        fields: &[
            FieldSpec::always(
                HeartRate,
                Encoding::U8OrU16 { wide: 0x01 },
                Unit::BeatsPerMinute,
            ),
            FieldSpec::flagged(EnergyExpended, 0x08, Encoding::U16, Unit::Kilojoules),
            FieldSpec::flagged(RrIntervals, 0x10, Encoding::RepeatedU16, Unit::Seconds)
                .scaled(1.0 / 1024.0),
        ],
        statuses: &[
            StatusBit::new(SensorContactSupported, 0x04),
            StatusBit::new(SensorContactDetected, 0x02),
        ],
    },
    feature_bits: &[],
    location_table: LocationTable::Body,
};

const THERMOMETER_MANIFEST: &[ManifestEntry] = &[
    ManifestEntry::mandatory(Measurement, uuids::TEMPERATURE_MEASUREMENT),
    ManifestEntry::optional(CharacteristicRole::TemperatureType, uuids::TEMPERATURE_TYPE),
    ManifestEntry::optional(IntermediateTemperature, uuids::INTERMEDIATE_TEMPERATURE),
    ManifestEntry::optional(MeasurementInterval, uuids::MEASUREMENT_INTERVAL),
];

static HEALTH_THERMOMETER: ServiceProfile = ServiceProfile {
    kind: ServiceKind::HealthThermometer,
    service_uuid: uuids::HEALTH_THERMOMETER,
    manifest: ServiceManifest::from_static(THERMOMETER_MANIFEST),
    layout: RecordLayout {
        has_flags: true,
        fields: &[
            FieldSpec::always(Temperature, Encoding::Float, Unit::Celsius)
                .unit_when(0x01, Unit::Fahrenheit),
            FieldSpec::flagged_raw(Timestamp, 0x02, Encoding::DateTime),
            FieldSpec::flagged_raw(MeasurementField::TemperatureType, 0x04, Encoding::Code),
        ],
        statuses: &[],
    },
    feature_bits: &[],
    location_table: LocationTable::Body,
};

const BATTERY_MANIFEST: &[ManifestEntry] =
    &[ManifestEntry::mandatory(Measurement, uuids::BATTERY_LEVEL)];

static BATTERY: ServiceProfile = ServiceProfile {
    kind: ServiceKind::Battery,
    service_uuid: uuids::BATTERY,
    manifest: ServiceManifest::from_static(BATTERY_MANIFEST),
    layout: RecordLayout {
        has_flags: false,
        fields: &[FieldSpec::always(BatteryLevel, Encoding::U8, Unit::Percent)],
        statuses: &[],
    },
    feature_bits: &[],
    location_table: LocationTable::Sensor,
};
