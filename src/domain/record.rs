//! Measurement records produced by the decoder
//!
//! A record is created fresh for every notification and owned by whoever
//! receives it. Each present field carries its physical unit.

use chrono::NaiveDateTime;
use serde::Serialize;
use std::fmt;

/// Physical unit of a decoded quantity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Unit {
    MetersPerSecond,
    RevolutionsPerMinute,
    Centimeters,
    Meters,
    Revolutions,
    Seconds,
    BeatsPerMinute,
    Kilojoules,
    Celsius,
    Fahrenheit,
    Percent,
}

impl Unit {
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::MetersPerSecond => "m/s",
            Self::RevolutionsPerMinute => "rpm",
            Self::Centimeters => "cm",
            Self::Meters => "m",
            Self::Revolutions => "rev",
            Self::Seconds => "s",
            Self::BeatsPerMinute => "bpm",
            Self::Kilojoules => "kJ",
            Self::Celsius => "°C",
            Self::Fahrenheit => "°F",
            Self::Percent => "%",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Quantity {
    pub value: f64,
    pub unit: Unit,
}

impl Quantity {
    pub fn new(value: f64, unit: Unit) -> Self {
        Self { value, unit }
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match f.precision() {
            Some(precision) => write!(f, "{:.*} {}", precision, self.value, self.unit.symbol()),
            None => write!(f, "{} {}", self.value, self.unit.symbol()),
        }
    }
}

/// Every field any supported measurement layout can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MeasurementField {
    // Running speed and cadence
    InstantaneousSpeed,
    InstantaneousCadence,
    StrideLength,
    TotalDistance,
    Running,

    // Cycling speed and cadence
    WheelRevolutions,
    LastWheelEventTime,
    CrankRevolutions,
    LastCrankEventTime,

    // Heart rate
    HeartRate,
    SensorContactSupported,
    SensorContactDetected,
    EnergyExpended,
    RrIntervals,

    // Health thermometer
    Temperature,
    Timestamp,
    TemperatureType,

    // Battery
    BatteryLevel,
}

impl fmt::Display for MeasurementField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::InstantaneousSpeed => "instantaneous speed",
            Self::InstantaneousCadence => "instantaneous cadence",
            Self::StrideLength => "stride length",
            Self::TotalDistance => "total distance",
            Self::Running => "running status",
            Self::WheelRevolutions => "wheel revolutions",
            Self::LastWheelEventTime => "last wheel event time",
            Self::CrankRevolutions => "crank revolutions",
            Self::LastCrankEventTime => "last crank event time",
            Self::HeartRate => "heart rate",
            Self::SensorContactSupported => "sensor contact supported",
            Self::SensorContactDetected => "sensor contact detected",
            Self::EnergyExpended => "energy expended",
            Self::RrIntervals => "RR-intervals",
            Self::Temperature => "temperature",
            Self::Timestamp => "timestamp",
            Self::TemperatureType => "temperature type",
            Self::BatteryLevel => "battery level",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum FieldValue {
    Quantity(Quantity),
    /// Boolean read straight from a flags bit
    Status(bool),
    Intervals(Vec<Quantity>),
    /// `None` when the peripheral reports an unknown date
    Timestamp(Option<NaiveDateTime>),
    /// Enumerated value, passed through undecoded
    Code(u8),
}

/// One decoded measurement payload
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MeasurementRecord {
    /// Present fields in payload order, followed by flag-bit statuses
    pub fields: Vec<(MeasurementField, FieldValue)>,
    /// Present fields the peripheral's feature characteristic did not advertise
    pub unadvertised: Vec<MeasurementField>,
}

impl MeasurementRecord {
    pub fn get(&self, field: MeasurementField) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(name, _)| *name == field)
            .map(|(_, value)| value)
    }

    pub fn is_present(&self, field: MeasurementField) -> bool {
        self.get(field).is_some()
    }

    pub fn quantity(&self, field: MeasurementField) -> Option<Quantity> {
        match self.get(field) {
            Some(FieldValue::Quantity(quantity)) => Some(*quantity),
            _ => None,
        }
    }

    pub fn status(&self, field: MeasurementField) -> Option<bool> {
        match self.get(field) {
            Some(FieldValue::Status(status)) => Some(*status),
            _ => None,
        }
    }
}

/// Which assigned-numbers table a location characteristic uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationTable {
    /// Sensor Location (0x2A5D), used by running and cycling sensors
    Sensor,
    /// Body Sensor Location (0x2A38), used by heart rate sensors
    Body,
}

/// Where a sensor is worn or mounted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SensorLocation {
    Other,
    TopOfShoe,
    InShoe,
    Hip,
    FrontWheel,
    LeftCrank,
    RightCrank,
    LeftPedal,
    RightPedal,
    FrontHub,
    RearDropout,
    Chainstay,
    RearWheel,
    RearHub,
    Chest,
    Spider,
    ChainRing,
    Wrist,
    Finger,
    Hand,
    EarLobe,
    Foot,
    Unknown(u8),
}

impl SensorLocation {
    pub fn from_code(table: LocationTable, code: u8) -> Self {
        match table {
            LocationTable::Sensor => match code {
                0 => Self::Other,
                1 => Self::TopOfShoe,
                2 => Self::InShoe,
                3 => Self::Hip,
                4 => Self::FrontWheel,
                5 => Self::LeftCrank,
                6 => Self::RightCrank,
                7 => Self::LeftPedal,
                8 => Self::RightPedal,
                9 => Self::FrontHub,
                10 => Self::RearDropout,
                11 => Self::Chainstay,
                12 => Self::RearWheel,
                13 => Self::RearHub,
                14 => Self::Chest,
                15 => Self::Spider,
                16 => Self::ChainRing,
                other => Self::Unknown(other),
            },
            LocationTable::Body => match code {
                0 => Self::Other,
                1 => Self::Chest,
                2 => Self::Wrist,
                3 => Self::Finger,
                4 => Self::Hand,
                5 => Self::EarLobe,
                6 => Self::Foot,
                other => Self::Unknown(other),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_accessors() {
        let record = MeasurementRecord {
            fields: vec![
                (
                    MeasurementField::StrideLength,
                    FieldValue::Quantity(Quantity::new(100.0, Unit::Centimeters)),
                ),
                (MeasurementField::Running, FieldValue::Status(true)),
            ],
            unadvertised: Vec::new(),
        };

        assert_eq!(
            record.quantity(MeasurementField::StrideLength),
            Some(Quantity::new(100.0, Unit::Centimeters))
        );
        assert_eq!(record.status(MeasurementField::Running), Some(true));
        assert_eq!(record.quantity(MeasurementField::Running), None);
        assert!(!record.is_present(MeasurementField::TotalDistance));
    }

    #[test]
    fn test_quantity_display() {
        let speed = Quantity::new(2.5, Unit::MetersPerSecond);
        assert_eq!(speed.to_string(), "2.5 m/s");
        assert_eq!(format!("{:.2}", speed), "2.50 m/s");
    }

    #[test]
    fn test_location_tables_differ() {
        assert_eq!(
            SensorLocation::from_code(LocationTable::Sensor, 1),
            SensorLocation::TopOfShoe
        );
        assert_eq!(
            SensorLocation::from_code(LocationTable::Body, 1),
            SensorLocation::Chest
        );
        assert_eq!(
            SensorLocation::from_code(LocationTable::Body, 42),
            SensorLocation::Unknown(42)
        );
    }
}
