//! Errors raised by the pure domain layer

use crate::domain::manifest::CharacteristicRole;
use crate::domain::record::MeasurementField;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ManifestError {
    #[error("characteristic {0} appears more than once in the manifest")]
    DuplicateCharacteristic(Uuid),
    #[error("role '{0}' appears more than once in the manifest")]
    DuplicateRole(CharacteristicRole),
    #[error("manifest has no mandatory measurement characteristic")]
    MissingMeasurement,
}

/// Failure to decode a single measurement payload
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("empty payload: expected a flags byte")]
    Empty,
    #[error("payload truncated at {field}: needs {needed} bytes, {remaining} remaining")]
    Truncated {
        field: MeasurementField,
        needed: usize,
        remaining: usize,
    },
    #[error("malformed {field}: {reason}")]
    Malformed {
        field: MeasurementField,
        reason: &'static str,
    },
}
