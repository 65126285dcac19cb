//! Session error taxonomy
//!
//! Discovery, feature and subscribe failures end a session start and are
//! reported to the caller as one [`CriticalError`]. Decode failures never
//! appear here: they are per-payload stream events.

use crate::domain::manifest::CharacteristicRole;
use crate::infrastructure::bluetooth::notification::SessionState;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Failure reported by the underlying BLE transport
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("bluetooth error: {0}")]
    Bluetooth(#[from] btleplug::Error),
    #[error("no Bluetooth adapter available")]
    NoAdapter,
    #[error("no peripheral advertising service {0} found")]
    PeripheralNotFound(Uuid),
    #[error("characteristic {0} is not known to the peripheral")]
    UnknownCharacteristic(Uuid),
    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("characteristic discovery did not complete within {0:?}")]
    Timeout(Duration),
    #[error("mandatory characteristics missing: {}", format_roles(.missing))]
    NoMandatoryCharacteristic { missing: Vec<CharacteristicRole> },
    #[error("characteristic discovery failed: {0}")]
    Transport(#[source] TransportError),
}

#[derive(Debug, Error)]
pub enum FeatureError {
    #[error("characteristic read did not complete within {0:?}")]
    Timeout(Duration),
    #[error("characteristic read returned no data")]
    NoData,
    #[error("characteristic read failed: {0}")]
    Transport(#[source] TransportError),
}

#[derive(Debug, Error)]
pub enum SubscribeError {
    #[error("peripheral rejected the notification subscription: {0}")]
    TransportRejected(#[source] TransportError),
    #[error("cannot subscribe while the session is {0:?}")]
    InvalidState(SessionState),
}

/// Fatal condition of an active notification session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SessionFault {
    #[error("peripheral disconnected")]
    Disconnected,
}

/// Terminal failure of a session controller run
#[derive(Debug, Error)]
pub enum CriticalError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
    #[error(transparent)]
    Feature(#[from] FeatureError),
    #[error(transparent)]
    Subscribe(#[from] SubscribeError),
}

/// Short user-facing description of a critical error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadableError {
    pub title: &'static str,
    pub message: &'static str,
}

impl CriticalError {
    pub fn readable(&self) -> ReadableError {
        let message = match self {
            Self::Discovery(DiscoveryError::Timeout(_))
            | Self::Discovery(DiscoveryError::NoMandatoryCharacteristic { .. }) => {
                "Can't discover mandatory characteristics"
            }
            Self::Feature(FeatureError::NoData) | Self::Feature(FeatureError::Timeout(_)) => {
                "Can't read required data"
            }
            Self::Subscribe(_) => "Can't enable measurement notifications",
            Self::Discovery(DiscoveryError::Transport(_))
            | Self::Feature(FeatureError::Transport(_)) => "Unknown error has occurred",
        };
        ReadableError {
            title: "Error",
            message,
        }
    }
}

fn format_roles(roles: &[CharacteristicRole]) -> String {
    roles
        .iter()
        .map(|role| role.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
