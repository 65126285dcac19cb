//! Session Controller
//!
//! Runs one service session on an owned transport: discovery, feature read,
//! subscription. Each step is attempted at most once per [`SessionController::start`];
//! the first failure ends the run with a [`CriticalError`].

use crate::domain::capability::CapabilitySet;
use crate::domain::manifest::CharacteristicRole;
use crate::domain::profiles::{ServiceKind, ServiceProfile};
use crate::domain::record::SensorLocation;
use crate::domain::settings::Settings;
use crate::infrastructure::bluetooth::discovery::DiscoveryResolver;
use crate::infrastructure::bluetooth::error::{CriticalError, SubscribeError, TransportError};
use crate::infrastructure::bluetooth::feature::FeatureReader;
use crate::infrastructure::bluetooth::notification::{
    NotificationSession, SessionState, StreamEvent,
};
use crate::infrastructure::bluetooth::transport::{GattTransport, ServiceHandle};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Timing and buffering of one session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    pub discovery_timeout: Duration,
    pub feature_read_timeout: Duration,
    pub event_channel_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::from(&Settings::default())
    }
}

impl From<&Settings> for SessionConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            discovery_timeout: settings.discovery_timeout(),
            feature_read_timeout: settings.feature_read_timeout(),
            event_channel_capacity: settings.event_channel_capacity,
        }
    }
}

/// Result of one [`SessionController::start`]
#[derive(Debug)]
pub enum SessionOutcome {
    /// Notifications are flowing
    Ready(CapabilitySet),
    CriticalError(CriticalError),
}

impl SessionOutcome {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }
}

pub struct SessionController<T: GattTransport> {
    transport: T,
    profile: &'static ServiceProfile,
    config: SessionConfig,
    sensor_location: Option<SensorLocation>,
    notifications: Option<NotificationSession>,
    events: Option<mpsc::Receiver<StreamEvent>>,
}

impl<T: GattTransport> SessionController<T> {
    pub fn new(transport: T, kind: ServiceKind, config: SessionConfig) -> Self {
        Self {
            transport,
            profile: kind.profile(),
            config,
            sensor_location: None,
            notifications: None,
            events: None,
        }
    }

    /// Bring the session up on `service`.
    pub async fn start(&mut self, service: &ServiceHandle) -> SessionOutcome {
        info!("Starting {} session on {}", self.profile.kind, service.uuid);
        match self.run(service).await {
            Ok(capabilities) => {
                info!("{} session ready", self.profile.kind);
                SessionOutcome::Ready(capabilities)
            }
            Err(e) => {
                error!("{} session failed: {}", self.profile.kind, e);
                SessionOutcome::CriticalError(e)
            }
        }
    }

    async fn run(&mut self, service: &ServiceHandle) -> Result<CapabilitySet, CriticalError> {
        if self.state() == SessionState::Active {
            return Err(SubscribeError::InvalidState(SessionState::Active).into());
        }

        let resolved = DiscoveryResolver::new(self.config.discovery_timeout)
            .resolve(&self.transport, service, &self.profile.manifest)
            .await?;

        let reader = FeatureReader::new(self.config.feature_read_timeout);
        let capabilities = if self.profile.manifest.entry(CharacteristicRole::Feature).is_some() {
            let feature = resolved.require(CharacteristicRole::Feature)?;
            reader
                .read_capabilities(&self.transport, feature, self.profile)
                .await?
        } else {
            debug!("{} has no feature characteristic", self.profile.kind);
            CapabilitySet::unreported()
        };

        self.sensor_location = None;
        if let Some(location) = resolved.get(CharacteristicRole::SensorLocation) {
            match reader
                .read_sensor_location(&self.transport, location, self.profile.location_table)
                .await
            {
                Ok(location) => self.sensor_location = Some(location),
                Err(e) => warn!("Ignoring unreadable sensor location: {}", e),
            }
        }

        let measurement = resolved.require(CharacteristicRole::Measurement)?.clone();
        let mut session = NotificationSession::new(
            &self.profile.layout,
            capabilities,
            self.config.event_channel_capacity,
        );
        let events = session.subscribe(&self.transport, &measurement).await?;

        self.notifications = Some(session);
        self.events = Some(events);
        Ok(capabilities)
    }

    /// Take the event receiver of the current session. Only the first call
    /// after a successful start returns it.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<StreamEvent>> {
        self.events.take()
    }

    pub fn sensor_location(&self) -> Option<SensorLocation> {
        self.sensor_location
    }

    pub fn state(&self) -> SessionState {
        self.notifications
            .as_ref()
            .map_or(SessionState::Idle, NotificationSession::state)
    }

    /// Unsubscribe and release every handle of the current session.
    pub async fn shutdown(&mut self) -> Result<(), TransportError> {
        let result = match self.notifications.take() {
            Some(mut session) => session.unsubscribe(&self.transport).await,
            None => Ok(()),
        };
        self.events = None;
        info!("{} session shut down", self.profile.kind);
        result
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Release the transport. Call [`Self::shutdown`] first.
    pub fn into_transport(self) -> T {
        self.transport
    }
}
