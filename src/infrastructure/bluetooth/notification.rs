//! Notification Session
//!
//! Owns the subscription to one measurement characteristic and turns its
//! payload stream into an ordered stream of [`StreamEvent`]s.
//!
//! ```text
//! Idle ──subscribe──► Subscribing ──ack──► Active ──unsubscribe──► Unsubscribing ──► Idle
//!                          │                  │
//!                       rejected         stream ended
//!                          ▼                  ▼
//!                         Idle             Faulted
//! ```
//!
//! Every payload produces exactly one event, delivered in arrival order on a
//! bounded channel. A slow subscriber holds the pump back; nothing is
//! dropped. Once the receiver is gone payloads are discarded, but the pump
//! keeps watching the stream so a disconnect still faults the session.

use crate::domain::capability::CapabilitySet;
use crate::domain::decoder::{self, RecordLayout};
use crate::domain::error::DecodeError;
use crate::domain::record::MeasurementRecord;
use crate::infrastructure::bluetooth::error::{SessionFault, SubscribeError, TransportError};
use crate::infrastructure::bluetooth::transport::{
    CharacteristicHandle, GattTransport, NotificationStream,
};
use futures::StreamExt;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Idle,
    Subscribing,
    Active,
    Unsubscribing,
    /// Terminal: the peripheral went away
    Faulted,
}

/// A payload that could not be decoded. The session stays active.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeFailureEvent {
    pub error: DecodeError,
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Record(MeasurementRecord),
    DecodeFailure(DecodeFailureEvent),
    /// Always the last event of a session
    Faulted(SessionFault),
}

/// State cell shared between a session and its pump task
#[derive(Debug, Clone)]
struct SharedState(Arc<Mutex<SessionState>>);

impl SharedState {
    fn new() -> Self {
        Self(Arc::new(Mutex::new(SessionState::Idle)))
    }

    fn get(&self) -> SessionState {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set(&self, state: SessionState) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    /// Move `from` -> `to`; false if the state was not `from`
    fn transition(&self, from: SessionState, to: SessionState) -> bool {
        let mut current = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        if *current != from {
            return false;
        }
        trace!("Session state {:?} -> {:?}", from, to);
        *current = to;
        true
    }
}

struct Pump {
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

pub struct NotificationSession {
    layout: &'static RecordLayout,
    capabilities: CapabilitySet,
    capacity: usize,
    state: SharedState,
    characteristic: Option<CharacteristicHandle>,
    pump: Option<Pump>,
}

impl NotificationSession {
    /// `capacity` bounds the number of undelivered events (minimum 1)
    pub fn new(
        layout: &'static RecordLayout,
        capabilities: CapabilitySet,
        capacity: usize,
    ) -> Self {
        Self {
            layout,
            capabilities,
            capacity: capacity.max(1),
            state: SharedState::new(),
            characteristic: None,
            pump: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state.get()
    }

    /// Subscribe to `characteristic` and start delivering events.
    ///
    /// Only valid from `Idle`. If the peripheral rejects the subscription the
    /// session returns to `Idle`.
    pub async fn subscribe<T: GattTransport + ?Sized>(
        &mut self,
        transport: &T,
        characteristic: &CharacteristicHandle,
    ) -> Result<mpsc::Receiver<StreamEvent>, SubscribeError> {
        if !self
            .state
            .transition(SessionState::Idle, SessionState::Subscribing)
        {
            let state = self.state();
            warn!("Subscribe requested while session is {:?}", state);
            return Err(SubscribeError::InvalidState(state));
        }

        info!("Subscribing to {}", characteristic.uuid);
        let stream = match self.open(transport, characteristic).await {
            Ok(stream) => stream,
            Err(e) => {
                warn!("Subscription to {} rejected: {}", characteristic.uuid, e);
                self.state.set(SessionState::Idle);
                return Err(SubscribeError::TransportRejected(e));
            }
        };

        let (events_tx, events_rx) = mpsc::channel(self.capacity);
        let (stop_tx, stop_rx) = oneshot::channel();
        self.state.set(SessionState::Active);

        let task = tokio::spawn(pump(
            stream,
            self.layout,
            self.capabilities,
            events_tx,
            stop_rx,
            self.state.clone(),
        ));
        self.pump = Some(Pump {
            stop: stop_tx,
            task,
        });
        self.characteristic = Some(characteristic.clone());

        info!("Notification session active");
        Ok(events_rx)
    }

    /// Open the payload stream, then ask the peripheral to start sending.
    async fn open<T: GattTransport + ?Sized>(
        &self,
        transport: &T,
        characteristic: &CharacteristicHandle,
    ) -> Result<NotificationStream, TransportError> {
        let stream = transport.notifications(characteristic).await?;
        transport.set_notify(characteristic, true).await?;
        Ok(stream)
    }

    /// Stop the pump and disable notifications.
    ///
    /// No-op from `Idle` and `Faulted`. The session is `Idle` afterwards even
    /// if disabling notifications failed; the failure is returned.
    pub async fn unsubscribe<T: GattTransport + ?Sized>(
        &mut self,
        transport: &T,
    ) -> Result<(), TransportError> {
        if !self
            .state
            .transition(SessionState::Active, SessionState::Unsubscribing)
        {
            debug!("Unsubscribe ignored: session is {:?}", self.state());
            return Ok(());
        }

        if let Some(pump) = self.pump.take() {
            // The pump may already have exited on its own
            let _ = pump.stop.send(());
            if let Err(e) = pump.task.await {
                warn!("Notification pump ended abnormally: {}", e);
            }
        }

        let result = match self.characteristic.take() {
            Some(characteristic) => transport.set_notify(&characteristic, false).await,
            None => Ok(()),
        };
        if let Err(e) = &result {
            warn!("Failed to disable notifications: {}", e);
        }

        self.state.set(SessionState::Idle);
        info!("Notification session idle");
        result
    }
}

impl Drop for NotificationSession {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.take() {
            if self.state() == SessionState::Active {
                warn!("Notification session dropped while active; notifications left enabled");
            }
            pump.task.abort();
        }
    }
}

async fn pump(
    mut stream: NotificationStream,
    layout: &'static RecordLayout,
    capabilities: CapabilitySet,
    events: mpsc::Sender<StreamEvent>,
    mut stop: oneshot::Receiver<()>,
    state: SharedState,
) {
    let mut delivering = true;
    loop {
        let next = tokio::select! {
            biased;
            _ = &mut stop => {
                debug!("Notification pump stopped");
                return;
            }
            next = stream.next() => next,
        };
        let Some(payload) = next else {
            break;
        };
        if !delivering {
            trace!("Discarding {:02X?}: no event receiver", payload);
            continue;
        }

        let event = match decoder::decode(layout, &payload, &capabilities) {
            Ok(record) => {
                trace!("Decoded {:02X?} into {} fields", payload, record.fields.len());
                StreamEvent::Record(record)
            }
            Err(error) => {
                warn!("Undecodable payload {:02X?}: {}", payload, error);
                StreamEvent::DecodeFailure(DecodeFailureEvent { error, payload })
            }
        };

        tokio::select! {
            biased;
            _ = &mut stop => {
                debug!("Notification pump stopped");
                return;
            }
            sent = events.send(event) => {
                if sent.is_err() {
                    debug!("Event receiver dropped, discarding payloads until the session ends");
                    delivering = false;
                }
            }
        }
    }

    if state.transition(SessionState::Active, SessionState::Faulted) {
        warn!("Notification stream ended: peripheral disconnected");
        if events
            .send(StreamEvent::Faulted(SessionFault::Disconnected))
            .await
            .is_err()
        {
            debug!("Event receiver dropped before the disconnect was delivered");
        }
    }
}
