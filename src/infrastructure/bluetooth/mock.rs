//! Scripted in-memory transport for session tests

use crate::infrastructure::bluetooth::error::TransportError;
use crate::infrastructure::bluetooth::transport::{
    CharacteristicHandle, GattTransport, NotificationStream, ServiceHandle,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::mpsc;
use uuid::Uuid;

/// How the mock answers one kind of request
#[derive(Debug, Clone)]
pub(crate) enum Reply<T> {
    Value(T),
    Fail(&'static str),
    /// Never completes
    Hang,
}

impl<T: Clone> Reply<T> {
    async fn resolve(&self) -> Result<T, TransportError> {
        match self {
            Self::Value(value) => Ok(value.clone()),
            Self::Fail(reason) => Err(TransportError::Other(reason.to_string())),
            Self::Hang => futures::future::pending().await,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    Discover(Vec<Uuid>),
    Read(Uuid),
    SetNotify(Uuid, bool),
    Notifications(Uuid),
}

pub(crate) struct MockTransport {
    service: Uuid,
    discovery: Reply<Vec<Uuid>>,
    reads: HashMap<Uuid, Reply<Vec<u8>>>,
    notify: Reply<()>,
    feed: Mutex<Option<mpsc::UnboundedReceiver<Vec<u8>>>>,
    calls: Mutex<Vec<Call>>,
}

impl MockTransport {
    /// A peripheral exposing `characteristics` under `service`. Payloads sent
    /// on the returned sender arrive as notifications; dropping it ends the
    /// stream like a disconnect.
    pub(crate) fn new(
        service: Uuid,
        characteristics: &[Uuid],
    ) -> (Self, mpsc::UnboundedSender<Vec<u8>>) {
        let (feed_tx, feed_rx) = mpsc::unbounded_channel();
        let transport = Self {
            service,
            discovery: Reply::Value(characteristics.to_vec()),
            reads: HashMap::new(),
            notify: Reply::Value(()),
            feed: Mutex::new(Some(feed_rx)),
            calls: Mutex::new(Vec::new()),
        };
        (transport, feed_tx)
    }

    pub(crate) fn with_discovery(mut self, reply: Reply<Vec<Uuid>>) -> Self {
        self.discovery = reply;
        self
    }

    pub(crate) fn with_read(mut self, uuid: Uuid, reply: Reply<Vec<u8>>) -> Self {
        self.reads.insert(uuid, reply);
        self
    }

    pub(crate) fn with_notify(mut self, reply: Reply<()>) -> Self {
        self.notify = reply;
        self
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    pub(crate) fn count(&self, matches: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|call| matches(call)).count()
    }

    fn record(&self, call: Call) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }
}

#[async_trait]
impl GattTransport for MockTransport {
    async fn discover_characteristics(
        &self,
        service: &ServiceHandle,
        ids: &[Uuid],
    ) -> Result<Vec<CharacteristicHandle>, TransportError> {
        self.record(Call::Discover(ids.to_vec()));
        let uuids = self.discovery.resolve().await?;
        if service.uuid != self.service {
            return Ok(Vec::new());
        }
        Ok(uuids
            .into_iter()
            .map(|uuid| CharacteristicHandle {
                uuid,
                service_uuid: self.service,
            })
            .collect())
    }

    async fn read_value(
        &self,
        characteristic: &CharacteristicHandle,
    ) -> Result<Vec<u8>, TransportError> {
        self.record(Call::Read(characteristic.uuid));
        match self.reads.get(&characteristic.uuid) {
            Some(reply) => reply.resolve().await,
            None => Err(TransportError::UnknownCharacteristic(characteristic.uuid)),
        }
    }

    async fn set_notify(
        &self,
        characteristic: &CharacteristicHandle,
        enabled: bool,
    ) -> Result<(), TransportError> {
        self.record(Call::SetNotify(characteristic.uuid, enabled));
        if enabled {
            self.notify.resolve().await
        } else {
            Ok(())
        }
    }

    async fn notifications(
        &self,
        characteristic: &CharacteristicHandle,
    ) -> Result<NotificationStream, TransportError> {
        self.record(Call::Notifications(characteristic.uuid));
        let feed = self
            .feed
            .lock()
            .ok()
            .and_then(|mut feed| feed.take())
            .ok_or_else(|| TransportError::Other("notification feed already taken".to_string()))?;

        let stream = futures::stream::unfold(feed, |mut feed| async move {
            feed.recv().await.map(|payload| (payload, feed))
        });
        Ok(Box::pin(stream))
    }
}
