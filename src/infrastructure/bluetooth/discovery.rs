//! Characteristic Discovery
//!
//! Resolves a service's characteristics against its manifest. Resolution is
//! all-or-nothing: either every mandatory role has a handle, or the call
//! fails.

use crate::domain::manifest::{CharacteristicRole, ServiceManifest};
use crate::infrastructure::bluetooth::error::DiscoveryError;
use crate::infrastructure::bluetooth::transport::{
    CharacteristicHandle, GattTransport, ServiceHandle,
};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Characteristic handles keyed by manifest role
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCharacteristics {
    handles: HashMap<CharacteristicRole, CharacteristicHandle>,
}

impl ResolvedCharacteristics {
    /// Classify discovered handles against a manifest.
    ///
    /// Handles whose UUID is not in the manifest are ignored.
    pub fn classify(
        manifest: &ServiceManifest,
        discovered: Vec<CharacteristicHandle>,
    ) -> Result<Self, DiscoveryError> {
        let mut handles = HashMap::new();
        for handle in discovered {
            match manifest.entry_for_uuid(&handle.uuid) {
                Some(entry) => {
                    debug!("Found {} characteristic ({})", entry.role, handle.uuid);
                    handles.insert(entry.role, handle);
                }
                None => trace!("Ignoring characteristic {} not in manifest", handle.uuid),
            }
        }

        let missing: Vec<_> = manifest
            .mandatory()
            .filter(|entry| !handles.contains_key(&entry.role))
            .map(|entry| entry.role)
            .collect();

        if !missing.is_empty() {
            return Err(DiscoveryError::NoMandatoryCharacteristic { missing });
        }

        Ok(Self { handles })
    }

    pub fn get(&self, role: CharacteristicRole) -> Option<&CharacteristicHandle> {
        self.handles.get(&role)
    }

    /// Handle for a role the session cannot proceed without
    pub fn require(
        &self,
        role: CharacteristicRole,
    ) -> Result<&CharacteristicHandle, DiscoveryError> {
        self.get(role)
            .ok_or_else(|| DiscoveryError::NoMandatoryCharacteristic {
                missing: vec![role],
            })
    }

    pub(crate) fn len(&self) -> usize {
        self.handles.len()
    }
}

/// Bounded, single-request characteristic discovery
#[derive(Debug, Clone, Copy)]
pub struct DiscoveryResolver {
    timeout: Duration,
}

impl DiscoveryResolver {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Discover and classify the characteristics of `service`.
    ///
    /// Issues exactly one discovery request for all manifest UUIDs. Safe to
    /// retry.
    pub async fn resolve<T: GattTransport + ?Sized>(
        &self,
        transport: &T,
        service: &ServiceHandle,
        manifest: &ServiceManifest,
    ) -> Result<ResolvedCharacteristics, DiscoveryError> {
        let ids = manifest.uuids();
        info!(
            "Discovering {} characteristics for service {}",
            ids.len(),
            service.uuid
        );

        let request = transport.discover_characteristics(service, &ids);
        let discovered = match tokio::time::timeout(self.timeout, request).await {
            Ok(Ok(handles)) => handles,
            Ok(Err(e)) => {
                warn!("Characteristic discovery failed: {}", e);
                return Err(DiscoveryError::Transport(e));
            }
            Err(_) => {
                warn!("Characteristic discovery timed out after {:?}", self.timeout);
                return Err(DiscoveryError::Timeout(self.timeout));
            }
        };

        let resolved = ResolvedCharacteristics::classify(manifest, discovered)?;
        info!("Resolved {} characteristics", resolved.len());
        Ok(resolved)
    }
}
