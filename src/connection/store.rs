//! Per-device store of endpoint connection state.

use std::collections::HashMap;

use log::info;
use tokio::sync::RwLock;

use super::{ConnectionPatch, ConnectionState, EndpointRole};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("{} not found: {}", .0.as_str(), .1)]
    UnknownResource(EndpointRole, String),
}

/// Staged and active parameter sets of one endpoint.
#[derive(Debug, Clone, Default)]
struct Endpoint {
    staged: ConnectionState,
    active: ConnectionState,
}

impl Endpoint {
    fn stage(&mut self, role: EndpointRole, patch: &ConnectionPatch) -> Vec<&'static str> {
        self.staged.apply(role, patch)
    }

    /// Every simulated activation is immediate.
    fn activate(&mut self) {
        self.active = self.staged.clone();
    }
}

/// Endpoints of one role, in catalog order.
///
/// The id set is fixed at construction. A slot stays `None` until its
/// first patch; reads of an empty slot synthesize the default state.
#[derive(Debug, Default)]
struct EndpointTable {
    order: Vec<String>,
    slots: HashMap<String, RwLock<Option<Endpoint>>>,
}

impl EndpointTable {
    fn new(ids: Vec<String>) -> Self {
        let slots = ids
            .iter()
            .map(|id| (id.clone(), RwLock::new(None)))
            .collect();
        Self { order: ids, slots }
    }

    fn slot(&self, role: EndpointRole, id: &str) -> Result<&RwLock<Option<Endpoint>>, StoreError> {
        self.slots
            .get(id)
            .ok_or_else(|| StoreError::UnknownResource(role, id.to_string()))
    }
}

/// Connection state for every sender and receiver a device owns.
#[derive(Debug, Default)]
pub struct ConnectionStore {
    senders: EndpointTable,
    receivers: EndpointTable,
}

impl ConnectionStore {
    pub fn new(sender_ids: Vec<String>, receiver_ids: Vec<String>) -> Self {
        Self {
            senders: EndpointTable::new(sender_ids),
            receivers: EndpointTable::new(receiver_ids),
        }
    }

    fn table(&self, role: EndpointRole) -> &EndpointTable {
        match role {
            EndpointRole::Sender => &self.senders,
            EndpointRole::Receiver => &self.receivers,
        }
    }

    pub fn contains(&self, role: EndpointRole, id: &str) -> bool {
        self.table(role).slots.contains_key(id)
    }

    pub async fn staged(
        &self,
        role: EndpointRole,
        id: &str,
    ) -> Result<ConnectionState, StoreError> {
        let slot = self.table(role).slot(role, id)?.read().await;
        Ok(slot.as_ref().map(|e| e.staged.clone()).unwrap_or_default())
    }

    pub async fn active(
        &self,
        role: EndpointRole,
        id: &str,
    ) -> Result<ConnectionState, StoreError> {
        let slot = self.table(role).slot(role, id)?.read().await;
        Ok(slot.as_ref().map(|e| e.active.clone()).unwrap_or_default())
    }

    /// Merge `patch` into the staged parameters and activate them.
    ///
    /// The slot lock is held across stage and activate, so concurrent
    /// patches to one endpoint serialize without lost updates.
    pub async fn patch(
        &self,
        role: EndpointRole,
        id: &str,
        patch: &ConnectionPatch,
    ) -> Result<ConnectionState, StoreError> {
        let mut slot = self.table(role).slot(role, id)?.write().await;
        let endpoint = slot.get_or_insert_with(Endpoint::default);
        let touched = endpoint.stage(role, patch);
        endpoint.activate();
        info!("Staged {} {}: {:?}", role.as_str(), id, touched);
        Ok(endpoint.staged.clone())
    }

    /// Staged state of every endpoint of `role`, in catalog order.
    pub async fn list_staged(&self, role: EndpointRole) -> Vec<(String, ConnectionState)> {
        let table = self.table(role);
        let mut out = Vec::with_capacity(table.order.len());
        for id in &table.order {
            let state = match table.slots.get(id) {
                Some(slot) => slot.read().await.as_ref().map(|e| e.staged.clone()),
                None => None,
            };
            out.push((id.clone(), state.unwrap_or_default()));
        }
        out
    }
}
