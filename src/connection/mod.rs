//! IS-05 connection state for simulated senders and receivers.
//!
//! Each endpoint carries a staged and an active parameter set. Every
//! activation in this simulation is immediate, so a patch is staged and
//! then copied to the active slot in the same critical section; scheduled
//! activation modes are recorded but never delayed.
//!
//! No IS-05 validation is applied (multicast ranges, RTP/RTCP port parity,
//! transport_params shape). Controllers get back exactly what they staged.

pub mod store;

use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::sdp::SDP_CONTENT_TYPE;

pub use store::{ConnectionStore, StoreError};

/// Which side of a connection a resource sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointRole {
    Sender,
    Receiver,
}

impl EndpointRole {
    /// Name of the field holding the id of the other end.
    pub fn peer_field(self) -> &'static str {
        match self {
            EndpointRole::Sender => "receiver_id",
            EndpointRole::Receiver => "sender_id",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EndpointRole::Sender => "sender",
            EndpointRole::Receiver => "receiver",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationMode {
    #[default]
    ActivateImmediate,
    ActivateScheduledAbsolute,
    ActivateScheduledRelative,
}

/// Activation request as staged by a controller.
///
/// Nested fields may be `null` in IS-05 (for instance a cleared mode); they
/// are stored as given.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activation {
    #[serde(default)]
    pub mode: Option<ActivationMode>,
    #[serde(default)]
    pub requested_time: Option<String>,
}

impl Default for Activation {
    fn default() -> Self {
        Self {
            mode: Some(ActivationMode::ActivateImmediate),
            requested_time: None,
        }
    }
}

/// An absent key takes the default, an explicit `null` is kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportFile {
    #[serde(default = "default_transport_data")]
    pub data: Option<String>,
    #[serde(rename = "type", default = "default_transport_type")]
    pub kind: Option<String>,
}

fn default_transport_data() -> Option<String> {
    Some(String::new())
}

fn default_transport_type() -> Option<String> {
    Some(SDP_CONTENT_TYPE.to_string())
}

impl Default for TransportFile {
    fn default() -> Self {
        Self {
            data: default_transport_data(),
            kind: default_transport_type(),
        }
    }
}

/// Connection parameters of one sender or receiver.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectionState {
    pub master_enable: bool,
    pub activation: Activation,
    pub transport_file: TransportFile,
    /// Only meaningful for receivers.
    pub transport_params: Vec<Map<String, Value>>,
    /// `receiver_id` on a sender, `sender_id` on a receiver.
    pub peer_id: Option<String>,
}

impl ConnectionState {
    /// Overwrite the fields present in `patch`, returning the names touched.
    pub fn apply(&mut self, role: EndpointRole, patch: &ConnectionPatch) -> Vec<&'static str> {
        let mut touched = Vec::new();

        if let Some(enable) = patch.master_enable {
            self.master_enable = enable;
            touched.push("master_enable");
        }
        if let Some(activation) = &patch.activation {
            self.activation = activation.clone();
            touched.push("activation");
        }
        if let Some(file) = &patch.transport_file {
            self.transport_file = file.clone();
            touched.push("transport_file");
        }
        if role == EndpointRole::Receiver {
            if let Some(params) = &patch.transport_params {
                self.transport_params = params.clone();
                touched.push("transport_params");
            }
        }
        if let Some(peer) = patch.peer_for(role) {
            self.peer_id = peer.clone();
            touched.push(role.peer_field());
        }

        touched
    }

    /// Borrow this state as its wire representation for `role`.
    pub fn view(&self, role: EndpointRole) -> StateView<'_> {
        StateView {
            role,
            id: None,
            state: self,
        }
    }
}

/// Serialized form of a [`ConnectionState`], optionally prefixed by the
/// resource id as in the `single/senders` listings.
#[derive(Debug, Clone, Copy)]
pub struct StateView<'a> {
    role: EndpointRole,
    id: Option<&'a str>,
    state: &'a ConnectionState,
}

impl<'a> StateView<'a> {
    pub fn with_id(mut self, id: &'a str) -> Self {
        self.id = Some(id);
        self
    }
}

impl Serialize for StateView<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        if let Some(id) = self.id {
            map.serialize_entry("id", id)?;
        }
        map.serialize_entry("master_enable", &self.state.master_enable)?;
        map.serialize_entry("activation", &self.state.activation)?;
        map.serialize_entry("transport_file", &self.state.transport_file)?;
        if self.role == EndpointRole::Receiver {
            map.serialize_entry("transport_params", &self.state.transport_params)?;
        }
        map.serialize_entry(self.role.peer_field(), &self.state.peer_id)?;
        map.end()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PatchError {
    #[error("request body must be a JSON object")]
    NotAnObject,
    #[error("invalid JSON body: {0}")]
    Json(#[from] serde_json::Error),
}

/// Field-wise update of a [`ConnectionState`]; `None` means "leave as is".
///
/// The cross-reference ids are doubly optional so that an explicit `null`
/// clears the link while an absent key keeps it.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ConnectionPatch {
    pub master_enable: Option<bool>,
    pub activation: Option<Activation>,
    pub transport_file: Option<TransportFile>,
    pub transport_params: Option<Vec<Map<String, Value>>>,
    #[serde(default, deserialize_with = "present")]
    pub sender_id: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub receiver_id: Option<Option<String>>,
}

impl ConnectionPatch {
    /// Parse a PATCH body. An empty body is a no-op patch.
    pub fn from_slice(body: &[u8]) -> Result<Self, PatchError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        let value: Value = serde_json::from_slice(body)?;
        if !value.is_object() {
            return Err(PatchError::NotAnObject);
        }
        Ok(serde_json::from_value(value)?)
    }

    fn peer_for(&self, role: EndpointRole) -> Option<&Option<String>> {
        match role {
            EndpointRole::Sender => self.receiver_id.as_ref(),
            EndpointRole::Receiver => self.sender_id.as_ref(),
        }
    }
}

fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}
