//! Vocabulary shared by the device and registry subsystems.
//!
//! These types appear both in configuration (`serde`) and in URL paths,
//! so each one round-trips through its NMOS string form.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// What a configured device instance simulates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceProfile {
    /// Encoder: one video and one audio sender, one video receiver.
    Encoder,
    /// Decoder: receive-only, two video and one audio receiver.
    Decoder,
    /// Studio: cameras, playouts, CG, mic, vision mixer and audio mixer.
    Studio,
    /// Multiviewer: sixteen inputs, four outputs.
    Multiviewer,
    /// Three-camera node.
    Camera,
    /// IS-07 event and tally service.
    EventTally,
    /// IS-08 audio channel mapping service.
    ChannelMapping,
}

impl DeviceProfile {
    pub fn default_label(self) -> &'static str {
        match self {
            DeviceProfile::Encoder => "Mock Encoder Node 1",
            DeviceProfile::Decoder => "Mock Decoder Node 2",
            DeviceProfile::Studio => "Campus-A Studio-1",
            DeviceProfile::Multiviewer => "Campus-A Multiviewer",
            DeviceProfile::Camera => "Studio B",
            DeviceProfile::EventTally => "Mock IS-07 Event & Tally",
            DeviceProfile::ChannelMapping => "Mock IS-08 Channel Mapping",
        }
    }

    pub fn default_description(self) -> &'static str {
        match self {
            DeviceProfile::Encoder => "Virtual NMOS encoder for testing",
            DeviceProfile::Decoder => "Virtual NMOS decoder for testing",
            DeviceProfile::Studio => concat!(
                "Campus-A Studio-1: cameras, playouts, CG, mic, vision mixer, ",
                "audio mixer (16 in / 2 out)"
            ),
            DeviceProfile::Multiviewer => "Campus-A Multiviewer 16 inputs / 4 outputs",
            DeviceProfile::Camera => "3-camera NMOS node",
            DeviceProfile::EventTally => "Mock IS-07 event source",
            DeviceProfile::ChannelMapping => "Mock IS-08 audio channel mapping",
        }
    }

    pub fn default_hostname(self) -> &'static str {
        match self {
            DeviceProfile::Encoder => "mock-node-1.local",
            DeviceProfile::Decoder => "mock-node-2.local",
            DeviceProfile::Studio => "studio1.local",
            DeviceProfile::Multiviewer => "multiviewer.local",
            DeviceProfile::Camera => "camera-node.local",
            DeviceProfile::EventTally => "mock-is07.local",
            DeviceProfile::ChannelMapping => "mock-is08.local",
        }
    }
}

/// The five IS-04 resource collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Nodes,
    Devices,
    Flows,
    Senders,
    Receivers,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 5] = [
        ResourceKind::Nodes,
        ResourceKind::Devices,
        ResourceKind::Flows,
        ResourceKind::Senders,
        ResourceKind::Receivers,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Nodes => "nodes",
            ResourceKind::Devices => "devices",
            ResourceKind::Flows => "flows",
            ResourceKind::Senders => "senders",
            ResourceKind::Receivers => "receivers",
        }
    }

    /// Path of this collection below a Node API version root.
    /// Nodes map to `self`, which holds a single object.
    pub fn node_api_path(self) -> &'static str {
        match self {
            ResourceKind::Nodes => "self",
            other => other.as_str(),
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown resource kind: {0}")]
pub struct UnknownKind(pub String);

impl FromStr for ResourceKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResourceKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownKind(s.to_string()))
    }
}
