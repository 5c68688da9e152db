//! Static IS-04 resource catalogs.
//!
//! A catalog is built once at startup from a device profile and never
//! changes afterwards. Resource ids are UUIDv5 values namespaced by the
//! node id, so a node configured with a fixed id exposes the same ids on
//! every run.

pub mod profiles;

use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use serde::Serialize;
use uuid::Uuid;

use crate::sdp::{generate_sdp, MediaKind, SdpError, StreamDescriptor, VideoEncoding};

/// Seconds part of every version stamp.
const VERSION_EPOCH: u64 = 1_523_456_789;

const TRANSPORT_RTP_MCAST: &str = "urn:x-nmos:transport:rtp.mcast";
const DEVICE_TYPE_GENERIC: &str = "urn:x-nmos:device:generic";

pub type Tags = BTreeMap<String, Vec<String>>;

pub fn tags(pairs: &[(&str, &str)]) -> Tags {
    let mut tags = Tags::new();
    for (key, value) in pairs {
        tags.entry(key.to_string())
            .or_default()
            .push(value.to_string());
    }
    tags
}

fn format_urn(media: MediaKind) -> &'static str {
    match media {
        MediaKind::Video => "urn:x-nmos:format:video",
        MediaKind::Audio => "urn:x-nmos:format:audio",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rational {
    pub numerator: u32,
    pub denominator: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApiEndpoint {
    pub host: String,
    pub port: u16,
    pub protocol: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeApi {
    pub endpoints: Vec<ApiEndpoint>,
    pub versions: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Clock {
    pub name: String,
    pub ref_type: String,
}

/// The `/self` resource of a node.
#[derive(Debug, Clone, Serialize)]
pub struct NodeSelf {
    pub id: String,
    pub label: String,
    pub description: String,
    pub hostname: String,
    pub api: NodeApi,
    pub caps: BTreeMap<String, serde_json::Value>,
    pub clocks: Vec<Clock>,
    pub tags: Tags,
    pub version: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Controls {
    pub href: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Device {
    pub id: String,
    pub label: String,
    pub description: String,
    pub node_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub tags: Tags,
    pub version: String,
    pub controls: Controls,
}

#[derive(Debug, Clone, Serialize)]
pub struct Component {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub bit_depth: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct Flow {
    pub id: String,
    pub source_id: String,
    pub device_id: String,
    pub parents: Vec<String>,
    pub format: String,
    pub media_type: String,
    pub label: String,
    pub description: String,
    pub tags: Tags,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bit_rate: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame_width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame_height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interlace_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub colorspace: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transfer_characteristic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub components: Option<Vec<Component>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grain_rate: Option<Rational>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<Rational>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bit_depth: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channels: Option<u8>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SenderSubscription {
    pub receiver_id: Option<String>,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Sender {
    pub id: String,
    pub label: String,
    pub description: String,
    pub flow_id: String,
    pub device_id: String,
    pub transport: String,
    pub manifest_href: String,
    pub tags: Tags,
    pub version: String,
    pub subscription: SenderSubscription,
    /// Name under which the transport file is served (`/sdp/<name>.sdp`).
    #[serde(skip)]
    pub sdp_name: String,
    #[serde(skip)]
    pub stream: StreamDescriptor,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReceiverSubscription {
    pub sender_id: Option<String>,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Receiver {
    pub id: String,
    pub label: String,
    pub description: String,
    pub device_id: String,
    pub format: String,
    pub transport: String,
    pub tags: Tags,
    pub version: String,
    pub subscription: ReceiverSubscription,
}

/// Everything one simulated node advertises.
#[derive(Debug, Clone)]
pub struct Catalog {
    pub node: NodeSelf,
    pub devices: Vec<Device>,
    pub flows: Vec<Flow>,
    pub senders: Vec<Sender>,
    pub receivers: Vec<Receiver>,
}

impl Catalog {
    pub fn sender_ids(&self) -> Vec<String> {
        self.senders.iter().map(|s| s.id.clone()).collect()
    }

    pub fn receiver_ids(&self) -> Vec<String> {
        self.receivers.iter().map(|r| r.id.clone()).collect()
    }

    pub fn sender(&self, id: &str) -> Option<&Sender> {
        self.senders.iter().find(|s| s.id == id)
    }

    /// Sender publishing a stream name, with or without the `.sdp` suffix.
    pub fn sender_by_stream(&self, name: &str) -> Option<&Sender> {
        let name = name.strip_suffix(".sdp").unwrap_or(name);
        self.senders.iter().find(|s| s.sdp_name == name)
    }
}

impl Sender {
    pub fn transport_file(&self) -> Result<String, SdpError> {
        generate_sdp(&self.stream)
    }
}

/// Startup inputs shared by every profile.
#[derive(Debug, Clone)]
pub struct NodeIdentity {
    pub node_id: Uuid,
    pub label: String,
    pub description: String,
    pub hostname: String,
    /// Host advertised in hrefs and API endpoints.
    pub public_host: String,
    pub port: u16,
    pub source_ip: Ipv4Addr,
    pub node_version: String,
    pub connection_version: String,
}

impl NodeIdentity {
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.public_host, self.port)
    }
}

/// A multicast sender to add to a catalog.
#[derive(Debug, Clone)]
pub struct SenderSpec {
    pub label: String,
    pub media: MediaKind,
    pub multicast: Ipv4Addr,
    pub port: u16,
    pub sdp_name: String,
    pub channels: Option<u8>,
    pub encoding: VideoEncoding,
}

impl SenderSpec {
    pub fn video(
        label: impl Into<String>,
        multicast: Ipv4Addr,
        port: u16,
        sdp_name: impl Into<String>,
    ) -> Self {
        Self {
            label: label.into(),
            media: MediaKind::Video,
            multicast,
            port,
            sdp_name: sdp_name.into(),
            channels: None,
            encoding: VideoEncoding::Raw,
        }
    }

    /// Advertise the stream under a different RTP encoding name.
    pub fn encoded_as(mut self, encoding: VideoEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn audio(
        label: impl Into<String>,
        multicast: Ipv4Addr,
        port: u16,
        sdp_name: impl Into<String>,
        channels: u8,
    ) -> Self {
        Self {
            label: label.into(),
            media: MediaKind::Audio,
            multicast,
            port,
            sdp_name: sdp_name.into(),
            channels: Some(channels),
            encoding: VideoEncoding::Raw,
        }
    }
}

/// Incrementally assembles a [`Catalog`] for one node.
pub struct CatalogBuilder {
    identity: NodeIdentity,
    node_tags: Tags,
    sequence: u64,
    devices: Vec<Device>,
    flows: Vec<Flow>,
    senders: Vec<Sender>,
    receivers: Vec<Receiver>,
}

impl CatalogBuilder {
    pub fn new(identity: NodeIdentity, node_tags: Tags) -> Self {
        Self {
            identity,
            node_tags,
            sequence: 0,
            devices: Vec::new(),
            flows: Vec::new(),
            senders: Vec::new(),
            receivers: Vec::new(),
        }
    }

    fn next_version(&mut self) -> String {
        let version = format!("{}:{}", VERSION_EPOCH, self.sequence);
        self.sequence += 1;
        version
    }

    fn stable_id(&self, name: &str) -> String {
        Uuid::new_v5(&self.identity.node_id, name.as_bytes()).to_string()
    }

    /// Add a device and return its id.
    pub fn device(&mut self, key: &str, label: &str, description: &str, tags: Tags) -> String {
        let id = self.stable_id(&format!("device.{}", key));
        let version = self.next_version();
        let controls = Controls {
            href: format!(
                "{}/x-nmos/connection/{}/",
                self.identity.base_url(),
                self.identity.connection_version
            ),
        };
        self.devices.push(Device {
            id: id.clone(),
            label: label.to_string(),
            description: description.to_string(),
            node_id: self.identity.node_id.to_string(),
            kind: DEVICE_TYPE_GENERIC.to_string(),
            tags,
            version,
            controls,
        });
        id
    }

    /// Add a sender together with the flow it carries.
    pub fn sender(&mut self, device_id: &str, spec: SenderSpec, tags: Tags) {
        let flow_id = self.stable_id(&format!("flow.{}", spec.sdp_name));
        let sender_id = self.stable_id(&format!("sender.{}", spec.sdp_name));

        let mut flow = Flow {
            id: flow_id.clone(),
            source_id: sender_id.clone(),
            device_id: device_id.to_string(),
            parents: Vec::new(),
            format: format_urn(spec.media).to_string(),
            media_type: String::new(),
            label: format!("{} Flow", spec.label),
            description: String::new(),
            tags: tags.clone(),
            version: self.next_version(),
            bit_rate: None,
            frame_width: None,
            frame_height: None,
            interlace_mode: None,
            colorspace: None,
            transfer_characteristic: None,
            components: None,
            grain_rate: None,
            sample_rate: None,
            bit_depth: None,
            channels: None,
        };
        match spec.media {
            MediaKind::Video => {
                flow.media_type = "video/raw".into();
                flow.description = "ST 2110-20 video/raw".into();
                flow.bit_rate = Some(1_000_000_000);
                flow.frame_width = Some(1920);
                flow.frame_height = Some(1080);
                flow.interlace_mode = Some("progressive".into());
                flow.colorspace = Some("BT709".into());
                flow.transfer_characteristic = Some("SDR".into());
                flow.components = Some(vec![Component {
                    name: "Y".into(),
                    width: 1920,
                    height: 1080,
                    bit_depth: 10,
                }]);
                flow.grain_rate = Some(Rational {
                    numerator: 25,
                    denominator: 1,
                });
            }
            MediaKind::Audio => {
                flow.media_type = "audio/L24".into();
                flow.description = "ST 2110-30 audio/L24".into();
                flow.sample_rate = Some(Rational {
                    numerator: 48_000,
                    denominator: 1,
                });
                flow.bit_depth = Some(24);
                flow.channels = spec.channels;
            }
        }
        self.flows.push(flow);

        let stream = StreamDescriptor {
            label: spec.label.clone(),
            multicast: spec.multicast,
            port: spec.port,
            source: self.identity.source_ip,
            media: spec.media,
            channels: spec.channels,
            encoding: spec.encoding,
        };
        let version = self.next_version();
        self.senders.push(Sender {
            id: sender_id,
            label: spec.label.clone(),
            description: format!("{} {}", self.identity.label, spec.label),
            flow_id,
            device_id: device_id.to_string(),
            transport: TRANSPORT_RTP_MCAST.to_string(),
            manifest_href: format!("{}/sdp/{}.sdp", self.identity.base_url(), spec.sdp_name),
            tags,
            version,
            subscription: SenderSubscription {
                receiver_id: None,
                active: false,
            },
            sdp_name: spec.sdp_name,
            stream,
        });
    }

    pub fn receiver(
        &mut self,
        device_id: &str,
        key: &str,
        label: &str,
        media: MediaKind,
        tags: Tags,
    ) {
        let id = self.stable_id(&format!("receiver.{}", key));
        let version = self.next_version();
        self.receivers.push(Receiver {
            id,
            label: label.to_string(),
            description: format!("{} {}", self.identity.label, label),
            device_id: device_id.to_string(),
            format: format_urn(media).to_string(),
            transport: TRANSPORT_RTP_MCAST.to_string(),
            tags,
            version,
            subscription: ReceiverSubscription {
                sender_id: None,
                active: false,
            },
        });
    }

    pub fn build(mut self) -> Catalog {
        let version = self.next_version();
        let identity = self.identity;
        let node = NodeSelf {
            id: identity.node_id.to_string(),
            label: identity.label.clone(),
            description: identity.description.clone(),
            hostname: identity.hostname.clone(),
            api: NodeApi {
                endpoints: vec![ApiEndpoint {
                    host: identity.public_host.clone(),
                    port: identity.port,
                    protocol: "http".into(),
                }],
                versions: vec![identity.node_version.clone()],
            },
            caps: BTreeMap::new(),
            clocks: vec![Clock {
                name: "clk0".into(),
                ref_type: "internal".into(),
            }],
            tags: self.node_tags,
            version,
        };
        Catalog {
            node,
            devices: self.devices,
            flows: self.flows,
            senders: self.senders,
            receivers: self.receivers,
        }
    }
}

#[cfg(test)]
pub(crate) fn test_identity(port: u16) -> NodeIdentity {
    NodeIdentity {
        node_id: Uuid::parse_str("550e8400-e29b-41d4-a716-446655440001").unwrap(),
        label: "Test Node".into(),
        description: "node under test".into(),
        hostname: "test.local".into(),
        public_host: "localhost".into(),
        port,
        source_ip: Ipv4Addr::new(192, 168, 1, 100),
        node_version: "v1.3".into(),
        connection_version: "v1.0".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_catalog() -> Catalog {
        let mut builder = CatalogBuilder::new(test_identity(8080), tags(&[("site", "A")]));
        let device = builder.device("main", "Main", "main device", Tags::new());
        builder.sender(
            &device,
            SenderSpec::video("Cam 1", Ipv4Addr::new(239, 0, 0, 1), 5004, "cam1"),
            Tags::new(),
        );
        builder.receiver(&device, "in1", "Input 1", MediaKind::Video, Tags::new());
        builder.build()
    }

    #[test]
    fn ids_are_stable_across_builds() {
        let a = small_catalog();
        let b = small_catalog();
        assert_eq!(a.sender_ids(), b.sender_ids());
        assert_eq!(a.receiver_ids(), b.receiver_ids());
        assert_eq!(a.devices[0].id, b.devices[0].id);
    }

    #[test]
    fn sender_links_to_flow_and_manifest() {
        let catalog = small_catalog();
        let sender = &catalog.senders[0];
        assert_eq!(catalog.flows[0].id, sender.flow_id);
        assert_eq!(catalog.flows[0].source_id, sender.id);
        assert_eq!(sender.manifest_href, "http://localhost:8080/sdp/cam1.sdp");
        assert_eq!(
            catalog.devices[0].controls.href,
            "http://localhost:8080/x-nmos/connection/v1.0/"
        );
    }

    #[test]
    fn stream_lookup_accepts_suffix() {
        let catalog = small_catalog();
        let with = catalog.sender_by_stream("cam1.sdp").unwrap();
        let without = catalog.sender_by_stream("cam1").unwrap();
        assert_eq!(with.id, without.id);
        let sdp = with.transport_file().unwrap();
        assert!(sdp.contains("c=IN IP4 239.0.0.1/32\r\n"));
        assert!(catalog.sender_by_stream("cam2.sdp").is_none());
    }

    #[test]
    fn sender_encoding_reaches_the_transport_file() {
        let mut builder = CatalogBuilder::new(test_identity(8080), Tags::new());
        let device = builder.device("main", "Main", "main device", Tags::new());
        let anc = SenderSpec::video("Anc", Ipv4Addr::new(239, 0, 0, 9), 5004, "anc")
            .encoded_as(VideoEncoding::Smpte291);
        builder.sender(&device, anc, Tags::new());
        builder.sender(
            &device,
            SenderSpec::video("Top", Ipv4Addr::new(239, 0, 0, 10), u16::MAX, "top"),
            Tags::new(),
        );
        let catalog = builder.build();

        let sdp = catalog.senders[0].transport_file().unwrap();
        assert!(sdp.contains("a=rtpmap:96 smpte291/90000\r\n"));
        assert_eq!(
            catalog.senders[1].transport_file(),
            Err(SdpError::NoRtcpPort(u16::MAX))
        );
    }

    #[test]
    fn private_fields_stay_off_the_wire() {
        let catalog = small_catalog();
        let value = serde_json::to_value(&catalog.senders[0]).unwrap();
        assert!(value.get("sdp_name").is_none());
        assert!(value.get("stream").is_none());
        assert!(value["subscription"]["receiver_id"].is_null());
    }

    #[test]
    fn version_stamps_are_unique_and_well_formed() {
        let catalog = small_catalog();
        let mut stamps = vec![catalog.node.version.clone(), catalog.devices[0].version.clone()];
        stamps.extend(catalog.flows.iter().map(|f| f.version.clone()));
        stamps.extend(catalog.senders.iter().map(|s| s.version.clone()));
        stamps.extend(catalog.receivers.iter().map(|r| r.version.clone()));
        for stamp in &stamps {
            let (secs, seq) = stamp.split_once(':').unwrap();
            assert!(secs.parse::<u64>().is_ok() && seq.parse::<u64>().is_ok());
        }
        let mut dedup = stamps.clone();
        dedup.sort();
        dedup.dedup();
        assert_eq!(dedup.len(), stamps.len());
    }
}
