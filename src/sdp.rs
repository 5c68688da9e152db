//! Transport descriptor (SDP) generation for ST 2110 multicast streams.
//!
//! Controllers parse these files with fixed field positions, so the line
//! order below is part of the wire contract:
//!
//! ```text
//! v=0
//! o=- 0 0 IN IP4 <source>
//! s=<label>
//! t=0 0
//! m=<video|audio> <port> RTP/AVP 96
//! c=IN IP4 <multicast>/32
//! a=source-filter: incl IN IP4 <multicast> <source>
//! a=rtpmap:96 <raw|smpte291>/90000   (video)
//! a=rtpmap:96 L24/48000/<channels>   (audio)
//! a=rtcp:<port + 1>
//! a=sendrecv
//! a=ts-refclk:ptp=IEEE1588-2008:00-1B-63-FF-FE-FF-FF-FF
//! ```

use std::fmt;
use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

/// Content type served alongside every generated descriptor.
pub const SDP_CONTENT_TYPE: &str = "application/sdp";

/// PTP grandmaster identity advertised by every simulated stream.
const PTP_CLOCK_IDENTITY: &str = "00-1B-63-FF-FE-FF-FF-FF";

const PAYLOAD_TYPE: u8 = 96;
const AUDIO_SAMPLE_RATE: u32 = 48_000;
const DEFAULT_AUDIO_CHANNELS: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Audio,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Video => write!(f, "video"),
            MediaKind::Audio => write!(f, "audio"),
        }
    }
}

/// RTP encoding name advertised for a video stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoEncoding {
    /// ST 2110-20 uncompressed video.
    #[default]
    Raw,
    /// ST 2110-40 ancillary data.
    Smpte291,
}

impl VideoEncoding {
    fn rtp_name(self) -> &'static str {
        match self {
            VideoEncoding::Raw => "raw",
            VideoEncoding::Smpte291 => "smpte291",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SdpError {
    /// RTCP rides on the next port up, so the media port cannot be the last one.
    #[error("media port {0} leaves no room for RTCP on port + 1")]
    NoRtcpPort(u16),
}

/// Network parameters of one multicast media stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamDescriptor {
    pub label: String,
    pub multicast: Ipv4Addr,
    pub port: u16,
    pub source: Ipv4Addr,
    pub media: MediaKind,
    /// Audio channel count; ignored for video.
    pub channels: Option<u8>,
    /// Ignored for audio.
    pub encoding: VideoEncoding,
}

impl StreamDescriptor {
    /// Port of the associated RTCP channel, if the media port has a successor.
    pub fn rtcp_port(&self) -> Option<u16> {
        self.port.checked_add(1)
    }

    fn rtpmap(&self) -> String {
        match self.media {
            MediaKind::Video => {
                format!("a=rtpmap:{} {}/90000", PAYLOAD_TYPE, self.encoding.rtp_name())
            }
            MediaKind::Audio => format!(
                "a=rtpmap:{} L24/{}/{}",
                PAYLOAD_TYPE,
                AUDIO_SAMPLE_RATE,
                self.channels.unwrap_or(DEFAULT_AUDIO_CHANNELS)
            ),
        }
    }
}

/// Render the transport file for `stream`.
pub fn generate_sdp(stream: &StreamDescriptor) -> Result<String, SdpError> {
    let rtcp_port = stream
        .rtcp_port()
        .ok_or(SdpError::NoRtcpPort(stream.port))?;
    let lines = [
        "v=0".to_string(),
        format!("o=- 0 0 IN IP4 {}", stream.source),
        format!("s={}", stream.label),
        "t=0 0".to_string(),
        format!("m={} {} RTP/AVP {}", stream.media, stream.port, PAYLOAD_TYPE),
        format!("c=IN IP4 {}/32", stream.multicast),
        format!(
            "a=source-filter: incl IN IP4 {} {}",
            stream.multicast, stream.source
        ),
        stream.rtpmap(),
        format!("a=rtcp:{}", rtcp_port),
        "a=sendrecv".to_string(),
        format!("a=ts-refclk:ptp=IEEE1588-2008:{}", PTP_CLOCK_IDENTITY),
    ];

    let mut sdp = lines.join("\r\n");
    sdp.push_str("\r\n");
    Ok(sdp)
}
