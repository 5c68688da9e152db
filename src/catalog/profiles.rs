//! Fixed catalogs of the simulated node profiles.

use std::net::Ipv4Addr;

use super::{tags, Catalog, CatalogBuilder, NodeIdentity, SenderSpec};
use crate::sdp::{MediaKind, VideoEncoding};
use crate::types::DeviceProfile;

/// Build the catalog for `profile`, or `None` for profiles that expose
/// no IS-04 node (event/tally and channel mapping services).
pub fn build(profile: DeviceProfile, identity: NodeIdentity) -> Option<Catalog> {
    let catalog = match profile {
        DeviceProfile::Encoder => encoder(identity),
        DeviceProfile::Decoder => decoder(identity),
        DeviceProfile::Studio => studio(identity),
        DeviceProfile::Multiviewer => multiviewer(identity),
        DeviceProfile::Camera => camera(identity),
        DeviceProfile::EventTally | DeviceProfile::ChannelMapping => return None,
    };
    Some(catalog)
}

/// Studio-plant video on the shared 5004 port, advertised as ST 2110-40.
fn studio_video(
    label: impl Into<String>,
    group: [u8; 4],
    sdp_name: impl Into<String>,
) -> SenderSpec {
    SenderSpec::video(label, Ipv4Addr::from(group), 5004, sdp_name)
        .encoded_as(VideoEncoding::Smpte291)
}

fn encoder(identity: NodeIdentity) -> Catalog {
    let site = tags(&[("site", "CampusA"), ("room", "Studio1")]);
    let mut b = CatalogBuilder::new(identity, site.clone());
    let device = b.device(
        "encoder",
        "Mock Encoder Device",
        "Virtual encoder device",
        site.clone(),
    );
    b.sender(
        &device,
        SenderSpec::video("Video Sender 1", Ipv4Addr::new(239, 0, 0, 1), 5004, "video1"),
        site.clone(),
    );
    b.sender(
        &device,
        SenderSpec::audio("Audio Sender 1", Ipv4Addr::new(239, 0, 0, 2), 5006, "audio1", 2),
        site.clone(),
    );
    b.receiver(&device, "video_in1", "Video Receiver 1", MediaKind::Video, site);
    b.build()
}

fn decoder(identity: NodeIdentity) -> Catalog {
    let site = tags(&[("site", "CampusA"), ("room", "ControlRoom1")]);
    let mut b = CatalogBuilder::new(identity, site.clone());
    let device = b.device(
        "decoder",
        "Mock Decoder Device",
        "Virtual decoder device",
        site.clone(),
    );
    b.receiver(&device, "video_in1", "Video Receiver 1", MediaKind::Video, site.clone());
    b.receiver(&device, "video_in2", "Video Receiver 2", MediaKind::Video, site.clone());
    b.receiver(&device, "audio_in1", "Audio Receiver 1", MediaKind::Audio, site);
    b.build()
}

fn studio(identity: NodeIdentity) -> Catalog {
    let site = tags(&[("site", "Campus-A"), ("room", "Studio-1")]);
    let mixer_tags = tags(&[("site", "Campus-A"), ("room", "Studio-1"), ("role", "audio-mixer")]);
    let mut b = CatalogBuilder::new(identity, site.clone());

    let main = b.device(
        "studio",
        "Studio-1 Device",
        "Campus-A Studio-1 sources and vision mixer",
        site.clone(),
    );
    let mixer = b.device(
        "audiomixer",
        "Studio-1 Audio Mixer",
        "Campus-A Studio-1 Audio Mixer: 16 stereo inputs, 2 stereo outputs (ST 2110-30)",
        mixer_tags.clone(),
    );

    let mut specs = Vec::new();
    for i in 1..=4u8 {
        specs.push(studio_video(format!("Cam {}", i), [239, 1, 1, i], format!("cam{}", i)));
    }
    for i in 1..=4u8 {
        specs.push(studio_video(
            format!("Playout {}", i),
            [239, 1, 1, 4 + i],
            format!("playout_v{}", i),
        ));
    }
    for (i, octet) in [(1u8, 9u8), (2, 11)] {
        specs.push(studio_video(
            format!("CG Fill {}", i),
            [239, 1, 1, octet],
            format!("cg_fill_{}", i),
        ));
        specs.push(studio_video(
            format!("CG Key {}", i),
            [239, 1, 1, octet + 1],
            format!("cg_key_{}", i),
        ));
    }
    specs.push(SenderSpec::audio("Mic 1 L-R", Ipv4Addr::new(239, 1, 2, 1), 5004, "mic1", 2));
    for i in 1..=4u8 {
        specs.push(SenderSpec::audio(
            format!("Playout Audio {}", i),
            Ipv4Addr::new(239, 1, 2, 1 + i),
            5004,
            format!("playout_a{}", i),
            2,
        ));
    }
    specs.push(studio_video("VM PGM", [239, 1, 3, 1], "vm_pgm"));
    specs.push(studio_video("VM Clean", [239, 1, 3, 2], "vm_clean"));
    for spec in specs {
        b.sender(&main, spec, site.clone());
    }

    b.sender(
        &mixer,
        SenderSpec::audio("AM Mix Main L-R", Ipv4Addr::new(239, 1, 4, 1), 5004, "am_mix_main", 2),
        mixer_tags.clone(),
    );
    b.sender(
        &mixer,
        SenderSpec::audio("AM Mix Aux L-R", Ipv4Addr::new(239, 1, 4, 2), 5004, "am_mix_aux", 2),
        mixer_tags.clone(),
    );

    for i in 1..=16 {
        let (key, label) = (format!("vm_in{}", i), format!("VM Input {}", i));
        b.receiver(&main, &key, &label, MediaKind::Video, site.clone());
    }
    for i in 1..=16 {
        let (key, label) = (format!("am_in{}", i), format!("AM Input {}", i));
        b.receiver(&mixer, &key, &label, MediaKind::Audio, mixer_tags.clone());
    }
    b.build()
}

fn multiviewer(identity: NodeIdentity) -> Catalog {
    let site = tags(&[("site", "Campus-A"), ("room", "Multiviewer")]);
    let mut b = CatalogBuilder::new(identity, site.clone());
    let device = b.device(
        "multiviewer",
        "Multiviewer Device",
        "Campus-A Multiviewer 16in/4out",
        site.clone(),
    );
    for i in 1..=4u8 {
        b.sender(
            &device,
            studio_video(format!("MV Output {}", i), [239, 3, 1, i], format!("mv_out{}", i)),
            site.clone(),
        );
    }
    for i in 1..=16 {
        let (key, label) = (format!("mv_in{}", i), format!("MV Input {}", i));
        b.receiver(&device, &key, &label, MediaKind::Video, site.clone());
    }
    b.build()
}

fn camera(identity: NodeIdentity) -> Catalog {
    let site = tags(&[("site", "CampusA"), ("room", "Studio1")]);
    let mut b = CatalogBuilder::new(identity, site.clone());
    let device = b.device("camera", "Studio B", "Studio B 3-camera device", site.clone());
    for i in 0..3u8 {
        let cam = i + 1;
        b.sender(
            &device,
            SenderSpec::video(
                format!("Camera {} Out", cam),
                Ipv4Addr::new(239, 0, 0, cam),
                5004 + u16::from(i) * 2,
                format!("cam{}", cam),
            ),
            site.clone(),
        );
    }
    b.build()
}
