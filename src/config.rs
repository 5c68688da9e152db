use figment::{
    providers::{Env, Format, Json, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use uuid::Uuid;

use crate::catalog::NodeIdentity;
use crate::types::DeviceProfile;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub bind_ip: IpAddr,
    /// Host name advertised in hrefs handed to controllers.
    pub public_host: String,
    /// Source address written into every transport file.
    pub source_ip: Ipv4Addr,
    pub versions: ApiVersions,
    pub devices: Vec<DeviceConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry: Option<RegistryConfig>,
}

/// The one version each API reports and serves.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiVersions {
    pub node: String,
    pub connection: String,
    pub query: String,
    pub events: String,
    pub channelmapping: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeviceConfig {
    pub profile: DeviceProfile,
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RegistryConfig {
    pub port: u16,
    /// Per-request deadline for each peer poll.
    pub timeout_ms: u64,
    /// Upper bound on peer polls in flight for one query.
    pub max_concurrency: usize,
    pub peers: Vec<PeerConfig>,
}

/// A node polled by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PeerConfig {
    pub name: String,
    /// Address the registry uses to reach the node.
    pub url: String,
    /// Address clients use to reach the node; replaces `url` in results.
    pub external_url: String,
}

impl PeerConfig {
    fn local(name: &str, url: &str) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            external_url: url.into(),
        }
    }
}

impl DeviceConfig {
    fn seeded(profile: DeviceProfile, port: u16, node_id: Option<&str>) -> Self {
        Self {
            profile,
            port,
            node_id: node_id.and_then(|id| Uuid::parse_str(id).ok()),
            label: None,
            description: None,
            hostname: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            public_host: "localhost".into(),
            source_ip: Ipv4Addr::new(192, 168, 1, 100),
            versions: ApiVersions {
                node: "v1.3".into(),
                connection: "v1.0".into(),
                query: "v1.3".into(),
                events: "v1.0".into(),
                channelmapping: "v1.0".into(),
            },
            devices: vec![
                DeviceConfig::seeded(
                    DeviceProfile::Encoder,
                    8080,
                    Some("550e8400-e29b-41d4-a716-446655440001"),
                ),
                DeviceConfig::seeded(
                    DeviceProfile::Decoder,
                    8081,
                    Some("550e8400-e29b-41d4-a716-446655440002"),
                ),
                DeviceConfig::seeded(DeviceProfile::EventTally, 8083, None),
                DeviceConfig::seeded(DeviceProfile::ChannelMapping, 8084, None),
                DeviceConfig::seeded(
                    DeviceProfile::Studio,
                    8090,
                    Some("550e8400-e29b-41d4-a716-446655440010"),
                ),
                DeviceConfig::seeded(
                    DeviceProfile::Multiviewer,
                    8092,
                    Some("550e8400-e29b-41d4-a716-446655440030"),
                ),
            ],
            registry: Some(RegistryConfig {
                port: 8082,
                timeout_ms: 2000,
                max_concurrency: 8,
                peers: vec![
                    PeerConfig::local("Mock Node 1", "http://localhost:8080"),
                    PeerConfig::local("Mock Node 2", "http://localhost:8081"),
                    PeerConfig::local("Campus-A Studio-1", "http://localhost:8090"),
                    PeerConfig::local("Campus-A Multiviewer", "http://localhost:8092"),
                ],
            }),
        }
    }
}

impl Config {
    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file("nmosim.toml"))
            .merge(Json::file("nmosim.json"))
            .merge(Env::prefixed("NMOSIM_").split("__"))
    }

    pub fn load() -> anyhow::Result<Self> {
        let config: Config = Self::figment()
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        let mut ports = HashSet::new();
        let registry_port = self.registry.as_ref().map(|r| r.port);
        for port in self.devices.iter().map(|d| d.port).chain(registry_port) {
            if !ports.insert(port) {
                anyhow::bail!("Port {} is assigned to more than one service", port);
            }
        }
        if let Some(registry) = &self.registry {
            if registry.max_concurrency == 0 {
                anyhow::bail!("registry.max_concurrency must be at least 1");
            }
        }
        Ok(())
    }

    pub fn bind_addr(&self, port: u16) -> SocketAddr {
        SocketAddr::new(self.bind_ip, port)
    }

    /// Resolve the identity of a configured device, generating a random
    /// node id when none is configured.
    pub fn identity(&self, device: &DeviceConfig) -> NodeIdentity {
        let profile = device.profile;
        NodeIdentity {
            node_id: device.node_id.unwrap_or_else(Uuid::new_v4),
            label: device
                .label
                .clone()
                .unwrap_or_else(|| profile.default_label().to_string()),
            description: device
                .description
                .clone()
                .unwrap_or_else(|| profile.default_description().to_string()),
            hostname: device
                .hostname
                .clone()
                .unwrap_or_else(|| profile.default_hostname().to_string()),
            public_host: self.public_host.clone(),
            port: device.port,
            source_ip: self.source_ip,
            node_version: self.versions.node.clone(),
            connection_version: self.versions.connection.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn defaults_describe_the_virtual_studio() {
        Jail::expect_with(|_jail| {
            let config = Config::load().expect("defaults load");
            assert_eq!(config.devices.len(), 6);
            let registry = config.registry.expect("registry enabled by default");
            assert_eq!(registry.port, 8082);
            assert_eq!(registry.peers.len(), 4);
            assert_eq!(config.versions.node, "v1.3");
            Ok(())
        });
    }

    #[test]
    fn environment_overrides_scalars_and_nested_keys() {
        Jail::expect_with(|jail| {
            jail.set_env("NMOSIM_SOURCE_IP", "10.1.2.3");
            jail.set_env("NMOSIM_VERSIONS__CONNECTION", "v1.1");
            let config = Config::load().expect("env load");
            assert_eq!(config.source_ip, Ipv4Addr::new(10, 1, 2, 3));
            assert_eq!(config.versions.connection, "v1.1");
            Ok(())
        });
    }

    #[test]
    fn toml_file_replaces_device_list() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "nmosim.toml",
                r#"
                [[devices]]
                profile = "camera"
                port = 8180
                label = "Studio B"

                [registry]
                port = 6062
                timeout_ms = 500
                max_concurrency = 2

                [[registry.peers]]
                name = "cam"
                url = "http://camera:8180"
                external_url = "http://localhost:8180"
                "#,
            )?;
            let config = Config::load().expect("toml load");
            assert_eq!(config.devices.len(), 1);
            assert_eq!(config.devices[0].profile, DeviceProfile::Camera);
            let registry = config.registry.expect("registry");
            assert_eq!(registry.peers[0].external_url, "http://localhost:8180");
            Ok(())
        });
    }

    #[test]
    fn duplicate_ports_are_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "nmosim.toml",
                r#"
                [[devices]]
                profile = "encoder"
                port = 8082
                "#,
            )?;
            assert!(Config::load().is_err());
            Ok(())
        });
    }

    #[test]
    fn identity_falls_back_to_profile_defaults() {
        let config = Config::default();
        let studio = &config.devices[4];
        let identity = config.identity(studio);
        assert_eq!(identity.label, "Campus-A Studio-1");
        assert_eq!(
            identity.node_id.to_string(),
            "550e8400-e29b-41d4-a716-446655440010"
        );
        assert_eq!(identity.base_url(), "http://localhost:8090");
    }
}
