//! Declarative description of the clusters a cluster manager is built from.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use pingora_error::{ErrorType::InternalError, OrErr, Result};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Validate)]
pub struct Bootstrap {
    #[validate(nested)]
    pub static_resources: StaticResources,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Validate)]
#[validate(schema(function = "StaticResources::validate_unique_names"))]
pub struct StaticResources {
    #[validate(length(min = 1))]
    #[validate(nested)]
    pub clusters: Vec<Cluster>,
}

impl StaticResources {
    fn validate_unique_names(&self) -> Result<(), ValidationError> {
        for (i, cluster) in self.clusters.iter().enumerate() {
            if self.clusters[..i].iter().any(|c| c.name == cluster.name) {
                let mut err = ValidationError::new("duplicate_cluster_name");
                err.add_param("name".into(), &cluster.name);
                return Err(err);
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Validate)]
pub struct Cluster {
    #[validate(length(min = 1))]
    pub name: String,
    /// Seconds.
    #[validate(range(min = 1))]
    pub connect_timeout: u64,
    #[serde(default)]
    pub r#type: DiscoveryType,
    #[validate(length(min = 1))]
    pub hosts: Vec<Host>,
    pub tls: Option<UpstreamTls>,
}

impl Cluster {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }

    pub fn socket_addrs(&self) -> impl Iterator<Item = SocketAddr> + '_ {
        self.hosts.iter().map(|h| h.socket_address.to_socket_addr())
    }
}

/// How a cluster learns its hosts. Only statically listed hosts are supported.
#[derive(Copy, Clone, Default, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscoveryType {
    #[default]
    Static,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Host {
    pub socket_address: SocketAddress,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SocketAddress {
    pub address: IpAddr,
    pub port_value: u16,
}

impl SocketAddress {
    pub fn to_socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.address, self.port_value)
    }
}

/// Upstream connections of the cluster use TLS with this SNI.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UpstreamTls {
    pub sni: String,
}

impl Bootstrap {
    /// One `STATIC` cluster holding exactly one resolved host.
    pub fn single_static_host(
        cluster_name: &str,
        addr: SocketAddr,
        connect_timeout: Duration,
        tls: Option<UpstreamTls>,
    ) -> Self {
        Self {
            static_resources: StaticResources {
                clusters: vec![Cluster {
                    name: cluster_name.to_string(),
                    connect_timeout: connect_timeout.as_secs().max(1),
                    r#type: DiscoveryType::Static,
                    hosts: vec![Host {
                        socket_address: SocketAddress {
                            address: addr.ip(),
                            port_value: addr.port(),
                        },
                    }],
                    tls,
                }],
            },
        }
    }

    pub fn cluster(&self, name: &str) -> Option<&Cluster> {
        self.static_resources.clusters.iter().find(|c| c.name == name)
    }

    pub fn from_yaml(conf_str: &str) -> Result<Self> {
        let bootstrap: Bootstrap = serde_yaml::from_str(conf_str)
            .or_err_with(InternalError, || "Unable to parse bootstrap")?;
        bootstrap
            .validate()
            .or_err_with(InternalError, || "Bootstrap valid failed")?;
        Ok(bootstrap)
    }

    pub fn to_yaml(&self) -> String {
        serde_yaml::to_string(self).unwrap_or_default()
    }
}
