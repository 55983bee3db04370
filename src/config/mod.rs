pub mod bootstrap;

use std::fs;
use std::time::Duration;

use log::{debug, trace};
use pingora_error::{ErrorType::*, OrErr, Result};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Name of the single ephemeral cluster each fetch registers.
pub const DEFAULT_CLUSTER_NAME: &str = "cluster1";

#[derive(Default, Debug, Serialize, Deserialize, Validate)]
pub struct Config {
    #[serde(default)]
    #[validate(nested)]
    pub fetcher: Fetcher,
}

// Config file load and validation
impl Config {
    pub fn load_from_yaml<P>(path: P) -> Result<Self>
    where
        P: AsRef<std::path::Path> + std::fmt::Display,
    {
        let conf_str = fs::read_to_string(&path).or_err_with(ReadError, || {
            format!("Unable to read conf file from {path}")
        })?;
        debug!("Conf file read from {path}");
        Self::from_yaml(&conf_str)
    }

    pub fn from_yaml(conf_str: &str) -> Result<Self> {
        trace!("Read conf file: {conf_str}");
        let conf: Config = serde_yaml::from_str(conf_str).or_err_with(ReadError, || {
            format!("Unable to parse yaml conf {conf_str}")
        })?;

        trace!("Loaded conf: {conf:?}");

        conf.validate()
            .or_err_with(FileReadError, || "Conf file valid failed")?;

        Ok(conf)
    }

    pub fn to_yaml(&self) -> String {
        serde_yaml::to_string(self).unwrap_or_default()
    }
}

/// Settings shared by every fetch issued through one fetcher.
#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
#[validate(schema(function = "Fetcher::validate_user_agent"))]
pub struct Fetcher {
    #[serde(default = "Fetcher::default_cluster_name")]
    #[validate(length(min = 1))]
    pub cluster_name: String,
    /// Seconds.
    #[serde(default = "Fetcher::default_connect_timeout")]
    #[validate(range(min = 1, max = 300))]
    pub connect_timeout: u64,
    /// Idle seconds a pooled upstream connection is kept.
    #[serde(default = "Fetcher::default_keepalive_timeout")]
    pub keepalive_timeout: u64,
    #[serde(default)]
    pub dns_lookup_family: DnsLookupFamily,
    pub user_agent: Option<String>,
}

impl Default for Fetcher {
    fn default() -> Self {
        Self {
            cluster_name: Self::default_cluster_name(),
            connect_timeout: Self::default_connect_timeout(),
            keepalive_timeout: Self::default_keepalive_timeout(),
            dns_lookup_family: DnsLookupFamily::default(),
            user_agent: None,
        }
    }
}

impl Fetcher {
    fn default_cluster_name() -> String {
        DEFAULT_CLUSTER_NAME.to_string()
    }

    fn default_connect_timeout() -> u64 {
        15
    }

    fn default_keepalive_timeout() -> u64 {
        60
    }

    fn validate_user_agent(&self) -> Result<(), ValidationError> {
        match &self.user_agent {
            Some(ua) if http::HeaderValue::from_str(ua).is_err() => {
                Err(ValidationError::new("invalid_user_agent"))
            }
            _ => Ok(()),
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }

    pub fn keepalive_timeout(&self) -> Duration {
        Duration::from_secs(self.keepalive_timeout)
    }
}

/// Which address families a hostname lookup may return.
#[derive(Copy, Clone, Default, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DnsLookupFamily {
    /// First address returned, any family.
    #[default]
    Auto,
    V4Only,
    V6Only,
}

impl DnsLookupFamily {
    pub fn accepts(&self, ip: &std::net::IpAddr) -> bool {
        match self {
            DnsLookupFamily::Auto => true,
            DnsLookupFamily::V4Only => ip.is_ipv4(),
            DnsLookupFamily::V6Only => ip.is_ipv6(),
        }
    }
}
