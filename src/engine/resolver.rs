use std::net::{IpAddr, SocketAddr};

use async_trait::async_trait;
use hickory_resolver::TokioAsyncResolver;
use http::Uri;
use once_cell::sync::OnceCell;

use crate::{
    config::DnsLookupFamily,
    core::{AddressResolver, FetchError, FetchResult},
};

/// DNS-based address resolution.
///
/// IP literals are returned as is. Hostnames go through a system-configured
/// hickory resolver, created on first use so that it binds to the runtime
/// of the event loop that drives it.
#[derive(Default)]
pub struct DnsResolver {
    resolver: OnceCell<TokioAsyncResolver>,
}

impl DnsResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resolver(resolver: TokioAsyncResolver) -> Self {
        Self {
            resolver: OnceCell::with_value(resolver),
        }
    }

    fn resolver(&self) -> FetchResult<&TokioAsyncResolver> {
        self.resolver.get_or_try_init(|| {
            TokioAsyncResolver::tokio_from_system_conf()
                .map_err(|e| FetchError::DnsResolution(format!("system resolver config: {e}")))
        })
    }
}

#[async_trait]
impl AddressResolver for DnsResolver {
    async fn resolve(&self, uri: &Uri, family: DnsLookupFamily) -> FetchResult<SocketAddr> {
        let (host, port) = host_and_port(uri)?;

        if let Ok(ip) = host.parse::<IpAddr>() {
            return if family.accepts(&ip) {
                Ok(SocketAddr::new(ip, port))
            } else {
                Err(FetchError::DnsResolution(format!(
                    "{ip} does not match lookup family {family:?}"
                )))
            };
        }

        log::debug!("Resolving DNS for domain: {}", host);

        self.resolver()?
            .lookup_ip(host.as_str())
            .await
            .map_err(|e| FetchError::DnsResolution(format!("{host}: {e}")))?
            .iter()
            .find(|ip| family.accepts(ip))
            .map(|ip| SocketAddr::new(ip, port))
            .ok_or_else(|| {
                FetchError::DnsResolution(format!("no {family:?} address for {host}"))
            })
    }
}

/// Host (without IPv6 brackets) and port of an http(s) uri.
pub fn host_and_port(uri: &Uri) -> FetchResult<(String, u16)> {
    let default_port = match uri.scheme_str() {
        Some("http") => 80,
        Some("https") => 443,
        Some(other) => {
            return Err(FetchError::InvalidUrl(format!(
                "unsupported scheme {other} in {uri}"
            )))
        }
        None => return Err(FetchError::InvalidUrl(format!("missing scheme in {uri}"))),
    };

    let host = uri
        .host()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| FetchError::InvalidUrl(format!("missing host in {uri}")))?;
    let host = host.trim_start_matches('[').trim_end_matches(']');

    Ok((host.to_string(), uri.port_u16().unwrap_or(default_port)))
}
