use std::net::Ipv6Addr;
use std::sync::Arc;
use std::time::Duration;

use ipnet::Ipv6Net;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::NetworkFlags;
use crate::model::{CreateServerPublicNet, PrimaryIp, Server};
use crate::resolver::ResourceKind;
use crate::{CloudApi, Error, Result, poll};

/// Decides how a new server's network is set up and how it is reached.
pub struct NetworkConfigurator {
    flags: NetworkFlags,
    poll_interval: Duration,
    cancel: CancellationToken,
}

impl NetworkConfigurator {
    pub fn new(flags: NetworkFlags, poll_interval: Duration, cancel: CancellationToken) -> Self {
        Self { flags, poll_interval, cancel }
    }

    /// The explicit public network block for a create request, or `None`
    /// to leave the provider default (both stacks, auto-allocated) in place.
    pub fn public_net_spec(&self, ipv4: Option<&PrimaryIp>, ipv6: Option<&PrimaryIp>) -> Option<CreateServerPublicNet> {
        let flags = &self.flags;
        if !flags.disable_public_ipv4 && !flags.disable_public_ipv6 && ipv4.is_none() && ipv6.is_none() {
            return None;
        }
        Some(CreateServerPublicNet {
            enable_ipv4: !flags.disable_public_ipv4 || ipv4.is_some(),
            enable_ipv6: !flags.disable_public_ipv6 || ipv6.is_some(),
            ipv4: ipv4.map(|ip| ip.id),
            ipv6: ipv6.map(|ip| ip.id),
        })
    }

    /// The address clients should use to reach `server`.
    pub async fn reachable_address(&self, api: &Arc<dyn CloudApi>, server: &Server) -> Result<String> {
        if self.flags.use_private_network {
            info!(server_id = server.id, "waiting for private network attachment");
            loop {
                let current = api.server(server.id).await?.ok_or_else(|| Error::NotFound {
                    kind: ResourceKind::Server,
                    identifier: server.id.to_string(),
                })?;
                if let Some(attachment) = current.private_net.first() {
                    info!(server_id = server.id, address = %attachment.ip, "private network attached");
                    return Ok(attachment.ip.clone());
                }
                debug!(server_id = server.id, "private network not attached yet");
                poll::sleep(self.poll_interval, &self.cancel).await?;
            }
        }

        if self.flags.disable_public_ipv4 {
            let block = server
                .public_net
                .ipv6
                .as_ref()
                .ok_or_else(|| Error::Internal(format!("server {} has no public ipv6 address", server.id)))?;
            let address = usable_ipv6(&block.ip)?;
            info!(server_id = server.id, %address, "resolved public ipv6 address");
            return Ok(address.to_string());
        }

        let ipv4 = server
            .public_net
            .ipv4
            .as_ref()
            .ok_or_else(|| Error::Internal(format!("server {} has no public ipv4 address", server.id)))?;
        info!(server_id = server.id, address = %ipv4.ip, "using public ipv4 address");
        Ok(ipv4.ip.clone())
    }
}

/// Turn a provisioned IPv6 value into a host address. A bare network
/// (`2001:db8::/64`) becomes its first host (`2001:db8::1`); anything with
/// host bits already set is returned as is.
pub fn usable_ipv6(raw: &str) -> Result<Ipv6Addr> {
    let bad = |e: &dyn std::fmt::Display| Error::Internal(format!("unparseable ipv6 address {raw:?}: {e}"));

    if !raw.contains('/') {
        return raw.parse::<Ipv6Addr>().map_err(|e| bad(&e));
    }

    let net: Ipv6Net = raw.parse().map_err(|e| bad(&e))?;
    let address = net.addr();
    if address != net.network() {
        return Ok(address);
    }
    let mut octets = address.octets();
    octets[15] |= 0x01;
    Ok(Ipv6Addr::from(octets))
}
