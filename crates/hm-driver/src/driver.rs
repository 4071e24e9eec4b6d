//! Lifecycle operations on a machine that already exists.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{LABEL_AUTO_CREATED, label_name};
use crate::model::{ServerAction, ServerStatus};
use crate::provisioner::MachineRecord;
use crate::resolver::ResourceKind;
use crate::waiter::ActionWaiter;
use crate::{CloudApi, Error, Result};

pub const DOCKER_PORT: u16 = 2376;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachineState {
    None,
    Starting,
    Running,
    Stopping,
    Stopped,
}

impl From<ServerStatus> for MachineState {
    fn from(status: ServerStatus) -> Self {
        match status {
            ServerStatus::Initializing | ServerStatus::Starting => Self::Starting,
            ServerStatus::Running => Self::Running,
            ServerStatus::Stopping => Self::Stopping,
            ServerStatus::Off => Self::Stopped,
            _ => Self::None,
        }
    }
}

impl std::fmt::Display for MachineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::None => "none",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
        })
    }
}

pub struct MachineDriver {
    api: Arc<dyn CloudApi>,
    record: MachineRecord,
    waiter: ActionWaiter,
}

impl MachineDriver {
    pub fn new(api: Arc<dyn CloudApi>, record: MachineRecord, poll_interval: Duration, cancel: CancellationToken) -> Self {
        Self {
            waiter: ActionWaiter::new(api.clone(), poll_interval, cancel),
            api,
            record,
        }
    }

    pub fn record(&self) -> &MachineRecord {
        &self.record
    }

    pub async fn state(&self) -> Result<MachineState> {
        let server = self.api.server(self.record.server_id).await?.ok_or_else(|| Error::NotFound {
            kind: ResourceKind::Server,
            identifier: self.record.server_id.to_string(),
        })?;
        Ok(server.status.into())
    }

    pub async fn start(&self) -> Result<()> {
        self.power(ServerAction::PowerOn).await
    }

    /// Graceful ACPI shutdown.
    pub async fn stop(&self) -> Result<()> {
        self.power(ServerAction::Shutdown).await
    }

    pub async fn restart(&self) -> Result<()> {
        self.power(ServerAction::Reboot).await
    }

    /// Hard power off.
    pub async fn kill(&self) -> Result<()> {
        self.power(ServerAction::PowerOff).await
    }

    async fn power(&self, action: ServerAction) -> Result<()> {
        let server_id = self.record.server_id;
        info!(server_id, %action, "submitting server action");
        let submitted = self.api.server_action(server_id, action).await?;
        self.waiter.wait(&submitted).await?;
        info!(server_id, %action, "server action finished");
        Ok(())
    }

    /// Delete the server, an auto-created placement group it leaves empty,
    /// and the keys this tool registered. Anything already gone is skipped.
    pub async fn remove(&self) -> Result<()> {
        let server_id = self.record.server_id;
        match self.api.server(server_id).await? {
            None => info!(server_id, "server already gone"),
            Some(server) => {
                info!(server_id, name = %server.name, "deleting server");
                if let Some(action) = self.api.delete_server(server_id).await? {
                    self.waiter.wait(&action).await?;
                }
                if let Some(group) = server.placement_group {
                    self.remove_placement_group_if_empty(group.id, server_id).await;
                }
            }
        }

        for &key_id in &self.record.additional_key_ids {
            info!(key_id, "deleting additional key");
            if let Err(e) = self.api.delete_ssh_key(key_id).await {
                warn!(key_id, error = %e, "could not delete additional key");
            }
        }

        if self.record.is_existing_key {
            debug!(key_id = self.record.key_id, "keeping pre-existing ssh key");
        } else if self.record.key_id != 0 {
            info!(key_id = self.record.key_id, "deleting ssh key");
            self.api.delete_ssh_key(self.record.key_id).await?;
        }
        Ok(())
    }

    async fn remove_placement_group_if_empty(&self, group_id: i64, server_id: i64) {
        let group = match self.api.placement_group(&group_id.to_string()).await {
            Ok(Some(group)) => group,
            Ok(None) => return,
            Err(e) => {
                warn!(placement_group_id = group_id, error = %e, "could not inspect placement group");
                return;
            }
        };
        let auto_created = group.labels.get(&label_name(LABEL_AUTO_CREATED)).map(String::as_str) == Some("true");
        if !auto_created || group.servers.iter().any(|&member| member != server_id) {
            debug!(placement_group_id = group_id, auto_created, "keeping placement group");
            return;
        }
        info!(placement_group_id = group_id, name = %group.name, "deleting empty placement group");
        if let Err(e) = self.api.delete_placement_group(group_id).await {
            warn!(placement_group_id = group_id, error = %e, "could not delete placement group");
        }
    }

    pub fn ssh_hostname(&self) -> &str {
        &self.record.ip_address
    }

    pub fn ssh_port(&self) -> u16 {
        self.record.ssh_port
    }

    pub fn ssh_user(&self) -> &str {
        &self.record.ssh_user
    }

    pub async fn url(&self) -> Result<String> {
        let state = self.state().await?;
        if state != MachineState::Running {
            return Err(Error::Validation(format!("machine is {state}, not running")));
        }
        let ip: IpAddr = self
            .record
            .ip_address
            .parse()
            .map_err(|e| Error::Internal(format!("stored address {:?} is invalid: {e}", self.record.ip_address)))?;
        Ok(format!("tcp://{}", SocketAddr::new(ip, DOCKER_PORT)))
    }
}
