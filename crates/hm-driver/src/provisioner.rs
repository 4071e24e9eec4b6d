use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{DEFAULT_WAIT_ON_POLLING_SECS, DriverConfig};
use crate::dangling::{DanglingResources, Rollback};
use crate::keys::{Fingerprints, KeyMaterial};
use crate::model::{CreateServerFirewall, CreateServerRequest, CreateSshKeyRequest, ServerStatus, SshKey};
use crate::network::NetworkConfigurator;
use crate::resolver::{ResourceKind, ResourceResolver};
use crate::waiter::ActionWaiter;
use crate::{CloudApi, Error, Result, poll, userdata};

/// Where a `create` run currently stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionState {
    Idle,
    KeyPrepared,
    KeysRegistered,
    Submitted,
    Waiting,
    NetworkConfigured,
    Ready,
    Failed(String),
}

/// The identifying fields of a machine that outlive the run creating it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineRecord {
    pub name: String,
    pub server_id: i64,
    pub key_id: i64,
    /// The primary key was not created by this tool and must survive removal.
    pub is_existing_key: bool,
    /// Additional keys created by this tool.
    #[serde(default)]
    pub additional_key_ids: Vec<i64>,
    #[serde(default)]
    pub ip_address: String,
    pub ssh_user: String,
    pub ssh_port: u16,
    pub ssh_key_path: PathBuf,
    /// Seconds between action polls for later lifecycle commands.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

fn default_poll_interval_secs() -> u64 {
    DEFAULT_WAIT_ON_POLLING_SECS
}

impl MachineRecord {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

#[derive(Debug, Default)]
struct Run {
    key_id: Option<i64>,
    is_existing_key: bool,
    additional_key_ids: Vec<i64>,
    /// Every additional key attached to the server, created or pre-existing.
    attached_key_ids: Vec<i64>,
    server_id: Option<i64>,
    ip_address: Option<String>,
}

/// Creates one machine, rolling back whatever it created if any step fails.
pub struct Provisioner {
    config: DriverConfig,
    api: Arc<dyn CloudApi>,
    keys: Arc<dyn KeyMaterial>,
    resolver: ResourceResolver,
    dangling: DanglingResources,
    waiter: ActionWaiter,
    network: NetworkConfigurator,
    cancel: CancellationToken,
    ssh_key_path: PathBuf,
    state: ProvisionState,
    run: Run,
}

impl Provisioner {
    pub fn new(
        config: DriverConfig,
        api: Arc<dyn CloudApi>,
        keys: Arc<dyn KeyMaterial>,
        ssh_key_path: PathBuf,
        cancel: CancellationToken,
    ) -> Self {
        let interval = config.timing.poll_interval;
        Self {
            resolver: ResourceResolver::new(api.clone()),
            waiter: ActionWaiter::new(api.clone(), interval, cancel.clone()),
            network: NetworkConfigurator::new(config.network, interval, cancel.clone()),
            dangling: DanglingResources::default(),
            state: ProvisionState::Idle,
            run: Run::default(),
            config,
            api,
            keys,
            cancel,
            ssh_key_path,
        }
    }

    pub fn state(&self) -> &ProvisionState {
        &self.state
    }

    pub fn dangling(&self) -> &DanglingResources {
        &self.dangling
    }

    /// A record for a server that was created but never became ready, so
    /// the caller can still remove it.
    pub fn partial_record(&self) -> Option<MachineRecord> {
        let server_id = self.run.server_id?;
        Some(self.record(server_id, self.run.ip_address.clone().unwrap_or_default()))
    }

    fn record(&self, server_id: i64, ip_address: String) -> MachineRecord {
        MachineRecord {
            name: self.config.machine_name.clone(),
            server_id,
            key_id: self.run.key_id.unwrap_or_default(),
            is_existing_key: self.run.is_existing_key,
            additional_key_ids: self.run.additional_key_ids.clone(),
            ip_address,
            ssh_user: self.config.ssh_user.clone(),
            ssh_port: self.config.ssh_port,
            ssh_key_path: self.ssh_key_path.clone(),
            poll_interval_secs: self.config.timing.poll_interval.as_secs(),
        }
    }

    /// Verify the configuration against the provider without creating
    /// anything. Resolved handles are reused by `create`.
    pub async fn pre_create_check(&mut self) -> Result<()> {
        if let Some(existing) = self.config.existing_key.clone() {
            let remote = self.resolver.ssh_key(existing.id).await?;
            let local = self.keys.read_public_key(&existing.path).await?;
            if !Fingerprints::of_authorized_key(&local)?.matches(&remote.fingerprint) {
                return Err(Error::Validation(format!(
                    "remote key {} does not match local key {}",
                    existing.id,
                    existing.path.display()
                )));
            }
        }

        let server_type = self.resolver.server_type(&self.config.server_type).await?;
        if let Some(arch) = self.config.image_arch {
            if arch != server_type.architecture {
                warn!(
                    image_arch = %arch,
                    server_arch = %server_type.architecture,
                    "supplied architecture differs from server architecture"
                );
            }
        }

        self.resolver.image(&self.config.image, &self.config.server_type).await?;
        self.resolver.location(&self.config.location).await?;
        self.resolver.primary_ipv4(&self.config.primary_ipv4).await?;
        self.resolver.primary_ipv6(&self.config.primary_ipv6).await?;
        self.resolver.networks(&self.config.networks).await?;
        self.resolver.firewalls(&self.config.firewalls).await?;
        self.resolver.volumes(&self.config.volumes).await?;

        if self.config.network.use_private_network && self.config.networks.is_empty() {
            return Err(Error::Validation("no private network attached".into()));
        }
        Ok(())
    }

    pub async fn create(&mut self) -> Result<MachineRecord> {
        self.state = ProvisionState::Idle;
        if let Err(e) = self.prepare_local_key().await {
            self.state = ProvisionState::Failed(e.to_string());
            return Err(e);
        }
        self.state = ProvisionState::KeyPrepared;

        match self.provision().await {
            Ok(record) => {
                self.dangling.discard();
                self.state = ProvisionState::Ready;
                info!(server_id = record.server_id, address = %record.ip_address, "server ready");
                Ok(record)
            }
            Err(e) => {
                if !self.dangling.is_empty() {
                    warn!(error = %e, entries = self.dangling.entries().len(), "provisioning failed, rolling back");
                    let report = self.dangling.rollback(self.api.as_ref()).await;
                    if !report.failed.is_empty() {
                        warn!(failed = report.failed.len(), "rollback left resources behind");
                    }
                }
                if let Some(server_id) = self.run.server_id {
                    warn!(server_id, "server was created but is not ready; remove the machine to delete it");
                }
                self.state = ProvisionState::Failed(e.to_string());
                Err(e)
            }
        }
    }

    async fn prepare_local_key(&self) -> Result<()> {
        match &self.config.existing_key_path {
            Some(src) => {
                debug!(src = %src.display(), "copying ssh key");
                self.keys.copy_key_pair(src, &self.ssh_key_path).await
            }
            None => {
                debug!(path = %self.ssh_key_path.display(), "generating ssh key");
                self.keys.generate_key_pair(&self.ssh_key_path).await
            }
        }
    }

    async fn provision(&mut self) -> Result<MachineRecord> {
        self.register_keys().await?;
        self.state = ProvisionState::KeysRegistered;

        let request = self.build_request().await?;
        info!(name = %request.name, server_type = %request.server_type, "creating server");
        let created = match self.api.create_server(&request).await {
            Ok(created) => created,
            Err(e) => {
                let delay = self.config.timing.wait_on_error;
                if !delay.is_zero() {
                    warn!(?delay, error = %e, "server creation failed, pausing before reporting");
                    poll::sleep(delay, &self.cancel).await.ok();
                }
                return Err(e);
            }
        };

        let server_id = created.server.id;
        self.run.server_id = Some(server_id);
        self.state = ProvisionState::Submitted;
        info!(server_id, action_id = created.action.id, "server created");

        self.state = ProvisionState::Waiting;
        let mut actions = Vec::with_capacity(1 + created.next_actions.len());
        actions.push(created.action.clone());
        actions.extend(created.next_actions.iter().cloned());
        self.waiter.wait_all("create server", &actions).await?;

        info!(server_id, "waiting for server to start");
        self.wait_for_running(server_id).await?;

        let address = self.network.reachable_address(&self.api, &created.server).await?;
        self.run.ip_address = Some(address.clone());
        self.state = ProvisionState::NetworkConfigured;
        Ok(self.record(server_id, address))
    }

    async fn register_keys(&mut self) -> Result<()> {
        if let Some(id) = self.config.existing_key.as_ref().map(|k| k.id) {
            self.run.key_id = Some(id);
            self.run.is_existing_key = true;
        } else {
            let public_key = self.keys.read_public_key(&self.ssh_key_path).await?;
            let fingerprints = Fingerprints::of_authorized_key(&public_key)?;
            match self.api.ssh_key_by_fingerprint(&fingerprints.md5).await? {
                Some(key) => {
                    debug!(key_id = key.id, name = %key.name, "ssh key already registered");
                    self.run.key_id = Some(key.id);
                    self.run.is_existing_key = true;
                }
                None => {
                    info!("uploading ssh key");
                    let key = self.make_key(self.config.machine_name.clone(), public_key).await?;
                    self.run.key_id = Some(key.id);
                }
            }
        }

        for (i, public_key) in self.config.additional_keys.clone().into_iter().enumerate() {
            let fingerprints = Fingerprints::of_authorized_key(&public_key)?;
            let key = match self.api.ssh_key_by_fingerprint(&fingerprints.md5).await? {
                Some(key) => {
                    info!(key_id = key.id, name = %key.name, "using existing additional key");
                    key
                }
                None => {
                    info!(index = i, "creating additional key");
                    let name = format!("{}-additional-{i}", self.config.machine_name);
                    let key = self.make_key(name, public_key).await?;
                    self.run.additional_key_ids.push(key.id);
                    key
                }
            };
            self.run.attached_key_ids.push(key.id);
        }
        Ok(())
    }

    async fn make_key(&mut self, name: String, public_key: String) -> Result<SshKey> {
        let key = self
            .api
            .create_ssh_key(&CreateSshKeyRequest {
                name,
                public_key,
                labels: self.config.key_labels.clone(),
            })
            .await?;
        self.dangling.push(Rollback::DeleteSshKey {
            id: key.id,
            name: key.name.clone(),
        });
        Ok(key)
    }

    async fn user_data(&self) -> Result<Option<String>> {
        let base = self.config.user_data.load().await?;
        let additional = &self.config.additional_user_data;
        // Base user data alone is passed through untouched and may be a script.
        let merged = if additional.trim().is_empty() {
            base
        } else {
            userdata::merge(&base, additional)?
        };
        Ok(if merged.is_empty() { None } else { Some(merged) })
    }

    async fn build_request(&mut self) -> Result<CreateServerRequest> {
        let placement_group = self
            .resolver
            .placement_group(&self.config.placement_group, &mut self.dangling)
            .await?;
        let user_data = self.user_data().await?;

        let ipv4 = self.resolver.primary_ipv4(&self.config.primary_ipv4).await?;
        let ipv6 = self.resolver.primary_ipv6(&self.config.primary_ipv6).await?;
        let public_net = self.network.public_net_spec(ipv4.as_ref(), ipv6.as_ref());

        let networks = self.resolver.networks(&self.config.networks).await?;
        let firewalls = self.resolver.firewalls(&self.config.firewalls).await?;
        let volumes = self.resolver.volumes(&self.config.volumes).await?;
        let location = self.resolver.location(&self.config.location).await?;
        let server_type = self.resolver.server_type(&self.config.server_type).await?;
        let image = self.resolver.image(&self.config.image, &self.config.server_type).await?;

        let key_id = self
            .run
            .key_id
            .ok_or_else(|| Error::Internal("server submitted before its ssh key was registered".into()))?;
        let mut ssh_keys = self.run.attached_key_ids.clone();
        ssh_keys.push(key_id);

        Ok(CreateServerRequest {
            name: self.config.machine_name.clone(),
            server_type: server_type.name,
            image: image.id.to_string(),
            location: location.map(|l| l.name),
            ssh_keys,
            user_data,
            labels: self.config.server_labels.clone(),
            networks: networks.iter().map(|n| n.id).collect(),
            firewalls: firewalls
                .iter()
                .map(|f| CreateServerFirewall { firewall: f.id })
                .collect(),
            volumes: volumes.iter().map(|v| v.id).collect(),
            placement_group: placement_group.map(|g| g.id),
            public_net,
            start_after_create: None,
        })
    }

    async fn wait_for_running(&self, server_id: i64) -> Result<()> {
        match self.config.timing.running_timeout {
            None => self.poll_until_running(server_id).await,
            Some(limit) => tokio::time::timeout(limit, self.poll_until_running(server_id))
                .await
                .map_err(|_| Error::Timeout { what: "server to run", after: limit })?,
        }
    }

    async fn poll_until_running(&self, server_id: i64) -> Result<()> {
        loop {
            let server = self.api.server(server_id).await?.ok_or_else(|| Error::NotFound {
                kind: ResourceKind::Server,
                identifier: server_id.to_string(),
            })?;
            if server.status == ServerStatus::Running {
                return Ok(());
            }
            debug!(server_id, status = ?server.status, "server not running yet");
            poll::sleep(self.config.timing.poll_interval, &self.cancel).await?;
        }
    }
}
