//! In-memory `CloudApi` for unit tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::config::Labels;
use crate::keys::KeyMaterial;
use crate::model::{
    Action, ActionError, ActionStatus, Architecture, CreatePlacementGroupRequest,
    CreateServerRequest, CreateServerResponse, CreateSshKeyRequest, Firewall, Image, Location,
    Network, PlacementGroup, PrimaryIp, PrimaryIpType, PublicIpv4, PublicIpv6, Server,
    ServerAction, ServerPublicNet, ServerStatus, ServerType, SshKey, Volume,
};
use crate::resolver::ResourceKind;
use crate::{CloudApi, Error, ProviderError, Result};

pub const PRIMARY_KEY: &str =
    "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIPTbY26CnhCmPuPwJnsF6OMnTXX4iWrmtRRovTz4oEoK fixture@example";
pub const EXTRA_KEY_ONE: &str =
    "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIMxxLK/Q14OZ8Q14rZEfbM0pnsjtl4R/c0J+R5Ib7/91 extra-one";
pub const EXTRA_KEY_TWO: &str =
    "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIAafpudQkl9SrIOWM0QjpQZ/7gLSQtsxBIASBYrS6wVp extra-two";

/// Key material that never touches the filesystem. Every public key read
/// returns the same line.
pub struct FakeKeys {
    public_key: String,
    generated: Mutex<Vec<PathBuf>>,
    copied: Mutex<Vec<(PathBuf, PathBuf)>>,
}

impl FakeKeys {
    pub fn new(public_key: &str) -> Self {
        Self {
            public_key: public_key.to_string(),
            generated: Mutex::default(),
            copied: Mutex::default(),
        }
    }

    pub fn generated(&self) -> Vec<PathBuf> {
        self.generated.lock().unwrap().clone()
    }

    pub fn copied(&self) -> Vec<(PathBuf, PathBuf)> {
        self.copied.lock().unwrap().clone()
    }
}

#[async_trait]
impl KeyMaterial for FakeKeys {
    async fn generate_key_pair(&self, path: &Path) -> Result<()> {
        self.generated.lock().unwrap().push(path.to_path_buf());
        Ok(())
    }

    async fn copy_key_pair(&self, src: &Path, dst: &Path) -> Result<()> {
        self.copied.lock().unwrap().push((src.to_path_buf(), dst.to_path_buf()));
        Ok(())
    }

    async fn read_public_key(&self, _key_path: &Path) -> Result<String> {
        Ok(self.public_key.clone())
    }
}

pub fn action(id: i64, command: &str, status: ActionStatus, progress: u8) -> Action {
    Action {
        id,
        command: command.to_string(),
        status,
        progress,
        error: None,
    }
}

pub fn failed_action(id: i64, command: &str, progress: u8, code: &str) -> Action {
    Action {
        error: Some(ActionError {
            code: code.to_string(),
            message: format!("{command} failed"),
        }),
        ..action(id, command, ActionStatus::Error, progress)
    }
}

pub fn server(id: i64, name: &str, status: ServerStatus) -> Server {
    Server {
        id,
        name: name.to_string(),
        status,
        public_net: ServerPublicNet {
            ipv4: Some(PublicIpv4 { ip: "203.0.113.10".into() }),
            ipv6: Some(PublicIpv6 { ip: "2001:db8:10::/64".into() }),
        },
        ..Default::default()
    }
}

fn provider_error(code: &str) -> Error {
    Error::Provider(ProviderError {
        operation: "fake",
        status: Some(422),
        message: format!("{code}: injected failure"),
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    CreateSshKey(String),
    DeleteSshKey(i64),
    CreatePlacementGroup(String),
    DeletePlacementGroup(i64),
    CreateServer(String),
    DeleteServer(i64),
    ServerAction(i64, ServerAction),
}

#[derive(Default)]
struct State {
    next_id: i64,
    locations: Vec<Location>,
    server_types: Vec<ServerType>,
    images: Vec<Image>,
    ssh_keys: Vec<SshKey>,
    networks: Vec<Network>,
    firewalls: Vec<Firewall>,
    volumes: Vec<Volume>,
    placement_groups: Vec<PlacementGroup>,
    primary_ips: Vec<PrimaryIp>,
    servers: HashMap<i64, Server>,
    server_scripts: HashMap<i64, VecDeque<Server>>,
    action_scripts: HashMap<i64, VecDeque<Action>>,
    action_polls: HashMap<i64, usize>,
    create_actions: Vec<Action>,
    created_server_script: Vec<Server>,
    lookups: HashMap<ResourceKind, usize>,
    calls: Vec<Call>,
    failing_key_deletes: HashSet<i64>,
    fail_create_server: bool,
    fail_create_key_named: Option<String>,
    last_create_request: Option<CreateServerRequest>,
}

impl State {
    fn id(&mut self) -> i64 {
        self.next_id += 1;
        1000 + self.next_id
    }

    fn looked_up(&mut self, kind: ResourceKind) {
        *self.lookups.entry(kind).or_default() += 1;
    }
}

/// Records every call, counts lookups per kind, and replays scripted
/// action and server states.
#[derive(Default)]
pub struct FakeCloud {
    state: Mutex<State>,
}

impl FakeCloud {
    /// Locations `fsn1`/`nbg1`, server types `cpx22` (x86) and `cax11`
    /// (arm), and `ubuntu-24.04` for both architectures.
    pub fn with_defaults() -> Self {
        let fake = Self::default();
        {
            let mut s = fake.state.lock().unwrap();
            for (id, name) in [(1, "fsn1"), (2, "nbg1")] {
                s.locations.push(Location { id, name: name.into() });
            }
            for (id, name, architecture) in [(10, "cpx22", Architecture::X86), (11, "cax11", Architecture::Arm)] {
                s.server_types.push(ServerType { id, name: name.into(), architecture });
            }
            for (id, architecture) in [(100, Architecture::X86), (101, Architecture::Arm)] {
                s.images.push(Image {
                    id,
                    name: Some("ubuntu-24.04".into()),
                    architecture,
                });
            }
        }
        fake
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn add_ssh_key(&self, id: i64, name: &str, public_key: &str) {
        let fingerprint = crate::keys::Fingerprints::of_authorized_key(public_key)
            .map(|fp| fp.md5)
            .unwrap_or_else(|_| format!("fp-{id}"));
        self.lock().ssh_keys.push(SshKey {
            id,
            name: name.into(),
            fingerprint,
            public_key: public_key.into(),
            labels: Labels::new(),
        });
    }

    pub fn add_network(&self, id: i64, name: &str) {
        self.lock().networks.push(Network { id, name: name.into() });
    }

    pub fn add_firewall(&self, id: i64, name: &str) {
        self.lock().firewalls.push(Firewall { id, name: name.into() });
    }

    pub fn add_volume(&self, id: i64, name: &str) {
        self.lock().volumes.push(Volume { id, name: name.into() });
    }

    pub fn add_placement_group(&self, id: i64, name: &str, labels: Labels) {
        self.lock().placement_groups.push(PlacementGroup {
            id,
            name: name.into(),
            kind: Default::default(),
            labels,
            servers: Vec::new(),
        });
    }

    pub fn add_primary_ip(&self, id: i64, name: &str, ip: &str) {
        let kind = if ip.contains(':') { PrimaryIpType::Ipv6 } else { PrimaryIpType::Ipv4 };
        self.lock().primary_ips.push(PrimaryIp {
            id,
            name: name.into(),
            ip: ip.into(),
            kind,
        });
    }

    pub fn add_server(&self, server: Server) {
        self.lock().servers.insert(server.id, server);
    }

    /// Successive polls of action `id` return these states; the last repeats.
    pub fn script_action(&self, id: i64, states: Vec<Action>) {
        self.lock().action_scripts.insert(id, states.into());
    }

    /// Successive `server(id)` reads return these states; the last repeats.
    pub fn script_server(&self, id: i64, states: Vec<Server>) {
        self.lock().server_scripts.insert(id, states.into());
    }

    /// Reads of the next created server return these states, with their
    /// IDs rewritten to the new server's.
    pub fn script_created_server(&self, states: Vec<Server>) {
        self.lock().created_server_script = states;
    }

    /// Actions returned by the next `create_server`: the first is the
    /// create action, the rest are follow-ups.
    pub fn set_create_actions(&self, actions: Vec<Action>) {
        self.lock().create_actions = actions;
    }

    pub fn fail_create_server(&self) {
        self.lock().fail_create_server = true;
    }

    pub fn fail_create_ssh_key(&self, name: &str) {
        self.lock().fail_create_key_named = Some(name.to_string());
    }

    pub fn fail_delete_ssh_key(&self, id: i64) {
        self.lock().failing_key_deletes.insert(id);
    }

    pub fn lookups(&self, kind: ResourceKind) -> usize {
        self.lock().lookups.get(&kind).copied().unwrap_or(0)
    }

    pub fn action_polls(&self, id: i64) -> usize {
        self.lock().action_polls.get(&id).copied().unwrap_or(0)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn deletions(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| {
                matches!(
                    c,
                    Call::DeleteSshKey(_) | Call::DeletePlacementGroup(_) | Call::DeleteServer(_)
                )
            })
            .collect()
    }

    pub fn ssh_key_ids(&self) -> Vec<i64> {
        self.lock().ssh_keys.iter().map(|k| k.id).collect()
    }

    pub fn placement_group_ids(&self) -> Vec<i64> {
        self.lock().placement_groups.iter().map(|g| g.id).collect()
    }

    pub fn last_create_request(&self) -> Option<CreateServerRequest> {
        self.lock().last_create_request.clone()
    }
}

fn by_id_or_name<T: Clone>(items: &[T], id_or_name: &str, id: impl Fn(&T) -> i64, name: impl Fn(&T) -> &str) -> Option<T> {
    if let Ok(numeric) = id_or_name.parse::<i64>() {
        if let Some(found) = items.iter().find(|item| id(item) == numeric) {
            return Some(found.clone());
        }
    }
    items.iter().find(|item| name(item) == id_or_name).cloned()
}

#[async_trait]
impl CloudApi for FakeCloud {
    async fn location(&self, id_or_name: &str) -> Result<Option<Location>> {
        let mut s = self.lock();
        s.looked_up(ResourceKind::Location);
        Ok(by_id_or_name(&s.locations, id_or_name, |l| l.id, |l| &l.name))
    }

    async fn server_type(&self, id_or_name: &str) -> Result<Option<ServerType>> {
        let mut s = self.lock();
        s.looked_up(ResourceKind::ServerType);
        Ok(by_id_or_name(&s.server_types, id_or_name, |t| t.id, |t| &t.name))
    }

    async fn image_by_id(&self, id: i64) -> Result<Option<Image>> {
        let mut s = self.lock();
        s.looked_up(ResourceKind::Image);
        Ok(s.images.iter().find(|i| i.id == id).cloned())
    }

    async fn image_by_name(&self, name: &str, architecture: Architecture) -> Result<Option<Image>> {
        let mut s = self.lock();
        s.looked_up(ResourceKind::Image);
        Ok(s.images
            .iter()
            .find(|i| i.name.as_deref() == Some(name) && i.architecture == architecture)
            .cloned())
    }

    async fn ssh_key(&self, id: i64) -> Result<Option<SshKey>> {
        let mut s = self.lock();
        s.looked_up(ResourceKind::SshKey);
        Ok(s.ssh_keys.iter().find(|k| k.id == id).cloned())
    }

    async fn ssh_key_by_fingerprint(&self, fingerprint: &str) -> Result<Option<SshKey>> {
        let mut s = self.lock();
        s.looked_up(ResourceKind::SshKey);
        Ok(s.ssh_keys.iter().find(|k| k.fingerprint == fingerprint).cloned())
    }

    async fn create_ssh_key(&self, req: &CreateSshKeyRequest) -> Result<SshKey> {
        let mut s = self.lock();
        s.calls.push(Call::CreateSshKey(req.name.clone()));
        if s.fail_create_key_named.as_deref() == Some(req.name.as_str()) {
            return Err(provider_error("uniqueness_error"));
        }
        let id = s.id();
        let fingerprint = crate::keys::Fingerprints::of_authorized_key(&req.public_key)
            .map(|fp| fp.md5)
            .unwrap_or_else(|_| format!("fp-{id}"));
        let key = SshKey {
            id,
            name: req.name.clone(),
            fingerprint,
            public_key: req.public_key.clone(),
            labels: req.labels.clone(),
        };
        s.ssh_keys.push(key.clone());
        Ok(key)
    }

    async fn delete_ssh_key(&self, id: i64) -> Result<()> {
        let mut s = self.lock();
        s.calls.push(Call::DeleteSshKey(id));
        if s.failing_key_deletes.contains(&id) {
            return Err(provider_error("locked"));
        }
        s.ssh_keys.retain(|k| k.id != id);
        Ok(())
    }

    async fn network(&self, id_or_name: &str) -> Result<Option<Network>> {
        let mut s = self.lock();
        s.looked_up(ResourceKind::Network);
        Ok(by_id_or_name(&s.networks, id_or_name, |n| n.id, |n| &n.name))
    }

    async fn firewall(&self, id_or_name: &str) -> Result<Option<Firewall>> {
        let mut s = self.lock();
        s.looked_up(ResourceKind::Firewall);
        Ok(by_id_or_name(&s.firewalls, id_or_name, |f| f.id, |f| &f.name))
    }

    async fn volume(&self, id_or_name: &str) -> Result<Option<Volume>> {
        let mut s = self.lock();
        s.looked_up(ResourceKind::Volume);
        Ok(by_id_or_name(&s.volumes, id_or_name, |v| v.id, |v| &v.name))
    }

    async fn placement_group(&self, id_or_name: &str) -> Result<Option<PlacementGroup>> {
        let mut s = self.lock();
        s.looked_up(ResourceKind::PlacementGroup);
        Ok(by_id_or_name(&s.placement_groups, id_or_name, |g| g.id, |g| &g.name))
    }

    async fn placement_groups_by_label(&self, label_selector: &str) -> Result<Vec<PlacementGroup>> {
        let mut s = self.lock();
        s.looked_up(ResourceKind::PlacementGroup);
        Ok(s.placement_groups
            .iter()
            .filter(|g| g.labels.contains_key(label_selector))
            .cloned()
            .collect())
    }

    async fn create_placement_group(&self, req: &CreatePlacementGroupRequest) -> Result<PlacementGroup> {
        let mut s = self.lock();
        s.calls.push(Call::CreatePlacementGroup(req.name.clone()));
        let id = s.id();
        let group = PlacementGroup {
            id,
            name: req.name.clone(),
            kind: req.kind,
            labels: req.labels.clone(),
            servers: Vec::new(),
        };
        s.placement_groups.push(group.clone());
        Ok(group)
    }

    async fn delete_placement_group(&self, id: i64) -> Result<()> {
        let mut s = self.lock();
        s.calls.push(Call::DeletePlacementGroup(id));
        s.placement_groups.retain(|g| g.id != id);
        Ok(())
    }

    async fn primary_ip(&self, identifier: &str) -> Result<Option<PrimaryIp>> {
        let mut s = self.lock();
        let found = s
            .primary_ips
            .iter()
            .find(|ip| ip.ip == identifier || ip.name == identifier || ip.id.to_string() == identifier)
            .cloned();
        let kind = match found.as_ref().map(|ip| ip.kind) {
            Some(PrimaryIpType::Ipv6) => ResourceKind::PrimaryIpv6,
            _ => ResourceKind::PrimaryIpv4,
        };
        s.looked_up(kind);
        Ok(found)
    }

    async fn create_server(&self, req: &CreateServerRequest) -> Result<CreateServerResponse> {
        let mut s = self.lock();
        s.calls.push(Call::CreateServer(req.name.clone()));
        s.last_create_request = Some(req.clone());
        if s.fail_create_server {
            return Err(provider_error("resource_unavailable"));
        }
        let id = s.id();
        let mut created = server(id, &req.name, ServerStatus::Initializing);
        created.labels = req.labels.clone();
        if let Some(pg) = req.placement_group {
            if let Some(group) = s.placement_groups.iter_mut().find(|g| g.id == pg) {
                group.servers.push(id);
                created.placement_group = Some(group.clone());
            }
        }
        s.servers.insert(id, Server { status: ServerStatus::Running, ..created.clone() });
        let script: VecDeque<Server> = std::mem::take(&mut s.created_server_script)
            .into_iter()
            .map(|state| Server { id, ..state })
            .collect();
        if !script.is_empty() {
            s.server_scripts.insert(id, script);
        }

        let mut actions = std::mem::take(&mut s.create_actions);
        if actions.is_empty() {
            actions.push(action(id, "create_server", ActionStatus::Success, 100));
        }
        let action = actions.remove(0);
        Ok(CreateServerResponse {
            server: created,
            action,
            next_actions: actions,
        })
    }

    async fn server(&self, id: i64) -> Result<Option<Server>> {
        let mut s = self.lock();
        s.looked_up(ResourceKind::Server);
        if let Some(script) = s.server_scripts.get_mut(&id) {
            if script.len() > 1 {
                return Ok(script.pop_front());
            }
            if let Some(last) = script.front() {
                return Ok(Some(last.clone()));
            }
        }
        Ok(s.servers.get(&id).cloned())
    }

    async fn delete_server(&self, id: i64) -> Result<Option<Action>> {
        let mut s = self.lock();
        s.calls.push(Call::DeleteServer(id));
        let Some(removed) = s.servers.remove(&id) else {
            return Ok(None);
        };
        for group in &mut s.placement_groups {
            group.servers.retain(|member| *member != removed.id);
        }
        Ok(Some(action(id + 500, "delete_server", ActionStatus::Success, 100)))
    }

    async fn server_action(&self, id: i64, server_action: ServerAction) -> Result<Action> {
        let mut s = self.lock();
        s.calls.push(Call::ServerAction(id, server_action));
        if !s.servers.contains_key(&id) {
            return Err(provider_error("not_found"));
        }
        Ok(action(id + 700, server_action.as_str(), ActionStatus::Running, 0))
    }

    async fn action(&self, id: i64) -> Result<Action> {
        let mut s = self.lock();
        *s.action_polls.entry(id).or_default() += 1;
        match s.action_scripts.get_mut(&id) {
            Some(script) if script.len() > 1 => script
                .pop_front()
                .ok_or_else(|| Error::Internal("empty action script".into())),
            Some(script) => script
                .front()
                .cloned()
                .ok_or_else(|| Error::Internal("empty action script".into())),
            None => Ok(action(id, "unscripted", ActionStatus::Success, 100)),
        }
    }
}
