//! Hetzner Cloud provider using the `hcloud` crate.

use async_trait::async_trait;
use hcloud::apis::configuration::Configuration;
use hcloud::apis::{
    actions_api, firewalls_api, images_api, locations_api, networks_api, placement_groups_api,
    primary_ips_api, server_types_api, servers_api, ssh_keys_api, volumes_api,
};
use hcloud::models;
use tracing::debug;

use crate::model::{
    Action, ActionError, ActionStatus, Architecture, CreatePlacementGroupRequest, CreateServerRequest,
    CreateServerResponse, CreateSshKeyRequest, Firewall, Image, Labels, Location, Network, PlacementGroup,
    PlacementGroupType, PrimaryIp, PrimaryIpType, PublicIpv4, PublicIpv6, Server, ServerAction,
    ServerPrivateNet, ServerPublicNet, ServerStatus, ServerType, SshKey, Volume,
};
use crate::{CloudApi, Error, ProviderError, Result};

const USER_AGENT: &str = concat!("hetzner-machine/", env!("CARGO_PKG_VERSION"));

pub struct HetznerProvider {
    config: Configuration,
}

impl HetznerProvider {
    pub fn new(token: impl Into<String>) -> Self {
        let mut config = Configuration::new();
        config.bearer_access_token = Some(token.into());
        config.user_agent = Some(USER_AGENT.to_string());
        Self { config }
    }
}

trait ApiResultExt<R> {
    fn or_provider(self, operation: &'static str) -> Result<R>;

    /// A 404 becomes `Ok(None)`.
    fn found(self, operation: &'static str) -> Result<Option<R>>;
}

impl<R, E> ApiResultExt<R> for std::result::Result<R, hcloud::apis::Error<E>> {
    fn or_provider(self, operation: &'static str) -> Result<R> {
        self.map_err(|e| provider_error(operation, e))
    }

    fn found(self, operation: &'static str) -> Result<Option<R>> {
        match self {
            Ok(resp) => Ok(Some(resp)),
            Err(hcloud::apis::Error::ResponseError(resp)) if resp.status.as_u16() == 404 => {
                debug!(operation, "hetzner: not found");
                Ok(None)
            }
            Err(e) => Err(provider_error(operation, e)),
        }
    }
}

fn provider_error<E>(operation: &'static str, err: hcloud::apis::Error<E>) -> Error {
    let (status, message) = match err {
        hcloud::apis::Error::ResponseError(resp) => (Some(resp.status.as_u16()), resp.content),
        other => (None, other.to_string()),
    };
    Error::Provider(ProviderError { operation, status, message })
}

fn numeric_id(id_or_name: &str) -> Option<i64> {
    id_or_name.parse().ok()
}

fn non_empty<T>(items: Vec<T>) -> Option<Vec<T>> {
    (!items.is_empty()).then_some(items)
}

#[async_trait]
impl CloudApi for HetznerProvider {
    async fn location(&self, id_or_name: &str) -> Result<Option<Location>> {
        if let Some(id) = numeric_id(id_or_name) {
            let resp = locations_api::get_location(&self.config, locations_api::GetLocationParams { id })
                .await
                .found("get location")?;
            if let Some(resp) = resp {
                return Ok(Some((*resp.location).into()));
            }
        }
        let resp = locations_api::list_locations(
            &self.config,
            locations_api::ListLocationsParams {
                name: Some(id_or_name.to_string()),
                ..Default::default()
            },
        )
        .await
        .or_provider("list locations")?;
        Ok(resp.locations.into_iter().next().map(Location::from))
    }

    async fn server_type(&self, id_or_name: &str) -> Result<Option<ServerType>> {
        if let Some(id) = numeric_id(id_or_name) {
            let resp = server_types_api::get_server_type(&self.config, server_types_api::GetServerTypeParams { id })
                .await
                .found("get server type")?;
            if let Some(resp) = resp {
                return Ok(Some((*resp.server_type).into()));
            }
        }
        let resp = server_types_api::list_server_types(
            &self.config,
            server_types_api::ListServerTypesParams {
                name: Some(id_or_name.to_string()),
                ..Default::default()
            },
        )
        .await
        .or_provider("list server types")?;
        Ok(resp.server_types.into_iter().next().map(ServerType::from))
    }

    async fn image_by_id(&self, id: i64) -> Result<Option<Image>> {
        let resp = images_api::get_image(&self.config, images_api::GetImageParams { id })
            .await
            .found("get image")?;
        Ok(resp.and_then(|resp| resp.image).map(|image| (*image).into()))
    }

    /// Images are only unique per architecture, so name lookups need one.
    async fn image_by_name(&self, name: &str, architecture: Architecture) -> Result<Option<Image>> {
        let resp = images_api::list_images(
            &self.config,
            images_api::ListImagesParams {
                name: Some(name.to_string()),
                architecture: Some(architecture.as_str().to_string()),
                ..Default::default()
            },
        )
        .await
        .or_provider("list images")?;
        Ok(resp.images.into_iter().next().map(Image::from))
    }

    async fn ssh_key(&self, id: i64) -> Result<Option<SshKey>> {
        let resp = ssh_keys_api::get_ssh_key(&self.config, ssh_keys_api::GetSshKeyParams { id })
            .await
            .found("get ssh key")?;
        Ok(resp.map(|resp| (*resp.ssh_key).into()))
    }

    async fn ssh_key_by_fingerprint(&self, fingerprint: &str) -> Result<Option<SshKey>> {
        let resp = ssh_keys_api::list_ssh_keys(
            &self.config,
            ssh_keys_api::ListSshKeysParams {
                fingerprint: Some(fingerprint.to_string()),
                ..Default::default()
            },
        )
        .await
        .or_provider("list ssh keys")?;
        Ok(resp.ssh_keys.into_iter().next().map(SshKey::from))
    }

    async fn create_ssh_key(&self, req: &CreateSshKeyRequest) -> Result<SshKey> {
        let resp = ssh_keys_api::create_ssh_key(
            &self.config,
            ssh_keys_api::CreateSshKeyParams {
                create_ssh_key_request: models::CreateSshKeyRequest {
                    name: req.name.clone(),
                    public_key: req.public_key.clone(),
                    labels: labels(&req.labels),
                },
            },
        )
        .await
        .or_provider("create ssh key")?;
        Ok((*resp.ssh_key).into())
    }

    async fn delete_ssh_key(&self, id: i64) -> Result<()> {
        ssh_keys_api::delete_ssh_key(&self.config, ssh_keys_api::DeleteSshKeyParams { id })
            .await
            .found("delete ssh key")?;
        Ok(())
    }

    async fn network(&self, id_or_name: &str) -> Result<Option<Network>> {
        if let Some(id) = numeric_id(id_or_name) {
            let resp = networks_api::get_network(&self.config, networks_api::GetNetworkParams { id })
                .await
                .found("get network")?;
            if let Some(network) = resp.and_then(|resp| resp.network) {
                return Ok(Some((*network).into()));
            }
        }
        let resp = networks_api::list_networks(
            &self.config,
            networks_api::ListNetworksParams {
                name: Some(id_or_name.to_string()),
                ..Default::default()
            },
        )
        .await
        .or_provider("list networks")?;
        Ok(resp.networks.into_iter().next().map(Network::from))
    }

    async fn firewall(&self, id_or_name: &str) -> Result<Option<Firewall>> {
        if let Some(id) = numeric_id(id_or_name) {
            let resp = firewalls_api::get_firewall(&self.config, firewalls_api::GetFirewallParams { id })
                .await
                .found("get firewall")?;
            if let Some(resp) = resp {
                return Ok(Some((*resp.firewall).into()));
            }
        }
        let resp = firewalls_api::list_firewalls(
            &self.config,
            firewalls_api::ListFirewallsParams {
                name: Some(id_or_name.to_string()),
                ..Default::default()
            },
        )
        .await
        .or_provider("list firewalls")?;
        Ok(resp.firewalls.into_iter().next().map(Firewall::from))
    }

    async fn volume(&self, id_or_name: &str) -> Result<Option<Volume>> {
        if let Some(id) = numeric_id(id_or_name) {
            let resp = volumes_api::get_volume(&self.config, volumes_api::GetVolumeParams { id })
                .await
                .found("get volume")?;
            if let Some(resp) = resp {
                return Ok(Some((*resp.volume).into()));
            }
        }
        let resp = volumes_api::list_volumes(
            &self.config,
            volumes_api::ListVolumesParams {
                name: Some(id_or_name.to_string()),
                ..Default::default()
            },
        )
        .await
        .or_provider("list volumes")?;
        Ok(resp.volumes.into_iter().next().map(Volume::from))
    }

    async fn placement_group(&self, id_or_name: &str) -> Result<Option<PlacementGroup>> {
        if let Some(id) = numeric_id(id_or_name) {
            let resp = placement_groups_api::get_placementgroup(
                &self.config,
                placement_groups_api::GetPlacementgroupParams { id },
            )
            .await
            .found("get placement group")?;
            if let Some(resp) = resp {
                return Ok(Some((*resp.placement_group).into()));
            }
        }
        let resp = placement_groups_api::list_placement_groups(
            &self.config,
            placement_groups_api::ListPlacementGroupsParams {
                name: Some(id_or_name.to_string()),
                ..Default::default()
            },
        )
        .await
        .or_provider("list placement groups")?;
        Ok(resp.placement_groups.into_iter().next().map(PlacementGroup::from))
    }

    async fn placement_groups_by_label(&self, label_selector: &str) -> Result<Vec<PlacementGroup>> {
        let resp = placement_groups_api::list_placement_groups(
            &self.config,
            placement_groups_api::ListPlacementGroupsParams {
                label_selector: Some(label_selector.to_string()),
                ..Default::default()
            },
        )
        .await
        .or_provider("list placement groups")?;
        Ok(resp.placement_groups.into_iter().map(PlacementGroup::from).collect())
    }

    async fn create_placement_group(&self, req: &CreatePlacementGroupRequest) -> Result<PlacementGroup> {
        let resp = placement_groups_api::create_placementgroup(
            &self.config,
            placement_groups_api::CreatePlacementgroupParams {
                create_placementgroup_request: models::CreatePlacementgroupRequest {
                    name: req.name.clone(),
                    labels: labels(&req.labels),
                    r#type: match req.kind {
                        PlacementGroupType::Spread => models::create_placementgroup_request::Type::Spread,
                    },
                },
            },
        )
        .await
        .or_provider("create placement group")?;
        Ok((*resp.placement_group).into())
    }

    async fn delete_placement_group(&self, id: i64) -> Result<()> {
        placement_groups_api::delete_placementgroup(
            &self.config,
            placement_groups_api::DeletePlacementgroupParams { id },
        )
        .await
        .found("delete placement group")?;
        Ok(())
    }

    /// Accepts an ID, a name, or the address itself.
    async fn primary_ip(&self, identifier: &str) -> Result<Option<PrimaryIp>> {
        let by_address = identifier.parse::<std::net::IpAddr>().is_ok();
        if !by_address {
            if let Some(id) = numeric_id(identifier) {
                let resp = primary_ips_api::get_primary_ip(&self.config, primary_ips_api::GetPrimaryIpParams { id })
                    .await
                    .found("get primary ip")?;
                if let Some(resp) = resp {
                    return Ok(Some((*resp.primary_ip).into()));
                }
            }
        }
        let mut params = primary_ips_api::ListPrimaryIpsParams::default();
        if by_address {
            params.ip = Some(identifier.to_string());
        } else {
            params.name = Some(identifier.to_string());
        }
        let resp = primary_ips_api::list_primary_ips(&self.config, params)
            .await
            .or_provider("list primary ips")?;
        Ok(resp.primary_ips.into_iter().next().map(PrimaryIp::from))
    }

    async fn create_server(&self, req: &CreateServerRequest) -> Result<CreateServerResponse> {
        let firewalls = req
            .firewalls
            .iter()
            .map(|fw| models::CreateServerRequestFirewalls { firewall: fw.firewall })
            .collect();

        let public_net = req.public_net.as_ref().map(|net| {
            Box::new(models::CreateServerRequestPublicNet {
                enable_ipv4: Some(net.enable_ipv4),
                enable_ipv6: Some(net.enable_ipv6),
                ipv4: net.ipv4.map(|id| Some(id as i32)),
                ipv6: net.ipv6.map(|id| Some(id as i32)),
            })
        });

        let resp = servers_api::create_server(
            &self.config,
            servers_api::CreateServerParams {
                create_server_request: models::CreateServerRequest {
                    name: req.name.clone(),
                    server_type: req.server_type.clone(),
                    image: req.image.clone(),
                    location: req.location.clone(),
                    user_data: req.user_data.clone(),
                    networks: non_empty(req.networks.clone()),
                    firewalls: non_empty(firewalls),
                    ssh_keys: non_empty(req.ssh_keys.iter().map(i64::to_string).collect()),
                    volumes: non_empty(req.volumes.clone()),
                    start_after_create: req.start_after_create,
                    automount: None,
                    datacenter: None,
                    labels: labels(&req.labels),
                    placement_group: req.placement_group,
                    public_net,
                },
            },
        )
        .await
        .or_provider("create server")?;

        Ok(CreateServerResponse {
            server: (*resp.server).into(),
            action: (*resp.action).into(),
            next_actions: resp.next_actions.into_iter().map(Action::from).collect(),
        })
    }

    async fn server(&self, id: i64) -> Result<Option<Server>> {
        let resp = servers_api::get_server(&self.config, servers_api::GetServerParams { id })
            .await
            .found("get server")?;
        Ok(resp.and_then(|resp| resp.server).map(|server| (*server).into()))
    }

    async fn delete_server(&self, id: i64) -> Result<Option<Action>> {
        let resp = servers_api::delete_server(&self.config, servers_api::DeleteServerParams { id })
            .await
            .found("delete server")?;
        Ok(resp.and_then(|resp| resp.action).map(|action| (*action).into()))
    }

    async fn server_action(&self, id: i64, action: ServerAction) -> Result<Action> {
        let submitted = match action {
            ServerAction::PowerOn => {
                servers_api::power_on_server(&self.config, servers_api::PowerOnServerParams { id })
                    .await
                    .or_provider("power on server")?
                    .action
            }
            ServerAction::Shutdown => {
                servers_api::shutdown_server(&self.config, servers_api::ShutdownServerParams { id })
                    .await
                    .or_provider("shutdown server")?
                    .action
            }
            ServerAction::Reboot => {
                servers_api::soft_reboot_server(&self.config, servers_api::SoftRebootServerParams { id })
                    .await
                    .or_provider("reboot server")?
                    .action
            }
            ServerAction::PowerOff => {
                servers_api::power_off_server(&self.config, servers_api::PowerOffServerParams { id })
                    .await
                    .or_provider("power off server")?
                    .action
            }
        };
        Ok((*submitted).into())
    }

    async fn action(&self, id: i64) -> Result<Action> {
        let resp = actions_api::get_action(&self.config, actions_api::GetActionParams { id })
            .await
            .or_provider("get action")?;
        Ok((*resp.action).into())
    }
}

// ── hcloud models → driver model ─────────────────────────────────────

fn labels(labels: &Labels) -> Option<std::collections::HashMap<String, String>> {
    (!labels.is_empty()).then(|| labels.clone().into_iter().collect())
}

impl From<models::Action> for Action {
    fn from(action: models::Action) -> Self {
        Self {
            id: action.id,
            status: match action.status {
                models::action::Status::Success => ActionStatus::Success,
                models::action::Status::Error => ActionStatus::Error,
                _ => ActionStatus::Running,
            },
            progress: action.progress.clamp(0, 100) as u8,
            error: action.error.map(|e| ActionError {
                code: e.code,
                message: e.message,
            }),
            command: action.command,
        }
    }
}

impl From<models::Location> for Location {
    fn from(location: models::Location) -> Self {
        Self {
            id: location.id,
            name: location.name,
        }
    }
}

impl From<models::ServerType> for ServerType {
    fn from(server_type: models::ServerType) -> Self {
        Self {
            id: server_type.id,
            name: server_type.name,
            architecture: match server_type.architecture {
                models::Architecture::Arm => Architecture::Arm,
                _ => Architecture::X86,
            },
        }
    }
}

impl From<models::Image> for Image {
    fn from(image: models::Image) -> Self {
        Self {
            id: image.id,
            name: image.name,
            architecture: match image.architecture {
                models::Architecture::Arm => Architecture::Arm,
                _ => Architecture::X86,
            },
        }
    }
}

impl From<models::SshKey> for SshKey {
    fn from(key: models::SshKey) -> Self {
        Self {
            id: key.id,
            name: key.name,
            fingerprint: key.fingerprint,
            public_key: key.public_key,
            labels: key.labels.into_iter().collect(),
        }
    }
}

impl From<models::Network> for Network {
    fn from(network: models::Network) -> Self {
        Self {
            id: network.id,
            name: network.name,
        }
    }
}

impl From<models::Firewall> for Firewall {
    fn from(firewall: models::Firewall) -> Self {
        Self {
            id: firewall.id,
            name: firewall.name,
        }
    }
}

impl From<models::Volume> for Volume {
    fn from(volume: models::Volume) -> Self {
        Self {
            id: volume.id,
            name: volume.name,
        }
    }
}

impl From<models::PlacementGroup> for PlacementGroup {
    fn from(group: models::PlacementGroup) -> Self {
        Self {
            id: group.id,
            name: group.name,
            kind: PlacementGroupType::Spread,
            labels: group.labels.into_iter().collect(),
            servers: group.servers,
        }
    }
}

impl From<models::PrimaryIp> for PrimaryIp {
    fn from(ip: models::PrimaryIp) -> Self {
        Self {
            id: ip.id,
            name: ip.name,
            ip: ip.ip,
            kind: match ip.r#type {
                models::IpType::Ipv6 => PrimaryIpType::Ipv6,
                _ => PrimaryIpType::Ipv4,
            },
        }
    }
}

fn server_status(status: &models::server::Status) -> ServerStatus {
    match status {
        models::server::Status::Initializing => ServerStatus::Initializing,
        models::server::Status::Starting => ServerStatus::Starting,
        models::server::Status::Running => ServerStatus::Running,
        models::server::Status::Stopping => ServerStatus::Stopping,
        models::server::Status::Off => ServerStatus::Off,
        models::server::Status::Deleting => ServerStatus::Deleting,
        models::server::Status::Migrating => ServerStatus::Migrating,
        models::server::Status::Rebuilding => ServerStatus::Rebuilding,
        _ => ServerStatus::Unknown,
    }
}

impl From<models::Server> for Server {
    fn from(server: models::Server) -> Self {
        let public_net = ServerPublicNet {
            ipv4: server.public_net.ipv4.map(|v4| PublicIpv4 { ip: v4.ip }),
            ipv6: server.public_net.ipv6.map(|v6| PublicIpv6 { ip: v6.ip }),
        };
        // Attachments still being set up carry no address yet.
        let private_net = server
            .private_net
            .into_iter()
            .filter_map(|net| {
                Some(ServerPrivateNet {
                    network: net.network?,
                    ip: net.ip?,
                })
            })
            .collect();

        Self {
            id: server.id,
            status: server_status(&server.status),
            public_net,
            private_net,
            placement_group: server.placement_group.flatten().map(|group| PlacementGroup {
                id: group.id,
                name: group.name,
                kind: PlacementGroupType::Spread,
                labels: group.labels.into_iter().collect(),
                servers: group.servers,
            }),
            labels: server.labels.into_iter().collect(),
            name: server.name,
        }
    }
}
