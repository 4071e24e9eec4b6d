use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};

use crate::config::{
    AUTO_SPREAD_GROUP_NAME, ImageSelector, LABEL_AUTO_CREATED, LABEL_AUTO_SPREAD, Labels,
    PlacementGroupSelector, label_name,
};
use crate::dangling::{DanglingResources, Rollback};
use crate::model::{
    CreatePlacementGroupRequest, Firewall, Image, Location, Network, PlacementGroup,
    PlacementGroupType, PrimaryIp, ServerType, SshKey, Volume,
};
use crate::{CloudApi, Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Location,
    ServerType,
    Image,
    SshKey,
    Network,
    Firewall,
    Volume,
    PlacementGroup,
    PrimaryIpv4,
    PrimaryIpv6,
    Server,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Location => "location",
            Self::ServerType => "server type",
            Self::Image => "image",
            Self::SshKey => "ssh key",
            Self::Network => "network",
            Self::Firewall => "firewall",
            Self::Volume => "volume",
            Self::PlacementGroup => "placement group",
            Self::PrimaryIpv4 => "primary ipv4",
            Self::PrimaryIpv6 => "primary ipv6",
            Self::Server => "server",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resolved provider resource, as stored in the cache. Kinds that may
/// legitimately be absent (location, placement group, primary IPs) cache
/// the absence too.
#[derive(Debug, Clone)]
pub enum Handle {
    Location(Option<Location>),
    ServerType(ServerType),
    Image(Image),
    SshKey(SshKey),
    Networks(Vec<Network>),
    Firewalls(Vec<Firewall>),
    Volumes(Vec<Volume>),
    PlacementGroup(Option<PlacementGroup>),
    PrimaryIp(Option<PrimaryIp>),
}

trait Cacheable: Clone {
    fn wrap(self) -> Handle;
    fn unwrap(handle: &Handle) -> Option<Self>;
}

macro_rules! cacheable {
    ($ty:ty, $variant:ident) => {
        impl Cacheable for $ty {
            fn wrap(self) -> Handle {
                Handle::$variant(self)
            }

            fn unwrap(handle: &Handle) -> Option<Self> {
                match handle {
                    Handle::$variant(inner) => Some(inner.clone()),
                    _ => None,
                }
            }
        }
    };
}

cacheable!(Option<Location>, Location);
cacheable!(ServerType, ServerType);
cacheable!(Image, Image);
cacheable!(SshKey, SshKey);
cacheable!(Vec<Network>, Networks);
cacheable!(Vec<Firewall>, Firewalls);
cacheable!(Vec<Volume>, Volumes);
cacheable!(Option<PlacementGroup>, PlacementGroup);
cacheable!(Option<PrimaryIp>, PrimaryIp);

/// One handle per resource kind, kept for the lifetime of a run.
#[derive(Debug, Default)]
pub struct ResolutionCache {
    handles: HashMap<ResourceKind, Handle>,
}

impl ResolutionCache {
    pub fn get(&self, kind: ResourceKind) -> Option<&Handle> {
        self.handles.get(&kind)
    }

    pub fn remember(&mut self, kind: ResourceKind, handle: Handle) {
        self.handles.insert(kind, handle);
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    fn lookup<T: Cacheable>(&self, kind: ResourceKind) -> Result<Option<T>> {
        match self.get(kind) {
            None => Ok(None),
            Some(handle) => T::unwrap(handle)
                .map(Some)
                .ok_or_else(|| Error::Internal(format!("cached {kind} has the wrong shape"))),
        }
    }

    fn store<T: Cacheable>(&mut self, kind: ResourceKind, value: &T) {
        self.remember(kind, value.clone().wrap());
    }
}

fn not_found(kind: ResourceKind, identifier: impl fmt::Display) -> Error {
    Error::NotFound { kind, identifier: identifier.to_string() }
}

/// Turns user-supplied identifiers into provider handles, at most one
/// provider lookup per kind and run.
pub struct ResourceResolver {
    api: Arc<dyn CloudApi>,
    cache: ResolutionCache,
}

impl ResourceResolver {
    pub fn new(api: Arc<dyn CloudApi>) -> Self {
        Self { api, cache: ResolutionCache::default() }
    }

    pub fn cache(&self) -> &ResolutionCache {
        &self.cache
    }

    /// An empty name means "let the provider choose".
    pub async fn location(&mut self, name: &str) -> Result<Option<Location>> {
        if let Some(cached) = self.cache.lookup(ResourceKind::Location)? {
            return Ok(cached);
        }
        let location = match name {
            "" => None,
            name => Some(
                self.api
                    .location(name)
                    .await?
                    .ok_or_else(|| not_found(ResourceKind::Location, name))?,
            ),
        };
        self.cache.store(ResourceKind::Location, &location);
        Ok(location)
    }

    pub async fn server_type(&mut self, name: &str) -> Result<ServerType> {
        if let Some(cached) = self.cache.lookup(ResourceKind::ServerType)? {
            return Ok(cached);
        }
        let server_type = self
            .api
            .server_type(name)
            .await?
            .ok_or_else(|| not_found(ResourceKind::ServerType, name))?;
        self.cache.store(ResourceKind::ServerType, &server_type);
        Ok(server_type)
    }

    /// Name lookups without an explicit architecture use the architecture
    /// of `server_type`, resolving it first.
    pub async fn image(&mut self, selector: &ImageSelector, server_type: &str) -> Result<Image> {
        if let Some(cached) = self.cache.lookup(ResourceKind::Image)? {
            return Ok(cached);
        }
        let image = match selector {
            ImageSelector::ById(id) => self
                .api
                .image_by_id(*id)
                .await?
                .ok_or_else(|| not_found(ResourceKind::Image, id))?,
            ImageSelector::ByName { name, architecture } => {
                let architecture = match architecture {
                    Some(architecture) => *architecture,
                    None => self.server_type(server_type).await?.architecture,
                };
                self.api
                    .image_by_name(name, architecture)
                    .await?
                    .ok_or_else(|| not_found(ResourceKind::Image, format!("{name} ({architecture})")))?
            }
        };
        self.cache.store(ResourceKind::Image, &image);
        Ok(image)
    }

    pub async fn ssh_key(&mut self, id: i64) -> Result<SshKey> {
        if let Some(cached) = self.cache.lookup(ResourceKind::SshKey)? {
            return Ok(cached);
        }
        let key = self
            .api
            .ssh_key(id)
            .await?
            .ok_or_else(|| not_found(ResourceKind::SshKey, id))?;
        self.cache.store(ResourceKind::SshKey, &key);
        Ok(key)
    }

    pub async fn networks(&mut self, identifiers: &[String]) -> Result<Vec<Network>> {
        if let Some(cached) = self.cache.lookup(ResourceKind::Network)? {
            return Ok(cached);
        }
        let mut networks = Vec::with_capacity(identifiers.len());
        for identifier in identifiers {
            let network = self
                .api
                .network(identifier)
                .await?
                .ok_or_else(|| not_found(ResourceKind::Network, identifier))?;
            networks.push(network);
        }
        self.cache.store(ResourceKind::Network, &networks);
        Ok(networks)
    }

    pub async fn firewalls(&mut self, identifiers: &[String]) -> Result<Vec<Firewall>> {
        if let Some(cached) = self.cache.lookup(ResourceKind::Firewall)? {
            return Ok(cached);
        }
        let mut firewalls = Vec::with_capacity(identifiers.len());
        for identifier in identifiers {
            let firewall = self
                .api
                .firewall(identifier)
                .await?
                .ok_or_else(|| not_found(ResourceKind::Firewall, identifier))?;
            firewalls.push(firewall);
        }
        self.cache.store(ResourceKind::Firewall, &firewalls);
        Ok(firewalls)
    }

    pub async fn volumes(&mut self, identifiers: &[String]) -> Result<Vec<Volume>> {
        if let Some(cached) = self.cache.lookup(ResourceKind::Volume)? {
            return Ok(cached);
        }
        let mut volumes = Vec::with_capacity(identifiers.len());
        for identifier in identifiers {
            let volume = self
                .api
                .volume(identifier)
                .await?
                .ok_or_else(|| not_found(ResourceKind::Volume, identifier))?;
            volumes.push(volume);
        }
        self.cache.store(ResourceKind::Volume, &volumes);
        Ok(volumes)
    }

    pub async fn primary_ipv4(&mut self, identifier: &str) -> Result<Option<PrimaryIp>> {
        self.primary_ip(ResourceKind::PrimaryIpv4, identifier).await
    }

    pub async fn primary_ipv6(&mut self, identifier: &str) -> Result<Option<PrimaryIp>> {
        self.primary_ip(ResourceKind::PrimaryIpv6, identifier).await
    }

    async fn primary_ip(&mut self, kind: ResourceKind, identifier: &str) -> Result<Option<PrimaryIp>> {
        if let Some(cached) = self.cache.lookup(kind)? {
            return Ok(cached);
        }
        let ip = match identifier {
            "" => None,
            identifier => Some(
                self.api
                    .primary_ip(identifier)
                    .await?
                    .ok_or_else(|| not_found(kind, identifier))?,
            ),
        };
        self.cache.store(kind, &ip);
        Ok(ip)
    }

    /// A missing named group, or a missing auto-spread group, is created
    /// and recorded on `dangling`.
    pub async fn placement_group(
        &mut self,
        selector: &PlacementGroupSelector,
        dangling: &mut DanglingResources,
    ) -> Result<Option<PlacementGroup>> {
        if let Some(cached) = self.cache.lookup(ResourceKind::PlacementGroup)? {
            return Ok(cached);
        }
        let group = match selector {
            PlacementGroupSelector::None => None,
            PlacementGroupSelector::Named(name) => match self.api.placement_group(name).await? {
                Some(group) => Some(group),
                None => {
                    let labels = Labels::from([(label_name(LABEL_AUTO_CREATED), "true".to_string())]);
                    Some(self.create_placement_group(name, labels, dangling).await?)
                }
            },
            PlacementGroupSelector::AutoSpread => {
                let mut found = self
                    .api
                    .placement_groups_by_label(&label_name(LABEL_AUTO_SPREAD))
                    .await?;
                if found.is_empty() {
                    let labels = Labels::from([
                        (label_name(LABEL_AUTO_SPREAD), "true".to_string()),
                        (label_name(LABEL_AUTO_CREATED), "true".to_string()),
                    ]);
                    Some(
                        self.create_placement_group(AUTO_SPREAD_GROUP_NAME, labels, dangling)
                            .await?,
                    )
                } else {
                    let group = found.swap_remove(0);
                    debug!(placement_group_id = group.id, "reusing auto spread placement group");
                    Some(group)
                }
            }
        };
        self.cache.store(ResourceKind::PlacementGroup, &group);
        Ok(group)
    }

    async fn create_placement_group(
        &self,
        name: &str,
        labels: Labels,
        dangling: &mut DanglingResources,
    ) -> Result<PlacementGroup> {
        info!(name, "creating placement group");
        let group = self
            .api
            .create_placement_group(&CreatePlacementGroupRequest {
                name: name.to_string(),
                kind: PlacementGroupType::Spread,
                labels,
            })
            .await?;
        dangling.push(Rollback::DeletePlacementGroup {
            id: group.id,
            name: group.name.clone(),
        });
        Ok(group)
    }
}
