pub mod config;
pub mod dangling;
pub mod driver;
pub mod hetzner;
pub mod keys;
pub mod model;
pub mod network;
pub mod poll;
pub mod provisioner;
pub mod resolver;
pub mod userdata;
pub mod waiter;

#[cfg(test)]
pub(crate) mod testing;

use std::time::Duration;

use async_trait::async_trait;

pub use config::{DriverConfig, DriverOptions};
pub use driver::{MachineDriver, MachineState};
pub use hetzner::HetznerProvider;
pub use provisioner::{MachineRecord, ProvisionState, Provisioner};
pub use resolver::ResourceKind;

use crate::model::{
    Action, Architecture, CreatePlacementGroupRequest, CreateServerRequest, CreateServerResponse,
    CreateSshKeyRequest, Firewall, Image, Location, Network, PlacementGroup, PrimaryIp, Server,
    ServerAction, ServerType, SshKey, Volume,
};

/// A failed provider call.
#[derive(Debug, thiserror::Error)]
#[error("{operation}: {message}")]
pub struct ProviderError {
    pub operation: &'static str,
    /// HTTP status, when the provider answered at all.
    pub status: Option<u16>,
    pub message: String,
}

impl ProviderError {
    pub fn is_not_found(&self) -> bool {
        self.status == Some(404)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    Validation(String),

    #[error("{kind} not found: {identifier}")]
    NotFound { kind: ResourceKind, identifier: String },

    #[error("malformed user data: {0}")]
    MalformedDocument(String),

    #[error("hetzner api error: {0}")]
    Provider(#[from] ProviderError),

    #[error("action {id} ({command}) failed: {code}: {message}")]
    ActionFailed {
        id: i64,
        command: String,
        code: String,
        message: String,
    },

    /// An action in a labelled batch failed; `error` is the failure itself.
    #[error("{label}: {error}")]
    Batch { label: String, error: Box<Error> },

    #[error("timed out after {after:?} waiting for {what}")]
    Timeout { what: &'static str, after: Duration },

    #[error("operation cancelled")]
    Cancelled,

    #[error("ssh key material: {0}")]
    KeyMaterial(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// The underlying failure with any batch labels peeled off.
    pub fn root(&self) -> &Error {
        match self {
            Error::Batch { error, .. } => error.root(),
            other => other,
        }
    }

    pub fn is_not_found(&self) -> bool {
        match self.root() {
            Error::NotFound { .. } => true,
            Error::Provider(e) => e.is_not_found(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// The provider operations the driver consumes.
///
/// Lookups return `Ok(None)` when the provider has no matching resource;
/// callers decide whether absence is an error. Identifiers named
/// `id_or_name` follow the provider's own semantics: numeric input is
/// tried as an ID first, then as a name.
#[async_trait]
pub trait CloudApi: Send + Sync + 'static {
    async fn location(&self, id_or_name: &str) -> Result<Option<Location>>;

    async fn server_type(&self, id_or_name: &str) -> Result<Option<ServerType>>;

    async fn image_by_id(&self, id: i64) -> Result<Option<Image>>;

    async fn image_by_name(&self, name: &str, architecture: Architecture) -> Result<Option<Image>>;

    async fn ssh_key(&self, id: i64) -> Result<Option<SshKey>>;

    /// Look up a key by its legacy MD5 fingerprint.
    async fn ssh_key_by_fingerprint(&self, fingerprint: &str) -> Result<Option<SshKey>>;

    async fn create_ssh_key(&self, req: &CreateSshKeyRequest) -> Result<SshKey>;

    /// Deleting an absent key succeeds.
    async fn delete_ssh_key(&self, id: i64) -> Result<()>;

    async fn network(&self, id_or_name: &str) -> Result<Option<Network>>;

    async fn firewall(&self, id_or_name: &str) -> Result<Option<Firewall>>;

    async fn volume(&self, id_or_name: &str) -> Result<Option<Volume>>;

    async fn placement_group(&self, id_or_name: &str) -> Result<Option<PlacementGroup>>;

    async fn placement_groups_by_label(&self, label_selector: &str) -> Result<Vec<PlacementGroup>>;

    async fn create_placement_group(&self, req: &CreatePlacementGroupRequest) -> Result<PlacementGroup>;

    async fn delete_placement_group(&self, id: i64) -> Result<()>;

    /// Accepts an ID, a name, or the address itself.
    async fn primary_ip(&self, identifier: &str) -> Result<Option<PrimaryIp>>;

    async fn create_server(&self, req: &CreateServerRequest) -> Result<CreateServerResponse>;

    async fn server(&self, id: i64) -> Result<Option<Server>>;

    /// Returns `None` if the server was already gone.
    async fn delete_server(&self, id: i64) -> Result<Option<Action>>;

    async fn server_action(&self, id: i64, action: ServerAction) -> Result<Action>;

    async fn action(&self, id: i64) -> Result<Action>;
}
