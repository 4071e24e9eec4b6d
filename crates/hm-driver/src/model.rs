//! Provider resources as the driver sees them.
//!
//! These are the driver's own shapes, filled in from `hcloud::models` by
//! [`crate::hetzner`]. Only the fields the driver reads are carried.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub type Labels = BTreeMap<String, String>;

// ── Actions ──────────────────────────────────────────────────────────

/// An asynchronous operation running on the provider side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    pub id: i64,
    pub command: String,
    pub status: ActionStatus,
    /// Completion percentage, 0 to 100.
    pub progress: u8,
    pub error: Option<ActionError>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ActionStatus {
    #[default]
    Running,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionError {
    pub code: String,
    pub message: String,
}

// ── Locations, server types, images ──────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub id: i64,
    pub name: String,
}

/// CPU architecture of server types and images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Architecture {
    X86,
    Arm,
}

impl Architecture {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::X86 => "x86",
            Self::Arm => "arm",
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown architecture {0}")]
pub struct UnknownArchitecture(pub String);

impl FromStr for Architecture {
    type Err = UnknownArchitecture;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "x86" => Ok(Self::X86),
            "arm" => Ok(Self::Arm),
            other => Err(UnknownArchitecture(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerType {
    pub id: i64,
    pub name: String,
    pub architecture: Architecture,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pub id: i64,
    /// Only system images carry a name; snapshots and backups do not.
    pub name: Option<String>,
    pub architecture: Architecture,
}

// ── SSH keys ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshKey {
    pub id: i64,
    pub name: String,
    /// Legacy MD5 fingerprint in `aa:bb:..` notation.
    pub fingerprint: String,
    pub public_key: String,
    pub labels: Labels,
}

#[derive(Debug, Clone)]
pub struct CreateSshKeyRequest {
    pub name: String,
    pub public_key: String,
    pub labels: Labels,
}

// ── Networks, firewalls, volumes ─────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Network {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Firewall {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Volume {
    pub id: i64,
    pub name: String,
}

// ── Placement groups ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PlacementGroupType {
    #[default]
    Spread,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacementGroup {
    pub id: i64,
    pub name: String,
    pub kind: PlacementGroupType,
    pub labels: Labels,
    /// IDs of the member servers.
    pub servers: Vec<i64>,
}

#[derive(Debug, Clone)]
pub struct CreatePlacementGroupRequest {
    pub name: String,
    pub kind: PlacementGroupType,
    pub labels: Labels,
}

// ── Primary IPs ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimaryIpType {
    Ipv4,
    Ipv6,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimaryIp {
    pub id: i64,
    pub name: String,
    pub ip: String,
    pub kind: PrimaryIpType,
}

// ── Servers ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ServerStatus {
    Initializing,
    Starting,
    Running,
    Stopping,
    Off,
    Deleting,
    Migrating,
    Rebuilding,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Server {
    pub id: i64,
    pub name: String,
    pub status: ServerStatus,
    pub public_net: ServerPublicNet,
    pub private_net: Vec<ServerPrivateNet>,
    pub placement_group: Option<PlacementGroup>,
    pub labels: Labels,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerPublicNet {
    pub ipv4: Option<PublicIpv4>,
    pub ipv6: Option<PublicIpv6>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicIpv4 {
    pub ip: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicIpv6 {
    /// The assigned block in CIDR notation, e.g. `2001:db8::/64`.
    pub ip: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerPrivateNet {
    pub network: i64,
    pub ip: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateServerRequest {
    pub name: String,
    pub server_type: String,
    pub image: String,
    pub location: Option<String>,
    pub ssh_keys: Vec<i64>,
    pub user_data: Option<String>,
    pub labels: Labels,
    pub networks: Vec<i64>,
    pub firewalls: Vec<CreateServerFirewall>,
    pub volumes: Vec<i64>,
    pub placement_group: Option<i64>,
    pub public_net: Option<CreateServerPublicNet>,
    pub start_after_create: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateServerFirewall {
    pub firewall: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateServerPublicNet {
    pub enable_ipv4: bool,
    pub enable_ipv6: bool,
    pub ipv4: Option<i64>,
    pub ipv6: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct CreateServerResponse {
    pub server: Server,
    pub action: Action,
    pub next_actions: Vec<Action>,
}

/// Power actions on an existing server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerAction {
    PowerOn,
    Shutdown,
    Reboot,
    PowerOff,
}

impl ServerAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PowerOn => "poweron",
            Self::Shutdown => "shutdown",
            Self::Reboot => "reboot",
            Self::PowerOff => "poweroff",
        }
    }
}

impl fmt::Display for ServerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
