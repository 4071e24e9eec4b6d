//! Driver configuration: flag names, defaults, and validation of the flat
//! option set handed over by the outer surface.

use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

pub use crate::model::Labels;
use crate::model::Architecture;
use crate::{Error, Result};

pub const DEFAULT_IMAGE: &str = "ubuntu-24.04";
pub const DEFAULT_SERVER_TYPE: &str = "cpx22";
pub const DEFAULT_SSH_USER: &str = "root";
pub const DEFAULT_SSH_PORT: u16 = 22;
pub const DEFAULT_WAIT_ON_ERROR_SECS: u64 = 0;
pub const DEFAULT_WAIT_ON_POLLING_SECS: u64 = 1;
pub const DEFAULT_WAIT_FOR_RUNNING_TIMEOUT_SECS: u64 = 0;

/// Image names that used to be defaults. They may accompany an image ID
/// without conflicting, in which case the name is ignored.
pub const LEGACY_DEFAULT_IMAGES: &[&str] = &["ubuntu-24.04", "ubuntu-18.04", "ubuntu-16.04", "debian-9"];

pub const LABEL_PREFIX: &str = "docker-machine-driver-hetzner/";
pub const LABEL_AUTO_SPREAD: &str = "auto-spread";
pub const LABEL_AUTO_CREATED: &str = "auto-created";
pub const AUTO_SPREAD_GROUP_NAME: &str = "Docker-Machine auto spread";

pub fn label_name(name: &str) -> String {
    format!("{LABEL_PREFIX}{name}")
}

pub const FLAG_API_TOKEN: &str = "hetzner-api-token";
pub const FLAG_IMAGE: &str = "hetzner-image";
pub const FLAG_IMAGE_ID: &str = "hetzner-image-id";
pub const FLAG_IMAGE_ARCH: &str = "hetzner-image-arch";
pub const FLAG_SERVER_TYPE: &str = "hetzner-server-type";
pub const FLAG_LOCATION: &str = "hetzner-server-location";
pub const FLAG_EXISTING_KEY_ID: &str = "hetzner-existing-key-id";
pub const FLAG_EXISTING_KEY_PATH: &str = "hetzner-existing-key-path";
pub const FLAG_USER_DATA: &str = "hetzner-user-data";
pub const FLAG_USER_DATA_FILE: &str = "hetzner-user-data-file";
pub const FLAG_ADDITIONAL_USER_DATA: &str = "hetzner-additional-user-data";
pub const FLAG_VOLUMES: &str = "hetzner-volumes";
pub const FLAG_NETWORKS: &str = "hetzner-networks";
pub const FLAG_USE_PRIVATE_NETWORK: &str = "hetzner-use-private-network";
pub const FLAG_DISABLE_PUBLIC_IPV4: &str = "hetzner-disable-public-ipv4";
pub const FLAG_DISABLE_PUBLIC_IPV6: &str = "hetzner-disable-public-ipv6";
pub const FLAG_PRIMARY_IPV4: &str = "hetzner-primary-ipv4";
pub const FLAG_PRIMARY_IPV6: &str = "hetzner-primary-ipv6";
pub const FLAG_DISABLE_PUBLIC: &str = "hetzner-disable-public";
pub const FLAG_FIREWALLS: &str = "hetzner-firewalls";
pub const FLAG_ADDITIONAL_KEYS: &str = "hetzner-additional-key";
pub const FLAG_SERVER_LABEL: &str = "hetzner-server-label";
pub const FLAG_KEY_LABEL: &str = "hetzner-key-label";
pub const FLAG_PLACEMENT_GROUP: &str = "hetzner-placement-group";
pub const FLAG_AUTO_SPREAD: &str = "hetzner-auto-spread";
pub const FLAG_SSH_USER: &str = "hetzner-ssh-user";
pub const FLAG_SSH_PORT: &str = "hetzner-ssh-port";
pub const FLAG_WAIT_ON_ERROR: &str = "hetzner-wait-on-error";
pub const FLAG_WAIT_ON_POLLING: &str = "hetzner-wait-on-polling";
pub const FLAG_WAIT_FOR_RUNNING_TIMEOUT: &str = "hetzner-wait-for-running-timeout";

pub const LEGACY_FLAG_USER_DATA_FROM_FILE: &str = "hetzner-user-data-from-file";
pub const LEGACY_FLAG_DISABLE_PUBLIC_4: &str = "hetzner-disable-public-4";
pub const LEGACY_FLAG_DISABLE_PUBLIC_6: &str = "hetzner-disable-public-6";

/// Unvalidated option values, one field per flag.
#[derive(Debug, Clone)]
pub struct DriverOptions {
    pub machine_name: String,
    pub api_token: String,
    pub image: String,
    pub image_id: String,
    pub image_arch: String,
    pub server_type: String,
    pub location: String,
    pub existing_key_id: String,
    pub existing_key_path: String,
    pub user_data: String,
    pub user_data_file: String,
    pub user_data_from_file: bool,
    pub additional_user_data: String,
    pub volumes: Vec<String>,
    pub networks: Vec<String>,
    pub use_private_network: bool,
    pub disable_public_ipv4: bool,
    pub disable_public_ipv6: bool,
    pub legacy_disable_public_4: bool,
    pub legacy_disable_public_6: bool,
    pub disable_public: bool,
    pub primary_ipv4: String,
    pub primary_ipv6: String,
    pub firewalls: Vec<String>,
    pub additional_keys: Vec<String>,
    pub server_labels: Vec<String>,
    pub key_labels: Vec<String>,
    pub placement_group: String,
    pub auto_spread: bool,
    pub ssh_user: String,
    pub ssh_port: u16,
    pub wait_on_error: u64,
    pub wait_on_polling: u64,
    pub wait_for_running_timeout: u64,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            machine_name: String::new(),
            api_token: String::new(),
            image: String::new(),
            image_id: String::new(),
            image_arch: String::new(),
            server_type: DEFAULT_SERVER_TYPE.into(),
            location: String::new(),
            existing_key_id: String::new(),
            existing_key_path: String::new(),
            user_data: String::new(),
            user_data_file: String::new(),
            user_data_from_file: false,
            additional_user_data: String::new(),
            volumes: Vec::new(),
            networks: Vec::new(),
            use_private_network: false,
            disable_public_ipv4: false,
            disable_public_ipv6: false,
            legacy_disable_public_4: false,
            legacy_disable_public_6: false,
            disable_public: false,
            primary_ipv4: String::new(),
            primary_ipv6: String::new(),
            firewalls: Vec::new(),
            additional_keys: Vec::new(),
            server_labels: Vec::new(),
            key_labels: Vec::new(),
            placement_group: String::new(),
            auto_spread: false,
            ssh_user: DEFAULT_SSH_USER.into(),
            ssh_port: DEFAULT_SSH_PORT,
            wait_on_error: DEFAULT_WAIT_ON_ERROR_SECS,
            wait_on_polling: DEFAULT_WAIT_ON_POLLING_SECS,
            wait_for_running_timeout: DEFAULT_WAIT_FOR_RUNNING_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSelector {
    ById(i64),
    /// `architecture: None` means "use the server type's architecture".
    ByName {
        name: String,
        architecture: Option<Architecture>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserDataSource {
    None,
    Inline(String),
    File(PathBuf),
}

impl UserDataSource {
    pub async fn load(&self) -> Result<String> {
        match self {
            Self::None => Ok(String::new()),
            Self::Inline(content) => Ok(content.clone()),
            Self::File(path) => tokio::fs::read_to_string(path).await.map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!("could not read user data file {}: {e}", path.display()),
                ))
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetworkFlags {
    pub use_private_network: bool,
    pub disable_public_ipv4: bool,
    pub disable_public_ipv6: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlacementGroupSelector {
    None,
    Named(String),
    AutoSpread,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// Pause before surfacing a failed server submission.
    pub wait_on_error: Duration,
    pub poll_interval: Duration,
    /// `None` waits for the running state without bound.
    pub running_timeout: Option<Duration>,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            wait_on_error: Duration::from_secs(DEFAULT_WAIT_ON_ERROR_SECS),
            poll_interval: Duration::from_secs(DEFAULT_WAIT_ON_POLLING_SECS),
            running_timeout: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExistingKey {
    pub id: i64,
    pub path: PathBuf,
}

/// Validated configuration for one machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverConfig {
    pub machine_name: String,
    pub api_token: String,
    pub image: ImageSelector,
    /// Architecture given explicitly on the command line, if any.
    pub image_arch: Option<Architecture>,
    pub server_type: String,
    pub location: String,
    pub existing_key: Option<ExistingKey>,
    /// Local key pair to copy instead of generating one.
    pub existing_key_path: Option<PathBuf>,
    pub user_data: UserDataSource,
    pub additional_user_data: String,
    pub volumes: Vec<String>,
    pub networks: Vec<String>,
    pub firewalls: Vec<String>,
    pub additional_keys: Vec<String>,
    pub network: NetworkFlags,
    pub primary_ipv4: String,
    pub primary_ipv6: String,
    pub server_labels: Labels,
    pub key_labels: Labels,
    pub placement_group: PlacementGroupSelector,
    pub ssh_user: String,
    pub ssh_port: u16,
    pub timing: Timing,
    pub uses_deprecated_flags: bool,
}

fn mutually_exclusive(a: &str, b: &str) -> Error {
    Error::Validation(format!("--{a} and --{b} are mutually exclusive"))
}

fn parse_id(flag: &str, raw: &str) -> Result<Option<i64>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    match raw.parse::<i64>() {
        Ok(0) => Ok(None),
        Ok(id) => Ok(Some(id)),
        Err(e) => Err(Error::Validation(format!("could not parse --{flag} {raw:?}: {e}"))),
    }
}

fn parse_labels(kind: &str, raw: &[String]) -> Result<Labels> {
    raw.iter()
        .map(|label| {
            label
                .split_once('=')
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .ok_or_else(|| Error::Validation(format!("{kind} label {label} is not in key=value format")))
        })
        .collect()
}

fn deprecated_toggle(current: bool, legacy: bool, flag: &str, legacy_flag: &str, deprecated: &mut bool) -> bool {
    if legacy {
        warn!("DEPRECATED: --{legacy_flag} will be removed, use --{flag} instead");
        *deprecated = true;
        return true;
    }
    current
}

impl DriverConfig {
    pub fn from_options(opts: DriverOptions) -> Result<Self> {
        let mut deprecated = false;

        if opts.machine_name.trim().is_empty() {
            return Err(Error::Validation("a machine name is required".into()));
        }

        let image_id = parse_id(FLAG_IMAGE_ID, &opts.image_id)?;
        let image_arch = match opts.image_arch.as_str() {
            "" => None,
            other => Some(
                other
                    .parse::<Architecture>()
                    .map_err(|e| Error::Validation(e.to_string()))?,
            ),
        };

        let existing_key_id = parse_id(FLAG_EXISTING_KEY_ID, &opts.existing_key_id)?;
        let existing_key_path = match opts.existing_key_path.as_str() {
            "" => None,
            path => Some(PathBuf::from(path)),
        };
        let existing_key = match (existing_key_id, &existing_key_path) {
            (Some(id), Some(path)) => Some(ExistingKey { id, path: path.clone() }),
            (Some(_), None) => {
                return Err(Error::Validation(format!(
                    "specifying --{FLAG_EXISTING_KEY_ID} requires --{FLAG_EXISTING_KEY_PATH} to be set as well"
                )));
            }
            (None, _) => None,
        };

        let user_data = if opts.user_data_from_file {
            if !opts.user_data_file.is_empty() {
                return Err(mutually_exclusive(FLAG_USER_DATA_FILE, LEGACY_FLAG_USER_DATA_FROM_FILE));
            }
            warn!(
                "DEPRECATED: --{LEGACY_FLAG_USER_DATA_FROM_FILE} will be removed, use '--{FLAG_USER_DATA_FILE} \"{}\"' instead",
                opts.user_data
            );
            deprecated = true;
            match opts.user_data.as_str() {
                "" => UserDataSource::None,
                path => UserDataSource::File(PathBuf::from(path)),
            }
        } else {
            match (opts.user_data.as_str(), opts.user_data_file.as_str()) {
                ("", "") => UserDataSource::None,
                (inline, "") => UserDataSource::Inline(inline.to_string()),
                ("", path) => UserDataSource::File(PathBuf::from(path)),
                _ => return Err(mutually_exclusive(FLAG_USER_DATA, FLAG_USER_DATA_FILE)),
            }
        };

        let network = NetworkFlags {
            use_private_network: opts.use_private_network || opts.disable_public,
            disable_public_ipv4: deprecated_toggle(
                opts.disable_public_ipv4,
                opts.legacy_disable_public_4,
                FLAG_DISABLE_PUBLIC_IPV4,
                LEGACY_FLAG_DISABLE_PUBLIC_4,
                &mut deprecated,
            ) || opts.disable_public,
            disable_public_ipv6: deprecated_toggle(
                opts.disable_public_ipv6,
                opts.legacy_disable_public_6,
                FLAG_DISABLE_PUBLIC_IPV6,
                LEGACY_FLAG_DISABLE_PUBLIC_6,
                &mut deprecated,
            ) || opts.disable_public,
        };

        let placement_group = match (opts.auto_spread, opts.placement_group.as_str()) {
            (true, "") => PlacementGroupSelector::AutoSpread,
            (true, _) => return Err(mutually_exclusive(FLAG_AUTO_SPREAD, FLAG_PLACEMENT_GROUP)),
            (false, "") => PlacementGroupSelector::None,
            (false, name) => PlacementGroupSelector::Named(name.to_string()),
        };

        let server_labels = parse_labels("server", &opts.server_labels)?;
        let key_labels = parse_labels("key", &opts.key_labels)?;

        if opts.api_token.is_empty() {
            return Err(Error::Validation(format!("hetzner requires --{FLAG_API_TOKEN} to be set")));
        }

        let image = match image_id {
            Some(_) if !opts.image.is_empty() && !LEGACY_DEFAULT_IMAGES.contains(&opts.image.as_str()) => {
                return Err(mutually_exclusive(FLAG_IMAGE, FLAG_IMAGE_ID));
            }
            Some(_) if image_arch.is_some() => {
                return Err(mutually_exclusive(FLAG_IMAGE_ARCH, FLAG_IMAGE_ID));
            }
            Some(id) => ImageSelector::ById(id),
            None => ImageSelector::ByName {
                name: if opts.image.is_empty() { DEFAULT_IMAGE.to_string() } else { opts.image.clone() },
                architecture: image_arch,
            },
        };

        if network.disable_public_ipv4 && network.disable_public_ipv6 && !network.use_private_network {
            return Err(Error::Validation(format!(
                "--{FLAG_USE_PRIVATE_NETWORK} must be used if public networking is disabled (hint: implicitly set by --{FLAG_DISABLE_PUBLIC})"
            )));
        }
        if network.disable_public_ipv4 && !opts.primary_ipv4.is_empty() {
            return Err(mutually_exclusive(FLAG_PRIMARY_IPV4, FLAG_DISABLE_PUBLIC_IPV4));
        }
        if network.disable_public_ipv6 && !opts.primary_ipv6.is_empty() {
            return Err(mutually_exclusive(FLAG_PRIMARY_IPV6, FLAG_DISABLE_PUBLIC_IPV6));
        }

        let timing = Timing {
            wait_on_error: Duration::from_secs(opts.wait_on_error),
            poll_interval: Duration::from_secs(opts.wait_on_polling),
            running_timeout: match opts.wait_for_running_timeout {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
        };

        if deprecated {
            warn!("========== BREAKING CHANGE WARNING ==========");
            warn!("your configuration uses deprecated flags that will be removed in a future release");
            warn!("check preceding output for 'DEPRECATED' warnings");
            warn!("==============================================");
        }

        Ok(Self {
            machine_name: opts.machine_name,
            api_token: opts.api_token,
            image,
            image_arch,
            server_type: opts.server_type,
            location: opts.location,
            existing_key,
            existing_key_path,
            user_data,
            additional_user_data: opts.additional_user_data,
            volumes: opts.volumes,
            networks: opts.networks,
            firewalls: opts.firewalls,
            additional_keys: opts.additional_keys,
            network,
            primary_ipv4: opts.primary_ipv4,
            primary_ipv6: opts.primary_ipv6,
            server_labels,
            key_labels,
            placement_group,
            ssh_user: opts.ssh_user,
            ssh_port: opts.ssh_port,
            timing,
            uses_deprecated_flags: deprecated,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts() -> DriverOptions {
        DriverOptions {
            machine_name: "worker-1".into(),
            api_token: "token".into(),
            ..Default::default()
        }
    }

    fn validation_message(result: Result<DriverConfig>) -> String {
        match result {
            Err(Error::Validation(msg)) => msg,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn defaults_apply() {
        let config = DriverConfig::from_options(opts()).unwrap();
        assert_eq!(
            config.image,
            ImageSelector::ByName { name: DEFAULT_IMAGE.into(), architecture: None }
        );
        assert_eq!(config.server_type, DEFAULT_SERVER_TYPE);
        assert_eq!(config.ssh_user, "root");
        assert_eq!(config.ssh_port, 22);
        assert_eq!(config.timing.poll_interval, Duration::from_secs(1));
        assert_eq!(config.timing.running_timeout, None);
        assert_eq!(config.placement_group, PlacementGroupSelector::None);
        assert!(!config.uses_deprecated_flags);
    }

    #[test]
    fn token_is_required() {
        let msg = validation_message(DriverConfig::from_options(DriverOptions {
            api_token: String::new(),
            ..opts()
        }));
        assert!(msg.contains(FLAG_API_TOKEN));
    }

    #[test]
    fn image_id_conflicts_with_custom_name() {
        let msg = validation_message(DriverConfig::from_options(DriverOptions {
            image: "my-snapshot".into(),
            image_id: "1234".into(),
            ..opts()
        }));
        assert!(msg.contains(FLAG_IMAGE));
        assert!(msg.contains(FLAG_IMAGE_ID));
        assert!(msg.contains("mutually exclusive"));
    }

    #[test]
    fn image_id_tolerates_legacy_default_name() {
        let config = DriverConfig::from_options(DriverOptions {
            image: "debian-9".into(),
            image_id: "1234".into(),
            ..opts()
        })
        .unwrap();
        assert_eq!(config.image, ImageSelector::ById(1234));
    }

    #[test]
    fn image_id_conflicts_with_architecture() {
        let msg = validation_message(DriverConfig::from_options(DriverOptions {
            image_id: "1234".into(),
            image_arch: "arm".into(),
            ..opts()
        }));
        assert!(msg.contains(FLAG_IMAGE_ARCH));
        assert!(msg.contains("mutually exclusive"));
    }

    #[test]
    fn rejects_unknown_architecture_and_bad_ids() {
        validation_message(DriverConfig::from_options(DriverOptions {
            image_arch: "sparc".into(),
            ..opts()
        }));
        validation_message(DriverConfig::from_options(DriverOptions {
            image_id: "ubuntu".into(),
            ..opts()
        }));
        validation_message(DriverConfig::from_options(DriverOptions {
            existing_key_id: "abc".into(),
            existing_key_path: "/tmp/key".into(),
            ..opts()
        }));
    }

    #[test]
    fn existing_key_id_requires_path() {
        let msg = validation_message(DriverConfig::from_options(DriverOptions {
            existing_key_id: "17".into(),
            ..opts()
        }));
        assert!(msg.contains(FLAG_EXISTING_KEY_PATH));
    }

    #[test]
    fn user_data_sources_are_exclusive() {
        let msg = validation_message(DriverConfig::from_options(DriverOptions {
            user_data: "#cloud-config\n".into(),
            user_data_file: "/tmp/ud.yaml".into(),
            ..opts()
        }));
        assert!(msg.contains("mutually exclusive"));

        let msg = validation_message(DriverConfig::from_options(DriverOptions {
            user_data: "/tmp/a.yaml".into(),
            user_data_from_file: true,
            user_data_file: "/tmp/b.yaml".into(),
            ..opts()
        }));
        assert!(msg.contains(LEGACY_FLAG_USER_DATA_FROM_FILE));
        assert!(msg.contains(FLAG_USER_DATA_FILE));
    }

    #[test]
    fn legacy_user_data_toggle_reads_inline_as_path() {
        let config = DriverConfig::from_options(DriverOptions {
            user_data: "/tmp/a.yaml".into(),
            user_data_from_file: true,
            ..opts()
        })
        .unwrap();
        assert_eq!(config.user_data, UserDataSource::File(PathBuf::from("/tmp/a.yaml")));
        assert!(config.uses_deprecated_flags);
    }

    #[test]
    fn disabling_both_stacks_requires_private_network() {
        let msg = validation_message(DriverConfig::from_options(DriverOptions {
            disable_public_ipv4: true,
            disable_public_ipv6: true,
            ..opts()
        }));
        assert!(msg.contains(FLAG_USE_PRIVATE_NETWORK));
        assert!(msg.contains(FLAG_DISABLE_PUBLIC));
    }

    #[test]
    fn disable_public_implies_private_network() {
        let config = DriverConfig::from_options(DriverOptions {
            disable_public: true,
            ..opts()
        })
        .unwrap();
        assert_eq!(
            config.network,
            NetworkFlags {
                use_private_network: true,
                disable_public_ipv4: true,
                disable_public_ipv6: true,
            }
        );
    }

    #[test]
    fn legacy_disable_toggles_still_count() {
        let config = DriverConfig::from_options(DriverOptions {
            legacy_disable_public_4: true,
            ..opts()
        })
        .unwrap();
        assert!(config.network.disable_public_ipv4);
        assert!(!config.network.disable_public_ipv6);
        assert!(config.uses_deprecated_flags);
    }

    #[test]
    fn primary_ip_conflicts_with_disabled_stack() {
        let msg = validation_message(DriverConfig::from_options(DriverOptions {
            disable_public_ipv4: true,
            primary_ipv4: "203.0.113.7".into(),
            ..opts()
        }));
        assert!(msg.contains(FLAG_PRIMARY_IPV4));
        assert!(msg.contains(FLAG_DISABLE_PUBLIC_IPV4));
        assert!(msg.contains("mutually exclusive"));

        let msg = validation_message(DriverConfig::from_options(DriverOptions {
            disable_public_ipv6: true,
            primary_ipv6: "my-v6".into(),
            ..opts()
        }));
        assert!(msg.contains(FLAG_PRIMARY_IPV6));
        assert!(msg.contains("mutually exclusive"));
    }

    #[test]
    fn labels_split_at_first_equals() {
        let config = DriverConfig::from_options(DriverOptions {
            server_labels: vec!["env=prod".into(), "query=a=b".into()],
            key_labels: vec!["owner=ops".into()],
            ..opts()
        })
        .unwrap();
        assert_eq!(config.server_labels.get("query").map(String::as_str), Some("a=b"));
        assert_eq!(config.key_labels.get("owner").map(String::as_str), Some("ops"));

        let msg = validation_message(DriverConfig::from_options(DriverOptions {
            key_labels: vec!["broken".into()],
            ..opts()
        }));
        assert!(msg.contains("key=value"));
    }

    #[test]
    fn placement_group_conflicts_with_auto_spread() {
        let msg = validation_message(DriverConfig::from_options(DriverOptions {
            placement_group: "pg".into(),
            auto_spread: true,
            ..opts()
        }));
        assert!(msg.contains(FLAG_AUTO_SPREAD));
        assert!(msg.contains(FLAG_PLACEMENT_GROUP));

        let config = DriverConfig::from_options(DriverOptions {
            auto_spread: true,
            ..opts()
        })
        .unwrap();
        assert_eq!(config.placement_group, PlacementGroupSelector::AutoSpread);
    }

    #[test]
    fn running_timeout_zero_is_unbounded() {
        let config = DriverConfig::from_options(DriverOptions {
            wait_for_running_timeout: 90,
            ..opts()
        })
        .unwrap();
        assert_eq!(config.timing.running_timeout, Some(Duration::from_secs(90)));
    }
}
