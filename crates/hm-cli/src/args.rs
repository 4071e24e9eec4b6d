use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use hm_driver::DriverOptions;
use hm_driver::config::{
    DEFAULT_SERVER_TYPE, DEFAULT_SSH_PORT, DEFAULT_SSH_USER, DEFAULT_WAIT_FOR_RUNNING_TIMEOUT_SECS,
    DEFAULT_WAIT_ON_ERROR_SECS, DEFAULT_WAIT_ON_POLLING_SECS,
};

#[derive(Parser)]
#[command(name = "hetzner-machine")]
#[command(about = "Provision and manage docker hosts on Hetzner Cloud", long_about = None)]
pub struct Cli {
    /// Directory holding machine records and keys (default ~/.hetzner-machine)
    #[arg(long, env = "HETZNER_MACHINE_STORAGE_PATH", global = true)]
    pub storage_path: Option<PathBuf>,

    /// Project-specific API token
    #[arg(long = "hetzner-api-token", env = "HETZNER_API_TOKEN", global = true, hide_env_values = true)]
    pub api_token: Option<String>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create a machine
    Create {
        name: String,
        #[command(flatten)]
        driver: DriverArgs,
    },
    /// Power a machine on
    Start { name: String },
    /// Shut a machine down gracefully
    Stop { name: String },
    /// Reboot a machine
    Restart { name: String },
    /// Power a machine off hard
    Kill { name: String },
    /// Delete a machine and what was created for it
    Rm { name: String },
    /// Print the machine state
    Status { name: String },
    /// Print the machine address
    Ip { name: String },
    /// Print the docker URL
    Url { name: String },
}

#[derive(Args, Debug, Clone)]
pub struct DriverArgs {
    /// Image to use for server creation
    #[arg(long = "hetzner-image", env = "HETZNER_IMAGE", default_value = "")]
    pub image: String,

    /// Image ID to use for server creation
    #[arg(long = "hetzner-image-id", env = "HETZNER_IMAGE_ID", default_value = "")]
    pub image_id: String,

    /// Image architecture (x86 or arm)
    #[arg(long = "hetzner-image-arch", env = "HETZNER_IMAGE_ARCH", default_value = "")]
    pub image_arch: String,

    #[arg(long = "hetzner-server-type", env = "HETZNER_TYPE", default_value = DEFAULT_SERVER_TYPE)]
    pub server_type: String,

    #[arg(long = "hetzner-server-location", env = "HETZNER_LOCATION", default_value = "")]
    pub location: String,

    /// Existing key ID to use for server creation
    #[arg(long = "hetzner-existing-key-id", env = "HETZNER_EXISTING_KEY_ID", default_value = "")]
    pub existing_key_id: String,

    /// Path to the existing key (new public key will be created if empty)
    #[arg(long = "hetzner-existing-key-path", env = "HETZNER_EXISTING_KEY_PATH", default_value = "")]
    pub existing_key_path: String,

    /// Cloud-init based user data (inline)
    #[arg(long = "hetzner-user-data", env = "HETZNER_USER_DATA", default_value = "")]
    pub user_data: String,

    /// Cloud-init based user data read from a file
    #[arg(long = "hetzner-user-data-file", env = "HETZNER_USER_DATA_FILE", default_value = "")]
    pub user_data_file: String,

    /// DEPRECATED: treat --hetzner-user-data as a file path
    #[arg(long = "hetzner-user-data-from-file", env = "HETZNER_USER_DATA_FROM_FILE")]
    pub user_data_from_file: bool,

    /// Cloud-init user data merged into the base user data
    #[arg(long = "hetzner-additional-user-data", env = "HETZNER_ADDITIONAL_USER_DATA", default_value = "")]
    pub additional_user_data: String,

    /// Volume IDs or names to attach
    #[arg(long = "hetzner-volumes", env = "HETZNER_VOLUMES", value_delimiter = ',')]
    pub volumes: Vec<String>,

    /// Network IDs or names to attach
    #[arg(long = "hetzner-networks", env = "HETZNER_NETWORKS", value_delimiter = ',')]
    pub networks: Vec<String>,

    /// Reach the server over its private network
    #[arg(long = "hetzner-use-private-network", env = "HETZNER_USE_PRIVATE_NETWORK")]
    pub use_private_network: bool,

    #[arg(long = "hetzner-disable-public-ipv4", env = "HETZNER_DISABLE_PUBLIC_IPV4")]
    pub disable_public_ipv4: bool,

    #[arg(long = "hetzner-disable-public-ipv6", env = "HETZNER_DISABLE_PUBLIC_IPV6")]
    pub disable_public_ipv6: bool,

    /// DEPRECATED: use --hetzner-disable-public-ipv4
    #[arg(long = "hetzner-disable-public-4", env = "HETZNER_DISABLE_PUBLIC_4", hide = true)]
    pub legacy_disable_public_4: bool,

    /// DEPRECATED: use --hetzner-disable-public-ipv6
    #[arg(long = "hetzner-disable-public-6", env = "HETZNER_DISABLE_PUBLIC_6", hide = true)]
    pub legacy_disable_public_6: bool,

    /// Disable public networking on both stacks (implies private networking)
    #[arg(long = "hetzner-disable-public", env = "HETZNER_DISABLE_PUBLIC")]
    pub disable_public: bool,

    /// Existing primary IPv4 (ID, name or address)
    #[arg(long = "hetzner-primary-ipv4", env = "HETZNER_PRIMARY_IPV4", default_value = "")]
    pub primary_ipv4: String,

    /// Existing primary IPv6 (ID, name or address)
    #[arg(long = "hetzner-primary-ipv6", env = "HETZNER_PRIMARY_IPV6", default_value = "")]
    pub primary_ipv6: String,

    /// Firewall IDs or names to apply
    #[arg(long = "hetzner-firewalls", env = "HETZNER_FIREWALLS", value_delimiter = ',')]
    pub firewalls: Vec<String>,

    /// Additional public keys to authorize (repeatable)
    #[arg(long = "hetzner-additional-key", env = "HETZNER_ADDITIONAL_KEYS", value_delimiter = ',')]
    pub additional_keys: Vec<String>,

    /// Server label as key=value (repeatable)
    #[arg(long = "hetzner-server-label", env = "HETZNER_SERVER_LABELS", value_delimiter = ',')]
    pub server_labels: Vec<String>,

    /// SSH key label as key=value (repeatable)
    #[arg(long = "hetzner-key-label", env = "HETZNER_KEY_LABELS", value_delimiter = ',')]
    pub key_labels: Vec<String>,

    #[arg(long = "hetzner-placement-group", env = "HETZNER_PLACEMENT_GROUP", default_value = "")]
    pub placement_group: String,

    /// Spread machines across hosts with a shared placement group
    #[arg(long = "hetzner-auto-spread", env = "HETZNER_AUTO_SPREAD")]
    pub auto_spread: bool,

    #[arg(long = "hetzner-ssh-user", env = "HETZNER_SSH_USER", default_value = DEFAULT_SSH_USER)]
    pub ssh_user: String,

    #[arg(long = "hetzner-ssh-port", env = "HETZNER_SSH_PORT", default_value_t = DEFAULT_SSH_PORT)]
    pub ssh_port: u16,

    /// Seconds to pause after a failed server submission
    #[arg(long = "hetzner-wait-on-error", env = "HETZNER_WAIT_ON_ERROR", default_value_t = DEFAULT_WAIT_ON_ERROR_SECS)]
    pub wait_on_error: u64,

    /// Seconds between polls
    #[arg(long = "hetzner-wait-on-polling", env = "HETZNER_WAIT_ON_POLLING", default_value_t = DEFAULT_WAIT_ON_POLLING_SECS)]
    pub wait_on_polling: u64,

    /// Seconds to wait for the server to run (0 waits forever)
    #[arg(
        long = "hetzner-wait-for-running-timeout",
        env = "HETZNER_WAIT_FOR_RUNNING_TIMEOUT",
        default_value_t = DEFAULT_WAIT_FOR_RUNNING_TIMEOUT_SECS
    )]
    pub wait_for_running_timeout: u64,
}

impl DriverArgs {
    pub fn into_options(self, machine_name: String, api_token: String) -> DriverOptions {
        DriverOptions {
            machine_name,
            api_token,
            image: self.image,
            image_id: self.image_id,
            image_arch: self.image_arch,
            server_type: self.server_type,
            location: self.location,
            existing_key_id: self.existing_key_id,
            existing_key_path: self.existing_key_path,
            user_data: self.user_data,
            user_data_file: self.user_data_file,
            user_data_from_file: self.user_data_from_file,
            additional_user_data: self.additional_user_data,
            volumes: self.volumes,
            networks: self.networks,
            use_private_network: self.use_private_network,
            disable_public_ipv4: self.disable_public_ipv4,
            disable_public_ipv6: self.disable_public_ipv6,
            legacy_disable_public_4: self.legacy_disable_public_4,
            legacy_disable_public_6: self.legacy_disable_public_6,
            disable_public: self.disable_public,
            primary_ipv4: self.primary_ipv4,
            primary_ipv6: self.primary_ipv6,
            firewalls: self.firewalls,
            additional_keys: self.additional_keys,
            server_labels: self.server_labels,
            key_labels: self.key_labels,
            placement_group: self.placement_group,
            auto_spread: self.auto_spread,
            ssh_user: self.ssh_user,
            ssh_port: self.ssh_port,
            wait_on_error: self.wait_on_error,
            wait_on_polling: self.wait_on_polling,
            wait_for_running_timeout: self.wait_for_running_timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create(args: &[&str]) -> DriverOptions {
        let mut argv = vec!["hetzner-machine", "create", "box"];
        argv.extend_from_slice(args);
        let cli = Cli::try_parse_from(argv).unwrap();
        match cli.command {
            Command::Create { name, driver } => driver.into_options(name, "token".into()),
            _ => panic!("expected create"),
        }
    }

    #[test]
    fn defaults_match_driver_defaults() {
        let parsed = create(&[]);
        let defaults = DriverOptions::default();
        assert_eq!(parsed.machine_name, "box");
        assert_eq!(parsed.server_type, defaults.server_type);
        assert_eq!(parsed.ssh_user, defaults.ssh_user);
        assert_eq!(parsed.ssh_port, defaults.ssh_port);
        assert_eq!(parsed.wait_on_polling, defaults.wait_on_polling);
        assert!(parsed.networks.is_empty());
    }

    #[test]
    fn lists_and_repeated_flags_collect() {
        let parsed = create(&[
            "--hetzner-networks",
            "a,b",
            "--hetzner-server-label",
            "env=prod",
            "--hetzner-server-label",
            "team=ops",
            "--hetzner-auto-spread",
        ]);
        assert_eq!(parsed.networks, vec!["a", "b"]);
        assert_eq!(parsed.server_labels, vec!["env=prod", "team=ops"]);
        assert!(parsed.auto_spread);
    }

    #[test]
    fn global_flags_follow_subcommand() {
        let cli = Cli::try_parse_from(["hetzner-machine", "status", "box", "--debug", "--storage-path", "/srv/m"]).unwrap();
        assert!(cli.debug);
        assert_eq!(cli.storage_path, Some(PathBuf::from("/srv/m")));
        assert!(matches!(cli.command, Command::Status { name } if name == "box"));
    }
}
