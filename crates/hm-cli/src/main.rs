mod args;
mod store;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use hm_driver::keys::LocalKeyMaterial;
use hm_driver::{CloudApi, DriverConfig, HetznerProvider, MachineDriver, Provisioner};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use crate::args::{Cli, Command};
use crate::store::MachineStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let default_level = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into()))
        .with_writer(std::io::stderr)
        .init();

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, cancelling");
            on_interrupt.cancel();
        }
    });

    let store = MachineStore::new(match cli.storage_path {
        Some(path) => path,
        None => MachineStore::default_root()?,
    });
    let token = cli.api_token.unwrap_or_default();
    let api: Arc<dyn CloudApi> = Arc::new(HetznerProvider::new(token.clone()));

    let open = |name: &str| -> anyhow::Result<MachineDriver> {
        let record = store.load(name)?;
        let interval = record.poll_interval();
        Ok(MachineDriver::new(api.clone(), record, interval, cancel.clone()))
    };

    match cli.command {
        Command::Create { name, driver } => {
            let config = DriverConfig::from_options(driver.into_options(name.clone(), token))?;
            store.prepare(&name)?;
            let mut provisioner = Provisioner::new(
                config,
                api.clone(),
                Arc::new(LocalKeyMaterial),
                store.key_path(&name),
                cancel.clone(),
            );

            if let Err(e) = provisioner.pre_create_check().await {
                store.remove(&name)?;
                return Err(e).context("pre-create check failed");
            }
            match provisioner.create().await {
                Ok(record) => {
                    store.save(&record)?;
                    tracing::info!(name = %record.name, address = %record.ip_address, "machine created");
                    println!("{}", record.ip_address);
                }
                Err(e) => {
                    if let Some(partial) = provisioner.partial_record() {
                        store.save(&partial)?;
                        tracing::warn!(
                            name = %partial.name,
                            server_id = partial.server_id,
                            "kept a partial record, run rm to clean up"
                        );
                    } else {
                        store.remove(&name)?;
                    }
                    return Err(e).context("create failed");
                }
            }
        }
        Command::Start { name } => open(&name)?.start().await?,
        Command::Stop { name } => open(&name)?.stop().await?,
        Command::Restart { name } => open(&name)?.restart().await?,
        Command::Kill { name } => open(&name)?.kill().await?,
        Command::Rm { name } => {
            open(&name)?.remove().await?;
            store.remove(&name)?;
            tracing::info!(name = %name, "machine removed");
        }
        Command::Status { name } => println!("{}", open(&name)?.state().await?),
        Command::Ip { name } => println!("{}", open(&name)?.ssh_hostname()),
        Command::Url { name } => println!("{}", open(&name)?.url().await?),
    }
    Ok(())
}
