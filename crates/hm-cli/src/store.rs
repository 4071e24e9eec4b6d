//! On-disk machine records: `<root>/machines/<name>/machine.json` with the
//! machine's SSH key alongside.

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use hm_driver::MachineRecord;

const RECORD_FILE: &str = "machine.json";
const KEY_FILE: &str = "id_ed25519";

pub struct MachineStore {
    root: PathBuf,
}

impl MachineStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `~/.hetzner-machine`
    pub fn default_root() -> anyhow::Result<PathBuf> {
        let home = dirs::home_dir().context("could not determine home directory")?;
        Ok(home.join(".hetzner-machine"))
    }

    pub fn machine_dir(&self, name: &str) -> PathBuf {
        self.root.join("machines").join(name)
    }

    pub fn key_path(&self, name: &str) -> PathBuf {
        self.machine_dir(name).join(KEY_FILE)
    }

    fn record_path(&self, name: &str) -> PathBuf {
        self.machine_dir(name).join(RECORD_FILE)
    }

    /// Create the machine directory, refusing names that already have a record.
    pub fn prepare(&self, name: &str) -> anyhow::Result<PathBuf> {
        if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
            bail!("invalid machine name {name:?}");
        }
        if self.record_path(name).exists() {
            bail!("machine {name} already exists");
        }
        let dir = self.machine_dir(name);
        std::fs::create_dir_all(&dir).with_context(|| format!("failed to create {}", dir.display()))?;
        Ok(dir)
    }

    pub fn save(&self, record: &MachineRecord) -> anyhow::Result<()> {
        let path = self.record_path(&record.name);
        let body = serde_json::to_string_pretty(record).context("failed to serialize machine record")?;
        write(&path, &body)
    }

    pub fn load(&self, name: &str) -> anyhow::Result<MachineRecord> {
        let path = self.record_path(name);
        let body = std::fs::read_to_string(&path).with_context(|| format!("no machine named {name}"))?;
        serde_json::from_str(&body).with_context(|| format!("corrupt machine record {}", path.display()))
    }

    pub fn remove(&self, name: &str) -> anyhow::Result<()> {
        let dir = self.machine_dir(name);
        match std::fs::remove_dir_all(&dir) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => {
                Err(e).with_context(|| format!("failed to remove {}", dir.display()))
            }
            _ => Ok(()),
        }
    }
}

fn write(path: &Path, body: &str) -> anyhow::Result<()> {
    std::fs::write(path, body).with_context(|| format!("failed to write {}", path.display()))
}
