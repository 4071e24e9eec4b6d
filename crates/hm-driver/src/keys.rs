//! Local SSH key material and fingerprinting.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use md5::{Digest, Md5};
use ssh_key::authorized_keys::Entry;
use ssh_key::rand_core::OsRng;
use ssh_key::{Algorithm, HashAlg, LineEnding, PrivateKey, PublicKey};
use tracing::debug;

use crate::{Error, Result};

const KEY_COMMENT: &str = "hetzner-machine";

/// The `.pub` sibling of a private key path.
pub fn public_key_path(key_path: &Path) -> PathBuf {
    let mut os = key_path.as_os_str().to_owned();
    os.push(".pub");
    PathBuf::from(os)
}

#[async_trait]
pub trait KeyMaterial: Send + Sync {
    /// Create a fresh key pair at `path` and `path.pub`.
    async fn generate_key_pair(&self, path: &Path) -> Result<()>;

    /// Copy `src` and `src.pub` to `dst` and `dst.pub`.
    async fn copy_key_pair(&self, src: &Path, dst: &Path) -> Result<()>;

    /// Read the authorized-key line stored next to the private key.
    async fn read_public_key(&self, key_path: &Path) -> Result<String>;
}

/// Key material on the local filesystem. Fresh keys are Ed25519.
#[derive(Debug, Default, Clone)]
pub struct LocalKeyMaterial;

#[async_trait]
impl KeyMaterial for LocalKeyMaterial {
    async fn generate_key_pair(&self, path: &Path) -> Result<()> {
        if tokio::fs::try_exists(path).await? {
            debug!(path = %path.display(), "reusing existing key pair");
            return Ok(());
        }
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let target = path.to_path_buf();
        tokio::task::spawn_blocking(move || write_new_key_pair(&target))
            .await
            .map_err(|e| Error::Internal(format!("key generation task failed: {e}")))??;
        restrict_permissions(path).await
    }

    async fn copy_key_pair(&self, src: &Path, dst: &Path) -> Result<()> {
        if let Some(parent) = dst.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(src, dst)
            .await
            .map_err(|e| Error::KeyMaterial(format!("could not copy ssh key {}: {e}", src.display())))?;
        tokio::fs::copy(public_key_path(src), public_key_path(dst))
            .await
            .map_err(|e| Error::KeyMaterial(format!("could not copy ssh public key {}: {e}", src.display())))?;
        restrict_permissions(dst).await
    }

    async fn read_public_key(&self, key_path: &Path) -> Result<String> {
        let path = public_key_path(key_path);
        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| Error::KeyMaterial(format!("could not read public key {}: {e}", path.display())))?;
        Ok(content.trim().to_string())
    }
}

fn write_new_key_pair(path: &Path) -> Result<()> {
    let mut key = PrivateKey::random(&mut OsRng, Algorithm::Ed25519).map_err(key_error)?;
    key.set_comment(KEY_COMMENT);
    key.write_openssh_file(path, LineEnding::LF).map_err(key_error)?;
    key.public_key()
        .write_openssh_file(&public_key_path(path))
        .map_err(key_error)
}

fn key_error(e: ssh_key::Error) -> Error {
    Error::KeyMaterial(e.to_string())
}

#[cfg(unix)]
async fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await?;
    Ok(())
}

#[cfg(not(unix))]
async fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

/// Both fingerprint notations the provider may report for a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprints {
    /// `aa:bb:cc:..`
    pub md5: String,
    /// `SHA256:<base64, unpadded>`
    pub sha256: String,
}

impl Fingerprints {
    /// Parse an OpenSSH authorized-key line (`[options] type base64 [comment]`).
    pub fn of_authorized_key(line: &str) -> Result<Self> {
        let entry: Entry = line
            .trim()
            .parse()
            .map_err(|e| Error::KeyMaterial(format!("could not parse authorized key: {e}")))?;
        Self::of_public_key(entry.public_key())
    }

    pub fn of_public_key(key: &PublicKey) -> Result<Self> {
        let blob = key.to_bytes().map_err(key_error)?;
        let md5 = Md5::digest(&blob)
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect::<Vec<_>>()
            .join(":");
        let sha256 = key.fingerprint(HashAlg::Sha256).to_string();
        Ok(Self { md5, sha256 })
    }

    pub fn matches(&self, remote: &str) -> bool {
        remote == self.md5 || remote == self.sha256
    }
}
