pub mod assembly;
pub mod asset;
pub mod backup;
pub mod bootstrap;
pub mod dry_run;
pub mod profile;
pub mod spot;
pub mod stack;
pub mod types;
pub mod volume;

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use aws_resources::StackDescription;
use serde::{Deserialize, Serialize};
use types::ProvisionedStack;

pub use stack::{StackSettings, synthesize};

/// Problems in the game profiles, detected before any resource is declared.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unknown game: {0}")]
    UnknownGame(String),

    #[error("{0}: no install source specified (set app_id, commands or upload_zip_path)")]
    NoInstallSource(String),

    #[error("{game}: conflicting install sources ({sources}), specify exactly one")]
    ConflictingInstallSources { game: String, sources: String },

    #[error("{0}: no exec command specified (set executable or exec)")]
    MissingExecCommand(String),

    #[error("{0}: executable and exec are mutually exclusive")]
    ConflictingExecCommand(String),

    #[error("{0}: exec uses {{archive}} but no upload_zip_path is set")]
    ArchivePlaceholderWithoutArchive(String),

    #[error("{game}: invalid instance type {value:?}, expected <class>.<size>")]
    InvalidInstanceType { game: String, value: String },

    #[error("{game}: mount path {path:?} must be absolute")]
    InvalidMountPath { game: String, path: String },

    #[error("{0}: volume size must be at least 1 GiB")]
    InvalidVolumeSize(String),

    #[error("{game}: invalid volume id {value:?}, expected vol-<hex>")]
    InvalidVolumeId { game: String, value: String },

    #[error("read profiles {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("parse profiles {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("resource error: {0}")]
    Resources(#[from] aws_resources::Error),

    #[error("asset {path}: {source}")]
    Asset {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("provisioning error: {0}")]
    Provisioning(String),

    #[error("missing env var: {0}")]
    MissingEnv(String),

    #[error("unknown provisioner: {0}")]
    UnknownProvisioner(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Known provisioning backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProvisionerName {
    Assembly,
    DryRun,
}

impl ProvisionerName {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Assembly => "assembly",
            Self::DryRun => "dry-run",
        }
    }
}

impl fmt::Display for ProvisionerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProvisionerName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "assembly" => Ok(Self::Assembly),
            "dry-run" => Ok(Self::DryRun),
            other => Err(Error::UnknownProvisioner(other.to_string())),
        }
    }
}

/// Hands a derived stack to whatever turns declarations into resources.
///
/// Implementations own their configuration and report back the identifiers
/// they assigned. Failures downstream of the description are theirs to report.
#[async_trait]
pub trait Provisioner: Send + Sync + 'static {
    /// Provision (or render) every resource of `stack`.
    async fn provision(&self, stack: &StackDescription) -> Result<ProvisionedStack>;

    /// Provisioner identifier.
    fn name(&self) -> ProvisionerName;
}

/// Registry of all configured provisioners.
#[derive(Clone)]
pub struct ProvisionerRegistry {
    provisioners: HashMap<ProvisionerName, Arc<dyn Provisioner>>,
}

impl ProvisionerRegistry {
    /// Look up a provisioner by name.
    pub fn get(&self, name: ProvisionerName) -> Option<&Arc<dyn Provisioner>> {
        self.provisioners.get(&name)
    }

    /// List the names of all available provisioners, sorted.
    pub fn available(&self) -> Vec<ProvisionerName> {
        let mut names: Vec<_> = self.provisioners.keys().copied().collect();
        names.sort_by_key(|n| n.as_str());
        names
    }
}

/// Build every provisioner whose configuration is present.
///
/// The dry run needs no configuration and is always registered.
pub fn build_provisioners() -> ProvisionerRegistry {
    dotenvy::dotenv().ok();

    let mut provisioners: HashMap<ProvisionerName, Arc<dyn Provisioner>> = HashMap::new();

    match assembly::AssemblyWriter::from_env() {
        Ok(p) => {
            tracing::debug!(out_dir = %p.out_dir().display(), "registered assembly writer");
            provisioners.insert(ProvisionerName::Assembly, Arc::new(p));
        }
        Err(e) => tracing::debug!("skipping assembly writer: {e}"),
    }

    provisioners.insert(ProvisionerName::DryRun, Arc::new(dry_run::DryRun));

    ProvisionerRegistry { provisioners }
}
