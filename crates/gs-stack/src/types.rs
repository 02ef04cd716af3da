use std::collections::BTreeMap;
use std::path::PathBuf;

use aws_resources::{AvailabilityZone, InterruptionBehavior, PortSpec, SpotRequestType, VolumeType};

use crate::ProvisionerName;

/// Mount point of the persistent volume; always mounted first.
pub const DATA_DIR: &str = "/data";
/// SteamCMD install directory, relative to [`DATA_DIR`].
pub const INSTALL_DIR: &str = "game";
/// Block device the persistent volume is attached as.
pub const DEVICE_NAME: &str = "/dev/sdh";
pub const DEFAULT_VOLUME_SIZE_GIB: u32 = 32;
pub const SERVICE_USER: &str = "ec2-user";
pub const SERVICE_UNIT_PATH: &str = "/etc/systemd/system/game.service";
/// Replaced with the staged archive path in exec templates.
pub const ARCHIVE_PLACEHOLDER: &str = "{archive}";

/// Normalized provisioning requirements of one game server.
///
/// Built once by the profile resolver and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSpec {
    pub name: String,
    pub source: InstallSource,
    pub exec: ExecCommand,
    /// Exposed game ports, de-duplicated, in configuration order.
    pub ports: Vec<PortSpec>,
    pub instance_type: String,
    pub use_spot: bool,
    pub interruption_behavior: InterruptionBehavior,
    pub volume_size_gib: u32,
    /// Existing volume to attach instead of creating one.
    pub volume_id: Option<String>,
    /// `/data` followed by the extra persistent paths.
    pub mount_paths: Vec<String>,
    pub availability_zone: AvailabilityZone,
}

/// How the game server binaries get onto the instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallSource {
    SteamApp { app_id: u32 },
    CustomFetch { commands: Vec<String> },
    /// Local archive uploaded by the provisioning engine and staged under `/data`.
    UploadedArchive { path: PathBuf },
}

impl InstallSource {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SteamApp { .. } => "steam",
            Self::CustomFetch { .. } => "custom",
            Self::UploadedArchive { .. } => "archive",
        }
    }
}

/// The command systemd runs to start the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecCommand {
    Executable {
        /// Absolute path of the server binary or start script.
        path: String,
        launch_options: Option<String>,
    },
    /// Free-form command line; `{archive}` expands to the staged archive path.
    Template(String),
}

impl ExecCommand {
    /// Render the single-line command for `ExecStart=`.
    pub fn render(&self, staged_archive: Option<&str>) -> String {
        match self {
            Self::Executable {
                path,
                launch_options: Some(options),
            } => format!("{path} {options}"),
            Self::Executable { path, .. } => path.clone(),
            Self::Template(template) => {
                template.replace(ARCHIVE_PLACEHOLDER, staged_archive.unwrap_or_default())
            }
        }
    }
}

/// Whether the persistent volume is created or imported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VolumePlan {
    CreateNew { size_gib: u32, volume_type: VolumeType },
    ImportExisting { volume_id: String },
}

impl VolumePlan {
    pub fn is_import(&self) -> bool {
        matches!(self, Self::ImportExisting { .. })
    }
}

/// Spot request settings and address stability decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpotPolicy {
    pub enabled: bool,
    pub request_type: SpotRequestType,
    pub interruption_behavior: InterruptionBehavior,
    /// Keep a stable public address across interruptions with an Elastic IP.
    pub reassociate_elastic_ip: bool,
}

/// Ordered shell commands run on first boot through user data.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootstrapScript {
    commands: Vec<String>,
}

impl BootstrapScript {
    pub fn push(&mut self, command: impl Into<String>) {
        self.commands.push(command.into());
    }

    pub fn extend<I, S>(&mut self, commands: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.commands.extend(commands.into_iter().map(Into::into));
    }

    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    /// Index of the first command containing `needle`.
    pub fn position(&self, needle: &str) -> Option<usize> {
        self.commands.iter().position(|c| c.contains(needle))
    }

    /// Render as a bash user-data script, one command per line.
    pub fn render(&self) -> String {
        let mut out = String::from("#!/bin/bash\n");
        for command in &self.commands {
            out.push_str(command);
            out.push('\n');
        }
        out
    }
}

/// An uploaded archive and where it lands on the instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedArchive {
    pub source_path: PathBuf,
    pub bucket: String,
    /// Content-addressed object key, `<sha256>.<ext>`.
    pub object_key: String,
    /// Final location on the instance, `/data/<object key>`.
    pub instance_path: String,
}

/// What a provisioner reports back for one stack.
#[derive(Debug, Clone)]
pub struct ProvisionedStack {
    pub stack_name: String,
    pub provisioner: ProvisionerName,
    /// Logical id to the identifier the provisioner assigned.
    pub identifiers: BTreeMap<String, String>,
    /// Files written while provisioning.
    pub artifacts: Vec<PathBuf>,
}
