//! Per-game profiles and their resolution into a [`ServerSpec`].
//!
//! Profiles are injected configuration (a JSON file or a value built in code),
//! never compiled-in tables:
//!
//! ```json
//! {
//!   "defaults": { "instance_type": "t3a.medium" },
//!   "games": {
//!     "Palworld": {
//!       "app_id": 2394010,
//!       "executable": "PalServer.sh",
//!       "ports": ["udp/8211"],
//!       "instance_type": "t3a.large",
//!       "use_spot": true
//!     }
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use aws_resources::{AvailabilityZone, InterruptionBehavior, PortSpec};
use serde::Deserialize;
use tracing::debug;

use crate::ConfigError;
use crate::types::{
    ARCHIVE_PLACEHOLDER, DATA_DIR, DEFAULT_VOLUME_SIZE_GIB, ExecCommand, INSTALL_DIR,
    InstallSource, ServerSpec,
};

const DEFAULT_INSTANCE_TYPE: &str = "t3a.medium";

/// The whole per-game configuration surface.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GameProfiles {
    #[serde(default)]
    pub defaults: ProfileDefaults,
    #[serde(default)]
    pub games: BTreeMap<String, GameProfile>,
}

/// Values used when a game profile leaves a field out.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProfileDefaults {
    pub instance_type: String,
    pub use_spot: bool,
    pub interruption_behavior: InterruptionBehavior,
    pub volume_size_gib: u32,
    pub availability_zone: Option<String>,
}

impl Default for ProfileDefaults {
    fn default() -> Self {
        Self {
            instance_type: DEFAULT_INSTANCE_TYPE.into(),
            use_spot: false,
            interruption_behavior: InterruptionBehavior::Stop,
            volume_size_gib: DEFAULT_VOLUME_SIZE_GIB,
            availability_zone: None,
        }
    }
}

/// Launch metadata of one game as written in the profiles file.
///
/// Exactly one of `app_id`, `commands` and `upload_zip_path` selects the
/// install source; exactly one of `executable` and `exec` the start command.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GameProfile {
    pub app_id: Option<u32>,
    pub commands: Option<Vec<String>>,
    pub upload_zip_path: Option<PathBuf>,
    pub executable: Option<String>,
    pub launch_options: Option<String>,
    pub exec: Option<String>,
    #[serde(default)]
    pub ports: Vec<PortSpec>,
    pub instance_type: Option<String>,
    pub use_spot: Option<bool>,
    pub interruption_behavior: Option<InterruptionBehavior>,
    pub volume_size_gib: Option<u32>,
    pub volume_id: Option<String>,
    /// Extra absolute paths kept on the persistent volume, e.g. save directories.
    #[serde(default)]
    pub mount_paths: Vec<String>,
    pub availability_zone: Option<String>,
}

impl GameProfiles {
    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }

    /// Load profiles from a JSON file.
    ///
    /// Relative `upload_zip_path`s are taken relative to the file's directory.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut profiles = Self::from_json(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        let base = path.parent().unwrap_or(Path::new(""));
        for profile in profiles.games.values_mut() {
            if let Some(zip) = profile.upload_zip_path.as_mut() {
                if zip.is_relative() {
                    *zip = base.join(&*zip);
                }
            }
        }

        debug!(path = %path.display(), games = profiles.games.len(), "loaded game profiles");
        Ok(profiles)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.games.keys().map(String::as_str)
    }

    /// Resolve the named game into a fully populated [`ServerSpec`].
    pub fn resolve(&self, name: &str) -> Result<ServerSpec, ConfigError> {
        let profile = self
            .games
            .get(name)
            .ok_or_else(|| ConfigError::UnknownGame(name.to_string()))?;
        resolve_profile(name, profile, &self.defaults)
    }
}

/// Normalize one profile against the defaults.
pub fn resolve_profile(
    name: &str,
    profile: &GameProfile,
    defaults: &ProfileDefaults,
) -> Result<ServerSpec, ConfigError> {
    let source = install_source(name, profile)?;
    let exec = exec_command(name, profile, &source)?;

    let instance_type = profile
        .instance_type
        .clone()
        .unwrap_or_else(|| defaults.instance_type.clone());
    if !is_instance_type(&instance_type) {
        return Err(ConfigError::InvalidInstanceType {
            game: name.to_string(),
            value: instance_type,
        });
    }

    let volume_size_gib = profile.volume_size_gib.unwrap_or(defaults.volume_size_gib);
    if volume_size_gib == 0 {
        return Err(ConfigError::InvalidVolumeSize(name.to_string()));
    }

    if let Some(id) = &profile.volume_id {
        if !is_volume_id(id) {
            return Err(ConfigError::InvalidVolumeId {
                game: name.to_string(),
                value: id.clone(),
            });
        }
    }

    let mount_paths = mount_paths(name, &profile.mount_paths)?;

    let mut ports: Vec<PortSpec> = Vec::with_capacity(profile.ports.len());
    for port in &profile.ports {
        if !ports.contains(port) {
            ports.push(*port);
        }
    }

    let availability_zone = match profile
        .availability_zone
        .as_ref()
        .or(defaults.availability_zone.as_ref())
    {
        Some(zone) => AvailabilityZone::Named(zone.clone()),
        None => AvailabilityZone::FirstInRegion,
    };

    let spec = ServerSpec {
        name: name.to_string(),
        source,
        exec,
        ports,
        instance_type,
        use_spot: profile.use_spot.unwrap_or(defaults.use_spot),
        interruption_behavior: profile
            .interruption_behavior
            .unwrap_or(defaults.interruption_behavior),
        volume_size_gib,
        volume_id: profile.volume_id.clone(),
        mount_paths,
        availability_zone,
    };

    debug!(
        game = name,
        source = spec.source.kind(),
        instance_type = %spec.instance_type,
        use_spot = spec.use_spot,
        "resolved game profile"
    );
    Ok(spec)
}

fn install_source(name: &str, profile: &GameProfile) -> Result<InstallSource, ConfigError> {
    let mut sources = Vec::new();
    if let Some(app_id) = profile.app_id {
        sources.push(("app_id", InstallSource::SteamApp { app_id }));
    }
    if let Some(commands) = &profile.commands {
        sources.push((
            "commands",
            InstallSource::CustomFetch {
                commands: commands.clone(),
            },
        ));
    }
    if let Some(path) = &profile.upload_zip_path {
        sources.push(("upload_zip_path", InstallSource::UploadedArchive { path: path.clone() }));
    }

    match sources.len() {
        0 => Err(ConfigError::NoInstallSource(name.to_string())),
        1 => Ok(sources.remove(0).1),
        _ => Err(ConfigError::ConflictingInstallSources {
            game: name.to_string(),
            sources: sources
                .iter()
                .map(|(field, _)| *field)
                .collect::<Vec<_>>()
                .join(", "),
        }),
    }
}

fn exec_command(
    name: &str,
    profile: &GameProfile,
    source: &InstallSource,
) -> Result<ExecCommand, ConfigError> {
    match (&profile.executable, &profile.exec) {
        (Some(_), Some(_)) => Err(ConfigError::ConflictingExecCommand(name.to_string())),
        (None, None) => Err(ConfigError::MissingExecCommand(name.to_string())),
        (None, Some(template)) => {
            let has_archive = matches!(source, InstallSource::UploadedArchive { .. });
            if template.contains(ARCHIVE_PLACEHOLDER) && !has_archive {
                return Err(ConfigError::ArchivePlaceholderWithoutArchive(
                    name.to_string(),
                ));
            }
            Ok(ExecCommand::Template(template.clone()))
        }
        (Some(executable), None) => {
            let path = if executable.starts_with('/') {
                executable.clone()
            } else {
                // SteamCMD installs under /data/game, everything else works from /data.
                match source {
                    InstallSource::SteamApp { .. } => {
                        format!("{DATA_DIR}/{INSTALL_DIR}/{executable}")
                    }
                    _ => format!("{DATA_DIR}/{executable}"),
                }
            };
            Ok(ExecCommand::Executable {
                path,
                launch_options: profile
                    .launch_options
                    .as_ref()
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty()),
            })
        }
    }
}

/// `/data` first, then the extra paths without duplicates, in caller order.
fn mount_paths(name: &str, extra: &[String]) -> Result<Vec<String>, ConfigError> {
    let mut paths = vec![DATA_DIR.to_string()];
    for raw in extra {
        let path = raw.trim_end_matches('/');
        if !raw.starts_with('/') || path.is_empty() {
            return Err(ConfigError::InvalidMountPath {
                game: name.to_string(),
                path: raw.clone(),
            });
        }
        if !paths.iter().any(|p| p == path) {
            paths.push(path.to_string());
        }
    }
    Ok(paths)
}

fn is_instance_type(value: &str) -> bool {
    let valid = |part: &str| {
        !part.is_empty() && part.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    };
    match value.split_once('.') {
        Some((class, size)) => valid(class) && valid(size),
        None => false,
    }
}

fn is_volume_id(value: &str) -> bool {
    value
        .strip_prefix("vol-")
        .is_some_and(|hex| !hex.is_empty() && hex.chars().all(|c| c.is_ascii_hexdigit()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn steam(app_id: u32) -> GameProfile {
        GameProfile {
            app_id: Some(app_id),
            executable: Some("Server.sh".into()),
            ..Default::default()
        }
    }

    fn resolve(profile: GameProfile) -> Result<ServerSpec, ConfigError> {
        resolve_profile("Test", &profile, &ProfileDefaults::default())
    }

    #[test]
    fn applies_defaults() {
        let spec = resolve(steam(1)).unwrap();
        assert_eq!(spec.volume_size_gib, 32);
        assert_eq!(spec.instance_type, "t3a.medium");
        assert!(!spec.use_spot);
        assert_eq!(spec.interruption_behavior, InterruptionBehavior::Stop);
        assert_eq!(spec.mount_paths, vec!["/data"]);
        assert_eq!(spec.availability_zone, AvailabilityZone::FirstInRegion);
        assert_eq!(
            spec.exec,
            ExecCommand::Executable {
                path: "/data/game/Server.sh".into(),
                launch_options: None,
            }
        );
    }

    #[test]
    fn missing_install_source_is_rejected() {
        let err = resolve(GameProfile {
            executable: Some("x".into()),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::NoInstallSource(_)));
        assert!(err.to_string().contains("no install source specified"));
    }

    #[test]
    fn conflicting_install_sources_are_rejected() {
        let err = resolve(GameProfile {
            commands: Some(vec!["true".into()]),
            ..steam(7)
        })
        .unwrap_err();
        match err {
            ConfigError::ConflictingInstallSources { sources, .. } => {
                assert_eq!(sources, "app_id, commands")
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn mount_paths_keep_data_first_and_drop_duplicates() {
        let spec = resolve(GameProfile {
            mount_paths: vec![
                "/home/ec2-user/.config/Epic".into(),
                "/data".into(),
                "/srv/saves/".into(),
                "/home/ec2-user/.config/Epic".into(),
            ],
            ..steam(1)
        })
        .unwrap();
        assert_eq!(
            spec.mount_paths,
            vec!["/data", "/home/ec2-user/.config/Epic", "/srv/saves"]
        );
    }

    #[test]
    fn relative_mount_path_is_rejected() {
        let err = resolve(GameProfile {
            mount_paths: vec!["saves".into()],
            ..steam(1)
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidMountPath { .. }));
    }

    #[test]
    fn exec_command_variants() {
        let spec = resolve(GameProfile {
            launch_options: Some(" -port=7777 ".into()),
            ..steam(1)
        })
        .unwrap();
        assert_eq!(spec.exec.render(None), "/data/game/Server.sh -port=7777");

        let spec = resolve(GameProfile {
            commands: Some(vec!["curl -O https://example.com/server.tgz".into()]),
            executable: Some("server/run".into()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(spec.exec.render(None), "/data/server/run");

        let err = resolve(GameProfile {
            exec: Some("/bin/true".into()),
            ..steam(1)
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::ConflictingExecCommand(_)));

        let err = resolve(GameProfile {
            app_id: Some(1),
            exec: Some("unzip {archive}".into()),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::ArchivePlaceholderWithoutArchive(_)));
    }

    #[test]
    fn validates_instance_type_and_volume() {
        let err = resolve(GameProfile {
            instance_type: Some("large".into()),
            ..steam(1)
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidInstanceType { .. }));

        let err = resolve(GameProfile {
            volume_size_gib: Some(0),
            ..steam(1)
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidVolumeSize(_)));

        let err = resolve(GameProfile {
            volume_id: Some("snap-123".into()),
            ..steam(1)
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidVolumeId { .. }));

        let spec = resolve(GameProfile {
            volume_id: Some("vol-0713378dc970fb43d".into()),
            ..steam(1)
        })
        .unwrap();
        assert_eq!(spec.volume_id.as_deref(), Some("vol-0713378dc970fb43d"));
    }

    #[test]
    fn parses_profiles_file() {
        let profiles = GameProfiles::from_json(
            r#"{
                "defaults": { "instance_type": "t3a.large", "interruption_behavior": "terminate" },
                "games": {
                    "Palworld": {
                        "app_id": 2394010,
                        "executable": "PalServer.sh",
                        "ports": ["udp/8211", "udp/8211", "tcp/25575"],
                        "use_spot": true
                    }
                }
            }"#,
        )
        .unwrap();
        assert_eq!(profiles.names().collect::<Vec<_>>(), vec!["Palworld"]);

        let spec = profiles.resolve("Palworld").unwrap();
        assert_eq!(spec.ports, vec![PortSpec::udp(8211), PortSpec::tcp(25575)]);
        assert_eq!(spec.instance_type, "t3a.large");
        assert_eq!(spec.interruption_behavior, InterruptionBehavior::Terminate);
        assert_eq!(spec.source, InstallSource::SteamApp { app_id: 2394010 });
        assert!(spec.use_spot);

        assert!(matches!(
            profiles.resolve("Valheim"),
            Err(ConfigError::UnknownGame(_))
        ));
    }

    #[test]
    fn rejects_unknown_fields_and_bad_ports() {
        assert!(GameProfiles::from_json(r#"{ "games": { "X": { "appid": 1 } } }"#).is_err());
        assert!(GameProfiles::from_json(r#"{ "games": { "X": { "ports": ["8211"] } } }"#).is_err());
    }
}
