//! First-boot script: format and mount the persistent volume, install the
//! game server, and register it as a systemd service.

use tracing::debug;

use crate::types::{
    BootstrapScript, DATA_DIR, DEVICE_NAME, INSTALL_DIR, InstallSource, SERVICE_UNIT_PATH,
    SERVICE_USER, ServerSpec, StagedArchive, VolumePlan,
};

pub const STEAMCMD_URL: &str =
    "https://steamcdn-a.akamaihd.net/client/installer/steamcmd_linux.tar.gz";
const STEAMCMD_ARCHIVE: &str = "steamcmd_linux.tar.gz";
const FILESYSTEM: &str = "xfs";
/// 32-bit runtime libraries SteamCMD and most dedicated servers need.
const BASE_PACKAGES: &str = "glibc.i686 libstdc++48.i686";
const DIAGNOSTICS_PACKAGE: &str = "htop";
const SERVICE_NAME: &str = "game";

/// How the unit text is escaped before it is embedded in `echo -e "..."`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnitEscaping {
    /// Every newline plus the characters special inside double quotes.
    #[default]
    Full,
    /// Only the first newline, as already deployed scripts did. The remaining
    /// newlines stay literal inside the quoted string.
    FirstNewlineOnly,
}

/// Compose the ordered first-boot commands for `spec`.
///
/// `staged` must be given for archive sources; it is ignored otherwise.
pub fn compose(
    spec: &ServerSpec,
    plan: &VolumePlan,
    staged: Option<&StagedArchive>,
    escaping: UnitEscaping,
) -> BootstrapScript {
    let mut script = BootstrapScript::default();

    // An imported volume already carries a filesystem with save data.
    if plan.is_import() {
        script.push(format!(
            "blkid {DEVICE_NAME} || mkfs -t {FILESYSTEM} {DEVICE_NAME}"
        ));
    } else {
        script.push(format!("mkfs -t {FILESYSTEM} {DEVICE_NAME}"));
    }
    // Paths nested under /data must be created after /data is mounted.
    for path in &spec.mount_paths {
        script.push(format!("mkdir -p {path}"));
        script.push(format!("mount {DEVICE_NAME} {path}"));
    }

    script.push("yum update -y");
    script.push(format!("yum install -y {BASE_PACKAGES}"));
    script.push(format!("yum install -y {DIAGNOSTICS_PACKAGE} || true"));
    script.push(format!("cd {DATA_DIR}"));

    let mut archive_path = None;
    match &spec.source {
        InstallSource::SteamApp { app_id } => script.extend(steamcmd_install(*app_id)),
        InstallSource::CustomFetch { commands } => script.extend(commands.iter().cloned()),
        InstallSource::UploadedArchive { .. } => match staged {
            Some(archive) => {
                script.extend(archive.staging_commands());
                archive_path = Some(archive.instance_path.as_str());
            }
            None => tracing::warn!(game = %spec.name, "archive source without a staged archive"),
        },
    }

    script.push(format!("chown -R {SERVICE_USER}:{SERVICE_USER} {DATA_DIR}"));

    let unit = render_unit(&spec.exec.render(archive_path));
    script.push(format!(
        "echo -e \"{}\" > {SERVICE_UNIT_PATH}",
        escape_unit(&unit, escaping)
    ));
    script.push("systemctl daemon-reload");
    script.push(format!("systemctl start {SERVICE_NAME}"));

    debug!(
        game = %spec.name,
        source = spec.source.kind(),
        commands = script.commands().len(),
        "composed bootstrap script"
    );
    script
}

/// SteamCMD download followed by an anonymous, validating install.
pub fn steamcmd_install(app_id: u32) -> Vec<String> {
    vec![
        format!("wget '{STEAMCMD_URL}'"),
        format!("tar -xzvf {STEAMCMD_ARCHIVE}"),
        format!("rm -f {STEAMCMD_ARCHIVE}"),
        "find -exec chmod 777 {} \\;".to_string(),
        format!(
            "./steamcmd.sh +force_install_dir {INSTALL_DIR} +login anonymous +app_update {app_id} validate +quit"
        ),
    ]
}

/// The systemd unit running `exec_start` as the service user.
pub fn render_unit(exec_start: &str) -> String {
    format!(
        "[Unit]
Description=Game server
After=network.target

[Service]
Type=simple
ExecStart={exec_start}
Restart=always
User={SERVICE_USER}

[Install]
WantedBy=default.target"
    )
}

pub fn escape_unit(unit: &str, escaping: UnitEscaping) -> String {
    match escaping {
        UnitEscaping::FirstNewlineOnly => unit.replacen('\n', "\\n", 1),
        UnitEscaping::Full => {
            let mut out = String::with_capacity(unit.len() + 16);
            for c in unit.chars() {
                match c {
                    '\n' => out.push_str("\\n"),
                    // The shell turns `\\\\` into `\\`, which echo -e prints as `\`.
                    '\\' => out.push_str("\\\\\\\\"),
                    '"' | '$' | '`' => {
                        out.push('\\');
                        out.push(c);
                    }
                    _ => out.push(c),
                }
            }
            out
        }
    }
}
