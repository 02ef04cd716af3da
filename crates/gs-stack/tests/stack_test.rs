use std::path::PathBuf;

use aws_resources::{ResourceKind, VolumeType};
use gs_stack::assembly::AssemblyWriter;
use gs_stack::bootstrap::compose;
use gs_stack::dry_run::DryRun;
use gs_stack::profile::GameProfiles;
use gs_stack::types::{InstallSource, VolumePlan};
use gs_stack::volume::plan_volume;
use gs_stack::{ConfigError, Error, Provisioner, ProvisionerName, StackSettings, synthesize};

const PROFILES: &str = r#"{
    "defaults": { "instance_type": "t3a.medium" },
    "games": {
        "Palworld": {
            "app_id": 2394010,
            "executable": "PalServer.sh",
            "ports": ["udp/8211"],
            "instance_type": "t3a.large",
            "volume_size_gib": 32,
            "use_spot": true
        },
        "Satisfactory": {
            "app_id": 1690800,
            "executable": "FactoryServer.sh",
            "launch_options": "-log -unattended",
            "ports": ["udp/7777", "udp/15000", "udp/15777"],
            "mount_paths": ["/home/ec2-user/.config/Epic"],
            "volume_id": "vol-0713378dc970fb43d",
            "volume_size_gib": 100
        },
        "Minecraft": {
            "commands": [
                "yum install -y java-21-amazon-corretto-headless",
                "mkdir -p minecraft",
                "curl -L -o minecraft/server.jar https://example.com/server.jar"
            ],
            "exec": "/usr/bin/java -Xmx3G -jar /data/minecraft/server.jar nogui",
            "ports": ["tcp/25565"]
        },
        "Broken": {
            "executable": "run.sh"
        }
    }
}"#;

fn profiles() -> GameProfiles {
    GameProfiles::from_json(PROFILES).unwrap()
}

fn temp_dir(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("gs-stack-{name}-{}", std::process::id()))
}

#[test]
fn palworld_example() {
    let spec = profiles().resolve("Palworld").unwrap();
    assert_eq!(
        plan_volume(&spec),
        VolumePlan::CreateNew {
            size_gib: 32,
            volume_type: VolumeType::Gp3
        }
    );

    let stack = synthesize(&spec, &StackSettings::default()).unwrap();
    assert!(stack.resource("EIP").is_some());
    assert!(stack.resource("EIPAssociation").is_some());
    match &stack.resource("Template").unwrap().kind {
        ResourceKind::LaunchTemplate(props) => assert!(props.spot_options.is_some()),
        other => panic!("unexpected declaration: {other:?}"),
    }

    let user_data = stack.user_data().unwrap();
    assert!(user_data.contains("+app_update 2394010 validate +quit"));
    assert!(user_data.contains("ExecStart=/data/game/PalServer.sh\\n"));
}

#[test]
fn imported_volume_ignores_requested_size() {
    let spec = profiles().resolve("Satisfactory").unwrap();
    assert_eq!(spec.volume_size_gib, 100);
    assert_eq!(
        plan_volume(&spec),
        VolumePlan::ImportExisting {
            volume_id: "vol-0713378dc970fb43d".into()
        }
    );

    let stack = synthesize(&spec, &StackSettings::default()).unwrap();
    match &stack.resource("Volume").unwrap().kind {
        ResourceKind::ImportedVolume(props) => {
            assert_eq!(props.volume_id, "vol-0713378dc970fb43d")
        }
        other => panic!("unexpected declaration: {other:?}"),
    }
    assert!(stack.resource("EIP").is_none());

    let user_data = stack.user_data().unwrap();
    assert!(user_data.contains("mount /dev/sdh /home/ec2-user/.config/Epic\n"));
    assert!(user_data.contains("ExecStart=/data/game/FactoryServer.sh -log -unattended"));
}

#[test]
fn custom_fetch_commands_keep_their_order() {
    let spec = profiles().resolve("Minecraft").unwrap();
    let commands = match &spec.source {
        InstallSource::CustomFetch { commands } => commands.clone(),
        other => panic!("unexpected source: {other:?}"),
    };
    let script = compose(
        &spec,
        &plan_volume(&spec),
        None,
        StackSettings::default().unit_escaping,
    );

    let positions: Vec<usize> = commands
        .iter()
        .map(|c| script.commands().iter().position(|s| s == c).unwrap())
        .collect();
    assert!(positions.windows(2).all(|w| w[0] + 1 == w[1]));
    assert!(script.position("yum install -y htop").unwrap() < positions[0]);
    assert!(positions[2] < script.position("chown -R").unwrap());
}

#[test]
fn missing_install_source_aborts() {
    let err = profiles().resolve("Broken").unwrap_err();
    assert!(matches!(err, ConfigError::NoInstallSource(ref game) if game == "Broken"));
}

#[test]
fn derivation_is_idempotent() {
    let profiles = profiles();
    for game in ["Palworld", "Satisfactory", "Minecraft"] {
        let spec = profiles.resolve(game).unwrap();
        let a = synthesize(&spec, &StackSettings::default()).unwrap();
        let b = synthesize(&profiles.resolve(game).unwrap(), &StackSettings::default()).unwrap();
        assert_eq!(a.to_template_json().unwrap(), b.to_template_json().unwrap());
    }
}

#[test]
fn uploaded_archive_is_declared_and_staged() {
    let dir = temp_dir("archive");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("server.zip"), b"not really a zip").unwrap();
    std::fs::write(
        dir.join("games.json"),
        r#"{ "games": { "Factorio": {
            "upload_zip_path": "server.zip",
            "exec": "/data/factorio/bin/x64/factorio --start-server {archive}",
            "ports": ["udp/34197"]
        } } }"#,
    )
    .unwrap();

    let profiles = GameProfiles::load(&dir.join("games.json")).unwrap();
    let spec = profiles.resolve("Factorio").unwrap();
    let stack = synthesize(&spec, &StackSettings::default()).unwrap();

    let asset = match &stack.resource("Asset").unwrap().kind {
        ResourceKind::Asset(props) => props.clone(),
        other => panic!("unexpected declaration: {other:?}"),
    };
    assert_eq!(asset.bucket, "game-server-assets");
    assert!(asset.object_key.ends_with(".zip"));

    let user_data = stack.user_data().unwrap();
    let staged = format!("/data/{}", asset.object_key);
    assert!(user_data.contains(&format!("mv /tmp/{} {staged}", asset.object_key)));
    assert!(user_data.contains(&format!("--start-server {staged}")));

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn missing_archive_fails_synthesis() {
    let profiles = GameProfiles::from_json(
        r#"{ "games": { "X": { "upload_zip_path": "/nonexistent/x.zip", "exec": "/bin/true" } } }"#,
    )
    .unwrap();
    let spec = profiles.resolve("X").unwrap();
    assert!(matches!(
        synthesize(&spec, &StackSettings::default()),
        Err(Error::Asset { .. })
    ));
}

#[tokio::test]
async fn assembly_writer_writes_template_and_user_data() {
    let out = temp_dir("assembly");
    let spec = profiles().resolve("Palworld").unwrap();
    let stack = synthesize(&spec, &StackSettings::default()).unwrap();

    let writer = AssemblyWriter::new(&out);
    let provisioned = writer.provision(&stack).await.unwrap();
    assert_eq!(provisioned.provisioner, ProvisionerName::Assembly);
    assert_eq!(provisioned.artifacts.len(), 2);

    let template = std::fs::read_to_string(out.join("PalworldServer/template.json")).unwrap();
    let json: serde_json::Value = serde_json::from_str(&template).unwrap();
    assert_eq!(json["Name"], "PalworldServer");

    let user_data = std::fs::read_to_string(out.join("PalworldServer/user-data.sh")).unwrap();
    assert!(user_data.starts_with("#!/bin/bash\n"));
    assert_eq!(provisioned.identifiers["EC2"], "PalworldServer/EC2");

    std::fs::remove_dir_all(&out).ok();
}

#[tokio::test]
async fn dry_run_keeps_imported_volume_id() {
    let spec = profiles().resolve("Satisfactory").unwrap();
    let stack = synthesize(&spec, &StackSettings::default()).unwrap();

    let provisioned = DryRun.provision(&stack).await.unwrap();
    assert_eq!(provisioned.provisioner, ProvisionerName::DryRun);
    assert_eq!(provisioned.identifiers["Volume"], "vol-0713378dc970fb43d");
    assert!(provisioned.identifiers["EC2"].starts_with("i-dryrun"));
    assert!(provisioned.artifacts.is_empty());
}
