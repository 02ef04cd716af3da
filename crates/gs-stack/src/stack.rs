//! Assembles the policies into one stack description.

use std::env;

use aws_resources::{
    AssetProps, IngressRule, InstanceProps, LaunchTemplateProps, MachineImage, Output, PortSpec,
    GetAtt, Ref, Resource, ResourceKind, SecurityGroupProps, StackDescription, SubnetConfig,
    SubnetType, Value, VolumeAttachmentProps, VpcProps,
};
use tracing::info;

use crate::Result;
use crate::asset::stage_archive;
use crate::backup::lifecycle_policy;
use crate::bootstrap::{UnitEscaping, compose};
use crate::spot::{EIP_ID, spot_policy};
use crate::types::{DEVICE_NAME, InstallSource, ServerSpec, StagedArchive};
use crate::volume::{plan_volume, volume_resource};

const VPC_ID: &str = "VPC";
const SECURITY_GROUP_ID: &str = "SecurityGroup";
const LAUNCH_TEMPLATE_ID: &str = "Template";
const INSTANCE_ID: &str = "EC2";
const VOLUME_ID: &str = "Volume";
const ATTACHMENT_ID: &str = "VolumeAttachment";
const ASSET_ID: &str = "Asset";
const LIFECYCLE_POLICY_ID: &str = "LifecyclePolicy";

/// Stack-wide settings that are not part of a game profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackSettings {
    /// Overrides the default `<Game>Server` stack name.
    pub stack_name: Option<String>,
    /// Bucket uploaded archives are stored in.
    pub asset_bucket: String,
    pub unit_escaping: UnitEscaping,
}

impl Default for StackSettings {
    fn default() -> Self {
        Self {
            stack_name: None,
            asset_bucket: "game-server-assets".into(),
            unit_escaping: UnitEscaping::Full,
        }
    }
}

impl StackSettings {
    /// Read from env vars:
    ///
    /// - `GAME_STACK_ASSET_BUCKET` (default: `"game-server-assets"`)
    /// - `GAME_STACK_LEGACY_UNIT_ESCAPING` (`true` to escape only the first newline)
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Same as [`StackSettings::from_env`], reading variables through `var`.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let mut settings = Self::default();
        if let Some(bucket) = var("GAME_STACK_ASSET_BUCKET") {
            settings.asset_bucket = bucket;
        }
        let legacy = var("GAME_STACK_LEGACY_UNIT_ESCAPING")
            .is_some_and(|v| matches!(v.trim(), "1" | "true" | "yes"));
        if legacy {
            settings.unit_escaping = UnitEscaping::FirstNewlineOnly;
        }
        settings
    }

    pub fn stack_name(&self, spec: &ServerSpec) -> String {
        self.stack_name
            .clone()
            .unwrap_or_else(|| default_stack_name(&spec.name))
    }
}

/// `Palworld` becomes `PalworldServer`; characters a stack name can't hold are dropped.
pub fn default_stack_name(game: &str) -> String {
    let mut name: String = game
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect();
    name.push_str("Server");
    name
}

/// Derive the complete stack for `spec`.
///
/// Archive sources are hashed from disk here; everything else is pure.
pub fn synthesize(spec: &ServerSpec, settings: &StackSettings) -> Result<StackDescription> {
    let staged = match &spec.source {
        InstallSource::UploadedArchive { path } => {
            Some(stage_archive(path, &settings.asset_bucket)?)
        }
        _ => None,
    };
    Ok(synthesize_with(spec, settings, staged.as_ref()))
}

/// Derive the stack with an already staged archive.
pub fn synthesize_with(
    spec: &ServerSpec,
    settings: &StackSettings,
    staged: Option<&StagedArchive>,
) -> StackDescription {
    let stack_name = settings.stack_name(spec);
    let volume_plan = plan_volume(spec);
    let spot = spot_policy(spec);
    let script = compose(spec, &volume_plan, staged, settings.unit_escaping);

    let mut resources = vec![
        Resource::new(
            VPC_ID,
            ResourceKind::Vpc(VpcProps {
                max_azs: 1,
                subnets: vec![SubnetConfig {
                    name: "Subnet".into(),
                    subnet_type: SubnetType::Public,
                }],
            }),
        ),
        Resource::new(
            SECURITY_GROUP_ID,
            ResourceKind::SecurityGroup(SecurityGroupProps {
                vpc: Ref::to(VPC_ID),
                allow_all_outbound: true,
                ingress: std::iter::once(PortSpec::SSH)
                    .chain(spec.ports.iter().copied().filter(|p| *p != PortSpec::SSH))
                    .map(IngressRule::any_ipv4)
                    .collect(),
            }),
        ),
        Resource::new(
            LAUNCH_TEMPLATE_ID,
            ResourceKind::LaunchTemplate(LaunchTemplateProps {
                spot_options: spot.spot_options(),
            }),
        ),
        Resource::new(
            INSTANCE_ID,
            ResourceKind::Instance(InstanceProps {
                instance_type: spec.instance_type.clone(),
                machine_image: MachineImage::AmazonLinux2023,
                availability_zone: spec.availability_zone.clone(),
                vpc: Ref::to(VPC_ID),
                security_group: Ref::to(SECURITY_GROUP_ID),
                launch_template: Ref::to(LAUNCH_TEMPLATE_ID),
                user_data: script.render(),
            }),
        ),
        Resource::new(
            VOLUME_ID,
            volume_resource(&volume_plan, &stack_name, &spec.availability_zone),
        ),
        Resource::new(
            ATTACHMENT_ID,
            ResourceKind::VolumeAttachment(VolumeAttachmentProps {
                instance: Ref::to(INSTANCE_ID),
                volume: Ref::to(VOLUME_ID),
                device: DEVICE_NAME.into(),
            }),
        ),
    ];

    if let Some(archive) = staged {
        resources.push(Resource::new(
            ASSET_ID,
            ResourceKind::Asset(AssetProps {
                source_path: archive.source_path.display().to_string(),
                bucket: archive.bucket.clone(),
                object_key: archive.object_key.clone(),
                readers: vec![Ref::to(INSTANCE_ID)],
            }),
        ));
    }

    resources.extend(spot.elastic_ip_resources(INSTANCE_ID));

    resources.push(Resource::new(
        LIFECYCLE_POLICY_ID,
        ResourceKind::LifecyclePolicy(lifecycle_policy(&stack_name)),
    ));

    let mut outputs = vec![
        Output {
            name: "InstanceId".into(),
            value: Value::Ref(Ref::to(INSTANCE_ID)),
        },
        Output {
            name: "VolumeId".into(),
            value: Value::Ref(Ref::to(VOLUME_ID)),
        },
    ];
    if spot.reassociate_elastic_ip {
        outputs.push(Output {
            name: "PublicIp".into(),
            value: Value::Ref(Ref::to(EIP_ID)),
        });
        outputs.push(Output {
            name: "ElasticIpAllocationId".into(),
            value: Value::GetAtt(GetAtt::new(EIP_ID, "AllocationId")),
        });
    }

    info!(
        stack = %stack_name,
        resources = resources.len(),
        spot = spot.enabled,
        import_volume = volume_plan.is_import(),
        "synthesized stack"
    );

    StackDescription {
        name: stack_name,
        resources,
        outputs,
    }
}
