use async_trait::async_trait;
use aws_resources::{ResourceKind, StackDescription};
use tracing::info;

use crate::types::ProvisionedStack;
use crate::{Provisioner, ProvisionerName, Result};

/// Logs what would be provisioned and assigns placeholder ids.
pub struct DryRun;

impl DryRun {
    fn placeholder_id(kind: &ResourceKind, index: usize) -> String {
        let prefix = match kind {
            ResourceKind::Vpc(_) => "vpc",
            ResourceKind::SecurityGroup(_) => "sg",
            ResourceKind::LaunchTemplate(_) => "lt",
            ResourceKind::Instance(_) => "i",
            ResourceKind::Volume(_) => "vol",
            ResourceKind::ImportedVolume(props) => return props.volume_id.clone(),
            ResourceKind::VolumeAttachment(_) => "attach",
            ResourceKind::ElasticIp(_) => "eipalloc",
            ResourceKind::ElasticIpAssociation(_) => "eipassoc",
            ResourceKind::Asset(props) => return format!("s3://{}/{}", props.bucket, props.object_key),
            ResourceKind::LifecyclePolicy(_) => "policy",
        };
        format!("{prefix}-dryrun{index:04}")
    }
}

#[async_trait]
impl Provisioner for DryRun {
    async fn provision(&self, stack: &StackDescription) -> Result<ProvisionedStack> {
        let mut identifiers = std::collections::BTreeMap::new();
        for (index, resource) in stack.resources.iter().enumerate() {
            let id = Self::placeholder_id(&resource.kind, index);
            info!(
                stack = %stack.name,
                logical_id = %resource.logical_id,
                resource_type = resource.type_name(),
                id = %id,
                "dry-run: would provision"
            );
            identifiers.insert(resource.logical_id.clone(), id);
        }

        Ok(ProvisionedStack {
            stack_name: stack.name.clone(),
            provisioner: self.name(),
            identifiers,
            artifacts: Vec::new(),
        })
    }

    fn name(&self) -> ProvisionerName {
        ProvisionerName::DryRun
    }
}
