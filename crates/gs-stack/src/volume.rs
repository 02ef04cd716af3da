use aws_resources::{
    AvailabilityZone, ImportedVolumeProps, ResourceKind, VolumeProps, VolumeType,
};
use tracing::debug;

use crate::types::{ServerSpec, VolumePlan};

/// Create a fresh gp3 volume unless an existing one is named.
///
/// An imported volume's real size is not checked against `volume_size_gib`.
pub fn plan_volume(spec: &ServerSpec) -> VolumePlan {
    let plan = match &spec.volume_id {
        Some(volume_id) => VolumePlan::ImportExisting {
            volume_id: volume_id.clone(),
        },
        None => VolumePlan::CreateNew {
            size_gib: spec.volume_size_gib,
            volume_type: VolumeType::Gp3,
        },
    };
    debug!(game = %spec.name, plan = ?plan, "planned persistent volume");
    plan
}

/// Declaration for the planned volume, in the same zone as the instance.
pub fn volume_resource(
    plan: &VolumePlan,
    stack_name: &str,
    availability_zone: &AvailabilityZone,
) -> ResourceKind {
    match plan {
        VolumePlan::CreateNew {
            size_gib,
            volume_type,
        } => ResourceKind::Volume(VolumeProps {
            volume_name: volume_name(stack_name),
            availability_zone: availability_zone.clone(),
            size_gib: *size_gib,
            volume_type: *volume_type,
        }),
        VolumePlan::ImportExisting { volume_id } => {
            ResourceKind::ImportedVolume(ImportedVolumeProps {
                volume_id: volume_id.clone(),
                availability_zone: availability_zone.clone(),
            })
        }
    }
}

/// `Name` tag of created volumes; the backup policy targets it.
pub fn volume_name(stack_name: &str) -> String {
    format!("{stack_name}/Volume")
}
