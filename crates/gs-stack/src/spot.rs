use aws_resources::{
    ElasticIpAssociationProps, ElasticIpProps, GetAtt, Ref, Resource, ResourceKind, SpotOptions,
    SpotRequestType,
};
use tracing::debug;

use crate::types::{ServerSpec, SpotPolicy};

pub const EIP_ID: &str = "EIP";
pub const EIP_ASSOCIATION_ID: &str = "EIPAssociation";

/// Decide spot request and address behaviour for `spec`.
///
/// A spot instance gets a persistent request so it comes back after an
/// interruption, and an Elastic IP so it comes back at the same address.
pub fn spot_policy(spec: &ServerSpec) -> SpotPolicy {
    let policy = SpotPolicy {
        enabled: spec.use_spot,
        request_type: SpotRequestType::Persistent,
        interruption_behavior: spec.interruption_behavior,
        reassociate_elastic_ip: spec.use_spot,
    };
    debug!(
        game = %spec.name,
        enabled = policy.enabled,
        interruption = %policy.interruption_behavior,
        "decided spot policy"
    );
    policy
}

impl SpotPolicy {
    /// Launch template spot options, present only when spot is enabled.
    pub fn spot_options(&self) -> Option<SpotOptions> {
        self.enabled.then_some(SpotOptions {
            request_type: self.request_type,
            interruption_behavior: self.interruption_behavior,
        })
    }

    /// Elastic IP allocation and association for `instance_id`, if needed.
    pub fn elastic_ip_resources(&self, instance_id: &str) -> Vec<Resource> {
        if !(self.enabled && self.reassociate_elastic_ip) {
            return Vec::new();
        }
        vec![
            Resource::new(EIP_ID, ResourceKind::ElasticIp(ElasticIpProps::default())),
            Resource::new(
                EIP_ASSOCIATION_ID,
                ResourceKind::ElasticIpAssociation(ElasticIpAssociationProps {
                    allocation_id: GetAtt::new(EIP_ID, "AllocationId"),
                    instance_id: Ref::to(instance_id),
                }),
            ),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ExecCommand, InstallSource};
    use aws_resources::{AvailabilityZone, InterruptionBehavior};

    fn spec(use_spot: bool, interruption_behavior: InterruptionBehavior) -> ServerSpec {
        ServerSpec {
            name: "Satisfactory".into(),
            source: InstallSource::SteamApp { app_id: 1690800 },
            exec: ExecCommand::Template("/data/game/FactoryServer.sh".into()),
            ports: vec![],
            instance_type: "m6a.xlarge".into(),
            use_spot,
            interruption_behavior,
            volume_size_gib: 32,
            volume_id: None,
            mount_paths: vec!["/data".into()],
            availability_zone: AvailabilityZone::FirstInRegion,
        }
    }

    #[test]
    fn on_demand_declares_nothing() {
        let policy = spot_policy(&spec(false, InterruptionBehavior::Stop));
        assert!(!policy.enabled);
        assert!(!policy.reassociate_elastic_ip);
        assert_eq!(policy.spot_options(), None);
        assert!(policy.elastic_ip_resources("EC2").is_empty());
    }

    #[test]
    fn spot_declares_persistent_request_and_elastic_ip() {
        let policy = spot_policy(&spec(true, InterruptionBehavior::Terminate));
        assert!(policy.reassociate_elastic_ip);
        assert_eq!(
            policy.spot_options(),
            Some(SpotOptions {
                request_type: SpotRequestType::Persistent,
                interruption_behavior: InterruptionBehavior::Terminate,
            })
        );

        let resources = policy.elastic_ip_resources("EC2");
        assert_eq!(resources.len(), 2);
        match &resources[1].kind {
            ResourceKind::ElasticIpAssociation(props) => {
                assert_eq!(props.instance_id, Ref::to("EC2"));
                assert_eq!(props.allocation_id, GetAtt::new(EIP_ID, "AllocationId"));
            }
            other => panic!("unexpected declaration: {other:?}"),
        }
    }
}
