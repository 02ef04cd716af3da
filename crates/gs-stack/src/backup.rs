use aws_resources::{
    CreateRule, IntervalUnit, LifecyclePolicyProps, PolicyDetails, PolicyState, RetainRule,
    Schedule, Tag,
};

use crate::volume::volume_name;

/// Role the snapshot lifecycle manager runs as; it must already exist.
pub const EXECUTION_ROLE: &str = "AWSDataLifecycleManagerDefaultRole";

/// Hourly snapshots of the stack's volume, kept for two days.
///
/// Static: nothing in the server spec changes it.
pub fn lifecycle_policy(stack_name: &str) -> LifecyclePolicyProps {
    LifecyclePolicyProps {
        description: format!("EBSSnapshotManagement for the {stack_name}"),
        state: PolicyState::Enabled,
        execution_role_name: EXECUTION_ROLE.into(),
        policy_details: PolicyDetails {
            policy_type: "EBS_SNAPSHOT_MANAGEMENT".into(),
            resource_types: vec!["VOLUME".into()],
            target_tags: vec![Tag {
                key: "Name".into(),
                value: volume_name(stack_name),
            }],
            schedules: vec![Schedule {
                name: "Backup".into(),
                create_rule: CreateRule {
                    interval: 1,
                    interval_unit: IntervalUnit::Hours,
                    times: vec!["09:00".into()],
                },
                retain_rule: RetainRule {
                    interval: 2,
                    interval_unit: IntervalUnit::Days,
                },
            }],
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_matches_fixed_schedule() {
        let json = serde_json::to_value(lifecycle_policy("PalworldServer")).unwrap();
        assert_eq!(json["Description"], "EBSSnapshotManagement for the PalworldServer");
        assert_eq!(json["State"], "ENABLED");
        assert_eq!(json["ExecutionRoleName"], EXECUTION_ROLE);

        let details = &json["PolicyDetails"];
        assert_eq!(details["PolicyType"], "EBS_SNAPSHOT_MANAGEMENT");
        assert_eq!(details["ResourceTypes"], serde_json::json!(["VOLUME"]));
        assert_eq!(
            details["TargetTags"],
            serde_json::json!([{ "Key": "Name", "Value": "PalworldServer/Volume" }])
        );
        assert_eq!(
            details["Schedules"][0],
            serde_json::json!({
                "Name": "Backup",
                "CreateRule": { "Interval": 1, "IntervalUnit": "HOURS", "Times": ["09:00"] },
                "RetainRule": { "Interval": 2, "IntervalUnit": "DAYS" },
            })
        );
    }
}
