use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

// ── References ───────────────────────────────────────────────────────

/// Reference to another resource of the same stack by logical id.
///
/// The provisioning engine substitutes the physical id once it exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ref {
    #[serde(rename = "Ref")]
    pub logical_id: String,
}

impl Ref {
    pub fn to(logical_id: impl Into<String>) -> Self {
        Self {
            logical_id: logical_id.into(),
        }
    }
}

/// Attribute of another resource, e.g. the `AllocationId` of an Elastic IP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GetAtt {
    #[serde(rename = "Fn::GetAtt")]
    pub target: (String, String),
}

impl GetAtt {
    pub fn new(logical_id: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self {
            target: (logical_id.into(), attribute.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Ref(Ref),
    GetAtt(GetAtt),
}

/// Where a zonal resource lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AvailabilityZone {
    /// First availability zone of the deployment region, resolved by the engine.
    FirstInRegion,
    Named(String),
}

// ── Ports ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tcp => "tcp",
            Self::Udp => "udp",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s.to_ascii_lowercase().as_str() {
            "tcp" => Ok(Self::Tcp),
            "udp" => Ok(Self::Udp),
            _ => Err(Error::UnknownProtocol(s.to_string())),
        }
    }
}

/// A single exposed port, written `udp/8211` in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PortSpec {
    pub protocol: Protocol,
    pub port: u16,
}

impl PortSpec {
    pub const SSH: Self = Self::tcp(22);

    pub const fn tcp(port: u16) -> Self {
        Self {
            protocol: Protocol::Tcp,
            port,
        }
    }

    pub const fn udp(port: u16) -> Self {
        Self {
            protocol: Protocol::Udp,
            port,
        }
    }
}

impl fmt::Display for PortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.protocol, self.port)
    }
}

impl FromStr for PortSpec {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        let (protocol, port) = s
            .split_once('/')
            .ok_or_else(|| Error::InvalidPort(s.to_string()))?;
        let protocol = protocol.trim().parse()?;
        let port = port
            .trim()
            .parse::<u16>()
            .ok()
            .filter(|p| *p != 0)
            .ok_or_else(|| Error::InvalidPort(s.to_string()))?;
        Ok(Self { protocol, port })
    }
}

impl TryFrom<String> for PortSpec {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Error> {
        value.parse()
    }
}

impl From<PortSpec> for String {
    fn from(value: PortSpec) -> Self {
        value.to_string()
    }
}

// ── Stack ────────────────────────────────────────────────────────────

/// A complete, ordered set of resource declarations for one stack.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct StackDescription {
    pub name: String,
    pub resources: Vec<Resource>,
    pub outputs: Vec<Output>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Resource {
    pub logical_id: String,
    #[serde(flatten)]
    pub kind: ResourceKind,
}

impl Resource {
    pub fn new(logical_id: impl Into<String>, kind: ResourceKind) -> Self {
        Self {
            logical_id: logical_id.into(),
            kind,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.kind.type_name()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "Type", content = "Properties")]
pub enum ResourceKind {
    #[serde(rename = "AWS::EC2::VPC")]
    Vpc(VpcProps),
    #[serde(rename = "AWS::EC2::SecurityGroup")]
    SecurityGroup(SecurityGroupProps),
    #[serde(rename = "AWS::EC2::LaunchTemplate")]
    LaunchTemplate(LaunchTemplateProps),
    #[serde(rename = "AWS::EC2::Instance")]
    Instance(InstanceProps),
    #[serde(rename = "AWS::EC2::Volume")]
    Volume(VolumeProps),
    /// An existing volume looked up by id rather than created.
    #[serde(rename = "Import::EC2::Volume")]
    ImportedVolume(ImportedVolumeProps),
    #[serde(rename = "AWS::EC2::VolumeAttachment")]
    VolumeAttachment(VolumeAttachmentProps),
    #[serde(rename = "AWS::EC2::EIP")]
    ElasticIp(ElasticIpProps),
    #[serde(rename = "AWS::EC2::EIPAssociation")]
    ElasticIpAssociation(ElasticIpAssociationProps),
    /// A local file the engine uploads to object storage before deploying.
    #[serde(rename = "Asset::S3::Object")]
    Asset(AssetProps),
    #[serde(rename = "AWS::DLM::LifecyclePolicy")]
    LifecyclePolicy(LifecyclePolicyProps),
}

impl ResourceKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Vpc(_) => "AWS::EC2::VPC",
            Self::SecurityGroup(_) => "AWS::EC2::SecurityGroup",
            Self::LaunchTemplate(_) => "AWS::EC2::LaunchTemplate",
            Self::Instance(_) => "AWS::EC2::Instance",
            Self::Volume(_) => "AWS::EC2::Volume",
            Self::ImportedVolume(_) => "Import::EC2::Volume",
            Self::VolumeAttachment(_) => "AWS::EC2::VolumeAttachment",
            Self::ElasticIp(_) => "AWS::EC2::EIP",
            Self::ElasticIpAssociation(_) => "AWS::EC2::EIPAssociation",
            Self::Asset(_) => "Asset::S3::Object",
            Self::LifecyclePolicy(_) => "AWS::DLM::LifecyclePolicy",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Output {
    pub name: String,
    pub value: Value,
}

// ── Network ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct VpcProps {
    pub max_azs: u8,
    pub subnets: Vec<SubnetConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SubnetConfig {
    pub name: String,
    pub subnet_type: SubnetType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubnetType {
    Public,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SecurityGroupProps {
    pub vpc: Ref,
    pub allow_all_outbound: bool,
    pub ingress: Vec<IngressRule>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct IngressRule {
    pub cidr_ip: String,
    pub ip_protocol: Protocol,
    pub from_port: u16,
    pub to_port: u16,
}

impl IngressRule {
    /// Allow `port` from any IPv4 address.
    pub fn any_ipv4(port: PortSpec) -> Self {
        Self {
            cidr_ip: "0.0.0.0/0".into(),
            ip_protocol: port.protocol,
            from_port: port.port,
            to_port: port.port,
        }
    }
}

// ── Compute ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct LaunchTemplateProps {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spot_options: Option<SpotOptions>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SpotOptions {
    pub request_type: SpotRequestType,
    pub interruption_behavior: InterruptionBehavior,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SpotRequestType {
    Persistent,
}

/// What happens to a spot instance when capacity is reclaimed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterruptionBehavior {
    #[default]
    Stop,
    Terminate,
}

impl InterruptionBehavior {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stop => "stop",
            Self::Terminate => "terminate",
        }
    }
}

impl fmt::Display for InterruptionBehavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MachineImage {
    /// Latest Amazon Linux 2023 image for the deployment region.
    AmazonLinux2023,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct InstanceProps {
    pub instance_type: String,
    pub machine_image: MachineImage,
    pub availability_zone: AvailabilityZone,
    pub vpc: Ref,
    pub security_group: Ref,
    pub launch_template: Ref,
    pub user_data: String,
}

// ── Storage ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolumeType {
    Gp3,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct VolumeProps {
    pub volume_name: String,
    pub availability_zone: AvailabilityZone,
    pub size_gib: u32,
    pub volume_type: VolumeType,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ImportedVolumeProps {
    pub volume_id: String,
    pub availability_zone: AvailabilityZone,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct VolumeAttachmentProps {
    pub instance: Ref,
    pub volume: Ref,
    pub device: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AssetProps {
    pub source_path: String,
    pub bucket: String,
    pub object_key: String,
    /// Resources granted read access to the uploaded object.
    pub readers: Vec<Ref>,
}

// ── Addressing ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ElasticIpProps {
    pub domain: String,
}

impl Default for ElasticIpProps {
    fn default() -> Self {
        Self {
            domain: "vpc".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ElasticIpAssociationProps {
    pub allocation_id: GetAtt,
    pub instance_id: Ref,
}

// ── Backups ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct LifecyclePolicyProps {
    pub description: String,
    pub state: PolicyState,
    /// Name of an existing IAM role, resolved to its ARN by the engine.
    pub execution_role_name: String,
    pub policy_details: PolicyDetails,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PolicyState {
    Enabled,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyDetails {
    pub policy_type: String,
    pub resource_types: Vec<String>,
    pub target_tags: Vec<Tag>,
    pub schedules: Vec<Schedule>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Tag {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Schedule {
    pub name: String,
    pub create_rule: CreateRule,
    pub retain_rule: RetainRule,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntervalUnit {
    Hours,
    Days,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateRule {
    pub interval: u32,
    pub interval_unit: IntervalUnit,
    pub times: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RetainRule {
    pub interval: u32,
    pub interval_unit: IntervalUnit,
}
