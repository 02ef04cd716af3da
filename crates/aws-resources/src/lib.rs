//! Typed declarations for the AWS resources a game server stack is made of.
//!
//! Covers the subset needed for one dedicated server: network, security group,
//! launch template, instance, volume, Elastic IP and a snapshot lifecycle policy.
//! Nothing here talks to AWS; a provisioning engine consumes the serialized form.

mod types;

pub use types::*;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid port {0:?}, expected <tcp|udp>/<1-65535>")]
    InvalidPort(String),

    #[error("unknown protocol: {0}")]
    UnknownProtocol(String),

    #[error("serialize stack: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl StackDescription {
    /// Look up a resource by logical id.
    pub fn resource(&self, logical_id: &str) -> Option<&Resource> {
        self.resources.iter().find(|r| r.logical_id == logical_id)
    }

    /// The user data of the first instance in the stack, if any.
    pub fn user_data(&self) -> Option<&str> {
        self.resources.iter().find_map(|r| match &r.kind {
            ResourceKind::Instance(props) => Some(props.user_data.as_str()),
            _ => None,
        })
    }

    /// Render the stack as pretty-printed JSON.
    pub fn to_template_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
