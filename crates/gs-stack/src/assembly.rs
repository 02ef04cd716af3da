use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use aws_resources::StackDescription;
use tracing::info;

use crate::types::ProvisionedStack;
use crate::{Error, Provisioner, ProvisionerName, Result};

const TEMPLATE_FILE: &str = "template.json";
const USER_DATA_FILE: &str = "user-data.sh";

/// Writes a cloud assembly for an external deployment engine to pick up.
///
/// Layout: `<out_dir>/<stack>/template.json` and `<out_dir>/<stack>/user-data.sh`.
pub struct AssemblyWriter {
    out_dir: PathBuf,
}

impl AssemblyWriter {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
        }
    }

    /// Create from env var `GAME_STACK_OUT_DIR` (default: `"stack.out"`).
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let out_dir = std::env::var("GAME_STACK_OUT_DIR").unwrap_or_else(|_| "stack.out".into());
        if out_dir.trim().is_empty() {
            return Err(Error::MissingEnv("GAME_STACK_OUT_DIR".into()));
        }
        Ok(Self::new(out_dir))
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    async fn write(path: &Path, contents: &str) -> Result<()> {
        tokio::fs::write(path, contents)
            .await
            .map_err(|e| Error::Provisioning(format!("write {}: {e}", path.display())))
    }
}

#[async_trait]
impl Provisioner for AssemblyWriter {
    async fn provision(&self, stack: &StackDescription) -> Result<ProvisionedStack> {
        let dir = self.out_dir.join(&stack.name);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| Error::Provisioning(format!("create {}: {e}", dir.display())))?;

        let mut artifacts = Vec::new();

        let template = dir.join(TEMPLATE_FILE);
        Self::write(&template, &stack.to_template_json()?).await?;
        artifacts.push(template);

        if let Some(user_data) = stack.user_data() {
            let script = dir.join(USER_DATA_FILE);
            Self::write(&script, user_data).await?;
            artifacts.push(script);
        }

        // Physical ids only exist once the engine deploys; hand back stable tokens.
        let identifiers: BTreeMap<String, String> = stack
            .resources
            .iter()
            .map(|r| (r.logical_id.clone(), format!("{}/{}", stack.name, r.logical_id)))
            .collect();

        info!(stack = %stack.name, dir = %dir.display(), "assembly: stack written");

        Ok(ProvisionedStack {
            stack_name: stack.name.clone(),
            provisioner: self.name(),
            identifiers,
            artifacts,
        })
    }

    fn name(&self) -> ProvisionerName {
        ProvisionerName::Assembly
    }
}
