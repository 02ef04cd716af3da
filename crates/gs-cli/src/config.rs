use std::env;
use std::path::PathBuf;

use gs_stack::StackSettings;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub profiles_path: PathBuf,
    /// Raw provisioner name; only `synth` parses it.
    pub provisioner: String,
    pub settings: StackSettings,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            profiles_path: env::var("GAME_PROFILES_PATH")
                .unwrap_or_else(|_| "games.json".into())
                .into(),
            provisioner: env::var("GAME_STACK_PROVISIONER").unwrap_or_else(|_| "assembly".into()),
            settings: StackSettings::from_env(),
        }
    }
}
