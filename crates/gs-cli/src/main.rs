mod config;
mod error;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use gs_stack::assembly::AssemblyWriter;
use gs_stack::bootstrap::{UnitEscaping, compose};
use gs_stack::profile::GameProfiles;
use gs_stack::types::{InstallSource, ServerSpec};
use gs_stack::volume::plan_volume;
use gs_stack::{Provisioner, ProvisionerName, asset, build_provisioners, spot, synthesize};
use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;
use crate::error::CliError;

#[derive(Parser)]
#[command(name = "game-stack")]
#[command(author, version, about = "Derive cloud stacks for dedicated game servers")]
struct Cli {
    /// Game profiles file (overrides GAME_PROFILES_PATH)
    #[arg(long, global = true)]
    profiles: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the games in the profiles file
    List,
    /// Show the resolved server spec and policies of a game
    Show { game: String },
    /// Print the first-boot user data script of a game
    UserData {
        game: String,

        /// Escape only the first newline of the unit, like older deployed scripts
        #[arg(long)]
        legacy_escaping: bool,
    },
    /// Derive the stack of a game and hand it to a provisioner
    Synth {
        game: String,

        /// Stack name (default: <Game>Server)
        #[arg(long)]
        stack_name: Option<String>,

        /// Assembly output directory (overrides GAME_STACK_OUT_DIR)
        #[arg(long)]
        out: Option<PathBuf>,

        /// Provisioner to use: assembly or dry-run
        #[arg(long)]
        provisioner: Option<ProvisionerName>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Logs go to stderr; stdout carries command output
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let mut config = AppConfig::from_env();
    if let Some(path) = cli.profiles {
        config.profiles_path = path;
    }

    let profiles = GameProfiles::load(&config.profiles_path)?;

    match cli.command {
        Commands::List => {
            for name in profiles.names() {
                println!("{name}");
            }
        }
        Commands::Show { game } => {
            let spec = profiles.resolve(&game)?;
            print_spec(&spec);
        }
        Commands::UserData {
            game,
            legacy_escaping,
        } => {
            let spec = profiles.resolve(&game)?;
            let escaping = if legacy_escaping {
                UnitEscaping::FirstNewlineOnly
            } else {
                config.settings.unit_escaping
            };
            let staged = match &spec.source {
                InstallSource::UploadedArchive { path } => {
                    Some(asset::stage_archive(path, &config.settings.asset_bucket)?)
                }
                _ => None,
            };
            let script = compose(&spec, &plan_volume(&spec), staged.as_ref(), escaping);
            print!("{}", script.render());
        }
        Commands::Synth {
            game,
            stack_name,
            out,
            provisioner,
        } => {
            let spec = profiles.resolve(&game)?;
            if stack_name.is_some() {
                config.settings.stack_name = stack_name;
            }
            let stack = synthesize(&spec, &config.settings)?;

            let provisioner = select_provisioner(out, provisioner, &config.provisioner)?;

            let provisioned = provisioner.provision(&stack).await?;
            tracing::info!(
                stack = %provisioned.stack_name,
                provisioner = %provisioned.provisioner,
                resources = provisioned.identifiers.len(),
                "stack provisioned"
            );
            for (logical_id, id) in &provisioned.identifiers {
                println!("{logical_id}\t{id}");
            }
            for path in &provisioned.artifacts {
                println!("wrote {}", path.display());
            }
        }
    }

    Ok(())
}

/// An explicit `--provisioner` wins over `GAME_STACK_PROVISIONER`, which is only
/// parsed when it is needed. `--out` applies to the assembly writer alone.
fn select_provisioner(
    out: Option<PathBuf>,
    requested: Option<ProvisionerName>,
    configured: &str,
) -> Result<Arc<dyn Provisioner>, CliError> {
    let name = match requested {
        Some(name) => name,
        None => configured.parse()?,
    };
    match (out, name) {
        (Some(dir), ProvisionerName::Assembly) => Ok(Arc::new(AssemblyWriter::new(dir))),
        (out, name) => {
            if let Some(dir) = out {
                tracing::warn!(
                    out = %dir.display(),
                    provisioner = %name,
                    "--out only applies to the assembly provisioner, ignoring it"
                );
            }
            build_provisioners()
                .get(name)
                .cloned()
                .ok_or(CliError::ProvisionerUnavailable(name))
        }
    }
}

fn print_spec(spec: &ServerSpec) {
    let volume = plan_volume(spec);
    let spot = spot::spot_policy(spec);

    println!("name:          {}", spec.name);
    println!("source:        {:?}", spec.source);
    println!("exec:          {}", spec.exec.render(None));
    let ports: Vec<String> = spec.ports.iter().map(ToString::to_string).collect();
    println!("ports:         {}", ports.join(", "));
    println!("instance type: {}", spec.instance_type);
    println!("volume:        {volume:?}");
    println!("mount paths:   {}", spec.mount_paths.join(", "));
    println!(
        "spot:          {} (interruption: {}, elastic ip: {})",
        spot.enabled, spot.interruption_behavior, spot.reassociate_elastic_ip
    );
}
