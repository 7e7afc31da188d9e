use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use proxysub_core::output::{ConfigDeployer, FileDeployer};
use proxysub_core::storage::{self, AppConfig, AppPaths};
use proxysub_core::{render_profile, SynthesisError, Template};
use tokio::fs;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "proxysub", author, version, about = "Merge a proxy subscription into a mihomo profile template", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge the subscription into the template and write the profile.
    Build(BuildArgs),
    /// Create the config directories and a default app.yaml.
    Init,
}

#[derive(Args)]
struct BuildArgs {
    /// Template YAML file. Relative paths resolve against the templates directory first.
    #[arg(long)]
    template: Option<PathBuf>,

    /// Subscription YAML file (defaults to ~/.config/proxysub/subs.yaml).
    #[arg(long, short = 's')]
    subscription: Option<PathBuf>,

    /// Output profile path (defaults to ~/.config/proxysub/output/sub.yaml).
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,

    /// Write the profile to stdout instead of a file.
    #[arg(long)]
    stdout: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Build(args) => run_build(args).await?,
        Commands::Init => run_init().await?,
    }

    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
}

async fn run_init() -> anyhow::Result<()> {
    let paths = AppPaths::new()?;
    if storage::init_app_config(&paths).await? {
        println!("wrote {}", paths.app_config_path().display());
    } else {
        println!("{} already exists", paths.app_config_path().display());
    }
    Ok(())
}

async fn run_build(args: BuildArgs) -> anyhow::Result<()> {
    let paths = AppPaths::new()?;
    paths.ensure_runtime_dirs().await?;
    let app_config = storage::load_app_config(&paths)
        .await
        .with_context(|| format!("failed to read {}", paths.app_config_path().display()))?;

    let template_path = args
        .template
        .as_deref()
        .map(|path| paths.resolve_template(path))
        .unwrap_or_else(|| app_config.template_path(&paths));
    let subscription_path = args
        .subscription
        .clone()
        .unwrap_or_else(|| app_config.subscription_path(&paths));

    let template = Template::load(&template_path).await?;
    let subscription_doc = load_subscription(&subscription_path).await?;

    let profile = template.synthesize(&subscription_doc)?;
    let yaml = render_profile(&profile)?;
    info!(
        template = %template_path.display(),
        subscription = %subscription_path.display(),
        proxies = profile.proxies().len(),
        groups = profile.proxy_groups().len(),
        "profile synthesized"
    );

    if args.stdout {
        print!("{yaml}");
        return Ok(());
    }

    let output_path = output_path(&args, &app_config, &paths);
    let deployer = FileDeployer {
        path: output_path.clone(),
    };
    deployer
        .deploy(&yaml)
        .await
        .with_context(|| format!("failed to write profile to {}", output_path.display()))?;
    println!("profile written to {}", output_path.display());

    Ok(())
}

async fn load_subscription(path: &Path) -> anyhow::Result<serde_yaml::Value> {
    let raw = fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read subscription file {}", path.display()))?;
    let doc = serde_yaml::from_str(&raw).map_err(SynthesisError::from)?;
    Ok(doc)
}

fn output_path(args: &BuildArgs, app_config: &AppConfig, paths: &AppPaths) -> PathBuf {
    args.output
        .clone()
        .unwrap_or_else(|| app_config.output_path(paths))
}
