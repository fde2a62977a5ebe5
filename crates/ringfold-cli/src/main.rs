mod commands;
mod settings;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use ringfold_pipeline::PipelineError;

#[derive(Parser)]
#[command(
    name = "ringfold",
    about = "Build, version and promote container images across rings"
)]
#[command(version)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Settings shared by every command. Flags win over environment variables,
/// which win over ringfold.toml.
#[derive(Args, Debug)]
pub(crate) struct GlobalArgs {
    /// Project directory (default: nearest ancestor containing ringfold.toml)
    #[arg(short = 'C', long, global = true)]
    directory: Option<PathBuf>,

    /// Ring to operate on (default: the first ring)
    #[arg(long, env = "RING", global = true)]
    ring: Option<String>,

    /// Container registry host
    #[arg(long, env = "REGISTRY", global = true)]
    registry: Option<String>,

    /// Project path inside the registry, e.g. acme/shop
    #[arg(long, env = "PROJECT", global = true)]
    project: Option<String>,

    /// Vendor label for built images
    #[arg(long, env = "VENDOR", global = true)]
    vendor: Option<String>,

    /// Comma-separated ring order, e.g. dev,staging,prod
    #[arg(long, env = "RINGS", value_delimiter = ',', global = true)]
    rings: Vec<String>,

    /// Registry user
    #[arg(long, env = "REGISTRY_USER", global = true)]
    user: Option<String>,

    /// Registry password
    #[arg(long, env = "REGISTRY_PASSWORD", hide_env_values = true, global = true)]
    password: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build changed images and tag them on the ring
    Build {
        /// Rebuild even when nothing changed
        #[arg(long)]
        force: bool,
        /// Bump the major version regardless of the previous ring
        #[arg(long)]
        major: bool,
        /// Decide and report without building
        #[arg(long)]
        dry_run: bool,
        /// Only process these images (repeatable)
        #[arg(long = "image", short = 'i')]
        images: Vec<String>,
    },
    /// Copy ring versions to the next ring
    Shift {
        #[arg(long = "image", short = 'i')]
        images: Vec<String>,
    },
    /// Copy ring versions to the previous ring
    Unshift {
        #[arg(long = "image", short = 'i')]
        images: Vec<String>,
    },
    /// List version and symbolic tags per image (JSON)
    List {
        #[arg(long = "image", short = 'i')]
        images: Vec<String>,
    },
    /// Show the version behind a tag per image (JSON)
    Get {
        /// Tag to resolve instead of the ring
        #[arg(long)]
        version: Option<String>,
        /// Print the full inspect document
        #[arg(long, short = 'v')]
        verbose: bool,
        #[arg(long = "image", short = 'i')]
        images: Vec<String>,
    },
    /// Print the image catalog in build order
    Images,
    /// Point kustomization image tags at the ring's versions
    Update {
        #[arg(long)]
        dry_run: bool,
    },
    /// Run configured and descriptor checks
    Check {
        /// Only run checks with this name
        name: Option<String>,
    },
    /// Log buildah and skopeo in to the registry
    Login,
    /// Replace the deploy pod when the ring has a new version
    Deploy {
        /// Kustomization handed to the deploy pod
        #[arg(long)]
        kustomization: Option<String>,
        /// Deploy image (default: the root image)
        #[arg(long)]
        image: Option<String>,
    },
    /// Log in and deploy in a loop
    Watch {
        /// Minutes between cycles; 0 runs once
        #[arg(long)]
        wait: Option<i64>,
        #[arg(long)]
        kustomization: Option<String>,
        #[arg(long)]
        image: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report(&e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> anyhow::Result<()> {
    let directory = Cli::parse().global.directory;
    let root = settings::project_root(directory.as_deref())?;
    settings::load_dotenv(&root)?;
    // Parsed again so env-backed flags see values from .env.
    let cli = Cli::parse();
    let settings = settings::Settings::resolve(root, &cli.global)?;

    match cli.command {
        Commands::Build {
            force,
            major,
            dry_run,
            images,
        } => commands::build(&settings, force, major, dry_run, images).await?,
        Commands::Shift { images } => {
            commands::promote(&settings, ringfold_core::Shift::Forward, &images).await?
        }
        Commands::Unshift { images } => {
            commands::promote(&settings, ringfold_core::Shift::Backward, &images).await?
        }
        Commands::List { images } => commands::list(&settings, &images).await?,
        Commands::Get {
            version,
            verbose,
            images,
        } => commands::get(&settings, version.as_deref(), verbose, &images).await?,
        Commands::Images => commands::images(&settings)?,
        Commands::Update { dry_run } => commands::update(&settings, dry_run).await?,
        Commands::Check { name } => commands::check(&settings, name.as_deref()).await?,
        Commands::Login => commands::login(&settings).await?,
        Commands::Deploy {
            kustomization,
            image,
        } => commands::deploy(&settings, kustomization, image).await?,
        Commands::Watch {
            wait,
            kustomization,
            image,
        } => commands::watch(&settings, wait, kustomization, image).await?,
    }

    Ok(())
}

/// `error[<kind>]: <message>` followed by the source chain.
fn report(error: &anyhow::Error) {
    let kind = error
        .downcast_ref::<PipelineError>()
        .map_or("error", PipelineError::kind);
    eprintln!("error[{kind}]: {error}");
    for cause in error.chain().skip(1) {
        eprintln!("  caused by: {cause}");
    }
}
