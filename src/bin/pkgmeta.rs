use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use pkgmeta_sync::app::App;
use pkgmeta_sync::blob::{BlobStore, HttpObjectStore, LocalBlobStore};
use pkgmeta_sync::config::{ConfigLoader, ConfigOverrides, ResolvedConfig, StorageMode};
use pkgmeta_sync::domain::{MetadataRecord, PackageName, RepositoryCoordinates};
use pkgmeta_sync::error::SyncError;
use pkgmeta_sync::manifest::Manifest;
use pkgmeta_sync::output::OutputMode;
use pkgmeta_sync::reconcile::Reconciler;
use pkgmeta_sync::registry::{NpmRegistryClient, RegistryClient};
use pkgmeta_sync::store::MetadataStore;
use pkgmeta_sync::topics::{GithubTopicClient, TopicClient};

#[derive(Parser)]
#[command(name = "pkgmeta")]
#[command(about = "Fill in missing npm package metadata from the registry and GitHub topics")]
#[command(version, author)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Fetch metadata for manifest packages missing keywords")]
    Sync(SyncArgs),
    #[command(about = "Summarize the saved metadata store")]
    Status(StatusArgs),
}

#[derive(Args, Clone)]
struct StorageArgs {
    #[arg(long)]
    config: Option<String>,

    #[arg(long, help = "Read and write the store on the local filesystem")]
    local: bool,

    #[arg(long)]
    local_root: Option<String>,

    #[arg(long)]
    bucket: Option<String>,
}

#[derive(Args, Clone)]
struct SyncArgs {
    #[command(flatten)]
    storage: StorageArgs,

    #[arg(long)]
    manifest: PathBuf,

    #[arg(long, help = "Maximum number of missing packages to fetch this run")]
    limit: Option<usize>,

    #[arg(long, conflicts_with = "limit")]
    no_limit: bool,

    #[arg(long, help = "GitHub token (defaults to $GITHUB_TOKEN)")]
    github_token: Option<String>,

    #[arg(long)]
    json: bool,
}

#[derive(Args, Clone)]
struct StatusArgs {
    #[command(flatten)]
    storage: StorageArgs,

    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<SyncError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &SyncError) -> u8 {
    match error {
        SyncError::ManifestRead(_) | SyncError::ConfigRead(_) | SyncError::InvalidConfig(_) => 2,
        SyncError::Filesystem(_)
        | SyncError::ObjectStoreHttp(_)
        | SyncError::ObjectStoreStatus { .. }
        | SyncError::StoreDecode { .. }
        | SyncError::StoreEncode(_) => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Sync(args) => run_sync(args),
        Commands::Status(args) => run_status(args),
    }
}

fn overrides_from(storage: &StorageArgs) -> ConfigOverrides {
    ConfigOverrides {
        local_mode: storage.local,
        local_root: storage.local_root.clone(),
        bucket: storage.bucket.clone(),
        ..ConfigOverrides::default()
    }
}

fn output_mode(json: bool) -> OutputMode {
    if json {
        OutputMode::Json
    } else {
        OutputMode::Log
    }
}

fn run_sync(args: SyncArgs) -> miette::Result<()> {
    let overrides = ConfigOverrides {
        limit: args.limit,
        no_limit: args.no_limit,
        github_token: args.github_token.clone(),
        ..overrides_from(&args.storage)
    };
    let config = ConfigLoader::resolve(args.storage.config.as_deref(), overrides)?;
    if config.github_token.trim().is_empty() {
        warn!("no GitHub token configured, topic lookups will likely fail");
    }

    let manifest = Manifest::load(&args.manifest)?;
    let packages = manifest.unique_packages();

    let registry = NpmRegistryClient::with_base_url(&config.registry_url)?;
    let topics = GithubTopicClient::with_endpoint(&config.topics_url, &config.github_token)?;
    let reconciler = Reconciler::new(registry, topics, config.limit);
    let mode = output_mode(args.json);

    match &config.storage {
        StorageMode::Local { root } => {
            let blobs = LocalBlobStore::new(root.clone());
            sync_with(blobs, reconciler, &config, &packages, mode)
        }
        StorageMode::ObjectStore { endpoint, bucket } => {
            let blobs = HttpObjectStore::new(endpoint, bucket, config.object_store_token.clone())?;
            sync_with(blobs, reconciler, &config, &packages, mode)
        }
    }
}

fn sync_with<B: BlobStore, R: RegistryClient, T: TopicClient>(
    blobs: B,
    reconciler: Reconciler<R, T>,
    config: &ResolvedConfig,
    packages: &std::collections::BTreeSet<PackageName>,
    mode: OutputMode,
) -> miette::Result<()> {
    let store = MetadataStore::new(blobs, &config.source_key, &config.destination_key);
    let app = App::new(store, reconciler);
    let report = app.sync(packages)?;
    mode.emit(&report).into_diagnostic()
}

fn run_status(args: StatusArgs) -> miette::Result<()> {
    let config = ConfigLoader::resolve(args.storage.config.as_deref(), overrides_from(&args.storage))?;
    let mode = output_mode(args.json);
    match &config.storage {
        StorageMode::Local { root } => {
            status_with(LocalBlobStore::new(root.clone()), &config, mode)
        }
        StorageMode::ObjectStore { endpoint, bucket } => {
            let blobs = HttpObjectStore::new(endpoint, bucket, config.object_store_token.clone())?;
            status_with(blobs, &config, mode)
        }
    }
}

fn status_with<B: BlobStore>(
    blobs: B,
    config: &ResolvedConfig,
    mode: OutputMode,
) -> miette::Result<()> {
    let store = MetadataStore::new(blobs, &config.source_key, &config.destination_key);
    let app = App::new(store, Reconciler::new(NopRegistry, NopTopics, Some(0)));
    let status = app.status()?;
    mode.emit(&status).into_diagnostic()
}

struct NopRegistry;
struct NopTopics;

impl RegistryClient for NopRegistry {
    fn fetch_package(&self, _name: &PackageName) -> Result<Option<MetadataRecord>, SyncError> {
        Err(SyncError::RegistryHttp(
            "registry client not configured".to_string(),
        ))
    }
}

impl TopicClient for NopTopics {
    fn fetch_topics(&self, _coords: &RepositoryCoordinates) -> Result<Vec<String>, SyncError> {
        Err(SyncError::TopicsHttp("GitHub client not configured".to_string()))
    }
}
