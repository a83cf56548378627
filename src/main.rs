use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use tokio::io::AsyncWriteExt;
use tracing_subscriber::EnvFilter;

use graphlift::config::Config;
use graphlift::corpus::{FlatFileCorpus, VectorCorpus};
use graphlift::local::UnavailableLocalBuilder;
use graphlift::orchestrator::{BuildOutcome, BuildRequest, RemoteBuildOrchestrator};
use graphlift::service::{BuildService, HttpBuildServiceClient};
use graphlift::staging::{BlobStagingClient, TransferOptions};
use graphlift::storage::BlobStore;
use graphlift::types::{FieldDescriptor, SpaceType};

#[derive(Parser)]
#[command(name = "graphlift", about = "Offload ANN graph builds to a remote build service")]
struct Cli {
    /// Path to a TOML config file
    #[arg(short = 'C', long, value_name = "CONFIG_FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build a graph for a flat vector file
    Build(BuildArgs),
    /// Print the status of a remote build job
    Status {
        job_id: String,
    },
}

#[derive(Args)]
struct BuildArgs {
    /// Flat vector file: [u32 count][u32 dim][f32 * count * dim], little-endian
    #[arg(long)]
    input: PathBuf,

    /// Vector field name
    #[arg(long, default_value = "vector")]
    field: String,

    /// Build unit (segment) identifier
    #[arg(long, default_value = "_0")]
    build_unit: String,

    /// Where to write the graph
    #[arg(long)]
    output: PathBuf,

    #[arg(long, default_value = "l2")]
    space_type: SpaceType,

    #[arg(long, default_value = "faiss")]
    engine: String,
}

#[tokio::main]
async fn main() {
    // Load .env
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let config_path = cli.config.as_ref().map(|p| p.to_string_lossy().into_owned());
    let config = Config::load(config_path.as_deref()).expect("failed to load config");

    // Initialize tracing from LoggingConfig
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .init();
        }
    }

    graphlift::metrics::init();

    let service = Arc::new(
        HttpBuildServiceClient::from_config(&config.build_service)
            .expect("failed to initialize build service client"),
    );

    match cli.command {
        Command::Build(args) => run_build(&config, service, args).await,
        Command::Status { job_id } => {
            let status = service
                .get_status(&job_id)
                .await
                .expect("failed to fetch job status");
            println!(
                "{}",
                serde_json::to_string_pretty(&status).expect("failed to encode status")
            );
        }
    }
}

async fn run_build(config: &Config, service: Arc<HttpBuildServiceClient>, args: BuildArgs) {
    let corpus = FlatFileCorpus::open(&args.input).expect("failed to open vector file");
    tracing::info!(
        input = %args.input.display(),
        vectors = corpus.live_count(),
        dimension = corpus.dimension(),
        "loaded corpus"
    );

    let store = BlobStore::from_config(&config.storage).expect("failed to initialize storage");
    let staging = BlobStagingClient::new(store, TransferOptions::from_config(&config.transfer));
    let orchestrator =
        RemoteBuildOrchestrator::new(staging, service, Arc::new(UnavailableLocalBuilder));

    let field = FieldDescriptor::new(args.field, corpus.dimension())
        .with_space_type(args.space_type)
        .with_engine(args.engine);
    let request = BuildRequest::new(field, args.build_unit, Arc::new(corpus));

    let mut sink = tokio::fs::File::create(&args.output)
        .await
        .expect("failed to create output file");
    let outcome = orchestrator
        .execute(&request, &config.remote_build_settings(), &mut sink)
        .await;
    sink.flush().await.expect("failed to flush output file");
    tracing::debug!(metrics = %graphlift::metrics::render(), "build metrics");

    match outcome {
        Ok(BuildOutcome::Remote(report)) => tracing::info!(
            job_id = %report.job_id,
            bytes = report.bytes_written,
            output = %args.output.display(),
            "graph written"
        ),
        Ok(BuildOutcome::Local { fallback_from }) => tracing::info!(
            fallback_from = ?fallback_from,
            output = %args.output.display(),
            "graph built locally"
        ),
        Err(e) => {
            tracing::error!(error = %e, "build failed");
            std::process::exit(1);
        }
    }
}
