use std::sync::Arc;

use clap::Parser;
use color_eyre::eyre;
use faas_executor::catalog::InMemoryCatalog;
use faas_executor::container_runtime::DockerContainerRuntime;
use faas_executor::queue_client::SqsQueueClient;
use faas_orchestrator::Config;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "faas", about = "Local FaaS control-plane emulator")]
struct Cli {
    #[arg(long, default_value_t = faas_orchestrator::config::DEFAULT_ACCOUNT_NUMBER.to_string())]
    account_number: String,

    #[arg(long, default_value_t = faas_orchestrator::config::DEFAULT_REGION.to_string())]
    region: String,

    #[arg(long, default_value_t = faas_orchestrator::config::DEFAULT_PORT)]
    port: u16,

    #[arg(long = "data-path", default_value_t = faas_orchestrator::config::DEFAULT_DATA_PATH.to_string())]
    data_path: String,

    #[arg(long = "config", default_value_t = faas_orchestrator::config::DEFAULT_DEV_CONFIG.to_string())]
    dev_config_file: String,

    #[arg(long = "sqs-endpoint", default_value_t = faas_orchestrator::config::DEFAULT_SQS_ENDPOINT.to_string())]
    sqs_endpoint: String,

    #[arg(long, default_value_t = faas_orchestrator::config::DEFAULT_NETWORKS.to_string())]
    networks: String,

    #[arg(long, default_value_t = true)]
    local: bool,

    #[arg(long, default_value_t = false)]
    debug: bool,
}

impl From<Cli> for Config {
    fn from(cli: Cli) -> Self {
        Config {
            account_number: cli.account_number,
            region: cli.region,
            port: cli.port,
            data_path: cli.data_path,
            dev_config_file: cli.dev_config_file,
            sqs_endpoint: cli.sqs_endpoint,
            networks: cli.networks.split(',').map(|s| s.trim().to_string()).collect(),
            is_local: cli.local,
            is_debug: cli.debug,
            own_container_name: std::env::var("NAME").ok(),
        }
    }
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    dotenvy::dotenv().ok();
    color_eyre::install()?;

    let cli = Cli::parse();
    let config: Config = cli.into();

    let default_filter = if config.is_debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .init();

    info!(port = config.port, local = config.is_local, "Starting FaaS control plane");

    let catalog = Arc::new(InMemoryCatalog::new());
    let docker_runtime: Arc<dyn faas_executor::container_runtime::ContainerRuntime> =
        Arc::new(DockerContainerRuntime::connect_with_local_defaults()?);
    let queue_client = Arc::new(SqsQueueClient::connect(&config.sqs_endpoint).await);

    let orchestrator = Arc::new(faas_orchestrator::Orchestrator::new(
        config.clone(),
        catalog.clone(),
        docker_runtime,
        queue_client,
    ));

    orchestrator.boot().await?;

    let app_state = faas_gateway::AppState::new(
        catalog,
        orchestrator.artifact_store.clone(),
        orchestrator.supervisor.clone(),
        orchestrator.event_pump.clone(),
        config.account_number.clone(),
        config.region.clone(),
    );

    let app = faas_gateway::build_router(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "Listening");

    let serve_result = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await;

    orchestrator.shutdown().await;

    if let Err(e) = serve_result {
        warn!(error = %e, "HTTP server exited with error");
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
