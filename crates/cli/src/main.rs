mod config_commands;
mod extract_commands;
mod process_commands;
mod projector;
mod reference_commands;

use std::{path::PathBuf, time::Duration};

use {
    clap::{Parser, Subcommand, ValueEnum},
    tracing::{debug, info},
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
    tryon_mock_service::{MockBehavior, MockOptions},
};

#[derive(Parser)]
#[command(name = "tryon", about = "tryon: virtual try-on from any shop page", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Custom config directory (overrides default ~/.config/tryon/).
    #[arg(long, global = true, env = "TRYON_CONFIG_DIR")]
    config_dir: Option<PathBuf>,
    /// Custom data directory (holds the cached reference image).
    #[arg(long, global = true, env = "TRYON_DATA_DIR")]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Find the product image on a shop page and try it on.
    Run {
        /// Shop page URL.
        page_url: String,
        /// Use the cached reference image instead of the default model.
        #[arg(long)]
        custom: bool,
        /// Which candidate to use when the page has several (0-based).
        #[arg(long, default_value_t = 0)]
        pick: usize,
        /// Where to write the result image.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Try on a garment image by URL.
    Process {
        garment_url: String,
        #[arg(long)]
        custom: bool,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List candidate product images on a page.
    Extract {
        /// Page URL to fetch. Omit when using --file.
        page_url: Option<String>,
        /// Read HTML from a local file instead of fetching.
        #[arg(long, requires = "base_url", conflicts_with = "page_url")]
        file: Option<PathBuf>,
        /// URL relative image paths in --file are resolved against.
        #[arg(long)]
        base_url: Option<String>,
        /// Print candidates as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Manage the cached reference (model) image.
    Reference {
        #[command(subcommand)]
        action: reference_commands::ReferenceAction,
    },
    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: config_commands::ConfigAction,
    },
    /// Run a local stand-in for the processing service.
    MockServer {
        /// Address to listen on.
        #[arg(long, default_value = "127.0.0.1:8765")]
        bind: String,
        /// Pause between the status frame and the result.
        #[arg(long, default_value_t = 1000)]
        delay_ms: u64,
        /// How the mock answers each request.
        #[arg(long, value_enum, default_value_t = MockMode::Success)]
        behavior: MockMode,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum MockMode {
    Success,
    Error,
    AbnormalClose,
    Malformed,
    Silent,
}

impl From<MockMode> for MockBehavior {
    fn from(mode: MockMode) -> Self {
        match mode {
            MockMode::Success => Self::Success,
            MockMode::Error => Self::ServerError("mock processing failed".into()),
            MockMode::AbnormalClose => Self::AbnormalClose,
            MockMode::Malformed => Self::Malformed,
            MockMode::Silent => Self::Silent,
        }
    }
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

async fn mock_server(bind: &str, delay_ms: u64, behavior: MockMode) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    let addr = listener.local_addr()?;
    eprintln!("Mock processing service at ws://{addr} (Ctrl-C to stop)");
    let options = MockOptions::default()
        .with_behavior(behavior.into())
        .with_delay(Duration::from_millis(delay_ms));
    tokio::select! {
        result = tryon_mock_service::serve(listener, options) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("mock service stopped");
            Ok(())
        },
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    debug!(version = env!("CARGO_PKG_VERSION"), "tryon starting");

    // Directory overrides must land before any config or cache access.
    if let Some(ref dir) = cli.config_dir {
        tryon_config::set_config_dir(dir.clone());
    }
    if let Some(ref dir) = cli.data_dir {
        tryon_config::set_data_dir(dir.clone());
    }

    match cli.command {
        Commands::Run {
            page_url,
            custom,
            pick,
            output,
        } => {
            let config = tryon_config::discover_and_load();
            process_commands::run(&config, &page_url, custom, pick, output).await
        },
        Commands::Process {
            garment_url,
            custom,
            output,
        } => {
            let config = tryon_config::discover_and_load();
            process_commands::process(&config, &garment_url, custom, output).await
        },
        Commands::Extract {
            page_url,
            file,
            base_url,
            json,
        } => {
            let config = tryon_config::discover_and_load();
            extract_commands::handle_extract(&config, page_url, file, base_url, json).await
        },
        Commands::Reference { action } => {
            let config = tryon_config::discover_and_load();
            reference_commands::handle_reference(action, &config).await
        },
        Commands::Config { action } => config_commands::handle_config(action),
        Commands::MockServer {
            bind,
            delay_ms,
            behavior,
        } => mock_server(&bind, delay_ms, behavior).await,
    }
}
