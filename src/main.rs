use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context};
use clap::Parser;

use quickapp::agent::{AgentConfig, AgentSession, DEFAULT_CONTEXT_WINDOW, DEFAULT_MAX_TOOL_ROUNDS};
use quickapp::cli::ui::{self, CliObserver};
use quickapp::cli::Repl;
use quickapp::llm::{ChatClient, ClientConfig, DEFAULT_BASE_URL, DEFAULT_MODEL};
use quickapp::tools::ToolLimits;
use quickapp::tracing::{init_tracing, shutdown_tracing, LogConfig};

#[derive(Parser, Debug)]
#[command(name = "quickapp", version, about = "AI-powered web app generator")]
struct Args {
    /// Existing app directory to keep working on
    app_dir: Option<PathBuf>,

    /// API key for the chat-completions service
    #[arg(long, env = "MISTRAL_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    #[arg(long, env = "MISTRAL_MODEL", default_value = DEFAULT_MODEL)]
    model: String,

    #[arg(long, env = "MISTRAL_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Directory new apps are created in
    #[arg(long, env = "QUICKAPP_APPS_DIR", default_value = "apps")]
    apps_dir: PathBuf,

    /// Tool-call rounds allowed per request
    #[arg(long, default_value_t = DEFAULT_MAX_TOOL_ROUNDS)]
    max_tool_rounds: usize,

    /// Context window used for the usage bar
    #[arg(long, default_value_t = DEFAULT_CONTEXT_WINDOW)]
    context_window: u64,

    #[arg(long, default_value_t = 30)]
    shell_timeout_secs: u64,

    #[arg(long, default_value_t = 10)]
    search_timeout_secs: u64,

    /// More detailed logs on stderr (overridden by RUST_LOG)
    #[arg(short, long)]
    verbose: bool,

    /// JSON log lines
    #[arg(long)]
    log_json: bool,

    /// OTLP gRPC endpoint for span export
    #[arg(long, env = "OTEL_EXPORTER_OTLP_ENDPOINT")]
    otlp_endpoint: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Values already in the environment win over `.env`
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let log_config = LogConfig {
        verbose: args.verbose,
        json: args.log_json,
        otlp_endpoint: args.otlp_endpoint.clone(),
    };
    init_tracing("quickapp", &log_config).map_err(|e| anyhow!(e))?;

    ui::print_header();
    ui::print_info("Initializing QuickApp...");

    let Some(api_key) = args.api_key.filter(|k| !k.trim().is_empty()) else {
        ui::print_error("MISTRAL_API_KEY not found in environment variables");
        ui::print_info("Set it in your environment or pass --api-key");
        std::process::exit(1);
    };

    let current_app = match args.app_dir {
        Some(dir) if dir.is_dir() => Some(dir),
        Some(dir) => {
            ui::print_error(format!("App directory does not exist: {}", dir.display()));
            std::process::exit(1);
        }
        None => None,
    };

    let client = ChatClient::new(ClientConfig {
        base_url: args.base_url,
        model: args.model,
        ..ClientConfig::new(api_key)
    })
    .context("failed to build HTTP client")?;

    let config = AgentConfig {
        max_tool_rounds: args.max_tool_rounds,
        context_window: args.context_window,
        tool_limits: ToolLimits {
            shell_timeout: Duration::from_secs(args.shell_timeout_secs),
            search_timeout: Duration::from_secs(args.search_timeout_secs),
            ..ToolLimits::default()
        },
        ..AgentConfig::default()
    };

    let session = AgentSession::with_observer(Arc::new(client), config, Arc::new(CliObserver));
    ui::print_success(format!("Initialized agent with model: {}", session.model()));

    let mut repl = Repl::new(session, args.apps_dir, current_app);
    let result = repl.run().await;

    if log_config.otlp_endpoint.is_some() {
        shutdown_tracing();
    }

    result.context("terminal input failed")
}
