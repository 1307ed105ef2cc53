use clap::Parser;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chat_load_test::cli::{run_compare, Cli};
use chat_load_test::config::{self, Config, LogFormat, DEFAULT_MAX_USERS};
use chat_load_test::error::LoadTestError;
use chat_load_test::gateway::HttpChatGateway;
use chat_load_test::harness::{request_timeout_for, LoadTestRequest, RunController};
use chat_load_test::prompts::PromptPool;
use chat_load_test::reporter::{display_summary, write_json_result};
use chat_load_test::server;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli {
        Cli::Serve { config, listen } => run_serve(config.as_deref(), listen.as_deref()).await,
        Cli::Run {
            target,
            users,
            spawn_rate,
            test_time,
            request_timeout,
            prompts,
            output,
        } => {
            run_load_test(
                &target,
                users,
                spawn_rate,
                test_time,
                request_timeout,
                prompts.as_deref(),
                output.as_deref(),
            )
            .await
        }
        Cli::Compare { current, previous } => run_compare(&current, &previous),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn init_tracing(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.log_level.clone()));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    match config.log_format {
        LogFormat::Json => subscriber.json().init(),
        LogFormat::Text => subscriber.init(),
    }
}

/// Set up signal handling for SIGINT/SIGTERM.
/// When a signal is received, sets the given flag.
fn setup_signal_handler(flag: Arc<AtomicBool>) -> Result<(), LoadTestError> {
    ctrlc::set_handler(move || {
        flag.store(true, Ordering::Relaxed);
    })
    .map_err(|e| LoadTestError::ConfigError(format!("Failed to set signal handler: {}", e)))
}

/// Apply a `host:port` listen override to the config.
fn apply_listen_override(cfg: &mut Config, listen: &str) -> Result<(), LoadTestError> {
    let (host, port) = listen.rsplit_once(':').ok_or_else(|| {
        LoadTestError::ConfigError(format!("Invalid listen address '{}'", listen))
    })?;
    if host.is_empty() {
        return Err(LoadTestError::ConfigError(format!(
            "Invalid listen address '{}'",
            listen
        )));
    }
    cfg.listen_host = host.to_string();
    cfg.listen_port = port
        .parse()
        .map_err(|e| LoadTestError::ConfigError(format!("Invalid listen port: {}", e)))?;
    Ok(())
}

async fn run_serve(config_path: Option<&Path>, listen: Option<&str>) -> Result<(), LoadTestError> {
    let mut cfg = match config_path {
        Some(path) => config::load_from_file(path)?,
        None => Config::default(),
    };
    if let Some(listen) = listen {
        apply_listen_override(&mut cfg, listen)?;
    }
    if cfg.llm_endpoint.is_empty() {
        if let Ok(endpoint) = std::env::var("LLM_ENDPOINT") {
            cfg.llm_endpoint = endpoint;
        }
    }
    cfg.validate().map_err(|errors| {
        LoadTestError::ConfigError(format!("Validation errors: {}", errors.join("; ")))
    })?;

    init_tracing(&cfg);

    let shutdown = Arc::new(AtomicBool::new(false));
    setup_signal_handler(shutdown.clone())?;

    server::serve(cfg, shutdown).await
}

async fn run_load_test(
    target: &str,
    users: i64,
    spawn_rate: f64,
    test_time: f64,
    request_timeout: u64,
    prompts_path: Option<&Path>,
    output: Option<&Path>,
) -> Result<(), LoadTestError> {
    let request = LoadTestRequest::try_new(users, spawn_rate, test_time, DEFAULT_MAX_USERS)?;
    let pool = match prompts_path {
        Some(path) => PromptPool::load_from_file(path)?,
        None => PromptPool::default(),
    };

    let timeout = request_timeout_for(&request, request_timeout);
    let gateway = HttpChatGateway::new(target.to_string(), timeout)?;
    let controller = Arc::new(RunController::new(
        request,
        Arc::new(gateway),
        Arc::new(pool),
        timeout,
    ));
    setup_signal_handler(controller.cancel_flag().clone())?;

    let summary = controller.run().await?;
    display_summary(&summary);

    if let Some(output_path) = output {
        write_json_result(&summary, output_path).map_err(|e| {
            LoadTestError::ConfigError(format!("Failed to write result file: {}", e))
        })?;
    }

    Ok(())
}
