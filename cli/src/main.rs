//! CLI entrypoint for LLM Ensemble
//!
//! This is the main binary that wires together all layers using
//! dependency injection.

use anyhow::{Result, anyhow, bail};
use clap::Parser;
use ensemble_application::{
    EnsembleService, NoQueryLogger, QueryLogger, RouteAndAnswerInput, RunEnsembleInput,
    TimeTravelInput,
};
use ensemble_domain::{Model, Question};
use ensemble_infrastructure::{
    ConfigLoader, FileConfig, JsonlQueryLogger, OpenAiGateway, build_web_search,
};
use ensemble_presentation::{
    AskArgs, AskSpinner, Cli, Command, ConsoleFormatter, OutputFormat, ServeArgs, StreamReporter,
    TimeTravelArgs, create_router,
};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

type Service = EnsembleService<OpenAiGateway>;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.show_config {
        ConfigLoader::print_config_sources(cli.config.as_deref());
        return Ok(());
    }

    let config = if cli.no_config {
        ConfigLoader::load_defaults()
    } else {
        ConfigLoader::load(cli.config.as_deref()).map_err(|e| anyhow!("invalid configuration: {}", e))?
    };

    // Held for the process lifetime so buffered log lines are flushed on exit
    let _log_guard = init_tracing(cli.verbose, config.logging.dir.as_deref());
    info!("Starting LLM Ensemble");

    let Some(command) = cli.command else {
        bail!("No command given. Run with --help for usage.");
    };

    let service = Arc::new(build_service(&config)?);
    match command {
        Command::Serve(args) => serve(service, &config, args).await,
        Command::Ask(args) => ask(&service, args).await,
        Command::TimeTravel(args) => time_travel(&service, args).await,
    }
}

/// Verbosity maps to a default filter; `RUST_LOG` wins when set
fn init_tracing(verbose: u8, log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace", // -vvv or more
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "llm-ensemble.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(file_layer)
        .init();

    guard
}

// === Dependency Injection ===
fn build_service(config: &FileConfig) -> Result<Service> {
    let gateway = Arc::new(OpenAiGateway::from_config(&config.providers.openai)?);

    let web_search = build_web_search(&config.providers);
    if web_search.is_none() {
        info!("Web search disabled: no search provider has an API key");
    }

    let logger: Arc<dyn QueryLogger> = match &config.logging.query_log {
        Some(path) => match JsonlQueryLogger::new(path) {
            Some(logger) => Arc::new(logger),
            None => {
                warn!("Query log {} unavailable, continuing without it", path.display());
                Arc::new(NoQueryLogger)
            }
        },
        None => Arc::new(NoQueryLogger),
    };

    let ensemble_config = config.to_ensemble_config()?;
    Ok(EnsembleService::new(gateway, ensemble_config, web_search, logger)?)
}

async fn serve(service: Arc<Service>, config: &FileConfig, args: ServeArgs) -> Result<()> {
    let mut server = config.server.clone();
    if let Some(host) = args.host {
        server.host = host;
    }
    if let Some(port) = args.port {
        server.port = port;
    }
    let bind_address = server.bind_address();

    let app = create_router(service, &server.cors_origins);
    let listener = TcpListener::bind(&bind_address).await?;
    info!("HTTP API listening on http://{}/api", bind_address);
    eprintln!("Listening on http://{}/api", bind_address);

    // Peer addresses key the per-client rate limit
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");
    Ok(())
}

/// Graceful shutdown on Ctrl+C (and SIGTERM on unix)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, draining connections...");
}

async fn ask(service: &Service, args: AskArgs) -> Result<()> {
    let question = Question::new(args.question.as_str())?;
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    if !args.model.is_empty() {
        // Fixed models bypass the router; merge by default when there is more than one
        let models: Vec<Model> = args.model.iter().map(|s| Model::from(s.as_str())).collect();
        let synthesize = args.synthesis_override().unwrap_or(models.len() > 1);
        let mut input = RunEnsembleInput::new(question, models);
        if synthesize {
            input = input.with_synthesis(service.config().models.synthesis.clone());
        }

        let spinner = AskSpinner::start("Asking models...", args.quiet);
        let result = service.ensemble().execute(input, &cancel).await;
        spinner.finish();
        let result = result?;

        let output = match args.output {
            OutputFormat::Full => ConsoleFormatter::format_ensemble(&result),
            OutputFormat::Answer => ConsoleFormatter::format_ensemble_answer(&result),
            OutputFormat::Json => ConsoleFormatter::format_json(&result),
        };
        println!("{}", output);
        return Ok(());
    }

    let mut input = RouteAndAnswerInput::new(question).with_search(args.search);
    if let Some(force) = args.synthesis_override() {
        input = input.with_force_synthesis(force);
    }

    let spinner = AskSpinner::start("Routing question...", args.quiet);
    let output = service.route_and_answer().execute(input, &cancel).await;
    spinner.finish();
    let output = output?;

    let text = match args.output {
        OutputFormat::Full => ConsoleFormatter::format_routed(&output),
        OutputFormat::Answer => ConsoleFormatter::format_answer(&output),
        OutputFormat::Json => ConsoleFormatter::format_json(&output),
    };
    println!("{}", text);
    Ok(())
}

async fn time_travel(service: &Service, args: TimeTravelArgs) -> Result<()> {
    let question = Question::new(args.question.as_str())?;
    let mut stream = service.stream_time_travel(TimeTravelInput::new(question).forced(args.force))?;
    let reporter = StreamReporter::new();

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut failed = false;
    loop {
        let frame = tokio::select! {
            frame = stream.next_frame() => frame,
            _ = &mut ctrl_c => {
                // Dropping the stream cancels the outstanding calls
                warn!("Interrupted, cancelling time-travel run");
                break;
            }
        };
        let Some(frame) = frame else { break };

        failed |= frame.event.is_terminal() && frame.event.kind() == "error";
        if args.json {
            println!("{}", serde_json::to_string(&frame)?);
        } else {
            reporter.on_event(&frame.event);
        }
    }

    if failed {
        bail!("time-travel run failed");
    }
    Ok(())
}
