//! IIT JEE Tutor CLI
//!
//! Serves the tutoring API over HTTP, or answers questions interactively in
//! the terminal.

use std::io::Write;
use std::net::SocketAddr;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use futures::StreamExt;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use tutor_orchestrator::{
    create_router, AppState, Config, OpenAiGenerator, ResponseCache, Subject, Tutor,
    TutoringRequest,
};

/// Inputs that end an interactive session.
const QUIT_WORDS: [&str; 5] = ["quit", "exit", "bye", "thanks", "thank you"];

/// IIT JEE Tutor - staged explanations with real-world analogies
#[derive(Parser, Debug)]
#[command(name = "tutor")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API server
    Serve(ServeArgs),
    /// Ask questions interactively in the terminal
    Ask(AskArgs),
}

/// Options shared by every subcommand.
#[derive(Args, Debug)]
struct CommonArgs {
    /// Path to configuration file (default: tutor.json in current directory)
    #[arg(short, long, value_name = "FILE")]
    config: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Args, Debug)]
struct ServeArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Address to bind (overrides config)
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (overrides config)
    #[arg(short, long)]
    port: Option<u16>,
}

#[derive(Args, Debug)]
struct AskArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Subject to study: maths, physics or chemistry
    #[arg(short, long, default_value = "maths")]
    subject: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let verbose = match &cli.command {
        Command::Serve(args) => args.common.verbose,
        Command::Ask(args) => args.common.verbose,
    };

    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Command::Serve(args) => serve(args).await,
        Command::Ask(args) => ask(args).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(1)
        }
    }
}

/// Runs the HTTP server until it fails or is interrupted.
async fn serve(args: ServeArgs) -> anyhow::Result<()> {
    let mut config = load_config(args.common.config.as_deref())?;

    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    // Re-validate after overrides
    config.validate()?;
    print_config(&config);

    let generator = build_generator(&config)?;
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let router = create_router(AppState::from_config(config, generator));

    let listener = TcpListener::bind(&addr).await.map_err(|e| {
        anyhow::anyhow!(
            "Failed to bind to {addr}: {e}\n\nSuggestion: Try a different port with --port"
        )
    })?;

    println!("Tutor API running on http://{addr}");
    println!("Press Ctrl+C to stop");
    tracing::info!(addr = %addr, "HTTP server listening");

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("HTTP server stopped");
    Ok(())
}

/// Interactive question loop on stdin/stdout.
async fn ask(args: AskArgs) -> anyhow::Result<()> {
    let config = load_config(args.common.config.as_deref())?;
    let generator = build_generator(&config)?;
    let tutor = Tutor::new(generator, Arc::new(ResponseCache::new()))
        .with_timeout(config.generation_timeout());

    let subject = Subject::from_input(&args.subject);
    print_welcome(subject);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("\nStudent: ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if is_quit(question) {
            println!("Teacher: Happy learning! Keep exploring {subject}!");
            break;
        }

        let Ok(request) = TutoringRequest::with_subject(question, subject) else {
            continue;
        };

        println!("\nTeacher: Let me explain this step by step...\n");
        let mut chunks = tutor.run_stream(request);
        while let Some(chunk) = chunks.next().await {
            match chunk {
                Ok(text) => {
                    print!("{text}");
                    std::io::stdout().flush()?;
                }
                Err(e) => {
                    tracing::debug!(error = %e, "Question failed");
                    println!("\nTeacher: Sorry, I encountered an error: {e}");
                    println!("Teacher: Please try asking your question again.");
                    break;
                }
            }
        }
        println!();
    }

    let stats = tutor.cache().stats();
    tracing::debug!(hits = stats.hits, misses = stats.misses, "Session cache stats");
    Ok(())
}

/// Returns `true` for inputs that end the session.
fn is_quit(input: &str) -> bool {
    let input = input.to_lowercase();
    QUIT_WORDS.contains(&input.as_str())
}

/// Loads configuration from the given path or the default location.
fn load_config(config_path: Option<&str>) -> anyhow::Result<Config> {
    match config_path {
        Some(path_str) => {
            let path = Path::new(path_str);
            if !path.exists() {
                anyhow::bail!(
                    "Config file not found: '{}'\n\nSuggestion: Check the path or remove the --config flag to use defaults",
                    path.display()
                );
            }
            Config::load_from_file(path).map_err(|e| anyhow::anyhow!("{e}"))
        }
        None => Config::load().map_err(|e| anyhow::anyhow!("{e}")),
    }
}

/// Builds the OpenAI-compatible generator from configuration.
fn build_generator(config: &Config) -> anyhow::Result<Arc<OpenAiGenerator>> {
    let api_key = config.api_key().map_err(|e| anyhow::anyhow!("{e}"))?;
    let generator = OpenAiGenerator::new(config, &api_key);
    tracing::debug!(model = %generator.model(), "Generator ready");
    Ok(Arc::new(generator))
}

/// Prints the loaded configuration.
fn print_config(config: &Config) {
    println!("Configuration loaded:");
    println!("  Model: {}", config.model);
    println!("  API base URL: {}", config.api_base_url);
    println!("  Temperature: {}", config.temperature);
    println!("  Generation timeout: {}s", config.generation_timeout_secs);
    println!(
        "  Rate limit: {} requests/minute",
        config.rate_limit.requests_per_minute
    );
}

/// Prints the session greeting and sample questions.
fn print_welcome(subject: Subject) {
    println!("Teacher: I will be your IIT {} teacher.", subject.display_name());
    println!("Ask any {subject} question and get simple explanations with analogies.");
    println!();
    println!("Sample questions you can ask:");
    for sample in subject.sample_questions() {
        println!("  - {sample}");
    }
    println!();
    println!("Type 'quit' to leave.");
}

/// Resolves when the process receives Ctrl+C.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}
