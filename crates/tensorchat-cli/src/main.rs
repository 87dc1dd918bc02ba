mod config;

use clap::{Args, Parser, Subcommand};
use config::ClientOverrides;
use std::path::PathBuf;
use tensorchat_core::{StreamRequest, TensorConfig};
use tensorchat_stream::{
    create_streaming_manager, ProcessOutput, SessionOutcome, StreamCallbacks,
    TensorchatStreamingManager,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tensorchat", about = "Tensorchat multi-tensor streaming client")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "tensorchat.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stream every tensor live, printing chunks as they arrive
    Stream(RequestArgs),
    /// Run the request to completion and print the collected results
    Collect(RequestArgs),
}

#[derive(Args)]
struct RequestArgs {
    /// Prompt for one tensor; repeat for several tensors
    #[arg(short = 'm', long = "message", required = true)]
    messages: Vec<String>,
    /// Shared context (overrides config)
    #[arg(long)]
    context: Option<String>,
    /// Model identifier (overrides config)
    #[arg(long)]
    model: Option<String>,
    /// Ask for concise answers
    #[arg(long)]
    concise: bool,
    /// Run a web search for every tensor
    #[arg(long)]
    search: bool,
    /// Chunk callback coalescing window, 0 to disable (overrides config)
    #[arg(long)]
    throttle_ms: Option<u64>,
    /// Log session diagnostics
    #[arg(short, long)]
    verbose: bool,
}

impl RequestArgs {
    fn overrides(&self) -> ClientOverrides {
        ClientOverrides {
            throttle_ms: self.throttle_ms,
            verbose: self.verbose,
        }
    }

    fn build(&self, defaults: &config::RequestDefaults) -> StreamRequest {
        let tensors = self.messages.iter().map(|m| {
            let mut tensor = TensorConfig::new(m.as_str());
            if self.concise {
                tensor = tensor.concise(true);
            }
            if self.search {
                tensor = tensor.search(true);
            }
            tensor
        });
        StreamRequest::new(
            self.context.clone().unwrap_or_else(|| defaults.context.clone()),
            self.model.clone().unwrap_or_else(|| defaults.model.clone()),
        )
        .tensors(tensors)
    }
}

/// Per-run character statistics over the collected tensors.
#[derive(Debug, PartialEq)]
struct Summary {
    tensors: usize,
    failed: usize,
    total_chars: usize,
    average_chars: usize,
}

impl Summary {
    fn of(output: &ProcessOutput) -> Self {
        let total_chars: usize = output
            .tensors
            .iter()
            .map(|t| t.content.chars().count())
            .sum();
        let tensors = output.tensors.len();
        Self {
            tensors,
            failed: output.errors.len(),
            total_chars,
            average_chars: total_chars.checked_div(tensors).unwrap_or(0),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine; real environment variables still apply.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .json()
        .init();

    let cli = Cli::parse();
    let file = config::load(&cli.config).await?;

    match cli.command {
        Commands::Stream(args) => {
            let client = config::resolve_client(file.client, args.overrides())?;
            let request = args.build(&file.request);
            let manager = create_streaming_manager(client)?;
            run_stream(&manager, &request).await?;
        }
        Commands::Collect(args) => {
            let client = config::resolve_client(file.client, args.overrides())?;
            let request = args.build(&file.request);
            let manager = create_streaming_manager(client)?;
            run_collect(&manager, &request).await?;
        }
    }

    Ok(())
}

async fn run_stream(
    manager: &TensorchatStreamingManager,
    request: &StreamRequest,
) -> anyhow::Result<()> {
    info!(tensors = request.tensors.len(), model = %request.model, "Starting stream");

    let callbacks = StreamCallbacks::new()
        .on_start(|s| {
            println!(
                "Processing {} tensor(s) with {}{}",
                s.total_tensors.unwrap_or_default(),
                s.model.as_deref().unwrap_or("default model"),
                if s.search_applied == Some(true) { " (search applied)" } else { "" }
            );
        })
        .on_search_progress(|u| println!("[{}] searching...", u.index))
        .on_search_complete(|u| println!("[{}] search complete", u.index))
        .on_tensor_chunk(|c| {
            println!("[{}] {}", c.index, c.chunk);
        })
        .on_tensor_complete(|t| {
            println!("[{}] done, {} chars", t.index, t.content.chars().count());
        })
        .on_tensor_error(|f| {
            eprintln!(
                "[{}] failed: {}",
                f.index,
                f.error.as_deref().unwrap_or("unknown error")
            );
        })
        .on_complete(|c| {
            if let Some(total) = c.total_tensors {
                println!("All {total} tensor(s) finished");
            }
        })
        .on_error(|e| eprintln!("Stream failed: {e}"));

    tokio::select! {
        outcome = manager.stream_process(request, callbacks) => {
            if outcome? == SessionOutcome::Exhausted {
                warn!("Stream ended without a complete event");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            manager.destroy();
            info!("Interrupted");
        }
    }
    Ok(())
}

async fn run_collect(
    manager: &TensorchatStreamingManager,
    request: &StreamRequest,
) -> anyhow::Result<()> {
    info!(tensors = request.tensors.len(), model = %request.model, "Collecting results");

    let output = manager.process_single(request).await?;
    for tensor in &output.tensors {
        println!("=== Tensor {} ===", tensor.index);
        println!("{}", tensor.content);
        println!();
    }
    for failure in &output.errors {
        println!(
            "=== Tensor {} failed: {} ===",
            failure.index,
            failure.error.as_deref().unwrap_or("unknown error")
        );
    }

    let summary = Summary::of(&output);
    println!("Tensors completed: {}", summary.tensors);
    if summary.failed > 0 {
        println!("Tensors failed:    {}", summary.failed);
    }
    println!("Total characters:  {}", summary.total_chars);
    println!("Average per tensor: {}", summary.average_chars);
    Ok(())
}
