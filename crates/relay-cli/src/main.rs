//! Command-line interface for relay
//!
//! ```bash
//! # Research pipeline against an OpenAI-compatible endpoint
//! export OPENAI_API_BASE="http://localhost:1234/v1"
//! relay run research "fundos imobiliários de logística" --report run.md
//!
//! # Copywriting workers and their host, each in its own terminal
//! relay serve research
//! relay serve content
//! relay serve host
//! relay coordinate "café especial para home office"
//! ```

mod output;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use relay_core::CancellationToken;
use relay_finance::pipelines::{
    CONTENT_PORT, HOST_PORT, RESEARCH_PORT, content_service, fii_advisor_pipeline,
    host_coordinator, host_service, research_pipeline, research_service,
};
use relay_finance::{FiiDataTool, FinanceConfig};
use relay_remote::{RemoteClient, RemoteWorkerService, ServiceConfig};
use relay_runtime::UnitRuntime;
use relay_utils::Settings;
use relay_workflow::{FlowGraph, RunOptions, SequentialPipeline};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "relay")]
#[command(about = "Run multi-stage worker pipelines and remote workers", long_about = None)]
struct Cli {
    /// Log as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a pipeline once and print its events as they happen
    Run {
        pipeline: PipelineKind,
        query: String,
        /// Write a Markdown execution report
        #[arg(long)]
        report: Option<PathBuf>,
        /// Write the event trace as JSON
        #[arg(long)]
        trace: Option<PathBuf>,
        /// Use the scripted echo backend instead of a model
        #[arg(long)]
        offline: bool,
    },
    /// Fetch FII market data directly
    FiiData {
        /// Comma-separated tickers, e.g. HGLG11,KNRI11
        tickers: String,
    },
    /// Serve one of the copywriting workers
    Serve {
        worker: WorkerKind,
        /// Port to bind (defaults to the worker's usual port)
        #[arg(long)]
        port: Option<u16>,
        /// Research worker endpoint (host only)
        #[arg(long, default_value_t = default_endpoint(RESEARCH_PORT, "research_agent"))]
        research_url: String,
        /// Content worker endpoint (host only)
        #[arg(long, default_value_t = default_endpoint(CONTENT_PORT, "content_agent"))]
        content_url: String,
        #[arg(long)]
        offline: bool,
    },
    /// Delegate a briefing to the copywriting workers from this process
    Coordinate {
        query: String,
        #[arg(long, default_value_t = default_endpoint(RESEARCH_PORT, "research_agent"))]
        research_url: String,
        #[arg(long, default_value_t = default_endpoint(CONTENT_PORT, "content_agent"))]
        content_url: String,
    },
    /// Print a pipeline's stage graph
    Flow {
        pipeline: PipelineKind,
        #[arg(long, value_enum, default_value_t = FlowFormat::Mermaid)]
        format: FlowFormat,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum PipelineKind {
    Research,
    Fii,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum WorkerKind {
    Research,
    Content,
    Host,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FlowFormat {
    Dot,
    Mermaid,
}

fn default_endpoint(port: u16, path: &str) -> String {
    format!("http://localhost:{port}/{path}")
}

fn runtime(settings: &Settings, offline: bool) -> Result<UnitRuntime> {
    if offline {
        info!("using scripted offline backend");
        return Ok(UnitRuntime::offline());
    }
    Ok(UnitRuntime::from_settings(settings)?)
}

fn build_pipeline(kind: PipelineKind, runtime: &UnitRuntime) -> Result<SequentialPipeline> {
    let pipeline = match kind {
        PipelineKind::Research => research_pipeline(runtime)?,
        PipelineKind::Fii => {
            let tool = FiiDataTool::yahoo(FinanceConfig::default())?;
            fii_advisor_pipeline(runtime, Arc::new(tool))?
        }
    };
    Ok(pipeline)
}

/// Cancelled on Ctrl-C
fn shutdown_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received; shutting down");
            trigger.cancel();
        }
    });
    token
}

async fn run_pipeline(
    settings: &Settings,
    kind: PipelineKind,
    query: &str,
    report: Option<PathBuf>,
    trace: Option<PathBuf>,
    offline: bool,
) -> Result<()> {
    let runtime = runtime(settings, offline)?;
    let pipeline = build_pipeline(kind, &runtime)?;

    let options = RunOptions::new()
        .with_cancel(shutdown_on_ctrl_c())
        .with_tap(output::print_event);
    let run = pipeline.run_with(query, options).await;

    println!("\n{}", output::run_table(&run));
    println!("\nStatus: {}", run.status);
    if let Some(failure) = &run.failure {
        println!("{failure}");
    }
    if run.is_completed() {
        println!("\n{}", run.output_text());
    }

    if let Some(path) = report {
        output::write_report(&path, &run)?;
        println!("\nReport written to {}", path.display());
    }
    if let Some(path) = trace {
        let json = relay_trace::render_json(&run.trace())?;
        std::fs::write(&path, json).with_context(|| format!("writing trace to {}", path.display()))?;
    }
    Ok(())
}

async fn serve(
    settings: &Settings,
    worker: WorkerKind,
    port: Option<u16>,
    research_url: &str,
    content_url: &str,
    offline: bool,
) -> Result<()> {
    let (default_port, path) = match worker {
        WorkerKind::Research => (RESEARCH_PORT, "research_agent"),
        WorkerKind::Content => (CONTENT_PORT, "content_agent"),
        WorkerKind::Host => (HOST_PORT, "copywriter_host"),
    };
    let port = port.unwrap_or(default_port);
    let base_url = format!("http://{}:{port}", settings.host);
    let config = ServiceConfig::from_settings(path, settings);

    let service: RemoteWorkerService = match worker {
        WorkerKind::Research => research_service(&runtime(settings, offline)?, &base_url, config)?,
        WorkerKind::Content => content_service(&runtime(settings, offline)?, &base_url, config)?,
        WorkerKind::Host => {
            let client = RemoteClient::from_settings(settings)?;
            let coordinator = host_coordinator(client, research_url, content_url).await?;
            host_service(coordinator, &base_url, config)?
        }
    };

    println!("{} listening on {base_url}/{path}", service.card().name);
    service
        .bind(&format!("{}:{port}", settings.host), shutdown_on_ctrl_c())
        .await?;
    Ok(())
}

async fn coordinate(settings: &Settings, query: &str, research_url: &str, content_url: &str) -> Result<()> {
    let client = RemoteClient::from_settings(settings)?;
    let coordinator = host_coordinator(client, research_url, content_url).await?;
    let cancel = shutdown_on_ctrl_c();

    let outcome = coordinator.run_with(query, None, &cancel, None).await?;
    println!("{}", outcome.render());
    if outcome.is_partial_failure() {
        println!(
            "\n{} of {} subtasks completed",
            outcome.completed(),
            outcome.sections.len()
        );
    }
    Ok(())
}

async fn fii_data(tickers: &str) -> Result<()> {
    let tool = FiiDataTool::yahoo(FinanceConfig::default())?;
    let data = tool.fetch(tickers).await;
    println!("{}", output::fii_table(&data));
    Ok(())
}

fn flow(kind: PipelineKind, format: FlowFormat) -> Result<()> {
    let pipeline = build_pipeline(kind, &UnitRuntime::offline())?;
    let graph = FlowGraph::from_pipeline(&pipeline);
    match format {
        FlowFormat::Dot => println!("{}", graph.to_dot()),
        FlowFormat::Mermaid => println!("{}", graph.to_mermaid()),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    if cli.json_logs {
        relay_utils::init_tracing_json();
    } else {
        relay_utils::init_tracing();
    }

    let settings = Settings::from_env().context("reading settings from the environment")?;

    match cli.command {
        Command::Run {
            pipeline,
            query,
            report,
            trace,
            offline,
        } => run_pipeline(&settings, pipeline, &query, report, trace, offline).await,
        Command::FiiData { tickers } => fii_data(&tickers).await,
        Command::Serve {
            worker,
            port,
            research_url,
            content_url,
            offline,
        } => serve(&settings, worker, port, &research_url, &content_url, offline).await,
        Command::Coordinate {
            query,
            research_url,
            content_url,
        } => coordinate(&settings, &query, &research_url, &content_url).await,
        Command::Flow { pipeline, format } => flow(pipeline, format),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run() {
        let cli = Cli::parse_from(["relay", "run", "fii", "FIIs de logística", "--offline", "--report", "r.md"]);
        match cli.command {
            Command::Run {
                pipeline: PipelineKind::Fii,
                offline: true,
                report: Some(path),
                ..
            } => assert_eq!(path, PathBuf::from("r.md")),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_serve_defaults() {
        let cli = Cli::parse_from(["relay", "serve", "host"]);
        match cli.command {
            Command::Serve {
                worker: WorkerKind::Host,
                port: None,
                research_url,
                content_url,
                ..
            } => {
                assert_eq!(research_url, "http://localhost:11000/research_agent");
                assert_eq!(content_url, "http://localhost:12000/content_agent");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_flow_research() {
        let pipeline = build_pipeline(PipelineKind::Research, &UnitRuntime::offline()).unwrap();
        let mermaid = FlowGraph::from_pipeline(&pipeline).to_mermaid();
        assert!(mermaid.contains("-->|entidade|"));
    }
}
