use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use docs_helper_agent::agent::online::OnlineOutcome;
use docs_helper_agent::agent::{HelperAgent, Mode, RunReport};
use docs_helper_agent::core::config::ConfigService;
use docs_helper_agent::core::logging;

const EXIT_COMMANDS: [&str; 3] = ["quit", "exit", "q"];

/// Answer questions about the LangGraph / LangChain documentation.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Question to answer (omit with --interactive)
    question: Option<String>,

    /// offline: local docs with self-correction; online: tools and web search.
    /// Defaults to $AGENT_MODE, then offline
    #[arg(short, long)]
    mode: Option<Mode>,

    /// Path to the YAML config
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(short, long)]
    verbose: bool,

    /// Keep asking questions until quit/exit/q
    #[arg(short, long)]
    interactive: bool,

    /// Print the effective configuration (secrets redacted) and exit
    #[arg(long)]
    show_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let service = ConfigService::resolve(cli.config.as_deref());
    if cli.show_config {
        let raw = service.load_value()?;
        let redacted = service.redact_sensitive_values(&raw);
        println!("# {}", service.config_path().display());
        println!("{}", serde_yaml::to_string(&redacted)?);
        return Ok(());
    }

    let config = service
        .load()
        .with_context(|| format!("Failed to load config from {}", service.config_path().display()))?;
    logging::init(config.logging.log_dir.as_deref(), cli.verbose);

    let mode = Mode::resolve(cli.mode);
    tracing::info!("Starting in {} mode", mode);

    let agent = HelperAgent::from_config(&config)
        .await
        .context("Failed to initialise agent")?;

    if cli.interactive {
        return interactive(&agent, mode).await;
    }

    let question = cli
        .question
        .filter(|q| !q.trim().is_empty())
        .context("A question is required unless --interactive is given")?;
    let report = agent.run(mode, &question).await?;
    print_report(&report);
    Ok(())
}

async fn interactive(agent: &HelperAgent, mode: Mode) -> anyhow::Result<()> {
    println!("Docs helper ({} mode). Type 'quit' to leave.", mode);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("\n> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if EXIT_COMMANDS.contains(&question.to_ascii_lowercase().as_str()) {
            break;
        }

        // One bad question should not end the session.
        match agent.run(mode, question).await {
            Ok(report) => print_report(&report),
            Err(err) => {
                tracing::error!("Run failed: {}", err);
                eprintln!("Error: {}", err);
            }
        }
    }

    Ok(())
}

fn print_report(report: &RunReport) {
    println!("\n{}", report.answer());

    match report {
        RunReport::Offline(result) => {
            if result.retries_used > 0 {
                println!(
                    "\n(Answer refined after {} reformulation(s))",
                    result.retries_used
                );
            }
            if !result.is_grounded {
                println!("\n(Note: this answer may not be fully grounded in the documentation)");
            }
        }
        RunReport::Online(result) => {
            if result.outcome == OnlineOutcome::IterationLimit {
                println!(
                    "\n(Stopped after {} tool rounds without a final answer)",
                    result.iterations
                );
            }
        }
    }
}
