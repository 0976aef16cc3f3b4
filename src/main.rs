use clap::{Parser, Subcommand};
use messlens::analysis::trends;
use messlens::models::standards::StandardsPolicy;
use messlens::rag::ollama::{OllamaClient, OllamaConfig};
use messlens::rag::{DisabledNarrative, NarrativeService, TextEncoder};
use messlens::{ContinuousMonitor, Monitor, ObservationStore};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "messlens", about = "Directory hygiene monitor", version)]
struct Cli {
    /// Directory to watch
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Path to the observation database
    #[arg(long, default_value = "messlens.db")]
    db: PathBuf,

    /// Standards policy file (JSON); defaults apply when absent
    #[arg(long)]
    config: Option<PathBuf>,

    /// Ollama endpoint
    #[arg(long, default_value = "http://127.0.0.1:11434")]
    ollama: String,

    /// Narrative model
    #[arg(long, default_value = "qwen2.5:latest")]
    model: String,

    /// Embedding model
    #[arg(long, default_value = "nomic-embed-text")]
    embed_model: String,

    /// Skip the model server entirely
    #[arg(long)]
    no_llm: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a single scan cycle
    Scan {
        /// Score at or above which an alert fires
        #[arg(long, default_value_t = 5.0)]
        threshold: f64,
    },
    /// Scan continuously until interrupted
    Monitor {
        /// Seconds between scans
        #[arg(long, default_value_t = 300)]
        interval: u64,
        #[arg(long, default_value_t = 5.0)]
        threshold: f64,
    },
    /// Show recent analysis history
    History {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Show aggregate score statistics
    Stats,
    /// Show the score trend with a sparkline
    Trends {
        /// Days of history to analyze
        #[arg(long, default_value_t = 30)]
        days: i64,
    },
    /// Write a JSON report
    Export {
        #[arg(long, default_value = "messlens-report.json")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> messlens::Result<()> {
    let policy = match &cli.config {
        Some(path) => StandardsPolicy::load(path),
        None => StandardsPolicy::default(),
    };
    let store = ObservationStore::open(&cli.db)?;

    let (narrative, encoder) = backend(&cli).await;
    let monitor = Monitor::new(&cli.root, policy, store, narrative, encoder)?;

    match cli.command {
        Command::Scan { threshold } => {
            let outcome = monitor.scan_and_alert(threshold).await?;
            println!("{}", outcome.message);
            println!("\n{}", outcome.narrative);
        }
        Command::Monitor {
            interval,
            threshold,
        } => {
            let monitor = Arc::new(monitor);
            let scheduler = ContinuousMonitor::new();
            scheduler.start(monitor, Duration::from_secs(interval), threshold);

            // A loop that dies on its own (iteration failure) must exit
            // promptly, not wait for the user to interrupt.
            let mut finished = std::pin::pin!(scheduler.join());
            tokio::select! {
                _ = &mut finished => {}
                result = tokio::signal::ctrl_c() => {
                    result?;
                    log::info!("stopping after the current iteration");
                    scheduler.stop();
                    finished.await;
                }
            }

            if let messlens::MonitorStatus::Failed(message) = scheduler.status() {
                return Err(messlens::MonitorError::Schedule(message));
            }
        }
        Command::History { limit } => {
            for entry in monitor.history(limit)? {
                let alert = match entry.alert {
                    Some(true) => " [ALERT]",
                    _ => "",
                };
                println!(
                    "{}  score {:.1}{}",
                    entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    entry.messiness_score,
                    alert
                );
                if let Some(narrative) = &entry.narrative {
                    for line in narrative.lines().take(3) {
                        println!("    {line}");
                    }
                }
            }
        }
        Command::Stats => {
            let stats = monitor.statistics()?;
            println!("scans: {}", stats.total_scans);
            println!("avg score: {:.2}", stats.avg_score);
            println!("min score: {:.2}", stats.min_score);
            println!("max score: {:.2}", stats.max_score);
        }
        Command::Trends { days } => {
            let (summary, points) = monitor.trend_report(days)?;
            let scores: Vec<f64> = points.iter().map(|p| p.messiness_score).collect();
            println!("{}", trends::sparkline(&scores, 40));
            println!(
                "{} scans over {days} days, avg {:.2} (min {:.2}, max {:.2})",
                summary.total_scans, summary.avg_score, summary.min_score, summary.max_score
            );
            println!(
                "trend: {} (recent {:.2} vs previous {:.2})",
                summary.direction, summary.recent_avg, summary.previous_avg
            );
        }
        Command::Export { output } => {
            let report = monitor.export_report(&output)?;
            println!(
                "wrote {} ({} scans, {} history entries)",
                output.display(),
                report.statistics.total_scans,
                report.recent_history.len()
            );
        }
    }

    Ok(())
}

/// Decide the narrative and encoder backends once, at startup.
async fn backend(cli: &Cli) -> (Box<dyn NarrativeService>, Option<Box<dyn TextEncoder>>) {
    if cli.no_llm {
        return (Box::new(DisabledNarrative), None);
    }

    let client = OllamaClient::new(OllamaConfig {
        endpoint: cli.ollama.clone(),
        chat_model: cli.model.clone(),
        embed_model: cli.embed_model.clone(),
    });

    if client.is_available().await {
        (Box::new(client.clone()), Some(Box::new(client)))
    } else {
        log::warn!(
            "ollama not reachable at {}, narratives and retrieval disabled",
            cli.ollama
        );
        (Box::new(DisabledNarrative), None)
    }
}
