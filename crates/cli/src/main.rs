mod config;
mod session;

use anyhow::Result;
use clap::{Parser, Subcommand};
use config::Config;
use eulix_checksum::ChangeAction;

#[derive(Parser)]
#[command(name = "eulix")]
#[command(about = "Ask natural-language questions about a codebase", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask a question about the analyzed codebase
    Ask {
        /// The question, in plain English
        question: Vec<String>,

        /// Proceed without confirmation when the tree has drifted
        #[arg(short, long)]
        yes: bool,
    },

    /// Report how much the tree changed since the last analysis
    Status,

    /// Inspect and maintain the response cache
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },
}

#[derive(Subcommand)]
enum CacheCommands {
    /// List cached answers, newest first
    List,
    /// Delete expired entries
    Clean,
    /// Delete entries computed against older tree checksums
    Clear,
    /// Show cache statistics
    Stats,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .target(env_logger::Target::Stderr)
        .init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;

    match cli.command {
        Commands::Ask { question, yes } => ask(&config, &question.join(" "), yes).await,
        Commands::Status => status(&config),
        Commands::Cache { command } => cache(&config, command).await,
    }
}

async fn ask(config: &Config, question: &str, assume_yes: bool) -> Result<()> {
    let mut session = session::start(config, assume_yes).await?;
    let answer = session.router.query(question).await?;
    println!("{answer}");
    Ok(())
}

fn status(config: &Config) -> Result<()> {
    let freshness = session::check_freshness(config)?;

    println!("Project: {}", config.project.path);
    println!(
        "Files: {}  Lines: {}",
        freshness.current.total_files, freshness.current.total_lines
    );
    println!("Tree hash: {}", freshness.current.hash);

    match eulix_kb::load_kb(&session::session_dir(config)) {
        Ok(kb) => println!(
            "Knowledge base: {} files, {} functions, {} classes",
            kb.metadata.total_files, kb.metadata.total_functions, kb.metadata.total_classes
        ),
        Err(e) => log::debug!("Knowledge base not loadable: {e}"),
    }

    match &freshness.stored {
        Some(stored) => {
            println!("Last analyzed: {}", stored.last_analyzed.to_rfc3339());
            println!("Changed since analysis: {:.1}%", freshness.fraction * 100.0);
            match freshness.action {
                ChangeAction::Reuse => println!("Status: fresh"),
                ChangeAction::Warn => {
                    println!("Status: drifting (queries will ask for confirmation)")
                }
                ChangeAction::Refuse => {
                    println!("Status: stale (run `eulix analyze` before querying)")
                }
            }
        }
        None => println!("No stored analysis found (run `eulix analyze`)"),
    }

    Ok(())
}

async fn cache(config: &Config, command: CacheCommands) -> Result<()> {
    let Some(cache) = session::connect_cache(config).await? else {
        println!("Caching is disabled in eulix.toml");
        return Ok(());
    };

    match command {
        CacheCommands::List => {
            let entries = cache.list().await?;
            if entries.is_empty() {
                println!("Cache is empty");
                return Ok(());
            }
            for entry in entries {
                println!(
                    "{}  {}  (expires {})",
                    entry.created_at.format("%Y-%m-%d %H:%M"),
                    entry.query,
                    entry.expires_at.format("%Y-%m-%d %H:%M"),
                );
            }
        }
        CacheCommands::Clean => {
            let deleted = cache.clean_expired()?;
            println!("Removed {deleted} expired entries");
        }
        CacheCommands::Clear => {
            let freshness = session::check_freshness(config)?;
            let deleted = cache.invalidate_by_checksum(&freshness.current.hash)?;
            println!("Removed {deleted} entries from older analyses");
        }
        CacheCommands::Stats => {
            let stats = cache.stats().await?;
            println!("Durable entries: {} total, {} valid", stats.durable_total, stats.durable_valid);
            if stats.fast_enabled {
                println!(
                    "Fast backend: {}",
                    if stats.fast_reachable {
                        "reachable"
                    } else {
                        "unreachable"
                    }
                );
            } else {
                println!("Fast backend: disabled");
            }
        }
    }

    Ok(())
}
