mod analysis;
mod config;
mod console;
mod persistence;
mod players;
mod progress;
mod session;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use engine::{spawn_oracle, EngineConfig, StockfishOracle};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, fmt::format::FmtSpan, prelude::*, EnvFilter};

use analysis::{Evaluator, RetentionStrategy};
use config::Config;
use console::{Console, OutputFormat};
use persistence::sqlite::{Database, SqlitePersistence};
use session::{OpeningBook, SessionManager};

/// Play chess against Stockfish and track how your play develops.
///
/// Every flag overrides the matching CHESSMENTOR_* environment variable.
#[derive(Parser, Debug)]
#[command(name = "chessmentor", version)]
struct Cli {
    /// Directory holding the database and logs.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Stockfish executable.
    #[arg(long)]
    stockfish: Option<PathBuf>,

    /// Seconds to wait for any single oracle request.
    #[arg(long)]
    oracle_timeout: Option<u64>,

    /// Evaluator depths, "8-12" or "8,10,12".
    #[arg(long)]
    eval_depths: Option<String>,

    /// Which per-depth evaluation is kept.
    #[arg(long)]
    eval_strategy: Option<RetentionStrategy>,

    /// Depth used to classify and rate player moves.
    #[arg(long)]
    analysis_depth: Option<u8>,

    /// Forced oracle replies, e.g. "1:e7e5,3:b8c6".
    #[arg(long)]
    opening_book: Option<OpeningBook>,

    #[arg(long)]
    threads: Option<u32>,

    #[arg(long)]
    hash_mb: Option<u32>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Log to stderr instead of the daily log file.
    #[arg(long)]
    log_stderr: bool,
}

impl Cli {
    fn apply(&self, config: &mut Config) -> anyhow::Result<()> {
        if let Some(dir) = &self.data_dir {
            config.data_dir = dir.clone();
        }
        if let Some(path) = &self.stockfish {
            config.stockfish_path = Some(path.clone());
        }
        if let Some(secs) = self.oracle_timeout {
            anyhow::ensure!(secs > 0, "--oracle-timeout must be positive");
            config.oracle_timeout = Duration::from_secs(secs);
        }
        if let Some(depths) = &self.eval_depths {
            config.eval_depths = config::parse_depths(depths)?;
        }
        if let Some(strategy) = self.eval_strategy {
            config.eval_strategy = strategy;
        }
        if let Some(depth) = self.analysis_depth {
            anyhow::ensure!(depth > 0, "--analysis-depth must be positive");
            config.analysis_depth = depth;
        }
        if let Some(book) = &self.opening_book {
            config.opening_book = book.clone();
        }
        Ok(())
    }
}

fn init_tracing(config: &Config, log_stderr: bool) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // stdout belongs to the console, so logs go elsewhere.
    if log_stderr {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .with(filter)
            .init();
        return Ok(None);
    }

    let log_dir = config.log_dir();
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("creating log directory {}", log_dir.display()))?;
    let file_appender = tracing_appender::rolling::daily(&log_dir, "chessmentor");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true)
                .with_line_number(true)
                .with_span_events(FmtSpan::CLOSE),
        )
        .with(filter)
        .init();
    Ok(Some(guard))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = Config::from_env()?;
    cli.apply(&mut config)?;

    let _guard = init_tracing(&config, cli.log_stderr)?;
    tracing::info!(
        data_dir = %config.data_dir.display(),
        eval_depths = ?config.eval_depths,
        eval_strategy = config.eval_strategy.as_str(),
        analysis_depth = config.analysis_depth,
        book_entries = config.opening_book.len(),
        "Starting chessmentor"
    );

    let db = Database::open(&config.database_path())
        .await
        .with_context(|| format!("opening {}", config.database_path().display()))?;
    let store = Arc::new(SqlitePersistence::from_database(&db));

    let stockfish = StockfishOracle::spawn(EngineConfig {
        path: config.stockfish_path.clone(),
        skill_level: None,
        threads: cli.threads,
        hash_mb: cli.hash_mb,
    })
    .await
    .context("starting Stockfish (set STOCKFISH_PATH or --stockfish)")?;
    let oracle = spawn_oracle(stockfish, config.oracle_timeout);

    let evaluator = Evaluator::spawn(store.clone(), oracle.clone(), config.evaluator());
    let sessions = SessionManager::new(store.clone(), oracle.clone(), evaluator, config.session());
    let mut console = Console::new(store, sessions, cli.format);

    if cli.format == OutputFormat::Text {
        println!("chessmentor: type `help` for commands");
    }
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    console.run(stdin, tokio::io::stdout()).await?;

    oracle.shutdown().await;
    tracing::info!("chessmentor shutting down");
    Ok(())
}
