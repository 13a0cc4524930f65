use std::io::{self, Read};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use colored::Colorize;
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};

static CHECK_MARK: Emoji = Emoji("✅ ", "");
static CROSS_MARK: Emoji = Emoji("❌ ", "");

#[derive(Parser)]
#[command(version, about = "Compiles PGN databases and runs scout queries over them", long_about = None)]
struct Options {
    #[command(subcommand)]
    command: Command,

    /// Worker threads for `scout`; 0 uses all available cores.
    #[arg(long, short = 'j', global = true, default_value_t = 0)]
    threads: usize,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest a PGN file, writing `<pgn-base>.bin` next to it.
    MakeDb {
        pgn_path: PathBuf,
    },
    /// Run a JSON query (read from stdin) against a compiled database.
    Scout {
        db_path: PathBuf,
    },
}

fn main() -> ExitCode {
    let options = Options::parse();

    let result = match &options.command {
        Command::MakeDb { pgn_path } => make_db(pgn_path),
        Command::Scout { db_path } => run_scout(db_path, options.threads),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{CROSS_MARK}{} {err:#}", "error:".red().bold());
            ExitCode::FAILURE
        }
    }
}

fn make_db(pgn_path: &PathBuf) -> anyhow::Result<()> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner} {msg}").unwrap());
    spinner.set_message(format!("ingesting {}", pgn_path.display()));
    spinner.enable_steady_tick(std::time::Duration::from_millis(100));

    let report = scout::ingest(pgn_path);
    spinner.finish_and_clear();
    let report = report?;

    for warning in &report.warnings {
        eprintln!("{} {warning}", "warn:".yellow().bold());
    }

    let secs = report.elapsed.as_secs_f64().max(f64::MIN_POSITIVE);
    let games_per_sec = report.stats.games() as f64 / secs;
    let moves_per_sec = report.stats.moves() as f64 / secs;
    let mb_per_sec = (report.db_size as f64 / (1024.0 * 1024.0)) / secs;

    eprintln!("{CHECK_MARK}{}", "ingestion complete".green().bold());
    eprintln!("  games             : {}", report.stats.games());
    eprintln!("  moves             : {}", report.stats.moves());
    eprintln!("  fixed             : {}", report.stats.fixed());
    eprintln!("  games/sec         : {games_per_sec:.1}");
    eprintln!("  moves/sec         : {moves_per_sec:.1}");
    eprintln!("  MB/sec            : {mb_per_sec:.2}");
    eprintln!("  db path           : {}", report.db_path.display());
    eprintln!("  db size           : {} bytes", report.db_size);
    eprintln!("  elapsed           : {} ms", report.elapsed.as_millis());

    Ok(())
}

fn run_scout(db_path: &PathBuf, threads: usize) -> anyhow::Result<()> {
    let mut input = String::new();
    io::stdin()
        .read_to_string(&mut input)
        .map_err(|source| anyhow::anyhow!("cannot read query from stdin: {source}"))?;

    let json: serde_json::Value = serde_json::from_str(&input)?;
    let query = scout::query::compile(&json)?;

    let worker_count = if threads == 0 { num_cpus() } else { threads };
    let report = scout::run_scout(db_path, &query, worker_count)?;

    println!("{}", report.to_json());
    Ok(())
}

/// Falls back to a single worker if the platform can't report a core count;
/// a correctness-preserving degenerate case, not an error.
fn num_cpus() -> usize {
    std::thread::available_parallelism().map(std::num::NonZeroUsize::get).unwrap_or(1)
}
