//! PGN ingestion pipeline and scout query engine: compiles PGN databases
//! into a compact binary move-stream and executes structured queries over
//! it in parallel.

pub mod aggregator;
pub mod compiler;
pub mod db;
pub mod error;
pub mod pgn;
pub mod query;
pub mod rule;
pub mod scanner;
pub mod token;

use std::fs::File;
use std::io::{BufWriter, Write};
use std::time::Instant;

use memmap2::Mmap;

pub use aggregator::ScoutReport;
pub use compiler::{CompileStats, IngestStats};
pub use error::{IngestError, ScoutError};
pub use query::Query;
pub use scanner::MatchingGame;

/// Result of a `make-db` run: the counters the CLI prints to stderr, plus
/// any per-game warnings (truncated games, bad FENs) to surface.
#[derive(Debug, Default)]
pub struct IngestReport {
    pub stats: IngestStats,
    pub warnings: Vec<String>,
    pub db_path: std::path::PathBuf,
    pub db_size: u64,
    pub elapsed: std::time::Duration,
}

/// Ingests a PGN file, writing `<pgn-base>.bin` next to it.
///
/// The PGN file is memory-mapped and scanned single-threaded (spec §5);
/// ingestion of an empty or all-whitespace file is a valid degenerate run
/// (zero games), not an error.
pub fn ingest(pgn_path: &std::path::Path) -> Result<IngestReport, IngestError> {
    let started = Instant::now();

    let file = File::open(pgn_path).map_err(|source| IngestError::Open {
        path: pgn_path.display().to_string(),
        source,
    })?;
    let mmap = unsafe { Mmap::map(&file) }.map_err(|source| IngestError::Mmap {
        path: pgn_path.display().to_string(),
        source,
    })?;

    let games = pgn::scan(&mmap)?;

    let db_path = pgn_path.with_extension("bin");
    let db_file = File::create(&db_path).map_err(|source| IngestError::Write {
        path: db_path.display().to_string(),
        source,
    })?;
    let mut writer = BufWriter::new(db_file);
    compiler::write_header(&mut writer).map_err(|source| IngestError::Write {
        path: db_path.display().to_string(),
        source,
    })?;

    let mut stats = IngestStats::new();
    let mut warnings = Vec::new();
    for game in &games {
        let (contribution, warning) = compiler::compile_game(game, &mut writer).map_err(|source| IngestError::Write {
            path: db_path.display().to_string(),
            source,
        })?;
        stats.merge(contribution);
        if let Some(w) = warning {
            warnings.push(w);
        }
    }
    writer.flush().map_err(|source| IngestError::Write {
        path: db_path.display().to_string(),
        source,
    })?;
    drop(writer);

    let db_size = std::fs::metadata(&db_path)
        .map_err(|source| IngestError::Write { path: db_path.display().to_string(), source })?
        .len();

    Ok(IngestReport { stats, warnings, db_path, db_size, elapsed: started.elapsed() })
}

/// Runs a compiled query against `<db_path>` using `worker_count` workers
/// and renders the spec §4.7 JSON report.
pub fn run_scout(db_path: &std::path::Path, query: &Query, worker_count: usize) -> Result<ScoutReport, ScoutError> {
    let started = Instant::now();

    let file = File::open(db_path).map_err(|source| ScoutError::Open {
        path: db_path.display().to_string(),
        source,
    })?;
    let mmap = unsafe { Mmap::map(&file) }.map_err(|source| ScoutError::Mmap {
        path: db_path.display().to_string(),
        source,
    })?;

    let (half_moves_scanned, matches) = scanner::scout(&mmap, query, worker_count);
    let elapsed = started.elapsed();

    Ok(aggregator::aggregate(half_moves_scanned, matches, query.skip, query.limit, elapsed))
}
