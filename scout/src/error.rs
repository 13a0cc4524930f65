//! Error types for the two scout subsystems (ingestion and query execution).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("cannot open PGN file {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot mmap PGN file {path}: {source}")]
    Mmap {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot write database file {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Pgn(#[from] crate::pgn::PgnFault),
}

#[derive(Error, Debug)]
pub enum ScoutError {
    #[error("cannot open database file {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot mmap database file {path}: {source}")]
    Mmap {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid query JSON: {0}")]
    InvalidQuery(#[from] serde_json::Error),
}
