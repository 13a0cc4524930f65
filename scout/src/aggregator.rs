//! Applies the global `skip`/`limit` window to a scan's matches and renders
//! the spec's JSON result shape.

use serde::Serialize;

use crate::scanner::MatchingGame;

#[derive(Debug, Serialize)]
struct MatchRecord {
    ofs: u64,
    ply: Vec<u32>,
}

#[derive(Debug, Serialize)]
pub struct ScoutReport {
    moves: u64,
    #[serde(rename = "match count")]
    match_count: usize,
    #[serde(rename = "moves/second")]
    moves_per_second: f64,
    #[serde(rename = "processing time (ms)")]
    processing_time_ms: u128,
    matches: Vec<MatchRecord>,
}

/// Composes `output = all_matches[skip .. skip+limit]` (worker order is
/// preserved by the caller) and renders the aggregate report.
#[must_use]
pub fn aggregate(
    half_moves_scanned: u64,
    matches: Vec<MatchingGame>,
    skip: usize,
    limit: Option<usize>,
    elapsed: std::time::Duration,
) -> ScoutReport {
    let windowed: Vec<MatchRecord> = matches
        .into_iter()
        .skip(skip)
        .take(limit.unwrap_or(usize::MAX))
        .map(|m| MatchRecord { ofs: m.game_offset, ply: m.plies })
        .collect();

    let elapsed_ms = elapsed.as_millis();
    let moves_per_second = if elapsed.as_secs_f64() > 0.0 {
        half_moves_scanned as f64 / elapsed.as_secs_f64()
    } else {
        0.0
    };

    ScoutReport {
        moves: half_moves_scanned,
        match_count: windowed.len(),
        moves_per_second,
        processing_time_ms: elapsed_ms,
        matches: windowed,
    }
}

impl ScoutReport {
    /// Renders the report exactly as the `scout` subcommand prints it on stdout.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("ScoutReport serializes infallibly")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn game(ofs: u64, plies: &[u32]) -> MatchingGame {
        MatchingGame { game_offset: ofs, plies: plies.to_vec() }
    }

    #[test]
    fn skip_and_limit_window_matches() {
        let matches = vec![game(0, &[1]), game(10, &[2]), game(20, &[3]), game(30, &[4])];
        let report = aggregate(100, matches, 1, Some(2), std::time::Duration::from_millis(10));
        assert_eq!(report.match_count, 2);
        assert_eq!(report.matches[0].ofs, 10);
        assert_eq!(report.matches[1].ofs, 20);
    }

    #[test]
    fn no_limit_returns_everything_after_skip() {
        let matches = vec![game(0, &[1]), game(10, &[2])];
        let report = aggregate(50, matches, 1, None, std::time::Duration::from_millis(1));
        assert_eq!(report.match_count, 1);
        assert_eq!(report.matches[0].ofs, 10);
    }

    #[test]
    fn json_shape_uses_spec_key_names() {
        let report = aggregate(10, vec![game(0, &[1])], 0, None, std::time::Duration::from_millis(5));
        let json = report.to_json();
        assert!(json.contains("\"match count\""));
        assert!(json.contains("\"moves/second\""));
        assert!(json.contains("\"processing time (ms)\""));
        assert!(json.contains("\"ofs\":0"));
    }
}
