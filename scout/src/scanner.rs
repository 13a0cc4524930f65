//! Shards a compiled database across a worker pool, aligns each shard to a
//! genuine game boundary, and replays+evaluates a [`Query`] over every
//! half-move.

use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;

use position::{Move, Position};

use crate::db;
use crate::query::Query;
use crate::rule::{EvalContext, QueryEngine};

#[derive(Debug, Clone)]
pub struct MatchingGame {
    pub game_offset: u64,
    pub plies: Vec<u32>,
}

#[derive(Debug, Default, Clone)]
pub struct WorkerResult {
    pub matches: Vec<MatchingGame>,
    pub half_moves_scanned: u64,
}

fn read_move_at(data: &[u8], pos: usize) -> Move {
    db::read_move([data[pos], data[pos + 1]])
}

fn find_move_none(data: &[u8], from: usize) -> Option<usize> {
    let mut i = from - from % db::MOVE_SIZE;
    while i + db::MOVE_SIZE <= data.len() {
        if db::is_separator(read_move_at(data, i)) {
            return Some(i);
        }
        i += db::MOVE_SIZE;
    }
    None
}

/// Boundary-alignment procedure (spec §4.6): scan forward to the first
/// `MOVE_NONE`, back up four Move slots, and rescan forward from there.
/// Either the first hit was a real separator (the rescan lands on the same
/// one) or it was a byte pattern inside a game-offset field that happened
/// to look like `MOVE_NONE` (the rescan finds the real separator earlier).
/// Returns the byte offset just past a genuine separator, or `data.len()`
/// if none exists at or after `start`.
#[must_use]
pub fn align_to_game_boundary(data: &[u8], start: usize) -> usize {
    let Some(p) = find_move_none(data, start.min(data.len())) else {
        return data.len();
    };
    let back = p.saturating_sub(db::OFFSET_SLOTS * db::MOVE_SIZE);
    match find_move_none(data, back) {
        Some(p2) => p2 + db::MOVE_SIZE,
        None => p + db::MOVE_SIZE,
    }
}

/// Divides `total_len` bytes into `worker_count` equal byte ranges; the
/// last worker absorbs the remainder.
#[must_use]
pub fn shard_ranges(total_len: usize, worker_count: usize) -> Vec<(usize, usize)> {
    if worker_count == 0 {
        return vec![(0, total_len)];
    }
    let chunk = total_len / worker_count;
    let mut ranges = Vec::with_capacity(worker_count);
    let mut start = 0;
    for i in 0..worker_count {
        let end = if i + 1 == worker_count { total_len } else { start + chunk };
        ranges.push((start, end));
        start = end;
    }
    ranges
}

/// Replays every whole game record starting at or after `start` up to
/// `end`; the last game straddling `end` is always completed (a worker
/// never stops mid-game). `matches_found`/`stop_after` implement the
/// best-effort early-termination in spec §5: once the shared match count
/// reaches the query's `skip + limit`, this worker truncates its own
/// remaining range after finishing its current game.
pub fn scan_range(
    data: &[u8],
    start: usize,
    end: usize,
    query: &Query,
    matches_found: &AtomicUsize,
    stop_after: Option<usize>,
) -> WorkerResult {
    let mut result = WorkerResult::default();
    let mut cursor = align_to_game_boundary(data, start);
    let mut local_end = end;
    let record_min_size = db::MOVE_SIZE * (db::OFFSET_SLOTS + 1);

    while cursor < local_end && cursor + record_min_size <= data.len() {
        let offset_slots: [Move; db::OFFSET_SLOTS] =
            std::array::from_fn(|i| read_move_at(data, cursor + i * db::MOVE_SIZE));
        let game_offset = db::decode_offset(&offset_slots);
        cursor += db::OFFSET_SLOTS * db::MOVE_SIZE;

        let game_result = db::decode_result(read_move_at(data, cursor));
        cursor += db::MOVE_SIZE;

        let mut pos = Position::default();
        let mut engine = QueryEngine::new(query);
        let mut ply = 0u32;
        let mut matched_plies = None;

        loop {
            let mv = read_move_at(data, cursor);
            cursor += db::MOVE_SIZE;
            if db::is_separator(mv) {
                break;
            }
            pos.do_move(mv);
            ply += 1;
            result.half_moves_scanned += 1;

            if matched_plies.is_none() {
                let is_last_move =
                    cursor + db::MOVE_SIZE <= data.len() && db::is_separator(read_move_at(data, cursor));
                let ctx = EvalContext {
                    pos: &pos,
                    last_move: Some(mv),
                    result: game_result,
                    ply,
                    is_last_move,
                };
                if let Some(plies) = engine.on_half_move(&ctx) {
                    matched_plies = Some(plies);
                }
            }
        }

        if let Some(plies) = matched_plies {
            result.matches.push(MatchingGame { game_offset, plies });
            let total = matches_found.fetch_add(1, Ordering::Relaxed) + 1;
            if let Some(target) = stop_after {
                if total >= target {
                    local_end = cursor.min(local_end);
                }
            }
        }

        if cursor >= local_end {
            break;
        }
    }

    result
}

/// Runs `query` over the whole compiled database, sharded across
/// `worker_count` workers via rayon, and merges per-worker matches in
/// deterministic shard order (spec §4.7's `skip`/`limit` composition
/// expects worker order).
#[must_use]
pub fn scout(data: &[u8], query: &Query, worker_count: usize) -> (u64, Vec<MatchingGame>) {
    let ranges = shard_ranges(data.len(), worker_count.max(1));
    let matches_found = AtomicUsize::new(0);
    let stop_after = query.limit.map(|limit| query.skip + limit);

    let per_worker: Vec<WorkerResult> = ranges
        .par_iter()
        .map(|&(start, end)| scan_range(data, start, end, query, &matches_found, stop_after))
        .collect();

    let mut half_moves_scanned = 0u64;
    let mut matches = Vec::new();
    for worker in per_worker {
        half_moves_scanned += worker.half_moves_scanned;
        matches.extend(worker.matches);
    }

    (half_moves_scanned, matches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler;
    use crate::pgn::RawGame;

    fn sample_db() -> Vec<u8> {
        let mut buf = Vec::new();
        compiler::write_header(&mut buf).unwrap();
        let games = [
            RawGame { pgn_offset: 0, fen: None, sans: vec!["e4".into(), "e5".into()], result: "1/2-1/2".into() },
            RawGame { pgn_offset: 20, fen: None, sans: vec!["d4".into(), "d5".into(), "c4".into()], result: "1-0".into() },
        ];
        for g in &games {
            compiler::compile_game(g, &mut buf).unwrap();
        }
        buf
    }

    #[test]
    fn align_at_zero_lands_just_past_leading_separator() {
        let db = sample_db();
        assert_eq!(align_to_game_boundary(&db, 0), db::MOVE_SIZE);
    }

    #[test]
    fn shard_ranges_cover_whole_file_without_gaps() {
        let ranges = shard_ranges(100, 3);
        assert_eq!(ranges[0].0, 0);
        assert_eq!(ranges.last().unwrap().1, 100);
        for w in ranges.windows(2) {
            assert_eq!(w[0].1, w[1].0);
        }
    }

    #[test]
    fn single_worker_scans_every_half_move() {
        let db = sample_db();
        let query = crate::query::compile(&serde_json::json!({"pass": true})).unwrap();
        let (moves, matches) = scout(&db, &query, 1);
        assert_eq!(moves, 5);
        assert_eq!(matches.len(), 2);
    }

    #[test]
    fn sharding_equivalence_one_vs_many_workers() {
        let db = sample_db();
        let query = crate::query::compile(&serde_json::json!({"pass": true})).unwrap();
        let (_, one) = scout(&db, &query, 1);
        let (_, many) = scout(&db, &query, 4);
        let mut one_offsets: Vec<u64> = one.iter().map(|m| m.game_offset).collect();
        let mut many_offsets: Vec<u64> = many.iter().map(|m| m.game_offset).collect();
        one_offsets.sort_unstable();
        many_offsets.sort_unstable();
        assert_eq!(one_offsets, many_offsets);
    }
}
