//! Opcodes evaluated per half-move during a scout replay, and the state
//! machine that drives a [`crate::query::Query`] (sequence/streak
//! contiguity, terminal-rule bookkeeping) across one game's worth of moves.

use std::collections::HashSet;

use position::{Bitboard, Move, Piece, Position, Side};

use crate::db::GameResult;
use crate::query::Query;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultType {
    Mate,
    Stalemate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastleSide {
    Kingside,
    Queenside,
}

/// A sparse board pattern: matches when every listed requirement is a
/// subset of the live position's corresponding occupancy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubFen {
    pub white_occupied: Bitboard,
    pub black_occupied: Bitboard,
    pub placements: Vec<(Piece, Side, Bitboard)>,
}

impl SubFen {
    #[must_use]
    pub fn matches(&self, pos: &Position) -> bool {
        self.white_occupied.is_subset_of(pos.occupied_by(Side::White))
            && self.black_occupied.is_subset_of(pos.occupied_by(Side::Black))
            && self
                .placements
                .iter()
                .all(|(piece, side, bb)| bb.is_subset_of(pos.pieces(*side, *piece)))
    }
}

/// `(non_pawn_material_diff, pawn_count_diff)` relative to white.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Imbalance {
    pub non_pawn_material_diff: i32,
    pub pawn_count_diff: i32,
}

/// A move constraint: piece, destination, optional disambiguation, optional
/// promotion, optional castle-side override.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoutMove {
    pub piece: Piece,
    pub dest: u8,
    /// `1 + file` (1..=8) or `9 + rank` (9..=16); `None` when unambiguous.
    pub disambiguation: Option<u8>,
    pub promotion: Option<Piece>,
    pub castle: Option<CastleSide>,
}

impl ScoutMove {
    #[must_use]
    pub fn matches(&self, pos: &Position, mv: Move) -> bool {
        if let Some(side) = self.castle {
            return match side {
                CastleSide::Kingside => mv.flag().is_castle_kingside(),
                CastleSide::Queenside => mv.flag().is_castle_queenside(),
            };
        }
        if mv.to() != self.dest || mv.flag().promotion_piece() != self.promotion {
            return false;
        }
        let effective_piece = if self.promotion.is_some() { Some(Piece::Pawn) } else { pos.moved_piece() };
        if effective_piece != Some(self.piece) {
            return false;
        }
        let from_file = mv.from() & 7;
        let from_rank = mv.from() >> 3;
        match self.disambiguation {
            Some(d) if d >= 9 => from_rank == d - 9,
            Some(d) if (1..9).contains(&d) => from_file == d - 1,
            _ => true,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Rule {
    None,
    Pass,
    Result(HashSet<GameResult>),
    ResultType(ResultType),
    SubFen(Vec<SubFen>),
    Material(Vec<u64>),
    Imbalance(Vec<Imbalance>),
    Move { moves: Vec<ScoutMove>, move_squares: Bitboard },
    QuietMove,
    CapturedPiece(u8),
    MovedPiece(u8),
    White,
    Black,
    MatchedCondition,
    MatchedQuery,
}

/// Bit assigned to `piece` in a `CapturedPiece`/`MovedPiece` flag mask.
#[must_use]
pub fn piece_bit(piece: Piece) -> u8 {
    1 << (piece as u8)
}

#[must_use]
pub fn current_imbalance(pos: &Position) -> Imbalance {
    let mut non_pawn_material_diff = 0i32;
    for piece in Piece::iter() {
        if piece == Piece::Pawn || piece == Piece::King {
            continue;
        }
        let white = pos.pieces(Side::White, piece).popcount() as i32;
        let black = pos.pieces(Side::Black, piece).popcount() as i32;
        non_pawn_material_diff += position::non_pawn_value(piece) * (white - black);
    }
    let pawn_count_diff =
        pos.pieces(Side::White, Piece::Pawn).popcount() as i32 - pos.pieces(Side::Black, Piece::Pawn).popcount() as i32;
    Imbalance { non_pawn_material_diff, pawn_count_diff }
}

/// Everything a rule needs to know about the half-move just replayed.
pub struct EvalContext<'a> {
    pub pos: &'a Position,
    pub last_move: Option<Move>,
    pub result: GameResult,
    pub ply: u32,
    pub is_last_move: bool,
}

#[must_use]
pub fn evaluate(rule: &Rule, ctx: &EvalContext) -> bool {
    match rule {
        Rule::None => false,
        Rule::Pass => true,
        Rule::Result(set) => set.contains(&ctx.result),
        Rule::ResultType(rt) => {
            ctx.is_last_move
                && ctx.pos.legal().is_empty()
                && match rt {
                    ResultType::Mate => ctx.pos.is_in_check(),
                    ResultType::Stalemate => !ctx.pos.is_in_check(),
                }
        }
        Rule::SubFen(patterns) => patterns.iter().any(|p| p.matches(ctx.pos)),
        Rule::Material(keys) => keys.contains(&ctx.pos.material_key()),
        Rule::Imbalance(list) => {
            let actual = current_imbalance(ctx.pos);
            list.iter().any(|im| *im == actual)
        }
        Rule::Move { moves, move_squares } => match ctx.last_move {
            Some(mv) => move_squares.contains(mv.to()) && moves.iter().any(|sm| sm.matches(ctx.pos, mv)),
            None => false,
        },
        Rule::QuietMove => ctx.pos.captured_piece().is_none(),
        Rule::CapturedPiece(flags) => ctx.pos.captured_piece().is_some_and(|p| flags & piece_bit(p) != 0),
        Rule::MovedPiece(flags) => ctx.pos.moved_piece().is_some_and(|p| flags & piece_bit(p) != 0),
        Rule::White => ctx.pos.side_to_move() == Side::White,
        Rule::Black => ctx.pos.side_to_move() == Side::Black,
        Rule::MatchedCondition | Rule::MatchedQuery => true,
    }
}

/// Drives one [`Query`] across the half-moves of a single game: tracks the
/// active condition, enforces streak contiguity, and records the ply at
/// which each condition (including the final, query-completing one)
/// matched.
pub struct QueryEngine<'q> {
    query: &'q Query,
    condition_idx: usize,
    plies: Vec<u32>,
    result_excluded_at: Option<usize>,
}

impl<'q> QueryEngine<'q> {
    #[must_use]
    pub fn new(query: &'q Query) -> Self {
        Self {
            query,
            condition_idx: 0,
            plies: Vec::new(),
            result_excluded_at: None,
        }
    }

    pub fn reset(&mut self) {
        self.condition_idx = 0;
        self.plies.clear();
        self.result_excluded_at = None;
    }

    /// Feeds one half-move. Returns the recorded plies once the whole query
    /// has matched; the caller should then stop feeding this game. Returns
    /// `None` otherwise, whether because nothing matched or because an
    /// intermediate condition advanced.
    pub fn on_half_move(&mut self, ctx: &EvalContext) -> Option<Vec<u32>> {
        if self.result_excluded_at == Some(self.condition_idx) {
            return None;
        }

        let condition = &self.query.conditions[self.condition_idx];
        if condition.streak_id != 0 {
            if let Some(&last_ply) = self.plies.last() {
                if ctx.ply > last_ply + 1 {
                    self.condition_idx = 0;
                    self.plies.clear();
                    self.result_excluded_at = None;
                }
            }
        }

        let condition = &self.query.conditions[self.condition_idx];
        for rule in &condition.rules {
            match rule {
                Rule::Result(set) if !set.contains(&ctx.result) => {
                    self.result_excluded_at = Some(self.condition_idx);
                    return None;
                }
                Rule::MatchedCondition => {
                    self.plies.push(ctx.ply);
                    self.condition_idx += 1;
                    return None;
                }
                Rule::MatchedQuery => {
                    self.plies.push(ctx.ply);
                    return Some(std::mem::take(&mut self.plies));
                }
                other => {
                    if !evaluate(other, ctx) {
                        return None;
                    }
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query;

    fn engine_matches(query: &Query, moves_and_results: &[(&str, GameResult)]) -> Option<Vec<u32>> {
        let mut pos = Position::default();
        let mut engine = QueryEngine::new(query);
        for (ply, (uci, result)) in moves_and_results.iter().enumerate() {
            let from = position::Square::try_from(&uci[0..2]).unwrap().index();
            let to = position::Square::try_from(&uci[2..4]).unwrap().index();
            let mv = pos.legal().iter().find(|m| m.from() == from && m.to() == to).copied().unwrap();
            pos.do_move(mv);
            let ctx = EvalContext {
                pos: &pos,
                last_move: Some(mv),
                result: *result,
                ply: (ply + 1) as u32,
                is_last_move: ply + 1 == moves_and_results.len(),
            };
            if let Some(plies) = engine.on_half_move(&ctx) {
                return Some(plies);
            }
        }
        None
    }

    #[test]
    fn pass_only_query_matches_first_ply() {
        let query = query::compile(&serde_json::json!({"pass": true})).unwrap();
        let matched = engine_matches(&query, &[("e2e4", GameResult::Unknown)]);
        assert_eq!(matched, Some(vec![1]));
    }

    #[test]
    fn stm_sequence_requires_order() {
        // After White's move it's Black to move (ply 1); after Black's reply
        // it's White to move again (ply 2) -- the two-condition sequence
        // completes without needing the third move at all.
        let q = serde_json::json!({"sequence": [{"stm": "black"}, {"stm": "white"}]});
        let query = query::compile(&q).unwrap();
        let matched = engine_matches(
            &query,
            &[("e2e4", GameResult::Unknown), ("e7e5", GameResult::Unknown), ("g1f3", GameResult::Unknown)],
        );
        assert_eq!(matched, Some(vec![1, 2]));
    }

    #[test]
    fn streak_breaks_on_gap() {
        let q = serde_json::json!({"streak": [{"stm": "black"}, {"stm": "black"}]});
        let query = query::compile(&q).unwrap();
        // ply1 = white to move after, ply2 = black to move after (stm black fails for both
        // consecutively since side flips every ply) -- use a query that can only match two
        // black-to-move ply in a row, which never happens; assert no match.
        let matched = engine_matches(
            &query,
            &[("e2e4", GameResult::Unknown), ("e7e5", GameResult::Unknown), ("g1f3", GameResult::Unknown)],
        );
        assert_eq!(matched, None);
    }
}
