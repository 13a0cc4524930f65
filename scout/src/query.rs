//! Maps a JSON query tree onto a linear rule program: a `Vec<Condition>`
//! where every condition's rule list ends in exactly one terminator
//! (`RuleMatchedCondition` for all but the last condition, which gets
//! `RuleMatchedQuery`; an empty query becomes a single `RuleNone`
//! condition).
//!
//! ```text
//! query     = sequence | streak | condition
//! sequence  = { "sequence": [ condition | streak, ... ] }
//! streak    = { "streak":   [ condition, ... ] }
//! condition = { rule: value, ... }
//! ```

use std::collections::HashSet;

use serde_json::Value;
use thiserror::Error;

use position::{Bitboard, Piece, Side, Square};

use crate::db::GameResult;
use crate::rule::{CastleSide, Imbalance, Rule, ResultType, ScoutMove, SubFen};

#[derive(Debug, Clone, Default)]
pub struct Condition {
    pub rules: Vec<Rule>,
    pub streak_id: u32,
}

#[derive(Debug, Clone)]
pub struct Query {
    pub conditions: Vec<Condition>,
    pub skip: usize,
    pub limit: Option<usize>,
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("invalid sub-fen pattern '{0}'")]
    BadSubFen(String),
    #[error("invalid move constraint '{0}'")]
    BadMove(String),
    #[error("invalid material signature '{0}'")]
    BadMaterial(String),
    #[error("invalid imbalance code '{0}'")]
    BadImbalance(String),
    #[error("unrecognized piece letter '{0}'")]
    BadPieceLetter(char),
}

/// Compiles a JSON query tree into a [`Query`]. Unrecognised rule keys are
/// ignored (spec §4.4/§6); unrecognised values within a recognised key fall
/// through to a no-op for that key (the rule is simply not appended).
pub fn compile(value: &Value) -> Result<Query, QueryError> {
    let skip = value.get("skip").and_then(Value::as_u64).unwrap_or(0) as usize;
    let limit = value.get("limit").and_then(Value::as_u64).map(|n| n as usize);

    let mut conditions = Vec::new();
    let mut next_streak_id = 1u32;
    compile_node(value, 0, &mut conditions, &mut next_streak_id)?;

    if conditions.is_empty() {
        conditions.push(Condition { rules: vec![Rule::None], streak_id: 0 });
    } else if let Some(last) = conditions.last_mut() {
        if let Some(pos) = last.rules.iter().position(|r| matches!(r, Rule::MatchedCondition)) {
            last.rules[pos] = Rule::MatchedQuery;
        }
    }

    Ok(Query { conditions, skip, limit })
}

fn compile_node(
    value: &Value,
    streak_id: u32,
    out: &mut Vec<Condition>,
    next_streak_id: &mut u32,
) -> Result<(), QueryError> {
    if let Some(seq) = value.get("sequence").and_then(Value::as_array) {
        for node in seq {
            compile_node(node, 0, out, next_streak_id)?;
        }
        return Ok(());
    }
    if let Some(streak) = value.get("streak").and_then(Value::as_array) {
        let id = *next_streak_id;
        *next_streak_id += 1;
        for node in streak {
            compile_node(node, id, out, next_streak_id)?;
        }
        return Ok(());
    }
    out.push(compile_condition(value, streak_id)?);
    Ok(())
}

fn compile_condition(value: &Value, streak_id: u32) -> Result<Condition, QueryError> {
    let mut rules = Vec::new();
    let Some(obj) = value.as_object() else {
        rules.push(Rule::MatchedCondition);
        return Ok(Condition { rules, streak_id });
    };

    if let Some(v) = obj.get("result") {
        if let Some(set) = parse_result_set(v) {
            rules.push(Rule::Result(set));
        }
    }
    if let Some(v) = obj.get("result-type") {
        if let Some(rt) = parse_result_type(v) {
            rules.push(Rule::ResultType(rt));
        }
    }
    if let Some(v) = obj.get("sub-fen") {
        let patterns = collect_strings(v).iter().map(|s| parse_subfen(s)).collect::<Result<Vec<_>, _>>()?;
        if !patterns.is_empty() {
            rules.push(Rule::SubFen(patterns));
        }
    }
    if let Some(v) = obj.get("material") {
        let keys = collect_strings(v).iter().map(|s| parse_material(s)).collect::<Result<Vec<_>, _>>()?;
        if !keys.is_empty() {
            rules.push(Rule::Material(keys));
        }
    }
    if let Some(v) = obj.get("imbalance") {
        let codes = collect_strings(v).iter().map(|s| parse_imbalance(s)).collect::<Result<Vec<_>, _>>()?;
        if !codes.is_empty() {
            rules.push(Rule::Imbalance(codes));
        }
    }
    for (key, side) in [("white-move", Side::White), ("black-move", Side::Black)] {
        if let Some(v) = obj.get(key) {
            let moves = collect_strings(v).iter().map(|s| parse_scout_move(s, side)).collect::<Result<Vec<_>, _>>()?;
            if !moves.is_empty() {
                let move_squares = moves.iter().fold(Bitboard::EMPTY, |acc, m| acc | Bitboard::from_square(m.dest));
                rules.push(Rule::Move { moves, move_squares });
            }
        }
    }
    if let Some(v) = obj.get("captured") {
        let letters = collect_strings(v);
        if letters.is_empty() {
            rules.push(Rule::QuietMove);
        } else {
            rules.push(Rule::CapturedPiece(parse_piece_flags(&letters)?));
        }
    }
    if let Some(v) = obj.get("moved") {
        let letters = collect_strings(v);
        if !letters.is_empty() {
            rules.push(Rule::MovedPiece(parse_piece_flags(&letters)?));
        }
    }
    if let Some(v) = obj.get("stm") {
        match v.as_str() {
            Some("white") => rules.push(Rule::White),
            Some("black") => rules.push(Rule::Black),
            _ => {}
        }
    }
    if obj.get("pass").and_then(Value::as_bool) == Some(true) {
        rules.push(Rule::Pass);
    }

    rules.push(Rule::MatchedCondition);
    Ok(Condition { rules, streak_id })
}

fn collect_strings(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => vec![s.clone()],
        Value::Array(items) => items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect(),
        _ => Vec::new(),
    }
}

fn parse_result_set(value: &Value) -> Option<HashSet<GameResult>> {
    let tokens = collect_strings(value);
    if tokens.is_empty() {
        return None;
    }
    Some(tokens.iter().map(|t| GameResult::from_pgn_token(t)).collect())
}

fn parse_result_type(value: &Value) -> Option<ResultType> {
    match value.as_str() {
        Some("mate") => Some(ResultType::Mate),
        Some("stalemate") => Some(ResultType::Stalemate),
        _ => None,
    }
}

/// Parses a sparse board pattern: a bare piece-placement string (`"8/8/8/8/8/1B3N2/8/8"`)
/// or a full FEN (only the first, placement, field is used).
fn parse_subfen(s: &str) -> Result<SubFen, QueryError> {
    let placement = s.split_whitespace().next().unwrap_or(s);
    let mut subfen = SubFen::default();
    let mut rank = 7i32;
    for row in placement.split('/') {
        if rank < 0 {
            return Err(QueryError::BadSubFen(s.to_string()));
        }
        let mut file = 0u8;
        for c in row.chars() {
            if let Some(d) = c.to_digit(10) {
                file += d as u8;
                continue;
            }
            if file >= 8 {
                return Err(QueryError::BadSubFen(s.to_string()));
            }
            let square = (rank as u8) * 8 + file;
            let side = if c.is_ascii_uppercase() { Side::White } else { Side::Black };
            let piece = Piece::try_from(c).map_err(|()| QueryError::BadSubFen(s.to_string()))?;
            match side {
                Side::White => subfen.white_occupied.set(square),
                Side::Black => subfen.black_occupied.set(square),
            }
            subfen.placements.push((piece, side, Bitboard::from_square(square)));
            file += 1;
        }
        rank -= 1;
    }
    Ok(merge_placements(subfen))
}

/// Collapses the one-entry-per-square placements built incrementally above
/// into one bitboard per `(piece, side)`.
fn merge_placements(subfen: SubFen) -> SubFen {
    let mut merged: Vec<(Piece, Side, Bitboard)> = Vec::new();
    for (piece, side, bb) in subfen.placements {
        if let Some(existing) = merged.iter_mut().find(|(p, s, _)| *p == piece && *s == side) {
            existing.2 |= bb;
        } else {
            merged.push((piece, side, bb));
        }
    }
    SubFen {
        white_occupied: subfen.white_occupied,
        black_occupied: subfen.black_occupied,
        placements: merged,
    }
}

/// A material signature string counts piece letters per side the way a FEN
/// placement field's letters do (`'K'`/`'Q'`/... uppercase for white,
/// lowercase for black), independent of square; packed with the same
/// 4-bits-per-piece-per-side scheme as `Position::material_key`.
fn parse_material(s: &str) -> Result<u64, QueryError> {
    let mut counts = [[0u64; 6]; 2];
    for c in s.chars() {
        let side = if c.is_ascii_uppercase() { 0 } else { 1 };
        let piece = Piece::try_from(c).map_err(|()| QueryError::BadMaterial(s.to_string()))?;
        counts[side][piece as usize] += 1;
    }
    let mut key = 0u64;
    let mut shift = 0;
    for side_counts in counts {
        for count in side_counts {
            key |= count.min(15) << shift;
            shift += 4;
        }
    }
    Ok(key)
}

/// `"RBvNP"`: white has an extra rook+bishop, black has an extra knight+pawn.
fn parse_imbalance(s: &str) -> Result<Imbalance, QueryError> {
    let (white_side, black_side) = s.split_once('v').ok_or_else(|| QueryError::BadImbalance(s.to_string()))?;
    let mut non_pawn_material_diff = 0i32;
    let mut pawn_count_diff = 0i32;
    for c in white_side.chars() {
        let piece = Piece::try_from(c).map_err(|()| QueryError::BadImbalance(s.to_string()))?;
        if piece == Piece::Pawn {
            pawn_count_diff += 1;
        } else {
            non_pawn_material_diff += position::non_pawn_value(piece);
        }
    }
    for c in black_side.chars() {
        let piece = Piece::try_from(c).map_err(|()| QueryError::BadImbalance(s.to_string()))?;
        if piece == Piece::Pawn {
            pawn_count_diff -= 1;
        } else {
            non_pawn_material_diff -= position::non_pawn_value(piece);
        }
    }
    Ok(Imbalance { non_pawn_material_diff, pawn_count_diff })
}

fn parse_piece_flags(letters: &[String]) -> Result<u8, QueryError> {
    let mut flags = 0u8;
    for letter in letters {
        let c = letter.chars().next().ok_or_else(|| QueryError::BadPieceLetter(' '))?;
        let piece = Piece::try_from(c).map_err(|()| QueryError::BadPieceLetter(c))?;
        flags |= crate::rule::piece_bit(piece);
    }
    Ok(flags)
}

/// SAN-like move constraint parser (spec §4.4 helper): `O-O`/`O-O-O` for
/// castling, `=X` for promotion, leading piece letter (absent ⇒ pawn),
/// trailing `+`/`#` ignored, a third-from-end file/rank letter/digit for
/// disambiguation.
fn parse_scout_move(raw: &str, side: Side) -> Result<ScoutMove, QueryError> {
    let san = raw.trim_end_matches(['+', '#']);
    if san == "O-O" || san == "O-O-O" {
        let castle_side = if san == "O-O" { CastleSide::Kingside } else { CastleSide::Queenside };
        let rank = if side == Side::White { 0u8 } else { 7u8 };
        let dest = if san == "O-O" { rank * 8 + 6 } else { rank * 8 + 2 };
        return Ok(ScoutMove { piece: Piece::King, dest, disambiguation: None, promotion: None, castle: Some(castle_side) });
    }

    let chars: Vec<char> = san.chars().collect();
    if chars.is_empty() {
        return Err(QueryError::BadMove(raw.to_string()));
    }

    let (piece, body_start) = if chars[0].is_ascii_uppercase() && matches!(chars[0], 'K' | 'Q' | 'R' | 'B' | 'N') {
        (Piece::try_from(chars[0]).map_err(|()| QueryError::BadMove(raw.to_string()))?, 1)
    } else {
        (Piece::Pawn, 0)
    };

    let (body_end, promotion) = match chars.iter().position(|&c| c == '=') {
        Some(eq_idx) => {
            let promo_char = *chars.get(eq_idx + 1).ok_or_else(|| QueryError::BadMove(raw.to_string()))?;
            let promo = Piece::try_from(promo_char).map_err(|()| QueryError::BadMove(raw.to_string()))?;
            (eq_idx, Some(promo))
        }
        None => (chars.len(), None),
    };

    let body: String = chars[body_start..body_end].iter().filter(|&&c| c != 'x').collect();
    if body.len() < 2 {
        return Err(QueryError::BadMove(raw.to_string()));
    }
    let dest_str = &body[body.len() - 2..];
    let dest = Square::try_from(dest_str).map_err(|_| QueryError::BadMove(raw.to_string()))?.index();

    let disambiguation = body[..body.len() - 2].chars().next_back().and_then(|c| {
        if ('a'..='h').contains(&c) {
            Some(1 + (c as u8 - b'a'))
        } else {
            c.to_digit(10).map(|d| 9 + (d as u8 - 1))
        }
    });

    Ok(ScoutMove { piece, dest, disambiguation, promotion, castle: None })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_query_is_rule_none() {
        let q = compile(&serde_json::json!({})).unwrap();
        assert_eq!(q.conditions.len(), 1);
        assert!(matches!(q.conditions[0].rules.as_slice(), [Rule::None]));
    }

    #[test]
    fn single_condition_terminator_is_matched_query() {
        let q = compile(&serde_json::json!({"stm": "white"})).unwrap();
        assert!(matches!(q.conditions[0].rules.last(), Some(Rule::MatchedQuery)));
    }

    #[test]
    fn sequence_assigns_zero_streak_and_rewrites_last_terminator() {
        let q = compile(&serde_json::json!({"sequence": [{"stm": "white"}, {"stm": "black"}]})).unwrap();
        assert_eq!(q.conditions.len(), 2);
        assert_eq!(q.conditions[0].streak_id, 0);
        assert!(matches!(q.conditions[0].rules.last(), Some(Rule::MatchedCondition)));
        assert!(matches!(q.conditions[1].rules.last(), Some(Rule::MatchedQuery)));
    }

    #[test]
    fn streak_members_share_a_positive_id() {
        let q = compile(&serde_json::json!({"streak": [{"stm": "white"}, {"stm": "black"}]})).unwrap();
        assert_eq!(q.conditions[0].streak_id, q.conditions[1].streak_id);
        assert!(q.conditions[0].streak_id > 0);
    }

    #[test]
    fn subfen_parses_bishop_and_knight_squares() {
        let sf = parse_subfen("8/8/8/8/8/1B3N2/8/8").unwrap();
        assert!(sf.white_occupied.contains(position::Square::try_from("b3").unwrap().index()));
        assert!(sf.white_occupied.contains(position::Square::try_from("f3").unwrap().index()));
    }

    #[test]
    fn imbalance_rbvnp_parses_signed_diff() {
        let im = parse_imbalance("RBvNP").unwrap();
        assert_eq!(im.non_pawn_material_diff, 5 + 3 - 3);
        assert_eq!(im.pawn_count_diff, -1);
    }

    #[test]
    fn captured_empty_set_means_quiet_move() {
        let q = compile(&serde_json::json!({"captured": []})).unwrap();
        assert!(q.conditions[0].rules.iter().any(|r| matches!(r, Rule::QuietMove)));
    }

    #[test]
    fn white_move_constraint_parses_destination() {
        let mv = parse_scout_move("Nf3", Side::White).unwrap();
        assert_eq!(mv.piece, Piece::Knight);
        assert_eq!(mv.dest, position::Square::try_from("f3").unwrap().index());
    }

    #[test]
    fn skip_and_limit_are_read_from_top_level() {
        let q = compile(&serde_json::json!({"stm": "white", "skip": 5, "limit": 10})).unwrap();
        assert_eq!(q.skip, 5);
        assert_eq!(q.limit, Some(10));
    }
}
