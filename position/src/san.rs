use thiserror::Error;

use crate::board::Position;
use crate::moves::{Move, MOVE_NULL};
use crate::piece::Piece;
use crate::square::Square;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SanError {
    #[error("empty SAN token")]
    Empty,
    #[error("malformed SAN token '{0}'")]
    Malformed(String),
    #[error("no legal move matches SAN token '{0}'")]
    NoMatch(String),
    #[error("SAN token '{0}' is ambiguous among legal moves")]
    Ambiguous(String),
}

/// Resolves a single SAN token (as it appears in PGN movetext) against the
/// position's legal moves. Trailing check/mate/annotation glyphs (`+ # ! ?`)
/// are ignored. `O-O`/`0-0`, `O-O-O`/`0-0-0` and the null move `--` are
/// recognized.
pub fn san_to_move(pos: &Position, raw: &str) -> Result<Move, SanError> {
    san_to_move_fixed(pos, raw).map(|(mv, _fixed)| mv)
}

/// As [`san_to_move`], but also reports whether resolving this token
/// required the king-safety filter to break a disambiguation tie that the
/// SAN text itself left open (more than one piece of the stated type could
/// reach the destination square; only one survived the legality check).
pub fn san_to_move_fixed(pos: &Position, raw: &str) -> Result<(Move, bool), SanError> {
    let san = raw.trim_end_matches(['+', '#', '!', '?']);
    if san.is_empty() {
        return Err(SanError::Empty);
    }

    if san == "O-O" || san == "0-0" {
        return pos
            .legal()
            .iter()
            .find(|m| m.flag().is_castle_kingside())
            .copied()
            .map(|mv| (mv, false))
            .ok_or_else(|| SanError::NoMatch(raw.to_string()));
    }
    if san == "O-O-O" || san == "0-0-0" {
        return pos
            .legal()
            .iter()
            .find(|m| m.flag().is_castle_queenside())
            .copied()
            .map(|mv| (mv, false))
            .ok_or_else(|| SanError::NoMatch(raw.to_string()));
    }
    if san == "--" || san == "Z0" {
        return Ok((MOVE_NULL, false));
    }

    let chars: Vec<char> = san.chars().collect();

    let (piece, body_start) = if chars[0].is_ascii_uppercase() && matches!(chars[0], 'K' | 'Q' | 'R' | 'B' | 'N') {
        (Piece::try_from(chars[0]).map_err(|()| SanError::Malformed(raw.to_string()))?, 1)
    } else {
        (Piece::Pawn, 0)
    };

    let (body_end, promotion) = match chars.iter().position(|&c| c == '=') {
        Some(eq_idx) => {
            let promo_char = *chars.get(eq_idx + 1).ok_or_else(|| SanError::Malformed(raw.to_string()))?;
            let promo = Piece::try_from(promo_char).map_err(|()| SanError::Malformed(raw.to_string()))?;
            (eq_idx, Some(promo))
        }
        None => (chars.len(), None),
    };

    let body: String = chars[body_start..body_end].iter().filter(|&&c| c != 'x').collect();
    if body.len() < 2 {
        return Err(SanError::Malformed(raw.to_string()));
    }
    let dest_str = &body[body.len() - 2..];
    let dest = Square::try_from(dest_str)
        .map_err(|_| SanError::Malformed(raw.to_string()))?
        .index();

    let mut disambig_file: Option<u8> = None;
    let mut disambig_rank: Option<u8> = None;
    for c in body[..body.len() - 2].chars() {
        if c.is_ascii_lowercase() && ('a'..='h').contains(&c) {
            disambig_file = Some(c as u8 - b'a');
        } else if let Some(d) = c.to_digit(10) {
            disambig_rank = Some(d as u8 - 1);
        }
    }

    let matches_san = |m: &Move| {
        m.to() == dest
            && pos.piece_on_square(m.from()).map(|(p, _)| p) == Some(piece)
            && m.flag().promotion_piece() == promotion
            && disambig_file.map_or(true, |f| (m.from() & 7) == f)
            && disambig_rank.map_or(true, |r| (m.from() >> 3) == r)
    };

    let candidates: Vec<Move> = pos.legal().iter().filter(|m| matches_san(m)).copied().collect();

    match candidates.as_slice() {
        [single] => {
            let pseudo_count = pos.pseudo_legal().iter().filter(|m| matches_san(m)).count();
            let fixed = pseudo_count > 1;
            Ok((*single, fixed))
        }
        [] => Err(SanError::NoMatch(raw.to_string())),
        _ => Err(SanError::Ambiguous(raw.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pawn_push() {
        let pos = Position::default();
        let mv = san_to_move(&pos, "e4").unwrap();
        assert_eq!(mv.to_string(), "e2e4");
    }

    #[test]
    fn knight_development() {
        let pos = Position::default();
        let mv = san_to_move(&pos, "Nf3").unwrap();
        assert_eq!(mv.to_string(), "g1f3");
    }

    #[test]
    fn kingside_castle() {
        let pos = Position::from_fen("r1bqk2r/pppp1ppp/2n2n2/2b1p3/2B1P3/2N2N2/PPPP1PPP/R1BQK2R w KQkq - 6 6")
            .unwrap();
        let mv = san_to_move(&pos, "O-O").unwrap();
        assert!(mv.flag().is_castle_kingside());
    }

    #[test]
    fn disambiguated_rook_move() {
        let pos = Position::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").unwrap();
        let mv = san_to_move(&pos, "Rad1").unwrap();
        assert_eq!(mv.from(), crate::square::to_square(0, 0));
        assert_eq!(mv.to(), crate::square::to_square(3, 0));
    }

    #[test]
    fn unknown_destination_has_no_match() {
        let pos = Position::default();
        assert!(matches!(san_to_move(&pos, "Qh5"), Err(SanError::NoMatch(_))));
    }
}
