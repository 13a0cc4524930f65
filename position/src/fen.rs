use std::fmt;

use thiserror::Error;

use crate::definitions::{CastlingAvailability, NumberOf};
use crate::piece::Piece;
use crate::side::Side;
use crate::square::to_square;

/// Error parsing a FEN string.
#[derive(Error, Debug, PartialEq, Eq)]
pub struct FenError {
    message: String,
}

impl FenError {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for FenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid FEN: {}", self.message)
    }
}

pub(crate) struct ParsedFen {
    pub piece_placement: [[u64; NumberOf::PIECE_TYPES]; NumberOf::SIDES],
    pub side_to_move: Side,
    pub castling_rights: u8,
    pub en_passant_square: Option<u8>,
    pub half_move_clock: u32,
    pub full_move_number: u32,
}

pub(crate) fn parse(fen: &str) -> Result<ParsedFen, FenError> {
    let trimmed = fen.trim();
    if trimmed.is_empty() {
        return Err(FenError::new("FEN string is empty"));
    }

    let mut parts: Vec<&str> = trimmed.split_whitespace().collect();
    if parts.len() == 4 {
        parts.push("0");
        parts.push("1");
    }
    if parts.len() != 6 {
        return Err(FenError::new("FEN string does not have 6 fields"));
    }

    let piece_placement = parse_piece_placement(parts[0])?;
    let side_to_move = match parts[1] {
        "w" => Side::White,
        "b" => Side::Black,
        other => return Err(FenError::new(format!("invalid active color '{other}'"))),
    };
    let castling_rights = parse_castling_rights(parts[2])?;
    let en_passant_square = parse_en_passant(parts[3])?;
    let half_move_clock = parts[4]
        .parse::<u32>()
        .map_err(|_| FenError::new(format!("invalid halfmove clock '{}'", parts[4])))?;
    let full_move_number = parts[5]
        .parse::<u32>()
        .map_err(|_| FenError::new(format!("invalid fullmove number '{}'", parts[5])))?;

    Ok(ParsedFen {
        piece_placement,
        side_to_move,
        castling_rights,
        en_passant_square,
        half_move_clock,
        full_move_number,
    })
}

fn parse_piece_placement(
    part: &str,
) -> Result<[[u64; NumberOf::PIECE_TYPES]; NumberOf::SIDES], FenError> {
    let mut bb = [[0u64; NumberOf::PIECE_TYPES]; NumberOf::SIDES];
    let mut rank: i32 = 7;
    let mut file: i32 = 0;

    for c in part.chars() {
        match c {
            '/' => {
                if rank == 0 {
                    return Err(FenError::new("extra '/' in piece placement"));
                }
                if file != 8 {
                    return Err(FenError::new("rank does not sum to 8 files"));
                }
                rank -= 1;
                file = 0;
            }
            c if c.is_ascii_digit() => {
                file += c.to_digit(10).unwrap() as i32;
            }
            _ => {
                let piece = Piece::try_from(c).map_err(|()| {
                    FenError::new(format!("invalid piece placement character '{c}'"))
                })?;
                let side = if c.is_ascii_uppercase() {
                    Side::White
                } else {
                    Side::Black
                };
                if !(0..8).contains(&file) || !(0..8).contains(&rank) {
                    return Err(FenError::new("piece placement overruns the board"));
                }
                let square = to_square(file as u8, rank as u8);
                bb[side as usize][piece as usize] |= 1u64 << square;
                file += 1;
            }
        }
    }

    Ok(bb)
}

fn parse_castling_rights(part: &str) -> Result<u8, FenError> {
    if part == "-" {
        return Ok(CastlingAvailability::NONE);
    }
    let mut rights = CastlingAvailability::NONE;
    for c in part.chars() {
        rights |= match c {
            'K' => CastlingAvailability::WHITE_KINGSIDE,
            'Q' => CastlingAvailability::WHITE_QUEENSIDE,
            'k' => CastlingAvailability::BLACK_KINGSIDE,
            'q' => CastlingAvailability::BLACK_QUEENSIDE,
            other => return Err(FenError::new(format!("invalid castling char '{other}'"))),
        };
    }
    Ok(rights)
}

fn parse_en_passant(part: &str) -> Result<Option<u8>, FenError> {
    if part == "-" {
        return Ok(None);
    }
    crate::square::Square::try_from(part)
        .map(|s| Some(s.index()))
        .map_err(|e| FenError::new(e.to_string()))
}

pub(crate) fn to_fen_string(
    piece_on_square: impl Fn(u8) -> Option<(Piece, Side)>,
    side_to_move: Side,
    castling_rights: u8,
    en_passant_square: Option<u8>,
    half_move_clock: u32,
    full_move_number: u32,
) -> String {
    let mut placement = String::new();
    for rank in (0..8u8).rev() {
        let mut empty = 0;
        for file in 0..8u8 {
            let square = to_square(file, rank);
            match piece_on_square(square) {
                Some((piece, side)) => {
                    if empty > 0 {
                        placement.push_str(&empty.to_string());
                        empty = 0;
                    }
                    let c = piece.to_san_char().unwrap_or('P');
                    placement.push(if side.is_white() {
                        c
                    } else {
                        c.to_ascii_lowercase()
                    });
                }
                None => empty += 1,
            }
        }
        if empty > 0 {
            placement.push_str(&empty.to_string());
        }
        if rank > 0 {
            placement.push('/');
        }
    }

    let active_color = if side_to_move.is_white() { "w" } else { "b" };

    let mut castling = String::new();
    if castling_rights & CastlingAvailability::WHITE_KINGSIDE != 0 {
        castling.push('K');
    }
    if castling_rights & CastlingAvailability::WHITE_QUEENSIDE != 0 {
        castling.push('Q');
    }
    if castling_rights & CastlingAvailability::BLACK_KINGSIDE != 0 {
        castling.push('k');
    }
    if castling_rights & CastlingAvailability::BLACK_QUEENSIDE != 0 {
        castling.push('q');
    }
    if castling.is_empty() {
        castling.push('-');
    }

    let ep = match en_passant_square {
        Some(sq) => crate::definitions::SQUARE_NAME[sq as usize].to_string(),
        None => "-".to_string(),
    };

    format!("{placement} {active_color} {castling} {ep} {half_move_clock} {full_move_number}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definitions::DEFAULT_FEN;

    #[test]
    fn parse_default_fen() {
        let parsed = parse(DEFAULT_FEN).unwrap();
        assert_eq!(parsed.side_to_move, Side::White);
        assert_eq!(parsed.castling_rights, CastlingAvailability::ALL);
        assert_eq!(parsed.en_passant_square, None);
        assert_eq!(parsed.half_move_clock, 0);
        assert_eq!(parsed.full_move_number, 1);
        assert_eq!(
            parsed.piece_placement[Side::White as usize][Piece::Pawn as usize].count_ones(),
            8
        );
    }

    #[test]
    fn rejects_empty_string() {
        assert!(parse("").is_err());
    }

    #[test]
    fn accepts_shorthand_four_field_fen() {
        let parsed = parse("8/8/8/8/8/8/8/K6k w - -").unwrap();
        assert_eq!(parsed.half_move_clock, 0);
        assert_eq!(parsed.full_move_number, 1);
    }
}
