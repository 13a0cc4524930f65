use crate::attacks;
use crate::bitboard::Bitboard;
use crate::definitions::{CastlingAvailability, DEFAULT_FEN, NumberOf};
use crate::fen::{self, FenError};
use crate::move_list::MoveList;
use crate::moves::{Move, MoveFlag, MOVE_NULL};
use crate::piece::Piece;
use crate::side::Side;
use crate::square::to_square;

const WHITE_KING_START: u8 = 4;
const WHITE_KINGSIDE_ROOK_START: u8 = 7;
const WHITE_QUEENSIDE_ROOK_START: u8 = 0;
const BLACK_KING_START: u8 = 60;
const BLACK_KINGSIDE_ROOK_START: u8 = 63;
const BLACK_QUEENSIDE_ROOK_START: u8 = 56;

/// A chess position: piece placement plus the surrounding game state
/// (side to move, castling rights, en passant square, move clocks).
///
/// `last_moved`/`last_captured` describe the move most recently applied by
/// [`Position::do_move`] and are `None` on a freshly parsed position.
#[derive(Clone)]
pub struct Position {
    piece_bb: [[Bitboard; NumberOf::PIECE_TYPES]; NumberOf::SIDES],
    side_to_move: Side,
    castling_rights: u8,
    en_passant_square: Option<u8>,
    half_move_clock: u32,
    full_move_number: u32,
    last_moved: Option<Piece>,
    last_captured: Option<Piece>,
}

impl Default for Position {
    fn default() -> Self {
        Self::from_fen(DEFAULT_FEN).expect("DEFAULT_FEN is always valid")
    }
}

impl Position {
    pub fn from_fen(fen: &str) -> Result<Self, FenError> {
        let parsed = fen::parse(fen)?;
        let mut piece_bb = [[Bitboard::EMPTY; NumberOf::PIECE_TYPES]; NumberOf::SIDES];
        for side in 0..NumberOf::SIDES {
            for piece in 0..NumberOf::PIECE_TYPES {
                piece_bb[side][piece] = Bitboard::new(parsed.piece_placement[side][piece]);
            }
        }
        Ok(Self {
            piece_bb,
            side_to_move: parsed.side_to_move,
            castling_rights: parsed.castling_rights,
            en_passant_square: parsed.en_passant_square,
            half_move_clock: parsed.half_move_clock,
            full_move_number: parsed.full_move_number,
            last_moved: None,
            last_captured: None,
        })
    }

    #[must_use]
    pub fn to_fen(&self) -> String {
        fen::to_fen_string(
            |sq| self.piece_on_square(sq),
            self.side_to_move,
            self.castling_rights,
            self.en_passant_square,
            self.half_move_clock,
            self.full_move_number,
        )
    }

    #[must_use]
    pub fn side_to_move(&self) -> Side {
        self.side_to_move
    }

    #[must_use]
    pub fn castling_rights(&self) -> u8 {
        self.castling_rights
    }

    #[must_use]
    pub fn en_passant_square(&self) -> Option<u8> {
        self.en_passant_square
    }

    #[must_use]
    pub fn half_move_clock(&self) -> u32 {
        self.half_move_clock
    }

    #[must_use]
    pub fn full_move_number(&self) -> u32 {
        self.full_move_number
    }

    /// The piece just moved by [`Position::do_move`], or the promoted-to
    /// piece if the move was a promotion. `None` before any move is made.
    #[must_use]
    pub fn moved_piece(&self) -> Option<Piece> {
        self.last_moved
    }

    /// The piece captured by the most recent [`Position::do_move`], if any.
    #[must_use]
    pub fn captured_piece(&self) -> Option<Piece> {
        self.last_captured
    }

    /// The bitboard of `piece`s belonging to `side`.
    #[must_use]
    pub fn pieces(&self, side: Side, piece: Piece) -> Bitboard {
        self.piece_bb[side as usize][piece as usize]
    }

    #[must_use]
    pub fn occupied_by(&self, side: Side) -> Bitboard {
        self.piece_bb[side as usize]
            .iter()
            .fold(Bitboard::EMPTY, |acc, bb| acc | *bb)
    }

    #[must_use]
    pub fn occupied(&self) -> Bitboard {
        self.occupied_by(Side::White) | self.occupied_by(Side::Black)
    }

    #[must_use]
    pub fn piece_on_square(&self, square: u8) -> Option<(Piece, Side)> {
        for side in [Side::White, Side::Black] {
            for piece in Piece::iter() {
                if self.pieces(side, piece).contains(square) {
                    return Some((piece, side));
                }
            }
        }
        None
    }

    #[must_use]
    pub fn king_square(&self, side: Side) -> u8 {
        self.pieces(side, Piece::King)
            .lsb()
            .expect("a position always has exactly one king per side")
    }

    #[must_use]
    pub fn is_square_attacked_by(&self, square: u8, by_side: Side) -> bool {
        let attackers = attacks::attackers_to(square, self.occupied(), &self.piece_bb);
        !(attackers & self.occupied_by(by_side)).is_empty()
    }

    #[must_use]
    pub fn checkers(&self) -> Bitboard {
        let king_sq = self.king_square(self.side_to_move);
        attacks::attackers_to(king_sq, self.occupied(), &self.piece_bb)
            & self.occupied_by(self.side_to_move.opposite())
    }

    #[must_use]
    pub fn is_in_check(&self) -> bool {
        !self.checkers().is_empty()
    }

    /// 64-bit packed per-side-per-piece material counts (capped at 15 per
    /// piece type), shared with query-side material-signature parsing.
    #[must_use]
    pub fn material_key(&self) -> u64 {
        let mut key: u64 = 0;
        let mut shift = 0;
        for side in [Side::White, Side::Black] {
            for piece in Piece::iter() {
                let count = self.pieces(side, piece).popcount().min(15) as u64;
                key |= count << shift;
                shift += 4;
            }
        }
        key
    }

    fn put_piece(&mut self, side: Side, piece: Piece, square: u8) {
        self.piece_bb[side as usize][piece as usize].set(square);
    }

    fn remove_piece(&mut self, side: Side, piece: Piece, square: u8) {
        self.piece_bb[side as usize][piece as usize].clear(square);
    }

    fn clear_castling_rights_for_square(&mut self, square: u8) {
        match square {
            WHITE_KINGSIDE_ROOK_START => self.castling_rights &= !CastlingAvailability::WHITE_KINGSIDE,
            WHITE_QUEENSIDE_ROOK_START => self.castling_rights &= !CastlingAvailability::WHITE_QUEENSIDE,
            BLACK_KINGSIDE_ROOK_START => self.castling_rights &= !CastlingAvailability::BLACK_KINGSIDE,
            BLACK_QUEENSIDE_ROOK_START => self.castling_rights &= !CastlingAvailability::BLACK_QUEENSIDE,
            _ => {}
        }
    }

    /// Applies `mv` to the position, updating side to move, castling
    /// rights, en passant square, and the move clocks. `mv` is assumed to
    /// be legal in the current position.
    pub fn do_move(&mut self, mv: Move) {
        let moving_side = self.side_to_move;

        if mv.is_null() {
            self.last_moved = None;
            self.last_captured = None;
            self.en_passant_square = None;
            self.half_move_clock += 1;
            if moving_side.is_black() {
                self.full_move_number += 1;
            }
            self.side_to_move = moving_side.opposite();
            return;
        }

        let from = mv.from();
        let to = mv.to();
        let flag = mv.flag();
        let (moved_piece, _) = self
            .piece_on_square(from)
            .expect("do_move requires a piece on the origin square");

        self.remove_piece(moving_side, moved_piece, from);

        let mut captured = None;
        if flag.is_en_passant() {
            let captured_square = to_square(to & 7, from >> 3);
            self.remove_piece(moving_side.opposite(), Piece::Pawn, captured_square);
            captured = Some(Piece::Pawn);
        } else if flag.is_capture() {
            if let Some((captured_piece, _)) = self.piece_on_square(to) {
                self.remove_piece(moving_side.opposite(), captured_piece, to);
                captured = Some(captured_piece);
                self.clear_castling_rights_for_square(to);
            }
        }

        let placed_piece = flag.promotion_piece().unwrap_or(moved_piece);
        self.put_piece(moving_side, placed_piece, to);

        if flag.is_castle_kingside() || flag.is_castle_queenside() {
            let (rook_from, rook_to) = match (moving_side, flag.is_castle_kingside()) {
                (Side::White, true) => (WHITE_KINGSIDE_ROOK_START, 5),
                (Side::White, false) => (WHITE_QUEENSIDE_ROOK_START, 3),
                (Side::Black, true) => (BLACK_KINGSIDE_ROOK_START, 61),
                (Side::Black, false) => (BLACK_QUEENSIDE_ROOK_START, 59),
            };
            self.remove_piece(moving_side, Piece::Rook, rook_from);
            self.put_piece(moving_side, Piece::Rook, rook_to);
        }

        if moved_piece == Piece::King {
            let (ks, qs) = match moving_side {
                Side::White => (
                    CastlingAvailability::WHITE_KINGSIDE,
                    CastlingAvailability::WHITE_QUEENSIDE,
                ),
                Side::Black => (
                    CastlingAvailability::BLACK_KINGSIDE,
                    CastlingAvailability::BLACK_QUEENSIDE,
                ),
            };
            self.castling_rights &= !(ks | qs);
        }
        if moved_piece == Piece::Rook {
            self.clear_castling_rights_for_square(from);
        }

        self.en_passant_square = if flag.is_double_pawn_push() {
            Some((from + to) / 2)
        } else {
            None
        };

        if moved_piece == Piece::Pawn || captured.is_some() {
            self.half_move_clock = 0;
        } else {
            self.half_move_clock += 1;
        }
        if moving_side.is_black() {
            self.full_move_number += 1;
        }

        self.last_moved = Some(placed_piece);
        self.last_captured = captured;
        self.side_to_move = moving_side.opposite();
    }

    fn generate_pawn_moves(&self, list: &mut MoveList) {
        let side = self.side_to_move;
        let own = self.occupied_by(side);
        let opponent = self.occupied_by(side.opposite());
        let occupied = own | opponent;
        let forward: i32 = if side.is_white() { 8 } else { -8 };
        let start_rank = if side.is_white() { 1u8 } else { 6u8 };
        let promo_rank = if side.is_white() { 7u8 } else { 0u8 };

        for from in self.pieces(side, Piece::Pawn) {
            let single_to = from as i32 + forward;
            if (0..64).contains(&single_to) && !occupied.contains(single_to as u8) {
                push_pawn_move(list, from, single_to as u8, promo_rank, MoveFlag::Quiet);
                let from_rank = from >> 3;
                if from_rank == start_rank {
                    let double_to = from as i32 + 2 * forward;
                    if !occupied.contains(double_to as u8) {
                        list.push(Move::new(from, double_to as u8, MoveFlag::DoublePawnPush));
                    }
                }
            }
            for df in [-1i32, 1] {
                let from_file = (from & 7) as i32;
                let to_file = from_file + df;
                if !(0..8).contains(&to_file) {
                    continue;
                }
                let to = from as i32 + forward + df;
                if !(0..64).contains(&to) {
                    continue;
                }
                let to = to as u8;
                if opponent.contains(to) {
                    push_pawn_move(list, from, to, promo_rank, MoveFlag::Capture);
                } else if Some(to) == self.en_passant_square {
                    list.push(Move::new(from, to, MoveFlag::EnPassantCapture));
                }
            }
        }
    }

    fn generate_piece_moves(&self, piece: Piece, list: &mut MoveList) {
        let side = self.side_to_move;
        let own = self.occupied_by(side);
        let opponent = self.occupied_by(side.opposite());
        let occupied = own | opponent;

        for from in self.pieces(side, piece) {
            let attacks = match piece {
                Piece::Knight => attacks::knight(from),
                Piece::King => attacks::king(from),
                Piece::Bishop => attacks::bishop(from, occupied),
                Piece::Rook => attacks::rook(from, occupied),
                Piece::Queen => attacks::queen(from, occupied),
                Piece::Pawn => unreachable!("pawns are generated separately"),
            };
            for to in attacks & !own {
                let flag = if opponent.contains(to) {
                    MoveFlag::Capture
                } else {
                    MoveFlag::Quiet
                };
                list.push(Move::new(from, to, flag));
            }
        }
    }

    fn generate_castling_moves(&self, list: &mut MoveList) {
        let side = self.side_to_move;
        let occupied = self.occupied();
        let opponent = side.opposite();
        if self.is_square_attacked_by(self.king_square(side), opponent) {
            return;
        }

        let (king_start, ks_right, qs_right, ks_path, qs_path, ks_dest, qs_dest) = match side {
            Side::White => (
                WHITE_KING_START,
                CastlingAvailability::WHITE_KINGSIDE,
                CastlingAvailability::WHITE_QUEENSIDE,
                [5u8, 6],
                [3u8, 2],
                6u8,
                2u8,
            ),
            Side::Black => (
                BLACK_KING_START,
                CastlingAvailability::BLACK_KINGSIDE,
                CastlingAvailability::BLACK_QUEENSIDE,
                [61u8, 62],
                [59u8, 58],
                62u8,
                58u8,
            ),
        };

        if self.castling_rights & ks_right != 0
            && ks_path.iter().all(|&sq| !occupied.contains(sq))
            && ks_path
                .iter()
                .all(|&sq| !self.is_square_attacked_by(sq, opponent))
        {
            list.push(Move::new(king_start, ks_dest, MoveFlag::KingCastle));
        }
        if self.castling_rights & qs_right != 0
            && qs_squares_empty(occupied, side)
            && qs_path
                .iter()
                .all(|&sq| !self.is_square_attacked_by(sq, opponent))
        {
            list.push(Move::new(king_start, qs_dest, MoveFlag::QueenCastle));
        }
    }

    /// All pseudo-legal moves: obeys piece movement rules and castling
    /// rights/path checks, but does not verify the mover's own king is safe
    /// afterwards.
    #[must_use]
    pub fn pseudo_legal(&self) -> MoveList {
        let mut list = MoveList::new();
        self.generate_pawn_moves(&mut list);
        for piece in [Piece::Knight, Piece::Bishop, Piece::Rook, Piece::Queen, Piece::King] {
            self.generate_piece_moves(piece, &mut list);
        }
        self.generate_castling_moves(&mut list);
        list
    }

    /// All legal moves: each pseudo-legal move is applied to a clone and
    /// kept only if the mover's own king is not left in check.
    #[must_use]
    pub fn legal(&self) -> MoveList {
        let side = self.side_to_move;
        let mut out = MoveList::new();
        for mv in self.pseudo_legal().iter() {
            let mut clone = self.clone();
            clone.do_move(*mv);
            if !clone.is_square_attacked_by(clone.king_square(side), side.opposite()) {
                out.push(*mv);
            }
        }
        out
    }

    #[must_use]
    pub fn is_checkmate(&self) -> bool {
        self.is_in_check() && self.legal().is_empty()
    }

    #[must_use]
    pub fn is_stalemate(&self) -> bool {
        !self.is_in_check() && self.legal().is_empty()
    }
}

fn qs_squares_empty(occupied: Bitboard, side: Side) -> bool {
    let squares: [u8; 3] = if side.is_white() { [1, 2, 3] } else { [57, 58, 59] };
    squares.iter().all(|&sq| !occupied.contains(sq))
}

fn push_pawn_move(list: &mut MoveList, from: u8, to: u8, promo_rank: u8, base_flag: MoveFlag) {
    if to >> 3 == promo_rank {
        let flags: [MoveFlag; 4] = if matches!(base_flag, MoveFlag::Capture) {
            [
                MoveFlag::PromoKnightCapture,
                MoveFlag::PromoBishopCapture,
                MoveFlag::PromoRookCapture,
                MoveFlag::PromoQueenCapture,
            ]
        } else {
            [
                MoveFlag::PromoKnight,
                MoveFlag::PromoBishop,
                MoveFlag::PromoRook,
                MoveFlag::PromoQueen,
            ]
        };
        for flag in flags {
            list.push(Move::new(from, to, flag));
        }
    } else {
        list.push(Move::new(from, to, base_flag));
    }
}

#[must_use]
pub fn null_move() -> Move {
    MOVE_NULL
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_position_has_twenty_legal_moves() {
        let pos = Position::default();
        assert_eq!(pos.legal().len(), 20);
    }

    #[test]
    fn material_key_reflects_default_position() {
        let pos = Position::default();
        let key = pos.material_key();
        assert_ne!(key, 0);
    }

    #[test]
    fn fen_roundtrip_preserves_piece_placement() {
        let pos = Position::default();
        let fen = pos.to_fen();
        let reparsed = Position::from_fen(&fen).unwrap();
        assert_eq!(pos.occupied().as_u64(), reparsed.occupied().as_u64());
    }

    #[test]
    fn scholars_mate_is_checkmate() {
        let moves = [
            ("e2e4", "e7e5"),
            ("f1c4", "b8c6"),
            ("d1h5", "g8f6"),
        ];
        let mut pos = Position::default();
        for (w, b) in moves {
            apply_uci(&mut pos, w);
            apply_uci(&mut pos, b);
        }
        apply_uci(&mut pos, "h5f7");
        assert!(pos.is_checkmate());
    }

    fn apply_uci(pos: &mut Position, uci: &str) {
        let from = crate::square::Square::try_from(&uci[0..2]).unwrap().index();
        let to = crate::square::Square::try_from(&uci[2..4]).unwrap().index();
        let mv = pos
            .legal()
            .iter()
            .find(|m| m.from() == from && m.to() == to)
            .copied()
            .unwrap_or_else(|| panic!("{uci} not legal in {}", pos.to_fen()));
        pos.do_move(mv);
    }

    #[test]
    fn castling_blocked_while_in_check() {
        let pos = Position::from_fen("r3k3/4r3/8/8/8/8/8/4K2R w K - 0 1").unwrap();
        assert!(pos.is_in_check());
        assert!(!pos.legal().iter().any(|m| m.flag().is_castle()));
    }

    #[test]
    fn en_passant_capture_available_after_double_push() {
        let mut pos = Position::from_fen("4k3/8/8/8/4pP2/8/8/4K3 b - f3 0 1").unwrap();
        let found = pos
            .legal()
            .iter()
            .any(|m| m.flag().is_en_passant());
        assert!(found);
        let mv = pos
            .legal()
            .iter()
            .find(|m| m.flag().is_en_passant())
            .copied()
            .unwrap();
        pos.do_move(mv);
        assert!(!pos.pieces(Side::White, Piece::Pawn).contains(to_square(5, 3)));
    }
}
