use crate::bitboard::Bitboard;

pub struct NumberOf;
impl NumberOf {
    pub const PIECE_TYPES: usize = 6;
    pub const SQUARES: usize = 64;
    pub const FILES: usize = 8;
    pub const RANKS: usize = 8;
    pub const SIDES: usize = 2;
}

pub struct CastlingAvailability;
impl CastlingAvailability {
    pub const NONE: u8 = 0;
    pub const WHITE_KINGSIDE: u8 = 1;
    pub const WHITE_QUEENSIDE: u8 = 2;
    pub const BLACK_KINGSIDE: u8 = 4;
    pub const BLACK_QUEENSIDE: u8 = 8;
    pub const ALL: u8 =
        Self::WHITE_KINGSIDE | Self::WHITE_QUEENSIDE | Self::BLACK_KINGSIDE | Self::BLACK_QUEENSIDE;
}

pub static DEFAULT_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

#[rustfmt::skip]
pub const SQUARE_NAME: [&str; NumberOf::SQUARES] = [
    "a1", "b1", "c1", "d1", "e1", "f1", "g1", "h1",
    "a2", "b2", "c2", "d2", "e2", "f2", "g2", "h2",
    "a3", "b3", "c3", "d3", "e3", "f3", "g3", "h3",
    "a4", "b4", "c4", "d4", "e4", "f4", "g4", "h4",
    "a5", "b5", "c5", "d5", "e5", "f5", "g5", "h5",
    "a6", "b6", "c6", "d6", "e6", "f6", "g6", "h6",
    "a7", "b7", "c7", "d7", "e7", "f7", "g7", "h7",
    "a8", "b8", "c8", "d8", "e8", "f8", "g8", "h8",
];

type FileBitboards = [Bitboard; NumberOf::FILES];
type RankBitboards = [Bitboard; NumberOf::RANKS];

pub const FILE_BITBOARDS: FileBitboards = [
    Bitboard::new(0x0101_0101_0101_0101),
    Bitboard::new(0x0202_0202_0202_0202),
    Bitboard::new(0x0404_0404_0404_0404),
    Bitboard::new(0x0808_0808_0808_0808),
    Bitboard::new(0x1010_1010_1010_1010),
    Bitboard::new(0x2020_2020_2020_2020),
    Bitboard::new(0x4040_4040_4040_4040),
    Bitboard::new(0x8080_8080_8080_8080),
];

pub const RANK_BITBOARDS: RankBitboards = [
    Bitboard::new(0x0000_0000_0000_00FF),
    Bitboard::new(0x0000_0000_0000_FF00),
    Bitboard::new(0x0000_0000_00FF_0000),
    Bitboard::new(0x0000_0000_FF00_0000),
    Bitboard::new(0x0000_00FF_0000_0000),
    Bitboard::new(0x0000_FF00_0000_0000),
    Bitboard::new(0x00FF_0000_0000_0000),
    Bitboard::new(0xFF00_0000_0000_0000),
];
