use anyhow::{Result, anyhow};

use crate::side::Side;

/// A rank (row) on the chess board, `R1`..`R8`.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Rank {
    R1 = 0,
    R2 = 1,
    R3 = 2,
    R4 = 3,
    R5 = 4,
    R6 = 5,
    R7 = 6,
    R8 = 7,
}

impl Rank {
    #[must_use]
    pub const fn of(square: u8) -> Self {
        match square >> 3 {
            0 => Self::R1,
            1 => Self::R2,
            2 => Self::R3,
            3 => Self::R4,
            4 => Self::R5,
            5 => Self::R6,
            6 => Self::R7,
            _ => Self::R8,
        }
    }

    #[must_use]
    pub const fn promotion_rank(side: Side) -> Rank {
        match side {
            Side::White => Rank::R8,
            Side::Black => Rank::R1,
        }
    }

    #[must_use]
    pub const fn pawn_start_rank(side: Side) -> Rank {
        match side {
            Side::White => Rank::R2,
            Side::Black => Rank::R7,
        }
    }

    #[must_use]
    pub const fn offset(self, delta: i8) -> Option<Self> {
        let new_rank = self as i8 + delta;
        if new_rank >= 0 && new_rank <= 7 {
            Some(unsafe { std::mem::transmute::<u8, Rank>(new_rank as u8) })
        } else {
            None
        }
    }
}

impl TryFrom<u8> for Rank {
    type Error = anyhow::Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::R1),
            1 => Ok(Self::R2),
            2 => Ok(Self::R3),
            3 => Ok(Self::R4),
            4 => Ok(Self::R5),
            5 => Ok(Self::R6),
            6 => Ok(Self::R7),
            7 => Ok(Self::R8),
            _ => Err(anyhow!("invalid rank {value}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_bounds() {
        assert_eq!(Rank::R1.offset(1), Some(Rank::R2));
        assert_eq!(Rank::R1.offset(-1), None);
        assert_eq!(Rank::R8.offset(1), None);
    }

    #[test]
    fn promotion_ranks() {
        assert_eq!(Rank::promotion_rank(Side::White), Rank::R8);
        assert_eq!(Rank::promotion_rank(Side::Black), Rank::R1);
    }
}
