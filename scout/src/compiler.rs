//! Resolves a scanned game's SAN strings into legal moves via the chess
//! library, and writes the binary database record format (see [`crate::db`]).

use std::io::{self, Write};

use position::Position;

use crate::db::{self, GameResult};
use crate::pgn::RawGame;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompileStats {
    pub games: u64,
    pub moves: u64,
    pub fixed: u64,
}

impl CompileStats {
    fn add(&mut self, other: CompileStats) {
        self.games += other.games;
        self.moves += other.moves;
        self.fixed += other.fixed;
    }
}

/// Writes the file-leading `MOVE_NONE` that precedes the first game record.
pub fn write_header(writer: &mut impl Write) -> io::Result<()> {
    db::write_move(writer, db::leading_separator())
}

/// Replays `game`'s SAN strings against a [`Position`] seeded from its setup
/// FEN (or the starting position), writing one binary record to `writer`.
///
/// Games carrying a setup FEN are parsed and replayed for validation (their
/// `fixed`/`moves` counts still contribute to the returned stats) but are
/// not written to the database: the offset-relative record layout has no
/// slot for a non-default starting position (spec §4.3).
///
/// A SAN token that `san_to_move` cannot resolve truncates the game at that
/// point; the already-resolved prefix is still written (or counted, for a
/// FEN game). The second return value is a human-readable warning for the
/// caller to log, present exactly when truncation occurred or the FEN
/// itself failed to parse.
pub fn compile_game(game: &RawGame, writer: &mut impl Write) -> io::Result<(CompileStats, Option<String>)> {
    let mut pos = match &game.fen {
        Some(fen) => match Position::from_fen(fen) {
            Ok(p) => p,
            Err(e) => {
                let stats = CompileStats { games: 1, ..Default::default() };
                let warning = format!("bad FEN in game at pgn offset {}: {e}", game.pgn_offset);
                return Ok((stats, Some(warning)));
            }
        },
        None => Position::default(),
    };

    let mut stats = CompileStats { games: 1, ..Default::default() };
    let mut resolved = Vec::with_capacity(game.sans.len());
    let mut warning = None;

    for san in &game.sans {
        match position::san_to_move_fixed(&pos, san) {
            Ok((mv, fixed)) => {
                if fixed {
                    stats.fixed += 1;
                }
                pos.do_move(mv);
                resolved.push(mv);
                stats.moves += 1;
            }
            Err(e) => {
                warning = Some(format!(
                    "unresolvable SAN '{san}' at pgn offset {} (fen {}): {e}",
                    game.pgn_offset,
                    pos.to_fen(),
                ));
                break;
            }
        }
    }

    if game.fen.is_some() {
        return Ok((stats, warning));
    }

    let offset_slots = db::encode_offset(game.pgn_offset);
    for slot in offset_slots {
        db::write_move(writer, slot)?;
    }
    let result = GameResult::from_pgn_token(&game.result);
    db::write_move(writer, db::encode_result(result))?;
    for mv in resolved {
        db::write_move(writer, mv)?;
    }
    db::write_move(writer, db::leading_separator())?;

    Ok((stats, warning))
}

/// Accumulates [`CompileStats`] across all games of an ingestion run.
#[derive(Debug, Clone, Copy, Default)]
pub struct IngestStats(CompileStats);

impl IngestStats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn merge(&mut self, contribution: CompileStats) {
        self.0.add(contribution);
    }

    #[must_use]
    pub fn games(&self) -> u64 {
        self.0.games
    }

    #[must_use]
    pub fn moves(&self) -> u64 {
        self.0.moves
    }

    #[must_use]
    pub fn fixed(&self) -> u64 {
        self.0.fixed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pgn::RawGame;

    fn game(sans: &[&str], result: &str) -> RawGame {
        RawGame {
            pgn_offset: 0,
            fen: None,
            sans: sans.iter().map(|s| s.to_string()).collect(),
            result: result.to_string(),
        }
    }

    #[test]
    fn writes_header_separator() {
        let mut buf = Vec::new();
        write_header(&mut buf).unwrap();
        assert_eq!(buf.len(), db::MOVE_SIZE);
    }

    #[test]
    fn resolves_legal_game() {
        let g = game(&["e4", "e5", "Nf3", "Nc6"], "1/2-1/2");
        let mut buf = Vec::new();
        let (stats, warning) = compile_game(&g, &mut buf).unwrap();
        assert_eq!(stats.games, 1);
        assert_eq!(stats.moves, 4);
        assert!(warning.is_none());
    }

    #[test]
    fn truncates_on_illegal_san() {
        let g = game(&["e4", "e5", "Qh5"], "1-0");
        let mut buf = Vec::new();
        let (stats, warning) = compile_game(&g, &mut buf).unwrap();
        assert_eq!(stats.moves, 2);
        assert!(warning.is_some());
    }

    #[test]
    fn fen_game_validated_but_not_written() {
        let mut g = game(&["Nf3"], "*");
        g.fen = Some("4k3/8/8/8/8/8/8/4K2N w - - 0 1".to_string());
        let mut buf = Vec::new();
        let (stats, warning) = compile_game(&g, &mut buf).unwrap();
        assert_eq!(stats.moves, 1);
        assert!(warning.is_none());
        assert!(buf.is_empty());
    }

    #[test]
    fn result_token_maps_to_game_result() {
        assert_eq!(GameResult::from_pgn_token("1-0"), GameResult::WhiteWin);
    }
}
