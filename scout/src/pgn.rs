//! The PGN tokeniser: a byte-driven state machine that turns arbitrarily
//! noisy PGN text into `RawGame`s (an optional setup FEN plus a sequence of
//! NUL-free SAN strings and a result token), tolerating missing results and
//! missing closing braces.

use arrayvec::ArrayVec;

use crate::token::{classify_byte, Token};

const STATE_STACK_CAPACITY: usize = 16;
const SAN_BUFFER_CAPACITY: usize = 24;
const RESULT_BUFFER_CAPACITY: usize = 24;
const FAULT_WINDOW: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Header,
    Tag,
    FenTag,
    BraceComment,
    Variation,
    Nag,
    NextMove,
    MoveNumber,
    NextSan,
    ReadSan,
    Result,
}

/// A game as extracted from PGN text, prior to SAN-to-`Move` resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawGame {
    /// Byte offset of the game's first tag (or its first move, if untagged)
    /// in the source PGN.
    pub pgn_offset: u64,
    pub fen: Option<String>,
    pub sans: Vec<String>,
    pub result: String,
}

/// A hard parse failure: the scanner could not find any valid transition
/// for the current `(state, token)` pair.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("PGN parse failure in state {state_debug} at byte {pos}: {window}")]
pub struct PgnFault {
    state_debug: String,
    pos: usize,
    window: String,
}

impl PgnFault {
    #[must_use]
    pub fn state(&self) -> &str {
        &self.state_debug
    }

    #[must_use]
    pub fn position(&self) -> usize {
        self.pos
    }
}

struct Scanner<'a> {
    bytes: &'a [u8],
    pos: usize,
    state: State,
    stack: ArrayVec<State, STATE_STACK_CAPACITY>,
    fen_buf: String,
    san_buf: ArrayVec<u8, SAN_BUFFER_CAPACITY>,
    result_buf: ArrayVec<u8, RESULT_BUFFER_CAPACITY>,
    side_white: bool,
    in_quotes: bool,
    in_game: bool,
    game_start_offset: usize,
    current_fen: Option<String>,
    current_sans: Vec<String>,
    games: Vec<RawGame>,
    fault: Option<PgnFault>,
}

impl<'a> Scanner<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            pos: 0,
            state: State::Header,
            stack: ArrayVec::new(),
            fen_buf: String::new(),
            san_buf: ArrayVec::new(),
            result_buf: ArrayVec::new(),
            side_white: true,
            in_quotes: false,
            in_game: false,
            game_start_offset: 0,
            current_fen: None,
            current_sans: Vec::new(),
            games: Vec::new(),
            fault: None,
        }
    }

    fn fail(&mut self, state: State) {
        let start = self.pos.saturating_sub(FAULT_WINDOW / 2);
        let end = (self.pos + FAULT_WINDOW / 2).min(self.bytes.len());
        let window = String::from_utf8_lossy(&self.bytes[start..end]).into_owned();
        self.fault = Some(PgnFault {
            state_debug: format!("{state:?}"),
            pos: self.pos,
            window,
        });
    }

    fn push_state(&mut self, state: State) {
        if self.stack.try_push(state).is_err() {
            self.fail(self.state);
        }
    }

    fn pop_state(&mut self) -> Option<State> {
        self.stack.pop()
    }

    fn mark_game_start_if_needed(&mut self) {
        if !self.in_game {
            self.in_game = true;
            self.game_start_offset = self.pos;
        }
    }

    fn looks_like(&self, literal: &[u8]) -> bool {
        self.bytes[self.pos..].starts_with(literal)
    }

    fn finalize_game(&mut self, result: String) {
        if !self.in_game {
            return;
        }
        let sans = std::mem::take(&mut self.current_sans);
        let fen = self.current_fen.take();
        self.games.push(RawGame {
            pgn_offset: self.game_start_offset as u64,
            fen,
            sans,
            result,
        });
        self.in_game = false;
        self.side_white = true;
        self.fen_buf.clear();
        self.san_buf.clear();
        self.result_buf.clear();
        self.stack.clear();
    }

    fn missing_result_recovery(&mut self) {
        self.finalize_game("*".to_string());
        self.state = State::Header;
    }

    fn end_move(&mut self) {
        let san = String::from_utf8_lossy(&self.san_buf).into_owned();
        self.san_buf.clear();
        if !san.is_empty() {
            self.current_sans.push(san);
        }
        self.side_white = !self.side_white;
        self.state = if self.side_white {
            State::NextMove
        } else {
            State::NextSan
        };
    }

    fn run(&mut self) {
        while self.pos < self.bytes.len() {
            let byte = self.bytes[self.pos];
            let token = classify_byte(byte);
            self.step(byte, token);
            if self.fault.is_some() {
                return;
            }
        }
        self.flush_trailing_game();
    }

    fn flush_trailing_game(&mut self) {
        if !self.san_buf.is_empty() {
            let san = String::from_utf8_lossy(&self.san_buf).into_owned();
            self.san_buf.clear();
            self.current_sans.push(san);
        }
        if self.in_game {
            let result = if self.result_buf.is_empty() {
                "*".to_string()
            } else {
                String::from_utf8_lossy(&self.result_buf).into_owned()
            };
            self.finalize_game(result);
        }
    }

    fn step(&mut self, byte: u8, token: Token) {
        match self.state {
            State::Header => self.step_header(byte, token),
            State::Tag => self.step_tag(byte, token),
            State::FenTag => self.step_fen_tag(byte),
            State::BraceComment => self.step_brace_comment(token),
            State::Variation => self.step_variation(token),
            State::Nag => self.step_nag(token),
            State::NextMove => self.step_next_move(token),
            State::MoveNumber => self.step_move_number(byte, token),
            State::NextSan => self.step_next_san(token),
            State::ReadSan => self.step_read_san(byte, token),
            State::Result => self.step_result(byte, token),
        }
    }

    fn step_header(&mut self, _byte: u8, token: Token) {
        match token {
            Token::LeftBracket => {
                self.mark_game_start_if_needed();
                if self.looks_like(b"[FEN \"") {
                    self.pos += 6;
                    self.state = State::FenTag;
                } else {
                    self.push_state(State::Header);
                    self.state = State::Tag;
                    self.pos += 1;
                }
            }
            Token::Spaces => self.pos += 1,
            Token::Zero | Token::Digit => {
                self.mark_game_start_if_needed();
                self.state = State::MoveNumber;
            }
            Token::MoveHead | Token::Minus => {
                self.mark_game_start_if_needed();
                self.state = State::NextSan;
            }
            _ => self.pos += 1,
        }
    }

    fn step_tag(&mut self, _byte: u8, token: Token) {
        match token {
            Token::Quotes => {
                self.in_quotes = !self.in_quotes;
                self.pos += 1;
            }
            Token::RightBracket if !self.in_quotes => {
                self.pos += 1;
                self.state = self.pop_state().unwrap_or(State::Header);
            }
            _ => self.pos += 1,
        }
    }

    fn step_fen_tag(&mut self, byte: u8) {
        if byte == b'"' {
            let fen = std::mem::take(&mut self.fen_buf);
            if fen.split_whitespace().nth(1) == Some("b") {
                self.side_white = false;
            }
            self.current_fen = Some(fen);
            self.pos += 1;
            self.state = State::Tag;
        } else {
            self.fen_buf.push(byte as char);
            self.pos += 1;
        }
    }

    fn step_brace_comment(&mut self, token: Token) {
        if token == Token::RightBrace {
            self.pos += 1;
            self.state = self.pop_state().unwrap_or(State::NextSan);
            return;
        }
        if token == Token::LeftBracket && self.looks_like(b"[Event ") {
            self.missing_result_recovery();
            return;
        }
        self.pos += 1;
    }

    fn step_variation(&mut self, token: Token) {
        match token {
            Token::LeftParen => {
                self.push_state(State::Variation);
                self.pos += 1;
            }
            Token::RightParen => {
                self.pos += 1;
                match self.pop_state() {
                    Some(state) => self.state = state,
                    None => self.fail(State::Variation),
                }
            }
            Token::LeftBrace => {
                self.push_state(State::Variation);
                self.state = State::BraceComment;
                self.pos += 1;
            }
            _ => self.pos += 1,
        }
    }

    fn step_nag(&mut self, token: Token) {
        match token {
            Token::Digit | Token::Zero | Token::Dollar => self.pos += 1,
            _ => self.state = self.pop_state().unwrap_or(State::NextSan),
        }
    }

    fn maybe_missing_result(&mut self, token: Token) -> bool {
        if token == Token::LeftBracket && self.looks_like(b"[Event ") {
            self.missing_result_recovery();
            true
        } else {
            false
        }
    }

    fn step_next_move(&mut self, token: Token) {
        if self.maybe_missing_result(token) {
            return;
        }
        match token {
            Token::Spaces | Token::Dot => self.pos += 1,
            Token::Zero | Token::Digit => self.state = State::MoveNumber,
            Token::Result => self.state = State::Result,
            Token::LeftBrace => {
                self.push_state(State::NextMove);
                self.state = State::BraceComment;
                self.pos += 1;
            }
            Token::Dollar => {
                self.push_state(State::NextMove);
                self.state = State::Nag;
                self.pos += 1;
            }
            _ => self.pos += 1,
        }
    }

    /// A move-number digit is ambiguous until the next byte: `12.` is a
    /// genuine move number, but `1-0`/`1/2-1/2` only look like one until the
    /// `-`/`/` shows up. Digits are buffered into `result_buf` speculatively
    /// so that, if they turn out to belong to a result after all, nothing
    /// written so far is lost; a confirmed move number clears the buffer.
    fn step_move_number(&mut self, byte: u8, token: Token) {
        match token {
            Token::Digit | Token::Zero => {
                if self.result_buf.try_push(byte).is_err() {
                    self.fail(State::MoveNumber);
                    return;
                }
                self.pos += 1;
            }
            Token::Dot | Token::Spaces => {
                self.result_buf.clear();
                self.pos += 1;
                self.state = State::NextSan;
            }
            Token::Minus | Token::Result => self.state = State::Result,
            _ => {
                self.result_buf.clear();
                self.state = State::NextSan;
            }
        }
    }

    fn step_next_san(&mut self, token: Token) {
        if self.maybe_missing_result(token) {
            return;
        }
        match token {
            Token::Spaces | Token::Dot => self.pos += 1,
            Token::MoveHead | Token::Minus => self.state = State::ReadSan,
            Token::Zero => {
                if self.bytes.get(self.pos + 2) == Some(&b'0') {
                    self.state = State::ReadSan;
                } else {
                    self.state = State::Result;
                }
            }
            // A SAN move never starts with a non-zero digit, so this can
            // only be the leading digit of a `1-0`/`1/2-1/2` result.
            Token::Digit => self.state = State::Result,
            Token::Result => self.state = State::Result,
            Token::LeftBrace => {
                self.push_state(State::NextSan);
                self.state = State::BraceComment;
                self.pos += 1;
            }
            Token::Dollar => {
                self.push_state(State::NextSan);
                self.state = State::Nag;
                self.pos += 1;
            }
            _ => self.pos += 1,
        }
    }

    fn step_read_san(&mut self, byte: u8, token: Token) {
        match token {
            Token::Spaces => {
                self.pos += 1;
                self.end_move();
            }
            Token::LeftBrace => {
                self.push_state(State::ReadSan);
                self.state = State::BraceComment;
                self.pos += 1;
            }
            _ => {
                if self.san_buf.try_push(byte).is_err() {
                    self.fail(State::ReadSan);
                    return;
                }
                self.pos += 1;
            }
        }
    }

    fn step_result(&mut self, byte: u8, token: Token) {
        if token == Token::Spaces {
            if byte == b'\n' {
                self.pos += 1;
                let result = String::from_utf8_lossy(&self.result_buf).into_owned();
                self.result_buf.clear();
                self.finalize_game(result);
                self.state = State::Header;
            } else {
                if self.result_buf.try_push(byte).is_err() {
                    self.fail(State::Result);
                    return;
                }
                self.pos += 1;
            }
            return;
        }
        if self.result_buf.try_push(byte).is_err() {
            self.fail(State::Result);
            return;
        }
        self.pos += 1;
    }
}

/// Tokenises `pgn` into zero or more [`RawGame`]s. Whitespace-only or empty
/// input is a valid zero-game run. A structural fault aborts the whole run
/// and returns the games collected so far alongside the fault.
pub fn scan(pgn: &[u8]) -> Result<Vec<RawGame>, PgnFault> {
    let mut scanner = Scanner::new(pgn);
    scanner.run();
    match scanner.fault {
        Some(fault) => Err(fault),
        None => Ok(scanner.games),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_is_zero_games() {
        let games = scan(b"").unwrap();
        assert!(games.is_empty());
    }

    #[test]
    fn whitespace_only_input_is_zero_games() {
        let games = scan(b"   \n\t\n  ").unwrap();
        assert!(games.is_empty());
    }

    #[test]
    fn minimal_pgn_is_one_game_two_moves() {
        let games = scan(b"[Event \"x\"]\n\n1. e4 e5 1/2-1/2\n").unwrap();
        assert_eq!(games.len(), 1);
        assert_eq!(games[0].sans, vec!["e4".to_string(), "e5".to_string()]);
        assert_eq!(games[0].result, "1/2-1/2");
    }

    #[test]
    fn castling_is_not_confused_with_result() {
        let games = scan(
            b"[Event \"x\"]\n\n1. e4 e5 2. Nf3 Nc6 3. Bb5 a6 4. O-O Be7 1-0\n",
        )
        .unwrap();
        assert_eq!(games.len(), 1);
        assert!(games[0].sans.iter().any(|s| s == "O-O"));
        assert_eq!(games[0].result, "1-0");
    }

    #[test]
    fn missing_result_recovers_two_games() {
        let games = scan(
            b"[Event \"a\"]\n\n1. e4 e5\n[Event \"b\"]\n\n1. d4 d5 1-0\n",
        )
        .unwrap();
        assert_eq!(games.len(), 2);
        assert_eq!(games[0].sans, vec!["e4".to_string(), "e5".to_string()]);
        assert_eq!(games[1].result, "1-0");
    }

    #[test]
    fn brace_comments_are_discarded() {
        let games = scan(b"[Event \"x\"]\n\n1. e4 {good} e5 1/2-1/2\n").unwrap();
        assert_eq!(games[0].sans, vec!["e4".to_string(), "e5".to_string()]);
    }

    #[test]
    fn variations_are_discarded() {
        let games = scan(b"[Event \"x\"]\n\n1. e4 (1. d4 d5) e5 1-0\n").unwrap();
        assert_eq!(games[0].sans, vec!["e4".to_string(), "e5".to_string()]);
    }

    #[test]
    fn fen_tag_is_captured_and_sets_side_to_move() {
        let games = scan(
            b"[Event \"x\"]\n[FEN \"8/8/8/8/8/8/8/K6k b - - 0 1\"]\n\n1... Kg2 1-0\n",
        )
        .unwrap();
        assert_eq!(
            games[0].fen.as_deref(),
            Some("8/8/8/8/8/8/8/K6k b - - 0 1")
        );
    }

    #[test]
    fn result_with_internal_spaces_is_captured() {
        let games = scan(b"[Event \"x\"]\n\n1. e4 e5 1/2 - 1/2\n").unwrap();
        assert_eq!(games[0].result, "1/2 - 1/2");
    }

    #[test]
    fn result_immediately_after_whites_last_move_is_captured() {
        let games = scan(b"[Event \"x\"]\n\n1. e4 1-0\n").unwrap();
        assert_eq!(games[0].sans, vec!["e4".to_string()]);
        assert_eq!(games[0].result, "1-0");
    }

    #[test]
    fn draw_result_immediately_after_whites_last_move_is_captured() {
        let games = scan(b"[Event \"x\"]\n\n1. e4 1/2-1/2\n").unwrap();
        assert_eq!(games[0].sans, vec!["e4".to_string()]);
        assert_eq!(games[0].result, "1/2-1/2");
    }
}
