//! Cross-module scenarios exercising the full pgn -> db -> scanner -> query
//! pipeline together, the way a single module's unit tests can't.

use scout::{compiler, db, pgn, query, scanner};

fn build_db(pgn_text: &[u8]) -> Vec<u8> {
    let games = pgn::scan(pgn_text).unwrap();
    let mut buf = Vec::new();
    compiler::write_header(&mut buf).unwrap();
    for game in &games {
        compiler::compile_game(game, &mut buf).unwrap();
    }
    buf
}

#[test]
fn minimal_pgn_produces_the_exact_byte_layout() {
    let pgn_text = b"[Event \"x\"]\n\n1. e4 e5 1/2-1/2\n";
    let bytes = build_db(pgn_text);

    let mut expected = Vec::new();
    compiler::write_header(&mut expected).unwrap();
    for slot in db::encode_offset(0) {
        db::write_move(&mut expected, slot).unwrap();
    }
    db::write_move(&mut expected, db::encode_result(db::GameResult::Draw)).unwrap();
    let e4 = position::san_to_move_fixed(&position::Position::default(), "e4").unwrap().0;
    let mut pos = position::Position::default();
    pos.do_move(e4);
    let e5 = position::san_to_move_fixed(&pos, "e5").unwrap().0;
    db::write_move(&mut expected, e4).unwrap();
    db::write_move(&mut expected, e5).unwrap();
    db::write_move(&mut expected, db::leading_separator()).unwrap();

    assert_eq!(bytes, expected);
}

#[test]
fn sub_fen_query_matches_white_bishop_on_b5() {
    let pgn_text = b"1. e4 e5 2. Nf3 Nc6 3. Bb5 a6 1-0\n";
    let bytes = build_db(pgn_text);

    let q = serde_json::json!({ "sub-fen": "8/8/8/1B6/8/8/8/8" });
    let query = query::compile(&q).unwrap();
    let (_, matches) = scanner::scout(&bytes, &query, 1);
    assert_eq!(matches.len(), 1);
    assert!(matches[0].plies.contains(&5));
}

#[test]
fn streak_of_two_breaks_across_a_non_matching_ply() {
    let pgn_text = b"1. e4 e5 2. Nf3 Nc6 1/2-1/2\n";
    let bytes = build_db(pgn_text);

    // Two consecutive captures never happen in this game -- a "captured
    // pawn" streak of length 2 must not match.
    let q = serde_json::json!({
        "streak": [
            { "captured": "pawn" },
            { "captured": "pawn" },
        ]
    });
    let query = query::compile(&q).unwrap();
    let (_, matches) = scanner::scout(&bytes, &query, 1);
    assert!(matches.is_empty());
}

#[test]
fn sharding_finds_the_same_games_regardless_of_worker_count() {
    let pgn_text = b"[Event \"a\"]\n1. e4 e5 1-0\n\n[Event \"b\"]\n1. d4 d5 2. c4 0-1\n\n[Event \"c\"]\n1. Nf3 Nf6 1/2-1/2\n";
    let bytes = build_db(pgn_text);

    let q = serde_json::json!({ "pass": true });
    let query = query::compile(&q).unwrap();

    let (moves_one, mut one) = scanner::scout(&bytes, &query, 1);
    let (moves_many, mut many) = scanner::scout(&bytes, &query, 5);

    one.sort_by_key(|m| m.game_offset);
    many.sort_by_key(|m| m.game_offset);

    assert_eq!(moves_one, moves_many);
    assert_eq!(one.len(), 3);
    assert_eq!(one.iter().map(|m| m.game_offset).collect::<Vec<_>>(), many.iter().map(|m| m.game_offset).collect::<Vec<_>>());
}
