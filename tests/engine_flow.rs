// tests/engine_flow.rs
//
// End-to-end pass over the public engine API: learning and reviewing
// vocabulary, walking the curriculum, and settling a battle.

use rusqlite::Connection;

use lingo_trainer::models::{BattleStatus, BattleType, MasteryTier, Node};
use lingo_trainer::{battle, database, lessons, profile, progression, repository, scheduler};
use lingo_trainer::{EngineConfig, EngineError};

const NOW: i64 = 1_750_000_000;
const DAY: i64 = 86_400;

fn setup() -> Connection {
    let _ = env_logger::builder().is_test(true).try_init();
    let conn = Connection::open_in_memory().unwrap();
    database::init_db(&conn).unwrap();
    conn
}

#[test]
fn vocabulary_cards_progress_toward_mastery() {
    let conn = setup();
    let cfg = EngineConfig::default();

    let card = scheduler::learn_word(&conn, 1, 1, NOW).unwrap();
    assert_eq!(card.tier, MasteryTier::New);
    assert_eq!(scheduler::due_cards(&conn, 1, NOW, 10).unwrap().len(), 1);

    let mut clock = NOW;
    let mut last = None;
    for _ in 0..5 {
        let result = scheduler::submit_review(&conn, 1, card.id, 5, clock, &cfg.review).unwrap();
        clock = result.next_due_ts;
        last = Some(result);
    }
    let last = last.unwrap();
    assert_eq!(last.tier, MasteryTier::Mastered);
    assert_eq!(last.repetitions, 5);
    assert!(last.interval_days > 6);

    // A lapse pulls the card back into the learning queue for tomorrow.
    let lapsed = scheduler::submit_review(&conn, 1, card.id, 1, clock, &cfg.review).unwrap();
    assert_eq!(lapsed.tier, MasteryTier::Learning);
    assert_eq!(lapsed.interval_days, 1);
    assert_eq!(scheduler::due_cards(&conn, 1, clock + DAY, 10).unwrap().len(), 1);
}

#[test]
fn completing_a_level_opens_the_next_one() {
    let mut conn = setup();
    let cfg = EngineConfig::default();

    // Level A1 holds lessons 1..=8 across two units.
    assert!(!progression::is_unit_unlocked(
        &repository::load_snapshot(&conn, 1).unwrap(),
        2,
        &cfg.unlock
    ));

    for lesson in 1..=7i64 {
        let reward =
            lessons::complete_lesson(&mut conn, 1, lesson, 90, 120, 0, NOW, &cfg).unwrap();
        assert!(reward.first_completion);
    }

    let snapshot = repository::load_snapshot(&conn, 1).unwrap();
    assert!(progression::is_unlocked(&snapshot, Node::Unit(2), &cfg.unlock));
    // 7 of 8 lessons puts A1 at 87.5%, past the 80% gate.
    assert!(progression::is_unlocked(&snapshot, Node::Level("A2"), &cfg.unlock));
    assert!(!progression::is_unlocked(&snapshot, Node::Level("B1"), &cfg.unlock));

    let me = profile::get_profile(&conn, 1).unwrap();
    assert_eq!(me.current_level, "A2");
    assert!(me.xp > 0);

    // The A2 opener is reachable only after the A1 tail is done.
    assert!(!progression::is_unlocked(&snapshot, Node::Lesson(9), &cfg.unlock));
    lessons::complete_lesson(&mut conn, 1, 8, 90, 120, 0, NOW, &cfg).unwrap();
    let snapshot = repository::load_snapshot(&conn, 1).unwrap();
    assert!(progression::is_unlocked(&snapshot, Node::Lesson(9), &cfg.unlock));
}

#[test]
fn a_full_battle_settles_ratings_and_shows_on_the_leaderboard() {
    let mut conn = setup();
    let cfg = EngineConfig::default();

    battle::find_match(&mut conn, 1, BattleType::Mixed, NOW, &cfg).unwrap();
    let paired = battle::find_match(&mut conn, 2, BattleType::Mixed, NOW, &cfg).unwrap();
    let running = battle::start_battle(&mut conn, paired.id, 2, NOW, &cfg).unwrap();
    assert_eq!(running.status, BattleStatus::InProgress);

    for round_no in 1..=running.round_count {
        let round = repository::get_round(&conn, running.id, round_no).unwrap().unwrap();
        battle::resolve_round(&mut conn, running.id, round_no, 1, "not it", 2_000, &cfg).unwrap();
        battle::resolve_round(&mut conn, running.id, round_no, 2, &round.answer, 3_000, &cfg)
            .unwrap();
    }

    let outcome = battle::finalize_battle(&mut conn, running.id, NOW, &cfg).unwrap();
    assert_eq!(outcome.winner_id, Some(2));
    assert_eq!(outcome.host_elo_delta, -outcome.guest_elo_delta);

    let winner = profile::get_profile(&conn, 2).unwrap();
    let loser = profile::get_profile(&conn, 1).unwrap();
    assert!(winner.elo > loser.elo);
    assert_eq!(winner.elo + loser.elo, 2 * cfg.battle.starting_elo);

    let board = profile::top_by_elo(&conn, 10).unwrap();
    assert_eq!(board[0].user_id, 2);

    // Terminal battles stay terminal.
    let err = battle::cancel_battle(&conn, running.id, 1).unwrap_err();
    assert!(matches!(err, EngineError::StateConflict(_)));
}
