// src/battle.rs

use log::{debug, info};
use rusqlite::Connection;

use crate::config::{BattleConfig, EngineConfig};
use crate::constants::ELO_SCALE;
use crate::error::{EngineError, Result};
use crate::models::{Battle, BattleOutcome, BattleStatus, BattleType, RoundResult};
use crate::profile;
use crate::repository;

// --- ELO Math ---

/// Logistic expected score of the first rating against the second.
pub fn expected_score(rating: i64, opponent: i64) -> f64 {
    1.0 / (1.0 + 10f64.powf((opponent - rating) as f64 / ELO_SCALE))
}

/// Rating change for the host given the actual result (1 win, 0.5 draw,
/// 0 loss). One rounded delta is applied with opposite signs to both sides,
/// which keeps the exchange exactly zero-sum.
pub fn elo_delta(host_elo: i64, guest_elo: i64, host_actual: f64, k_factor: f64) -> i64 {
    (k_factor * (host_actual - expected_score(host_elo, guest_elo))).round() as i64
}

// --- Round Scoring ---

fn normalize_answer(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Correct answers earn the base plus a linear time-decay bonus; answering at
/// or past the response ceiling still earns the base.
fn round_points(correct: bool, time_ms: u32, cfg: &BattleConfig) -> i64 {
    if !correct {
        return 0;
    }
    let capped = time_ms.min(cfg.max_response_ms);
    let bonus = u64::from(cfg.max_response_ms - capped) * u64::from(cfg.time_bonus_max)
        / u64::from(cfg.max_response_ms);
    i64::from(cfg.base_points) + bonus as i64
}

// --- Lifecycle ---

fn get_battle_or_404(conn: &Connection, battle_id: i64) -> Result<Battle> {
    repository::get_battle(conn, battle_id)?
        .ok_or_else(|| EngineError::not_found(format!("battle {battle_id}")))
}

fn battle_for_participant(conn: &Connection, battle_id: i64, user_id: i64) -> Result<Battle> {
    let battle = get_battle_or_404(conn, battle_id)?;
    if !battle.is_participant(user_id) {
        return Err(EngineError::not_found(format!(
            "battle {battle_id} for user {user_id}"
        )));
    }
    Ok(battle)
}

/// Joins the oldest compatible waiting battle, or opens a new one. A user can
/// hold one open battle at a time.
pub fn find_match(
    conn: &mut Connection,
    user_id: i64,
    battle_type: BattleType,
    now_ts: i64,
    cfg: &EngineConfig,
) -> Result<Battle> {
    profile::ensure_profile(conn, user_id, cfg)?;

    if let Some(open_id) = repository::open_battle_for_user(conn, user_id)? {
        return Err(EngineError::conflict(format!(
            "user {user_id} already has open battle {open_id}"
        )));
    }

    let elo = profile::get_profile(conn, user_id)?.elo;
    let tx = conn.transaction()?;

    let battle = match repository::find_waiting_battle(
        &tx,
        battle_type,
        user_id,
        elo,
        cfg.battle.rating_window,
        now_ts,
    )? {
        Some(waiting) => {
            repository::set_guest(&tx, waiting.id, user_id)?;
            info!(
                "user {user_id} matched into battle {} against {}",
                waiting.id, waiting.host_id
            );
            get_battle_or_404(&tx, waiting.id)?
        }
        None => {
            let expires = now_ts + cfg.battle.wait_timeout_secs;
            let id = repository::insert_battle(&tx, battle_type, user_id, now_ts, expires)?;
            info!("user {user_id} waiting in new {} battle {id}", battle_type.as_str());
            get_battle_or_404(&tx, id)?
        }
    };

    tx.commit()?;
    Ok(battle)
}

/// Moves a ready battle into play and deals its rounds.
pub fn start_battle(
    conn: &mut Connection,
    battle_id: i64,
    user_id: i64,
    now_ts: i64,
    cfg: &EngineConfig,
) -> Result<Battle> {
    let battle = battle_for_participant(conn, battle_id, user_id)?;
    if battle.status != BattleStatus::Ready {
        return Err(EngineError::conflict(format!(
            "battle {battle_id} cannot start from {}",
            battle.status.as_str()
        )));
    }

    let words = repository::random_words(conn, cfg.battle.rounds)?;
    if words.is_empty() {
        return Err(EngineError::not_found("no words available for rounds".to_string()));
    }

    let tx = conn.transaction()?;
    for (i, (word_id, word, translation)) in words.iter().enumerate() {
        let prompt = format!("Translate: {translation}");
        repository::insert_round(&tx, battle_id, i as i64 + 1, *word_id, &prompt, word)?;
    }
    repository::set_battle_started(&tx, battle_id, words.len() as i64, now_ts)?;
    tx.commit()?;

    info!("battle {battle_id} started with {} rounds", words.len());
    get_battle_or_404(conn, battle_id)
}

/// Records one player's answer for a round. Each side answers each round at
/// most once.
pub fn resolve_round(
    conn: &mut Connection,
    battle_id: i64,
    round_no: i64,
    user_id: i64,
    answer: &str,
    time_ms: u32,
    cfg: &EngineConfig,
) -> Result<RoundResult> {
    let battle = battle_for_participant(conn, battle_id, user_id)?;
    if battle.status != BattleStatus::InProgress {
        return Err(EngineError::conflict(format!(
            "battle {battle_id} is {}, not in progress",
            battle.status.as_str()
        )));
    }

    let round = repository::get_round(conn, battle_id, round_no)?.ok_or_else(|| {
        EngineError::not_found(format!("round {round_no} of battle {battle_id}"))
    })?;

    let is_host = battle.host_id == user_id;
    let correct = normalize_answer(answer) == normalize_answer(&round.answer);
    let points = round_points(correct, time_ms, &cfg.battle);

    debug!(
        "[Battle] round {round_no} of {battle_id}: user {user_id} correct={correct} ({points} pts)"
    );

    let tx = conn.transaction()?;
    let recorded = repository::record_round_answer(
        &tx,
        battle_id,
        round_no,
        is_host,
        answer,
        correct,
        i64::from(time_ms),
        points,
    )?;
    if !recorded {
        return Err(EngineError::conflict(format!(
            "round {round_no} of battle {battle_id} already answered by user {user_id}"
        )));
    }
    repository::add_battle_score(&tx, battle_id, is_host, points)?;
    tx.commit()?;

    Ok(RoundResult { battle_id, round_no, correct, points })
}

/// Settles a finished battle: winner, zero-sum ELO exchange, payouts.
pub fn finalize_battle(
    conn: &mut Connection,
    battle_id: i64,
    now_ts: i64,
    cfg: &EngineConfig,
) -> Result<BattleOutcome> {
    let battle = get_battle_or_404(conn, battle_id)?;
    if battle.status != BattleStatus::InProgress {
        return Err(EngineError::conflict(format!(
            "battle {battle_id} is {}, not in progress",
            battle.status.as_str()
        )));
    }
    let guest_id = battle
        .guest_id
        .ok_or_else(|| EngineError::conflict(format!("battle {battle_id} has no opponent")))?;

    let outstanding = repository::unanswered_rounds(conn, battle_id)?;
    if outstanding > 0 {
        return Err(EngineError::conflict(format!(
            "battle {battle_id} has {outstanding} unanswered rounds"
        )));
    }

    let host = profile::get_profile(conn, battle.host_id)?;
    let guest = profile::get_profile(conn, guest_id)?;

    let (host_actual, winner_id) = match battle.host_score.cmp(&battle.guest_score) {
        std::cmp::Ordering::Greater => (1.0, Some(battle.host_id)),
        std::cmp::Ordering::Less => (0.0, Some(guest_id)),
        std::cmp::Ordering::Equal => (0.5, None),
    };
    let delta = elo_delta(host.elo, guest.elo, host_actual, cfg.battle.k_factor);

    let tx = conn.transaction()?;
    repository::apply_battle_result(&tx, battle.host_id, delta, winner_id.map(|w| w == battle.host_id))?;
    repository::apply_battle_result(&tx, guest_id, -delta, winner_id.map(|w| w == guest_id))?;

    // Payouts go through the same aggregate as lesson rewards.
    match winner_id {
        Some(winner) => {
            let loser = if winner == battle.host_id { guest_id } else { battle.host_id };
            profile::apply_reward(&tx, winner, cfg.battle.win_xp, cfg.battle.win_coins, cfg.battle.win_gems)?;
            profile::apply_reward(&tx, loser, cfg.battle.loss_xp, cfg.battle.loss_coins, 0)?;
        }
        None => {
            profile::apply_reward(&tx, battle.host_id, cfg.battle.draw_xp, cfg.battle.draw_coins, 0)?;
            profile::apply_reward(&tx, guest_id, cfg.battle.draw_xp, cfg.battle.draw_coins, 0)?;
        }
    }
    repository::set_battle_finished(&tx, battle_id, winner_id, delta, now_ts)?;
    tx.commit()?;

    info!(
        "[ELO Result] battle {battle_id}: host {} {:+}, guest {} {:+}, winner {:?}",
        battle.host_id, delta, guest_id, -delta, winner_id
    );

    Ok(BattleOutcome {
        battle_id,
        winner_id,
        host_score: battle.host_score,
        guest_score: battle.guest_score,
        host_elo_delta: delta,
        guest_elo_delta: -delta,
    })
}

/// Withdraws from a battle that has not started. In-progress and terminal
/// battles cannot be cancelled.
pub fn cancel_battle(conn: &Connection, battle_id: i64, user_id: i64) -> Result<Battle> {
    let battle = battle_for_participant(conn, battle_id, user_id)?;
    match battle.status {
        BattleStatus::Waiting | BattleStatus::Ready => {
            repository::set_battle_status(conn, battle_id, BattleStatus::Cancelled)?;
            info!("battle {battle_id} cancelled by user {user_id}");
            get_battle_or_404(conn, battle_id)
        }
        other => Err(EngineError::conflict(format!(
            "battle {battle_id} cannot be cancelled from {}",
            other.as_str()
        ))),
    }
}

/// Expires waiting battles whose window has passed. Meant to be driven by an
/// external periodic sweep.
pub fn expire_stale(conn: &Connection, now_ts: i64) -> Result<usize> {
    let swept = repository::expire_stale_battles(conn, now_ts)?;
    if swept > 0 {
        info!("expired {swept} stale battles");
    }
    Ok(swept)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database;

    const NOW: i64 = 1_700_000_000;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        database::init_db(&conn).unwrap();
        conn
    }

    /// Puts two users into an in_progress battle and returns it.
    fn running_battle(conn: &mut Connection, cfg: &EngineConfig) -> Battle {
        find_match(conn, 1, BattleType::Vocabulary, NOW, cfg).unwrap();
        let battle = find_match(conn, 2, BattleType::Vocabulary, NOW, cfg).unwrap();
        assert_eq!(battle.status, BattleStatus::Ready);
        start_battle(conn, battle.id, 1, NOW, cfg).unwrap()
    }

    /// Both players answer every round; the host answers correctly and fast,
    /// the guest is always wrong.
    fn play_all_rounds(conn: &mut Connection, battle: &Battle, cfg: &EngineConfig) {
        for round_no in 1..=battle.round_count {
            let round = repository::get_round(conn, battle.id, round_no).unwrap().unwrap();
            resolve_round(conn, battle.id, round_no, 1, &round.answer, 1_000, cfg).unwrap();
            resolve_round(conn, battle.id, round_no, 2, "wrong", 9_000, cfg).unwrap();
        }
    }

    #[test]
    fn matchmaking_pairs_two_users() {
        let mut conn = conn();
        let cfg = EngineConfig::default();

        let waiting = find_match(&mut conn, 1, BattleType::Vocabulary, NOW, &cfg).unwrap();
        assert_eq!(waiting.status, BattleStatus::Waiting);
        assert_eq!(waiting.guest_id, None);

        let ready = find_match(&mut conn, 2, BattleType::Vocabulary, NOW, &cfg).unwrap();
        assert_eq!(ready.id, waiting.id);
        assert_eq!(ready.status, BattleStatus::Ready);
        assert_eq!(ready.guest_id, Some(2));
    }

    #[test]
    fn matchmaking_respects_the_rating_window() {
        let mut conn = conn();
        let cfg = EngineConfig::default();
        find_match(&mut conn, 1, BattleType::Vocabulary, NOW, &cfg).unwrap();

        // Push user 2 far above the window; they get their own battle.
        crate::profile::ensure_profile(&conn, 2, &cfg).unwrap();
        repository::apply_battle_result(&conn, 2, cfg.battle.rating_window + 1, None).unwrap();
        let other = find_match(&mut conn, 2, BattleType::Vocabulary, NOW, &cfg).unwrap();
        assert_eq!(other.status, BattleStatus::Waiting);
        assert_eq!(other.host_id, 2);
    }

    #[test]
    fn one_open_battle_per_user() {
        let mut conn = conn();
        let cfg = EngineConfig::default();
        find_match(&mut conn, 1, BattleType::Vocabulary, NOW, &cfg).unwrap();
        let err = find_match(&mut conn, 1, BattleType::Mixed, NOW, &cfg).unwrap_err();
        assert!(matches!(err, EngineError::StateConflict(_)));
    }

    #[test]
    fn battle_types_do_not_mix() {
        let mut conn = conn();
        let cfg = EngineConfig::default();
        find_match(&mut conn, 1, BattleType::Grammar, NOW, &cfg).unwrap();
        let other = find_match(&mut conn, 2, BattleType::Vocabulary, NOW, &cfg).unwrap();
        assert_eq!(other.status, BattleStatus::Waiting);
    }

    #[test]
    fn starting_deals_rounds() {
        let mut conn = conn();
        let cfg = EngineConfig::default();
        let battle = running_battle(&mut conn, &cfg);
        assert_eq!(battle.status, BattleStatus::InProgress);
        assert_eq!(battle.round_count, i64::from(cfg.battle.rounds));
        assert!(repository::get_round(&conn, battle.id, 1).unwrap().is_some());
    }

    #[test]
    fn only_ready_battles_start() {
        let mut conn = conn();
        let cfg = EngineConfig::default();
        let waiting = find_match(&mut conn, 1, BattleType::Vocabulary, NOW, &cfg).unwrap();
        let err = start_battle(&mut conn, waiting.id, 1, NOW, &cfg).unwrap_err();
        assert!(matches!(err, EngineError::StateConflict(_)));
    }

    #[test]
    fn outsiders_cannot_touch_a_battle() {
        let mut conn = conn();
        let cfg = EngineConfig::default();
        let battle = running_battle(&mut conn, &cfg);
        let err = resolve_round(&mut conn, battle.id, 1, 99, "hello", 500, &cfg).unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }

    #[test]
    fn faster_correct_answers_score_higher() {
        let cfg = BattleConfig::default();
        let fast = round_points(true, 1_000, &cfg);
        let slow = round_points(true, cfg.max_response_ms, &cfg);
        assert!(fast > slow);
        assert_eq!(slow, i64::from(cfg.base_points));
        assert_eq!(round_points(false, 1, &cfg), 0);
        // Past the ceiling the clamp holds the bonus at zero.
        assert_eq!(round_points(true, cfg.max_response_ms + 5_000, &cfg), slow);
    }

    #[test]
    fn each_side_answers_a_round_once() {
        let mut conn = conn();
        let cfg = EngineConfig::default();
        let battle = running_battle(&mut conn, &cfg);

        resolve_round(&mut conn, battle.id, 1, 1, "whatever", 500, &cfg).unwrap();
        let err = resolve_round(&mut conn, battle.id, 1, 1, "again", 500, &cfg).unwrap_err();
        assert!(matches!(err, EngineError::StateConflict(_)));
        // The other side is unaffected.
        resolve_round(&mut conn, battle.id, 1, 2, "whatever", 500, &cfg).unwrap();
    }

    #[test]
    fn finalize_requires_all_rounds_answered() {
        let mut conn = conn();
        let cfg = EngineConfig::default();
        let battle = running_battle(&mut conn, &cfg);
        let err = finalize_battle(&mut conn, battle.id, NOW, &cfg).unwrap_err();
        assert!(matches!(err, EngineError::StateConflict(_)));
    }

    #[test]
    fn finalize_is_zero_sum_and_pays_out() {
        let mut conn = conn();
        let cfg = EngineConfig::default();
        let battle = running_battle(&mut conn, &cfg);
        let elo_before: i64 = 2 * cfg.battle.starting_elo;

        play_all_rounds(&mut conn, &battle, &cfg);
        let outcome = finalize_battle(&mut conn, battle.id, NOW, &cfg).unwrap();

        assert_eq!(outcome.winner_id, Some(1));
        assert_eq!(outcome.host_elo_delta, -outcome.guest_elo_delta);

        let host = profile::get_profile(&conn, 1).unwrap();
        let guest = profile::get_profile(&conn, 2).unwrap();
        assert_eq!(host.elo + guest.elo, elo_before);
        assert_eq!((host.wins, host.losses), (1, 0));
        assert_eq!((guest.wins, guest.losses), (0, 1));
        assert_eq!(host.xp, cfg.battle.win_xp);
        assert_eq!(host.gems, cfg.battle.win_gems);
        assert_eq!(guest.xp, cfg.battle.loss_xp);

        let finished = repository::get_battle(&conn, battle.id).unwrap().unwrap();
        assert_eq!(finished.status, BattleStatus::Completed);
        assert_eq!(finished.elo_delta, Some(outcome.host_elo_delta));
    }

    #[test]
    fn equal_scores_draw_without_tally_changes() {
        let mut conn = conn();
        let cfg = EngineConfig::default();
        let battle = running_battle(&mut conn, &cfg);

        for round_no in 1..=battle.round_count {
            resolve_round(&mut conn, battle.id, round_no, 1, "wrong", 500, &cfg).unwrap();
            resolve_round(&mut conn, battle.id, round_no, 2, "wrong", 500, &cfg).unwrap();
        }
        let outcome = finalize_battle(&mut conn, battle.id, NOW, &cfg).unwrap();
        assert_eq!(outcome.winner_id, None);
        // Equal ratings: expected = actual = 0.5, nothing moves.
        assert_eq!(outcome.host_elo_delta, 0);

        let host = profile::get_profile(&conn, 1).unwrap();
        assert_eq!((host.wins, host.losses), (0, 0));
        assert_eq!(host.xp, cfg.battle.draw_xp);
    }

    #[test]
    fn double_finalize_conflicts() {
        let mut conn = conn();
        let cfg = EngineConfig::default();
        let battle = running_battle(&mut conn, &cfg);
        play_all_rounds(&mut conn, &battle, &cfg);
        finalize_battle(&mut conn, battle.id, NOW, &cfg).unwrap();
        let err = finalize_battle(&mut conn, battle.id, NOW, &cfg).unwrap_err();
        assert!(matches!(err, EngineError::StateConflict(_)));
    }

    #[test]
    fn cancel_only_before_start() {
        let mut conn = conn();
        let cfg = EngineConfig::default();

        let waiting = find_match(&mut conn, 1, BattleType::Vocabulary, NOW, &cfg).unwrap();
        let cancelled = cancel_battle(&conn, waiting.id, 1).unwrap();
        assert_eq!(cancelled.status, BattleStatus::Cancelled);

        let battle = running_battle(&mut conn, &cfg);
        let err = cancel_battle(&conn, battle.id, 1).unwrap_err();
        assert!(matches!(err, EngineError::StateConflict(_)));
    }

    #[test]
    fn stale_waiting_battles_expire() {
        let mut conn = conn();
        let cfg = EngineConfig::default();
        let waiting = find_match(&mut conn, 1, BattleType::Vocabulary, NOW, &cfg).unwrap();

        assert_eq!(expire_stale(&conn, NOW + 1).unwrap(), 0);
        let swept = expire_stale(&conn, waiting.expires_ts).unwrap();
        assert_eq!(swept, 1);
        let battle = repository::get_battle(&conn, waiting.id).unwrap().unwrap();
        assert_eq!(battle.status, BattleStatus::Expired);

        // Expired hosts can queue again.
        find_match(&mut conn, 1, BattleType::Vocabulary, NOW, &cfg).unwrap();
    }

    #[test]
    fn elo_exchange_favors_the_underdog() {
        let k = BattleConfig::default().k_factor;
        let upset = elo_delta(1000, 1400, 1.0, k);
        let expected_win = elo_delta(1400, 1000, 1.0, k);
        assert!(upset > expected_win);
        assert!(expected_win >= 0);
        // Symmetry: a loss mirrors the opponent's win.
        assert_eq!(elo_delta(1000, 1400, 0.0, k), -elo_delta(1400, 1000, 1.0, k));
    }
}
