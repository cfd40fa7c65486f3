// src/lessons.rs

use chrono::DateTime;
use log::info;
use rusqlite::Connection;

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::models::RewardResult;
use crate::profile;
use crate::progression;
use crate::repository;
use crate::rewards;

/// Processes one lesson submission.
///
/// Runs the whole mutation inside a single transaction: progress upsert, the
/// compare-and-set into completed, reward computation, and the profile
/// credit either all commit or none do. The CAS row count decides first
/// completion, so concurrent duplicate submissions serialize and exactly one
/// of them is credited.
pub fn complete_lesson(
    conn: &mut Connection,
    user_id: i64,
    lesson_id: i64,
    score: u8,
    time_spent_secs: i64,
    max_streak: u32,
    now_ts: i64,
    cfg: &EngineConfig,
) -> Result<RewardResult> {
    if score > 100 {
        return Err(EngineError::validation(format!(
            "score must be within 0..=100, got {score}"
        )));
    }

    let lesson_type = repository::get_lesson_type(conn, lesson_id)?
        .ok_or_else(|| EngineError::not_found(format!("lesson {lesson_id}")))?;

    if score < cfg.rewards.pass_score {
        // Rejected outright: no attempt, no progress row, nothing.
        return Err(EngineError::validation(format!(
            "score {score} below pass threshold {}",
            cfg.rewards.pass_score
        )));
    }

    let mut snapshot = repository::load_snapshot(conn, user_id)?;
    if !progression::is_lesson_unlocked(&snapshot, lesson_id, &cfg.unlock) {
        return Err(EngineError::conflict(format!(
            "lesson {lesson_id} is locked for user {user_id}"
        )));
    }

    let tx = conn.transaction()?;

    profile::ensure_profile(&tx, user_id, cfg)?;
    repository::ensure_progress(&tx, user_id, lesson_id)?;
    let first = repository::mark_completed(&tx, user_id, lesson_id, now_ts)?;
    repository::record_attempt(&tx, user_id, lesson_id, i64::from(score), time_spent_secs)?;

    let reward = rewards::calculate_lesson_rewards(
        lesson_type,
        score,
        time_spent_secs,
        max_streak,
        first,
        &cfg.rewards,
    );

    if first {
        repository::set_progress_rewards(&tx, user_id, lesson_id, reward.xp, reward.coins)?;
        profile::apply_reward(&tx, user_id, reward.xp, reward.coins, 0)?;
    }

    let today = DateTime::from_timestamp(now_ts, 0)
        .ok_or_else(|| EngineError::validation(format!("bad timestamp {now_ts}")))?
        .date_naive();
    profile::touch_streak(&tx, user_id, today)?;

    // Completing a lesson can open the next level; keep the profile's level
    // reference in step with the derived unlock view.
    snapshot.completed.insert(lesson_id);
    if let Some(level) = progression::highest_unlocked_level(&snapshot, &cfg.unlock) {
        repository::set_profile_level(&tx, user_id, &level.code)?;
    }

    tx.commit()?;

    info!(
        "user {user_id} completed lesson {lesson_id}: score={score} first={} xp={} coins={}",
        first, reward.xp, reward.coins
    );

    Ok(reward)
}
