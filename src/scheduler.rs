// src/scheduler.rs

use log::{debug, info};
use rusqlite::Connection;

use crate::config::ReviewConfig;
use crate::constants::*;
use crate::error::{EngineError, Result};
use crate::models::{MasteryTier, ReviewResult, VocabularyCard};
use crate::repository;

/// Post-review card state computed by one SM-2 step.
#[derive(Debug, Clone, Copy)]
pub struct ReviewOutcome {
    pub ease_factor: f64,
    pub interval_days: i64,
    pub repetitions: i64,
    pub consecutive_correct: i64,
    pub tier: MasteryTier,
    pub next_due_ts: i64,
}

/// One SM-2 step. Pure: same card, quality and clock always give the same
/// outcome.
///
/// quality < 3 regresses the card: repetitions and the correct streak reset,
/// the interval drops back to one day. quality >= 3 advances it: fixed steps
/// of 1 and 6 days for the first two repetitions, then the multiplicative
/// formula. The ease factor is adjusted on every answer and clamped.
pub fn review_step(
    card: &VocabularyCard,
    quality: u8,
    now_ts: i64,
    cfg: &ReviewConfig,
) -> ReviewOutcome {
    let q = quality as f64;
    let ease = (card.ease_factor + (0.1 - (5.0 - q) * (0.08 + (5.0 - q) * 0.02)))
        .clamp(cfg.ease_factor_min, cfg.ease_factor_max);

    debug!(
        "[SM-2 Input] card {}: q={}, reps={}, interval={}d, ef={:.2}",
        card.id, quality, card.repetitions, card.interval_days, card.ease_factor
    );

    let (repetitions, interval_days, consecutive_correct) = if quality < QUALITY_PASS {
        (0, INTERVAL_FIRST_DAYS, 0)
    } else {
        let reps = card.repetitions + 1;
        let interval = match reps {
            1 => INTERVAL_FIRST_DAYS,
            2 => INTERVAL_SECOND_DAYS,
            _ => (card.interval_days as f64 * ease).round() as i64,
        };
        (reps, interval.min(cfg.interval_max_days), card.consecutive_correct + 1)
    };

    let tier = if consecutive_correct >= cfg.mastered_tier_streak {
        MasteryTier::Mastered
    } else if consecutive_correct >= cfg.review_tier_streak {
        MasteryTier::Review
    } else {
        MasteryTier::Learning
    };

    ReviewOutcome {
        ease_factor: ease,
        interval_days,
        repetitions,
        consecutive_correct,
        tier,
        next_due_ts: now_ts + interval_days * DAY_SECONDS,
    }
}

/// Processes one review submission for a card the user owns.
pub fn submit_review(
    conn: &Connection,
    user_id: i64,
    card_id: i64,
    quality: u8,
    now_ts: i64,
    cfg: &ReviewConfig,
) -> Result<ReviewResult> {
    if quality > QUALITY_MAX {
        return Err(EngineError::validation(format!(
            "quality must be within 0..={QUALITY_MAX}, got {quality}"
        )));
    }

    let mut card = repository::get_card(conn, card_id)?
        .filter(|c| c.user_id == user_id)
        .ok_or_else(|| EngineError::not_found(format!("card {card_id} for user {user_id}")))?;

    let outcome = review_step(&card, quality, now_ts, cfg);

    info!(
        "[SM-2 Result] card {}: ef {:.2} -> {:.2}, interval {}d -> {}d, tier {}",
        card.id,
        card.ease_factor,
        outcome.ease_factor,
        card.interval_days,
        outcome.interval_days,
        outcome.tier.as_str()
    );

    card.ease_factor = outcome.ease_factor;
    card.interval_days = outcome.interval_days;
    card.repetitions = outcome.repetitions;
    card.consecutive_correct = outcome.consecutive_correct;
    card.tier = outcome.tier;
    card.next_due_ts = outcome.next_due_ts;
    card.last_review_ts = Some(now_ts);
    repository::update_card(conn, &card)?;

    Ok(ReviewResult {
        card_id: card.id,
        word_id: card.word_id,
        quality,
        ease_factor: card.ease_factor,
        interval_days: card.interval_days,
        repetitions: card.repetitions,
        tier: card.tier,
        next_due_ts: card.next_due_ts,
    })
}

/// First learn action for a word: creates the card, due immediately.
pub fn learn_word(
    conn: &Connection,
    user_id: i64,
    word_id: i64,
    now_ts: i64,
) -> Result<VocabularyCard> {
    if !repository::word_exists(conn, word_id)? {
        return Err(EngineError::not_found(format!("word {word_id}")));
    }
    if repository::find_card(conn, user_id, word_id)?.is_some() {
        return Err(EngineError::conflict(format!(
            "user {user_id} already learned word {word_id}"
        )));
    }

    let card_id = repository::insert_card(conn, user_id, word_id, EASE_FACTOR_DEFAULT, now_ts)?;
    info!("user {user_id} learned word {word_id} (card {card_id})");

    repository::get_card(conn, card_id)?
        .ok_or_else(|| EngineError::not_found(format!("card {card_id}")))
}

/// The review queue: cards due at or before `now_ts`, most overdue first.
pub fn due_cards(
    conn: &Connection,
    user_id: i64,
    now_ts: i64,
    limit: u32,
) -> Result<Vec<VocabularyCard>> {
    Ok(repository::due_cards(conn, user_id, now_ts, limit)?)
}
