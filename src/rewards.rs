// src/rewards.rs

use log::debug;

use crate::config::RewardTable;
use crate::constants::*;
use crate::models::{LessonType, RewardResult};

/// Star grade for a score, independent of reward eligibility.
pub fn stars_for_score(score: u8) -> u8 {
    if score >= STARS_THREE_SCORE {
        3
    } else if score >= STARS_TWO_SCORE {
        2
    } else if score >= STARS_ONE_SCORE {
        1
    } else {
        0
    }
}

/// Streak bonus brackets. [3,5) and [5,10) both pay +1; the observed plateau
/// is kept until product says otherwise. Non-decreasing in the streak.
fn streak_bonus(max_streak: u32) -> i64 {
    if max_streak >= STREAK_TIER_HIGH {
        2
    } else if max_streak >= STREAK_TIER_MID {
        1
    } else if max_streak >= STREAK_TIER_LOW {
        1
    } else {
        0
    }
}

/// Computes the payout for one lesson submission. Pure and total: callers
/// enforce score range and the pass threshold before crediting anything.
///
/// XP and coins are only paid on the first completion; retries always get
/// zero. Stars are graded on every call.
pub fn calculate_lesson_rewards(
    lesson_type: LessonType,
    score: u8,
    time_spent_secs: i64,
    max_streak: u32,
    is_first_completion: bool,
    table: &RewardTable,
) -> RewardResult {
    let stars = stars_for_score(score);

    if !is_first_completion {
        return RewardResult { xp: 0, coins: 0, stars, first_completion: false };
    }

    let spec = table.spec(lesson_type);
    let mut xp = spec.xp;
    let mut coins = spec.coins;

    if score >= ACCURACY_BONUS_SCORE {
        xp += 1;
    }
    if time_spent_secs <= spec.time_limit_secs {
        xp += 1;
    }
    xp += streak_bonus(max_streak);
    if score == SCORE_MAX {
        xp += 1;
        coins += 1;
    }

    let xp = xp.min(spec.xp_ceiling);
    let coins = coins.min(spec.coin_ceiling);

    debug!(
        "[Rewards] {} score={} streak={}: xp={} coins={} stars={}",
        lesson_type.as_str(),
        score,
        max_streak,
        xp,
        coins,
        stars
    );

    RewardResult { xp, coins, stars, first_completion: true }
}
