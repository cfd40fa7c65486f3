// src/config.rs

use std::collections::HashMap;

use serde::Deserialize;

use crate::constants::*;
use crate::models::LessonType;

/// Tuning knobs for every part of the engine. All algorithm entry points take
/// the relevant section explicitly so behavior stays reproducible; nothing in
/// the crate reads ambient global state.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub review: ReviewConfig,
    pub unlock: UnlockConfig,
    pub rewards: RewardTable,
    pub battle: BattleConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReviewConfig {
    pub ease_factor_min: f64,
    pub ease_factor_max: f64,
    pub interval_max_days: i64,
    pub review_tier_streak: i64,
    pub mastered_tier_streak: i64,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        ReviewConfig {
            ease_factor_min: EASE_FACTOR_MIN,
            ease_factor_max: EASE_FACTOR_MAX,
            interval_max_days: INTERVAL_MAX_DAYS,
            review_tier_streak: TIER_REVIEW_STREAK,
            mastered_tier_streak: TIER_MASTERED_STREAK,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UnlockConfig {
    /// Forces every node unlocked. Meant for content QA, never production.
    pub test_mode: bool,
    /// Level code that is unlocked unconditionally.
    pub root_level_code: String,
    /// Completion percentage of the previous unit/level required to unlock.
    pub completion_pct: f64,
}

impl Default for UnlockConfig {
    fn default() -> Self {
        UnlockConfig {
            test_mode: false,
            root_level_code: ROOT_LEVEL_CODE.to_string(),
            completion_pct: UNLOCK_COMPLETION_PCT,
        }
    }
}

/// Base payout and limits for one lesson type.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RewardSpec {
    pub xp: i64,
    pub coins: i64,
    pub time_limit_secs: i64,
    pub xp_ceiling: i64,
    pub coin_ceiling: i64,
}

/// Per-type reward mapping. New lesson types are additive: add an entry here
/// instead of scattering literals through the calculator.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RewardTable {
    pub pass_score: u8,
    pub entries: HashMap<LessonType, RewardSpec>,
}

impl RewardTable {
    pub fn spec(&self, lesson_type: LessonType) -> RewardSpec {
        self.entries
            .get(&lesson_type)
            .copied()
            .unwrap_or_else(|| standard_spec())
    }
}

fn standard_spec() -> RewardSpec {
    RewardSpec {
        xp: 3,
        coins: 2,
        time_limit_secs: 300,
        xp_ceiling: 10,
        coin_ceiling: 5,
    }
}

impl Default for RewardTable {
    fn default() -> Self {
        let mut entries = HashMap::new();
        entries.insert(
            LessonType::Vocabulary,
            RewardSpec { xp: 3, coins: 2, time_limit_secs: 300, xp_ceiling: 10, coin_ceiling: 5 },
        );
        entries.insert(
            LessonType::Grammar,
            RewardSpec { xp: 4, coins: 2, time_limit_secs: 420, xp_ceiling: 10, coin_ceiling: 5 },
        );
        entries.insert(
            LessonType::Practice,
            RewardSpec { xp: 3, coins: 1, time_limit_secs: 300, xp_ceiling: 10, coin_ceiling: 5 },
        );
        entries.insert(
            LessonType::Conversation,
            RewardSpec { xp: 4, coins: 2, time_limit_secs: 600, xp_ceiling: 10, coin_ceiling: 5 },
        );
        entries.insert(LessonType::Standard, standard_spec());
        entries.insert(
            LessonType::Review,
            RewardSpec { xp: 2, coins: 1, time_limit_secs: 240, xp_ceiling: 10, coin_ceiling: 5 },
        );
        // Tests pay more and are allowed a higher ceiling.
        entries.insert(
            LessonType::Test,
            RewardSpec { xp: 8, coins: 4, time_limit_secs: 900, xp_ceiling: 20, coin_ceiling: 10 },
        );
        RewardTable { pass_score: PASS_SCORE, entries }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BattleConfig {
    pub starting_elo: i64,
    pub k_factor: f64,
    pub rating_window: i64,
    pub rounds: u32,
    pub wait_timeout_secs: i64,
    pub max_response_ms: u32,
    pub base_points: u32,
    pub time_bonus_max: u32,
    pub win_xp: i64,
    pub win_coins: i64,
    pub win_gems: i64,
    pub loss_xp: i64,
    pub loss_coins: i64,
    pub draw_xp: i64,
    pub draw_coins: i64,
}

impl Default for BattleConfig {
    fn default() -> Self {
        BattleConfig {
            starting_elo: ELO_START,
            k_factor: ELO_K_FACTOR,
            rating_window: MATCH_RATING_WINDOW,
            rounds: BATTLE_ROUNDS,
            wait_timeout_secs: BATTLE_WAIT_TIMEOUT_SECS,
            max_response_ms: ROUND_MAX_RESPONSE_MS,
            base_points: ROUND_BASE_POINTS,
            time_bonus_max: ROUND_TIME_BONUS_MAX,
            win_xp: 5,
            win_coins: 3,
            win_gems: 1,
            loss_xp: 1,
            loss_coins: 0,
            draw_xp: 2,
            draw_coins: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_covers_every_lesson_type() {
        let table = RewardTable::default();
        for ty in LessonType::ALL {
            assert!(table.entries.contains_key(&ty), "missing entry for {ty:?}");
        }
    }

    #[test]
    fn config_deserializes_with_overrides() {
        let cfg: EngineConfig = serde_json::from_str(
            r#"{ "unlock": { "test_mode": true }, "battle": { "k_factor": 24.0 } }"#,
        )
        .unwrap();
        assert!(cfg.unlock.test_mode);
        assert_eq!(cfg.battle.k_factor, 24.0);
        // Untouched sections keep their defaults.
        assert_eq!(cfg.review.ease_factor_min, EASE_FACTOR_MIN);
        assert_eq!(cfg.unlock.root_level_code, ROOT_LEVEL_CODE);
    }
}
