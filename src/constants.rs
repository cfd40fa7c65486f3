// src/constants.rs

// --- Time Constants ---
pub const DAY_SECONDS: i64 = 86400;

// --- Spaced Repetition (SM-2) Parameters ---
pub const QUALITY_MAX: u8 = 5;
pub const QUALITY_PASS: u8 = 3; // Below this the card regresses

pub const EASE_FACTOR_DEFAULT: f64 = 2.5;
pub const EASE_FACTOR_MIN: f64 = 1.3;
pub const EASE_FACTOR_MAX: f64 = 5.0;

pub const INTERVAL_FIRST_DAYS: i64 = 1;
pub const INTERVAL_SECOND_DAYS: i64 = 6;
pub const INTERVAL_MAX_DAYS: i64 = 365;

// --- Mastery Tiers ---
// Consecutive correct reviews required for each tier.
pub const TIER_REVIEW_STREAK: i64 = 3;
pub const TIER_MASTERED_STREAK: i64 = 5;

// --- Progression / Unlocking ---
pub const UNLOCK_COMPLETION_PCT: f64 = 80.0;
pub const ROOT_LEVEL_CODE: &str = "A1";

// --- Lesson Rewards ---
pub const SCORE_MAX: u8 = 100;
pub const PASS_SCORE: u8 = 80; // Submissions below this are rejected outright
pub const ACCURACY_BONUS_SCORE: u8 = 90;

pub const STREAK_TIER_LOW: u32 = 3;
pub const STREAK_TIER_MID: u32 = 5;
pub const STREAK_TIER_HIGH: u32 = 10;

pub const STARS_THREE_SCORE: u8 = 90;
pub const STARS_TWO_SCORE: u8 = 70;
pub const STARS_ONE_SCORE: u8 = 50;

// --- Battles / ELO ---
pub const ELO_START: i64 = 1200;
pub const ELO_K_FACTOR: f64 = 32.0;
pub const ELO_SCALE: f64 = 400.0;

pub const MATCH_RATING_WINDOW: i64 = 200;
pub const BATTLE_ROUNDS: u32 = 5;
pub const BATTLE_WAIT_TIMEOUT_SECS: i64 = 120;

pub const ROUND_MAX_RESPONSE_MS: u32 = 10_000;
pub const ROUND_BASE_POINTS: u32 = 100;
pub const ROUND_TIME_BONUS_MAX: u32 = 50;
