// src/models.rs

use std::collections::HashSet;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// --- Enums ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MasteryTier {
    New,
    Learning,
    Review,
    Mastered,
}

impl MasteryTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            MasteryTier::New => "new",
            MasteryTier::Learning => "learning",
            MasteryTier::Review => "review",
            MasteryTier::Mastered => "mastered",
        }
    }
}

impl FromStr for MasteryTier {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(MasteryTier::New),
            "learning" => Ok(MasteryTier::Learning),
            "review" => Ok(MasteryTier::Review),
            "mastered" => Ok(MasteryTier::Mastered),
            _ => Err(format!("unknown mastery tier: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LessonType {
    Vocabulary,
    Grammar,
    Practice,
    Conversation,
    Standard,
    Review,
    Test,
}

impl LessonType {
    pub const ALL: [LessonType; 7] = [
        LessonType::Vocabulary,
        LessonType::Grammar,
        LessonType::Practice,
        LessonType::Conversation,
        LessonType::Standard,
        LessonType::Review,
        LessonType::Test,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LessonType::Vocabulary => "vocabulary",
            LessonType::Grammar => "grammar",
            LessonType::Practice => "practice",
            LessonType::Conversation => "conversation",
            LessonType::Standard => "standard",
            LessonType::Review => "review",
            LessonType::Test => "test",
        }
    }
}

impl FromStr for LessonType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "vocabulary" => Ok(LessonType::Vocabulary),
            "grammar" => Ok(LessonType::Grammar),
            "practice" => Ok(LessonType::Practice),
            "conversation" => Ok(LessonType::Conversation),
            "standard" => Ok(LessonType::Standard),
            "review" => Ok(LessonType::Review),
            "test" => Ok(LessonType::Test),
            _ => Err(format!("unknown lesson type: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    NotStarted,
    InProgress,
    Completed,
}

impl ProgressStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProgressStatus::NotStarted => "not_started",
            ProgressStatus::InProgress => "in_progress",
            ProgressStatus::Completed => "completed",
        }
    }
}

impl FromStr for ProgressStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_started" => Ok(ProgressStatus::NotStarted),
            "in_progress" => Ok(ProgressStatus::InProgress),
            "completed" => Ok(ProgressStatus::Completed),
            _ => Err(format!("unknown progress status: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BattleStatus {
    Waiting,
    Ready,
    InProgress,
    Completed,
    Expired,
    Cancelled,
}

impl BattleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BattleStatus::Waiting => "waiting",
            BattleStatus::Ready => "ready",
            BattleStatus::InProgress => "in_progress",
            BattleStatus::Completed => "completed",
            BattleStatus::Expired => "expired",
            BattleStatus::Cancelled => "cancelled",
        }
    }

    /// Terminal states admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BattleStatus::Completed | BattleStatus::Expired | BattleStatus::Cancelled
        )
    }
}

impl FromStr for BattleStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "waiting" => Ok(BattleStatus::Waiting),
            "ready" => Ok(BattleStatus::Ready),
            "in_progress" => Ok(BattleStatus::InProgress),
            "completed" => Ok(BattleStatus::Completed),
            "expired" => Ok(BattleStatus::Expired),
            "cancelled" => Ok(BattleStatus::Cancelled),
            _ => Err(format!("unknown battle status: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BattleType {
    Vocabulary,
    Grammar,
    Mixed,
}

impl BattleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BattleType::Vocabulary => "vocabulary",
            BattleType::Grammar => "grammar",
            BattleType::Mixed => "mixed",
        }
    }
}

impl FromStr for BattleType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "vocabulary" => Ok(BattleType::Vocabulary),
            "grammar" => Ok(BattleType::Grammar),
            "mixed" => Ok(BattleType::Mixed),
            _ => Err(format!("unknown battle type: {s}")),
        }
    }
}

// --- Persisted Entities ---

/// Per-(user, word) spaced-repetition state. Created on the first learn
/// action, mutated on every review, never deleted.
#[derive(Debug, Clone, Serialize)]
pub struct VocabularyCard {
    pub id: i64,
    pub user_id: i64,
    pub word_id: i64,
    pub ease_factor: f64,
    pub interval_days: i64,
    pub repetitions: i64,
    pub consecutive_correct: i64,
    pub tier: MasteryTier,
    pub next_due_ts: i64,
    pub last_review_ts: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LessonProgress {
    pub user_id: i64,
    pub lesson_id: i64,
    pub status: ProgressStatus,
    pub best_score: i64,
    pub attempts: i64,
    pub time_spent_secs: i64,
    pub xp_earned: i64,
    pub coins_earned: i64,
    pub completed_ts: Option<i64>,
}

/// Per-user aggregate everything reward-granting reports into.
#[derive(Debug, Clone, Serialize)]
pub struct Profile {
    pub user_id: i64,
    pub xp: i64,
    pub coins: i64,
    pub gems: i64,
    pub current_level: String,
    pub current_streak: i64,
    pub longest_streak: i64,
    pub last_active: Option<NaiveDate>,
    pub elo: i64,
    pub wins: i64,
    pub losses: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Battle {
    pub id: i64,
    pub battle_type: BattleType,
    pub status: BattleStatus,
    pub host_id: i64,
    pub guest_id: Option<i64>,
    pub host_score: i64,
    pub guest_score: i64,
    pub round_count: i64,
    /// Host's rating delta after finalization; the guest's is its negation.
    pub elo_delta: Option<i64>,
    pub winner_id: Option<i64>,
    pub created_ts: i64,
    pub expires_ts: i64,
    pub started_ts: Option<i64>,
    pub finished_ts: Option<i64>,
}

impl Battle {
    pub fn is_participant(&self, user_id: i64) -> bool {
        self.host_id == user_id || self.guest_id == Some(user_id)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BattleRound {
    pub battle_id: i64,
    pub round_no: i64,
    pub word_id: i64,
    pub prompt: String,
    pub answer: String,
    pub host_answer: Option<String>,
    pub host_correct: Option<bool>,
    pub host_time_ms: Option<i64>,
    pub host_points: i64,
    pub guest_answer: Option<String>,
    pub guest_correct: Option<bool>,
    pub guest_time_ms: Option<i64>,
    pub guest_points: i64,
}

// --- Result Payloads ---

#[derive(Debug, Clone, Serialize)]
pub struct ReviewResult {
    pub card_id: i64,
    pub word_id: i64,
    pub quality: u8,
    pub ease_factor: f64,
    pub interval_days: i64,
    pub repetitions: i64,
    pub tier: MasteryTier,
    pub next_due_ts: i64,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct RewardResult {
    pub xp: i64,
    pub coins: i64,
    pub stars: u8,
    pub first_completion: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RoundResult {
    pub battle_id: i64,
    pub round_no: i64,
    pub correct: bool,
    pub points: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BattleOutcome {
    pub battle_id: i64,
    /// None on a draw.
    pub winner_id: Option<i64>,
    pub host_score: i64,
    pub guest_score: i64,
    pub host_elo_delta: i64,
    pub guest_elo_delta: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LeaderboardEntry {
    pub user_id: i64,
    pub xp: i64,
    pub elo: i64,
    pub current_streak: i64,
    pub wins: i64,
}

// --- Unlock Graph View ---

/// Read-only snapshot the unlock engine evaluates against. Built from
/// progress records at read time; the graph itself is never persisted.
#[derive(Debug, Clone)]
pub struct ProgressSnapshot {
    pub levels: Vec<LevelNode>,
    pub completed: HashSet<i64>,
}

#[derive(Debug, Clone)]
pub struct LevelNode {
    pub id: i64,
    pub code: String,
    pub units: Vec<UnitNode>,
}

#[derive(Debug, Clone)]
pub struct UnitNode {
    pub id: i64,
    pub lessons: Vec<LessonNode>,
}

#[derive(Debug, Clone)]
pub struct LessonNode {
    pub id: i64,
    pub lesson_type: LessonType,
}

/// Node reference for the unified unlock query.
#[derive(Debug, Clone, Copy)]
pub enum Node<'a> {
    Level(&'a str),
    Unit(i64),
    Lesson(i64),
}

// --- Seed Input Models ---

// Used for seeding the curriculum from the embedded JSON catalog.
#[derive(Deserialize)]
pub struct JsonLevel {
    pub code: String,
    pub name: String,
    pub units: Vec<JsonUnit>,
}

#[derive(Deserialize)]
pub struct JsonUnit {
    pub name: String,
    pub lessons: Vec<JsonLesson>,
}

#[derive(Deserialize)]
pub struct JsonLesson {
    pub title: String,
    #[serde(rename = "type")]
    pub lesson_type: String,
    #[serde(default)]
    pub words: Vec<JsonWord>,
}

#[derive(Deserialize)]
pub struct JsonWord {
    pub word: String,
    pub translation: String,
    #[serde(default)]
    pub definition: Option<String>,
}
