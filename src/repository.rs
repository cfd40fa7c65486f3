// src/repository.rs

use std::str::FromStr;

use chrono::NaiveDate;
use log::debug;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Result, Row};

use crate::models::{
    Battle, BattleRound, BattleStatus, BattleType, LeaderboardEntry, LessonNode, LessonProgress,
    LessonType, LevelNode, MasteryTier, Profile, ProgressSnapshot, ProgressStatus, UnitNode,
    VocabularyCard,
};

/// Maps a TEXT column through `FromStr`, surfacing bad values as conversion
/// failures instead of defaulting silently.
fn parse_col<T>(idx: usize, raw: &str) -> Result<T>
where
    T: FromStr<Err = String>,
{
    raw.parse()
        .map_err(|e: String| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))
}

// --- Words ---

pub fn word_exists(conn: &Connection, word_id: i64) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT count(*) FROM words WHERE id = ?",
        [word_id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Draws a random word sample for battle round generation.
/// Returns (word_id, word, translation) tuples.
pub fn random_words(conn: &Connection, limit: u32) -> Result<Vec<(i64, String, String)>> {
    let mut stmt = conn.prepare(
        "SELECT id, word, translation FROM words ORDER BY RANDOM() LIMIT ?",
    )?;
    let rows = stmt
        .query_map([limit], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
        .collect::<Result<Vec<_>>>()?;
    Ok(rows)
}

// --- Vocabulary Cards ---

fn card_from_row(row: &Row) -> Result<VocabularyCard> {
    let tier: String = row.get(7)?;
    Ok(VocabularyCard {
        id: row.get(0)?,
        user_id: row.get(1)?,
        word_id: row.get(2)?,
        ease_factor: row.get(3)?,
        interval_days: row.get(4)?,
        repetitions: row.get(5)?,
        consecutive_correct: row.get(6)?,
        tier: parse_col::<MasteryTier>(7, &tier)?,
        next_due_ts: row.get(8)?,
        last_review_ts: row.get(9)?,
    })
}

const CARD_COLUMNS: &str = "id, user_id, word_id, ease_factor, interval_days, repetitions, \
                            consecutive_correct, tier, next_due_ts, last_review_ts";

pub fn get_card(conn: &Connection, card_id: i64) -> Result<Option<VocabularyCard>> {
    conn.query_row(
        &format!("SELECT {CARD_COLUMNS} FROM vocabulary_cards WHERE id = ?"),
        [card_id],
        card_from_row,
    )
    .optional()
}

pub fn find_card(conn: &Connection, user_id: i64, word_id: i64) -> Result<Option<VocabularyCard>> {
    conn.query_row(
        &format!("SELECT {CARD_COLUMNS} FROM vocabulary_cards WHERE user_id = ? AND word_id = ?"),
        [user_id, word_id],
        card_from_row,
    )
    .optional()
}

pub fn insert_card(
    conn: &Connection,
    user_id: i64,
    word_id: i64,
    ease_factor: f64,
    due_ts: i64,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO vocabulary_cards (user_id, word_id, ease_factor, next_due_ts) \
         VALUES (?, ?, ?, ?)",
        params![user_id, word_id, ease_factor, due_ts],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Saves the post-review card state.
pub fn update_card(conn: &Connection, card: &VocabularyCard) -> Result<()> {
    conn.execute(
        "UPDATE vocabulary_cards SET ease_factor = ?, interval_days = ?, repetitions = ?, \
         consecutive_correct = ?, tier = ?, next_due_ts = ?, last_review_ts = ? WHERE id = ?",
        params![
            card.ease_factor,
            card.interval_days,
            card.repetitions,
            card.consecutive_correct,
            card.tier.as_str(),
            card.next_due_ts,
            card.last_review_ts,
            card.id
        ],
    )?;
    Ok(())
}

/// The review queue: cards due at or before `now_ts`, most overdue first.
pub fn due_cards(
    conn: &Connection,
    user_id: i64,
    now_ts: i64,
    limit: u32,
) -> Result<Vec<VocabularyCard>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {CARD_COLUMNS} FROM vocabulary_cards \
         WHERE user_id = ? AND next_due_ts <= ? \
         ORDER BY next_due_ts ASC LIMIT ?",
    ))?;
    let rows = stmt
        .query_map(params![user_id, now_ts, limit], card_from_row)?
        .collect::<Result<Vec<_>>>()?;
    debug!("[DB] {} cards due for user {}", rows.len(), user_id);
    Ok(rows)
}

// --- Curriculum / Unlock Snapshot ---

pub fn get_lesson_type(conn: &Connection, lesson_id: i64) -> Result<Option<LessonType>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT lesson_type FROM lessons WHERE id = ?",
            [lesson_id],
            |row| row.get(0),
        )
        .optional()?;
    match raw {
        Some(s) => Ok(Some(parse_col::<LessonType>(0, &s)?)),
        None => Ok(None),
    }
}

/// Builds the read-only unlock view for one user: the full ordered content
/// tree plus the set of lessons that user has completed.
pub fn load_snapshot(conn: &Connection, user_id: i64) -> Result<ProgressSnapshot> {
    let mut stmt = conn.prepare(
        "SELECT lv.id, lv.code, u.id, ls.id, ls.lesson_type \
         FROM levels lv \
         JOIN units u ON u.level_id = lv.id \
         JOIN lessons ls ON ls.unit_id = u.id \
         ORDER BY lv.sort_order, u.sort_order, ls.sort_order",
    )?;

    let mut levels: Vec<LevelNode> = Vec::new();
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let level_id: i64 = row.get(0)?;
        let code: String = row.get(1)?;
        let unit_id: i64 = row.get(2)?;
        let lesson_id: i64 = row.get(3)?;
        let raw_type: String = row.get(4)?;
        let lesson_type = parse_col::<LessonType>(4, &raw_type)?;

        if levels.last().map(|l| l.id) != Some(level_id) {
            levels.push(LevelNode { id: level_id, code, units: Vec::new() });
        }
        let level = levels.last_mut().unwrap();
        if level.units.last().map(|u| u.id) != Some(unit_id) {
            level.units.push(UnitNode { id: unit_id, lessons: Vec::new() });
        }
        level
            .units
            .last_mut()
            .unwrap()
            .lessons
            .push(LessonNode { id: lesson_id, lesson_type });
    }

    let mut stmt = conn.prepare(
        "SELECT lesson_id FROM lesson_progress WHERE user_id = ? AND status = 'completed'",
    )?;
    let completed = stmt
        .query_map([user_id], |row| row.get::<_, i64>(0))?
        .collect::<Result<_>>()?;

    Ok(ProgressSnapshot { levels, completed })
}

// --- Lesson Progress ---

fn progress_from_row(row: &Row) -> Result<LessonProgress> {
    let status: String = row.get(2)?;
    Ok(LessonProgress {
        user_id: row.get(0)?,
        lesson_id: row.get(1)?,
        status: parse_col::<ProgressStatus>(2, &status)?,
        best_score: row.get(3)?,
        attempts: row.get(4)?,
        time_spent_secs: row.get(5)?,
        xp_earned: row.get(6)?,
        coins_earned: row.get(7)?,
        completed_ts: row.get(8)?,
    })
}

pub fn get_progress(
    conn: &Connection,
    user_id: i64,
    lesson_id: i64,
) -> Result<Option<LessonProgress>> {
    conn.query_row(
        "SELECT user_id, lesson_id, status, best_score, attempts, time_spent_secs, \
         xp_earned, coins_earned, completed_ts \
         FROM lesson_progress WHERE user_id = ? AND lesson_id = ?",
        [user_id, lesson_id],
        progress_from_row,
    )
    .optional()
}

pub fn ensure_progress(conn: &Connection, user_id: i64, lesson_id: i64) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO lesson_progress (user_id, lesson_id, status) \
         VALUES (?, ?, 'in_progress')",
        [user_id, lesson_id],
    )?;
    Ok(())
}

/// Compare-and-set into completed. The WHERE guard makes the affected-row
/// count the witness for first completion under concurrent submissions.
pub fn mark_completed(conn: &Connection, user_id: i64, lesson_id: i64, now_ts: i64) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE lesson_progress SET status = 'completed', completed_ts = ? \
         WHERE user_id = ? AND lesson_id = ? AND status != 'completed'",
        params![now_ts, user_id, lesson_id],
    )?;
    Ok(changed == 1)
}

pub fn record_attempt(
    conn: &Connection,
    user_id: i64,
    lesson_id: i64,
    score: i64,
    time_spent_secs: i64,
) -> Result<()> {
    conn.execute(
        "UPDATE lesson_progress SET attempts = attempts + 1, \
         time_spent_secs = time_spent_secs + ?, best_score = MAX(best_score, ?) \
         WHERE user_id = ? AND lesson_id = ?",
        params![time_spent_secs, score, user_id, lesson_id],
    )?;
    Ok(())
}

pub fn set_progress_rewards(
    conn: &Connection,
    user_id: i64,
    lesson_id: i64,
    xp: i64,
    coins: i64,
) -> Result<()> {
    conn.execute(
        "UPDATE lesson_progress SET xp_earned = ?, coins_earned = ? \
         WHERE user_id = ? AND lesson_id = ?",
        params![xp, coins, user_id, lesson_id],
    )?;
    Ok(())
}

// --- Profiles ---

fn profile_from_row(row: &Row) -> Result<Profile> {
    let last_active: Option<String> = row.get(7)?;
    let last_active = match last_active {
        Some(raw) => Some(
            NaiveDate::parse_from_str(&raw, "%Y-%m-%d").map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(7, Type::Text, Box::new(e))
            })?,
        ),
        None => None,
    };
    Ok(Profile {
        user_id: row.get(0)?,
        xp: row.get(1)?,
        coins: row.get(2)?,
        gems: row.get(3)?,
        current_level: row.get(4)?,
        current_streak: row.get(5)?,
        longest_streak: row.get(6)?,
        last_active,
        elo: row.get(8)?,
        wins: row.get(9)?,
        losses: row.get(10)?,
    })
}

const PROFILE_COLUMNS: &str = "user_id, xp, coins, gems, current_level, current_streak, \
                               longest_streak, last_active, elo, wins, losses";

pub fn get_profile(conn: &Connection, user_id: i64) -> Result<Option<Profile>> {
    conn.query_row(
        &format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE user_id = ?"),
        [user_id],
        profile_from_row,
    )
    .optional()
}

pub fn insert_profile_if_missing(
    conn: &Connection,
    user_id: i64,
    starting_elo: i64,
    root_level: &str,
) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO profiles (user_id, elo, current_level) VALUES (?, ?, ?)",
        params![user_id, starting_elo, root_level],
    )?;
    Ok(())
}

pub fn add_profile_rewards(
    conn: &Connection,
    user_id: i64,
    xp: i64,
    coins: i64,
    gems: i64,
) -> Result<()> {
    conn.execute(
        "UPDATE profiles SET xp = xp + ?, coins = coins + ?, gems = gems + ? WHERE user_id = ?",
        params![xp, coins, gems, user_id],
    )?;
    Ok(())
}

pub fn update_streak(
    conn: &Connection,
    user_id: i64,
    current: i64,
    longest: i64,
    last_active: NaiveDate,
) -> Result<()> {
    conn.execute(
        "UPDATE profiles SET current_streak = ?, longest_streak = ?, last_active = ? \
         WHERE user_id = ?",
        params![
            current,
            longest,
            last_active.format("%Y-%m-%d").to_string(),
            user_id
        ],
    )?;
    Ok(())
}

/// Guarded debit. Returns false when the balance is short; the balance can
/// never go negative.
pub fn try_spend_coins(conn: &Connection, user_id: i64, amount: i64) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE profiles SET coins = coins - ? WHERE user_id = ? AND coins >= ?",
        params![amount, user_id, amount],
    )?;
    Ok(changed == 1)
}

pub fn set_profile_level(conn: &Connection, user_id: i64, level_code: &str) -> Result<()> {
    conn.execute(
        "UPDATE profiles SET current_level = ? WHERE user_id = ?",
        params![level_code, user_id],
    )?;
    Ok(())
}

pub fn apply_battle_result(
    conn: &Connection,
    user_id: i64,
    elo_delta: i64,
    won: Option<bool>,
) -> Result<()> {
    let (win_inc, loss_inc) = match won {
        Some(true) => (1, 0),
        Some(false) => (0, 1),
        None => (0, 0),
    };
    conn.execute(
        "UPDATE profiles SET elo = elo + ?, wins = wins + ?, losses = losses + ? \
         WHERE user_id = ?",
        params![elo_delta, win_inc, loss_inc, user_id],
    )?;
    Ok(())
}

fn leaderboard_rows(conn: &Connection, order_by: &str, limit: u32) -> Result<Vec<LeaderboardEntry>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT user_id, xp, elo, current_streak, wins FROM profiles \
         ORDER BY {order_by} DESC, user_id ASC LIMIT ?",
    ))?;
    let rows = stmt
        .query_map([limit], |row| {
            Ok(LeaderboardEntry {
                user_id: row.get(0)?,
                xp: row.get(1)?,
                elo: row.get(2)?,
                current_streak: row.get(3)?,
                wins: row.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn top_by_xp(conn: &Connection, limit: u32) -> Result<Vec<LeaderboardEntry>> {
    leaderboard_rows(conn, "xp", limit)
}

pub fn top_by_elo(conn: &Connection, limit: u32) -> Result<Vec<LeaderboardEntry>> {
    leaderboard_rows(conn, "elo", limit)
}

// --- Battles ---

fn battle_from_row(row: &Row) -> Result<Battle> {
    let battle_type: String = row.get(1)?;
    let status: String = row.get(2)?;
    Ok(Battle {
        id: row.get(0)?,
        battle_type: parse_col::<BattleType>(1, &battle_type)?,
        status: parse_col::<BattleStatus>(2, &status)?,
        host_id: row.get(3)?,
        guest_id: row.get(4)?,
        host_score: row.get(5)?,
        guest_score: row.get(6)?,
        round_count: row.get(7)?,
        elo_delta: row.get(8)?,
        winner_id: row.get(9)?,
        created_ts: row.get(10)?,
        expires_ts: row.get(11)?,
        started_ts: row.get(12)?,
        finished_ts: row.get(13)?,
    })
}

const BATTLE_COLUMNS: &str = "id, battle_type, status, host_id, guest_id, host_score, \
                              guest_score, round_count, elo_delta, winner_id, created_ts, \
                              expires_ts, started_ts, finished_ts";

pub fn get_battle(conn: &Connection, battle_id: i64) -> Result<Option<Battle>> {
    conn.query_row(
        &format!("SELECT {BATTLE_COLUMNS} FROM battles WHERE id = ?"),
        [battle_id],
        battle_from_row,
    )
    .optional()
}

pub fn insert_battle(
    conn: &Connection,
    battle_type: BattleType,
    host_id: i64,
    created_ts: i64,
    expires_ts: i64,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO battles (battle_type, status, host_id, created_ts, expires_ts) \
         VALUES (?, 'waiting', ?, ?, ?)",
        params![battle_type.as_str(), host_id, created_ts, expires_ts],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Oldest live waiting battle of the given type hosted by someone else whose
/// rating sits inside the window.
pub fn find_waiting_battle(
    conn: &Connection,
    battle_type: BattleType,
    user_id: i64,
    user_elo: i64,
    rating_window: i64,
    now_ts: i64,
) -> Result<Option<Battle>> {
    conn.query_row(
        &format!(
            "SELECT {BATTLE_COLUMNS} FROM battles b \
             JOIN profiles p ON p.user_id = b.host_id \
             WHERE b.status = 'waiting' AND b.battle_type = ? AND b.host_id != ? \
             AND b.expires_ts > ? AND ABS(p.elo - ?) <= ? \
             ORDER BY b.created_ts ASC LIMIT 1",
        ),
        params![battle_type.as_str(), user_id, now_ts, user_elo, rating_window],
        battle_from_row,
    )
    .optional()
}

/// Any non-terminal battle the user is a side of.
pub fn open_battle_for_user(conn: &Connection, user_id: i64) -> Result<Option<i64>> {
    conn.query_row(
        "SELECT id FROM battles \
         WHERE status IN ('waiting', 'ready', 'in_progress') \
         AND (host_id = ? OR guest_id = ?) LIMIT 1",
        [user_id, user_id],
        |row| row.get(0),
    )
    .optional()
}

pub fn set_guest(conn: &Connection, battle_id: i64, guest_id: i64) -> Result<()> {
    conn.execute(
        "UPDATE battles SET guest_id = ?, status = 'ready' WHERE id = ?",
        params![guest_id, battle_id],
    )?;
    Ok(())
}

pub fn set_battle_started(
    conn: &Connection,
    battle_id: i64,
    round_count: i64,
    now_ts: i64,
) -> Result<()> {
    conn.execute(
        "UPDATE battles SET status = 'in_progress', round_count = ?, started_ts = ? WHERE id = ?",
        params![round_count, now_ts, battle_id],
    )?;
    Ok(())
}

pub fn set_battle_status(conn: &Connection, battle_id: i64, status: BattleStatus) -> Result<()> {
    conn.execute(
        "UPDATE battles SET status = ? WHERE id = ?",
        params![status.as_str(), battle_id],
    )?;
    Ok(())
}

pub fn set_battle_finished(
    conn: &Connection,
    battle_id: i64,
    winner_id: Option<i64>,
    elo_delta: i64,
    now_ts: i64,
) -> Result<()> {
    conn.execute(
        "UPDATE battles SET status = 'completed', winner_id = ?, elo_delta = ?, finished_ts = ? \
         WHERE id = ?",
        params![winner_id, elo_delta, now_ts, battle_id],
    )?;
    Ok(())
}

/// Marks overdue waiting battles expired. Returns how many were swept.
pub fn expire_stale_battles(conn: &Connection, now_ts: i64) -> Result<usize> {
    let changed = conn.execute(
        "UPDATE battles SET status = 'expired' WHERE status = 'waiting' AND expires_ts <= ?",
        [now_ts],
    )?;
    Ok(changed)
}

// --- Battle Rounds ---

fn round_from_row(row: &Row) -> Result<BattleRound> {
    Ok(BattleRound {
        battle_id: row.get(0)?,
        round_no: row.get(1)?,
        word_id: row.get(2)?,
        prompt: row.get(3)?,
        answer: row.get(4)?,
        host_answer: row.get(5)?,
        host_correct: row.get(6)?,
        host_time_ms: row.get(7)?,
        host_points: row.get(8)?,
        guest_answer: row.get(9)?,
        guest_correct: row.get(10)?,
        guest_time_ms: row.get(11)?,
        guest_points: row.get(12)?,
    })
}

pub fn insert_round(
    conn: &Connection,
    battle_id: i64,
    round_no: i64,
    word_id: i64,
    prompt: &str,
    answer: &str,
) -> Result<()> {
    conn.execute(
        "INSERT INTO battle_rounds (battle_id, round_no, word_id, prompt, answer) \
         VALUES (?, ?, ?, ?, ?)",
        params![battle_id, round_no, word_id, prompt, answer],
    )?;
    Ok(())
}

pub fn get_round(conn: &Connection, battle_id: i64, round_no: i64) -> Result<Option<BattleRound>> {
    conn.query_row(
        "SELECT battle_id, round_no, word_id, prompt, answer, \
         host_answer, host_correct, host_time_ms, host_points, \
         guest_answer, guest_correct, guest_time_ms, guest_points \
         FROM battle_rounds WHERE battle_id = ? AND round_no = ?",
        [battle_id, round_no],
        round_from_row,
    )
    .optional()
}

/// Records one side's answer exactly once (guarded on the side being empty).
pub fn record_round_answer(
    conn: &Connection,
    battle_id: i64,
    round_no: i64,
    is_host: bool,
    answer: &str,
    correct: bool,
    time_ms: i64,
    points: i64,
) -> Result<bool> {
    let sql = if is_host {
        "UPDATE battle_rounds SET host_answer = ?, host_correct = ?, host_time_ms = ?, \
         host_points = ? WHERE battle_id = ? AND round_no = ? AND host_answer IS NULL"
    } else {
        "UPDATE battle_rounds SET guest_answer = ?, guest_correct = ?, guest_time_ms = ?, \
         guest_points = ? WHERE battle_id = ? AND round_no = ? AND guest_answer IS NULL"
    };
    let changed = conn.execute(sql, params![answer, correct, time_ms, points, battle_id, round_no])?;
    Ok(changed == 1)
}

pub fn add_battle_score(
    conn: &Connection,
    battle_id: i64,
    is_host: bool,
    points: i64,
) -> Result<()> {
    let sql = if is_host {
        "UPDATE battles SET host_score = host_score + ? WHERE id = ?"
    } else {
        "UPDATE battles SET guest_score = guest_score + ? WHERE id = ?"
    };
    conn.execute(sql, params![points, battle_id])?;
    Ok(())
}

/// Rounds still missing an answer from either side.
pub fn unanswered_rounds(conn: &Connection, battle_id: i64) -> Result<i64> {
    conn.query_row(
        "SELECT count(*) FROM battle_rounds \
         WHERE battle_id = ? AND (host_answer IS NULL OR guest_answer IS NULL)",
        [battle_id],
        |row| row.get(0),
    )
}
