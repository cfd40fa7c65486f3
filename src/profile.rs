// src/profile.rs

use chrono::NaiveDate;
use log::{debug, info};
use rusqlite::Connection;

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::models::{LeaderboardEntry, Profile};
use crate::repository;

/// Lazily creates the aggregate row for a user.
pub fn ensure_profile(conn: &Connection, user_id: i64, cfg: &EngineConfig) -> Result<()> {
    repository::insert_profile_if_missing(
        conn,
        user_id,
        cfg.battle.starting_elo,
        &cfg.unlock.root_level_code,
    )?;
    Ok(())
}

pub fn get_profile(conn: &Connection, user_id: i64) -> Result<Profile> {
    repository::get_profile(conn, user_id)?
        .ok_or_else(|| EngineError::not_found(format!("profile {user_id}")))
}

/// Credits xp/coins/gems to the aggregate. Callers run this inside their own
/// transaction so the credit commits together with whatever earned it.
pub fn apply_reward(conn: &Connection, user_id: i64, xp: i64, coins: i64, gems: i64) -> Result<()> {
    if xp == 0 && coins == 0 && gems == 0 {
        return Ok(());
    }
    repository::add_profile_rewards(conn, user_id, xp, coins, gems)?;
    debug!("user {user_id} credited xp={xp} coins={coins} gems={gems}");
    Ok(())
}

/// Rolls the daily activity streak forward. Same-day activity is a no-op,
/// next-day activity extends the streak, anything later restarts it at 1.
pub fn touch_streak(conn: &Connection, user_id: i64, today: NaiveDate) -> Result<i64> {
    let profile = get_profile(conn, user_id)?;

    let current = match profile.last_active {
        Some(last) if last == today => return Ok(profile.current_streak),
        Some(last) if last.succ_opt() == Some(today) => profile.current_streak + 1,
        _ => 1,
    };
    let longest = profile.longest_streak.max(current);
    repository::update_streak(conn, user_id, current, longest, today)?;

    if current > profile.current_streak {
        info!("user {user_id} streak extended to {current} days");
    }
    Ok(current)
}

/// Debits coins, e.g. for a hint or a cosmetic. The balance never goes
/// negative.
pub fn spend_coins(conn: &Connection, user_id: i64, amount: i64, reason: &str) -> Result<()> {
    if amount <= 0 {
        return Err(EngineError::validation(format!(
            "spend amount must be positive, got {amount}"
        )));
    }
    let profile = get_profile(conn, user_id)?;
    if !repository::try_spend_coins(conn, user_id, amount)? {
        return Err(EngineError::InsufficientResource {
            resource: "coins",
            available: profile.coins,
            required: amount,
        });
    }
    info!("user {user_id} spent {amount} coins on {reason}");
    Ok(())
}

pub fn top_by_xp(conn: &Connection, limit: u32) -> Result<Vec<LeaderboardEntry>> {
    Ok(repository::top_by_xp(conn, limit)?)
}

pub fn top_by_elo(conn: &Connection, limit: u32) -> Result<Vec<LeaderboardEntry>> {
    Ok(repository::top_by_elo(conn, limit)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        database::init_db(&conn).unwrap();
        conn
    }

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn streak_extends_resets_and_tracks_longest() {
        let conn = conn();
        let cfg = EngineConfig::default();
        ensure_profile(&conn, 1, &cfg).unwrap();

        assert_eq!(touch_streak(&conn, 1, date("2026-03-01")).unwrap(), 1);
        assert_eq!(touch_streak(&conn, 1, date("2026-03-02")).unwrap(), 2);
        // Same day twice is a no-op.
        assert_eq!(touch_streak(&conn, 1, date("2026-03-02")).unwrap(), 2);
        assert_eq!(touch_streak(&conn, 1, date("2026-03-03")).unwrap(), 3);
        // Missing a day restarts the streak but keeps the record.
        assert_eq!(touch_streak(&conn, 1, date("2026-03-10")).unwrap(), 1);

        let profile = get_profile(&conn, 1).unwrap();
        assert_eq!(profile.current_streak, 1);
        assert_eq!(profile.longest_streak, 3);
    }

    #[test]
    fn spending_more_than_the_balance_fails() {
        let conn = conn();
        let cfg = EngineConfig::default();
        ensure_profile(&conn, 1, &cfg).unwrap();
        apply_reward(&conn, 1, 0, 5, 0).unwrap();

        spend_coins(&conn, 1, 3, "hint").unwrap();
        let err = spend_coins(&conn, 1, 3, "hint").unwrap_err();
        assert!(matches!(
            err,
            EngineError::InsufficientResource { resource: "coins", available: 2, required: 3 }
        ));
        assert_eq!(get_profile(&conn, 1).unwrap().coins, 2);
    }

    #[test]
    fn spend_validates_amount_and_profile() {
        let conn = conn();
        let cfg = EngineConfig::default();
        ensure_profile(&conn, 1, &cfg).unwrap();
        assert!(matches!(
            spend_coins(&conn, 1, 0, "nothing").unwrap_err(),
            EngineError::Validation(_)
        ));
        assert!(matches!(
            spend_coins(&conn, 99, 1, "hint").unwrap_err(),
            EngineError::NotFound(_)
        ));
    }

    #[test]
    fn leaderboards_rank_by_the_requested_stat() {
        let conn = conn();
        let cfg = EngineConfig::default();
        for user in 1..=3 {
            ensure_profile(&conn, user, &cfg).unwrap();
        }
        apply_reward(&conn, 1, 10, 0, 0).unwrap();
        apply_reward(&conn, 2, 30, 0, 0).unwrap();
        apply_reward(&conn, 3, 20, 0, 0).unwrap();
        repository::apply_battle_result(&conn, 3, 50, Some(true)).unwrap();

        let by_xp = top_by_xp(&conn, 10).unwrap();
        assert_eq!(by_xp.iter().map(|e| e.user_id).collect::<Vec<_>>(), [2, 3, 1]);

        let by_elo = top_by_elo(&conn, 2).unwrap();
        assert_eq!(by_elo.len(), 2);
        assert_eq!(by_elo[0].user_id, 3);
    }
}
