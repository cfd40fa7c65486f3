// src/database.rs

use log::{debug, info};
use rusqlite::{params, Connection, Result};

use crate::models::JsonLevel;

pub fn init_db(conn: &Connection) -> Result<()> {
    debug!("init_db: checking database schema...");

    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS levels (
            id INTEGER PRIMARY KEY,
            code TEXT UNIQUE NOT NULL,
            name TEXT NOT NULL,
            sort_order INTEGER NOT NULL
        );
        CREATE TABLE IF NOT EXISTS units (
            id INTEGER PRIMARY KEY,
            level_id INTEGER NOT NULL REFERENCES levels(id),
            name TEXT NOT NULL,
            sort_order INTEGER NOT NULL
        );
        CREATE TABLE IF NOT EXISTS lessons (
            id INTEGER PRIMARY KEY,
            unit_id INTEGER NOT NULL REFERENCES units(id),
            title TEXT NOT NULL,
            lesson_type TEXT NOT NULL CHECK (lesson_type IN
                ('vocabulary','grammar','practice','conversation','standard','review','test')),
            sort_order INTEGER NOT NULL
        );
        CREATE TABLE IF NOT EXISTS words (
            id INTEGER PRIMARY KEY,
            lesson_id INTEGER REFERENCES lessons(id),
            word TEXT NOT NULL,
            translation TEXT NOT NULL,
            definition TEXT
        );
        CREATE TABLE IF NOT EXISTS vocabulary_cards (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL,
            word_id INTEGER NOT NULL REFERENCES words(id),
            ease_factor REAL NOT NULL DEFAULT 2.5,
            interval_days INTEGER NOT NULL DEFAULT 0,
            repetitions INTEGER NOT NULL DEFAULT 0,
            consecutive_correct INTEGER NOT NULL DEFAULT 0,
            tier TEXT NOT NULL DEFAULT 'new',
            next_due_ts INTEGER NOT NULL,
            last_review_ts INTEGER,
            UNIQUE (user_id, word_id)
        );
        CREATE TABLE IF NOT EXISTS lesson_progress (
            user_id INTEGER NOT NULL,
            lesson_id INTEGER NOT NULL REFERENCES lessons(id),
            status TEXT NOT NULL DEFAULT 'in_progress',
            best_score INTEGER NOT NULL DEFAULT 0,
            attempts INTEGER NOT NULL DEFAULT 0,
            time_spent_secs INTEGER NOT NULL DEFAULT 0,
            xp_earned INTEGER NOT NULL DEFAULT 0,
            coins_earned INTEGER NOT NULL DEFAULT 0,
            completed_ts INTEGER,
            PRIMARY KEY (user_id, lesson_id)
        );
        CREATE TABLE IF NOT EXISTS profiles (
            user_id INTEGER PRIMARY KEY,
            xp INTEGER NOT NULL DEFAULT 0,
            coins INTEGER NOT NULL DEFAULT 0,
            gems INTEGER NOT NULL DEFAULT 0,
            current_level TEXT NOT NULL DEFAULT 'A1',
            current_streak INTEGER NOT NULL DEFAULT 0,
            longest_streak INTEGER NOT NULL DEFAULT 0,
            last_active TEXT,
            elo INTEGER NOT NULL DEFAULT 1200,
            wins INTEGER NOT NULL DEFAULT 0,
            losses INTEGER NOT NULL DEFAULT 0
        );
        CREATE TABLE IF NOT EXISTS battles (
            id INTEGER PRIMARY KEY,
            battle_type TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'waiting',
            host_id INTEGER NOT NULL,
            guest_id INTEGER,
            host_score INTEGER NOT NULL DEFAULT 0,
            guest_score INTEGER NOT NULL DEFAULT 0,
            round_count INTEGER NOT NULL DEFAULT 0,
            elo_delta INTEGER,
            winner_id INTEGER,
            created_ts INTEGER NOT NULL,
            expires_ts INTEGER NOT NULL,
            started_ts INTEGER,
            finished_ts INTEGER
        );
        CREATE TABLE IF NOT EXISTS battle_rounds (
            battle_id INTEGER NOT NULL REFERENCES battles(id),
            round_no INTEGER NOT NULL,
            word_id INTEGER NOT NULL REFERENCES words(id),
            prompt TEXT NOT NULL,
            answer TEXT NOT NULL,
            host_answer TEXT,
            host_correct INTEGER,
            host_time_ms INTEGER,
            host_points INTEGER NOT NULL DEFAULT 0,
            guest_answer TEXT,
            guest_correct INTEGER,
            guest_time_ms INTEGER,
            guest_points INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (battle_id, round_no)
        );
        ",
    )?;

    let count: i64 = conn.query_row("SELECT count(*) FROM levels", [], |row| row.get(0))?;
    if count == 0 {
        info!("init_db: curriculum empty, seeding...");
        seed_curriculum(conn)?;
    }

    Ok(())
}

fn seed_curriculum(conn: &Connection) -> Result<()> {
    // Note: this relies on the file strictly existing in src/data/
    let data = include_str!("data/curriculum.json");
    let levels: Vec<JsonLevel> =
        serde_json::from_str(data).expect("Error parsing curriculum JSON");

    let mut level_stmt =
        conn.prepare("INSERT INTO levels (code, name, sort_order) VALUES (?, ?, ?)")?;
    let mut unit_stmt =
        conn.prepare("INSERT INTO units (level_id, name, sort_order) VALUES (?, ?, ?)")?;
    let mut lesson_stmt = conn.prepare(
        "INSERT INTO lessons (unit_id, title, lesson_type, sort_order) VALUES (?, ?, ?, ?)",
    )?;
    let mut word_stmt = conn
        .prepare("INSERT INTO words (lesson_id, word, translation, definition) VALUES (?, ?, ?, ?)")?;

    for (li, level) in levels.iter().enumerate() {
        level_stmt.execute(params![level.code, level.name, li as i64])?;
        let level_id = conn.last_insert_rowid();

        for (ui, unit) in level.units.iter().enumerate() {
            unit_stmt.execute(params![level_id, unit.name, ui as i64])?;
            let unit_id = conn.last_insert_rowid();

            for (si, lesson) in unit.lessons.iter().enumerate() {
                lesson_stmt.execute(params![
                    unit_id,
                    lesson.title,
                    lesson.lesson_type,
                    si as i64
                ])?;
                let lesson_id = conn.last_insert_rowid();

                for w in &lesson.words {
                    word_stmt.execute(params![lesson_id, w.word, w.translation, w.definition])?;
                }
            }
        }
    }

    Ok(())
}
