// src/progression.rs

use log::debug;

use crate::config::UnlockConfig;
use crate::models::{LevelNode, Node, ProgressSnapshot, UnitNode};

/// Percentage of a unit's lessons the user has completed.
pub fn unit_completion_pct(snapshot: &ProgressSnapshot, unit: &UnitNode) -> f64 {
    completion_pct(
        unit.lessons.iter().map(|l| l.id),
        &snapshot.completed,
    )
}

/// Percentage of a level's lessons (across all its units) completed.
pub fn level_completion_pct(snapshot: &ProgressSnapshot, level: &LevelNode) -> f64 {
    completion_pct(
        level.units.iter().flat_map(|u| u.lessons.iter().map(|l| l.id)),
        &snapshot.completed,
    )
}

fn completion_pct(
    lessons: impl Iterator<Item = i64>,
    completed: &std::collections::HashSet<i64>,
) -> f64 {
    let mut total = 0u32;
    let mut done = 0u32;
    for id in lessons {
        total += 1;
        if completed.contains(&id) {
            done += 1;
        }
    }
    if total == 0 {
        return 0.0;
    }
    f64::from(done) * 100.0 / f64::from(total)
}

/// Unified unlock query over the derived graph. Pure: identical snapshots
/// always produce identical answers.
pub fn is_unlocked(snapshot: &ProgressSnapshot, node: Node, cfg: &UnlockConfig) -> bool {
    match node {
        Node::Level(code) => is_level_unlocked(snapshot, code, cfg),
        Node::Unit(id) => is_unit_unlocked(snapshot, id, cfg),
        Node::Lesson(id) => is_lesson_unlocked(snapshot, id, cfg),
    }
}

pub fn is_level_unlocked(snapshot: &ProgressSnapshot, code: &str, cfg: &UnlockConfig) -> bool {
    if cfg.test_mode {
        return true;
    }
    if code == cfg.root_level_code {
        return true;
    }
    let Some(idx) = snapshot.levels.iter().position(|l| l.code == code) else {
        return false;
    };
    if idx == 0 {
        return true;
    }
    let pct = level_completion_pct(snapshot, &snapshot.levels[idx - 1]);
    debug!(
        "[Unlock] level {}: previous level at {:.1}% (need {:.1}%)",
        code, pct, cfg.completion_pct
    );
    pct >= cfg.completion_pct
}

pub fn is_unit_unlocked(snapshot: &ProgressSnapshot, unit_id: i64, cfg: &UnlockConfig) -> bool {
    if cfg.test_mode {
        return true;
    }
    let Some((li, ui)) = find_unit(snapshot, unit_id) else {
        return false;
    };
    let level = &snapshot.levels[li];
    if ui == 0 {
        // First unit of a level follows the level's own unlock.
        return is_level_unlocked(snapshot, &level.code, cfg);
    }
    unit_completion_pct(snapshot, &level.units[ui - 1]) >= cfg.completion_pct
}

pub fn is_lesson_unlocked(snapshot: &ProgressSnapshot, lesson_id: i64, cfg: &UnlockConfig) -> bool {
    if cfg.test_mode {
        return true;
    }
    // Lessons gate strictly on their predecessor in curriculum order: the
    // previous lesson in the unit, or the last lesson of the previous
    // unit/level when first-in-unit.
    let mut prev: Option<i64> = None;
    for level in &snapshot.levels {
        for unit in &level.units {
            for lesson in &unit.lessons {
                if lesson.id == lesson_id {
                    return match prev {
                        None => true, // the very first lesson
                        Some(p) => snapshot.completed.contains(&p),
                    };
                }
                prev = Some(lesson.id);
            }
        }
    }
    false
}

/// Highest level the user has unlocked, in curriculum order. Drives the
/// profile's current-level reference.
pub fn highest_unlocked_level<'a>(
    snapshot: &'a ProgressSnapshot,
    cfg: &UnlockConfig,
) -> Option<&'a LevelNode> {
    let mut last = None;
    for level in &snapshot.levels {
        if is_level_unlocked(snapshot, &level.code, cfg) {
            last = Some(level);
        } else {
            break;
        }
    }
    last
}

fn find_unit(snapshot: &ProgressSnapshot, unit_id: i64) -> Option<(usize, usize)> {
    for (li, level) in snapshot.levels.iter().enumerate() {
        for (ui, unit) in level.units.iter().enumerate() {
            if unit.id == unit_id {
                return Some((li, ui));
            }
        }
    }
    None
}
