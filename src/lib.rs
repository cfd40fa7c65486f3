// src/lib.rs

//! Core engine for a gamified language-learning platform.
//!
//! Everything here is transport-agnostic: thin HTTP or RPC handlers are
//! expected to open a SQLite connection, call into the services, and render
//! the returned payloads. The engine owns the business rules — SM-2 review
//! scheduling, curriculum unlock progression, lesson rewards, ELO-rated
//! battles — and the per-user profile aggregate they all report into.

pub mod battle;
pub mod config;
pub mod constants;
pub mod database;
pub mod error;
pub mod lessons;
pub mod models;
pub mod profile;
pub mod progression;
pub mod repository;
pub mod rewards;
pub mod scheduler;

pub use config::EngineConfig;
pub use error::{EngineError, Result};
