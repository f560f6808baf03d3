//! notekeep: a personal notes server.
//!
//! [`api`] exposes the JSON routes, [`db`] owns the SQLite schema and every
//! query, and [`models`] holds the types both sides share.

pub mod api;
pub mod content;
pub mod db;
pub mod models;
pub mod password;
