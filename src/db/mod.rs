//! Per-group warning store.
//!
//! Each group owns one SQLite file under `GroupPrefs/DB/`, created empty
//! alongside its preference record and given a schema on first open.
//! - `model`: rows returned by the repository.
//! - `repo`: connection setup and SQL-only functions.

pub mod model;
pub mod repo;

pub use repo::*;

pub use model::Warn;
