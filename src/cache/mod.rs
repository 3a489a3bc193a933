//! Row cache module
//!
//! In-memory mirror of the external sheet with dirty-row tracking and
//! per-tab lock discipline.

pub mod row_cache;

pub use row_cache::{CacheError, CacheStatus, RowCache};
