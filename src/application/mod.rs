//! Application layer - the engine facade and its request/response types
//!
//! This is the boundary the calling (web) layer talks to. Everything
//! below it is wired together here via dependency injection.

pub mod dto;
pub mod use_cases;

pub use dto::{BatchOperation, BatchOptions, BatchRequest, BatchSummary};
pub use use_cases::{EngineError, LeadEngine};
