//! Report aggregation and jurisdiction engine.
//!
//! Submissions pass through [`dedup`], which either creates a report or
//! records a support on a nearby one. Official actions are gated by
//! [`jurisdiction`] and applied by [`lifecycle`]. [`CivicEngine`] ties them
//! together for request handlers.

pub mod dedup;
pub mod draft;
pub mod engine;
pub mod error;
pub mod jurisdiction;
pub mod lifecycle;

pub use dedup::{DedupPolicy, SubmitOutcome};
pub use draft::ReportDraft;
pub use engine::{CivicEngine, ReportDetail};
pub use error::{EngineError, EngineResult};
pub use lifecycle::{StatusUpdate, Transition};
