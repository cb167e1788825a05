//! Persistence for reports, supports, official responses and the
//! government entities that own them.
//!
//! All read-then-write sequences go through a [`StoreTx`]; dropping a
//! transaction without calling `commit` rolls it back.

pub mod error;
pub mod postgres;
pub mod traits;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use error::{StoreError, StoreResult};
pub use postgres::PgReportStore;
pub use traits::{ReportFilter, ReportStore, StoreTx};
