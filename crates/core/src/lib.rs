//! Domain types for the tailor shop backend.
//!
//! Everything here is pure: month periods, order identifiers and the shared
//! next-issue decision, order drafts, the labour roster and wage computation.
//! Persistence lives in `tailor-storage`.
pub mod labour;
pub mod order;
pub mod period;
pub mod sequence;
pub mod wages;

pub use period::{Period, PeriodError};
pub use sequence::{
    plan_next, CounterState, IssuedIdentifier, NextIssue, OrderIdentifier, SequencePreview,
    ORDER_COUNTER_KEY,
};
