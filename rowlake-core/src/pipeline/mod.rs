//! Pipeline engine: lazy step chains over one source dataset.

pub mod aggregate;
pub mod condition;
pub mod plan;
pub mod step;

pub use aggregate::{AggregateOp, Aggregation, aggregate_rows};
pub use condition::{Condition, ConditionOp};
pub use plan::Pipeline;
pub use step::{SortDirection, Step};
