//! Query planning and execution.

mod executor;
mod filter;
mod planner;

pub use executor::QueryExecutor;
pub use filter::FilterEvaluator;
pub use planner::{HopSpec, QueryPlan, QueryPlanner};
