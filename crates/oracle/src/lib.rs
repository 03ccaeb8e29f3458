pub mod client;
pub mod heuristic;
pub mod types;

pub use client::{FieldMapper, HttpOracle, OracleError, OracleWithFallback};
pub use heuristic::HeuristicMapper;
pub use types::{FillAction, FillPlan, Obstacle};
