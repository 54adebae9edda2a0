pub mod aggregation;
pub mod distribution;
pub mod membership;
pub mod profit_share;
pub mod reconciliation;
pub mod scheduler;
