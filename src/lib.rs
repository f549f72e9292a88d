pub mod cache;
pub mod compute;
pub mod config;
pub mod convert;
pub mod dashboard;
pub mod graph;
pub mod level;
pub mod load;
pub mod observability;
pub mod query;
pub mod record;
