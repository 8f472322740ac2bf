pub mod context;
pub mod query_engine;
