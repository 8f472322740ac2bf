pub mod cache;
pub mod event;
pub mod intent;
pub mod query;
pub mod schema;
pub mod tenant;

pub use cache::CacheEntry;
pub use event::PipelineEvent;
pub use intent::{Granularity, Intent, IntentCategory, Timeframe};
pub use query::{
    Analytics, AnalyticsWindow, ColumnarResult, Feedback, HistoryFilters, LatencyBuckets,
    OptimizationAnalysis, OptimizationCategory, QueryMetadata, QueryRecord, QueryRecordRow,
    QueryStatus,
};
pub use schema::{Cardinality, Column, MAX_SAMPLE_ROWS, Relationship, Schema, Table};
pub use tenant::{ConnectionSecret, DataSource, DataSourceInfo, DataSourceKind, SqlDialect, TenantId};
