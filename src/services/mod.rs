pub mod data_source_provider;
pub mod executor;
pub mod intent_classifier;
pub mod llm;
pub mod mysql_client;
pub mod mysql_pool_manager;
pub mod orchestrator;
pub mod query_manager;
pub mod result_cache;
pub mod schema_registry;
pub mod sql_validator;
pub mod streaming;

pub use data_source_provider::{DataSourceProvider, InMemoryDataSourceProvider};
pub use executor::{ExecutorContext, create_adapter};
pub use intent_classifier::IntentClassifier;
pub use llm::{GeneratedSql, LLMError, LlmProviderConfig, SqlGenerator};
pub use mysql_client::MySQLClient;
pub use mysql_pool_manager::MySQLPoolManager;
pub use orchestrator::{ExecuteQueryRequest, ExecuteQueryResponse, Orchestrator};
pub use query_manager::QueryManager;
pub use result_cache::ResultCache;
pub use schema_registry::SchemaRegistry;
pub use streaming::EventSender;
