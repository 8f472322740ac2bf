pub mod error;
pub mod fingerprint;
pub mod scheduled_executor;

pub use error::{ApiError, ApiResult};
pub use fingerprint::QueryFingerprint;
pub use scheduled_executor::{ScheduledExecutor, ScheduledTask};
