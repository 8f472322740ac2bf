use clap::Parser;
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub llm: LlmConfig,
    pub cache: CacheConfig,
    pub executor: ExecutorConfig,
    pub intent: IntentConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
}

/// `[llm]`: the configured provider list plus the failover policy
/// applied across all of them.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub providers: Vec<crate::services::LlmProviderConfig>,
    pub primary_provider: Option<String>,
    pub retry_attempts: u32,
    #[serde(deserialize_with = "deserialize_duration_ms")]
    pub retry_delay_ms: u64,
}

/// `[cache]`: Result Cache sizing and TTL.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub max_entries: usize,
    #[serde(deserialize_with = "deserialize_duration_ms")]
    pub ttl_ms: u64,
    pub eviction_fraction: f32,
    /// How often the background sweep removes expired entries that
    /// haven't been touched by a write.
    #[serde(deserialize_with = "deserialize_duration_ms")]
    pub sweep_interval_ms: u64,
}

/// `[executor]`: per-call timeouts and the streaming channel's buffer
/// size.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    #[serde(deserialize_with = "deserialize_duration_ms")]
    pub batch_timeout_ms: u64,
    #[serde(deserialize_with = "deserialize_duration_ms")]
    pub stream_timeout_ms: u64,
    pub progress_buffer: usize,
}

/// `[intent]`: the classifier's low-confidence rejection threshold.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IntentConfig {
    pub min_confidence: f32,
}

/// Command line argument overrides.
#[derive(Parser, Debug, Clone)]
#[command(name = "ai-query-engine")]
#[command(version, about = "AI Query Engine - natural language to SQL pipeline")]
pub struct CommandLineArgs {
    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<String>,

    /// Server host (overrides config file)
    #[arg(long, value_name = "HOST")]
    pub server_host: Option<String>,

    /// Server port (overrides config file)
    #[arg(long, value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Database URL (overrides config file)
    #[arg(long, value_name = "URL")]
    pub database_url: Option<String>,

    /// Logging level (overrides config file, e.g., "info,ai_query_engine=debug")
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// LLM retry attempts per provider (overrides config file)
    #[arg(long, value_name = "N")]
    pub llm_retry_attempts: Option<u32>,

    /// LLM inter-attempt backoff (overrides config file, e.g., "1s", "500ms")
    #[arg(long, value_name = "DURATION")]
    pub llm_retry_delay: Option<String>,

    /// Result cache capacity (overrides config file)
    #[arg(long, value_name = "N")]
    pub cache_max_entries: Option<usize>,

    /// Result cache entry TTL (overrides config file, e.g., "1h", "30m")
    #[arg(long, value_name = "DURATION")]
    pub cache_ttl: Option<String>,

    /// Intent classifier minimum confidence (overrides config file)
    #[arg(long, value_name = "FLOAT")]
    pub intent_min_confidence: Option<f32>,
}

impl Config {
    /// Load configuration with command line, environment variable, and
    /// file support.
    ///
    /// Loading order (priority from highest to lowest):
    /// 1. Command line arguments
    /// 2. Environment variables (prefixed with APP_)
    /// 3. Configuration file (config.toml)
    /// 4. Default values
    pub fn load() -> Result<Self, anyhow::Error> {
        let cli_args = CommandLineArgs::parse();

        let config_path = cli_args.config.clone().or_else(Self::find_config_file);
        let mut config = if let Some(config_path) = config_path {
            Self::from_toml(&config_path)?
        } else {
            tracing::warn!("Configuration file not found, using defaults");
            Config::default()
        };

        config.apply_env_overrides();
        config.apply_cli_overrides(&cli_args);
        config.validate()?;

        Ok(config)
    }

    /// Apply environment variable overrides.
    ///
    /// Supported environment variables:
    /// - APP_SERVER_HOST / APP_SERVER_PORT / APP_DATABASE_URL / APP_LOG_LEVEL
    /// - APP_LLM_RETRY_ATTEMPTS / APP_LLM_RETRY_DELAY_MS (accepts "1s", "500ms")
    /// - APP_CACHE_MAX_ENTRIES / APP_CACHE_TTL_MS (accepts "1h", "30m")
    /// - APP_INTENT_MIN_CONFIDENCE
    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("APP_SERVER_HOST") {
            self.server.host = host;
            tracing::info!("Override server.host from env: {}", self.server.host);
        }

        if let Ok(port) = std::env::var("APP_SERVER_PORT")
            && let Ok(port) = port.parse()
        {
            self.server.port = port;
            tracing::info!("Override server.port from env: {}", self.server.port);
        }

        if let Ok(db_url) = std::env::var("APP_DATABASE_URL") {
            self.database.url = db_url;
            tracing::info!("Override database.url from env");
        }

        if let Ok(level) = std::env::var("APP_LOG_LEVEL") {
            self.logging.level = level;
            tracing::info!("Override logging.level from env: {}", self.logging.level);
        }

        if let Ok(attempts) = std::env::var("APP_LLM_RETRY_ATTEMPTS")
            && let Ok(val) = attempts.parse()
        {
            self.llm.retry_attempts = val;
            tracing::info!("Override llm.retry_attempts from env: {}", self.llm.retry_attempts);
        }

        if let Ok(delay) = std::env::var("APP_LLM_RETRY_DELAY_MS") {
            match parse_duration_to_millis(&delay) {
                Ok(val) => {
                    self.llm.retry_delay_ms = val;
                    tracing::info!("Override llm.retry_delay_ms from env: {}", val);
                },
                Err(e) => {
                    tracing::warn!("Invalid APP_LLM_RETRY_DELAY_MS '{}': {}", delay, e)
                },
            }
        }

        if let Ok(max_entries) = std::env::var("APP_CACHE_MAX_ENTRIES")
            && let Ok(val) = max_entries.parse()
        {
            self.cache.max_entries = val;
            tracing::info!("Override cache.max_entries from env: {}", self.cache.max_entries);
        }

        if let Ok(ttl) = std::env::var("APP_CACHE_TTL_MS") {
            match parse_duration_to_millis(&ttl) {
                Ok(val) => {
                    self.cache.ttl_ms = val;
                    tracing::info!("Override cache.ttl_ms from env: {}", val);
                },
                Err(e) => tracing::warn!("Invalid APP_CACHE_TTL_MS '{}': {}", ttl, e),
            }
        }

        if let Ok(min_confidence) = std::env::var("APP_INTENT_MIN_CONFIDENCE")
            && let Ok(val) = min_confidence.parse()
        {
            self.intent.min_confidence = val;
            tracing::info!("Override intent.min_confidence from env: {}", self.intent.min_confidence);
        }
    }

    /// Apply command line argument overrides (highest priority).
    fn apply_cli_overrides(&mut self, args: &CommandLineArgs) {
        if let Some(host) = &args.server_host {
            self.server.host = host.clone();
            tracing::info!("Override server.host from CLI: {}", self.server.host);
        }

        if let Some(port) = args.server_port {
            self.server.port = port;
            tracing::info!("Override server.port from CLI: {}", self.server.port);
        }

        if let Some(db_url) = &args.database_url {
            self.database.url = db_url.clone();
            tracing::info!("Override database.url from CLI");
        }

        if let Some(level) = &args.log_level {
            self.logging.level = level.clone();
            tracing::info!("Override logging.level from CLI: {}", self.logging.level);
        }

        if let Some(attempts) = args.llm_retry_attempts {
            self.llm.retry_attempts = attempts;
            tracing::info!("Override llm.retry_attempts from CLI: {}", self.llm.retry_attempts);
        }

        if let Some(delay) = &args.llm_retry_delay {
            match parse_duration_to_millis(delay) {
                Ok(val) => {
                    self.llm.retry_delay_ms = val;
                    tracing::info!("Override llm.retry_delay_ms from CLI: {}", val);
                },
                Err(e) => tracing::warn!("Invalid --llm-retry-delay '{}': {}", delay, e),
            }
        }

        if let Some(max_entries) = args.cache_max_entries {
            self.cache.max_entries = max_entries;
            tracing::info!("Override cache.max_entries from CLI: {}", self.cache.max_entries);
        }

        if let Some(ttl) = &args.cache_ttl {
            match parse_duration_to_millis(ttl) {
                Ok(val) => {
                    self.cache.ttl_ms = val;
                    tracing::info!("Override cache.ttl_ms from CLI: {}", val);
                },
                Err(e) => tracing::warn!("Invalid --cache-ttl '{}': {}", ttl, e),
            }
        }

        if let Some(min_confidence) = args.intent_min_confidence {
            self.intent.min_confidence = min_confidence;
            tracing::info!("Override intent.min_confidence from CLI: {}", self.intent.min_confidence);
        }
    }

    fn validate(&self) -> Result<(), anyhow::Error> {
        if self.server.port == 0 {
            anyhow::bail!("Server port cannot be 0");
        }
        if self.database.url.is_empty() {
            anyhow::bail!("Database URL cannot be empty");
        }
        if self.llm.retry_attempts == 0 {
            anyhow::bail!("llm.retry_attempts must be > 0");
        }
        if self.cache.max_entries == 0 {
            anyhow::bail!("cache.max_entries must be > 0");
        }
        if !(0.0..=1.0).contains(&self.cache.eviction_fraction) {
            anyhow::bail!("cache.eviction_fraction must be within [0,1]");
        }
        if !(0.0..=1.0).contains(&self.intent.min_confidence) {
            anyhow::bail!("intent.min_confidence must be within [0,1]");
        }
        if self.executor.progress_buffer == 0 {
            anyhow::bail!("executor.progress_buffer must be > 0");
        }
        Ok(())
    }

    fn find_config_file() -> Option<String> {
        let possible_paths = ["conf/config.toml", "config.toml", "./conf/config.toml", "./config.toml"];

        for path in &possible_paths {
            if Path::new(path).exists() {
                return Some(path.to_string());
            }
        }
        None
    }

    fn from_toml(path: &str) -> Result<Self, anyhow::Error> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "0.0.0.0".to_string(), port: 8080 }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { url: "sqlite://data/ai-query-engine.db".to_string() }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info,ai_query_engine=debug".to_string(), file: Some("logs/ai-query-engine.log".to_string()) }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self { providers: Vec::new(), primary_provider: None, retry_attempts: 3, retry_delay_ms: 1_000 }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { max_entries: 1_000, ttl_ms: 3_600_000, eviction_fraction: 0.10, sweep_interval_ms: 60_000 }
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self { batch_timeout_ms: 30_000, stream_timeout_ms: 120_000, progress_buffer: 16 }
    }
}

impl Default for IntentConfig {
    fn default() -> Self {
        Self { min_confidence: 0.30 }
    }
}

// =========================
// Helpers for parsing values
// =========================

fn parse_duration_to_millis(input: &str) -> Result<u64, String> {
    if let Ok(val) = input.parse::<u64>() {
        return Ok(val);
    }

    let s = input.trim().to_lowercase();
    let (num_str, unit) = s.split_at(s.chars().take_while(|c| c.is_ascii_digit()).count());
    if num_str.is_empty() || unit.is_empty() {
        return Err("missing number or unit".into());
    }
    let n: u64 = num_str.parse().map_err(|_| "invalid number".to_string())?;
    match unit {
        "ms" | "msec" | "msecs" => Ok(n),
        "s" | "sec" | "secs" | "second" | "seconds" => Ok(n * 1_000),
        "m" | "min" | "mins" | "minute" | "minutes" => Ok(n * 60_000),
        "h" | "hr" | "hour" | "hours" => Ok(n * 3_600_000),
        "d" | "day" | "days" => Ok(n * 86_400_000),
        _ => Err(format!("unsupported unit: {}", unit)),
    }
}

// Custom serde deserializer to support numeric (milliseconds) or
// human-friendly string values ("30s", "5m", "1h") in config.toml.
fn deserialize_duration_ms<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    struct Visitor;
    impl<'de> serde::de::Visitor<'de> for Visitor {
        type Value = u64;
        fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
            write!(f, "a number of milliseconds or a string like '30s', '5m', '1h'")
        }
        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E> {
            Ok(v)
        }
        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            if v >= 0 { Ok(v as u64) } else { Err(E::custom("negative not allowed")) }
        }
        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            parse_duration_to_millis(v).map_err(E::custom)
        }
        fn visit_string<E>(self, v: String) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            parse_duration_to_millis(&v).map_err(E::custom)
        }
    }
    deserializer.deserialize_any(Visitor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn zero_port_is_rejected() {
        let mut config = Config::default();
        config.server.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn human_friendly_durations_parse_to_millis() {
        assert_eq!(parse_duration_to_millis("500ms").unwrap(), 500);
        assert_eq!(parse_duration_to_millis("30s").unwrap(), 30_000);
        assert_eq!(parse_duration_to_millis("5m").unwrap(), 300_000);
        assert_eq!(parse_duration_to_millis("1h").unwrap(), 3_600_000);
    }
}
