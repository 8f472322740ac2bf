//! SQL Generator with provider failover.
//!
//! Providers are tried in order starting with the configured primary;
//! within a provider up to `retry_attempts` are made, the first against
//! `primary_model` and the rest against `fallback_model`, with linear
//! backoff between attempts. A rate-limit response abandons the provider
//! immediately rather than burning its remaining attempts.

use std::time::Duration;

use tokio::time::sleep;

use super::client::LLMClient;
use super::models::{GeneratedSql, LLMError, LlmProviderConfig, StructuredSqlResponse};
use crate::models::{DataSourceKind, Intent, Schema};

pub struct SqlGenerator {
    client: LLMClient,
    /// Providers in priority order; index 0 is primary unless start-up
    /// probing found it unavailable, in which case the list is rotated.
    providers: Vec<LlmProviderConfig>,
    retry_attempts: u32,
    retry_delay: Duration,
}

impl SqlGenerator {
    pub fn new(
        mut providers: Vec<LlmProviderConfig>,
        primary_provider_name: Option<&str>,
        retry_attempts: u32,
        retry_delay: Duration,
    ) -> Self {
        if let Some(name) = primary_provider_name {
            if let Some(pos) = providers.iter().position(|p| p.name == name) {
                let primary = providers.remove(pos);
                providers.insert(0, primary);
            }
        }
        Self { client: LLMClient::new(), providers, retry_attempts: retry_attempts.max(1), retry_delay }
    }

    pub async fn generate(
        &self,
        natural_language: &str,
        intent: &Intent,
        schema: &Schema,
        kind: DataSourceKind,
    ) -> Result<GeneratedSql, LLMError> {
        if self.providers.is_empty() {
            return Err(LLMError::NoProviderConfigured);
        }

        let system_prompt = build_system_prompt(schema, kind);
        let user_prompt = build_user_prompt(natural_language, intent);

        for provider in &self.providers {
            match self.try_provider(provider, &system_prompt, &user_prompt).await {
                Ok(generated) => return Ok(generated),
                Err(e) => {
                    tracing::warn!(provider = %provider.name, error = %e, "provider exhausted");
                    sleep(self.retry_delay).await;
                },
            }
        }

        Err(LLMError::AllProvidersFailed)
    }

    async fn try_provider(
        &self,
        provider: &LlmProviderConfig,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<GeneratedSql, LLMError> {
        let mut last_err = LLMError::NoProviderConfigured;

        for attempt in 0..self.retry_attempts {
            if attempt > 0 {
                sleep(self.retry_delay * attempt).await;
            }

            let model = if attempt == 0 { &provider.primary_model } else { &provider.fallback_model };

            let result = self
                .client
                .chat_completion::<StructuredSqlResponse>(
                    &provider.endpoint,
                    &provider.credential,
                    model,
                    system_prompt,
                    user_prompt,
                    Duration::from_secs(30),
                )
                .await;

            match result {
                Ok((structured, _input_tokens, _output_tokens)) => {
                    return Ok(GeneratedSql {
                        sql: structured.sql,
                        explanation: structured.explanation,
                        confidence: structured.confidence,
                        warnings: structured.warnings,
                        estimated_rows: structured.estimated_rows,
                        execution_plan: structured.execution_plan,
                        provider_used: provider.name.clone(),
                        model_used: model.clone(),
                    });
                },
                Err(e) if e.is_rate_limited() => {
                    tracing::warn!(provider = %provider.name, "rate limited, abandoning provider");
                    return Err(e);
                },
                Err(e) => {
                    tracing::debug!(provider = %provider.name, attempt, error = %e, "attempt failed");
                    last_err = e;
                },
            }
        }

        Err(last_err)
    }
}

fn build_system_prompt(schema: &Schema, kind: DataSourceKind) -> String {
    let dialect = match kind.dialect() {
        crate::models::SqlDialect::Postgres => "PostgreSQL",
        crate::models::SqlDialect::MySql => "MySQL",
    };
    format!(
        "You translate analytical questions into a single read-only {dialect} SQL statement.\n\
         Only SELECT statements are permitted; never emit INSERT, UPDATE, DELETE, DROP, CREATE, \
         ALTER, or TRUNCATE.\n\
         Schema:\n{}\n\
         Respond as JSON with fields: sql, explanation, confidence (0-1), estimated_rows, \
         execution_plan, warnings (array of strings).",
        schema.to_prompt_text()
    )
}

fn build_user_prompt(natural_language: &str, intent: &Intent) -> String {
    let mut prompt = format!(
        "Question: {}\nIntent category: {:?}\nConfidence: {:.2}\nKeywords: {}",
        natural_language,
        intent.category,
        intent.confidence,
        intent.keywords.join(", ")
    );
    if !intent.metrics.is_empty() {
        prompt.push_str(&format!("\nMetrics: {}", intent.metrics.join(", ")));
    }
    if !intent.dimensions.is_empty() {
        prompt.push_str(&format!("\nDimensions: {}", intent.dimensions.join(", ")));
    }
    if let Some(timeframe) = &intent.timeframe {
        prompt.push_str(&format!(
            "\nTimeframe: {} to {} ({:?})",
            timeframe.from, timeframe.to, timeframe.granularity
        ));
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(name: &str) -> LlmProviderConfig {
        LlmProviderConfig {
            name: name.to_string(),
            endpoint: "https://example.invalid".to_string(),
            credential: "test".to_string(),
            primary_model: "model-a".to_string(),
            fallback_model: "model-a-mini".to_string(),
        }
    }

    #[test]
    fn primary_provider_name_is_moved_to_front() {
        let providers = vec![provider("b"), provider("a")];
        let generator = SqlGenerator::new(providers, Some("a"), 3, Duration::from_millis(1));
        assert_eq!(generator.providers[0].name, "a");
    }

    #[tokio::test]
    async fn empty_provider_list_fails_fast() {
        let generator = SqlGenerator::new(vec![], None, 3, Duration::from_millis(1));
        let schema = Schema::default();
        let intent = Intent {
            category: crate::models::IntentCategory::Unknown,
            confidence: 0.9,
            ..Default::default()
        };
        let err = generator
            .generate("top customers", &intent, &schema, DataSourceKind::RelationalPostgres)
            .await
            .unwrap_err();
        assert!(matches!(err, LLMError::NoProviderConfigured));
    }
}
