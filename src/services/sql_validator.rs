//! SQL Validator and Formatter. Parses generated SQL with
//! `sqlparser`, rejects anything whose root statement type is outside
//! the read-only set, and re-emits canonically formatted SQL.

use sqlparser::ast::Statement;
use sqlparser::dialect::{Dialect, GenericDialect, MySqlDialect, PostgreSqlDialect};
use sqlparser::parser::Parser;

use crate::models::SqlDialect;
use crate::utils::error::{ApiError, ApiResult};

fn dialect_for(dialect: SqlDialect) -> Box<dyn Dialect> {
    match dialect {
        SqlDialect::Postgres => Box::new(PostgreSqlDialect {}),
        SqlDialect::MySql => Box::new(MySqlDialect {}),
    }
}

/// Parses `sql`, rejects any statement whose root type is destructive or
/// schema-mutating, and returns the statement re-formatted with
/// uppercase keywords. Only a single statement is accepted.
pub fn validate_and_format(sql: &str, dialect: SqlDialect) -> ApiResult<String> {
    let parser_dialect = dialect_for(dialect);
    let statements = Parser::parse_sql(parser_dialect.as_ref(), sql)
        .map_err(|e| ApiError::unsafe_sql(format!("SQL did not parse: {}", e)))?;

    if statements.is_empty() {
        return Err(ApiError::unsafe_sql("empty SQL statement"));
    }
    if statements.len() > 1 {
        return Err(ApiError::unsafe_sql("only a single statement is permitted"));
    }

    let statement = &statements[0];
    reject_if_forbidden(statement)?;

    Ok(statement.to_string())
}

fn reject_if_forbidden(statement: &Statement) -> ApiResult<()> {
    let forbidden_kind = match statement {
        Statement::Insert { .. } => Some("INSERT"),
        Statement::Update { .. } => Some("UPDATE"),
        Statement::Delete { .. } => Some("DELETE"),
        Statement::Drop { .. } => Some("DROP"),
        Statement::CreateTable { .. }
        | Statement::CreateView { .. }
        | Statement::CreateIndex { .. }
        | Statement::CreateDatabase { .. } => Some("CREATE"),
        Statement::AlterTable { .. } => Some("ALTER"),
        Statement::Truncate { .. } => Some("TRUNCATE"),
        Statement::Query(_) => None,
        other => Some(forbidden_label(other)),
    };

    match forbidden_kind {
        Some(kind) => Err(ApiError::unsafe_sql(format!("{} statements are not permitted", kind))),
        None => Ok(()),
    }
}

/// Any statement type not explicitly read-only is rejected on the same
/// footing as the named forbidden set — read-only SQL is an allow-list,
/// not a deny-list, against mutating external sources.
fn forbidden_label(_statement: &Statement) -> &'static str {
    "non-SELECT"
}

/// Best-effort parse of `sql` purely to determine its dialect-agnostic
/// shape for the optimisation heuristic; never used for safety
/// decisions, which always run through `validate_and_format`.
pub fn parse_lenient(sql: &str) -> Vec<Statement> {
    Parser::parse_sql(&GenericDialect {}, sql).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_statement_passes_and_is_reformatted() {
        let formatted = validate_and_format("select id, name from customers", SqlDialect::Postgres)
            .expect("select should validate");
        assert!(formatted.to_uppercase().starts_with("SELECT"));
    }

    #[test]
    fn drop_table_is_rejected() {
        let err = validate_and_format("DROP TABLE orders", SqlDialect::Postgres).unwrap_err();
        assert!(matches!(err, ApiError::UnsafeSQL(_)));
    }

    #[test]
    fn insert_is_rejected() {
        let err =
            validate_and_format("INSERT INTO orders VALUES (1)", SqlDialect::Postgres).unwrap_err();
        assert!(matches!(err, ApiError::UnsafeSQL(_)));
    }

    #[test]
    fn multiple_statements_are_rejected() {
        let err = validate_and_format("SELECT 1; SELECT 2;", SqlDialect::Postgres).unwrap_err();
        assert!(matches!(err, ApiError::UnsafeSQL(_)));
    }

    #[test]
    fn validate_and_format_is_idempotent_on_success() {
        let once = validate_and_format("select * from orders limit 10", SqlDialect::Postgres).unwrap();
        let twice = validate_and_format(&once, SqlDialect::Postgres).unwrap();
        assert_eq!(once, twice);
    }
}
