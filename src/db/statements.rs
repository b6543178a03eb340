//! SQL text issued by the lifecycle operations.

use super::identifier::quote_identifier;
use crate::error::ProviderError;

pub const VACUUM_ANALYZE: &str = "VACUUM ANALYZE";

/// Ordered maintenance commands for the connected database.
pub fn maintenance_commands(database: &str) -> Result<Vec<String>, ProviderError> {
    Ok(vec![
        VACUUM_ANALYZE.to_string(),
        format!("REINDEX DATABASE {}", quote_identifier(database)?),
    ])
}

/// Single `TRUNCATE` covering every table, or `None` when there is nothing to purge.
///
/// Every name is validated before any text is produced, so a bad name never results in
/// a partial statement.
pub fn purge_statement<S: AsRef<str>>(tables: &[S]) -> Result<Option<String>, ProviderError> {
    if tables.is_empty() {
        return Ok(None);
    }
    let quoted = tables
        .iter()
        .map(|t| quote_identifier(t.as_ref()))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Some(format!(
        "TRUNCATE TABLE {} RESTART IDENTITY CASCADE",
        quoted.join(", ")
    )))
}
