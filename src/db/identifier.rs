//! Quoting of identifiers that end up inside generated SQL text.
//!
//! Identifiers cannot be bound as statement parameters, so table and database names are
//! validated and rendered as PostgreSQL quoted identifiers instead.

use crate::error::ProviderError;

/// Render `name` as a PostgreSQL quoted identifier.
///
/// Embedded double quotes are doubled and the result is wrapped in double quotes. The
/// name is quoted as given; surrounding whitespace is preserved.
///
/// # Errors
///
/// `ProviderError::Argument` when the name is empty, whitespace-only, or contains a NUL
/// byte (PostgreSQL cannot store one in an identifier).
pub fn quote_identifier(name: &str) -> Result<String, ProviderError> {
    if name.trim().is_empty() {
        return Err(ProviderError::argument(
            "identifier must not be empty or whitespace",
        ));
    }
    if name.contains('\0') {
        return Err(ProviderError::argument(format!(
            "identifier contains a NUL byte: {name:?}"
        )));
    }
    Ok(format!("\"{}\"", name.replace('"', "\"\"")))
}
