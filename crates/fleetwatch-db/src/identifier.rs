//! SQL identifier sanitisation.

/// Table name used when configuration supplies none, or nothing usable.
pub const DEFAULT_TABLE_NAME: &str = "status_events";

/// Reduces a configured identifier to ASCII letters, digits and underscores.
///
/// Identifiers cannot be bound as statement parameters, so any configured
/// name is filtered through this allow-list before it is interpolated into
/// SQL text. If nothing survives the filter, [`DEFAULT_TABLE_NAME`] is used.
pub fn sanitize_identifier(raw: &str) -> String {
    let filtered: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();

    if filtered.is_empty() {
        DEFAULT_TABLE_NAME.to_string()
    } else {
        filtered
    }
}
