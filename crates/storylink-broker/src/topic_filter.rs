//! MQTT-style topic filters.
//!
//! Levels are separated by `/`. `+` matches exactly one level, `#` matches
//! any number of trailing levels (including none) and must be last.

use storylink_core::error::DomainError;

/// Checks that `filter` is well formed.
///
/// # Errors
///
/// Returns `DomainError::Validation` if the filter is empty, `#` is not the
/// last level, or a wildcard shares a level with other characters.
pub fn validate(filter: &str) -> Result<(), DomainError> {
    if filter.is_empty() {
        return Err(DomainError::Validation("topic filter is empty".into()));
    }
    let levels: Vec<&str> = filter.split('/').collect();
    for (i, level) in levels.iter().enumerate() {
        let wildcard = level.contains('+') || level.contains('#');
        if wildcard && level.len() > 1 {
            return Err(DomainError::Validation(format!(
                "wildcard must occupy a whole level: {filter}"
            )));
        }
        if *level == "#" && i + 1 != levels.len() {
            return Err(DomainError::Validation(format!(
                "'#' must be the last level: {filter}"
            )));
        }
    }
    Ok(())
}

/// Returns `true` if `topic` matches `filter`.
#[must_use]
pub fn matches(filter: &str, topic: &str) -> bool {
    let mut filter_levels = filter.split('/');
    let mut topic_levels = topic.split('/');
    loop {
        match (filter_levels.next(), topic_levels.next()) {
            (Some("#"), _) => return true,
            (Some("+"), Some(_)) => {}
            (Some(f), Some(t)) if f == t => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}
