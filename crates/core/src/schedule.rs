//! Cron normalization and parsing helpers.
//!
//! Schedule expressions appear in two places: the pipeline's
//! `harvest_frequency` and the `cron_expression` of API-style sources.
//! Both accept standard 5-field cron and are normalized to the 6-field
//! form the `cron` crate expects.

use std::str::FromStr;

use cron::Schedule;

use crate::error::{ChurroError, Result};

/// Normalize a 5-field cron expression to 6-field by prepending "0 " for seconds.
///
/// The `cron` crate requires 6 fields: `sec min hour day-of-month month day-of-week`.
/// Operator-facing configuration uses standard 5-field cron.
pub fn normalize_cron(expr: &str) -> String {
    let trimmed = expr.trim();
    let field_count = trimmed.split_whitespace().count();
    if field_count == 5 {
        format!("0 {}", trimmed)
    } else {
        // Already 6-field or non-standard; pass through as-is.
        trimmed.to_string()
    }
}

/// Parse a (possibly 5-field) cron expression into a [`Schedule`].
pub fn parse_cron(expr: &str) -> Result<Schedule> {
    let normalized = normalize_cron(expr);
    Schedule::from_str(&normalized)
        .map_err(|e| ChurroError::Config(format!("invalid cron expression '{}': {}", expr, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_5_to_6_fields() {
        assert_eq!(normalize_cron("*/15 * * * *"), "0 */15 * * * *");
        assert_eq!(normalize_cron("0 6 * * 1-5"), "0 0 6 * * 1-5");
    }

    #[test]
    fn normalize_passes_6_fields_through() {
        assert_eq!(normalize_cron("*/20 * * * * *"), "*/20 * * * * *");
    }

    #[test]
    fn normalize_trims_whitespace() {
        assert_eq!(normalize_cron("  */5 * * * *  "), "0 */5 * * * *");
    }

    #[test]
    fn parse_accepts_both_forms() {
        assert!(parse_cron("*/20 * * * * *").is_ok());
        assert!(parse_cron("30 2 * * *").is_ok());
    }

    #[test]
    fn parse_rejects_garbage() {
        let err = parse_cron("every twenty seconds").unwrap_err();
        assert!(matches!(err, ChurroError::Config(_)));
    }
}
