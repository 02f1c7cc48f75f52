//! Retention end-date arithmetic.
//!
//! Named policies use calendar month/year addition, matching legal retention
//! language, not fixed 30/365-day multiples. Custom policies are day counts
//! by definition.

use chrono::{DateTime, Duration, Months, Utc};
use ledger_types::RetentionPolicy;

/// Compute the retention end for a record ingested at `from`.
pub fn retention_end(policy: RetentionPolicy, from: DateTime<Utc>) -> DateTime<Utc> {
    match policy {
        RetentionPolicy::ShortTerm => add_months(from, 1),
        RetentionPolicy::Standard => add_months(from, 12),
        RetentionPolicy::Commercial => add_months(from, 72),
        RetentionPolicy::Fiscal => add_months(from, 120),
        RetentionPolicy::Custom { days } => from + Duration::days(i64::from(days)),
    }
}

fn add_months(from: DateTime<Utc>, months: u32) -> DateTime<Utc> {
    // Saturates at the maximum representable date rather than wrapping.
    from.checked_add_months(Months::new(months))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
