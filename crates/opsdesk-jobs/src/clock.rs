//! Wall clock at the precision the store keeps.

use chrono::{DateTime, SubsecRound, Utc};

/// Current time truncated to microseconds.
///
/// `started_at` is compared for equality when a claim is checked, so the
/// value held in memory must match what a `DATETIME(6)` column stores.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn test_now_has_microsecond_precision() {
        let t = now();
        assert_eq!(t.nanosecond() % 1_000, 0);
    }
}
