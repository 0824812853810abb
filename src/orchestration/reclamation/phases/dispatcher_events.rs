use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use super::ReclamationPhase;
use crate::constants::system::MAX_KEEP_EVENTS_IN_DB_DAYS;
use crate::error::{DispatcherError, DispatcherResult};
use crate::models::DispatcherEvent;
use crate::orchestration::reclamation::{PhaseReport, SweepContext};

/// Bulk-deletes dispatcher events whose period is at or before the retention cutoff
#[derive(Debug, Clone, Copy, Default)]
pub struct DispatcherEventPhase;

impl DispatcherEventPhase {
    /// Last period that falls entirely out of retention.
    ///
    /// # Errors
    ///
    /// `ConfigurationError` when `keep_days` exceeds the supported maximum.
    pub fn cutoff_period(now: DateTime<Utc>, keep_days: u64) -> DispatcherResult<i32> {
        if keep_days > MAX_KEEP_EVENTS_IN_DB_DAYS {
            return Err(DispatcherError::ConfigurationError(format!(
                "keep_events_in_db_days = {keep_days} exceeds the maximum of {MAX_KEEP_EVENTS_IN_DB_DAYS}"
            )));
        }
        // Bounded by the check above, cannot overflow
        let cutoff = now - Duration::days(keep_days as i64);
        Ok(DispatcherEvent::period_of(cutoff))
    }
}

#[async_trait]
impl ReclamationPhase for DispatcherEventPhase {
    fn name(&self) -> &'static str {
        "dispatcher_events"
    }

    async fn run(&self, ctx: &SweepContext, now: DateTime<Utc>) -> DispatcherResult<PhaseReport> {
        let period = Self::cutoff_period(now, ctx.config.keep_events_in_db_days)?;
        let deleted = ctx.store.delete_events_with_period_le(period).await? as usize;
        Ok(PhaseReport {
            candidates: deleted,
            deleted,
            ..PhaseReport::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    #[test]
    fn test_cutoff_period() {
        let now = Utc.with_ymd_and_hms(2026, 10, 18, 0, 0, 0).unwrap();
        assert_eq!(DispatcherEventPhase::cutoff_period(now, 90).unwrap(), 202607);
        assert_eq!(DispatcherEventPhase::cutoff_period(now, 0).unwrap(), 202610);
    }

    #[test]
    fn test_absurd_retention_is_fatal() {
        let err = DispatcherEventPhase::cutoff_period(Utc::now(), 100_001).unwrap_err();
        assert!(err.is_fatal());
        assert!(DispatcherEventPhase::cutoff_period(Utc::now(), 100_000).is_ok());
    }

    proptest! {
        #[test]
        fn cutoff_never_after_now(days in 0u64..=100_000, offset in 0i64..2_000_000_000) {
            let now = Utc.timestamp_opt(1_000_000_000 + offset, 0).unwrap();
            let cutoff = DispatcherEventPhase::cutoff_period(now, days).unwrap();
            prop_assert!(cutoff <= DispatcherEvent::period_of(now));
        }

        #[test]
        fn longer_retention_never_moves_cutoff_forward(days in 0u64..50_000, extra in 0u64..50_000) {
            let now = Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap();
            let short = DispatcherEventPhase::cutoff_period(now, days).unwrap();
            let long = DispatcherEventPhase::cutoff_period(now, days + extra).unwrap();
            prop_assert!(long <= short);
        }
    }
}
