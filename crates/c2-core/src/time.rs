use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch, wall clock.
pub type EpochMillis = u64;

pub const MILLIS_PER_MINUTE: EpochMillis = 60_000;

pub fn now_epoch_millis() -> EpochMillis {
    let duration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    EpochMillis::try_from(duration.as_millis()).unwrap_or(EpochMillis::MAX)
}

/// Saturates instead of overflowing.
pub fn minutes_after(from: EpochMillis, minutes: u64) -> EpochMillis {
    from.saturating_add(minutes.saturating_mul(MILLIS_PER_MINUTE))
}
