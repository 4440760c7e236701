use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Memcached reads relative exptimes above this many seconds as absolute Unix time.
pub const MEMCACHED_RELATIVE_LIMIT_SECS: u64 = 60 * 60 * 24 * 30;

/// Process-wide document lifetime shared by every write through one backend.
///
/// A zero window disables expiry entirely. Writes made with
/// `skip_expiration` are pinned and never receive a deadline.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExpirationWindow(Option<Duration>);

impl ExpirationWindow {
    pub fn new(window: Duration) -> Self {
        if window.is_zero() {
            Self(None)
        } else {
            Self(Some(window))
        }
    }

    pub fn from_secs(secs: u64) -> Self {
        Self::new(Duration::from_secs(secs))
    }

    pub fn none() -> Self {
        Self(None)
    }

    pub fn window(&self) -> Option<Duration> {
        self.0
    }

    pub fn is_enabled(&self) -> bool {
        self.0.is_some()
    }

    /// Lifetime to apply to a write, or `None` when the document must not expire.
    pub fn for_write(&self, skip_expiration: bool) -> Option<Duration> {
        if skip_expiration { None } else { self.0 }
    }

    /// Absolute deadline for a write. A window reaching past the clock's
    /// range saturates to the latest representable instant.
    pub fn deadline_from(&self, now: SystemTime, skip_expiration: bool) -> Option<SystemTime> {
        self.for_write(skip_expiration)
            .map(|ttl| now.checked_add(ttl).unwrap_or_else(|| latest_after(now)))
    }

    /// Deadline as whole Unix seconds; `0` encodes "never".
    pub fn deadline_epoch_secs(&self, now: SystemTime, skip_expiration: bool) -> i64 {
        self.deadline_from(now, skip_expiration)
            .map(epoch_secs)
            .unwrap_or(0)
    }

    pub fn is_expired(deadline: SystemTime, now: SystemTime) -> bool {
        deadline <= now
    }

    /// Memcached exptime for a write. Windows over thirty days are sent as an
    /// absolute timestamp, sub-second windows round up to one second.
    pub fn memcached_exptime(&self, now: SystemTime, skip_expiration: bool) -> u32 {
        let Some(ttl) = self.for_write(skip_expiration) else {
            return 0;
        };

        let secs = ceil_secs(ttl);
        let exptime = if secs > MEMCACHED_RELATIVE_LIMIT_SECS {
            (epoch_secs(now).max(0) as u64).saturating_add(secs)
        } else {
            secs
        };
        u32::try_from(exptime).unwrap_or(u32::MAX)
    }
}

pub fn epoch_secs(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(d) => i64::try_from(d.as_secs()).unwrap_or(i64::MAX),
        Err(e) => i64::try_from(e.duration().as_secs()).map_or(i64::MIN, |secs| -secs),
    }
}

/// Whole seconds, rounding any fraction up.
pub fn ceil_secs(d: Duration) -> u64 {
    let secs = d.as_secs();
    if d.subsec_nanos() > 0 { secs.saturating_add(1) } else { secs }
}

/// Whole milliseconds, at least one, saturating at `u64::MAX`.
pub fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX).max(1)
}

/// Largest instant after `now` the platform clock can hold, found by halving
/// the step until it fits.
fn latest_after(now: SystemTime) -> SystemTime {
    let mut latest = now;
    let mut step = Duration::from_secs(u64::MAX);
    while !step.is_zero() {
        match latest.checked_add(step) {
            Some(next) => latest = next,
            None => step /= 2,
        }
    }
    latest
}
