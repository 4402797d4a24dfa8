//! Pure scheduling-gate logic, kept separate
//! from the scheduler loop so each gate can be unit tested without
//! spinning up a whole engine.

use chrono::{DateTime, FixedOffset, Timelike, Utc};
use chrono_tz::Tz;

/// Below this hour (in the configured timezone) the window is closed.
pub const WINDOW_OPEN_HOUR: u32 = 12;

/// Minimum gap between scheduler-triggered cycles.
pub const COOLDOWN_HOURS: i64 = 23;

/// The configured scheduler timezone, resolved once at startup. A
/// named zone (e.g. `America/Denver`, the default) is preferred; an
/// unparseable name falls back to a fixed UTC-7 offset rather than
/// failing startup outright.
#[derive(Debug, Clone, Copy)]
pub enum SchedulerZone {
    Named(Tz),
    FixedOffset(FixedOffset),
}

impl SchedulerZone {
    pub fn resolve(name: &str) -> Self {
        match name.parse::<Tz>() {
            Ok(tz) => Self::Named(tz),
            Err(_) => {
                tracing::warn!(name, "unrecognized scheduler timezone, falling back to fixed UTC-7");
                Self::fixed_utc_minus_7()
            }
        }
    }

    fn fixed_utc_minus_7() -> Self {
        Self::FixedOffset(FixedOffset::west_opt(7 * 3600).expect("UTC-7 is a valid fixed offset"))
    }

    /// The current hour-of-day (0-23) in this zone, for a given instant.
    pub fn current_hour(&self, now: DateTime<Utc>) -> u32 {
        match self {
            Self::Named(tz) => now.with_timezone(tz).hour(),
            Self::FixedOffset(offset) => now.with_timezone(offset).hour(),
        }
    }
}

impl Default for SchedulerZone {
    fn default() -> Self {
        Self::resolve("America/Denver")
    }
}

/// Window gate: open once the local hour reaches
/// [`WINDOW_OPEN_HOUR`].
pub fn window_is_open(zone: SchedulerZone, now: DateTime<Utc>) -> bool {
    zone.current_hour(now) >= WINDOW_OPEN_HOUR
}

/// Cooldown gate: only applies to
/// scheduler-triggered cycles; a manual trigger bypasses it entirely
/// (the caller simply never consults this gate for a manual trigger).
pub fn cooldown_has_elapsed(last_completed_started_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    match last_completed_started_at {
        None => true,
        Some(started_at) => now.signed_duration_since(started_at) >= chrono::Duration::hours(COOLDOWN_HOURS),
    }
}

/// Convenience used by tests and the scheduler loop: the first instant
/// on or after `now` at which the window will next open, in UTC. Not
/// exact to the second across a DST transition, but good enough for
/// the `next_window_opens_at` status field.
pub fn next_window_open_after(zone: SchedulerZone, now: DateTime<Utc>) -> DateTime<Utc> {
    if window_is_open(zone, now) {
        return now;
    }
    let hour = zone.current_hour(now);
    let hours_until_open = (WINDOW_OPEN_HOUR + 24 - hour) % 24;
    let hours_until_open = if hours_until_open == 0 { 24 } else { hours_until_open };
    now + chrono::Duration::hours(hours_until_open as i64)
        - chrono::Duration::minutes(now.minute() as i64)
        - chrono::Duration::seconds(now.second() as i64)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn window_closed_before_noon_local() {
        let zone = SchedulerZone::FixedOffset(FixedOffset::east_opt(0).unwrap());
        let morning = DateTime::parse_from_rfc3339("2026-01-05T09:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert!(!window_is_open(zone, morning));
    }

    #[test]
    fn window_open_at_and_after_noon_local() {
        let zone = SchedulerZone::FixedOffset(FixedOffset::east_opt(0).unwrap());
        let noon = DateTime::parse_from_rfc3339("2026-01-05T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert!(window_is_open(zone, noon));
    }

    #[test]
    fn cooldown_blocks_within_23h() {
        let last = DateTime::parse_from_rfc3339("2026-01-05T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let soon_after = last + chrono::Duration::hours(10);
        assert!(!cooldown_has_elapsed(Some(last), soon_after));
    }

    #[test]
    fn cooldown_clears_after_23h() {
        let last = DateTime::parse_from_rfc3339("2026-01-05T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let later = last + chrono::Duration::hours(24);
        assert!(cooldown_has_elapsed(Some(last), later));
    }

    #[test]
    fn unrecognized_timezone_falls_back_to_fixed_offset() {
        let zone = SchedulerZone::resolve("Not/A_Real_Zone");
        assert!(matches!(zone, SchedulerZone::FixedOffset(_)));
    }

    #[test]
    fn named_zone_parses() {
        let zone = SchedulerZone::resolve("America/Denver");
        assert!(matches!(zone, SchedulerZone::Named(_)));
    }
}
