// Clock provider for the calendar runtime.
// Resolves "current day/month", honoring simulated overrides from config.

use chrono::{Datelike, Local};

/// Clock override taken from configuration. Values outside the calendar
/// range are treated as "no override".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClockOverride {
    pub day: Option<u32>,
    pub month: Option<u32>,
}

impl ClockOverride {
    pub fn new(day: Option<u32>, month: Option<u32>) -> Self {
        ClockOverride {
            day: day.filter(|d| (1..=31).contains(d)),
            month: month.filter(|m| (1..=12).contains(m)),
        }
    }
}

/// Resolves the current calendar day and month for date gating.
///
/// Deterministic for a fixed override configuration, which keeps the
/// unlock resolver testable without touching the wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct GameClock {
    overrides: ClockOverride,
}

impl GameClock {
    pub fn new(overrides: ClockOverride) -> Self {
        GameClock { overrides }
    }

    /// A clock frozen at an explicit day and month.
    pub fn fixed(day: u32, month: u32) -> Self {
        GameClock {
            overrides: ClockOverride::new(Some(day), Some(month)),
        }
    }

    /// Wall-clock only, no overrides.
    pub fn system() -> Self {
        GameClock::default()
    }

    pub fn current_day(&self) -> u32 {
        match self.overrides.day {
            Some(day) => day,
            None => Local::now().day(),
        }
    }

    pub fn current_month(&self) -> u32 {
        match self.overrides.month {
            Some(month) => month,
            None => Local::now().month(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_returns_overrides() {
        let clock = GameClock::fixed(5, 12);
        assert_eq!(clock.current_day(), 5);
        assert_eq!(clock.current_month(), 12);
    }

    #[test]
    fn out_of_range_overrides_are_ignored() {
        let overrides = ClockOverride::new(Some(42), Some(13));
        assert_eq!(overrides.day, None);
        assert_eq!(overrides.month, None);

        // The clock falls back to the wall clock for both components.
        let clock = GameClock::new(overrides);
        assert!((1..=31).contains(&clock.current_day()));
        assert!((1..=12).contains(&clock.current_month()));
    }

    #[test]
    fn partial_override_keeps_other_component_live() {
        let clock = GameClock::new(ClockOverride::new(Some(24), None));
        assert_eq!(clock.current_day(), 24);
        assert!((1..=12).contains(&clock.current_month()));
    }
}
