// ── Time-of-day brightness ──
//
// Both displays drop to minimum brightness during the night window and
// return to their nominal level outside it. Times are compared at
// minute resolution; both window edges are inclusive.

use chrono::{NaiveTime, Timelike};

use crate::display::Brightness;

const MINUTES_PER_DAY: u16 = 24 * 60;

/// Source of the current local time of day.
pub trait Clock: Send + Sync {
    fn time_of_day(&self) -> NaiveTime;
}

/// Wall clock in the host's local time zone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn time_of_day(&self) -> NaiveTime {
        chrono::Local::now().time()
    }
}

/// Night window, possibly wrapping past midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrightnessPolicy {
    night_start: u16,
    night_end: u16,
}

impl Default for BrightnessPolicy {
    /// 20:00 through 08:00.
    fn default() -> Self {
        Self {
            night_start: 20 * 60,
            night_end: 8 * 60,
        }
    }
}

impl BrightnessPolicy {
    pub fn new(night_start: NaiveTime, night_end: NaiveTime) -> Self {
        Self {
            night_start: minute_of_day(night_start),
            night_end: minute_of_day(night_end),
        }
    }

    pub fn is_night(&self, now: NaiveTime) -> bool {
        let m = minute_of_day(now);
        if self.night_start > self.night_end {
            m >= self.night_start || m <= self.night_end
        } else {
            (self.night_start..=self.night_end).contains(&m)
        }
    }

    /// Level to apply right now for a display whose day level is `nominal`.
    pub fn level_for(&self, now: NaiveTime, nominal: Brightness) -> Brightness {
        if self.is_night(now) {
            Brightness::MIN
        } else {
            nominal
        }
    }
}

fn minute_of_day(t: NaiveTime) -> u16 {
    let minutes = t.hour() * 60 + t.minute();
    u16::try_from(minutes).map_or(0, |m| m % MINUTES_PER_DAY)
}
