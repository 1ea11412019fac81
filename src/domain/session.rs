//! Trading-hours window in the exchange's local time.

use chrono::{DateTime, Datelike, NaiveTime, Utc, Weekday};
use chrono_tz::Tz;

pub const DEFAULT_TIMEZONE: Tz = chrono_tz::US::Eastern;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TradingHours {
    pub timezone: Tz,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl Default for TradingHours {
    /// 08:00 to 18:00 US/Eastern.
    fn default() -> Self {
        TradingHours {
            timezone: DEFAULT_TIMEZONE,
            start: NaiveTime::from_hms_opt(8, 0, 0).unwrap_or(NaiveTime::MIN),
            end: NaiveTime::from_hms_opt(18, 0, 0).unwrap_or(NaiveTime::MIN),
        }
    }
}

impl TradingHours {
    pub fn local_time(&self, at: DateTime<Utc>) -> NaiveTime {
        at.with_timezone(&self.timezone).time()
    }

    /// Backtest filter: `start <= t < end`, any day of the week.
    pub fn contains_bar(&self, at: DateTime<Utc>) -> bool {
        let t = self.local_time(at);
        self.start <= t && t < self.end
    }

    /// Live gate: a weekday and `start <= t <= end`.
    pub fn is_open(&self, at: DateTime<Utc>) -> bool {
        let local = at.with_timezone(&self.timezone);
        let t = local.time();
        let weekday = !matches!(local.weekday(), Weekday::Sat | Weekday::Sun);
        weekday && self.start <= t && t <= self.end
    }
}
