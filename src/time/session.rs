/// Trading-session admission control
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::error::{CollectorError, Result};
use crate::types::Config;

/// A weekday time-of-day window in the exchange's timezone.
///
/// The exchange timezone is explicit configuration; the host's local
/// timezone never enters an admission decision.
#[derive(Debug, Clone, Copy)]
pub struct SessionWindow {
    tz: Tz,
    open: NaiveTime,
    close: NaiveTime,
}

impl SessionWindow {
    pub fn new(tz: Tz, open: NaiveTime, close: NaiveTime) -> Self {
        SessionWindow { tz, open, close }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let tz = Tz::from_str(&config.exchange_timezone).map_err(|_| {
            CollectorError::ConfigError(format!(
                "Unknown exchange_timezone: {}",
                config.exchange_timezone
            ))
        })?;
        let open = crate::config::loader::parse_time_of_day(&config.session_open)?;
        let close = crate::config::loader::parse_time_of_day(&config.session_close)?;
        Ok(SessionWindow::new(tz, open, close))
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// Check whether `t` falls inside the trading session.
    ///
    /// Admits Monday-Friday with both window boundaries inclusive.
    pub fn is_admitted(&self, t: DateTime<Utc>) -> bool {
        let local = t.with_timezone(&self.tz);

        // Monday = 0 .. Sunday = 6
        if local.weekday().num_days_from_monday() >= 5 {
            return false;
        }

        let time = local.time();
        time >= self.open && time <= self.close
    }

    /// Next instant at which the session opens, for wait logging
    pub fn next_open(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let local = now.with_timezone(&self.tz);
        let mut day = local.date_naive();

        if local.time() > self.open {
            day = day + Duration::days(1);
        }

        loop {
            // Weekends roll forward to Monday
            if day.weekday().num_days_from_monday() < 5 {
                let open = day.and_time(self.open);
                if let Some(dt) = self.tz.from_local_datetime(&open).single() {
                    return dt.with_timezone(&Utc);
                }
            }
            day = day + Duration::days(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::Asia::Kolkata;

    fn nse_window() -> SessionWindow {
        SessionWindow::new(
            Kolkata,
            NaiveTime::from_hms_opt(9, 15, 0).unwrap(),
            NaiveTime::from_hms_opt(15, 30, 0).unwrap(),
        )
    }

    fn ist(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Kolkata
            .with_ymd_and_hms(y, mo, d, h, mi, s)
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_weekend_never_admitted() {
        let window = nse_window();
        // 2025-01-18 is a Saturday, 2025-01-19 a Sunday
        assert!(!window.is_admitted(ist(2025, 1, 18, 11, 0, 0)));
        assert!(!window.is_admitted(ist(2025, 1, 19, 11, 0, 0)));
        assert!(!window.is_admitted(ist(2025, 1, 18, 9, 15, 0)));
    }

    #[test]
    fn test_weekday_session_admitted() {
        let window = nse_window();
        // 2025-01-15 is a Wednesday
        assert!(window.is_admitted(ist(2025, 1, 15, 10, 30, 0)));
        assert!(window.is_admitted(ist(2025, 1, 15, 14, 59, 59)));
        assert!(!window.is_admitted(ist(2025, 1, 15, 8, 0, 0)));
        assert!(!window.is_admitted(ist(2025, 1, 15, 16, 0, 0)));
    }

    #[test]
    fn test_boundaries_inclusive() {
        let window = nse_window();
        assert!(window.is_admitted(ist(2025, 1, 15, 9, 15, 0)));
        assert!(window.is_admitted(ist(2025, 1, 15, 15, 30, 0)));
        assert!(!window.is_admitted(ist(2025, 1, 15, 9, 14, 59)));
        assert!(!window.is_admitted(ist(2025, 1, 15, 15, 30, 1)));
    }

    #[test]
    fn test_exchange_timezone_not_host() {
        let window = nse_window();
        // 04:00 UTC on a Wednesday is 09:30 IST - inside the session
        let t = Utc.with_ymd_and_hms(2025, 1, 15, 4, 0, 0).unwrap();
        assert!(window.is_admitted(t));
        // 11:00 UTC is 16:30 IST - outside
        let t = Utc.with_ymd_and_hms(2025, 1, 15, 11, 0, 0).unwrap();
        assert!(!window.is_admitted(t));
    }

    #[test]
    fn test_next_open_rolls_over_weekend() {
        let window = nse_window();
        // Friday after close
        let friday_evening = ist(2025, 1, 17, 18, 0, 0);
        let next = window.next_open(friday_evening).with_timezone(&Kolkata);
        assert_eq!(next.weekday().num_days_from_monday(), 0);
        assert_eq!(next.time(), NaiveTime::from_hms_opt(9, 15, 0).unwrap());
    }
}
