//! Stateless checks the order handler runs before touching a draft.

use chrono::{DateTime, Datelike, Duration, Timelike, Utc, Weekday};
use chrono_tz::Tz;
use thiserror::Error;

use crate::domain::tenant::{BusinessHours, Tenant};

const MINUTES_PER_DAY: u32 = 24 * 60;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StockCheck {
    Available,
    OutOfStock,
    Insufficient { available: u32 },
}

impl StockCheck {
    pub fn is_available(self) -> bool {
        matches!(self, Self::Available)
    }
}

/// Compares the units a draft would hold after a change against the stock on hand.
pub fn check_stock(available: i64, requested: u32) -> StockCheck {
    if available <= 0 {
        return StockCheck::OutOfStock;
    }
    if i64::from(requested) > available {
        return StockCheck::Insufficient { available: available.min(i64::from(u32::MAX)) as u32 };
    }
    StockCheck::Available
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum HoursError {
    #[error("invalid opening window `{0}` (expected HH:MM-HH:MM)")]
    InvalidWindow(String),
}

/// Opening window in minutes since local midnight. `end` may be `1440` (midnight) or
/// smaller than `start`, in which case the window runs into the next day.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Window {
    pub start: u32,
    pub end: u32,
}

impl Window {
    pub fn crosses_midnight(self) -> bool {
        self.end < self.start
    }

    fn contains_same_day(self, minute: u32) -> bool {
        if self.crosses_midnight() {
            minute >= self.start
        } else {
            minute >= self.start && minute < self.end
        }
    }

    fn contains_spillover(self, minute: u32) -> bool {
        self.crosses_midnight() && minute < self.end
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OpenStatus {
    Open,
    Closed { day: Weekday, hours_today: String },
}

impl OpenStatus {
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }
}

pub fn weekday_key(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "monday",
        Weekday::Tue => "tuesday",
        Weekday::Wed => "wednesday",
        Weekday::Thu => "thursday",
        Weekday::Fri => "friday",
        Weekday::Sat => "saturday",
        Weekday::Sun => "sunday",
    }
}

/// Parses a day entry: `closed` or comma-separated `HH:MM-HH:MM` windows.
pub fn parse_day(spec: &str) -> Result<Vec<Window>, HoursError> {
    let trimmed = spec.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("closed") {
        return Ok(Vec::new());
    }

    trimmed
        .split(',')
        .map(|window| {
            let window = window.trim();
            let (start, end) = window
                .split_once('-')
                .ok_or_else(|| HoursError::InvalidWindow(window.to_owned()))?;
            let start = parse_minute(start)
                .ok_or_else(|| HoursError::InvalidWindow(window.to_owned()))?;
            let end =
                parse_minute(end).ok_or_else(|| HoursError::InvalidWindow(window.to_owned()))?;
            let end = if end == 0 { MINUTES_PER_DAY } else { end };
            Ok(Window { start, end })
        })
        .collect()
}

fn parse_minute(value: &str) -> Option<u32> {
    let (hours, minutes) = value.trim().split_once(':')?;
    let hours: u32 = hours.parse().ok()?;
    let minutes: u32 = minutes.parse().ok()?;
    (hours < 24 && minutes < 60).then_some(hours * 60 + minutes)
}

/// Evaluates `hours` at `now` in the tenant's local time. Unconfigured hours are always open;
/// a configured week with no entry for a day treats that day as closed.
pub fn open_status(hours: &BusinessHours, timezone: &str, now: DateTime<Utc>) -> OpenStatus {
    if !hours.is_configured() {
        return OpenStatus::Open;
    }

    let tz = timezone.parse::<Tz>().unwrap_or_else(|_| {
        tracing::warn!(
            event_name = "gate.unknown_timezone",
            timezone,
            "unknown tenant timezone, evaluating hours in UTC"
        );
        Tz::UTC
    });
    let local = now.with_timezone(&tz);
    let minute = local.hour() * 60 + local.minute();
    let today = local.weekday();
    let yesterday = (local - Duration::days(1)).weekday();

    let today_spec = hours.for_day(weekday_key(today)).unwrap_or("closed");
    let open_today =
        windows_or_warn(today_spec).iter().any(|window| window.contains_same_day(minute));
    let open_from_yesterday = hours
        .for_day(weekday_key(yesterday))
        .map(|spec| windows_or_warn(spec).iter().any(|window| window.contains_spillover(minute)))
        .unwrap_or(false);

    if open_today || open_from_yesterday {
        OpenStatus::Open
    } else {
        OpenStatus::Closed { day: today, hours_today: today_spec.to_owned() }
    }
}

pub fn tenant_open_status(tenant: &Tenant, now: DateTime<Utc>) -> OpenStatus {
    open_status(&tenant.business_hours, &tenant.timezone, now)
}

fn windows_or_warn(spec: &str) -> Vec<Window> {
    parse_day(spec).unwrap_or_else(|error| {
        tracing::warn!(event_name = "gate.invalid_hours", error = %error, "ignoring opening hours");
        Vec::new()
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::{TimeZone, Utc, Weekday};

    use super::{check_stock, open_status, parse_day, OpenStatus, StockCheck, Window};
    use crate::domain::tenant::BusinessHours;

    fn hours(entries: &[(&str, &str)]) -> BusinessHours {
        BusinessHours(
            entries
                .iter()
                .map(|(day, spec)| ((*day).to_owned(), (*spec).to_owned()))
                .collect::<BTreeMap<_, _>>(),
        )
    }

    #[test]
    fn stock_outcomes() {
        assert_eq!(check_stock(0, 1), StockCheck::OutOfStock);
        assert_eq!(check_stock(-2, 1), StockCheck::OutOfStock);
        assert_eq!(check_stock(3, 5), StockCheck::Insufficient { available: 3 });
        assert_eq!(check_stock(5, 5), StockCheck::Available);
        assert!(check_stock(10, 1).is_available());
    }

    #[test]
    fn parses_split_shifts_and_midnight() {
        assert_eq!(
            parse_day("12:00-16:00, 19:00-00:00").expect("valid"),
            vec![Window { start: 720, end: 960 }, Window { start: 1140, end: 1440 }]
        );
        assert!(parse_day("closed").expect("closed").is_empty());
        assert!(parse_day("noon-late").is_err());
        assert!(parse_day("25:00-26:00").is_err());
    }

    #[test]
    fn unconfigured_hours_are_always_open() {
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 4, 0, 0).single().expect("valid time");
        let status = open_status(&BusinessHours::default(), "America/Santiago", now);
        assert_eq!(status, OpenStatus::Open);
    }

    #[test]
    fn evaluates_in_tenant_timezone() {
        // 2026-03-02 is a Monday; Santiago is UTC-3 in March.
        let week = hours(&[("monday", "12:00-23:00")]);
        let lunch = Utc.with_ymd_and_hms(2026, 3, 2, 16, 0, 0).single().expect("valid time");
        let early = Utc.with_ymd_and_hms(2026, 3, 2, 13, 0, 0).single().expect("valid time");

        assert!(open_status(&week, "America/Santiago", lunch).is_open());
        assert_eq!(
            open_status(&week, "America/Santiago", early),
            OpenStatus::Closed { day: Weekday::Mon, hours_today: "12:00-23:00".to_owned() }
        );
    }

    #[test]
    fn midnight_end_covers_late_evening() {
        let week = hours(&[("friday", "12:00-00:00")]);
        let late = Utc.with_ymd_and_hms(2026, 3, 6, 23, 45, 0).single().expect("valid time");
        assert!(open_status(&week, "UTC", late).is_open());
    }

    #[test]
    fn overnight_window_spills_into_next_day() {
        let week = hours(&[("friday", "20:00-02:00"), ("saturday", "closed")]);
        let after_midnight =
            Utc.with_ymd_and_hms(2026, 3, 7, 1, 30, 0).single().expect("valid time");
        let morning = Utc.with_ymd_and_hms(2026, 3, 7, 9, 0, 0).single().expect("valid time");

        assert!(open_status(&week, "UTC", after_midnight).is_open());
        assert!(!open_status(&week, "UTC", morning).is_open());
    }

    #[test]
    fn missing_day_in_configured_week_is_closed() {
        let week = hours(&[("tuesday", "18:00-23:00")]);
        let monday = Utc.with_ymd_and_hms(2026, 3, 2, 20, 0, 0).single().expect("valid time");
        assert!(matches!(
            open_status(&week, "UTC", monday),
            OpenStatus::Closed { ref hours_today, .. } if hours_today == "closed"
        ));
    }
}
