//! FX holiday closure windows — deterministic, offline, per year.
//!
//! The market-wide closures worth modeling for FX are few: New Year's Day,
//! Good Friday, Christmas, and (under the extended policy) Boxing Day and
//! Easter Monday. Dates are computed, not fetched; Good Friday derives from
//! the Gregorian Easter computus. Explicit extra closure ranges can be
//! appended from configuration.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::window::UtcWindow;

/// Named closures the policy can include.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Holiday {
    NewYear,
    GoodFriday,
    EasterMonday,
    Christmas,
    BoxingDay,
}

/// Which closures apply. The minimal set is New Year, Good Friday and
/// Christmas; `extended` adds Boxing Day and Easter Monday.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HolidayPolicy {
    pub extended: bool,
    /// Extra one-off closures as explicit UTC ranges, e.g. an ad hoc
    /// market-wide halt. Appended verbatim.
    #[serde(default)]
    pub extra_closures: Vec<UtcWindow>,
}

impl Default for HolidayPolicy {
    fn default() -> Self {
        Self {
            extended: false,
            extra_closures: Vec::new(),
        }
    }
}

impl HolidayPolicy {
    fn included(&self) -> Vec<Holiday> {
        let mut set = vec![Holiday::NewYear, Holiday::GoodFriday, Holiday::Christmas];
        if self.extended {
            set.push(Holiday::EasterMonday);
            set.push(Holiday::BoxingDay);
        }
        set
    }
}

/// Gregorian Easter Sunday (anonymous Meeus/Jones/Butcher algorithm).
pub fn easter_sunday(year: i32) -> NaiveDate {
    let a = year % 19;
    let b = year / 100;
    let c = year % 100;
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15) % 30;
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k) % 7;
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = (h + l - 7 * m + 114) % 31 + 1;
    NaiveDate::from_ymd_opt(year, month as u32, day as u32)
        .expect("computus always yields a valid March/April date")
}

fn full_day_utc(date: NaiveDate) -> UtcWindow {
    let start = date
        .and_hms_opt(0, 0, 0)
        .expect("midnight is always valid")
        .and_utc();
    UtcWindow {
        start,
        end: start + Duration::days(1),
    }
}

fn holiday_date(year: i32, holiday: Holiday) -> NaiveDate {
    match holiday {
        Holiday::NewYear => NaiveDate::from_ymd_opt(year, 1, 1),
        Holiday::GoodFriday => Some(easter_sunday(year) - Duration::days(2)),
        Holiday::EasterMonday => Some(easter_sunday(year) + Duration::days(1)),
        Holiday::Christmas => NaiveDate::from_ymd_opt(year, 12, 25),
        Holiday::BoxingDay => NaiveDate::from_ymd_opt(year, 12, 26),
    }
    .expect("fixed-date holidays are valid in every year")
}

/// Full-day UTC closure windows for `year` under `policy`, ascending and
/// including any configured extra closures.
pub fn holiday_windows(year: i32, policy: &HolidayPolicy) -> Vec<UtcWindow> {
    let mut wins: Vec<UtcWindow> = policy
        .included()
        .into_iter()
        .map(|h| full_day_utc(holiday_date(year, h)))
        .collect();
    wins.extend(policy.extra_closures.iter().copied());
    wins.sort_by_key(|w| w.start);
    wins
}
