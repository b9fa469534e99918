use crate::query::timeseries::Granularity;
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const DAY_MILLIS: i64 = 86_400_000;

/// Date-range selector of the analytics dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateRange {
    Today,
    Yesterday,
    /// Rolling seven days before today's midnight, plus today.
    #[default]
    Week,
    /// Current calendar month.
    Month,
    /// Current calendar year.
    Year,
}

/// Half-open interval of epoch milliseconds, `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start_millis: i64,
    pub end_millis: Option<i64>,
}

impl Window {
    pub fn contains(&self, timestamp_millis: i64) -> bool {
        timestamp_millis >= self.start_millis
            && self.end_millis.is_none_or(|end| timestamp_millis < end)
    }
}

impl DateRange {
    pub const ALL: [Self; 5] = [
        Self::Today,
        Self::Yesterday,
        Self::Week,
        Self::Month,
        Self::Year,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Today => "today",
            Self::Yesterday => "yesterday",
            Self::Week => "week",
            Self::Month => "month",
            Self::Year => "year",
        }
    }

    /// Single-day ranges chart by hour, longer ones by date.
    pub const fn granularity(self) -> Granularity {
        match self {
            Self::Today | Self::Yesterday => Granularity::Hour,
            Self::Week | Self::Month | Self::Year => Granularity::Day,
        }
    }

    /// Window for this range, measured from local midnights in the zone of `now`.
    pub fn window<Tz: TimeZone>(self, now: &DateTime<Tz>) -> Window {
        let tz = now.timezone();
        let today = now.date_naive();
        let today_start = local_midnight(&tz, today);

        match self {
            Self::Today => Window {
                start_millis: today_start,
                end_millis: None,
            },
            Self::Yesterday => {
                let start = today
                    .pred_opt()
                    .map_or(today_start - DAY_MILLIS, |d| local_midnight(&tz, d));
                Window {
                    start_millis: start,
                    end_millis: Some(today_start),
                }
            }
            Self::Week => Window {
                start_millis: today_start - 7 * DAY_MILLIS,
                end_millis: None,
            },
            Self::Month => Window {
                start_millis: today
                    .with_day(1)
                    .map_or(today_start, |d| local_midnight(&tz, d)),
                end_millis: None,
            },
            Self::Year => Window {
                start_millis: NaiveDate::from_ymd_opt(today.year(), 1, 1)
                    .map_or(today_start, |d| local_midnight(&tz, d)),
                end_millis: None,
            },
        }
    }
}

/// Epoch milliseconds of the first instant of `date` in `tz`.
///
/// Where a DST transition skips midnight, the first valid local time after
/// it is used.
fn local_midnight<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> i64 {
    let midnight = date.and_time(NaiveTime::MIN);
    (0..=16)
        .find_map(|quarter| {
            tz.from_local_datetime(&(midnight + Duration::minutes(15 * quarter)))
                .earliest()
        })
        .map_or_else(
            || midnight.and_utc().timestamp_millis(),
            |dt| dt.timestamp_millis(),
        )
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DateRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| {
                format!("Invalid range: {s}. Use 'today', 'yesterday', 'week', 'month', or 'year'.")
            })
    }
}
