use crate::event::VisitEvent;
use chrono::{DateTime, TimeZone};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A labelled point of the visits-over-time chart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub label: String,
    pub value: u64,
}

/// Time granularity for bucketing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Hour,
    Day,
}

impl Granularity {
    /// Hour buckets drop the minutes, so every label ends in `:00`.
    const fn format_str(self) -> &'static str {
        match self {
            Self::Hour => "%H:00",
            Self::Day => "%b %-d",
        }
    }
}

/// Bucket label of an epoch-millisecond timestamp in the zone `tz`.
pub fn bucket_label<Tz>(timestamp_millis: i64, tz: &Tz, granularity: Granularity) -> Option<String>
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    DateTime::from_timestamp_millis(timestamp_millis).map(|utc| {
        utc.with_timezone(tz)
            .format(granularity.format_str())
            .to_string()
    })
}

/// Visit counts per bucket, buckets in the order first reached when walking
/// the events oldest to newest.
pub fn visits_over_time<Tz>(
    events: &[&VisitEvent],
    tz: &Tz,
    granularity: Granularity,
) -> Vec<SeriesPoint>
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let mut ordered: Vec<&VisitEvent> = events.to_vec();
    ordered.sort_by_key(|e| e.timestamp_millis);

    let mut series: Vec<SeriesPoint> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for event in ordered {
        let Some(label) = bucket_label(event.timestamp_millis, tz, granularity) else {
            continue;
        };
        if let Some(&i) = index.get(&label) {
            series[i].value += 1;
        } else {
            index.insert(label.clone(), series.len());
            series.push(SeriesPoint { label, value: 1 });
        }
    }
    series
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Utc};

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> VisitEvent {
        VisitEvent {
            page: "home".to_string(),
            duration_secs: 5,
            timestamp_millis: Utc
                .with_ymd_and_hms(y, m, d, h, min, 0)
                .unwrap()
                .timestamp_millis(),
            session_id: None,
            clicks: None,
        }
    }

    #[test]
    fn test_hourly_buckets_truncate_minutes() {
        let events = [
            at(2024, 1, 15, 10, 0),
            at(2024, 1, 15, 10, 30),
            at(2024, 1, 15, 14, 59),
        ];
        let refs: Vec<_> = events.iter().collect();
        let series = visits_over_time(&refs, &Utc, Granularity::Hour);

        assert_eq!(
            series,
            vec![
                SeriesPoint { label: "10:00".to_string(), value: 2 },
                SeriesPoint { label: "14:00".to_string(), value: 1 },
            ]
        );
    }

    #[test]
    fn test_daily_buckets() {
        let events = [
            at(2024, 1, 16, 10, 0),
            at(2024, 1, 15, 10, 0),
            at(2024, 1, 15, 14, 0),
        ];
        let refs: Vec<_> = events.iter().collect();
        let series = visits_over_time(&refs, &Utc, Granularity::Day);

        // Sorted by time before bucketing, regardless of input order
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].label, "Jan 15");
        assert_eq!(series[0].value, 2);
        assert_eq!(series[1].label, "Jan 16");
        assert_eq!(series[1].value, 1);
    }

    #[test]
    fn test_bucket_label_in_viewer_zone() {
        let ts = Utc
            .with_ymd_and_hms(2024, 1, 15, 23, 30, 0)
            .unwrap()
            .timestamp_millis();
        let tz = FixedOffset::east_opt(2 * 3600).unwrap();
        assert_eq!(bucket_label(ts, &tz, Granularity::Hour).unwrap(), "01:00");
        assert_eq!(bucket_label(ts, &tz, Granularity::Day).unwrap(), "Jan 16");
    }

    #[test]
    fn test_hours_of_different_days_share_label() {
        let events = [at(2024, 1, 14, 9, 10), at(2024, 1, 15, 9, 50)];
        let refs: Vec<_> = events.iter().collect();
        let series = visits_over_time(&refs, &Utc, Granularity::Hour);
        assert_eq!(series, vec![SeriesPoint { label: "09:00".to_string(), value: 2 }]);
    }

    #[test]
    fn test_empty_timeseries() {
        assert!(visits_over_time(&[], &Utc, Granularity::Day).is_empty());
    }
}
