use crate::event::VisitEvent;
use crate::query::timeseries::{self, SeriesPoint};
use crate::query::window::DateRange;
use chrono::{DateTime, TimeZone};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Shown as the most-visited page when nothing matched.
pub const NO_PAGE: &str = "-";

/// Average time on one page, in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageDuration {
    pub label: String,
    pub value: f64,
}

/// Everything the analytics dashboard displays for one filter selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateStats {
    pub total_visits: u64,
    /// Rounded mean of `duration` over the matching visits.
    pub avg_time_secs: u64,
    pub popular_page: String,
    pub unique_visitors: u64,
    pub views_over_time: Vec<SeriesPoint>,
    pub time_per_page: Vec<PageDuration>,
    /// Matching visits, newest first.
    pub visitor_logs: Vec<VisitEvent>,
}

impl Default for AggregateStats {
    fn default() -> Self {
        Self {
            total_visits: 0,
            avg_time_secs: 0,
            popular_page: NO_PAGE.to_string(),
            unique_visitors: 0,
            views_over_time: Vec::new(),
            time_per_page: Vec::new(),
            visitor_logs: Vec::new(),
        }
    }
}

/// Date range plus an optional exact page match.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Filters {
    pub range: DateRange,
    pub page: Option<String>,
}

impl Filters {
    /// `page` of `None`, `""` or `"all"` disables page filtering.
    pub fn new(range: DateRange, page: Option<&str>) -> Self {
        Self {
            range,
            page: page
                .filter(|p| !p.is_empty() && *p != "all")
                .map(str::to_string),
        }
    }
}

/// Compute dashboard statistics over `events` as seen at `now`.
///
/// Windows and chart buckets use the time zone of `now`. An empty match is
/// not an error: it yields zero counts, `"-"` and empty series.
pub fn aggregate<Tz>(events: &[VisitEvent], filters: &Filters, now: &DateTime<Tz>) -> AggregateStats
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let window = filters.range.window(now);
    let matching: Vec<&VisitEvent> = events
        .iter()
        .filter(|e| window.contains(e.timestamp_millis))
        // Instants chrono cannot place get no bucket; keep counts and series in step
        .filter(|e| DateTime::from_timestamp_millis(e.timestamp_millis).is_some())
        .filter(|e| filters.page.as_deref().is_none_or(|p| e.page == p))
        .collect();

    if matching.is_empty() {
        return AggregateStats::default();
    }

    let total_visits = matching.len() as u64;
    let total_duration: u128 = matching.iter().map(|e| u128::from(e.duration_secs)).sum();
    // Round half up without going through floats; widened so no sum can overflow
    let visits = u128::from(total_visits);
    let avg_time_secs =
        u64::try_from((2 * total_duration + visits) / (2 * visits)).unwrap_or(u64::MAX);

    let unique_visitors = matching
        .iter()
        .filter_map(|e| e.session_id.as_deref())
        .filter(|s| !s.is_empty())
        .collect::<HashSet<_>>()
        .len() as u64;

    let pages = page_totals(&matching);
    let popular_page = pages
        .iter()
        .fold(None::<&PageTotal>, |best, page| match best {
            Some(b) if b.visits >= page.visits => Some(b),
            _ => Some(page),
        })
        .map_or_else(|| NO_PAGE.to_string(), |p| p.page.to_string());

    #[allow(clippy::cast_precision_loss)]
    let time_per_page = pages
        .iter()
        .map(|p| PageDuration {
            label: p.page.to_string(),
            value: p.duration as f64 / p.visits as f64,
        })
        .collect();

    let tz = now.timezone();
    let views_over_time =
        timeseries::visits_over_time(&matching, &tz, filters.range.granularity());

    let mut visitor_logs: Vec<VisitEvent> = matching.into_iter().cloned().collect();
    visitor_logs.sort_by(|a, b| b.timestamp_millis.cmp(&a.timestamp_millis));

    AggregateStats {
        total_visits,
        avg_time_secs,
        popular_page,
        unique_visitors,
        views_over_time,
        time_per_page,
        visitor_logs,
    }
}

/// Distinct pages across all events, in first-seen order.
pub fn available_pages(events: &[VisitEvent]) -> Vec<String> {
    let mut seen = HashSet::new();
    events
        .iter()
        .filter(|e| seen.insert(e.page.as_str()))
        .map(|e| e.page.clone())
        .collect()
}

struct PageTotal<'a> {
    page: &'a str,
    visits: u64,
    duration: u128,
}

/// Per-page visit and duration totals, pages in first-seen order.
fn page_totals<'a>(events: &[&'a VisitEvent]) -> Vec<PageTotal<'a>> {
    let mut totals: Vec<PageTotal<'a>> = Vec::new();
    let mut index: HashMap<&'a str, usize> = HashMap::new();
    for &event in events {
        let i = *index.entry(event.page.as_str()).or_insert_with(|| {
            totals.push(PageTotal {
                page: event.page.as_str(),
                visits: 0,
                duration: 0,
            });
            totals.len() - 1
        });
        totals[i].visits += 1;
        totals[i].duration += u128::from(event.duration_secs);
    }
    totals
}
