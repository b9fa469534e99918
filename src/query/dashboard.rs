use crate::event::VisitEvent;
use crate::query::aggregate::{aggregate, available_pages, AggregateStats, Filters};
use crate::query::window::DateRange;
use crate::storage::visit_log::VisitLog;
use chrono::{DateTime, TimeZone};
use std::fmt::Display;

/// Analytics tab state: the event set fetched on activation and the
/// statistics for the current filter selection.
///
/// Changing a filter recomputes from the cached events; only
/// [`Dashboard::activate`] reads the log store.
#[derive(Debug, Default)]
pub struct Dashboard {
    events: Vec<VisitEvent>,
    filters: Filters,
    stats: AggregateStats,
}

impl Dashboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the full event set and recompute. A failed read is logged and
    /// leaves the dashboard empty.
    pub fn activate<Tz>(&mut self, log: &VisitLog, now: &DateTime<Tz>)
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        self.events = match log.load_all() {
            Ok(events) => {
                tracing::info!(count = events.len(), "Analytics dashboard activated");
                events
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to load visit log");
                Vec::new()
            }
        };
        self.recompute(now);
    }

    pub fn set_range<Tz>(&mut self, range: DateRange, now: &DateTime<Tz>)
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        self.filters.range = range;
        self.recompute(now);
    }

    /// `None` or `"all"` clears the page filter.
    pub fn set_page_filter<Tz>(&mut self, page: Option<&str>, now: &DateTime<Tz>)
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        self.filters = Filters::new(self.filters.range, page);
        self.recompute(now);
    }

    pub const fn stats(&self) -> &AggregateStats {
        &self.stats
    }

    pub const fn filters(&self) -> &Filters {
        &self.filters
    }

    /// Pages offered by the page-filter selector, from the unfiltered set.
    pub fn pages(&self) -> Vec<String> {
        available_pages(&self.events)
    }

    fn recompute<Tz>(&mut self, now: &DateTime<Tz>)
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        self.stats = aggregate(&self.events, &self.filters, now);
    }
}
