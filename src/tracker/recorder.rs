use crate::event::{View, VisitEvent};
use crate::ingest::session_id::session_id;
use crate::storage::visit_log::VisitLog;
use crate::tracker::click::ClickTarget;
use crate::tracker::context::TabContext;
use tokio::task::JoinHandle;

/// Views active for this long or less produce no event.
pub const NOISE_THRESHOLD_MILLIS: i64 = 1_000;

/// How an emitted event reaches the log store.
///
/// Either way delivery is at most once: a failed append is logged and
/// dropped, never retried, and never reported back to the caller.
#[derive(Debug, Clone)]
pub enum Delivery {
    /// Append on the calling thread before returning.
    Inline,
    /// Append from a blocking task on the given runtime; the caller does
    /// not wait for it.
    Background(tokio::runtime::Handle),
}

/// Tracks the active view of one tab and emits a [`VisitEvent`] whenever
/// that view is left.
pub struct Recorder<'ctx> {
    ctx: &'ctx TabContext,
    log: VisitLog,
    delivery: Delivery,
    current: View,
    started_at: i64,
    clicks: Vec<String>,
    in_flight: Vec<JoinHandle<()>>,
}

impl<'ctx> Recorder<'ctx> {
    /// Start tracking `initial`, timing it from now.
    pub fn new(ctx: &'ctx TabContext, log: VisitLog, delivery: Delivery, initial: View) -> Self {
        Self {
            started_at: ctx.now_millis(),
            ctx,
            log,
            delivery,
            current: initial,
            clicks: Vec::new(),
            in_flight: Vec::new(),
        }
    }

    pub const fn current_view(&self) -> View {
        self.current
    }

    pub fn buffered_clicks(&self) -> &[String] {
        &self.clicks
    }

    /// Buffer a label for the current view if the click hit a button or link.
    /// Returns whether anything was recorded.
    pub fn on_click(&mut self, target: &ClickTarget) -> bool {
        match target.label() {
            Some(label) => {
                tracing::trace!(view = %self.current, label = %label, "Click recorded");
                self.clicks.push(label);
                true
            }
            None => false,
        }
    }

    /// The navigation layer reports the now-current view. Leaving a view
    /// emits its event (if it lasted long enough) and restarts the timer.
    pub fn on_view_change(&mut self, next: View) -> Option<VisitEvent> {
        if next == self.current {
            return None;
        }
        let emitted = self.flush();
        self.restart(next);
        emitted
    }

    /// Best-effort flush when the tab is closing. The host may be torn down
    /// before a background append completes.
    pub fn on_unload(&mut self) -> Option<VisitEvent> {
        let emitted = self.flush();
        self.restart(self.current);
        emitted
    }

    /// Wait for background appends started so far. Failures were already
    /// logged by the task itself.
    pub async fn settle(&mut self) {
        for handle in self.in_flight.drain(..) {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Analytics delivery task panicked");
            }
        }
    }

    fn restart(&mut self, view: View) {
        self.started_at = self.ctx.now_millis();
        self.current = view;
        self.clicks.clear();
    }

    fn flush(&mut self) -> Option<VisitEvent> {
        let now = self.ctx.now_millis();
        let elapsed = now - self.started_at;
        if elapsed <= NOISE_THRESHOLD_MILLIS {
            tracing::trace!(view = %self.current, elapsed_ms = elapsed, "View below noise threshold");
            return None;
        }

        let clicks = std::mem::take(&mut self.clicks);
        let event = VisitEvent {
            page: self.current.as_str().to_string(),
            duration_secs: round_secs(elapsed),
            timestamp_millis: now,
            session_id: Some(session_id(&self.ctx.storage)),
            clicks: (!clicks.is_empty()).then_some(clicks),
        };
        self.dispatch(event.clone());
        Some(event)
    }

    fn dispatch(&mut self, event: VisitEvent) {
        match &self.delivery {
            Delivery::Inline => deliver(&self.log, &event),
            Delivery::Background(handle) => {
                self.in_flight.retain(|task| !task.is_finished());
                let log = self.log.clone();
                let task = handle.spawn_blocking(move || deliver(&log, &event));
                self.in_flight.push(task);
            }
        }
    }
}

fn deliver(log: &VisitLog, event: &VisitEvent) {
    match log.append(event) {
        Ok(key) => tracing::debug!(key = %key, page = %event.page, duration = event.duration_secs, "Visit recorded"),
        Err(e) => tracing::error!(error = %e, page = %event.page, "Analytics append failed"),
    }
}

/// Whole seconds, halves rounding up. `elapsed_millis` is positive here.
fn round_secs(elapsed_millis: i64) -> u64 {
    u64::try_from((elapsed_millis + 500) / 1_000).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::store::{LogStore, MemoryStore, StoreError};
    use crate::storage::visit_log::LOGS_PATH;
    use crate::tracker::click::Element;
    use crate::tracker::context::{Clock, ManualClock};
    use serde_json::Value;
    use std::sync::Arc;

    struct FailingStore;

    impl LogStore for FailingStore {
        fn push(&self, _path: &str, _value: &Value) -> Result<String, StoreError> {
            Err(StoreError::Encode(
                serde_json::from_str::<Value>("{").unwrap_err(),
            ))
        }

        fn get(&self, _path: &str) -> Result<Vec<(String, Value)>, StoreError> {
            Ok(Vec::new())
        }
    }

    fn setup() -> (TabContext, ManualClock, Arc<MemoryStore>) {
        let clock = ManualClock::new(1_705_312_800_000);
        let ctx = TabContext::new(Arc::new(clock.clone()));
        (ctx, clock, Arc::new(MemoryStore::new()))
    }

    fn button(text: &str) -> ClickTarget {
        ClickTarget::new(vec![Element::new("button").with_text(text)])
    }

    #[test]
    fn test_short_view_emits_nothing() {
        let (ctx, clock, store) = setup();
        let mut recorder =
            Recorder::new(&ctx, VisitLog::new(store.clone()), Delivery::Inline, View::Home);

        clock.advance_millis(1_000);
        assert!(recorder.on_view_change(View::About).is_none());
        assert!(store.is_empty());
        assert_eq!(recorder.current_view(), View::About);
    }

    #[test]
    fn test_transition_emits_previous_view() {
        let (ctx, clock, store) = setup();
        let mut recorder =
            Recorder::new(&ctx, VisitLog::new(store.clone()), Delivery::Inline, View::Home);

        clock.advance_millis(4_400);
        let event = recorder.on_view_change(View::Blog).unwrap();
        assert_eq!(event.page, "home");
        assert_eq!(event.duration_secs, 4);
        assert_eq!(event.timestamp_millis, clock.now_millis());
        assert!(event.clicks.is_none());
        assert_eq!(store.get(LOGS_PATH).unwrap().len(), 1);
    }

    #[test]
    fn test_click_then_navigate() {
        let (ctx, clock, store) = setup();
        let log = VisitLog::new(store);
        let mut recorder = Recorder::new(&ctx, log.clone(), Delivery::Inline, View::Home);

        assert!(recorder.on_click(&button("Get Started")));
        clock.advance_millis(3_000);
        recorder.on_view_change(View::Quote);

        let stored = log.load_all().unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].duration_secs, 3);
        assert_eq!(stored[0].clicks, Some(vec!["Get Started".to_string()]));
    }

    #[test]
    fn test_clicks_reset_per_view() {
        let (ctx, clock, store) = setup();
        let mut recorder =
            Recorder::new(&ctx, VisitLog::new(store), Delivery::Inline, View::Home);

        recorder.on_click(&button("Learn More"));
        // Non-interactive clicks are ignored
        assert!(!recorder.on_click(&ClickTarget::new(vec![Element::new("div")])));
        assert_eq!(recorder.buffered_clicks(), ["Learn More"]);

        clock.advance_millis(500);
        recorder.on_view_change(View::About);
        assert!(recorder.buffered_clicks().is_empty());

        clock.advance_millis(2_000);
        let event = recorder.on_view_change(View::Contact).unwrap();
        assert_eq!(event.page, "about");
        assert!(event.clicks.is_none());
    }

    #[test]
    fn test_same_view_is_not_a_transition() {
        let (ctx, clock, store) = setup();
        let mut recorder =
            Recorder::new(&ctx, VisitLog::new(store.clone()), Delivery::Inline, View::Home);

        clock.advance_millis(5_000);
        assert!(recorder.on_view_change(View::Home).is_none());
        assert!(store.is_empty());

        // Timer kept running from the original start
        let event = recorder.on_view_change(View::Ssb).unwrap();
        assert_eq!(event.duration_secs, 5);
    }

    #[test]
    fn test_unload_flushes_final_view() {
        let (ctx, clock, store) = setup();
        let mut recorder =
            Recorder::new(&ctx, VisitLog::new(store.clone()), Delivery::Inline, View::Chatbots);

        clock.advance_millis(12_600);
        let event = recorder.on_unload().unwrap();
        assert_eq!(event.page, "chatbots");
        assert_eq!(event.duration_secs, 13);

        // The timer restarted, so an immediate second unload is noise
        assert!(recorder.on_unload().is_none());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_session_id_shared_across_events() {
        let (ctx, clock, store) = setup();
        let mut recorder =
            Recorder::new(&ctx, VisitLog::new(store), Delivery::Inline, View::Home);

        clock.advance_millis(2_000);
        let a = recorder.on_view_change(View::About).unwrap();
        clock.advance_millis(2_000);
        let b = recorder.on_view_change(View::Home).unwrap();
        assert!(a.session_id.is_some());
        assert_eq!(a.session_id, b.session_id);
        assert_eq!(a.session_id, Some(session_id(&ctx.storage)));
    }

    #[test]
    fn test_store_failure_does_not_block_navigation() {
        let (ctx, clock, _) = setup();
        let log = VisitLog::new(Arc::new(FailingStore));
        let mut recorder = Recorder::new(&ctx, log, Delivery::Inline, View::Home);

        clock.advance_millis(3_000);
        assert!(recorder.on_view_change(View::About).is_some());
        assert_eq!(recorder.current_view(), View::About);
        clock.advance_millis(3_000);
        assert!(recorder.on_view_change(View::Blog).is_some());
    }

    #[test]
    fn test_round_secs_half_up() {
        assert_eq!(round_secs(1_001), 1);
        assert_eq!(round_secs(1_499), 1);
        assert_eq!(round_secs(1_500), 2);
        assert_eq!(round_secs(2_500), 3);
    }

    #[tokio::test]
    async fn test_background_delivery() {
        let (ctx, clock, store) = setup();
        let handle = tokio::runtime::Handle::current();
        let mut recorder = Recorder::new(
            &ctx,
            VisitLog::new(store.clone()),
            Delivery::Background(handle),
            View::Home,
        );

        clock.advance_millis(2_000);
        recorder.on_view_change(View::About);
        clock.advance_millis(2_000);
        recorder.on_view_change(View::Blog);
        recorder.settle().await;

        assert_eq!(store.len(), 2);
    }
}
