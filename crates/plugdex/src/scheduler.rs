//! Debounced/throttled dispatch of listing requests.
//!
//! Each request class (search-triggered vs page-triggered) carries its own
//! policy, its own timer, and at most one in-flight request. Issuing a new
//! request cancels the previous one of the same class and drops its channel,
//! so a late completion has nowhere to land. The scheduler is driven by
//! `tick` from the event loop; timers are plain `Instant` fields armed on
//! schedule and disarmed on dispatch.

use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use plugdex_protocol::{PluginsPage, Query, TransportError};
use tracing::debug;

use crate::transport::{CancelToken, CatalogTransport};

/// Quiet period before a changed search text goes to the wire.
pub const SEARCH_DEBOUNCE: Duration = Duration::from_millis(300);
/// Minimum spacing between page-change requests.
pub const PAGE_THROTTLE: Duration = Duration::from_millis(500);

/// Independent request streams, debounced/throttled separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestClass {
    Search,
    Page,
}

/// Per-class dispatch policy.
#[derive(Debug, Clone, Copy)]
pub enum DispatchPolicy {
    /// Dispatch only after no new schedule call for the quiet period
    /// (trailing edge). Intermediate keystrokes never reach the wire.
    Debounce(Duration),
    /// Dispatch at most once per interval; a burst coalesces into the
    /// latest pending query which goes out when the interval expires
    /// (leading + trailing edges).
    Throttle(Duration),
}

/// A finished listing request, tagged with its originating query so the
/// caller can apply the discard-if-superseded rule.
#[derive(Debug)]
pub struct FetchCompletion {
    pub class: RequestClass,
    pub query: Query,
    pub seq: u64,
    pub result: Result<PluginsPage, TransportError>,
}

struct InFlight {
    query: Query,
    seq: u64,
    cancel: CancelToken,
    rx: mpsc::Receiver<Result<PluginsPage, TransportError>>,
}

struct ClassState {
    policy: DispatchPolicy,
    /// Latest scheduled query not yet dispatched.
    pending: Option<Query>,
    /// When `pending` last changed. Armed on schedule, disarmed on dispatch.
    changed_at: Option<Instant>,
    last_dispatch: Option<Instant>,
    in_flight: Option<InFlight>,
}

impl ClassState {
    fn new(policy: DispatchPolicy) -> Self {
        Self {
            policy,
            pending: None,
            changed_at: None,
            last_dispatch: None,
            in_flight: None,
        }
    }

    fn due(&self, now: Instant) -> bool {
        if self.pending.is_none() {
            return false;
        }
        match self.policy {
            DispatchPolicy::Debounce(quiet) => self
                .changed_at
                .is_some_and(|at| now.duration_since(at) >= quiet),
            DispatchPolicy::Throttle(interval) => self
                .last_dispatch
                .map_or(true, |at| now.duration_since(at) >= interval),
        }
    }
}

/// Schedules listing fetches against the transport with per-class
/// debounce/throttle and in-flight cancellation.
pub struct RequestScheduler {
    transport: Arc<dyn CatalogTransport>,
    search: ClassState,
    page: ClassState,
    next_seq: u64,
}

impl RequestScheduler {
    pub fn new(transport: Arc<dyn CatalogTransport>) -> Self {
        Self::with_policies(
            transport,
            DispatchPolicy::Debounce(SEARCH_DEBOUNCE),
            DispatchPolicy::Throttle(PAGE_THROTTLE),
        )
    }

    pub fn with_policies(
        transport: Arc<dyn CatalogTransport>,
        search: DispatchPolicy,
        page: DispatchPolicy,
    ) -> Self {
        Self {
            transport,
            search: ClassState::new(search),
            page: ClassState::new(page),
            next_seq: 0,
        }
    }

    fn class_mut(&mut self, class: RequestClass) -> &mut ClassState {
        match class {
            RequestClass::Search => &mut self.search,
            RequestClass::Page => &mut self.page,
        }
    }

    /// Record a new query for the class. Under throttle this may dispatch
    /// immediately (leading edge); under debounce dispatch always waits for
    /// the quiet period, via `tick`.
    pub fn schedule(&mut self, class: RequestClass, query: Query, now: Instant) {
        let state = self.class_mut(class);
        state.pending = Some(query);
        state.changed_at = Some(now);
        if let DispatchPolicy::Throttle(_) = state.policy {
            if state.due(now) {
                self.dispatch(class, now);
            }
        }
    }

    /// Dispatch immediately, bypassing the class policy. Used for the
    /// initial load and explicit refresh.
    pub fn force(&mut self, class: RequestClass, query: Query, now: Instant) {
        let state = self.class_mut(class);
        state.pending = Some(query);
        state.changed_at = Some(now);
        self.dispatch(class, now);
    }

    /// Advance timers and collect completed requests. Called once per event
    /// loop turn.
    pub fn tick(&mut self, now: Instant) -> Vec<FetchCompletion> {
        for class in [RequestClass::Search, RequestClass::Page] {
            if self.class_mut(class).due(now) {
                self.dispatch(class, now);
            }
        }

        let mut completions = Vec::new();
        for class in [RequestClass::Search, RequestClass::Page] {
            let state = self.class_mut(class);
            let Some(in_flight) = state.in_flight.take() else {
                continue;
            };
            match in_flight.rx.try_recv() {
                Ok(result) => {
                    completions.push(FetchCompletion {
                        class,
                        query: in_flight.query,
                        seq: in_flight.seq,
                        result,
                    });
                }
                Err(mpsc::TryRecvError::Empty) => {
                    state.in_flight = Some(in_flight);
                }
                // Worker observed cancellation and hung up without sending.
                Err(mpsc::TryRecvError::Disconnected) => {}
            }
        }
        completions
    }

    /// True while a request of the class is on the wire.
    pub fn has_in_flight(&self, class: RequestClass) -> bool {
        match class {
            RequestClass::Search => self.search.in_flight.is_some(),
            RequestClass::Page => self.page.in_flight.is_some(),
        }
    }

    /// Cancel everything on teardown.
    pub fn cancel_all(&mut self) {
        for class in [RequestClass::Search, RequestClass::Page] {
            let state = self.class_mut(class);
            if let Some(in_flight) = state.in_flight.take() {
                in_flight.cancel.cancel();
            }
            state.pending = None;
            state.changed_at = None;
        }
    }

    fn dispatch(&mut self, class: RequestClass, now: Instant) {
        self.next_seq += 1;
        let seq = self.next_seq;
        let transport = Arc::clone(&self.transport);
        let state = self.class_mut(class);
        let Some(query) = state.pending.take() else {
            return;
        };
        state.changed_at = None;
        state.last_dispatch = Some(now);

        // Supersede: cancel whatever is still on the wire for this class.
        if let Some(previous) = state.in_flight.take() {
            debug!(?class, superseded = previous.seq, by = seq, "cancelling in-flight request");
            previous.cancel.cancel();
        }

        let cancel = CancelToken::new();
        let (tx, rx) = mpsc::sync_channel(1);
        let worker_query = query.clone();
        let worker_cancel = cancel.clone();
        thread::spawn(move || {
            let result = transport.fetch_plugins(&worker_query, &worker_cancel);
            if !worker_cancel.is_cancelled() {
                // Receiver may already be gone; a failed send is the
                // supersede path doing its job.
                let _ = tx.send(result);
            }
        });

        state.in_flight = Some(InFlight {
            query,
            seq,
            cancel,
            rx,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::testing::ScriptedTransport;

    fn wait_for<F: FnMut() -> bool>(mut condition: F) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while !condition() {
            assert!(Instant::now() < deadline, "timed out waiting for condition");
            thread::sleep(Duration::from_millis(5));
        }
    }

    fn drain(
        scheduler: &mut RequestScheduler,
        now: Instant,
        want: usize,
    ) -> Vec<FetchCompletion> {
        let mut out = Vec::new();
        let deadline = Instant::now() + Duration::from_secs(2);
        while out.len() < want {
            out.extend(scheduler.tick(now));
            if out.len() >= want {
                break;
            }
            assert!(Instant::now() < deadline, "timed out draining completions");
            thread::sleep(Duration::from_millis(5));
        }
        out
    }

    #[test]
    fn debounce_issues_one_call_with_last_text() {
        let transport = Arc::new(ScriptedTransport::new());
        let mut scheduler = RequestScheduler::new(Arc::clone(&transport) as Arc<dyn CatalogTransport>);
        let t0 = Instant::now();

        scheduler.schedule(RequestClass::Search, Query::with_text("g"), t0);
        scheduler.schedule(
            RequestClass::Search,
            Query::with_text("gi"),
            t0 + Duration::from_millis(50),
        );
        scheduler.schedule(
            RequestClass::Search,
            Query::with_text("git"),
            t0 + Duration::from_millis(100),
        );

        // Still inside the quiet window: nothing goes out.
        scheduler.tick(t0 + Duration::from_millis(200));
        assert!(transport.listing_calls().is_empty());

        scheduler.tick(t0 + Duration::from_millis(401));
        wait_for(|| transport.listing_calls().len() == 1);
        assert_eq!(transport.listing_calls()[0].text, "git");

        let completions = drain(&mut scheduler, t0 + Duration::from_millis(401), 1);
        assert_eq!(completions[0].query.text, "git");
        assert_eq!(transport.listing_calls().len(), 1);
    }

    #[test]
    fn throttle_dispatches_leading_and_coalesces_trailing() {
        let transport = Arc::new(ScriptedTransport::new());
        let mut scheduler = RequestScheduler::new(Arc::clone(&transport) as Arc<dyn CatalogTransport>);
        let t0 = Instant::now();

        scheduler.schedule(RequestClass::Page, Query::new("", 2), t0);
        wait_for(|| transport.listing_calls().len() == 1);

        // Burst inside the interval: coalesced into the latest page.
        scheduler.schedule(
            RequestClass::Page,
            Query::new("", 3),
            t0 + Duration::from_millis(50),
        );
        scheduler.schedule(
            RequestClass::Page,
            Query::new("", 4),
            t0 + Duration::from_millis(100),
        );
        scheduler.tick(t0 + Duration::from_millis(200));
        assert_eq!(transport.listing_calls().len(), 1);

        scheduler.tick(t0 + Duration::from_millis(501));
        wait_for(|| transport.listing_calls().len() == 2);
        let pages: Vec<u32> = transport.listing_calls().iter().map(|q| q.page).collect();
        assert_eq!(pages, vec![2, 4]);
    }

    #[test]
    fn superseding_request_drops_previous_completion() {
        let transport = Arc::new(ScriptedTransport::new());
        let mut scheduler = RequestScheduler::new(Arc::clone(&transport) as Arc<dyn CatalogTransport>);
        let t0 = Instant::now();

        scheduler.schedule(RequestClass::Search, Query::with_text("one"), t0);
        scheduler.tick(t0 + Duration::from_millis(301));
        wait_for(|| transport.listing_calls().len() == 1);

        // Supersede before draining the first completion.
        let t1 = t0 + Duration::from_millis(400);
        scheduler.schedule(RequestClass::Search, Query::with_text("two"), t1);
        scheduler.tick(t1 + Duration::from_millis(301));
        wait_for(|| transport.listing_calls().len() == 2);

        let completions = drain(&mut scheduler, t1 + Duration::from_millis(302), 1);
        assert_eq!(completions.len(), 1);
        assert_eq!(completions[0].query.text, "two");
        assert!(!scheduler.has_in_flight(RequestClass::Search));
    }

    #[test]
    fn classes_are_independent() {
        let transport = Arc::new(ScriptedTransport::new());
        let mut scheduler = RequestScheduler::new(Arc::clone(&transport) as Arc<dyn CatalogTransport>);
        let t0 = Instant::now();

        scheduler.schedule(RequestClass::Page, Query::new("git", 2), t0);
        scheduler.schedule(RequestClass::Search, Query::with_text("git"), t0);
        scheduler.tick(t0 + Duration::from_millis(301));
        wait_for(|| transport.listing_calls().len() == 2);

        let completions = drain(&mut scheduler, t0 + Duration::from_millis(302), 2);
        assert_eq!(completions.len(), 2);
    }
}
