//! Pull-based view refresh.
//!
//! A view holds the last snapshot it loaded and goes back through `Loading`
//! whenever it is mounted, pulled to refresh, or has just written something
//! itself. Nothing refreshes it behind its back. A mutation and the reload
//! that follows are separate store calls; use
//! [`Conversations::send_and_reload`](crate::Conversations::send_and_reload)
//! when the two must be atomic.

use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{debug, warn};

use chirp_types::events::StoreEvent;

use crate::error::{Result, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshTrigger {
    Mount,
    PullToRefresh,
    /// The same viewer just sent, posted or updated something.
    LocalMutation,
    /// A subscribed change notification matched this view.
    ChangeNotification,
}

#[derive(Debug)]
pub enum ViewState<T> {
    Idle,
    Loading,
    Loaded(T),
    /// The last load failed. It is not retried until the next trigger.
    Failed(StoreError),
}

/// A view's snapshot plus the loader that re-reads it.
pub struct View<T, F>
where
    F: FnMut() -> Result<T>,
{
    state: ViewState<T>,
    loader: F,
    loads: u64,
    last_trigger: Option<RefreshTrigger>,
}

impl<T, F> View<T, F>
where
    F: FnMut() -> Result<T>,
{
    pub fn new(loader: F) -> Self {
        Self {
            state: ViewState::Idle,
            loader,
            loads: 0,
            last_trigger: None,
        }
    }

    pub fn state(&self) -> &ViewState<T> {
        &self.state
    }

    /// The loaded snapshot, if the last load succeeded.
    pub fn data(&self) -> Option<&T> {
        match &self.state {
            ViewState::Loaded(data) => Some(data),
            _ => None,
        }
    }

    /// Number of loads started so far.
    pub fn loads(&self) -> u64 {
        self.loads
    }

    pub fn last_trigger(&self) -> Option<RefreshTrigger> {
        self.last_trigger
    }

    /// Enter `Loading`. The previous snapshot is dropped.
    pub fn begin(&mut self, trigger: RefreshTrigger) {
        debug!(?trigger, "View loading");
        self.state = ViewState::Loading;
        self.loads += 1;
        self.last_trigger = Some(trigger);
    }

    /// Leave `Loading` with the loader's result.
    pub fn complete(&mut self, result: Result<T>) -> &ViewState<T> {
        self.state = match result {
            Ok(data) => ViewState::Loaded(data),
            Err(e) => {
                warn!("View load failed: {}", e);
                ViewState::Failed(e)
            }
        };
        &self.state
    }

    /// Full re-read: `begin`, run the loader, `complete`.
    pub fn refresh(&mut self, trigger: RefreshTrigger) -> &ViewState<T> {
        self.begin(trigger);
        let result = (self.loader)();
        self.complete(result)
    }

    /// Pass a mutation's result through, reloading only if it succeeded.
    pub fn after_mutation<R>(&mut self, result: Result<R>) -> Result<R> {
        if result.is_ok() {
            self.refresh(RefreshTrigger::LocalMutation);
        }
        result
    }

    /// Drain pending notifications and reload once if any matched. A lagged
    /// receiver missed events, so it always reloads. Returns whether it did.
    pub fn refresh_on_events(
        &mut self,
        events: &mut broadcast::Receiver<StoreEvent>,
        matches: impl Fn(&StoreEvent) -> bool,
    ) -> bool {
        let mut stale = false;
        loop {
            match events.try_recv() {
                Ok(event) => stale |= matches(&event),
                Err(TryRecvError::Lagged(skipped)) => {
                    debug!(skipped, "Change notifications lagged");
                    stale = true;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }

        if stale {
            self.refresh(RefreshTrigger::ChangeNotification);
        }
        stale
    }
}
