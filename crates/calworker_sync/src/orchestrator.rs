//! The sync orchestrator.

use crate::counter::PendingCounter;
use crate::error::{SyncResult, SyncUnit, SyncUnitError};
use crate::traits::{AlwaysOnline, Connectivity, ErrorSink, LogErrorSink, SyncAdapter, SyncSource};
use calworker_bridge::{Broadcaster, Subscription};
use calworker_protocol::{Account, Calendar, SyncEvent, Value};
use futures::future::join_all;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Receives the outcome of one sync unit instead of the error sink.
pub type SyncCallback = Box<dyn FnOnce(Result<(), SyncUnitError>) + Send>;

struct OrchestratorInner {
    source: Arc<dyn SyncSource>,
    adapter: Arc<dyn SyncAdapter>,
    connectivity: Arc<dyn Connectivity>,
    errors: Arc<dyn ErrorSink>,
    events: Broadcaster,
    counter: PendingCounter,
}

/// Builder for a [`SyncOrchestrator`].
pub struct OrchestratorBuilder {
    source: Arc<dyn SyncSource>,
    adapter: Arc<dyn SyncAdapter>,
    connectivity: Arc<dyn Connectivity>,
    errors: Arc<dyn ErrorSink>,
    events: Broadcaster,
}

impl OrchestratorBuilder {
    /// Starts a builder. Defaults: always online, errors are logged.
    pub fn new(source: Arc<dyn SyncSource>, adapter: Arc<dyn SyncAdapter>) -> Self {
        Self {
            source,
            adapter,
            connectivity: Arc::new(AlwaysOnline),
            errors: Arc::new(LogErrorSink),
            events: Broadcaster::new(),
        }
    }

    /// Sets the connectivity check.
    pub fn with_connectivity(mut self, connectivity: Arc<dyn Connectivity>) -> Self {
        self.connectivity = connectivity;
        self
    }

    /// Sets where unhandled errors go.
    pub fn with_error_sink(mut self, errors: Arc<dyn ErrorSink>) -> Self {
        self.errors = errors;
        self
    }

    /// Emits lifecycle events on an existing broadcaster.
    pub fn with_events(mut self, events: Broadcaster) -> Self {
        self.events = events;
        self
    }

    /// Builds the orchestrator.
    pub fn build(self) -> SyncOrchestrator {
        SyncOrchestrator {
            inner: Arc::new(OrchestratorInner {
                counter: PendingCounter::new(self.events.clone()),
                source: self.source,
                adapter: self.adapter,
                connectivity: self.connectivity,
                errors: self.errors,
                events: self.events,
            }),
        }
    }
}

/// Fans sync work out across accounts and calendars.
///
/// Cloning yields another handle to the same orchestrator (same counter, same
/// events).
#[derive(Clone)]
pub struct SyncOrchestrator {
    inner: Arc<OrchestratorInner>,
}

/// Keeps one unit counted; uncounts it on drop, including during unwinding.
struct PendingGuard {
    inner: Arc<OrchestratorInner>,
}

impl PendingGuard {
    fn new(inner: &Arc<OrchestratorInner>) -> Self {
        inner.counter.increment();
        Self {
            inner: Arc::clone(inner),
        }
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.inner.counter.decrement();
    }
}

impl SyncOrchestrator {
    /// Starts a builder.
    pub fn builder(source: Arc<dyn SyncSource>, adapter: Arc<dyn SyncAdapter>) -> OrchestratorBuilder {
        OrchestratorBuilder::new(source, adapter)
    }

    /// Returns the broadcaster lifecycle events are emitted on.
    pub fn events(&self) -> &Broadcaster {
        &self.inner.events
    }

    /// Listens to one lifecycle event.
    pub fn on<F>(&self, event: SyncEvent, listener: F) -> Subscription
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.inner.events.on(event.name(), listener)
    }

    /// Returns the number of units in flight.
    pub fn pending(&self) -> u64 {
        self.inner.counter.get()
    }

    /// Returns true while any unit is in flight.
    pub fn is_syncing(&self) -> bool {
        self.pending() > 0
    }

    /// Returns the pending counter.
    pub fn counter(&self) -> &PendingCounter {
        &self.inner.counter
    }

    /// Syncs every account concurrently.
    ///
    /// Offline: emits `syncOffline` then `syncComplete` and does nothing else.
    /// Otherwise every account is counted before any of them runs; with no
    /// accounts (and nothing else in flight) `syncComplete` is emitted at once.
    /// Resolves when every unit started here has finished.
    pub async fn sync_all(&self) {
        if self.inner.connectivity.is_offline() {
            tracing::info!("offline, sync skipped");
            self.inner.counter.emit(SyncEvent::Offline);
            self.inner.counter.emit(SyncEvent::Complete);
            return;
        }

        let accounts = match self.inner.source.accounts().await {
            Ok(accounts) => accounts,
            Err(source) => {
                self.report(SyncUnitError {
                    unit: SyncUnit::AccountList,
                    source,
                });
                self.inner.counter.emit_if_idle(SyncEvent::Complete);
                return;
            }
        };

        tracing::info!(accounts = accounts.len(), "sync all");
        let units: Vec<_> = accounts
            .into_iter()
            .map(|account| self.sync_account(account, None))
            .collect();
        self.inner.counter.emit_if_idle(SyncEvent::Complete);
        join_all(units).await;
    }

    /// Syncs one account, then all its calendars concurrently.
    ///
    /// The unit is counted as soon as this is called, before the returned
    /// future is polled, and uncounted only after its outcome was delivered,
    /// so every failure is reported before the `syncComplete` it precedes.
    /// Calendar failures are reported on their own and do not fail the
    /// account.
    pub fn sync_account(
        &self,
        account: Account,
        callback: Option<SyncCallback>,
    ) -> impl Future<Output = ()> + Send + 'static {
        let guard = PendingGuard::new(&self.inner);
        let this = self.clone();
        async move {
            let outcome = this.run_account(&account).await;
            this.finish(
                outcome.map_err(|source| SyncUnitError::account(&account.id, source)),
                callback,
            );
            drop(guard);
        }
    }

    async fn run_account(&self, account: &Account) -> SyncResult<()> {
        tracing::debug!(account = %account.id, "sync account");
        self.inner.adapter.sync_account(account).await?;
        let calendars = self.inner.source.calendars(&account.id).await?;
        let units: Vec<_> = calendars
            .into_iter()
            .map(|calendar| self.sync_calendar(account.clone(), calendar, None))
            .collect();
        join_all(units).await;
        Ok(())
    }

    /// Syncs one calendar.
    ///
    /// Counted as soon as this is called, like [`SyncOrchestrator::sync_account`].
    pub fn sync_calendar(
        &self,
        account: Account,
        calendar: Calendar,
        callback: Option<SyncCallback>,
    ) -> impl Future<Output = ()> + Send + 'static {
        let guard = PendingGuard::new(&self.inner);
        let this = self.clone();
        async move {
            tracing::debug!(account = %account.id, calendar = %calendar.id, "sync calendar");
            let outcome = this.inner.adapter.sync_calendar(&account, &calendar).await;
            this.finish(
                outcome.map_err(|source| SyncUnitError::calendar(&account.id, &calendar.id, source)),
                callback,
            );
            drop(guard);
        }
    }

    fn finish(&self, outcome: Result<(), SyncUnitError>, callback: Option<SyncCallback>) {
        match (outcome, callback) {
            (outcome, Some(callback)) => callback(outcome),
            (Ok(()), None) => {}
            (Err(error), None) => self.report(error),
        }
    }

    fn report(&self, error: SyncUnitError) {
        tracing::warn!(unit = %error.unit, error = %error.source, "sync failed");
        self.inner.errors.dispatch(error);
    }
}

impl fmt::Debug for SyncOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncOrchestrator")
            .field("counter", &self.inner.counter)
            .finish()
    }
}
