//! The worker-side service context.

use crate::accounts::Accounts;
use crate::calendars::Calendars;
use crate::client::CalendarClient;
use crate::config::ServiceConfig;
use crate::error::ServiceResult;
use crate::events::Events;
use crate::handlers;
use crate::records::Records;
use crate::recurring::{Expander, NoopExpander, RecurringEvents};
use crate::settings::Settings;
use crate::source::StoreSyncSource;
use calworker_bridge::{
    BoxError, BridgeClient, BridgeResult, BridgeService, Broadcaster, ClientConfig,
    HandlerResult, MemoryTransport, StartupGate, StreamHandle, Transport, WorkerConnector,
};
use calworker_protocol::{Args, ExpandEvent, SyncEvent};
use calworker_store::Store;
use calworker_sync::{Connectivity, ErrorSink, SyncAdapter, SyncOrchestrator};
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Weak};
use tokio::task::JoinHandle;

/// Builder for a [`CalendarService`].
pub struct ServiceBuilder {
    config: ServiceConfig,
    adapter: Arc<dyn SyncAdapter>,
    store: Option<Store>,
    connectivity: Option<Arc<dyn Connectivity>>,
    errors: Option<Arc<dyn ErrorSink>>,
    expander: Arc<dyn Expander>,
}

impl ServiceBuilder {
    /// Starts a builder around the adapter that talks to remote servers.
    pub fn new(adapter: Arc<dyn SyncAdapter>) -> Self {
        Self {
            config: ServiceConfig::default(),
            adapter,
            store: None,
            connectivity: None,
            errors: None,
            expander: Arc::new(NoopExpander),
        }
    }

    /// Sets the configuration.
    pub fn with_config(mut self, config: ServiceConfig) -> Self {
        self.config = config;
        self
    }

    /// Uses an existing store instead of creating one from the configuration.
    pub fn with_store(mut self, store: Store) -> Self {
        self.store = Some(store);
        self
    }

    /// Sets the connectivity check used by full syncs.
    pub fn with_connectivity(mut self, connectivity: Arc<dyn Connectivity>) -> Self {
        self.connectivity = Some(connectivity);
        self
    }

    /// Sets where unhandled sync errors go.
    pub fn with_error_sink(mut self, errors: Arc<dyn ErrorSink>) -> Self {
        self.errors = Some(errors);
        self
    }

    /// Sets the recurring event expander.
    pub fn with_expander(mut self, expander: Arc<dyn Expander>) -> Self {
        self.expander = expander;
        self
    }

    /// Builds the service and registers every endpoint.
    pub fn build(self) -> ServiceResult<Arc<CalendarService>> {
        let config = Arc::new(self.config);
        let store = self
            .store
            .unwrap_or_else(|| Store::new(config.store.clone()));

        let source = Arc::new(StoreSyncSource::new(store.clone(), config.providers.clone()));
        let mut sync = SyncOrchestrator::builder(source, Arc::clone(&self.adapter));
        if let Some(connectivity) = self.connectivity {
            sync = sync.with_connectivity(connectivity);
        }
        if let Some(errors) = self.errors {
            sync = sync.with_error_sink(errors);
        }
        let sync = sync.build();

        let bridge = Arc::new(BridgeService::new(config.name.clone()));
        let recurring = RecurringEvents::new(store.clone(), self.expander);
        let gate = {
            let bridge = Arc::downgrade(&bridge);
            let store = store.clone();
            let sync = sync.clone();
            let recurring = recurring.clone();
            StartupGate::new(move || {
                start_up(bridge.clone(), store.clone(), sync.clone(), recurring.clone())
            })
        };

        let service = Arc::new(CalendarService {
            accounts: Accounts::new(
                Arc::clone(&config),
                store.clone(),
                self.adapter,
                sync.clone(),
            ),
            calendars: Calendars::new(store.clone()),
            settings: Settings::new(store.clone()),
            events: Events::new(&store),
            records: Records::new(&store),
            config,
            store,
            sync,
            bridge,
            gate,
            recurring,
        });
        handlers::register(&service)?;
        tracing::info!(service = %service.config.name, "calendar service ready");
        Ok(service)
    }
}

impl fmt::Debug for ServiceBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceBuilder")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

// Runs once, behind the startup gate.
async fn start_up(
    bridge: Weak<BridgeService>,
    store: Store,
    sync: SyncOrchestrator,
    recurring: RecurringEvents,
) -> Result<(), BoxError> {
    relay(&bridge, sync.events(), SyncEvent::ALL.map(SyncEvent::name));
    relay(&bridge, recurring.events(), ExpandEvent::ALL.map(ExpandEvent::name));
    recurring.observe();
    store.load().await?;
    Ok(())
}

// Forwards local lifecycle events to every client session.
fn relay<const N: usize>(
    bridge: &Weak<BridgeService>,
    events: &Broadcaster,
    names: [&'static str; N],
) {
    for name in names {
        let bridge = bridge.clone();
        events.on(name, move |data| {
            if let Some(bridge) = bridge.upgrade() {
                bridge.broadcast(name, data.clone());
            }
        });
    }
}

/// The calendar worker: store, sync orchestrator and the bridge endpoints
/// that expose them.
///
/// Every endpoint waits for the startup step (event relays, recurring
/// expansion, store load) before running. Startup runs once, on the first
/// request or on [`CalendarService::start`], and its outcome is shared: if it
/// fails, every request fails with the same startup error.
pub struct CalendarService {
    config: Arc<ServiceConfig>,
    store: Store,
    sync: SyncOrchestrator,
    bridge: Arc<BridgeService>,
    gate: StartupGate,
    recurring: RecurringEvents,
    accounts: Accounts,
    calendars: Calendars,
    settings: Settings,
    events: Events,
    records: Records,
}

impl CalendarService {
    /// Starts a builder.
    pub fn builder(adapter: Arc<dyn SyncAdapter>) -> ServiceBuilder {
        ServiceBuilder::new(adapter)
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Returns the store.
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Returns the sync orchestrator.
    pub fn sync(&self) -> &SyncOrchestrator {
        &self.sync
    }

    /// Returns the bridge service the endpoints are registered on.
    pub fn bridge(&self) -> &Arc<BridgeService> {
        &self.bridge
    }

    /// Returns the recurring event watcher.
    pub fn recurring(&self) -> &RecurringEvents {
        &self.recurring
    }

    /// Returns the account service.
    pub fn accounts(&self) -> &Accounts {
        &self.accounts
    }

    /// Returns the calendar service.
    pub fn calendars(&self) -> &Calendars {
        &self.calendars
    }

    /// Returns the settings service.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Returns the event service.
    pub fn events(&self) -> &Events {
        &self.events
    }

    /// Returns the record lookup.
    pub fn records(&self) -> &Records {
        &self.records
    }

    /// Runs the startup step if it has not run yet.
    pub async fn start(&self) -> BridgeResult<()> {
        self.gate.open().await
    }

    /// Returns true once startup succeeded.
    pub fn is_started(&self) -> bool {
        self.gate.is_open()
    }

    /// Returns how many times the startup step ran (0 or 1).
    pub fn startup_runs(&self) -> usize {
        self.gate.runs()
    }

    /// Serves one client session until its channel closes.
    pub async fn serve(&self, transport: Arc<dyn Transport>) -> BridgeResult<()> {
        self.bridge.serve(transport).await
    }

    /// Spawns a session on the current runtime.
    pub fn spawn(&self, transport: Arc<dyn Transport>) -> JoinHandle<()> {
        self.bridge.spawn(transport)
    }

    /// Returns a connector that opens an in-process session per connection.
    pub fn connector(
        &self,
    ) -> WorkerConnector<impl Fn(MemoryTransport) -> BridgeResult<()> + Send + Sync + 'static> {
        let bridge = Arc::clone(&self.bridge);
        WorkerConnector::new(move |transport: MemoryTransport| {
            bridge.spawn(Arc::new(transport));
            Ok(())
        })
    }

    /// Returns a typed client connected in-process to this service.
    pub fn client(&self) -> CalendarClient {
        let config = ClientConfig::new(self.config.name.clone());
        CalendarClient::new(BridgeClient::with_config(config, self.connector()))
    }

    /// Registers a method that waits for startup before running.
    ///
    /// `state` is cloned into every invocation.
    pub fn method<S, F, Fut, T>(&self, endpoint: &str, state: S, handler: F) -> BridgeResult<()>
    where
        S: Clone + Send + Sync + 'static,
        F: Fn(S, Args) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult<T>> + Send + 'static,
        T: Serialize + Send + 'static,
    {
        let gate = self.gate.clone();
        let handler = Arc::new(handler);
        self.bridge.register_method(endpoint, move |args| {
            let gate = gate.clone();
            let handler = Arc::clone(&handler);
            let state = state.clone();
            async move {
                gate.open().await?;
                handler(state, args).await
            }
        })
    }

    /// Registers a stream that waits for startup before running.
    pub fn stream<S, F, Fut>(&self, endpoint: &str, state: S, handler: F) -> BridgeResult<()>
    where
        S: Clone + Send + Sync + 'static,
        F: Fn(S, StreamHandle, Args) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult<()>> + Send + 'static,
    {
        let gate = self.gate.clone();
        let handler = Arc::new(handler);
        self.bridge.register_stream(endpoint, move |stream, args| {
            let gate = gate.clone();
            let handler = Arc::clone(&handler);
            let state = state.clone();
            async move {
                gate.open().await?;
                handler(state, stream, args).await
            }
        })
    }
}

impl fmt::Debug for CalendarService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CalendarService")
            .field("name", &self.config.name)
            .field("store", &self.store)
            .field("sync", &self.sync)
            .field("gate", &self.gate)
            .finish_non_exhaustive()
    }
}
