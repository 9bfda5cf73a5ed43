//! The in-process worker the commands talk to.

use async_trait::async_trait;
use calworker_bridge::{BridgeClient, ClientConfig, JsonLinesTransport, ReadyConnector, Transport};
use calworker_protocol::{Account, Calendar};
use calworker_service::{CalendarClient, CalendarService};
use calworker_sync::{Connectivity, ErrorSink, SyncAdapter, SyncError, SyncResult, SyncUnitError};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Sync adapter that pretends to talk to a remote server.
#[derive(Debug, Default)]
pub struct SimulatedServer {
    latency: Duration,
    failing: HashSet<String>,
    accounts: AtomicUsize,
    calendars: AtomicUsize,
}

impl SimulatedServer {
    /// Creates a server that answers after `latency` and rejects the
    /// accounts in `failing`.
    pub fn new(latency: Duration, failing: HashSet<String>) -> Self {
        Self {
            latency,
            failing,
            ..Self::default()
        }
    }

    /// Returns how many account syncs succeeded.
    pub fn accounts_synced(&self) -> usize {
        self.accounts.load(Ordering::SeqCst)
    }

    /// Returns how many calendar syncs succeeded.
    pub fn calendars_synced(&self) -> usize {
        self.calendars.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SyncAdapter for SimulatedServer {
    async fn sync_account(&self, account: &Account) -> SyncResult<()> {
        tokio::time::sleep(self.latency).await;
        if self.failing.contains(&account.id) {
            return Err(SyncError::AuthenticationFailed(format!(
                "server rejected {}",
                account.user.as_deref().unwrap_or(&account.id)
            )));
        }
        self.accounts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn sync_calendar(&self, _account: &Account, _calendar: &Calendar) -> SyncResult<()> {
        tokio::time::sleep(self.latency).await;
        self.calendars.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Connectivity fixed at startup.
#[derive(Debug)]
pub struct FixedConnectivity {
    offline: AtomicBool,
}

impl FixedConnectivity {
    /// Creates the connectivity.
    pub fn new(offline: bool) -> Self {
        Self {
            offline: AtomicBool::new(offline),
        }
    }
}

impl Connectivity for FixedConnectivity {
    fn is_offline(&self) -> bool {
        self.offline.load(Ordering::SeqCst)
    }
}

/// Keeps failed units for the summary.
#[derive(Debug, Default)]
pub struct FailureLog {
    errors: Mutex<Vec<SyncUnitError>>,
}

impl FailureLog {
    /// Returns the failures so far.
    pub fn errors(&self) -> Vec<SyncUnitError> {
        self.errors.lock().clone()
    }
}

impl ErrorSink for FailureLog {
    fn dispatch(&self, error: SyncUnitError) {
        self.errors.lock().push(error);
    }
}

/// Returns a client for `service`, connected in memory or over a JSON-lines
/// pipe.
pub fn connect(service: &CalendarService, json_wire: bool) -> CalendarClient {
    if !json_wire {
        return service.client();
    }

    let (ui, worker) = tokio::io::duplex(64 * 1024);
    let (worker_read, worker_write) = tokio::io::split(worker);
    service.spawn(Arc::new(JsonLinesTransport::new(worker_read, worker_write)));

    let (ui_read, ui_write) = tokio::io::split(ui);
    let transport: Arc<dyn Transport> = Arc::new(JsonLinesTransport::new(ui_read, ui_write));
    let config = ClientConfig::new(service.config().name.clone());
    tracing::debug!("client connected over json lines");
    CalendarClient::new(BridgeClient::with_config(config, ReadyConnector::new(transport)))
}
