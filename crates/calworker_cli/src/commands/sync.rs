//! Sync command implementation.

use crate::worker::{connect, FailureLog, FixedConnectivity, SimulatedServer};
use calworker_protocol::{Account, Args, Calendar, SyncEvent};
use calworker_service::{CalendarService, ServiceConfig, SyncStatusListener, CALDAV_PROVIDER};
use calworker_store::StoreConfig;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;

/// What to sync.
#[derive(Debug, Clone)]
pub struct Plan {
    /// Number of accounts.
    pub accounts: usize,
    /// Calendars per account.
    pub calendars: usize,
    /// One-based indices of accounts the server rejects.
    pub failing: Vec<usize>,
    /// Whether the device is offline.
    pub offline: bool,
    /// Server latency per unit.
    pub latency_ms: u64,
}

impl Plan {
    fn account_id(index: usize) -> String {
        format!("account-{index}")
    }

    /// Returns a store whose snapshot holds the planned accounts and calendars.
    fn store(&self) -> Result<StoreConfig, serde_json::Error> {
        let mut store = StoreConfig::new("calworker");
        for a in 1..=self.accounts {
            let id = Self::account_id(a);
            let account = Account::new(CALDAV_PROVIDER, "caldav")
                .with_id(id.clone())
                .with_user(format!("user{a}@example.com"));
            store = store.with_record("accounts", serde_json::to_value(&account)?);
            for c in 1..=self.calendars {
                let calendar = Calendar::new(format!("{id}-cal-{c}"), id.clone(), format!("Calendar {c}"));
                store = store.with_record("calendars", serde_json::to_value(&calendar)?);
            }
        }
        Ok(store)
    }

    fn failing_ids(&self) -> HashSet<String> {
        self.failing.iter().map(|&i| Self::account_id(i)).collect()
    }
}

/// Summary of one run.
#[derive(Debug)]
pub struct SyncReport {
    /// Lifecycle events seen by the client, in order.
    pub events: Vec<SyncEvent>,
    /// Accounts synced.
    pub accounts_synced: usize,
    /// Calendars synced.
    pub calendars_synced: usize,
    /// Failed units.
    pub failures: Vec<String>,
    /// Wall time from request to `syncComplete`.
    pub elapsed: Duration,
}

/// Runs the sync command.
pub async fn run(plan: &Plan, json_wire: bool) -> Result<(), Box<dyn std::error::Error>> {
    println!(
        "Syncing {} account(s) with {} calendar(s) each",
        plan.accounts, plan.calendars
    );
    let report = execute(plan, json_wire).await?;

    println!();
    let events: Vec<&str> = report.events.iter().map(|e| e.name()).collect();
    println!("Events:     {}", events.join(" -> "));
    println!("Accounts:   {} synced", report.accounts_synced);
    println!("Calendars:  {} synced", report.calendars_synced);
    println!("Elapsed:    {:?}", report.elapsed);
    if report.failures.is_empty() {
        println!("✓ Sync completed without failures");
    } else {
        println!("✗ {} unit(s) failed:", report.failures.len());
        for failure in &report.failures {
            println!("  - {failure}");
        }
    }
    Ok(())
}

/// Builds a worker for `plan`, requests a full sync and waits for it.
pub async fn execute(plan: &Plan, json_wire: bool) -> Result<SyncReport, Box<dyn std::error::Error>> {
    let server = Arc::new(SimulatedServer::new(
        Duration::from_millis(plan.latency_ms),
        plan.failing_ids(),
    ));
    let failures = Arc::new(FailureLog::default());
    let service = CalendarService::builder(server.clone())
        .with_config(ServiceConfig::default().with_store(plan.store()?))
        .with_connectivity(Arc::new(FixedConnectivity::new(plan.offline)))
        .with_error_sink(failures.clone())
        .build()?;
    let client = connect(&service, json_wire);

    let listener = SyncStatusListener::new();
    listener.observe(client.bridge());
    let events = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let complete = Arc::new(Notify::new());
    for event in SyncEvent::ALL {
        let events = Arc::clone(&events);
        let complete = Arc::clone(&complete);
        listener.on(event, move |_| {
            events.lock().push(event);
            if event == SyncEvent::Complete {
                complete.notify_one();
            }
        });
    }

    // Starts the worker and connects the session before any broadcast.
    client.echo(Args::new()).await?;
    let started = Instant::now();
    client.sync_all().await?;
    tokio::time::timeout(Duration::from_secs(60), complete.notified())
        .await
        .map_err(|_| "timed out waiting for syncComplete")?;
    let elapsed = started.elapsed();

    listener.stop();
    client.close().await?;
    let events = events.lock().clone();
    Ok(SyncReport {
        events,
        accounts_synced: server.accounts_synced(),
        calendars_synced: server.calendars_synced(),
        failures: failures.errors().iter().map(ToString::to_string).collect(),
        elapsed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(accounts: usize, calendars: usize) -> Plan {
        Plan {
            accounts,
            calendars,
            failing: Vec::new(),
            offline: false,
            latency_ms: 1,
        }
    }

    #[tokio::test]
    async fn partial_failure_is_summarized() {
        let plan = Plan {
            failing: vec![2],
            ..plan(3, 2)
        };
        let report = execute(&plan, false).await.unwrap();
        assert_eq!(report.events, [SyncEvent::Start, SyncEvent::Complete]);
        assert_eq!(report.accounts_synced, 2);
        assert_eq!(report.calendars_synced, 4);
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].contains("account-2"), "{:?}", report.failures);
    }

    #[tokio::test]
    async fn offline_skips_the_server() {
        let plan = Plan {
            offline: true,
            ..plan(2, 1)
        };
        let report = execute(&plan, true).await.unwrap();
        assert_eq!(report.events, [SyncEvent::Offline, SyncEvent::Complete]);
        assert_eq!(report.accounts_synced, 0);
    }

    #[tokio::test]
    async fn no_accounts_completes_at_once() {
        let report = execute(&plan(0, 0), true).await.unwrap();
        assert_eq!(report.events, [SyncEvent::Complete]);
        assert!(report.failures.is_empty());
    }
}
