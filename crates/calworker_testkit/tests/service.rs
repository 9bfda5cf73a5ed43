//! End-to-end tests: a typed client driving a full calendar worker.

use async_trait::async_trait;
use calworker_bridge::BoxError;
use calworker_protocol::{Args, CalendarEvent, ExpandEvent, SyncEvent};
use calworker_service::{CalendarService, Expander, ServiceConfig, SyncStatusListener};
use calworker_store::StoreConfig;
use calworker_testkit::prelude::*;
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;

fn sync_log(listener: &SyncStatusListener) -> Arc<Mutex<Vec<SyncEvent>>> {
    let log = Arc::new(Mutex::new(Vec::new()));
    for event in SyncEvent::ALL {
        let log = Arc::clone(&log);
        listener.on(event, move |_| log.lock().push(event));
    }
    log
}

#[tokio::test]
async fn concurrent_first_requests_start_once() {
    let directory = Directory::generate(1, 1);
    let pair = WorkerPair::with_directory(&directory, Arc::new(ScriptedAdapter::new()));

    let calls: Vec<_> = (0..10)
        .map(|_| {
            let client = pair.client.clone();
            tokio::spawn(async move { client.accounts().await })
        })
        .collect();
    for call in calls {
        assert_eq!(call.await.unwrap().unwrap(), directory.accounts);
    }

    assert_eq!(pair.service.startup_runs(), 1);
    assert_eq!(pair.service.store().load_count(), 1);
}

#[tokio::test]
async fn startup_failure_reaches_every_caller() {
    let broken = StoreConfig::new("broken").with_record("calendars", json!({ "_id": false }));
    let pair = WorkerPair::build(
        CalendarService::builder(Arc::new(ScriptedAdapter::new()))
            .with_config(ServiceConfig::default().with_store(broken)),
    );

    let from_client = pair.client.accounts().await.unwrap_err().to_string();
    let from_start = pair.service.start().await.unwrap_err().to_string();
    assert!(from_client.contains("startup failed"), "{from_client}");
    assert!(from_start.contains("startup failed"), "{from_start}");
    assert_eq!(pair.service.startup_runs(), 1);
    assert!(!pair.service.is_started());
}

#[tokio::test]
async fn full_sync_through_the_bridge() {
    let directory = Directory::generate(2, 2);
    let adapter = Arc::new(ScriptedAdapter::new().fail_account("a2"));
    let sink = Arc::new(RecordingSink::new());
    let pair = WorkerPair::build(
        CalendarService::builder(adapter.clone())
            .with_config(ServiceConfig::default().with_store(directory.store_config()))
            .with_error_sink(sink.clone()),
    );

    let listener = SyncStatusListener::new();
    assert!(listener.observe(pair.client.bridge()));
    let log = sync_log(&listener);
    // Broadcasts reach connected sessions only.
    pair.client.echo(Args::new()).await.unwrap();

    pair.client.sync_all().await.unwrap();
    let seen = Arc::clone(&log);
    eventually(move || seen.lock().len() == 2).await;

    assert_eq!(log.lock().as_slice(), [SyncEvent::Start, SyncEvent::Complete]);
    assert!(!listener.is_syncing());
    assert_eq!(sink.len(), 1);
    assert_eq!(sink.errors()[0].account_id(), Some("a2"));
    let mut calendars = adapter.calendar_syncs();
    calendars.sort();
    assert_eq!(calendars, ["a1-c1", "a1-c2"]);
    assert!(listener.stop());
}

#[tokio::test]
async fn offline_sync_is_relayed() {
    let pair = WorkerPair::build(
        CalendarService::builder(Arc::new(ScriptedAdapter::new()))
            .with_connectivity(Arc::new(FixedConnectivity::offline())),
    );
    let listener = SyncStatusListener::new();
    listener.observe(pair.client.bridge());
    let log = sync_log(&listener);
    pair.client.echo(Args::new()).await.unwrap();

    pair.client.sync_all().await.unwrap();
    let seen = Arc::clone(&log);
    eventually(move || seen.lock().len() == 2).await;
    assert_eq!(log.lock().as_slice(), [SyncEvent::Offline, SyncEvent::Complete]);
}

#[derive(Default)]
struct CountingExpander {
    expanded: Mutex<Vec<String>>,
}

#[async_trait]
impl Expander for CountingExpander {
    async fn expand(&self, event: &CalendarEvent) -> Result<(), BoxError> {
        self.expanded.lock().push(event.id.clone());
        Ok(())
    }
}

#[tokio::test]
async fn recurring_writes_are_expanded_and_announced() {
    let expander = Arc::new(CountingExpander::default());
    let pair = WorkerPair::build(
        CalendarService::builder(Arc::new(ScriptedAdapter::new())).with_expander(expander.clone()),
    );
    let log = EventLog::new();
    let account = pair.client.create_account(&local_account("")).await.unwrap();
    log.attach_client(pair.client.bridge(), ExpandEvent::ALL.map(ExpandEvent::name));

    let calendar = pair.service.accounts().calendars(&account.id).unwrap().remove(0);
    pair.client.create_event(&event(&calendar.id, 0)).await.unwrap();
    let weekly = pair
        .client
        .create_event(&recurring_event(&calendar.id, 0))
        .await
        .unwrap();

    let announced = log.clone();
    eventually(move || announced.count("expandComplete") == 1).await;
    assert_eq!(log.names(), ["expandStart", "expandComplete"]);
    assert_eq!(expander.expanded.lock().as_slice(), [weekly.id]);
    assert_eq!(pair.service.recurring().expansions(), 1);
}

#[tokio::test]
async fn records_join_event_calendar_and_account() {
    let directory = Directory::generate(1, 1);
    let pair = WorkerPair::with_directory(&directory, Arc::new(ScriptedAdapter::new()));

    let created = pair.client.create_event(&event("a1-c1", 1_000)).await.unwrap();
    let record = pair.client.fetch_record(&created.id).await.unwrap();
    assert_eq!(record.event, created);
    assert_eq!(record.calendar.id, "a1-c1");
    assert_eq!(record.account, directory.accounts[0]);

    let mut bad = event("a1-c1", 1_000);
    bad.end = 0;
    assert!(pair.client.create_event(&bad).await.is_err());
    assert!(pair.client.fetch_record("missing").await.is_err());
}
