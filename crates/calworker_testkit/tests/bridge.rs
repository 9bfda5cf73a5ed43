//! Integration tests for the bridge: a real client against a real service.

use calworker_bridge::{
    Args, BoxError, BridgeClient, BridgeError, BridgeService, JsonLinesTransport, MemoryTransport,
    ReadyConnector, StreamHandle, Transport, Value,
};
use calworker_testkit::{connected, eventually};
use serde_json::json;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn service() -> Arc<BridgeService> {
    let service = BridgeService::new("test");
    service
        .register_method("echo", |args: Args| async move { Ok(args.to_value()) })
        .unwrap();
    service
        .register_method("delay", |args: Args| async move {
            let millis: u64 = args.get(0)?;
            tokio::time::sleep(Duration::from_millis(millis)).await;
            Ok::<Value, BoxError>(args.raw(1).cloned().unwrap_or(Value::Null))
        })
        .unwrap();
    service
        .register_method("hang", |_args: Args| async move {
            std::future::pending::<()>().await;
            Ok(Value::Null)
        })
        .unwrap();
    service
        .register_method("panic", |_args: Args| async move {
            if true {
                panic!("handler exploded");
            }
            Ok(Value::Null)
        })
        .unwrap();
    service
        .register_stream("ticks", |stream: StreamHandle, _args: Args| async move {
            tokio::spawn(async move {
                let mut tick = 0u64;
                while stream.write(&tick) {
                    tick += 1;
                    tokio::time::sleep(Duration::from_millis(1)).await;
                }
            });
            Ok::<(), BoxError>(())
        })
        .unwrap();
    Arc::new(service)
}

#[tokio::test]
async fn concurrent_calls_resolve_with_their_own_reply() {
    let service = service();
    let client = connected(&service);

    // Later calls finish first, so replies arrive out of order.
    let calls: Vec<_> = (0..8u64)
        .map(|i| {
            let client = client.clone();
            tokio::spawn(async move {
                let args = Args::new().with(&((8 - i) * 5)).unwrap().with(&i).unwrap();
                client.call("delay", args).await
            })
        })
        .collect();

    for (i, call) in calls.into_iter().enumerate() {
        assert_eq!(call.await.unwrap().unwrap(), json!(i));
    }
    assert_eq!(client.pending_calls(), 0);
}

#[tokio::test]
async fn no_update_reaches_a_listener_after_cancel() {
    let service = service();
    let client = connected(&service);
    let stream = client.subscribe("ticks", Args::new()).await.unwrap();

    let seen = Arc::new(AtomicUsize::new(0));
    stream.listen({
        let seen = Arc::clone(&seen);
        move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        }
    });
    let counted = Arc::clone(&seen);
    eventually(move || counted.load(Ordering::SeqCst) >= 3).await;

    stream.cancel().await;
    let at_cancel = seen.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(seen.load(Ordering::SeqCst), at_cancel);
    assert!(stream.is_cancelled());
    assert_eq!(client.open_streams(), 0);
}

#[tokio::test]
async fn losing_the_channel_fails_pending_calls_and_ends_streams() {
    let service = service();
    let (ui, worker) = MemoryTransport::pair();
    let worker = Arc::new(worker);
    service.spawn(worker.clone());
    let client = BridgeClient::new(ReadyConnector::new(Arc::new(ui)));

    let stream = client.subscribe("ticks", Args::new()).await.unwrap();
    let hanging = tokio::spawn({
        let client = client.clone();
        async move { client.call("hang", Args::new()).await }
    });
    let waiting = client.clone();
    eventually(move || waiting.pending_calls() == 1).await;

    worker.close().await.unwrap();

    let err = hanging.await.unwrap().unwrap_err();
    assert!(err.is_transport(), "{err}");
    let ended = stream.clone();
    eventually(move || ended.is_cancelled()).await;
    assert!(!client.is_connected());

    let err = client.call("echo", Args::new()).await.unwrap_err();
    assert!(matches!(err, BridgeError::Transport(_)));
}

#[tokio::test]
async fn panicking_handler_fails_only_its_call() {
    let service = service();
    let client = connected(&service);

    let err = client.call("panic", Args::new()).await.unwrap_err();
    let BridgeError::Remote(message) = &err else {
        panic!("expected a remote error, got {err:?}");
    };
    assert!(message.contains("handler exploded"), "{message}");

    let echoed = client
        .call("echo", Args::from(vec![json!("still here")]))
        .await
        .unwrap();
    assert_eq!(echoed, json!(["still here"]));
}

#[tokio::test]
async fn session_over_json_lines() {
    let service = service();
    let (ui, worker) = tokio::io::duplex(16 * 1024);
    let (worker_read, worker_write) = tokio::io::split(worker);
    service.spawn(Arc::new(JsonLinesTransport::new(worker_read, worker_write)));

    let (ui_read, ui_write) = tokio::io::split(ui);
    let transport: Arc<dyn Transport> = Arc::new(JsonLinesTransport::new(ui_read, ui_write));
    let client = BridgeClient::new(ReadyConnector::new(transport));

    let echoed = client
        .call("echo", Args::from(vec![json!({ "a": [1, 2] }), json!(null)]))
        .await
        .unwrap();
    assert_eq!(echoed, json!([{ "a": [1, 2] }, null]));

    let broadcast_seen = Arc::new(AtomicBool::new(false));
    client.on("syncComplete", {
        let seen = Arc::clone(&broadcast_seen);
        move |_| seen.store(true, Ordering::SeqCst)
    });
    assert_eq!(service.broadcast("syncComplete", Value::Null), 1);
    let seen = Arc::clone(&broadcast_seen);
    eventually(move || seen.load(Ordering::SeqCst)).await;

    let stream = client.subscribe("ticks", Args::new()).await.unwrap();
    let mut updates = stream.listen_channel();
    assert_eq!(updates.recv().await, Some(json!(0)));
    assert_eq!(updates.recv().await, Some(json!(1)));
    stream.cancel().await;

    client.close().await.unwrap();
    let sessions = Arc::clone(&service);
    eventually(move || sessions.session_count() == 0).await;
}
