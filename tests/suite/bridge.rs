//! Response bridge over real HTTP

use std::iter;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use futures_util::StreamExt;
use snakepit_core::{Pit, PitError};
use snakepit_transport::{HttpDescriptor, HttpTransport, get};
use snakepit_types::ExecutionConfig;

use crate::common::{start_server, url};

fn transport() -> HttpTransport {
    HttpTransport::from_config(&ExecutionConfig::new()).unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn blocking_iteration_outside_a_runtime() {
    let server = start_server(&[("a", 200, 250), ("b", 200, 50), ("c", 200, 150)]).await;
    let urls: Vec<String> = ["a", "b", "c"].iter().map(|n| url(&server, n)).collect();

    // A plain thread has no current runtime, so the bridge starts its own.
    let paths = thread::spawn(move || {
        let source: Vec<HttpDescriptor> = urls.iter().map(|u| get(u)).collect();
        let config = ExecutionConfig::new().with("concurrency", 3);
        let mut pit = Pit::new(transport(), source, config);
        pit.process()
            .unwrap()
            .map(|response| response.unwrap().url().path().to_string())
            .collect::<Vec<_>>()
    })
    .join()
    .unwrap();

    assert_eq!(paths, vec!["/b", "/c", "/a"]);
}

#[tokio::test]
async fn continue_policy_delivers_successes_and_failures() {
    let server = start_server(&[("ok", 200, 0), ("gone", 410, 40), ("late", 200, 80)]).await;
    let source: Vec<_> = ["gone", "late", "ok"].iter().map(|n| get(&url(&server, n))).collect();
    let config = ExecutionConfig::new().with("on_error", "continue");
    let mut pit = Pit::new(transport(), source, config);

    let outcomes: Vec<Result<String, Option<usize>>> = pit
        .process()
        .unwrap()
        .into_stream()
        .map(|item| {
            item.map(|response| response.url().path().to_string())
                .map_err(|e| e.index())
        })
        .collect()
        .await;

    assert_eq!(
        outcomes,
        vec![Ok("/ok".to_string()), Err(Some(0)), Ok("/late".to_string())]
    );
}

#[tokio::test]
async fn http_errors_disabled_yields_error_responses() {
    let server = start_server(&[("missing", 404, 0)]).await;
    let config = ExecutionConfig::new().with("http_errors", false);
    let mut pit = Pit::new(transport(), vec![get(&url(&server, "missing"))], config);

    let statuses: Vec<u16> = pit
        .process()
        .unwrap()
        .into_stream()
        .map(|item| item.unwrap().status().as_u16())
        .collect()
        .await;

    assert_eq!(statuses, vec![404]);
}

#[tokio::test]
async fn unbounded_source_is_consumed_on_demand() {
    let server = start_server(&[("tick", 200, 5)]).await;
    let target = url(&server, "tick");
    let pulled = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&pulled);
    let source = iter::repeat_with(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        get(&target)
    });
    let config = ExecutionConfig::new().with("concurrency", 2);
    let mut pit = Pit::new(transport(), source, config);

    let taken = pit.process().unwrap().into_stream().take(6).count().await;

    assert_eq!(taken, 6);
    assert!(pulled.load(Ordering::SeqCst) <= 6 + 2);
    let received = server.received_requests().await.unwrap_or_default();
    assert!(received.len() <= 6 + 2);
}

#[tokio::test]
async fn process_twice_is_rejected() {
    let mut pit = Pit::new(transport(), Vec::<HttpDescriptor>::new(), ExecutionConfig::new());

    let mut first = pit.process().unwrap().into_stream();
    assert!(first.next().await.is_none());
    assert!(matches!(pit.process(), Err(PitError::AlreadyProcessed)));
}
