//! Background generation tasks.
//!
//! Each task runs one request returned by a controller, then reports the
//! outcome to the UI loop as an [`AppEvent`]. Tasks never touch controller
//! state themselves.

use crate::app::AppEvent;
use crate::controller::{ExpandRequest, FeedFetch, TreeFetch};
use crate::generation::{GenerationClient, GenerationError};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Wraps a future to catch panics and convert them to errors.
///
/// A panicking task would otherwise vanish silently and leave its controller
/// stuck in a loading state. With this, the panic message is returned as
/// `Err(String)` and reported as a failed result of the task's request.
pub async fn catch_task_panic<F, T>(future: F) -> Result<T, String>
where
    F: std::future::Future<Output = T>,
{
    AssertUnwindSafe(future)
        .catch_unwind()
        .await
        .map_err(|panic| {
            if let Some(s) = panic.downcast_ref::<&'static str>() {
                s.to_string()
            } else if let Some(s) = panic.downcast_ref::<String>() {
                s.clone()
            } else {
                "Unknown panic payload".to_string()
            }
        })
}

async fn send_event(tx: &mpsc::Sender<AppEvent>, event: AppEvent, name: &'static str) {
    if let Err(e) = tx.send(event).await {
        tracing::warn!(error = %e, event = name, "Channel send failed (receiver dropped)");
    }
}

/// Log a task panic and turn it into the error result the task reports.
fn panicked<T>(task: &'static str, message: String) -> Result<T, GenerationError> {
    tracing::error!(task, error = %message, "Background task panicked");
    Err(GenerationError::TaskPanicked(message))
}

/// Run `future` alongside a `min` timer and resolve once both are done.
pub(crate) async fn with_min_loading<F>(future: F, min: Duration) -> F::Output
where
    F: std::future::Future,
{
    let (output, ()) = tokio::join!(future, tokio::time::sleep(min));
    output
}

/// Generate the next feed section.
///
/// The request and the `min_loading` timer run concurrently and the result is
/// only reported once both finish, so the loading line never flickers.
pub fn spawn_feed_fetch(
    client: GenerationClient,
    fetch: FeedFetch,
    min_loading: Duration,
    tx: mpsc::Sender<AppEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let outcome = catch_task_panic(with_min_loading(
            client.generate(&fetch.recent_topics, None),
            min_loading,
        ))
        .await;

        let result = outcome.unwrap_or_else(|panic_msg| panicked("feed_fetch", panic_msg));
        send_event(&tx, AppEvent::FeedGenerated { result }, "FeedGenerated").await;
    })
}

/// Generate the concept tree for one section.
pub fn spawn_tree_load(
    client: GenerationClient,
    fetch: TreeFetch,
    tx: mpsc::Sender<AppEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let result = catch_task_panic(client.generate_tree(&fetch.topic))
            .await
            .unwrap_or_else(|panic_msg| panicked("tree_load", panic_msg));

        let event = AppEvent::TreeLoaded {
            section_id: fetch.section_id,
            generation: fetch.generation,
            result,
        };
        send_event(&tx, event, "TreeLoaded").await;
    })
}

/// Generate a new section about a concept node.
pub fn spawn_expand(
    client: GenerationClient,
    request: ExpandRequest,
    tx: mpsc::Sender<AppEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let result = catch_task_panic(
            client.generate(&request.recent_topics, Some(request.topic.as_str())),
        )
        .await
        .unwrap_or_else(|panic_msg| panicked("node_expand", panic_msg));

        let event = AppEvent::NodeExpanded {
            section_id: request.section_id,
            topic: request.topic,
            result,
        };
        send_event(&tx, event, "NodeExpanded").await;
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_catch_task_panic_passes_value_through() {
        assert_eq!(catch_task_panic(async { 7 }).await, Ok(7));
    }

    #[tokio::test]
    async fn test_catch_task_panic_captures_message() {
        let result: Result<(), String> = catch_task_panic(async { panic!("boom") }).await;
        assert_eq!(result, Err("boom".to_string()));

        let result: Result<(), String> =
            catch_task_panic(async { panic!("code {}", 42) }).await;
        assert_eq!(result, Err("code 42".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_min_loading_holds_fast_result() {
        let min = Duration::from_millis(800);
        let early = tokio::time::timeout(
            Duration::from_millis(799),
            with_min_loading(async { 7 }, min),
        )
        .await;
        assert!(early.is_err());

        let start = tokio::time::Instant::now();
        assert_eq!(with_min_loading(async { 7 }, min).await, 7);
        assert!(start.elapsed() >= min);
    }

    #[tokio::test(start_paused = true)]
    async fn test_min_loading_does_not_delay_slow_result() {
        let start = tokio::time::Instant::now();
        let slow = async {
            tokio::time::sleep(Duration::from_secs(2)).await;
            "done"
        };
        assert_eq!(with_min_loading(slow, Duration::from_millis(800)).await, "done");
        assert_eq!(start.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_feed_fetch_reports_after_min_loading() {
        let client = GenerationClient::new(reqwest::Client::new(), "http://127.0.0.1:9");
        let fetch = FeedFetch {
            recent_topics: Vec::new(),
        };
        let (tx, mut rx) = mpsc::channel(4);
        let start = tokio::time::Instant::now();

        spawn_feed_fetch(client, fetch, Duration::from_millis(800), tx);

        let early = tokio::time::timeout(Duration::from_millis(799), rx.recv()).await;
        assert!(early.is_err(), "no result before the minimum loading time");

        let event = rx.recv().await.expect("one result after the timer");
        assert!(matches!(event, AppEvent::FeedGenerated { result: Err(_) }));
        assert!(start.elapsed() >= Duration::from_millis(800));
        assert!(rx.recv().await.is_none());
    }
}
