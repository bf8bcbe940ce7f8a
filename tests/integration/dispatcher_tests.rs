//! Dispatcher behaviour with scripted detail sources and in-memory sinks

use async_trait::async_trait;
use listing_harvest::crawler::{
    DetailSource, Dispatcher, DispatcherSettings, FetchError, RateLimiter, Sinks,
};
use listing_harvest::model::{CanonicalRecord, Identifier, RawDetailDocument};
use listing_harvest::output::{ObjectStorage, SearchIndex, SinkResult};
use listing_harvest::storage::{ListingStore, SqliteStore, StorageError, StorageResult};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

fn listing_page(title: &str) -> String {
    format!(
        r#"<html><body>
            <h1 class="kt-page-title__title">{}</h1>
            <div class="kt-carousel"><img src="https://img.example.com/static/1.jpg"></div>
            <div class="kt-unexpandable-row">
              <p class="kt-unexpandable-row__title">متراژ</p>
              <p class="kt-unexpandable-row__value">۱۲۰</p>
            </div>
        </body></html>"#,
        title
    )
}

/// Scripted source recording call order, timing and fetch concurrency
#[derive(Default)]
struct ScriptedSource {
    /// Errors returned per identifier, consumed front to back
    errors: Mutex<HashMap<String, Vec<FetchError>>>,
    /// Identifiers served without a title
    untitled: Vec<String>,
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: Mutex<Vec<(String, Instant)>>,
}

impl ScriptedSource {
    fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Default::default()
        }
    }

    fn fail(self, identifier: &str, errors: Vec<FetchError>) -> Self {
        self.errors
            .lock()
            .unwrap()
            .insert(identifier.to_string(), errors);
        self
    }

    fn call_count(&self, identifier: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| id == identifier)
            .count()
    }

    fn call_time(&self, identifier: &str) -> Instant {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .find(|(id, _)| id == identifier)
            .map(|(_, at)| *at)
            .unwrap()
    }
}

#[async_trait]
impl DetailSource for ScriptedSource {
    async fn fetch(&self, identifier: &Identifier) -> Result<RawDetailDocument, FetchError> {
        self.calls
            .lock()
            .unwrap()
            .push((identifier.to_string(), Instant::now()));

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let scripted = {
            let mut errors = self.errors.lock().unwrap();
            errors
                .get_mut(identifier.as_str())
                .filter(|queue| !queue.is_empty())
                .map(|queue| queue.remove(0))
        };
        if let Some(error) = scripted {
            return Err(error);
        }

        let markup = if self.untitled.iter().any(|id| id == identifier.as_str()) {
            "<html><body><p>nothing here</p></body></html>".to_string()
        } else {
            listing_page(&format!("Listing {}", identifier))
        };
        Ok(RawDetailDocument::from_markup(identifier.clone(), markup))
    }
}

#[derive(Default)]
struct RecordingIndex {
    indexed: Mutex<Vec<CanonicalRecord>>,
}

#[async_trait]
impl SearchIndex for RecordingIndex {
    async fn index(&self, record: &CanonicalRecord) -> SinkResult<()> {
        self.indexed.lock().unwrap().push(record.clone());
        Ok(())
    }
}

/// Re-hosts every image except ones containing `broken`
struct FakeStorage;

#[async_trait]
impl ObjectStorage for FakeStorage {
    async fn rehost(&self, image_urls: &[String], identifier: &Identifier) -> Vec<String> {
        image_urls
            .iter()
            .filter(|url| !url.contains("broken"))
            .enumerate()
            .map(|(i, _)| format!("https://cdn.example.com/{}/{}.jpg", identifier, i))
            .collect()
    }
}

struct FailingStore;

#[async_trait]
impl ListingStore for FailingStore {
    async fn upsert(&self, _record: &CanonicalRecord) -> StorageResult<Option<i64>> {
        Err(StorageError::Database("disk full".to_string()))
    }

    async fn attach_images(&self, _listing_id: i64, _public_urls: &[String]) -> StorageResult<()> {
        Ok(())
    }
}

fn quick_settings(concurrency: usize) -> DispatcherSettings {
    DispatcherSettings {
        concurrency,
        item_delay_min: Duration::ZERO,
        item_delay_max: Duration::ZERO,
        cooldown: Duration::from_millis(100),
        max_retries: 1,
        retry_backoff: Duration::from_millis(5),
    }
}

fn create_dispatcher(source: Arc<ScriptedSource>, sinks: Sinks, concurrency: usize) -> Dispatcher {
    let limiter = RateLimiter::new(Duration::ZERO, Duration::ZERO).shared();
    Dispatcher::new(source, limiter, sinks, quick_settings(concurrency))
}

fn ids(values: &[&str]) -> Vec<Identifier> {
    values.iter().map(|v| Identifier::from(*v)).collect()
}

#[tokio::test]
async fn test_concurrency_ceiling_is_respected() {
    let source = Arc::new(ScriptedSource::with_delay(Duration::from_millis(50)));
    let mut dispatcher = create_dispatcher(source.clone(), Sinks::default(), 2);

    let stats = dispatcher
        .run(ids(&["a", "b", "c", "d", "e", "f"]))
        .await;

    assert_eq!(stats.fetched, 6);
    assert!(source.max_in_flight.load(Ordering::SeqCst) <= 2);
    assert!(source.max_in_flight.load(Ordering::SeqCst) >= 1);
}

#[tokio::test]
async fn test_wider_pool_overlaps_fetches() {
    let source = Arc::new(ScriptedSource::with_delay(Duration::from_millis(100)));
    let mut dispatcher = create_dispatcher(source.clone(), Sinks::default(), 4);

    dispatcher
        .run(ids(&["a", "b", "c", "d", "e", "f", "g", "h"]))
        .await;

    let max = source.max_in_flight.load(Ordering::SeqCst);
    assert!(max <= 4);
    assert!(max >= 2, "expected overlapping fetches, saw {}", max);
}

#[tokio::test]
async fn test_duplicates_are_fetched_once() {
    let source = Arc::new(ScriptedSource::default());
    let mut dispatcher = create_dispatcher(source.clone(), Sinks::default(), 3);

    let stats = dispatcher.run(ids(&["a", "b", "a", "a", "b"])).await;

    assert_eq!(stats.submitted, 5);
    assert_eq!(stats.duplicates, 3);
    assert_eq!(stats.fetched, 2);
    assert_eq!(source.call_count("a"), 1);
    assert_eq!(source.call_count("b"), 1);
}

#[tokio::test]
async fn test_one_failure_does_not_affect_others() {
    let source = Arc::new(
        ScriptedSource::default().fail("bad", vec![FetchError::HttpStatus(404)]),
    );
    let store = Arc::new(SqliteStore::new_in_memory().unwrap());
    let sinks = Sinks {
        store: Some(store.clone()),
        ..Default::default()
    };
    let mut dispatcher = create_dispatcher(source.clone(), sinks, 2);

    let stats = dispatcher.run(ids(&["a", "bad", "c"])).await;

    assert_eq!(stats.persisted, 2);
    assert_eq!(stats.failed, 1);
    assert_eq!(store.count_listings().unwrap(), 2);
    // 404 is not retried
    assert_eq!(source.call_count("bad"), 1);
}

#[tokio::test]
async fn test_untitled_listing_is_rejected() {
    let source = Arc::new(ScriptedSource {
        untitled: vec!["blank".to_string()],
        ..Default::default()
    });
    let store = Arc::new(SqliteStore::new_in_memory().unwrap());
    let sinks = Sinks {
        store: Some(store.clone()),
        ..Default::default()
    };
    let mut dispatcher = create_dispatcher(source, sinks, 2);

    let stats = dispatcher.run(ids(&["blank", "ok"])).await;

    assert_eq!(stats.fetched, 2);
    assert_eq!(stats.rejected, 1);
    assert_eq!(stats.persisted, 1);
    assert!(store.get_listing(&Identifier::from("blank")).unwrap().is_none());
}

#[tokio::test]
async fn test_transient_failure_is_retried() {
    let source = Arc::new(ScriptedSource::default().fail("a", vec![FetchError::Timeout]));
    let mut dispatcher = create_dispatcher(source.clone(), Sinks::default(), 1);

    let stats = dispatcher.run(ids(&["a"])).await;

    assert_eq!(source.call_count("a"), 2);
    assert_eq!(stats.fetched, 1);
    assert_eq!(stats.failed, 0);
}

#[tokio::test]
async fn test_retries_are_bounded() {
    let source = Arc::new(ScriptedSource::default().fail(
        "a",
        vec![
            FetchError::HttpStatus(503),
            FetchError::HttpStatus(503),
            FetchError::HttpStatus(503),
        ],
    ));
    let mut dispatcher = create_dispatcher(source.clone(), Sinks::default(), 1);

    let stats = dispatcher.run(ids(&["a"])).await;

    // One attempt plus max_retries
    assert_eq!(source.call_count("a"), 2);
    assert_eq!(stats.failed, 1);
}

#[tokio::test]
async fn test_rate_limit_skips_item_and_cools_down() {
    let source = Arc::new(ScriptedSource::default().fail("a", vec![FetchError::RateLimited]));
    let mut dispatcher = create_dispatcher(source.clone(), Sinks::default(), 1);

    let stats = dispatcher.run(ids(&["a", "b"])).await;

    assert_eq!(stats.rate_limited, 1);
    assert_eq!(stats.fetched, 1);
    // Skipped, not retried
    assert_eq!(source.call_count("a"), 1);

    let gap = source.call_time("b").duration_since(source.call_time("a"));
    assert!(gap >= Duration::from_millis(90), "cooldown not applied: {:?}", gap);
}

#[tokio::test]
async fn test_cooldown_holds_back_a_worker_already_at_the_gate() {
    // "b" queues at the gate while "a" is still in flight and then gets a 429
    let source = Arc::new(
        ScriptedSource::with_delay(Duration::from_millis(50))
            .fail("a", vec![FetchError::RateLimited]),
    );
    let limiter = RateLimiter::new(Duration::from_millis(200), Duration::from_millis(200)).shared();
    let settings = DispatcherSettings {
        cooldown: Duration::from_secs(1),
        ..quick_settings(2)
    };
    let mut dispatcher = Dispatcher::new(source.clone(), limiter, Sinks::default(), settings);

    let stats = dispatcher.run(ids(&["a", "b"])).await;

    assert_eq!(stats.rate_limited, 1);
    assert_eq!(stats.fetched, 1);
    assert!(source.max_in_flight.load(Ordering::SeqCst) >= 1);

    let gap = source.call_time("b").duration_since(source.call_time("a"));
    assert!(
        gap >= Duration::from_millis(900),
        "fetch passed the gate {:?} after the rate limit",
        gap
    );
}

#[tokio::test]
async fn test_emit_rehosts_images_and_indexes() {
    let source = Arc::new(ScriptedSource::default());
    let store = Arc::new(SqliteStore::new_in_memory().unwrap());
    let index = Arc::new(RecordingIndex::default());
    let sinks = Sinks {
        store: Some(store.clone()),
        search_index: Some(index.clone()),
        object_storage: Some(Arc::new(FakeStorage)),
        json_dir: None,
        max_images: 5,
    };
    let mut dispatcher = create_dispatcher(source, sinks, 1);

    let stats = dispatcher.run(ids(&["AaB1"])).await;
    assert_eq!(stats.persisted, 1);

    let public = vec!["https://cdn.example.com/AaB1/0.jpg".to_string()];
    let stored = store.get_listing(&Identifier::from("AaB1")).unwrap().unwrap();
    assert_eq!(stored.image_urls, public);

    let indexed = index.indexed.lock().unwrap();
    assert_eq!(indexed.len(), 1);
    assert_eq!(indexed[0].image_urls, public);
    assert_eq!(indexed[0].title, "Listing AaB1");
}

#[tokio::test]
async fn test_persist_failure_counts_as_failed() {
    let source = Arc::new(ScriptedSource::default());
    let index = Arc::new(RecordingIndex::default());
    let sinks = Sinks {
        store: Some(Arc::new(FailingStore)),
        search_index: Some(index.clone()),
        ..Default::default()
    };
    let mut dispatcher = create_dispatcher(source, sinks, 1);

    let stats = dispatcher.run(ids(&["a"])).await;

    assert_eq!(stats.fetched, 1);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.persisted, 0);
    assert!(index.indexed.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_shutdown_abandons_in_flight_items() {
    let source = Arc::new(ScriptedSource::with_delay(Duration::from_secs(5)));
    let mut dispatcher = create_dispatcher(source, Sinks::default(), 2);

    let started = Instant::now();
    let stats = dispatcher
        .run_until(
            ids(&["a", "b", "c"]),
            tokio::time::sleep(Duration::from_millis(50)),
        )
        .await;

    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(stats.submitted, 3);
    assert_eq!(stats.fetched, 0);
}
