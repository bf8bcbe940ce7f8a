//! Crawl dispatch
//!
//! The [`Dispatcher`] takes identifiers, drops the ones it has already seen
//! and runs fetch → extract → assemble → emit for each of the rest on a
//! bounded pool of tasks. One item failing never affects another; every
//! worker reports an [`ItemOutcome`] which the run folds into [`CrawlStats`].

use crate::assemble::assemble;
use crate::config::CrawlerConfig;
use crate::crawler::fetcher::{DetailSource, FetchError};
use crate::crawler::limiter::{random_between, SharedLimiter};
use crate::extract::extract_fields;
use crate::model::{CanonicalRecord, Identifier, RawDetailDocument};
use crate::output::{select_images, CrawlStats, ItemOutcome, ObjectStorage, SearchIndex};
use crate::storage::ListingStore;
use std::collections::HashSet;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Base of the linear backoff between retries of a transient failure
const RETRY_BACKOFF: Duration = Duration::from_secs(1);

/// Worker pool tuning
#[derive(Debug, Clone)]
pub struct DispatcherSettings {
    /// Maximum number of items in flight
    pub concurrency: usize,

    /// Bounds of the pause a worker takes after each item
    pub item_delay_min: Duration,
    pub item_delay_max: Duration,

    /// Pause applied to the host after a rate-limit signal
    pub cooldown: Duration,

    /// Retries for transient fetch failures
    pub max_retries: u32,

    /// Retry `n` waits `n * retry_backoff`
    pub retry_backoff: Duration,
}

impl DispatcherSettings {
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            concurrency: config.max_concurrent_fetches as usize,
            item_delay_min: Duration::from_millis(config.item_delay_min_ms),
            item_delay_max: Duration::from_millis(config.item_delay_max_ms),
            cooldown: Duration::from_millis(config.rate_limit_cooldown_ms),
            max_retries: config.max_retries,
            retry_backoff: RETRY_BACKOFF,
        }
    }
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        Self::from_config(&CrawlerConfig::default())
    }
}

/// Downstream collaborators a record is emitted to
///
/// Every sink is optional; with none configured the dispatcher only
/// extracts and validates.
#[derive(Clone)]
pub struct Sinks {
    pub store: Option<Arc<dyn ListingStore>>,
    pub search_index: Option<Arc<dyn SearchIndex>>,
    pub object_storage: Option<Arc<dyn ObjectStorage>>,

    /// Directory receiving `{identifier}.json` per record
    pub json_dir: Option<PathBuf>,

    /// Maximum images re-hosted per record
    pub max_images: usize,
}

impl Default for Sinks {
    fn default() -> Self {
        Self {
            store: None,
            search_index: None,
            object_storage: None,
            json_dir: None,
            max_images: 5,
        }
    }
}

/// Bounded, deduplicating crawl dispatcher
///
/// The seen-set lives as long as the dispatcher, so identifiers submitted
/// across several [`Dispatcher::run`] calls are still processed once.
pub struct Dispatcher {
    source: Arc<dyn DetailSource>,
    limiter: SharedLimiter,
    sinks: Arc<Sinks>,
    settings: DispatcherSettings,
    seen: HashSet<Identifier>,
}

impl Dispatcher {
    pub fn new(
        source: Arc<dyn DetailSource>,
        limiter: SharedLimiter,
        sinks: Sinks,
        settings: DispatcherSettings,
    ) -> Self {
        Self {
            source,
            limiter,
            sinks: Arc::new(sinks),
            settings,
            seen: HashSet::new(),
        }
    }

    pub fn has_seen(&self, identifier: &Identifier) -> bool {
        self.seen.contains(identifier)
    }

    /// Processes every identifier to completion
    pub async fn run<I>(&mut self, identifiers: I) -> CrawlStats
    where
        I: IntoIterator<Item = Identifier>,
    {
        self.run_until(identifiers, std::future::pending::<()>()).await
    }

    /// Processes identifiers until done or until `shutdown` resolves
    ///
    /// On shutdown the remaining tasks are aborted and drained; items that
    /// had already finished are still counted.
    pub async fn run_until<I, F>(&mut self, identifiers: I, shutdown: F) -> CrawlStats
    where
        I: IntoIterator<Item = Identifier>,
        F: Future<Output = ()>,
    {
        let mut stats = CrawlStats::default();
        let semaphore = Arc::new(Semaphore::new(self.settings.concurrency.max(1)));
        let mut workers = JoinSet::new();

        for identifier in identifiers {
            stats.submitted += 1;

            if identifier.is_empty() {
                tracing::warn!("Skipping blank identifier");
                stats.rejected += 1;
                continue;
            }
            if !self.seen.insert(identifier.clone()) {
                tracing::debug!(id = %identifier, "Skipping duplicate identifier");
                stats.duplicates += 1;
                continue;
            }

            let worker = Worker {
                source: self.source.clone(),
                limiter: self.limiter.clone(),
                sinks: self.sinks.clone(),
                settings: self.settings.clone(),
            };
            let semaphore = semaphore.clone();

            workers.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return ItemOutcome::FetchFailed;
                };
                let outcome = worker.process(&identifier).await;
                tokio::time::sleep(random_between(
                    worker.settings.item_delay_min,
                    worker.settings.item_delay_max,
                ))
                .await;
                outcome
            });
        }

        tracing::info!(
            "Dispatching {} identifiers ({} duplicates skipped)",
            workers.len(),
            stats.duplicates
        );

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                joined = workers.join_next() => match joined {
                    Some(Ok(outcome)) => stats.record(outcome),
                    Some(Err(e)) => {
                        tracing::error!("Worker task failed: {}", e);
                        stats.failed += 1;
                    }
                    None => break,
                },
                _ = &mut shutdown => {
                    tracing::warn!("Shutdown requested, abandoning {} items", workers.len());
                    workers.abort_all();
                    while let Some(joined) = workers.join_next().await {
                        if let Ok(outcome) = joined {
                            stats.record(outcome);
                        }
                    }
                    break;
                }
            }
        }

        tracing::info!(
            "Run finished: {} fetched, {} persisted, {} rejected, {} failed, {} rate limited",
            stats.fetched,
            stats.persisted,
            stats.rejected,
            stats.failed,
            stats.rate_limited
        );
        stats
    }
}

/// Everything one spawned task needs to process an identifier
struct Worker {
    source: Arc<dyn DetailSource>,
    limiter: SharedLimiter,
    sinks: Arc<Sinks>,
    settings: DispatcherSettings,
}

impl Worker {
    async fn process(&self, identifier: &Identifier) -> ItemOutcome {
        let raw = match self.fetch_with_retries(identifier).await {
            Ok(raw) => raw,
            Err(outcome) => return outcome,
        };

        let fields = extract_fields(&raw);
        drop(raw);

        let record = match assemble(fields) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(id = %identifier, "Rejected listing: {}", e);
                return ItemOutcome::Rejected;
            }
        };

        self.emit(record).await
    }

    /// Fetches through the rate limiter, retrying transient failures
    ///
    /// A rate-limit signal puts the host into cooldown and skips the item.
    async fn fetch_with_retries(
        &self,
        identifier: &Identifier,
    ) -> Result<RawDetailDocument, ItemOutcome> {
        let mut attempt = 0;

        loop {
            self.limiter.wait().await;

            match self.source.fetch(identifier).await {
                Ok(raw) => return Ok(raw),
                Err(FetchError::RateLimited) => {
                    self.limiter.cool_down(self.settings.cooldown);
                    tracing::warn!(id = %identifier, "Skipping rate-limited listing");
                    return Err(ItemOutcome::RateLimited);
                }
                Err(e) if e.is_transient() && attempt < self.settings.max_retries => {
                    attempt += 1;
                    let backoff = self.settings.retry_backoff * attempt;
                    tracing::debug!(
                        id = %identifier,
                        "Fetch failed ({}), retry {}/{} in {:?}",
                        e,
                        attempt,
                        self.settings.max_retries,
                        backoff
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => {
                    tracing::warn!(id = %identifier, "Fetch failed: {}", e);
                    return Err(ItemOutcome::FetchFailed);
                }
            }
        }
    }

    /// JSON dump → store → image re-hosting → search index
    async fn emit(&self, mut record: CanonicalRecord) -> ItemOutcome {
        let sinks = &self.sinks;

        if let Some(dir) = &sinks.json_dir {
            if let Err(e) = write_json(dir, &record).await {
                tracing::warn!(id = %record.identifier, "Failed to write JSON dump: {}", e);
            }
        }

        let mut outcome = ItemOutcome::Emitted;
        let mut listing_id = None;
        if let Some(store) = &sinks.store {
            match store.upsert(&record).await {
                Ok(id) => {
                    listing_id = id;
                    outcome = ItemOutcome::Persisted;
                }
                Err(e) => {
                    tracing::warn!(id = %record.identifier, "Failed to persist listing: {}", e);
                    return ItemOutcome::PersistFailed;
                }
            }
        }

        if let Some(storage) = &sinks.object_storage {
            let selected = select_images(&record.image_urls, sinks.max_images);
            if !selected.is_empty() {
                let public_urls = storage.rehost(&selected, &record.identifier).await;
                if !public_urls.is_empty() {
                    if let (Some(store), Some(id)) = (&sinks.store, listing_id) {
                        if let Err(e) = store.attach_images(id, &public_urls).await {
                            tracing::warn!(id = %record.identifier, "Failed to attach images: {}", e);
                        }
                    }
                    record.image_urls = public_urls;
                }
            }
        }

        if let Some(index) = &sinks.search_index {
            if let Err(e) = index.index(&record).await {
                tracing::warn!(id = %record.identifier, "Failed to index listing: {}", e);
            }
        }

        tracing::info!(id = %record.identifier, "Processed listing: {}", record.title);
        outcome
    }
}

/// Writes `{dir}/{identifier}.json`
async fn write_json(dir: &Path, record: &CanonicalRecord) -> std::io::Result<()> {
    tokio::fs::create_dir_all(dir).await?;
    let body = serde_json::to_vec_pretty(record)?;
    tokio::fs::write(dir.join(json_file_name(&record.identifier)), body).await
}

/// File name safe for any identifier
fn json_file_name(identifier: &Identifier) -> String {
    let stem: String = identifier
        .as_str()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!("{}.json", stem)
}
