//! Run statistics
//!
//! This module provides the per-run counters the dispatcher accumulates and
//! their console rendering.

use serde::Serialize;

/// Terminal state of one dispatched identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    /// Record assembled and written to the store
    Persisted,
    /// Record assembled and handed to the non-persistent sinks only
    Emitted,
    /// Fetched, but failed validation
    Rejected,
    /// The fetch failed after any retries
    FetchFailed,
    /// Fetched and assembled, but the store refused it
    PersistFailed,
    /// The remote host answered with a rate-limit signal
    RateLimited,
}

impl ItemOutcome {
    /// Whether the detail document was retrieved
    pub fn was_fetched(&self) -> bool {
        matches!(
            self,
            ItemOutcome::Persisted
                | ItemOutcome::Emitted
                | ItemOutcome::Rejected
                | ItemOutcome::PersistFailed
        )
    }
}

/// Counters for one dispatcher run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CrawlStats {
    /// Identifiers handed to the dispatcher, duplicates included
    pub submitted: u64,

    /// Submissions skipped because the identifier was already seen this run
    pub duplicates: u64,

    /// Detail documents retrieved
    pub fetched: u64,

    /// Records written to the store
    pub persisted: u64,

    /// Records rejected by validation
    pub rejected: u64,

    /// Items that failed to fetch or persist
    pub failed: u64,

    /// Items skipped because of a rate-limit signal
    pub rate_limited: u64,
}

impl CrawlStats {
    /// Folds one item outcome into the counters
    pub fn record(&mut self, outcome: ItemOutcome) {
        if outcome.was_fetched() {
            self.fetched += 1;
        }

        match outcome {
            ItemOutcome::Persisted => self.persisted += 1,
            ItemOutcome::Emitted => {}
            ItemOutcome::Rejected => self.rejected += 1,
            ItemOutcome::FetchFailed | ItemOutcome::PersistFailed => self.failed += 1,
            ItemOutcome::RateLimited => self.rate_limited += 1,
        }
    }

    /// Identifiers actually dispatched (submissions minus duplicates)
    pub fn dispatched(&self) -> u64 {
        self.submitted - self.duplicates
    }
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_stats(stats: &CrawlStats) {
    println!("=== Crawl Statistics ===\n");

    println!("Overview:");
    println!("  Identifiers submitted: {}", stats.submitted);
    println!("  Duplicates skipped: {}", stats.duplicates);
    println!("  Detail documents fetched: {}", stats.fetched);
    println!();

    println!("Outcomes:");
    let dispatched = stats.dispatched();
    for (label, count) in [
        ("Persisted", stats.persisted),
        ("Rejected", stats.rejected),
        ("Failed", stats.failed),
        ("Rate limited", stats.rate_limited),
    ] {
        let percentage = if dispatched > 0 {
            (count as f64 / dispatched as f64) * 100.0
        } else {
            0.0
        };
        println!("  {}: {} ({:.1}%)", label, count, percentage);
    }
}
