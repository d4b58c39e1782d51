use chrono::Utc;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::MissedTickBehavior;

use super::fetcher::{FeedFetcher, FetchError};
use super::ingest::{ingest_items, IngestReport};
use crate::storage::{Database, DatabaseError, Feed};

/// Reasons a single scrape cycle can fail. None of them stop the loop.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("no feeds available")]
    NoFeeds,
    #[error("fetching {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: FetchError,
    },
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// What one successful cycle did.
#[derive(Debug, Clone)]
pub struct CycleReport {
    /// The claimed feed, carrying its new `last_fetched_at`
    pub feed: Feed,
    /// Channel title reported by the document
    pub channel_title: String,
    pub ingest: IngestReport,
}

/// Pick the least recently fetched feed and mark it fetched now.
///
/// The mark lands before any network I/O, so a feed that fails to fetch
/// still moves to the back of the rotation instead of being retried forever.
pub async fn select_next_feed(db: &Database) -> Result<Feed, SchedulerError> {
    db.claim_next_feed(Utc::now())
        .await?
        .ok_or(SchedulerError::NoFeeds)
}

/// Run one cycle: select a feed, fetch it, store its items.
pub async fn scrape_once(
    db: &Database,
    fetcher: &FeedFetcher,
) -> Result<CycleReport, SchedulerError> {
    scrape_claimed(db, fetcher, |_| {}).await
}

/// [`scrape_once`], calling `on_claim` between the claim and the fetch.
async fn scrape_claimed<F>(
    db: &Database,
    fetcher: &FeedFetcher,
    on_claim: F,
) -> Result<CycleReport, SchedulerError>
where
    F: FnOnce(&Feed),
{
    let feed = select_next_feed(db).await?;
    tracing::info!(feed = %feed.name, url = %feed.url, "Fetching feed");
    on_claim(&feed);

    let document = fetcher
        .fetch(&feed.url)
        .await
        .map_err(|source| SchedulerError::Fetch {
            url: feed.url.clone(),
            source,
        })?;

    let ingest = ingest_items(db, feed.id, &document.channel.items).await;
    tracing::info!(
        feed = %feed.name,
        inserted = ingest.inserted,
        duplicates = ingest.duplicates,
        failed = ingest.failed,
        "Feed ingested"
    );

    Ok(CycleReport {
        feed,
        channel_title: document.channel.title,
        ingest,
    })
}

/// Progress reported to a [`Scheduler::run`] observer.
#[derive(Debug)]
pub enum CycleEvent<'a> {
    /// A feed was claimed and is about to be fetched
    Claimed(&'a Feed),
    /// The cycle ended, successfully or not
    Finished(&'a Result<CycleReport, SchedulerError>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Waiting for the next tick
    Idle,
    /// A cycle is in flight
    Fetching,
}

/// Totals across a scheduler run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub cycles: usize,
    pub failed_cycles: usize,
    pub posts_inserted: usize,
}

/// Repeats [`scrape_once`] at a fixed interval until shut down.
///
/// The first cycle starts immediately. Cycle failures are logged and
/// reported to the observer; they never end the run.
pub struct Scheduler {
    db: Database,
    fetcher: FeedFetcher,
    interval: Duration,
    state: SchedulerState,
}

impl Scheduler {
    pub fn new(db: Database, fetcher: FeedFetcher, interval: Duration) -> Self {
        Self {
            db,
            fetcher,
            interval,
            state: SchedulerState::Idle,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Run until `shutdown` resolves.
    ///
    /// `observe` hears when a feed is claimed and when each cycle ends. A
    /// shutdown that arrives mid-cycle abandons the cycle; posts already
    /// stored stay stored.
    pub async fn run<S, F>(&mut self, shutdown: S, mut observe: F) -> RunSummary
    where
        S: Future<Output = ()>,
        F: FnMut(CycleEvent<'_>),
    {
        let mut summary = RunSummary::default();
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = ticker.tick() => {}
            }

            self.state = SchedulerState::Fetching;
            let outcome = tokio::select! {
                biased;
                _ = &mut shutdown => {
                    tracing::info!("Shutdown requested mid-cycle");
                    self.state = SchedulerState::Idle;
                    break;
                }
                outcome = scrape_claimed(&self.db, &self.fetcher, |feed| {
                    observe(CycleEvent::Claimed(feed))
                }) => outcome,
            };
            self.state = SchedulerState::Idle;

            summary.cycles += 1;
            match &outcome {
                Ok(report) => summary.posts_inserted += report.ingest.inserted,
                Err(e) => {
                    summary.failed_cycles += 1;
                    tracing::warn!(error = %e, "Scrape cycle failed");
                }
            }
            observe(CycleEvent::Finished(&outcome));
        }

        summary
    }
}
