use std::cmp::Ordering;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use serde::Serialize;
use tokio::sync::{Mutex, Semaphore};

use crate::fetch::{FetchError, WineSource};
use crate::filter::{self, Facet, SearchQuery, TagCount};
use crate::model::{
    RecordInput, RecordPatch, ScrapedWine, WineRecord, new_record_id, next_update_time,
};
use crate::normalize::normalize_wine_page;
use crate::store::RecordStore;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error(
        "could not retrieve wine data from {url}; the site may have blocked the request, try again later"
    )]
    SourceUnreachable {
        url: String,
        #[source]
        cause: Option<FetchError>,
    },
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RefreshReport {
    pub refreshed: usize,
    /// Source reachable but yielded no data (challenge page, no marker).
    pub unchanged: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RefreshOutcome {
    Refreshed,
    Unchanged,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogSummary {
    pub records: usize,
    pub bottles: u64,
    pub last_added: Option<DateTime<Utc>>,
}

/// Shared CRUD and refresh orchestration over one record store.
pub struct Catalog {
    store: Arc<dyn RecordStore>,
    source: Arc<dyn WineSource>,
    refresh_limit: Option<Arc<Semaphore>>,
    /// Held across every get/apply/put so concurrent patches of one record
    /// cannot overwrite each other.
    writes: Mutex<()>,
}

impl Catalog {
    pub fn new(store: Arc<dyn RecordStore>, source: Arc<dyn WineSource>) -> Self {
        Self {
            store,
            source,
            refresh_limit: None,
            writes: Mutex::new(()),
        }
    }

    /// Caps how many refresh fetches run at once; unlimited by default.
    pub fn with_refresh_concurrency(mut self, limit: Option<usize>) -> Self {
        self.refresh_limit = limit.map(|n| Arc::new(Semaphore::new(n.max(1))));
        self
    }

    /// Records newest first, with empty (zero-quantity) holdings last.
    pub async fn list(&self) -> Result<Vec<WineRecord>, CatalogError> {
        let mut records = self.store.list().await?;
        records.sort_by(stock_order);
        Ok(records)
    }

    pub async fn search(&self, query: &SearchQuery) -> Result<Vec<WineRecord>, CatalogError> {
        let records = self.list().await?;
        if query.is_empty() {
            return Ok(records);
        }
        Ok(filter::filter_records(&records, query)
            .into_iter()
            .cloned()
            .collect())
    }

    pub async fn tags(&self, facet: Facet) -> Result<Vec<TagCount>, CatalogError> {
        let records = self.list().await?;
        let counts = filter::tag_counts(&records, |record| facet.values(record));
        Ok(filter::ranked_tags(counts))
    }

    pub async fn summary(&self) -> Result<CatalogSummary, CatalogError> {
        let records = self.store.list().await?;
        Ok(CatalogSummary {
            records: records.len(),
            bottles: records.iter().map(|r| u64::from(r.quantity)).sum(),
            last_added: records.iter().map(|r| r.created_at).max(),
        })
    }

    pub async fn get(&self, id: &str) -> Result<Option<WineRecord>, CatalogError> {
        Ok(self.store.get(id).await?)
    }

    /// Persists a new record. A bare url (or `scrape: true`) is filled from the
    /// source page and fails when the page yields nothing.
    pub async fn create(&self, input: RecordInput) -> Result<WineRecord, CatalogError> {
        let RecordInput {
            mut fields,
            html,
            scrape,
        } = input;

        if let Some(html) = html.as_deref() {
            let url = fields.url.clone().unwrap_or_default();
            if let Some(scraped) = normalize_wine_page(html, &url) {
                fields = fields.overlay(scraped.into());
            }
        } else if scrape || fields.is_url_only() {
            let url = fields.url.clone().unwrap_or_default();
            let scraped = self.scrape(&url).await?;
            fields = fields.overlay(scraped.into());
        }

        let mut record = WineRecord::new(new_record_id(), Utc::now());
        fields.apply(&mut record);

        self.store.put(&record).await?;
        tracing::info!(id = %record.id, name = %record.name, "created wine record");
        Ok(record)
    }

    /// Applies `input` onto the stored record, inserting it when `id` is unknown.
    /// Any scrape happens before the write lock is taken.
    pub async fn update(&self, id: &str, input: RecordInput) -> Result<WineRecord, CatalogError> {
        let RecordInput {
            mut fields,
            html,
            scrape,
        } = input;

        if html.is_some() || scrape {
            let url = match fields.url.clone() {
                Some(url) => url,
                None => self
                    .store
                    .get(id)
                    .await?
                    .map(|record| record.url)
                    .unwrap_or_default(),
            };
            if let Some(html) = html.as_deref() {
                if let Some(scraped) = normalize_wine_page(html, &url) {
                    fields = fields.overlay(scraped.into());
                }
            } else {
                let scraped = self.scrape(&url).await?;
                fields = fields.overlay(scraped.into());
            }
        }

        let _write = self.writes.lock().await;
        let existing = self.store.get(id).await?;
        let previous_update = existing.as_ref().map(|r| r.updated_at);
        let mut record = existing.unwrap_or_else(|| {
            tracing::debug!(id, "update of unknown record; inserting");
            WineRecord::new(id, Utc::now())
        });

        fields.apply(&mut record);
        if let Some(previous) = previous_update {
            record.updated_at = next_update_time(previous);
        }

        self.store.put(&record).await?;
        tracing::debug!(id, "updated wine record");
        Ok(record)
    }

    pub async fn set_quantity(&self, id: &str, quantity: u32) -> Result<WineRecord, CatalogError> {
        self.update(id, RecordPatch::quantity(quantity).into()).await
    }

    /// Deleting an unknown id is not an error.
    pub async fn delete(&self, id: &str) -> Result<bool, CatalogError> {
        let _write = self.writes.lock().await;
        let removed = self.store.delete(id).await?;
        tracing::info!(id, removed, "deleted wine record");
        Ok(removed)
    }

    /// Re-scrapes every record with a url. Each record is independent: one
    /// failure is logged and counted without affecting the others.
    pub async fn refresh_all(&self) -> Result<RefreshReport, CatalogError> {
        let records = self.list().await?;
        let tasks = records
            .into_iter()
            .filter(|record| !record.url.trim().is_empty())
            .map(|record| self.refresh_one(record));
        let outcomes = join_all(tasks).await;

        let mut report = RefreshReport::default();
        for outcome in outcomes {
            match outcome {
                RefreshOutcome::Refreshed => report.refreshed += 1,
                RefreshOutcome::Unchanged => report.unchanged += 1,
                RefreshOutcome::Failed => report.failed += 1,
            }
        }
        tracing::info!(?report, "refresh finished");
        Ok(report)
    }

    async fn refresh_one(&self, record: WineRecord) -> RefreshOutcome {
        let _permit = match &self.refresh_limit {
            Some(limit) => match Arc::clone(limit).acquire_owned().await {
                Ok(permit) => Some(permit),
                Err(err) => {
                    tracing::error!(id = %record.id, ?err, "refresh limiter closed");
                    return RefreshOutcome::Failed;
                }
            },
            None => None,
        };

        let scraped = match self.source.fetch_wine(&record.url).await {
            Ok(Some(scraped)) => scraped,
            Ok(None) => {
                tracing::warn!(id = %record.id, url = %record.url, "no data from source; keeping record");
                return RefreshOutcome::Unchanged;
            }
            Err(err) => {
                tracing::error!(id = %record.id, url = %record.url, ?err, "refresh fetch failed");
                return RefreshOutcome::Failed;
            }
        };

        match self
            .update(&record.id, RecordPatch::from(scraped).into())
            .await
        {
            Ok(_) => RefreshOutcome::Refreshed,
            Err(err) => {
                tracing::error!(id = %record.id, ?err, "refresh update failed");
                RefreshOutcome::Failed
            }
        }
    }

    async fn scrape(&self, url: &str) -> Result<ScrapedWine, CatalogError> {
        match self.source.fetch_wine(url).await {
            Ok(Some(scraped)) => Ok(scraped),
            Ok(None) => Err(CatalogError::SourceUnreachable {
                url: url.to_owned(),
                cause: None,
            }),
            Err(err) => Err(CatalogError::SourceUnreachable {
                url: url.to_owned(),
                cause: Some(err),
            }),
        }
    }
}

/// Strict comparator: empty holdings after any stocked one, otherwise equal.
fn stock_order(a: &WineRecord, b: &WineRecord) -> Ordering {
    (a.quantity == 0).cmp(&(b.quantity == 0))
}
