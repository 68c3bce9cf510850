use std::path::Path;
use std::sync::Arc;

use anyhow::Context as _;
use serde::Serialize;

use crate::catalog::Catalog;
use crate::cli::{AddArgs, ListArgs, ScrapeArgs, SetQuantityArgs, TagsArgs};
use crate::config::AppConfig;
use crate::fetch::{FetchSettings, ReqwestWineFetcher, WineSource as _};
use crate::filter::SearchQuery;
use crate::model::{RecordInput, RecordPatch};
use crate::store::LocalFsRecordStore;

/// Catalog over the filesystem store in `data_dir`, fetching with default settings.
pub fn open_catalog(data_dir: &Path, config: &AppConfig) -> anyhow::Result<Catalog> {
    let fetcher = ReqwestWineFetcher::new(FetchSettings::default()).context("build wine fetcher")?;
    let store = LocalFsRecordStore::new(data_dir);
    Ok(Catalog::new(Arc::new(store), Arc::new(fetcher))
        .with_refresh_concurrency(config.refresh_concurrency))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value).context("serialize output")?;
    println!("{json}");
    Ok(())
}

pub async fn scrape(args: ScrapeArgs) -> anyhow::Result<()> {
    let fetcher = ReqwestWineFetcher::new(FetchSettings::default()).context("build wine fetcher")?;
    let scraped = fetcher
        .fetch_wine(&args.url)
        .await
        .with_context(|| format!("fetch {}", args.url))?
        .with_context(|| format!("no wine data found at {}", args.url))?;
    print_json(&RecordPatch::from(scraped))
}

pub async fn list(catalog: &Catalog, args: ListArgs) -> anyhow::Result<()> {
    let records = catalog.search(&SearchQuery::from(args)).await?;
    print_json(&records)
}

pub async fn add(catalog: &Catalog, args: AddArgs) -> anyhow::Result<()> {
    let input = RecordInput {
        fields: args.patch(),
        html: None,
        scrape: args.scrape,
    };
    let record = catalog.create(input).await?;
    print_json(&record)
}

pub async fn set_quantity(catalog: &Catalog, args: SetQuantityArgs) -> anyhow::Result<()> {
    let record = catalog.set_quantity(&args.id, args.quantity).await?;
    print_json(&record)
}

pub async fn delete(catalog: &Catalog, id: &str) -> anyhow::Result<()> {
    let removed = catalog.delete(id).await?;
    print_json(&serde_json::json!({ "id": id, "removed": removed }))
}

pub async fn refresh(catalog: &Catalog) -> anyhow::Result<()> {
    let report = catalog.refresh_all().await?;
    print_json(&report)
}

pub async fn tags(catalog: &Catalog, args: TagsArgs) -> anyhow::Result<()> {
    let tags = catalog.tags(args.facet).await?;
    print_json(&tags)
}
