use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::filter::{Facet, SearchQuery, StructureLevel};
use crate::model::RecordPatch;

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    /// Directory holding the record store.
    #[arg(long, global = true, default_value = "cellar-data")]
    pub data_dir: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch a wine listing page and print the normalized fields.
    Scrape(ScrapeArgs),
    /// Print stored records matching the given filters.
    List(ListArgs),
    Add(AddArgs),
    SetQuantity(SetQuantityArgs),
    Delete(DeleteArgs),
    /// Re-scrape every record that has a source url.
    Refresh,
    /// Bottle counts per tag for one facet.
    Tags(TagsArgs),
}

#[derive(Debug, Args)]
pub struct ScrapeArgs {
    /// Wine listing URL (must be http/https).
    #[arg(long)]
    pub url: String,
}

#[derive(Debug, Args)]
pub struct ListArgs {
    /// Accent-insensitive text search over the descriptive fields.
    #[arg(long, default_value = "")]
    pub search: String,

    #[arg(long, default_value = "")]
    pub color: String,

    #[arg(long, default_value = "")]
    pub food: String,

    #[arg(long, default_value = "")]
    pub grape: String,

    #[arg(long, default_value = "")]
    pub taste: String,

    #[arg(long, default_value = "")]
    pub location: String,

    #[arg(long, value_enum)]
    pub sweetness: Option<StructureLevel>,

    #[arg(long, value_enum)]
    pub tannin: Option<StructureLevel>,

    #[arg(long, value_enum)]
    pub acidity: Option<StructureLevel>,

    #[arg(long, value_enum)]
    pub fizziness: Option<StructureLevel>,

    #[arg(long, value_enum)]
    pub intensity: Option<StructureLevel>,
}

impl From<ListArgs> for SearchQuery {
    fn from(args: ListArgs) -> Self {
        Self {
            search: args.search,
            color: args.color,
            food: args.food,
            grape: args.grape,
            taste: args.taste,
            location: args.location,
            sweetness: args.sweetness,
            tannin: args.tannin,
            acidity: args.acidity,
            fizziness: args.fizziness,
            intensity: args.intensity,
        }
    }
}

/// Add a record. A lone `--url` is filled in from the listing page.
#[derive(Debug, Args)]
pub struct AddArgs {
    #[arg(long)]
    pub url: Option<String>,

    /// Scrape `--url` even when other fields are given.
    #[arg(long, requires = "url")]
    pub scrape: bool,

    #[arg(long)]
    pub name: Option<String>,

    #[arg(long)]
    pub winery: Option<String>,

    #[arg(long)]
    pub region: Option<String>,

    #[arg(long)]
    pub year: Option<i32>,

    #[arg(long)]
    pub color: Option<String>,

    #[arg(long)]
    pub quantity: Option<u32>,

    #[arg(long)]
    pub price: Option<f64>,

    /// Where the bottles sit in the cellar.
    #[arg(long)]
    pub location: Option<String>,

    #[arg(long)]
    pub description: Option<String>,

    /// Grape variety; repeat for blends.
    #[arg(long = "grape")]
    pub grapes: Vec<String>,

    /// Food pairing; repeatable.
    #[arg(long = "food")]
    pub foods: Vec<String>,
}

impl AddArgs {
    pub fn patch(&self) -> RecordPatch {
        let list = |values: &Vec<String>| (!values.is_empty()).then(|| values.clone());
        RecordPatch {
            url: self.url.clone(),
            quantity: self.quantity,
            name: self.name.clone(),
            description: self.description.clone(),
            region: self.region.clone(),
            winery: self.winery.clone(),
            color: self.color.clone(),
            year: self.year,
            price: self.price,
            location: self.location.clone(),
            grapes: list(&self.grapes),
            foods: list(&self.foods),
            ..RecordPatch::default()
        }
    }
}

#[derive(Debug, Args)]
pub struct SetQuantityArgs {
    #[arg(long)]
    pub id: String,

    #[arg(long)]
    pub quantity: u32,
}

#[derive(Debug, Args)]
pub struct DeleteArgs {
    #[arg(long)]
    pub id: String,
}

#[derive(Debug, Args)]
pub struct TagsArgs {
    #[arg(long, value_enum)]
    pub facet: Facet,
}
