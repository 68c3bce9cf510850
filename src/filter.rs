use std::collections::{BTreeMap, BTreeSet};

use serde::de::{Error as _, Unexpected};
use serde::{Deserialize, Deserializer, Serialize};
use unicode_normalization::UnicodeNormalization as _;

use crate::model::{WineRecord, WineStructure};

/// Scores strictly below this are "low", the rest "high".
pub const STRUCTURE_MIDPOINT: f64 = 2.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StructureLevel {
    Low,
    High,
}

impl StructureLevel {
    /// An absent score never matches either level.
    pub fn matches(self, score: Option<f64>) -> bool {
        match (self, score) {
            (_, None) => false,
            (Self::Low, Some(score)) => score < STRUCTURE_MIDPOINT,
            (Self::High, Some(score)) => score >= STRUCTURE_MIDPOINT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructureTrait {
    Sweetness,
    Tannin,
    Acidity,
    Fizziness,
    Intensity,
}

impl StructureTrait {
    pub fn score(self, structure: &WineStructure) -> Option<f64> {
        match self {
            Self::Sweetness => structure.sweetness,
            Self::Tannin => structure.tannin,
            Self::Acidity => structure.acidity,
            Self::Fizziness => structure.fizziness,
            Self::Intensity => structure.intensity,
        }
    }
}

/// Client-side browsing state. Empty strings and `None` levels are unset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchQuery {
    pub search: String,
    pub color: String,
    pub food: String,
    pub grape: String,
    pub taste: String,
    pub location: String,
    #[serde(deserialize_with = "level_or_unset")]
    pub sweetness: Option<StructureLevel>,
    #[serde(deserialize_with = "level_or_unset")]
    pub tannin: Option<StructureLevel>,
    #[serde(deserialize_with = "level_or_unset")]
    pub acidity: Option<StructureLevel>,
    #[serde(deserialize_with = "level_or_unset")]
    pub fizziness: Option<StructureLevel>,
    #[serde(deserialize_with = "level_or_unset")]
    pub intensity: Option<StructureLevel>,
}

/// Query strings send an unset facet as `acidity=`; blank means no preference.
fn level_or_unset<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<StructureLevel>, D::Error> {
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "" => Ok(None),
        "low" => Ok(Some(StructureLevel::Low)),
        "high" => Ok(Some(StructureLevel::High)),
        _ => Err(D::Error::invalid_value(
            Unexpected::Str(&raw),
            &"\"low\", \"high\" or empty",
        )),
    }
}

impl SearchQuery {
    fn structure_facets(&self) -> [(StructureTrait, Option<StructureLevel>); 5] {
        [
            (StructureTrait::Sweetness, self.sweetness),
            (StructureTrait::Tannin, self.tannin),
            (StructureTrait::Acidity, self.acidity),
            (StructureTrait::Fizziness, self.fizziness),
            (StructureTrait::Intensity, self.intensity),
        ]
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Lowercases, strips combining diacritics (so "Rosé" == "rose") and trims.
pub fn normalize_text(input: &str) -> String {
    input
        .to_lowercase()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .trim()
        .to_owned()
}

fn is_combining_mark(c: char) -> bool {
    ('\u{0300}'..='\u{036f}').contains(&c)
}

pub fn matches(record: &WineRecord, query: &SearchQuery) -> bool {
    matches_search(record, &query.search)
        && matches_exact(record.color.as_deref(), &query.color)
        && matches_any(&record.foods, &query.food)
        && matches_any(&record.grapes, &query.grape)
        && matches_any(&record.tastes, &query.taste)
        && (query.location.is_empty() || record.location == query.location)
        && matches_structure(record.structure.as_ref(), query)
}

pub fn filter_records<'a>(records: &'a [WineRecord], query: &SearchQuery) -> Vec<&'a WineRecord> {
    records.iter().filter(|r| matches(r, query)).collect()
}

fn matches_search(record: &WineRecord, search: &str) -> bool {
    let needle = normalize_text(search);
    if needle.is_empty() {
        return true;
    }

    let year = record.year.map(|y| y.to_string());
    [
        Some(record.name.as_str()),
        Some(record.description.as_str()),
        Some(record.region.as_str()),
        Some(record.winery.as_str()),
        year.as_deref(),
        record.apogee.as_deref(),
    ]
    .into_iter()
    .flatten()
    .any(|field| normalize_text(field).contains(&needle))
}

fn matches_exact(value: Option<&str>, facet: &str) -> bool {
    let wanted = normalize_text(facet);
    if wanted.is_empty() {
        return true;
    }
    value.is_some_and(|v| normalize_text(v) == wanted)
}

fn matches_any(values: &[String], facet: &str) -> bool {
    let wanted = normalize_text(facet);
    if wanted.is_empty() {
        return true;
    }
    values.iter().any(|v| normalize_text(v) == wanted)
}

fn matches_structure(structure: Option<&WineStructure>, query: &SearchQuery) -> bool {
    query
        .structure_facets()
        .into_iter()
        .all(|(key, level)| match level {
            None => true,
            Some(level) => level.matches(structure.and_then(|s| key.score(s))),
        })
}

/// Record fields that can be aggregated into facet chips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Facet {
    Color,
    Food,
    Grape,
    Taste,
    Location,
    Region,
    Winery,
}

impl Facet {
    pub fn values(self, record: &WineRecord) -> Vec<&str> {
        match self {
            Self::Color => record.color.as_deref().into_iter().collect(),
            Self::Food => record.foods.iter().map(String::as_str).collect(),
            Self::Grape => record.grapes.iter().map(String::as_str).collect(),
            Self::Taste => record.tastes.iter().map(String::as_str).collect(),
            Self::Location => vec![record.location.as_str()],
            Self::Region => vec![record.region.as_str()],
            Self::Winery => vec![record.winery.as_str()],
        }
    }
}

/// Sums `quantity` per normalized tag. Empty values are skipped and a record
/// counts once per distinct tag.
pub fn tag_counts<'a, F, I>(records: &'a [WineRecord], extract: F) -> BTreeMap<String, u64>
where
    F: Fn(&'a WineRecord) -> I,
    I: IntoIterator<Item = &'a str>,
{
    let mut counts = BTreeMap::new();
    for record in records {
        let tags = extract(record)
            .into_iter()
            .map(normalize_text)
            .filter(|tag| !tag.is_empty())
            .collect::<BTreeSet<_>>();
        for tag in tags {
            *counts.entry(tag).or_insert(0) += u64::from(record.quantity);
        }
    }
    counts
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagCount {
    pub tag: String,
    pub count: u64,
}

/// Most popular first; ties by tag.
pub fn ranked_tags(counts: BTreeMap<String, u64>) -> Vec<TagCount> {
    let mut ranked = counts
        .into_iter()
        .map(|(tag, count)| TagCount { tag, count })
        .collect::<Vec<_>>();
    ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.tag.cmp(&b.tag)));
    ranked
}
