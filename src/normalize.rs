use anyhow::Context as _;
use scraper::{Html, Selector};
use serde_json::Value;

use crate::model::{ScrapedWine, WineColor, WineStructure};

/// Embedded JSON block carrying the listing's structured data.
pub const TOP_SECTION_SELECTOR: &str =
    r#"script[type="application/json"][data-component-name="WinePageTopSection"]"#;

const MAX_FLAVOR_GROUPS: usize = 3;
const MAX_KEYWORDS_PER_GROUP: usize = 3;

/// Extracts a wine from a listing page, or `None` when the page carries no
/// usable structured data. Parse failures are logged, never returned.
pub fn normalize_wine_page(html: &str, url: &str) -> Option<ScrapedWine> {
    let Some(raw) = find_top_section(html) else {
        tracing::warn!(url, "no WinePageTopSection data in page");
        return None;
    };

    match parse_top_section(&raw, url) {
        Ok(wine) => Some(wine),
        Err(err) => {
            tracing::warn!(url, ?err, "failed to parse WinePageTopSection data");
            None
        }
    }
}

fn find_top_section(html: &str) -> Option<String> {
    let selector = Selector::parse(TOP_SECTION_SELECTOR).ok()?;
    let doc = Html::parse_document(html);
    let node = doc.select(&selector).next()?;
    Some(node.text().collect::<String>())
}

fn parse_top_section(raw: &str, url: &str) -> anyhow::Result<ScrapedWine> {
    let data: Value = serde_json::from_str(raw.trim()).context("parse embedded json")?;
    let page = data
        .get("pageInformation")
        .ok_or_else(|| anyhow::anyhow!("missing `pageInformation`"))?;

    Ok(ScrapedWine {
        url: url.to_owned(),
        name: required_str(page, "/vintage/wine/name")?,
        year: page.pointer("/vintage/year").and_then(as_year),
        region: required_str(page, "/vintage/wine/region/name")?,
        winery: required_str(page, "/vintage/wine/winery/name")?,
        estimated_price: page.pointer("/price/amount").and_then(Value::as_f64),
        grapes: names(page.pointer("/vintage/grapes")),
        tastes: flavor_keywords(page.pointer("/tastes/flavor")),
        foods: names(page.pointer("/wine/foods")),
        image_url: page
            .pointer("/vintage/image/variations/bottle_medium")
            .and_then(Value::as_str)
            .filter(|src| !src.trim().is_empty())
            .map(absolute_image_url),
        color: page
            .pointer("/vintage/wine/style/wine_type_id")
            .and_then(Value::as_i64)
            .and_then(WineColor::from_type_id),
        structure: structure(page.pointer("/tastes/structure")),
    })
}

fn required_str(page: &Value, pointer: &str) -> anyhow::Result<String> {
    page.pointer(pointer)
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or_else(|| anyhow::anyhow!("missing `{pointer}`"))
}

fn as_year(value: &Value) -> Option<i32> {
    match value {
        Value::Number(n) => n.as_i64().and_then(|y| i32::try_from(y).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn names(list: Option<&Value>) -> Vec<String> {
    list.and_then(Value::as_array)
        .map(|items| items.iter().filter_map(item_name).collect())
        .unwrap_or_default()
}

fn item_name(item: &Value) -> Option<String> {
    item.get("name").and_then(Value::as_str).map(str::to_owned)
}

fn flavor_keywords(flavor: Option<&Value>) -> Vec<String> {
    let Some(groups) = flavor.and_then(Value::as_array) else {
        return Vec::new();
    };

    groups
        .iter()
        .take(MAX_FLAVOR_GROUPS)
        .filter_map(|group| group.get("primary_keywords").and_then(Value::as_array))
        .flat_map(|keywords| {
            keywords
                .iter()
                .take(MAX_KEYWORDS_PER_GROUP)
                .filter_map(item_name)
        })
        .collect()
}

fn absolute_image_url(src: &str) -> String {
    if src.starts_with("http://") || src.starts_with("https://") {
        src.to_owned()
    } else {
        format!("https:{src}")
    }
}

fn structure(value: Option<&Value>) -> WineStructure {
    let score = |key: &str| value.and_then(|v| v.get(key)).and_then(Value::as_f64);
    WineStructure {
        acidity: score("acidity"),
        fizziness: score("fizziness"),
        intensity: score("intensity"),
        sweetness: score("sweetness"),
        tannin: score("tannin"),
    }
}
