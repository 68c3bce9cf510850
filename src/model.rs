use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// One cellar holding as persisted by the record store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WineRecord {
    pub id: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub quantity: u32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub winery: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default)]
    pub location: String,
    /// Estimated best-drinking year, or `"unknown"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apogee: Option<String>,
    #[serde(default)]
    pub grapes: Vec<String>,
    #[serde(default)]
    pub tastes: Vec<String>,
    #[serde(default)]
    pub foods: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structure: Option<WineStructure>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WineRecord {
    /// Blank record with creation defaults: one bottle, both timestamps at `now`.
    pub fn new(id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            url: String::new(),
            quantity: 1,
            name: String::new(),
            description: String::new(),
            region: String::new(),
            winery: String::new(),
            color: None,
            year: None,
            price: None,
            estimated_price: None,
            rating: None,
            image_url: None,
            location: String::new(),
            apogee: None,
            grapes: Vec::new(),
            tastes: Vec::new(),
            foods: Vec::new(),
            structure: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Sensory scores on a 0-5 scale. A missing score is unknown, not zero.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WineStructure {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acidity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fizziness: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intensity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sweetness: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tannin: Option<f64>,
}

impl WineStructure {
    pub fn is_empty(&self) -> bool {
        self.acidity.is_none()
            && self.fizziness.is_none()
            && self.intensity.is_none()
            && self.sweetness.is_none()
            && self.tannin.is_none()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum WineColor {
    Red,
    White,
    Champagne,
    #[serde(rename = "Rosé")]
    Rose,
}

impl WineColor {
    /// Maps the wine database's `wine_type_id` code.
    pub fn from_type_id(code: i64) -> Option<Self> {
        match code {
            1 => Some(Self::Red),
            2 => Some(Self::White),
            3 => Some(Self::Champagne),
            4 => Some(Self::Rose),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Red => "Red",
            Self::White => "White",
            Self::Champagne => "Champagne",
            Self::Rose => "Rosé",
        }
    }
}

/// Fields recovered from a wine listing page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScrapedWine {
    pub url: String,
    pub name: String,
    pub year: Option<i32>,
    pub region: String,
    pub winery: String,
    pub estimated_price: Option<f64>,
    pub grapes: Vec<String>,
    pub tastes: Vec<String>,
    pub foods: Vec<String>,
    pub image_url: Option<String>,
    pub color: Option<WineColor>,
    pub structure: WineStructure,
}

/// Typed partial update. `None` leaves the stored field untouched; `id`,
/// `createdAt` and `updatedAt` are not patchable.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct RecordPatch {
    pub url: Option<String>,
    #[serde(deserialize_with = "lenient::quantity")]
    pub quantity: Option<u32>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub region: Option<String>,
    pub winery: Option<String>,
    pub color: Option<String>,
    #[serde(deserialize_with = "lenient::year")]
    pub year: Option<i32>,
    #[serde(deserialize_with = "lenient::decimal")]
    pub price: Option<f64>,
    #[serde(deserialize_with = "lenient::decimal")]
    pub estimated_price: Option<f64>,
    #[serde(deserialize_with = "lenient::decimal")]
    pub rating: Option<f64>,
    pub image_url: Option<String>,
    pub location: Option<String>,
    pub apogee: Option<String>,
    pub grapes: Option<Vec<String>>,
    pub tastes: Option<Vec<String>>,
    pub foods: Option<Vec<String>>,
    pub structure: Option<WineStructure>,
}

impl RecordPatch {
    pub fn quantity(quantity: u32) -> Self {
        Self {
            quantity: Some(quantity),
            ..Self::default()
        }
    }

    /// True when the patch carries a non-empty url and nothing else.
    pub fn is_url_only(&self) -> bool {
        let Some(url) = self.url.as_deref() else {
            return false;
        };
        !url.trim().is_empty()
            && *self
                == Self {
                    url: self.url.clone(),
                    ..Self::default()
                }
    }

    /// Returns a patch where every field set in `other` wins over `self`.
    pub fn overlay(self, other: RecordPatch) -> Self {
        Self {
            url: other.url.or(self.url),
            quantity: other.quantity.or(self.quantity),
            name: other.name.or(self.name),
            description: other.description.or(self.description),
            region: other.region.or(self.region),
            winery: other.winery.or(self.winery),
            color: other.color.or(self.color),
            year: other.year.or(self.year),
            price: other.price.or(self.price),
            estimated_price: other.estimated_price.or(self.estimated_price),
            rating: other.rating.or(self.rating),
            image_url: other.image_url.or(self.image_url),
            location: other.location.or(self.location),
            apogee: other.apogee.or(self.apogee),
            grapes: other.grapes.or(self.grapes),
            tastes: other.tastes.or(self.tastes),
            foods: other.foods.or(self.foods),
            structure: other.structure.or(self.structure),
        }
    }

    pub fn apply(self, record: &mut WineRecord) {
        if let Some(url) = self.url {
            record.url = url;
        }
        if let Some(quantity) = self.quantity {
            record.quantity = quantity;
        }
        if let Some(name) = self.name {
            record.name = name;
        }
        if let Some(description) = self.description {
            record.description = description;
        }
        if let Some(region) = self.region {
            record.region = region;
        }
        if let Some(winery) = self.winery {
            record.winery = winery;
        }
        if self.color.is_some() {
            record.color = self.color;
        }
        if self.year.is_some() {
            record.year = self.year;
        }
        if self.price.is_some() {
            record.price = self.price;
        }
        if self.estimated_price.is_some() {
            record.estimated_price = self.estimated_price;
        }
        if self.rating.is_some() {
            record.rating = self.rating;
        }
        if self.image_url.is_some() {
            record.image_url = self.image_url;
        }
        if let Some(location) = self.location {
            record.location = location;
        }
        if self.apogee.is_some() {
            record.apogee = self.apogee;
        }
        if let Some(grapes) = self.grapes {
            record.grapes = grapes;
        }
        if let Some(tastes) = self.tastes {
            record.tastes = tastes;
        }
        if let Some(foods) = self.foods {
            record.foods = foods;
        }
        if self.structure.is_some() {
            record.structure = self.structure;
        }
    }
}

impl From<ScrapedWine> for RecordPatch {
    fn from(wine: ScrapedWine) -> Self {
        Self {
            url: Some(wine.url),
            name: Some(wine.name),
            year: wine.year,
            region: Some(wine.region),
            winery: Some(wine.winery),
            estimated_price: wine.estimated_price,
            grapes: Some(wine.grapes),
            tastes: Some(wine.tastes),
            foods: Some(wine.foods),
            image_url: wine.image_url,
            color: wine.color.map(|color| color.label().to_owned()),
            structure: Some(wine.structure),
            ..Self::default()
        }
    }
}

/// Payload accepted by create and update.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecordInput {
    #[serde(flatten)]
    pub fields: RecordPatch,
    /// Listing page HTML captured by the client, normalized instead of fetching.
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "htmlDom")]
    pub html: Option<String>,
    /// Forces a scrape of `url` even when other fields are present.
    #[serde(default)]
    pub scrape: bool,
}

impl From<RecordPatch> for RecordInput {
    fn from(fields: RecordPatch) -> Self {
        Self {
            fields,
            html: None,
            scrape: false,
        }
    }
}

impl RecordInput {
    pub fn url(url: impl Into<String>) -> Self {
        RecordPatch {
            url: Some(url.into()),
            ..RecordPatch::default()
        }
        .into()
    }
}

/// Next `updatedAt` value: now, or one microsecond past `previous` when the
/// clock has not moved forward.
pub fn next_update_time(previous: DateTime<Utc>) -> DateTime<Utc> {
    let now = Utc::now();
    if now > previous {
        now
    } else {
        previous + Duration::microseconds(1)
    }
}

pub fn new_record_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Form-style coercion for numeric patch fields: numbers may arrive as
/// strings, and values that cannot be read as numbers count as absent.
mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    fn number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
        let number = match Option::<Value>::deserialize(deserializer)? {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        Ok(number.filter(|n| n.is_finite()))
    }

    /// Negative counts clamp to zero.
    pub fn quantity<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u32>, D::Error> {
        Ok(number(deserializer)?.map(|n| n.trunc().clamp(0.0, f64::from(u32::MAX)) as u32))
    }

    pub fn year<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i32>, D::Error> {
        Ok(number(deserializer)?
            .map(f64::trunc)
            .filter(|n| (f64::from(i32::MIN)..=f64::from(i32::MAX)).contains(n))
            .map(|n| n as i32))
    }

    pub fn decimal<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
        number(deserializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_only_patch_is_detected() {
        assert!(RecordInput::url("https://example.com/w/1").fields.is_url_only());
        assert!(!RecordInput::url("   ").fields.is_url_only());

        let patch = RecordPatch {
            url: Some("https://example.com/w/1".to_owned()),
            quantity: Some(3),
            ..RecordPatch::default()
        };
        assert!(!patch.is_url_only());
        assert!(!RecordPatch::default().is_url_only());
    }

    #[test]
    fn overlay_prefers_the_newer_patch() {
        let base = RecordPatch {
            name: Some("Manual".to_owned()),
            quantity: Some(6),
            ..RecordPatch::default()
        };
        let scraped = RecordPatch {
            name: Some("Scraped".to_owned()),
            year: Some(2015),
            ..RecordPatch::default()
        };

        let merged = base.overlay(scraped);
        assert_eq!(merged.name.as_deref(), Some("Scraped"));
        assert_eq!(merged.quantity, Some(6));
        assert_eq!(merged.year, Some(2015));
    }

    #[test]
    fn apply_leaves_unset_fields_alone() {
        let now = Utc::now();
        let mut record = WineRecord::new("abc", now);
        record.name = "Margaux".to_owned();
        record.price = Some(42.0);

        RecordPatch::quantity(0).apply(&mut record);

        assert_eq!(record.quantity, 0);
        assert_eq!(record.name, "Margaux");
        assert_eq!(record.price, Some(42.0));
        assert_eq!(record.created_at, now);
    }

    #[test]
    fn input_ignores_identity_and_timestamps() {
        let input: RecordInput = serde_json::from_value(serde_json::json!({
            "id": "spoofed",
            "createdAt": "2001-01-01T00:00:00Z",
            "updatedAt": "2001-01-01T00:00:00Z",
            "name": "Chablis",
            "htmlDom": "<html></html>",
        }))
        .unwrap();

        assert_eq!(input.fields.name.as_deref(), Some("Chablis"));
        assert_eq!(input.html.as_deref(), Some("<html></html>"));
        assert!(!input.scrape);
    }

    #[test]
    fn numeric_fields_are_coerced_permissively() {
        let input: RecordInput = serde_json::from_value(serde_json::json!({
            "name": "Neg",
            "quantity": -1,
            "year": "2015",
            "price": " 12.5 ",
            "rating": "n/a",
        }))
        .unwrap();

        assert_eq!(input.fields.quantity, Some(0));
        assert_eq!(input.fields.year, Some(2015));
        assert_eq!(input.fields.price, Some(12.5));
        assert_eq!(input.fields.rating, None);
        assert_eq!(input.fields.estimated_price, None);
    }

    #[test]
    fn quantity_accepts_strings_and_ignores_garbage() {
        let patch: RecordPatch =
            serde_json::from_value(serde_json::json!({ "quantity": "4" })).unwrap();
        assert_eq!(patch.quantity, Some(4));

        let patch: RecordPatch =
            serde_json::from_value(serde_json::json!({ "quantity": "plenty", "year": null })).unwrap();
        assert_eq!(patch.quantity, None);
        assert_eq!(patch.year, None);
    }

    #[test]
    fn color_codes_map_to_labels() {
        assert_eq!(WineColor::from_type_id(1), Some(WineColor::Red));
        assert_eq!(WineColor::from_type_id(4).map(WineColor::label), Some("Rosé"));
        assert_eq!(WineColor::from_type_id(7), None);
    }

    #[test]
    fn next_update_time_is_strictly_later() {
        let future = Utc::now() + Duration::seconds(60);
        assert!(next_update_time(future) > future);

        let past = Utc::now() - Duration::seconds(60);
        assert!(next_update_time(past) > past);
    }
}
