use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::GuideError;

/// Languages the guide can narrate in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Pl,
    De,
}

impl Language {
    pub const ALL: [Language; 3] = [Language::En, Language::Pl, Language::De];

    pub fn code(self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Pl => "pl",
            Language::De => "de",
        }
    }

    /// Map a BCP-47 tag (e.g. `"pl-PL"`) to a narration language.
    ///
    /// Only the primary subtag is considered; anything unsupported is English.
    pub fn from_tag(tag: &str) -> Self {
        Self::parse(primary_subtag(tag)).unwrap_or(Language::En)
    }

    /// Parse one of the supported language codes, case-insensitively.
    pub fn parse(code: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|language| language.code().eq_ignore_ascii_case(code))
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Primary language subtag of a BCP-47 tag (`"en-US"` -> `"en"`).
pub fn primary_subtag(tag: &str) -> &str {
    tag.split(['-', '_']).next().unwrap_or("")
}

/// Title and description of a POI in one language.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoiText {
    pub title: String,
    pub description: String,
}

/// A point of interest. Identity is `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Poi {
    pub id: String,
    pub title: String,
    pub description: String,
    /// Translations keyed by language code (`"pl"`, `"de"`).
    #[serde(default)]
    pub translations: BTreeMap<String, PoiText>,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
}

impl Poi {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
        latitude: f64,
        longitude: f64,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: description.into(),
            translations: BTreeMap::new(),
            latitude,
            longitude,
            icon_url: None,
        }
    }

    pub fn with_translation(
        mut self,
        language: Language,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        self.translations.insert(
            language.code().to_string(),
            PoiText {
                title: title.into(),
                description: description.into(),
            },
        );
        self
    }

    fn translation(&self, language: Language) -> Option<&PoiText> {
        match language {
            Language::En => None,
            other => self.translations.get(other.code()),
        }
    }

    /// Title in `language`, falling back to the base title.
    pub fn localized_title(&self, language: Language) -> &str {
        self.translation(language)
            .map(|t| t.title.as_str())
            .unwrap_or(&self.title)
    }

    /// Narration text in `language`, falling back to the base description.
    pub fn localized_description(&self, language: Language) -> &str {
        self.translation(language)
            .map(|t| t.description.as_str())
            .unwrap_or(&self.description)
    }
}

/// Parse a JSON array of POIs, rejecting duplicate ids.
pub fn parse_pois(json: &str) -> Result<Vec<Poi>, GuideError> {
    let pois: Vec<Poi> = serde_json::from_str(json)?;

    let mut seen = HashSet::new();
    for poi in &pois {
        if !seen.insert(poi.id.as_str()) {
            return Err(GuideError::DuplicatePoi(poi.id.clone()));
        }
    }

    Ok(pois)
}

/// Load POIs from a JSON file.
pub fn load_pois(path: &Path) -> Result<Vec<Poi>, GuideError> {
    let content = std::fs::read_to_string(path)?;
    let pois = parse_pois(&content)?;
    log::info!("Loaded {} POIs from {}", pois.len(), path.display());
    Ok(pois)
}
