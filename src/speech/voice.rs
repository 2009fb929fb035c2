use serde::{Deserialize, Serialize};

use crate::poi::{primary_subtag, Language};

/// A voice offered by the platform speech capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voice {
    #[serde(rename = "voiceURI")]
    pub voice_uri: String,
    pub name: String,
    /// BCP-47 language tag, e.g. `"en-US"`.
    pub lang: String,
    #[serde(rename = "isDefault", default)]
    pub is_default: bool,
    #[serde(rename = "isLocalService", default)]
    pub is_local_service: bool,
}

impl Voice {
    pub fn new(voice_uri: impl Into<String>, name: impl Into<String>, lang: impl Into<String>) -> Self {
        Self {
            voice_uri: voice_uri.into(),
            name: name.into(),
            lang: lang.into(),
            is_default: false,
            is_local_service: true,
        }
    }

    /// Primary language subtag, lowercased (`"pl-PL"` -> `"pl"`).
    pub fn primary_lang(&self) -> String {
        primary_subtag(&self.lang).to_ascii_lowercase()
    }

    /// The narration language this voice speaks.
    pub fn narration_language(&self) -> Language {
        Language::from_tag(&self.lang)
    }

    pub fn is_supported(&self) -> bool {
        Language::parse(&self.primary_lang()).is_some()
    }
}

/// Voices in one of the narration languages, in catalog order.
pub fn supported_voices(voices: &[Voice]) -> Vec<Voice> {
    voices.iter().filter(|v| v.is_supported()).cloned().collect()
}

/// One voice per primary language, ordered by first appearance.
///
/// Within a language a voice whose name mentions "google" wins, otherwise the
/// first one listed.
pub fn primary_voices(voices: &[Voice]) -> Vec<Voice> {
    let mut groups: Vec<(String, Vec<&Voice>)> = Vec::new();
    for voice in voices {
        let lang = voice.primary_lang();
        match groups.iter_mut().find(|(l, _)| *l == lang) {
            Some((_, group)) => group.push(voice),
            None => groups.push((lang, vec![voice])),
        }
    }

    groups
        .into_iter()
        .filter_map(|(_, group)| {
            group
                .iter()
                .find(|v| v.name.to_lowercase().contains("google"))
                .or_else(|| group.first())
                .map(|v| (*v).clone())
        })
        .collect()
}

/// Default voice for a locale: first voice in the locale's language, else the first voice.
pub fn default_voice_for_locale<'a>(voices: &'a [Voice], locale: &str) -> Option<&'a Voice> {
    let wanted = primary_subtag(locale).to_ascii_lowercase();
    voices
        .iter()
        .find(|v| v.primary_lang() == wanted)
        .or_else(|| voices.first())
}
