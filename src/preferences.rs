//! Durable user preferences.
//!
//! Storage is a plain string key/value store, the same shape as browser local
//! storage. Two records live in it: the speech settings owned by the narration
//! engine and the UI language owned by [`LanguageSettings`].

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::error::GuideError;
use crate::poi::{primary_subtag, Language};

/// Key of the `{voiceURI, rate}` record.
pub const SPEECH_SETTINGS_KEY: &str = "speechSettings";
/// Key of the UI language record.
pub const APP_LANGUAGE_KEY: &str = "appLanguage";

/// String key/value storage that survives restarts.
pub trait PreferenceStore {
    fn get(&self, key: &str) -> Result<Option<String>, GuideError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), GuideError>;
}

/// In-memory store. Clones share the same contents.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Rc<RefCell<BTreeMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, GuideError> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), GuideError> {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Store backed by a single JSON object on disk.
///
/// Every `set` rewrites the whole file. Clones point at the same file.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>, GuideError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = std::fs::read_to_string(&self.path)?;
        serde_json::from_str(&content).map_err(|e| {
            GuideError::PreferenceLoadFailed(format!("{}: {e}", self.path.display()))
        })
    }
}

impl PreferenceStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, GuideError> {
        Ok(self.read_all()?.remove(key))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), GuideError> {
        // A corrupt file is replaced rather than blocking every later save;
        // a file that cannot be read is left alone.
        let mut entries = match self.read_all() {
            Ok(entries) => entries,
            Err(GuideError::PreferenceLoadFailed(reason)) => {
                log::warn!("Replacing corrupt preferences: {reason}");
                BTreeMap::new()
            }
            Err(e) => return Err(e),
        };
        entries.insert(key.to_string(), value.to_string());

        let json = serde_json::to_string_pretty(&entries)?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| GuideError::PreferenceSaveFailed(e.to_string()))?;
            }
        }
        std::fs::write(&self.path, json)
            .map_err(|e| GuideError::PreferenceSaveFailed(format!("{}: {e}", self.path.display())))
    }
}

/// The persisted voice and rate choice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeechPreferences {
    #[serde(rename = "voiceURI")]
    pub voice_uri: String,
    pub rate: f32,
}

impl SpeechPreferences {
    /// Read the record. `Ok(None)` if nothing has been saved yet.
    pub fn load<P: PreferenceStore>(store: &P) -> Result<Option<Self>, GuideError> {
        let Some(raw) = store.get(SPEECH_SETTINGS_KEY)? else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| GuideError::PreferenceLoadFailed(format!("{SPEECH_SETTINGS_KEY}: {e}")))
    }

    pub fn save<P: PreferenceStore>(&self, store: &mut P) -> Result<(), GuideError> {
        let json = serde_json::to_string(self)?;
        store.set(SPEECH_SETTINGS_KEY, &json)
    }
}

/// UI language preference.
///
/// Loaded once at construction: a saved supported value wins, then the
/// locale's language if supported, then English. Changes are written through.
#[derive(Debug)]
pub struct LanguageSettings<P: PreferenceStore> {
    store: P,
    language: Language,
}

impl<P: PreferenceStore> LanguageSettings<P> {
    pub fn load(store: P, locale: &str) -> Self {
        let saved = match store.get(APP_LANGUAGE_KEY) {
            Ok(value) => value.as_deref().and_then(Language::parse),
            Err(e) => {
                log::warn!("Ignoring saved UI language: {e}");
                None
            }
        };

        let language = saved
            .or_else(|| Language::parse(primary_subtag(locale)))
            .unwrap_or_default();
        log::debug!("UI language is '{language}'");

        Self { store, language }
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn set_language(&mut self, language: Language) -> Result<(), GuideError> {
        self.language = language;
        self.store.set(APP_LANGUAGE_KEY, language.code())
    }
}
