use crate::location::PositionErrorCode;

#[derive(thiserror::Error, Debug)]
pub enum GuideError {
    #[error("Location capability is not available on this device")]
    LocationUnavailable,
    #[error("Location fix failed ({code:?}): {message}")]
    LocationFixFailed {
        code: PositionErrorCode,
        message: String,
    },
    #[error("Speech synthesis is not available on this device")]
    SpeechUnavailable,
    #[error("Failed to load saved preferences: {0}")]
    PreferenceLoadFailed(String),
    #[error("Failed to save preferences: {0}")]
    PreferenceSaveFailed(String),
    #[error("Duplicate POI id '{0}'. POI ids must be unique.")]
    DuplicatePoi(String),
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
