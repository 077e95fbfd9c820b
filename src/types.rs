use crate::error::{Result, ScanError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

/// One gallery image as known to the local cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub id: String,
    /// What a renderer loads: the server's URI or data URL.
    pub source_ref: String,
    /// Inline encoded image, when the server sent image data rather than a URI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
    pub fetched_at: DateTime<Utc>,
}

impl ImageRecord {
    /// Build a record from a server `image` field, which is either inline base64 or a URI.
    pub fn from_server(id: String, image: String, fetched_at: DateTime<Utc>) -> Self {
        let payload = if is_remote_uri(&image) {
            None
        } else {
            Some(image.clone())
        };
        ImageRecord {
            id,
            source_ref: image,
            payload,
            fetched_at,
        }
    }

    /// Record for a capture that has no server identifier yet.
    pub fn local(payload: String) -> Self {
        ImageRecord {
            id: uuid::Uuid::new_v4().to_string(),
            source_ref: payload.clone(),
            payload: Some(payload),
            fetched_at: Utc::now(),
        }
    }
}

fn is_remote_uri(s: &str) -> bool {
    let lower = s.trim_start().to_ascii_lowercase();
    ["http://", "https://", "file://", "content://", "ph://"]
        .iter()
        .any(|p| lower.starts_with(p))
}

/// The full, internally consistent gallery set plus when it was fetched.
#[derive(Debug, Clone, PartialEq)]
pub struct GallerySnapshot {
    pub records: Arc<Vec<ImageRecord>>,
    pub fetched_at: Option<DateTime<Utc>>,
}

impl GallerySnapshot {
    pub fn empty() -> Self {
        GallerySnapshot {
            records: Arc::new(Vec::new()),
            fetched_at: None,
        }
    }

    pub fn new(records: Vec<ImageRecord>, fetched_at: DateTime<Utc>) -> Self {
        GallerySnapshot {
            records: Arc::new(records),
            fetched_at: Some(fetched_at),
        }
    }

    pub fn ids(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.id.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Pt,
    Es,
}

impl Language {
    pub fn code(self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Pt => "pt",
            Language::Es => "es",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "en" | "english" => Ok(Language::En),
            "pt" | "portugues" | "português" => Ok(Language::Pt),
            "es" | "espanol" | "español" => Ok(Language::Es),
            other => Err(ScanError::Config(format!(
                "Unsupported language '{}' (expected en, pt or es)",
                other
            ))),
        }
    }
}

/// Minimum detection confidence, in (0, 1].
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct Confidence(f64);

impl Confidence {
    pub const LOW: Confidence = Confidence(0.5);
    pub const MEDIUM: Confidence = Confidence(0.7);
    pub const HIGH: Confidence = Confidence(0.9);

    pub fn new(value: f64) -> Result<Self> {
        if value > 0.0 && value <= 1.0 {
            Ok(Confidence(value))
        } else {
            Err(ScanError::Config(format!(
                "Confidence must be in (0, 1], got {}",
                value
            )))
        }
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl Default for Confidence {
    fn default() -> Self {
        Confidence::LOW
    }
}

impl FromStr for Confidence {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => return Ok(Confidence::LOW),
            "medium" => return Ok(Confidence::MEDIUM),
            "high" => return Ok(Confidence::HIGH),
            _ => {}
        }
        let value: f64 = s
            .trim()
            .parse()
            .map_err(|_| ScanError::Config(format!("Invalid confidence '{}'", s)))?;
        Confidence::new(value)
    }
}

/// Body of the recognition POST. One request per capture attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecognitionRequest {
    image: String,
    #[serde(rename = "lang")]
    language: Language,
    confidence: Confidence,
}

impl RecognitionRequest {
    pub fn new(image: String, language: Language, confidence: Confidence) -> Self {
        RecognitionRequest {
            image,
            language,
            confidence,
        }
    }

    pub fn image(&self) -> &str {
        &self.image
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn confidence(&self) -> Confidence {
        self.confidence
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionResult {
    pub annotated_image: String,
    pub extracted_text: String,
}

/// Handle to a freshly acquired image, as returned by a camera or picker.
#[derive(Debug, Clone, PartialEq)]
pub enum RawImage {
    Bytes(Vec<u8>),
    File(PathBuf),
}
