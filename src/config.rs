use crate::error::{Result, ScanError};
use crate::ocr::{Endpoints, DEFAULT_TIMEOUT};
use crate::types::{Confidence, Language};
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_RECOGNITION_URL: &str = "http://localhost:7070/processar_imagem";
const DEFAULT_GALLERY_URL: &str = "http://localhost:4000/get_images";
const DEFAULT_UPLOAD_URL: &str = "http://localhost:4000/upload_image";

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub endpoints: Endpoints,
    pub timeout: Duration,
    pub data_dir: PathBuf,
    pub language: Language,
    pub confidence: Confidence,
}

impl AppConfig {
    /// Read `.env` from the data dir (where field users drop credentials) and the working
    /// directory, then build the config from the process environment.
    pub fn load() -> Result<Self> {
        let data_dir = std::env::var("CROSS_LABEL_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_data_dir());
        let env_path = data_dir.join(".env");
        if env_path.exists() {
            let _ = dotenvy::from_path(&env_path);
        }
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset keys fall back to defaults.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let timeout = match get("CROSS_LABEL_TIMEOUT_SECS") {
            Some(raw) => {
                let secs: u64 = raw.parse().map_err(|_| {
                    ScanError::Config(format!("CROSS_LABEL_TIMEOUT_SECS is not a number: {}", raw))
                })?;
                if secs == 0 {
                    return Err(ScanError::Config(
                        "CROSS_LABEL_TIMEOUT_SECS must be at least 1".to_string(),
                    ));
                }
                Duration::from_secs(secs)
            }
            None => DEFAULT_TIMEOUT,
        };

        Ok(AppConfig {
            endpoints: Endpoints {
                recognition: get("CROSS_LABEL_RECOGNITION_URL")
                    .unwrap_or_else(|| DEFAULT_RECOGNITION_URL.to_string()),
                gallery: get("CROSS_LABEL_GALLERY_URL")
                    .unwrap_or_else(|| DEFAULT_GALLERY_URL.to_string()),
                upload: get("CROSS_LABEL_UPLOAD_URL")
                    .unwrap_or_else(|| DEFAULT_UPLOAD_URL.to_string()),
            },
            timeout,
            data_dir: get("CROSS_LABEL_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(default_data_dir),
            language: get("CROSS_LABEL_LANG")
                .map(|v| v.parse::<Language>())
                .transpose()?
                .unwrap_or_default(),
            confidence: get("CROSS_LABEL_CONFIDENCE")
                .map(|v| v.parse::<Confidence>())
                .transpose()?
                .unwrap_or_default(),
        })
    }

    pub fn cache_db_path(&self) -> PathBuf {
        self.data_dir.join("cross_label_cache.db")
    }

    pub fn album_dir(&self) -> PathBuf {
        self.data_dir.join("Camera")
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| Path::new(".").to_path_buf())
        .join("cross-label")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.endpoints.recognition, DEFAULT_RECOGNITION_URL);
        assert_eq!(config.endpoints.gallery, DEFAULT_GALLERY_URL);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.language, Language::En);
        assert_eq!(config.confidence, Confidence::LOW);
        assert!(config.cache_db_path().ends_with("cross-label/cross_label_cache.db"));
    }

    #[test]
    fn overrides_from_environment() {
        let config = AppConfig::from_lookup(lookup(&[
            ("CROSS_LABEL_RECOGNITION_URL", "http://10.0.0.5:7070/processar_imagem"),
            ("CROSS_LABEL_TIMEOUT_SECS", "12"),
            ("CROSS_LABEL_DATA_DIR", "/tmp/cl"),
            ("CROSS_LABEL_LANG", "pt"),
            ("CROSS_LABEL_CONFIDENCE", "0.9"),
            ("CROSS_LABEL_UPLOAD_URL", "   "),
        ]))
        .unwrap();
        assert_eq!(config.endpoints.recognition, "http://10.0.0.5:7070/processar_imagem");
        assert_eq!(config.endpoints.upload, DEFAULT_UPLOAD_URL);
        assert_eq!(config.timeout, Duration::from_secs(12));
        assert_eq!(config.data_dir, PathBuf::from("/tmp/cl"));
        assert_eq!(config.album_dir(), PathBuf::from("/tmp/cl/Camera"));
        assert_eq!(config.language, Language::Pt);
        assert_eq!(config.confidence, Confidence::HIGH);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(AppConfig::from_lookup(lookup(&[("CROSS_LABEL_TIMEOUT_SECS", "soon")])).is_err());
        assert!(AppConfig::from_lookup(lookup(&[("CROSS_LABEL_TIMEOUT_SECS", "0")])).is_err());
        assert!(AppConfig::from_lookup(lookup(&[("CROSS_LABEL_CONFIDENCE", "2")])).is_err());
        assert!(AppConfig::from_lookup(lookup(&[("CROSS_LABEL_LANG", "fr")])).is_err());
    }
}
