use crate::error::{Result, ScanError};
use crate::types::{ImageRecord, RecognitionRequest, RecognitionResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// The remote recognition and storage service.
///
/// Every call is a single attempt; retry policy belongs to the caller.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    async fn submit_recognition(&self, req: &RecognitionRequest) -> Result<RecognitionResult>;

    /// Full replacement set of gallery images, stamped with the fetch time.
    async fn list_gallery_images(&self) -> Result<Vec<ImageRecord>>;

    async fn upload_image(&self, payload: &str) -> Result<ImageRecord>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct Endpoints {
    pub recognition: String,
    pub gallery: String,
    pub upload: String,
}

pub struct HttpRemoteClient {
    client: Client,
    endpoints: Endpoints,
    timeout: Duration,
}

#[derive(Serialize)]
struct UploadBody<'a> {
    base64: &'a str,
}

#[derive(Deserialize)]
struct RecognitionResponse {
    imagem_com_caixas_base64: Option<String>,
    texto_extraido: Option<String>,
}

impl HttpRemoteClient {
    pub fn new(endpoints: Endpoints, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(timeout)
            .build()
            .map_err(|e| ScanError::Transport(format!("Could not build HTTP client: {}", e)))?;
        Ok(HttpRemoteClient {
            client,
            endpoints,
            timeout,
        })
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Run one exchange (send + body) under the client's time bound.
    async fn bounded<T>(&self, exchange: impl Future<Output = Result<T>>) -> Result<T> {
        match tokio::time::timeout(self.timeout, exchange).await {
            Ok(result) => result,
            Err(_) => {
                warn!(timeout_secs = self.timeout.as_secs(), "remote call timed out");
                Err(ScanError::Timeout(self.timeout))
            }
        }
    }

    async fn read_body(&self, response: reqwest::Response) -> Result<String> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| map_reqwest_error(e, self.timeout))?;
        if !status.is_success() {
            return Err(ScanError::Transport(format!(
                "Server returned {}: {}",
                status,
                if body.is_empty() { "no body" } else { body.as_str() }
            )));
        }
        Ok(body)
    }
}

#[async_trait]
impl RemoteClient for HttpRemoteClient {
    async fn submit_recognition(&self, req: &RecognitionRequest) -> Result<RecognitionResult> {
        debug!(
            url = %self.endpoints.recognition,
            lang = %req.language(),
            confidence = req.confidence().value(),
            image_len = req.image().len(),
            "submitting recognition request"
        );
        let body = self
            .bounded(async {
                let response = self
                    .client
                    .post(&self.endpoints.recognition)
                    .json(req)
                    .send()
                    .await
                    .map_err(|e| map_reqwest_error(e, self.timeout))?;
                self.read_body(response).await
            })
            .await?;
        let result = parse_recognition(&body)?;
        info!(text_len = result.extracted_text.len(), "recognition succeeded");
        Ok(result)
    }

    async fn list_gallery_images(&self) -> Result<Vec<ImageRecord>> {
        debug!(url = %self.endpoints.gallery, "listing gallery images");
        let body = self
            .bounded(async {
                let response = self
                    .client
                    .get(&self.endpoints.gallery)
                    .send()
                    .await
                    .map_err(|e| map_reqwest_error(e, self.timeout))?;
                self.read_body(response).await
            })
            .await?;
        let records = parse_gallery(&body, Utc::now())?;
        info!(count = records.len(), "gallery listing fetched");
        Ok(records)
    }

    async fn upload_image(&self, payload: &str) -> Result<ImageRecord> {
        debug!(url = %self.endpoints.upload, payload_len = payload.len(), "uploading image");
        let body = self
            .bounded(async {
                let response = self
                    .client
                    .post(&self.endpoints.upload)
                    .json(&UploadBody { base64: payload })
                    .send()
                    .await
                    .map_err(|e| map_reqwest_error(e, self.timeout))?;
                self.read_body(response).await
            })
            .await?;
        let record = parse_upload_ack(&body, payload, Utc::now())?;
        info!(id = %record.id, "image uploaded");
        Ok(record)
    }
}

fn map_reqwest_error(e: reqwest::Error, timeout: Duration) -> ScanError {
    if e.is_timeout() {
        ScanError::Timeout(timeout)
    } else if e.is_connect() {
        ScanError::Transport(format!("Check your network connection and try again. ({})", e))
    } else if e.is_decode() {
        ScanError::MalformedResponse(e.to_string())
    } else {
        ScanError::Transport(e.to_string())
    }
}

/// Both fields are required; a missing or null field is a protocol violation.
pub fn parse_recognition(body: &str) -> Result<RecognitionResult> {
    let parsed: RecognitionResponse = serde_json::from_str(body)
        .map_err(|e| ScanError::MalformedResponse(format!("Invalid JSON: {}", e)))?;
    let annotated_image = parsed.imagem_com_caixas_base64.ok_or_else(|| {
        ScanError::MalformedResponse("missing field imagem_com_caixas_base64".to_string())
    })?;
    let extracted_text = parsed
        .texto_extraido
        .ok_or_else(|| ScanError::MalformedResponse("missing field texto_extraido".to_string()))?;
    Ok(RecognitionResult {
        annotated_image,
        extracted_text,
    })
}

/// Parse `[{"_id": ..., "image": ...}, ...]` into records fetched at `now`.
pub fn parse_gallery(body: &str, now: DateTime<Utc>) -> Result<Vec<ImageRecord>> {
    let json: Value = serde_json::from_str(body)
        .map_err(|e| ScanError::MalformedResponse(format!("Invalid JSON: {}", e)))?;
    let items = json.as_array().ok_or_else(|| {
        ScanError::MalformedResponse("Gallery listing is not an array".to_string())
    })?;
    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let id = item.get("_id").and_then(identifier).ok_or_else(|| {
                ScanError::MalformedResponse(format!("Gallery item {} has no _id", i))
            })?;
            let image = item
                .get("image")
                .and_then(|v| v.as_str())
                .ok_or_else(|| {
                    ScanError::MalformedResponse(format!("Gallery item {} has no image", i))
                })?;
            Ok(ImageRecord::from_server(id, image.to_string(), now))
        })
        .collect()
}

/// Accept `{"_id"}`, `{"id"}`, `{"insertedId"}` or a bare JSON string as the acknowledgement.
pub fn parse_upload_ack(body: &str, payload: &str, now: DateTime<Utc>) -> Result<ImageRecord> {
    let json: Value = serde_json::from_str(body)
        .map_err(|e| ScanError::MalformedResponse(format!("Invalid JSON: {}", e)))?;
    let id = identifier(&json)
        .or_else(|| {
            ["_id", "id", "insertedId"]
                .iter()
                .find_map(|key| json.get(key).and_then(identifier))
        })
        .ok_or_else(|| {
            ScanError::MalformedResponse("Upload acknowledgement has no identifier".to_string())
        })?;
    Ok(ImageRecord::from_server(id, payload.to_string(), now))
}

/// String, number or Mongo-style `{"$oid": "..."}` identifier.
fn identifier(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(map) => map.get("$oid").and_then(|o| o.as_str()).map(String::from),
        _ => None,
    }
}
