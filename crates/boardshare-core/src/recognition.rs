//! Handwriting recognition service client.
//!
//! The board is rasterized by the caller, PNG-encoded here and posted to the
//! recognition service together with the variables assigned so far. Results
//! marked as assignments feed the variable map for the next request.

use crate::config::RecognitionConfig;
use crate::sync::base64_encode;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

/// Errors from the recognition round trip. None of them affect the document.
#[derive(Debug, Error)]
pub enum RecognitionError {
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),
    #[error("Recognition request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Recognition service returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Malformed recognition response: {0}")]
    Response(#[from] serde_json::Error),
    #[error("Image is {len} bytes, expected {expected} for {width}x{height} RGBA")]
    ImageSize {
        width: u32,
        height: u32,
        len: usize,
        expected: usize,
    },
    #[error("PNG encoding failed: {0}")]
    Encode(#[from] png::EncodingError),
}

/// Request body for the calculate endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionRequest {
    /// `data:image/png;base64,...`
    pub image: String,
    pub dict_of_vars: BTreeMap<String, Value>,
}

/// One recognized expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognizedItem {
    pub expr: String,
    /// Number, string or null, as the service produced it.
    #[serde(default)]
    pub result: Value,
    #[serde(default)]
    pub assign: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionResponse {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: Vec<RecognizedItem>,
    #[serde(default)]
    pub status: String,
}

/// An expression and answer shown on the board.
#[derive(Debug, Clone, PartialEq)]
pub struct RecognitionResult {
    pub expression: String,
    pub answer: Value,
}

impl RecognitionResult {
    /// Answer as display text. Strings are shown without quotes.
    pub fn answer_text(&self) -> String {
        match &self.answer {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }
}

/// Raw RGBA8 pixels of the rendered board.
#[derive(Debug, Clone)]
pub struct RasterImage {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl RasterImage {
    pub fn new(width: u32, height: u32, rgba: Vec<u8>) -> Result<Self, RecognitionError> {
        let expected = width as usize * height as usize * 4;
        if rgba.len() != expected {
            return Err(RecognitionError::ImageSize {
                width,
                height,
                len: rgba.len(),
                expected,
            });
        }
        Ok(Self { width, height, rgba })
    }

    pub fn to_png(&self) -> Result<Vec<u8>, RecognitionError> {
        let mut bytes = Vec::new();
        let mut encoder = png::Encoder::new(&mut bytes, self.width, self.height);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header()?;
        writer.write_image_data(&self.rgba)?;
        writer.finish()?;
        Ok(bytes)
    }

    pub fn to_png_data_url(&self) -> Result<String, RecognitionError> {
        Ok(format!("data:image/png;base64,{}", base64_encode(&self.to_png()?)))
    }
}

/// Variables and results accumulated over successive recognitions.
#[derive(Debug, Clone, Default)]
pub struct RecognitionSession {
    vars: BTreeMap<String, Value>,
    results: Vec<RecognitionResult>,
}

impl RecognitionSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vars(&self) -> &BTreeMap<String, Value> {
        &self.vars
    }

    pub fn results(&self) -> &[RecognitionResult] {
        &self.results
    }

    /// Build the request for `image` with the variables known so far.
    pub fn request(&self, image: &RasterImage) -> Result<RecognitionRequest, RecognitionError> {
        Ok(RecognitionRequest {
            image: image.to_png_data_url()?,
            dict_of_vars: self.vars.clone(),
        })
    }

    /// Merge a response: every item is displayed, assignments are remembered.
    /// Returns the number of results added.
    pub fn apply_response(&mut self, response: RecognitionResponse) -> usize {
        let added = response.data.len();
        for item in response.data {
            if item.assign {
                debug!("Recognition: {} = {}", item.expr, item.result);
                self.vars.insert(item.expr.clone(), item.result.clone());
            }
            self.results.push(RecognitionResult {
                expression: item.expr,
                answer: item.result,
            });
        }
        added
    }

    /// Remove one displayed result. Variables are kept.
    pub fn dismiss(&mut self, index: usize) -> Option<RecognitionResult> {
        (index < self.results.len()).then(|| self.results.remove(index))
    }

    /// Forget all results and variables, e.g. when the board is cleared.
    pub fn reset(&mut self) {
        self.results.clear();
        self.vars.clear();
    }
}

/// HTTP client for the recognition service.
pub struct RecognitionClient {
    http: reqwest::Client,
    endpoint: String,
}

impl RecognitionClient {
    pub fn new(config: &RecognitionConfig) -> Result<Self, RecognitionError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| RecognitionError::ClientBuild(e.to_string()))?;
        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub async fn recognize(&self, request: &RecognitionRequest) -> Result<RecognitionResponse, RecognitionError> {
        let response = self.http.post(&self.endpoint).json(request).send().await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(RecognitionError::Status {
                status: status.as_u16(),
                body: text,
            });
        }
        let parsed: RecognitionResponse = serde_json::from_str(&text)?;
        info!("Recognition: {} ({} results)", parsed.message, parsed.data.len());
        Ok(parsed)
    }

    /// Rasterized board in, session updated. Returns the number of new results.
    pub async fn recognize_into(
        &self,
        session: &mut RecognitionSession,
        image: &RasterImage,
    ) -> Result<usize, RecognitionError> {
        let request = session.request(image)?;
        let response = self.recognize(&request).await?;
        Ok(session.apply_response(response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::base64_decode;
    use serde_json::json;

    fn response(items: Value) -> RecognitionResponse {
        serde_json::from_value(json!({
            "message": "Image processed",
            "data": items,
            "status": "success",
        }))
        .unwrap()
    }

    #[test]
    fn test_parse_response() {
        let parsed = response(json!([
            { "expr": "2 + 2", "result": 4 },
            { "expr": "x", "result": 5, "assign": true },
            { "expr": "Not a mathematical expression", "result": null },
        ]));
        assert_eq!(parsed.data.len(), 3);
        assert!(!parsed.data[0].assign);
        assert!(parsed.data[1].assign);
        assert_eq!(parsed.data[2].result, Value::Null);
    }

    #[test]
    fn test_assignments_feed_next_request() {
        let mut session = RecognitionSession::new();
        let added = session.apply_response(response(json!([
            { "expr": "x", "result": 4, "assign": true },
            { "expr": "x + 1", "result": 5 },
        ])));
        assert_eq!(added, 2);
        assert_eq!(session.vars().get("x"), Some(&json!(4)));
        assert_eq!(session.vars().len(), 1);

        let image = RasterImage::new(1, 1, vec![255, 255, 255, 255]).unwrap();
        let request = session.request(&image).unwrap();
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["dict_of_vars"], json!({ "x": 4 }));
        assert!(body["image"].as_str().unwrap().starts_with("data:image/png;base64,"));
    }

    #[test]
    fn test_results_accumulate_and_dismiss() {
        let mut session = RecognitionSession::new();
        session.apply_response(response(json!([{ "expr": "1 + 1", "result": 2 }])));
        session.apply_response(response(json!([{ "expr": "3 * 3", "result": "9" }])));
        assert_eq!(session.results().len(), 2);
        assert_eq!(session.results()[0].answer_text(), "2");
        assert_eq!(session.results()[1].answer_text(), "9");

        let removed = session.dismiss(0).unwrap();
        assert_eq!(removed.expression, "1 + 1");
        assert_eq!(session.results().len(), 1);
        assert!(session.dismiss(5).is_none());
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut session = RecognitionSession::new();
        session.apply_response(response(json!([{ "expr": "y", "result": 2, "assign": true }])));
        session.reset();
        assert!(session.results().is_empty());
        assert!(session.vars().is_empty());
    }

    #[test]
    fn test_png_data_url() {
        let image = RasterImage::new(2, 1, vec![0, 0, 0, 255, 255, 0, 0, 255]).unwrap();
        let url = image.to_png_data_url().unwrap();
        let payload = url.strip_prefix("data:image/png;base64,").unwrap();
        let bytes = base64_decode(payload).unwrap();
        assert_eq!(&bytes[..8], &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]);
    }

    #[test]
    fn test_image_size_mismatch() {
        let err = RasterImage::new(2, 2, vec![0; 4]).unwrap_err();
        assert!(matches!(err, RecognitionError::ImageSize { expected: 16, .. }));
    }

    #[test]
    fn test_client_uses_configured_endpoint() {
        let config = RecognitionConfig {
            endpoint: "http://127.0.0.1:1/calculate".into(),
            ..RecognitionConfig::default()
        };
        let client = RecognitionClient::new(&config).unwrap();
        assert_eq!(client.endpoint(), "http://127.0.0.1:1/calculate");
    }
}
