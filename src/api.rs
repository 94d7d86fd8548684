// Thin HTTP client for the remote kiosk service.
// Three calls matter to the capture screen: the backgrounds feed, capture
// ingestion and the SMS trigger. Everything else (admin, auth) lives elsewhere.

use std::io::Read;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use ureq::Agent;

use crate::catalog::ImageLoader;
use crate::error::Error;

/// Upper bound for a downloaded background image.
const MAX_IMAGE_BYTES: u64 = 32 * 1024 * 1024;

/// One record of the backgrounds feed. Only these fields are used.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct BackgroundRecord {
    #[serde(deserialize_with = "id_as_string")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub file_path: String,
    #[serde(default)]
    pub is_active: bool,
}

/// Accept both `"id": "abc"` and `"id": 42`.
fn id_as_string<'de, D: Deserializer<'de>>(de: D) -> Result<String, D::Error> {
    match Value::deserialize(de)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!("unsupported id: {other}"))),
    }
}

/// The feed is a keyed object (`{"<id>": {...}, ...}`); a plain array is accepted too.
/// Record order is preserved as received.
pub fn parse_backgrounds(body: Value) -> Result<Vec<BackgroundRecord>, serde_json::Error> {
    let items: Vec<Value> = match body {
        Value::Object(map) => map.into_iter().map(|(_, v)| v).collect(),
        Value::Array(items) => items,
        other => vec![other],
    };
    items.into_iter().map(serde_json::from_value).collect()
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct CaptureRequest {
    /// JPEG as plain base64, no `data:` prefix.
    pub photo_base64: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub background_id: Option<String>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct CaptureReceipt {
    #[serde(deserialize_with = "id_as_string")]
    pub id: String,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct SmsRequest {
    pub capture_id: String,
    pub phone: String,
}

/// The remote service as the kiosk sees it. Implemented over HTTP in
/// production and by in-memory fakes in tests.
pub trait KioskService: Send + Sync {
    fn fetch_backgrounds(&self) -> Result<Vec<BackgroundRecord>, Error>;
    fn submit_capture(&self, request: &CaptureRequest) -> Result<CaptureReceipt, Error>;
    fn trigger_sms(&self, request: &SmsRequest) -> Result<(), Error>;
    /// Absolute URL of a background's image file.
    fn image_url(&self, record: &BackgroundRecord) -> String;
}

pub struct HttpKioskService {
    agent: Agent,
    base_url: String,
}

impl HttpKioskService {
    pub fn new(base_url: &str) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(10))
            .build();
        Self { agent, base_url: base_url.trim_end_matches('/').to_string() }
    }

    pub fn agent(&self) -> Agent {
        self.agent.clone()
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

impl KioskService for HttpKioskService {
    fn fetch_backgrounds(&self) -> Result<Vec<BackgroundRecord>, Error> {
        let url = self.url("api/backgrounds");
        tracing::debug!(%url, "fetching backgrounds");
        let body: Value = self.agent.get(&url).call()?.into_json()?;
        parse_backgrounds(body).map_err(|e| Error::Http(format!("backgrounds feed: {e}")))
    }

    fn submit_capture(&self, request: &CaptureRequest) -> Result<CaptureReceipt, Error> {
        let url = self.url("api/captures");
        tracing::debug!(%url, bytes = request.photo_base64.len(), "submitting capture");
        let receipt = self.agent.post(&url).send_json(request)?.into_json()?;
        Ok(receipt)
    }

    fn trigger_sms(&self, request: &SmsRequest) -> Result<(), Error> {
        let url = self.url("api/sms");
        self.agent.post(&url).send_json(request)?;
        Ok(())
    }

    fn image_url(&self, record: &BackgroundRecord) -> String {
        self.url(&record.file_path)
    }
}

/// Loads background bytes: `http(s)://` over HTTP, anything else from disk.
pub struct UrlLoader {
    agent: Agent,
}

impl UrlLoader {
    pub fn new(agent: Agent) -> Self {
        Self { agent }
    }
}

impl ImageLoader for UrlLoader {
    fn load(&self, source: &str) -> Result<Vec<u8>, Error> {
        if source.starts_with("http://") || source.starts_with("https://") {
            let mut bytes = Vec::new();
            self.agent
                .get(source)
                .call()?
                .into_reader()
                .take(MAX_IMAGE_BYTES)
                .read_to_end(&mut bytes)?;
            Ok(bytes)
        } else {
            Ok(std::fs::read(source)?)
        }
    }
}
