//! Persisted resume record and its key-value conventions.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;
use uuid::Uuid;

use crate::client::{GatewayError, KeyValueStore};
use crate::llm_client::strip_json_fences;
use crate::platform::KvListing;

pub const RESUME_KEY_PREFIX: &str = "resume:";
/// Pattern matching every resume record; the listing contract the UI relies on.
pub const RESUME_KEY_PATTERN: &str = "resume:*";

pub fn record_key(id: &Uuid) -> String {
    format!("{RESUME_KEY_PREFIX}{id}")
}

/// The model's scoring payload. Only required to be a JSON object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeedbackDocument(Map<String, Value>);

impl FeedbackDocument {
    /// Parses model output, tolerating surrounding code fences.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(strip_json_fences(text))
    }

    pub fn overall_score(&self) -> Option<u64> {
        self.0.get("overallScore").and_then(Value::as_u64)
    }
}

/// `""` until the analysis lands, then the parsed document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Feedback {
    Document(FeedbackDocument),
    Pending(String),
}

impl Feedback {
    pub fn pending() -> Self {
        Feedback::Pending(String::new())
    }

    pub fn document(&self) -> Option<&FeedbackDocument> {
        match self {
            Feedback::Document(doc) => Some(doc),
            Feedback::Pending(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeRecord {
    pub id: Uuid,
    pub resume_path: String,
    pub image_path: String,
    pub company_name: String,
    pub job_title: String,
    pub job_description: String,
    pub feedback: Feedback,
}

impl ResumeRecord {
    pub fn key(&self) -> String {
        record_key(&self.id)
    }
}

/// Loads every record under `resume:*`. Entries that fail to parse are skipped.
pub async fn list_resumes(kv: &KeyValueStore) -> Result<Vec<ResumeRecord>, GatewayError> {
    let values = match kv.list(RESUME_KEY_PATTERN, true).await? {
        KvListing::Items(items) => items.into_iter().map(|i| (i.key, i.value)).collect(),
        // Host ignored `return_values`; fetch each one.
        KvListing::Keys(keys) => {
            let mut values = Vec::with_capacity(keys.len());
            for key in keys {
                if let Some(value) = kv.get(&key).await? {
                    values.push((key, value));
                }
            }
            values
        }
    };

    Ok(values
        .into_iter()
        .filter_map(|(key, value)| match serde_json::from_str::<ResumeRecord>(&value) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!("Skipping unreadable record {key}: {e}");
                None
            }
        })
        .collect())
}

/// `Ok(None)` when no record exists under the id or the stored value is unreadable.
pub async fn load_resume(kv: &KeyValueStore, id: &Uuid) -> Result<Option<ResumeRecord>, GatewayError> {
    let Some(value) = kv.get(&record_key(id)).await? else {
        return Ok(None);
    };
    match serde_json::from_str(&value) {
        Ok(record) => Ok(Some(record)),
        Err(e) => {
            warn!("Record {id} is unreadable: {e}");
            Ok(None)
        }
    }
}
