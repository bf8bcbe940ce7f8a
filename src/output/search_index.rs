//! Search index sink
//!
//! Records are written as whole documents keyed by identifier, so re-indexing
//! a listing overwrites the previous document.

use crate::model::CanonicalRecord;
use crate::output::{check_status, SinkResult};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde_json::{json, Map, Value};

/// Search-index collaborator
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Writes the record, replacing any document with the same identifier
    async fn index(&self, record: &CanonicalRecord) -> SinkResult<()>;
}

/// Search index speaking the Elasticsearch document API
pub struct HttpSearchIndex {
    client: Client,
    base_url: String,
    index: String,
}

impl HttpSearchIndex {
    pub fn new(client: Client, base_url: &str, index: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            index: index.to_string(),
        }
    }

    /// `{base}/{index}/_doc/{identifier}`
    pub fn document_url(&self, identifier: &str) -> String {
        let encoded: String = url::form_urlencoded::byte_serialize(identifier.as_bytes()).collect();
        format!("{}/{}/_doc/{}", self.base_url, self.index, encoded)
    }
}

#[async_trait]
impl SearchIndex for HttpSearchIndex {
    async fn index(&self, record: &CanonicalRecord) -> SinkResult<()> {
        let url = self.document_url(record.identifier.as_str());
        let response = self
            .client
            .put(&url)
            .json(&build_document(record))
            .send()
            .await?;
        check_status(response)?;

        tracing::debug!(id = %record.identifier, "Indexed listing");
        Ok(())
    }
}

/// Builds the index document for a record
///
/// Null fields are dropped and the coordinates are folded into a
/// `location.coordinates` geo point.
pub fn build_document(record: &CanonicalRecord) -> Value {
    let mut doc = match serde_json::to_value(record) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    };

    doc.retain(|_, value| !value.is_null());
    doc.remove("latitude");
    doc.remove("longitude");

    if let (Some(lat), Some(lon)) = (record.latitude, record.longitude) {
        doc.insert(
            "location".to_string(),
            json!({ "coordinates": { "lat": lat, "lon": lon } }),
        );
    }
    doc.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

    Value::Object(doc)
}
