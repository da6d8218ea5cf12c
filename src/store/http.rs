//! HTTP client for the remote time-series API
//!
//! Every collection response arrives wrapped as `{"data": {"items": [...]}}`.

use super::TimeSeriesStore;
use crate::error::StoreError;
use crate::types::{
    format_write_timestamp, Datapoint, QueryItem, SeriesDatapoints, SeriesDescriptor, SeriesId,
    SeriesRequest, StoreMessage,
};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Maximum number of response body bytes kept in error messages
const MAX_ERROR_BODY: usize = 512;

#[derive(Deserialize)]
struct Envelope<T> {
    data: Items<T>,
}

#[derive(Deserialize)]
struct Items<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Deserialize)]
struct IdOnly {
    id: SeriesId,
}

#[derive(Serialize)]
struct RegisterBody<'a> {
    items: [&'a SeriesRequest; 1],
}

#[derive(Serialize)]
struct MultiBody<'a> {
    requests: &'a [QueryItem],
}

#[derive(Serialize)]
struct WriteBody {
    datapoints: Vec<WritePoint>,
}

#[derive(Serialize)]
struct WritePoint {
    time: String,
    value: f64,
    status: i32,
}

/// Remote store reached over HTTP
pub struct HttpTimeSeriesStore {
    base_url: Url,
    http: reqwest::Client,
}

impl HttpTimeSeriesStore {
    /// Create a client for the API rooted at `base_url`
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self, StoreError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| StoreError::Transport(format!("invalid base URL {base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(StoreError::Transport(format!(
                "base URL cannot carry paths: {base_url}"
            )));
        }

        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        Ok(Self { base_url, http })
    }

    /// Build an endpoint URL from path segments, percent-encoding each one
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, StoreError> {
        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            if body.len() > MAX_ERROR_BODY {
                let mut cut = MAX_ERROR_BODY;
                while !body.is_char_boundary(cut) {
                    cut -= 1;
                }
                body.truncate(cut);
            }
            return Err(StoreError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))
    }
}

#[async_trait]
impl TimeSeriesStore for HttpTimeSeriesStore {
    fn store_id(&self) -> &str {
        "http"
    }

    async fn register_or_lookup(
        &self,
        request: &SeriesRequest,
    ) -> Result<Vec<SeriesId>, StoreError> {
        let url = self.endpoint(&["timeseries", "get-or-add"]);
        let response = self
            .http
            .post(url)
            .json(&RegisterBody { items: [request] })
            .send()
            .await?;

        let envelope: Envelope<IdOnly> = Self::decode(response).await?;
        Ok(envelope.data.items.into_iter().map(|i| i.id).collect())
    }

    async fn write_datapoints(
        &self,
        id: &str,
        datapoints: &[Datapoint],
    ) -> Result<StoreMessage, StoreError> {
        let url = self.endpoint(&["timeseries", id, "datapoints"]);
        let body = WriteBody {
            datapoints: datapoints
                .iter()
                .map(|p| WritePoint {
                    time: format_write_timestamp(&p.time),
                    value: p.value,
                    status: p.status,
                })
                .collect(),
        };

        let response = self.http.post(url).json(&body).send().await?;
        Self::decode(response).await
    }

    async fn query_multi(&self, items: &[QueryItem]) -> Result<Vec<SeriesDatapoints>, StoreError> {
        let url = self.endpoint(&["datapoints", "multi"]);
        debug!(items = items.len(), "Issuing multi-series datapoint query");

        let response = self
            .http
            .post(url)
            .json(&MultiBody { requests: items })
            .send()
            .await?;

        let envelope: Envelope<SeriesDatapoints> = Self::decode(response).await?;
        Ok(envelope.data.items)
    }

    async fn lookup_by_id(&self, id: &str) -> Result<SeriesDescriptor, StoreError> {
        let url = self.endpoint(&["timeseries", id]);
        let response = self.http.get(url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound(id.to_string()));
        }

        let envelope: Envelope<SeriesDescriptor> = Self::decode(response).await?;
        envelope
            .data
            .items
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn search(
        &self,
        description: Option<&str>,
        facility: Option<&str>,
    ) -> Result<Vec<SeriesDescriptor>, StoreError> {
        let mut url = self.endpoint(&["timeseries", "search"]);
        {
            let mut query = url.query_pairs_mut();
            if let Some(d) = description {
                query.append_pair("description", d);
            }
            if let Some(f) = facility {
                query.append_pair("facility", f);
            }
        }
        // An empty query string would leave a trailing '?'
        if url.query() == Some("") {
            url.set_query(None);
        }

        let response = self.http.get(url).send().await?;
        let envelope: Envelope<SeriesDescriptor> = Self::decode(response).await?;
        Ok(envelope.data.items)
    }

    async fn delete(&self, id: &str) -> Result<StoreMessage, StoreError> {
        let url = self.endpoint(&["timeseries", id]);
        let response = self.http.delete(url).send().await?;
        Self::decode(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(base: &str) -> HttpTimeSeriesStore {
        HttpTimeSeriesStore::new(base, Duration::from_secs(1)).unwrap()
    }

    #[test]
    fn test_endpoint_joins_segments() {
        let s = store("http://localhost:5001");
        assert_eq!(
            s.endpoint(&["datapoints", "multi"]).as_str(),
            "http://localhost:5001/datapoints/multi"
        );
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let s = store("https://api.example.com/timeseries/v1.7/");
        assert_eq!(
            s.endpoint(&["timeseries", "abc"]).as_str(),
            "https://api.example.com/timeseries/v1.7/timeseries/abc"
        );
    }

    #[test]
    fn test_endpoint_encodes_ids() {
        let s = store("http://localhost:5001");
        let url = s.endpoint(&["timeseries", "a/b c"]);
        assert_eq!(url.path(), "/timeseries/a%2Fb%20c");
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(HttpTimeSeriesStore::new("::nope::", Duration::from_secs(1)).is_err());
        assert!(HttpTimeSeriesStore::new("mailto:a@b.c", Duration::from_secs(1)).is_err());
    }

    #[test]
    fn test_envelope_with_missing_items() {
        let envelope: Envelope<IdOnly> =
            serde_json::from_value(serde_json::json!({"data": {}})).unwrap();
        assert!(envelope.data.items.is_empty());
    }

    #[test]
    fn test_multi_body_wire_format() {
        let items = vec![QueryItem {
            id: "s1".into(),
            start_time: "2025-01-01T00:00:00Z".into(),
            end_time: "2025-01-02T00:00:00Z".into(),
            status_filter: vec![192],
        }];
        let json = serde_json::to_value(MultiBody { requests: &items }).unwrap();
        assert_eq!(json["requests"][0]["id"], "s1");
        assert_eq!(json["requests"][0]["statusFilter"][0], 192);
    }
}
