//! Azure Blob Storage backend.
//!
//! Reads go through the container's public base URL so render-time lookups
//! never carry credentials. Writes, deletes and listings go to the container
//! URL with a SAS token appended.

use crate::models::metadata::MetadataDocument;
use crate::services::storage_service::{
    DOCUMENT_SUFFIX, StorageBackend, StoreError, StoreResult, parse_document,
};
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use bytes::Bytes;
use reqwest::{
    StatusCode,
    header::{CONTENT_TYPE, HeaderMap, HeaderValue},
};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const API_VERSION: &str = "2023-11-03";

#[derive(Debug, Clone)]
pub struct BlobBackendConfig {
    /// Anonymous read endpoint, e.g. `https://acct.blob.core.windows.net/seo`.
    pub public_base_url: String,
    /// Authenticated endpoint for the same container.
    pub container_url: String,
    /// Shared access signature query string, with or without a leading `?`.
    pub sas_token: Option<String>,
    pub request_timeout: Duration,
    /// In-process cache TTL, mirrored into each blob's `Cache-Control`.
    pub cache_ttl: Duration,
}

pub struct AzureBlobBackend {
    public_base_url: String,
    container_url: String,
    sas_token: Option<String>,
    cache_control: HeaderValue,
    client: reqwest::Client,
}

impl AzureBlobBackend {
    pub fn new(config: BlobBackendConfig) -> StoreResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        let cache_control = HeaderValue::from_str(&cache_control(config.cache_ttl))
            .map_err(|e| StoreError::Transport(format!("invalid cache-control: {}", e)))?;
        Ok(Self {
            public_base_url: config.public_base_url.trim_end_matches('/').to_string(),
            container_url: config.container_url.trim_end_matches('/').to_string(),
            sas_token: config
                .sas_token
                .map(|t| t.trim_start_matches('?').to_string())
                .filter(|t| !t.is_empty()),
            cache_control,
            client,
        })
    }

    fn public_url(&self, id: &str) -> String {
        format!("{}/{}{}", self.public_base_url, id, DOCUMENT_SUFFIX)
    }

    fn blob_url(&self, id: &str) -> String {
        let url = format!("{}/{}{}", self.container_url, id, DOCUMENT_SUFFIX);
        match &self.sas_token {
            Some(sas) => format!("{}?{}", url, sas),
            None => url,
        }
    }

    fn list_url(&self, marker: Option<&str>) -> StoreResult<reqwest::Url> {
        let mut url = reqwest::Url::parse(&self.container_url)
            .map_err(|e| StoreError::Transport(format!("invalid container url: {}", e)))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("restype", "container");
            query.append_pair("comp", "list");
            if let Some(marker) = marker {
                query.append_pair("marker", marker);
            }
        }
        if let Some(sas) = &self.sas_token {
            let combined = match url.query() {
                Some(existing) => format!("{}&{}", existing, sas),
                None => sas.clone(),
            };
            url.set_query(Some(&combined));
        }
        Ok(url)
    }

    fn write_headers(&self, body: &[u8]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-ms-version", HeaderValue::from_static(API_VERSION));
        headers.insert("x-ms-blob-type", HeaderValue::from_static("BlockBlob"));
        headers.insert(
            "x-ms-blob-content-type",
            HeaderValue::from_static("application/json"),
        );
        headers.insert("x-ms-blob-cache-control", self.cache_control.clone());
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Ok(value) = HeaderValue::from_str(&content_md5(body)) {
            headers.insert("content-md5", value);
        }
        headers
    }
}

fn cache_control(ttl: Duration) -> String {
    format!("public, max-age={}", ttl.as_secs())
}

/// Base64 MD5 digest, verified by the blob service on upload.
fn content_md5(body: &[u8]) -> String {
    general_purpose::STANDARD.encode(md5::compute(body).0)
}

fn unexpected_status(method: &str, status: StatusCode) -> StoreError {
    StoreError::Transport(format!("{} returned {}", method, status))
}

#[async_trait]
impl StorageBackend for AzureBlobBackend {
    fn backend_tag(&self) -> &'static str {
        "azure-blob"
    }

    async fn read(&self, id: &str) -> StoreResult<MetadataDocument> {
        let url = self.public_url(id);
        debug!("GET {}", url);
        let response = self.client.get(&url).send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => Err(StoreError::NotFound(id.to_string())),
            status if status.is_success() => {
                let body = response.bytes().await?;
                parse_document(id, &body)
            }
            status => Err(unexpected_status("GET", status)),
        }
    }

    async fn write(&self, id: &str, document: &MetadataDocument) -> StoreResult<()> {
        let body = Bytes::from(serde_json::to_vec(document)?);
        let headers = self.write_headers(&body);
        debug!("PUT blob `{}{}` ({} bytes)", id, DOCUMENT_SUFFIX, body.len());
        let response = self
            .client
            .put(self.blob_url(id))
            .headers(headers)
            .body(body)
            .send()
            .await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(unexpected_status("PUT", response.status()))
        }
    }

    async fn delete(&self, id: &str) -> StoreResult<()> {
        debug!("DELETE blob `{}{}`", id, DOCUMENT_SUFFIX);
        let response = self
            .client
            .delete(self.blob_url(id))
            .header("x-ms-version", API_VERSION)
            .send()
            .await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(()),
            status if status.is_success() => Ok(()),
            status => Err(unexpected_status("DELETE", status)),
        }
    }

    /// Follows `NextMarker` until the enumeration is exhausted.
    async fn list(&self) -> StoreResult<Vec<String>> {
        let mut ids = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let url = self.list_url(marker.as_deref())?;
            let response = self
                .client
                .get(url)
                .header("x-ms-version", API_VERSION)
                .send()
                .await?;
            if !response.status().is_success() {
                return Err(unexpected_status("LIST", response.status()));
            }
            let body = response.text().await?;
            let page = parse_enumeration(&body)?;
            ids.extend(page.ids);
            match page.next_marker {
                Some(next) => marker = Some(next),
                None => break,
            }
        }

        Ok(ids)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct EnumerationResults {
    #[serde(default)]
    blobs: BlobList,
    #[serde(default)]
    next_marker: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct BlobList {
    #[serde(rename = "Blob", default)]
    items: Vec<BlobItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct BlobItem {
    name: String,
}

#[derive(Debug, PartialEq)]
struct ListPage {
    ids: Vec<String>,
    next_marker: Option<String>,
}

/// Parse one `List Blobs` response page, keeping only `*.json` blobs.
fn parse_enumeration(xml: &str) -> StoreResult<ListPage> {
    let xml = xml.trim_start_matches('\u{feff}');
    let results: EnumerationResults = quick_xml::de::from_str(xml)
        .map_err(|e| StoreError::Transport(format!("unreadable blob listing: {}", e)))?;

    let ids = results
        .blobs
        .items
        .into_iter()
        .filter_map(|blob| blob.name.strip_suffix(DOCUMENT_SUFFIX).map(str::to_string))
        .collect();

    Ok(ListPage {
        ids,
        next_marker: results.next_marker.filter(|m| !m.trim().is_empty()),
    })
}
