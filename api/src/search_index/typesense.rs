use super::SearchIndex;
use crate::config::TypesenseConfig;
use crate::error::IndexError;
use crate::search::SearchParams;
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode, Url};
use rental_common::RentableListing;
use serde::Deserialize;
use std::collections::BTreeSet;

const API_KEY_HEADER: &str = "X-TYPESENSE-API-KEY";
const PER_PAGE: usize = 250;

/// Typesense collection holding rentable-car listings.
pub struct TypesenseIndex {
    client: Client,
    base_url: String,
    api_key: String,
    collection: String,
}

impl std::fmt::Debug for TypesenseIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypesenseIndex")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("collection", &self.collection)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct ImportLine {
    success: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ExportedId {
    id: String,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    document: RentableListing,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    found: usize,
    #[serde(default)]
    hits: Vec<SearchHit>,
}

impl TypesenseIndex {
    pub fn new(base_url: &str, api_key: &str, collection: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            collection: collection.to_string(),
        }
    }

    pub fn from_config(config: &TypesenseConfig) -> Self {
        Self::new(&config.url, &config.api_key, &config.collection)
    }

    /// Base URL extended with `segments`, each one percent-encoded.
    fn api_url(&self, segments: &[&str]) -> Result<Url, IndexError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| IndexError::Transport(format!("invalid index url: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| IndexError::Transport("index url cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn collection_url(&self, rest: &[&str]) -> Result<Url, IndexError> {
        let mut segments = vec!["collections", self.collection.as_str()];
        segments.extend_from_slice(rest);
        self.api_url(&segments)
    }

    /// Creates the collection if it does not exist yet. Returns true when it
    /// was created by this call.
    pub async fn ensure_collection(&self) -> Result<bool, IndexError> {
        let resp = self
            .client
            .get(self.collection_url(&[])?)
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;

        if resp.status() != StatusCode::NOT_FOUND {
            check_status(resp).await?;
            return Ok(false);
        }

        let resp = self
            .client
            .post(self.api_url(&["collections"])?)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&collection_schema(&self.collection))
            .send()
            .await?;
        check_status(resp).await?;

        tracing::info!("Created Typesense collection {}", self.collection);
        Ok(true)
    }
}

fn collection_schema(name: &str) -> serde_json::Value {
    serde_json::json!({
        "name": name,
        "fields": [
            { "name": "name", "type": "string" },
            { "name": "manufacturer", "type": "string", "facet": true },
            { "name": "type", "type": "string", "facet": true },
            { "name": "transmissionType", "type": "string", "facet": true },
            { "name": "fuelType", "type": "string", "facet": true },
            { "name": "pricePerDay", "type": "float" },
            { "name": "availableQuantity", "type": "int64" },
            { "name": "year", "type": "string", "facet": true },
            { "name": "numberOfSeats", "type": "string", "facet": true },
            { "name": "primaryImageUrl", "type": "string", "index": false, "optional": true },
            { "name": "description", "type": "string", "index": false, "optional": true }
        ],
        "default_sorting_field": "pricePerDay"
    })
}

async fn check_status(resp: Response) -> Result<Response, IndexError> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    Err(IndexError::Api { status, body })
}

#[async_trait]
impl SearchIndex for TypesenseIndex {
    async fn upsert(&self, listing: &RentableListing) -> Result<(), IndexError> {
        let resp = self
            .client
            .post(self.collection_url(&["documents"])?)
            .header(API_KEY_HEADER, &self.api_key)
            .query(&[("action", "upsert")])
            .json(listing)
            .send()
            .await?;
        check_status(resp).await?;
        Ok(())
    }

    async fn upsert_batch(
        &self,
        listings: &[RentableListing],
    ) -> Result<Vec<Result<(), IndexError>>, IndexError> {
        if listings.is_empty() {
            return Ok(Vec::new());
        }

        let lines = listings
            .iter()
            .map(serde_json::to_string)
            .collect::<Result<Vec<_>, _>>()?;

        let resp = self
            .client
            .post(self.collection_url(&["documents", "import"])?)
            .header(API_KEY_HEADER, &self.api_key)
            .header(reqwest::header::CONTENT_TYPE, "text/plain")
            .query(&[("action", "upsert")])
            .body(lines.join("\n"))
            .send()
            .await?;
        let body = check_status(resp).await?.text().await?;

        let results = body
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(serde_json::from_str::<ImportLine>)
            .collect::<Result<Vec<_>, _>>()?;

        if results.len() != listings.len() {
            return Err(IndexError::Decode(format!(
                "import returned {} results for {} documents",
                results.len(),
                listings.len()
            )));
        }

        Ok(listings
            .iter()
            .zip(results)
            .map(|(listing, line)| {
                if line.success {
                    Ok(())
                } else {
                    Err(IndexError::Rejected {
                        id: listing.id.clone(),
                        reason: line.error.unwrap_or_else(|| "unknown error".to_string()),
                    })
                }
            })
            .collect())
    }

    async fn delete(&self, id: &str) -> Result<(), IndexError> {
        let resp = self
            .client
            .delete(self.collection_url(&["documents", id])?)
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        check_status(resp).await?;
        Ok(())
    }

    async fn document_ids(&self) -> Result<BTreeSet<String>, IndexError> {
        let resp = self
            .client
            .get(self.collection_url(&["documents", "export"])?)
            .header(API_KEY_HEADER, &self.api_key)
            .query(&[("include_fields", "id")])
            .send()
            .await?;
        let body = check_status(resp).await?.text().await?;

        body.lines()
            .filter(|l| !l.trim().is_empty())
            .map(|line| {
                serde_json::from_str::<ExportedId>(line)
                    .map(|doc| doc.id)
                    .map_err(IndexError::from)
            })
            .collect()
    }

    async fn search(&self, params: &SearchParams) -> Result<Vec<RentableListing>, IndexError> {
        let query_by = params.query_by_param();
        let filter_by = params.filter_by();
        let per_page = PER_PAGE.to_string();

        let mut listings = Vec::new();
        let mut page = 1usize;
        loop {
            let page_param = page.to_string();
            let mut query: Vec<(&str, &str)> = vec![
                ("q", params.q()),
                ("query_by", query_by.as_str()),
                ("per_page", per_page.as_str()),
                ("page", page_param.as_str()),
            ];
            if let Some(filter) = filter_by.as_deref() {
                query.push(("filter_by", filter));
            }

            let resp = self
                .client
                .get(self.collection_url(&["documents", "search"])?)
                .header(API_KEY_HEADER, &self.api_key)
                .query(&query)
                .send()
                .await?;
            let data: SearchResponse = check_status(resp).await?.json().await?;

            let received = data.hits.len();
            listings.extend(data.hits.into_iter().map(|hit| hit.document));
            if received == 0 || listings.len() >= data.found {
                break;
            }
            page += 1;
        }

        Ok(listings)
    }
}
